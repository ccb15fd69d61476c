//! Image provisioning.
//!
//! Ensures the custom Jenkins image exists, building it from the embedded
//! Dockerfile when it does not. The build context is materialized into a
//! scoped temporary directory that is cleaned up on every exit path.

use tracing::{info, warn};

use crate::docker::client::{ContainerRuntime, Presence};
use crate::error::DockerError;

/// Dockerfile for the CI controller image: Jenkins LTS with the .NET 6 SDK
/// installed so the build command can run `dotnet` directly.
pub const JENKINS_DOTNET_DOCKERFILE: &str = r#"FROM jenkins/jenkins:lts
USER root
RUN apt-get update && apt-get install -y wget apt-transport-https \
    && wget https://packages.microsoft.com/config/ubuntu/20.04/packages-microsoft-prod.deb \
    && dpkg -i packages-microsoft-prod.deb \
    && apt-get update && apt-get install -y dotnet-sdk-6.0 \
    && ln -s /usr/share/dotnet/dotnet /usr/bin/dotnet \
    && rm packages-microsoft-prod.deb
USER jenkins
"#;

/// A named image plus the build recipe that produces it.
///
/// The recipe is a compile-time constant, so rebuilding is deterministic:
/// the same `ImageRef` always describes the same image content.
#[derive(Debug, Clone)]
pub struct ImageRef {
    /// Image name:tag.
    pub tag: String,
    /// Dockerfile content used when the image must be built.
    pub dockerfile: &'static str,
}

impl ImageRef {
    /// An image ref using the embedded Jenkins + .NET recipe.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            dockerfile: JENKINS_DOTNET_DOCKERFILE,
        }
    }
}

/// How `ensure_image` left the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    /// The image already existed; nothing was built.
    AlreadyPresent,
    /// The image was built during this call.
    Built,
    /// A build was attempted and failed. Not fatal: the container stage
    /// runs anyway and the readiness wait surfaces a truly missing image.
    BuildFailed,
}

/// Ensure `image` exists locally, building it from the embedded recipe if
/// it does not.
///
/// A failed inspect is treated as "does not exist" (the runtime cannot
/// distinguish not-found from a transient error), so the worst case is a
/// redundant build of an image that already existed. Only local IO errors
/// materializing the build context propagate.
pub async fn ensure_image(
    runtime: &dyn ContainerRuntime,
    image: &ImageRef,
) -> Result<ImageStatus, DockerError> {
    if runtime.image_present(&image.tag).await == Presence::Present {
        info!(image = %image.tag, "Image already present");
        return Ok(ImageStatus::AlreadyPresent);
    }

    info!(image = %image.tag, "Building Docker image, this might take a while");

    let context = tempfile::tempdir()?;
    std::fs::write(context.path().join("Dockerfile"), image.dockerfile)?;

    match runtime.build_image(context.path(), &image.tag).await {
        Ok(()) => {
            info!(image = %image.tag, "Image built");
            Ok(ImageStatus::Built)
        }
        Err(e) => {
            warn!(image = %image.tag, error = %e, "Image build failed, continuing");
            Ok(ImageStatus::BuildFailed)
        }
    }
}
