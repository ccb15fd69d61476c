//! Container-runtime interface and its bollard-backed implementation.
//!
//! The pipeline only needs six operations from the runtime; they are
//! captured in [`ContainerRuntime`] so the lifecycle stages can be unit
//! tested against a scripted runtime.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    StartContainerOptions,
};
use bollard::image::BuildImageOptions;
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::StreamExt;
use tar::Builder as TarBuilder;
use tracing::{debug, trace, warn};

use crate::docker::container::PortMapping;
use crate::error::DockerError;

/// Outcome of an existence check against the runtime.
///
/// A failed runtime call is indistinguishable from "not found" with the
/// Docker API's error surface, so checks report `Indeterminate` instead of
/// guessing; each caller decides whether that means "treat as absent" or
/// "leave the world alone".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The object was positively observed.
    Present,
    /// The runtime answered and the object is not there.
    Absent,
    /// The runtime call failed; nothing was confirmed either way.
    Indeterminate,
}

/// The container-runtime operations the bootstrap pipeline depends on.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether an image with the given tag exists locally.
    async fn image_present(&self, tag: &str) -> Presence;

    /// Build an image from the given context directory and tag it.
    async fn build_image(&self, context_dir: &Path, tag: &str) -> Result<(), DockerError>;

    /// Whether a container with exactly the given name exists (any state).
    async fn container_present(&self, name: &str) -> Presence;

    /// Whether the named container is currently running.
    async fn container_running(&self, name: &str) -> Presence;

    /// Start an existing, stopped container.
    async fn start_container(&self, name: &str) -> Result<(), DockerError>;

    /// Create and start a new container from `image` with the given
    /// published ports.
    async fn run_container(
        &self,
        image: &str,
        name: &str,
        ports: &[PortMapping],
    ) -> Result<(), DockerError>;
}

/// Whether a listing entry's names contain an exact match for `name`.
///
/// The daemon reports names with a leading slash, and its name filter is a
/// substring match: without the exact comparison, "jenkins" would also
/// match an unrelated "jenkins-old".
fn name_matches_exactly(names: &[String], name: &str) -> bool {
    let wanted = format!("/{name}");
    names.iter().any(|n| n == &wanted)
}

/// Container runtime backed by the local Docker daemon via bollard.
pub struct BollardRuntime {
    docker: Docker,
}

impl BollardRuntime {
    /// Connect to the local Docker daemon.
    ///
    /// # Errors
    ///
    /// Returns `DockerError::DaemonUnavailable` if the daemon is not
    /// accessible.
    pub fn new() -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DockerError::DaemonUnavailable(format!("Failed to connect: {e}")))?;

        Ok(Self { docker })
    }

    /// Wrap an existing bollard handle.
    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }

    /// Tar and gzip a build context directory into an in-memory archive.
    fn pack_context(context_dir: &Path) -> Result<Vec<u8>, DockerError> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut tar = TarBuilder::new(encoder);
        tar.append_dir_all(".", context_dir)
            .map_err(|e| DockerError::ContextFailed(format!("Failed to tar context: {e}")))?;
        let encoder = tar
            .into_inner()
            .map_err(|e| DockerError::ContextFailed(format!("Failed to finish archive: {e}")))?;
        encoder
            .finish()
            .map_err(|e| DockerError::ContextFailed(format!("Failed to compress context: {e}")))
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn image_present(&self, tag: &str) -> Presence {
        match self.docker.inspect_image(tag).await {
            Ok(_) => Presence::Present,
            Err(e) => {
                // "No such image" and transient daemon errors look alike
                // here; the provisioner treats both as absent.
                debug!(image = tag, error = %e, "Image inspect failed");
                if e.to_string().contains("No such image") {
                    Presence::Absent
                } else {
                    Presence::Indeterminate
                }
            }
        }
    }

    async fn build_image(&self, context_dir: &Path, tag: &str) -> Result<(), DockerError> {
        let archive = Self::pack_context(context_dir)?;

        let options = BuildImageOptions {
            dockerfile: "Dockerfile",
            t: tag,
            rm: true,
            ..Default::default()
        };

        let mut stream = self.docker.build_image(options, None, Some(archive.into()));

        while let Some(update) = stream.next().await {
            match update {
                Ok(info) => {
                    if let Some(line) = info.stream {
                        let line = line.trim_end();
                        if !line.is_empty() {
                            trace!(target: "docker_build", "{line}");
                        }
                    }
                    if let Some(detail) = info.error {
                        return Err(DockerError::BuildFailed(detail));
                    }
                }
                Err(e) => return Err(DockerError::BuildFailed(e.to_string())),
            }
        }

        Ok(())
    }

    async fn container_present(&self, name: &str) -> Presence {
        let options = ListContainersOptions {
            all: true,
            filters: HashMap::from([("name".to_string(), vec![name.to_string()])]),
            ..Default::default()
        };

        match self.docker.list_containers(Some(options)).await {
            Ok(containers) => {
                let found = containers.iter().any(|c| {
                    name_matches_exactly(c.names.as_deref().unwrap_or_default(), name)
                });
                if found {
                    Presence::Present
                } else {
                    Presence::Absent
                }
            }
            Err(e) => {
                warn!(container = name, error = %e, "Container listing failed");
                Presence::Indeterminate
            }
        }
    }

    async fn container_running(&self, name: &str) -> Presence {
        match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => {
                let running = info.state.and_then(|s| s.running).unwrap_or(false);
                if running {
                    Presence::Present
                } else {
                    Presence::Absent
                }
            }
            Err(e) => {
                warn!(container = name, error = %e, "Container inspect failed");
                Presence::Indeterminate
            }
        }
    }

    async fn start_container(&self, name: &str) -> Result<(), DockerError> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| DockerError::RunFailed(format!("Failed to start container: {e}")))
    }

    async fn run_container(
        &self,
        image: &str,
        name: &str,
        ports: &[PortMapping],
    ) -> Result<(), DockerError> {
        let mut port_bindings = HashMap::new();
        let mut exposed_ports = HashMap::new();
        for mapping in ports {
            let key = format!("{}/tcp", mapping.container);
            port_bindings.insert(
                key.clone(),
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(mapping.host.to_string()),
                }]),
            );
            exposed_ports.insert(key, HashMap::new());
        }

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            ..Default::default()
        };

        let container_config = Config {
            image: Some(image.to_string()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), container_config)
            .await
            .map_err(|e| DockerError::RunFailed(format!("Failed to create container: {e}")))?;

        self.start_container(name).await
    }
}
