//! Container lifecycle management.
//!
//! Drives the named CI container toward `running` without ever moving it
//! backward: a running container is left alone, a stopped one is started,
//! a missing one is created from the provisioned image. Repeated calls are
//! idempotent.

use tracing::{info, warn};

use crate::docker::client::{ContainerRuntime, Presence};
use crate::docker::image::{ensure_image, ImageRef};
use crate::error::DockerError;

/// A host-to-container published port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Port published on the host.
    pub host: u16,
    /// Port inside the container.
    pub container: u16,
}

impl PortMapping {
    pub fn new(host: u16, container: u16) -> Self {
        Self { host, container }
    }
}

/// A named container and the ports it must publish.
#[derive(Debug, Clone)]
pub struct ContainerRef {
    /// Exact container name. Existence checks compare the full name, so
    /// `jenkins` never matches an unrelated `jenkins-old`.
    pub name: String,
    /// Ports published when the container is created.
    pub ports: Vec<PortMapping>,
}

/// Ensure the image exists and the named container is running.
///
/// Runtime failures along the way are absorbed and logged rather than
/// propagated: every step is an idempotent re-check, and the readiness
/// wait downstream is the authority on whether the service actually came
/// up. When an existence check is indeterminate, nothing is mutated.
pub async fn ensure_running(
    runtime: &dyn ContainerRuntime,
    container: &ContainerRef,
    image: &ImageRef,
) -> Result<(), DockerError> {
    ensure_image(runtime, image).await?;

    match runtime.container_present(&container.name).await {
        Presence::Present => match runtime.container_running(&container.name).await {
            Presence::Present => {
                info!(container = %container.name, "Container already running");
            }
            Presence::Absent => {
                info!(container = %container.name, "Container exists but is stopped, starting");
                if let Err(e) = runtime.start_container(&container.name).await {
                    warn!(container = %container.name, error = %e, "Start not confirmed");
                }
            }
            Presence::Indeterminate => {
                warn!(container = %container.name, "Could not confirm container state, leaving it alone");
            }
        },
        Presence::Absent => {
            info!(container = %container.name, image = %image.tag, "Creating container");
            if let Err(e) = runtime
                .run_container(&image.tag, &container.name, &container.ports)
                .await
            {
                warn!(container = %container.name, error = %e, "Container creation not confirmed");
            }
        }
        Presence::Indeterminate => {
            warn!(container = %container.name, "Could not confirm container existence, not creating");
        }
    }

    Ok(())
}
