//! Docker collaborators for the bootstrap pipeline.
//!
//! `client` defines the narrow container-runtime interface the pipeline
//! needs plus its bollard-backed implementation; `image` provisions the
//! custom Jenkins image and `container` drives the Jenkins container
//! toward `running`.

pub mod client;
pub mod container;
pub mod image;

pub use client::{BollardRuntime, ContainerRuntime, Presence};
pub use container::{ensure_running, ContainerRef, PortMapping};
pub use image::{ensure_image, ImageRef, ImageStatus};
