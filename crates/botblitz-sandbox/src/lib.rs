pub mod artifacts;
pub mod client;
pub mod error;
pub mod runtime;
pub mod sandbox;

pub use client::{BotClient, HttpBotClient};
pub use error::SandboxError;
pub use runtime::{ContainerRuntime, ContainerSpec, DockerRuntime};
pub use sandbox::{BotDescriptor, BotSandbox, ContainerSandbox, SandboxSettings};
