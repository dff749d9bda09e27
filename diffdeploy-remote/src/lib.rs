mod client;
mod paths;

pub use client::{ErrorClass, RemoteClient, RemoteError, Resource, ResourceType};
pub use paths::resolve_remote_path;
