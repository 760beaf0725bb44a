//! Built-in processes shipped with the service.

pub mod hello_world;
