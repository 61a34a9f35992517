//! Application services: content port, writings service, rendering capability.

pub mod content;
pub mod error;
pub mod render;
pub mod writings;
