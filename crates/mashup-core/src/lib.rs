//! Mashup Core - beat-synchronized multi-stem mashup engine

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod loader;
pub mod types;

pub use error::{ErrorKind, MashupError, MashupResult};
pub use types::*;
