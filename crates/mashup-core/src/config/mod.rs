//! Configuration for mashup sessions
//!
//! - Generic YAML config loading/saving
//! - Default config location
//! - The session config (`MashupConfig`): tempo, channels, audio settings
//!
//! ```ignore
//! use mashup_core::config::{default_config_path, load_config, MashupConfig};
//!
//! let config: MashupConfig = load_config(&default_config_path());
//! config.validate()?;
//! ```

mod io;
mod mashup;
mod paths;

pub use io::{load_config, read_config, save_config};
pub use mashup::{AudioSettings, ChannelDefinition, MashupConfig};
pub use paths::{default_config_dir, default_config_path};
