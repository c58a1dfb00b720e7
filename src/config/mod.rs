//! Configuration root and the sources it can be loaded from.

mod env;
mod error;
mod memory;
mod root;
mod source;

pub use env::EnvSource;
pub use error::ConfigError;
pub use memory::MemorySource;
pub use root::Configuration;
pub use source::{ConfigEntry, ConfigSource};

/// Separator between segments of a configuration key, e.g. `MyAppSettings:IntSetting`.
pub const KEY_DELIMITER: char = ':';
