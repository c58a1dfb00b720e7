pub mod config;
pub mod container;
pub mod context;
mod error;
pub mod logging;
pub mod settings;

pub use config::{ConfigError, Configuration};
pub use container::{Container, Lifetime};
pub use context::AppContext;
pub use error::Error;
pub use settings::{bind, bind_required, Settings};
