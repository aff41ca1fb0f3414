//! Server module for Seatwatch
//!
//! Contains configuration and process wiring.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Startup configuration checks
//! - `init`: Task wiring and the run loop

mod background_tasks;
mod channel_starters;
pub mod config;
mod init;
mod loader;
mod validation;

pub use config::{AppConfig, LogFormat};
pub use init::run;
pub use loader::load_config;
pub use validation::validate_config;
