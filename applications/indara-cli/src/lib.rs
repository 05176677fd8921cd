/// Indara CLI - headless harness for the playback engine
pub mod config;
pub mod error;
pub mod file_storage;
pub mod session;
pub mod simulated;
pub mod tracks;

pub use config::AppConfig;
pub use error::{CliError, Result};
pub use session::Session;
