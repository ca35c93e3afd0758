pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;
pub mod views;

pub use config::Config;
pub use error::{Result, ViewError};
pub use state::AppState;
