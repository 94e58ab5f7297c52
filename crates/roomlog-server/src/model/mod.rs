//! Data models module
//!
//! - `config` - CLI and layered configuration loading
//! - `app_state` - Application state shared across handlers

pub mod app_state;
pub mod config;

pub use app_state::AppState;
pub use config::{Cli, legacy_overrides, load_configuration};
