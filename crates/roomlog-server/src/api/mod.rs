//! HTTP API module

pub mod health;
pub mod messages;
pub mod route;
