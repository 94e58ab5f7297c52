//! Roomlog Common - shared types for all Roomlog crates
//!
//! This crate provides:
//! - `Message`: the record every node appends to its local log
//! - `RoomlogError`: the error taxonomy shared by the log, export and aggregation layers

pub mod error;
pub mod model;

pub use error::{Result, RoomlogError};
pub use model::Message;
