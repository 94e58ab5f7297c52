//! Roomlog API - wire and HTTP definitions
//!
//! This crate provides:
//! - The `LogExport` gRPC service (generated from `proto/roomlog.proto`)
//! - HTTP request/response models for the ingest and read endpoints
//! - Input validation for ingested messages

pub mod grpc;
pub mod model;
pub mod validation;

pub use model::*;
