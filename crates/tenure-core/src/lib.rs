//! Core types and trait definitions for the tenure roster lifecycle engine.
//!
//! This crate is deliberately free of database dependencies. The backend
//! crate (`tenure-store-sqlite`) and the orchestration crate
//! (`tenure-engine`) both depend on it; it depends on nothing proprietary.

pub mod clock;
pub mod entity;
pub mod error;
pub mod period;
pub mod status;
pub mod store;

pub use error::{Error, Result};
