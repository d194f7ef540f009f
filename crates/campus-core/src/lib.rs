//! campus-core
//!
//! Shared domain types, the error enum, the embedding model boundary, the
//! text chunker and configuration loading for the campus retrieval engine.

pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
