//! # Aetheliz Common Library
//!
//! Shared code for the Aetheliz services including:
//! - Common error and result types
//! - Bootstrap configuration loading and root folder resolution
//! - Topic fingerprinting (graph cache keys)
//! - Caller identity signatures and API error payloads

pub mod api;
pub mod config;
pub mod error;
pub mod fingerprint;

pub use error::{Error, Result};
pub use fingerprint::topic_fingerprint;
