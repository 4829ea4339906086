//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Database operations (via sqlx)
//! - Shared types
//!
//! Each service wraps these with framework-specific extractors (Axum, etc.).

pub mod auth;
pub mod types;

pub use auth::{
    calculate_signature, initialize_shared_secret, load_shared_secret, now_millis,
    validate_signature, validate_timestamp, ApiAuthError, SIGNATURE_WINDOW_MS,
};
pub use types::ErrorResponse;
