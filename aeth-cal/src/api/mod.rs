//! HTTP API handlers for aeth-cal

pub mod architect;
pub mod auth;
pub mod health;
pub mod json;
pub mod probe;

pub use architect::architect_routes;
pub use auth::AuthenticatedUser;
pub use health::health_routes;
pub use json::ApiJson;
pub use probe::probe_routes;
