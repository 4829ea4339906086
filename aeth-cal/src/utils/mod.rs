//! Utility modules for aeth-cal

pub mod db_retry;
pub mod llm_json;

pub use db_retry::retry_on_lock;
pub use llm_json::{parse_structured, strip_code_fences};
