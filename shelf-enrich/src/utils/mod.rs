//! Utility modules shared by sources and the catalog store

pub mod db_retry;
pub mod retry;

pub use db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
pub use retry::{retry_with_delay, RetryPolicy};
