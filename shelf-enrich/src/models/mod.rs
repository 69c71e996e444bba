//! Data models for the enrichment service

pub mod batch_session;

pub use batch_session::{BatchSession, BatchState, SessionRegistry};
