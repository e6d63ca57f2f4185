//! Core types shared across procx crates
//!
//! This crate provides foundational types used by the command core, the
//! store and the logging facility:
//!
//! - **Correlation types**: InvocationId, OperationId, CorrelationContext
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{CorrelationContext, InvocationId, OperationId};
