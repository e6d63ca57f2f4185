//! Structured logging facility for procx
//!
//! - Single initialization point via `init(profile)`
//! - Structured command macros (`log_cmd_start!`, `log_cmd_end!`,
//!   `log_cmd_error!`, `log_cmd_retry!`)
//! - Test capture mode for deterministic assertions
//!
//! # Usage
//!
//! ```rust
//! use procx_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use procx_core_types::schema;
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
