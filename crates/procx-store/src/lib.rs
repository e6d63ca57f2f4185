//! procx Store - SQLite persistence for the command core
//!
//! Provides:
//! - Connection management (WAL, busy timeout)
//! - Embedded migrations with SHA-256 checksums
//! - `SqliteSessionFactory`: one connection and transaction per attempt,
//!   revision-checked writes
//! - `SqliteGrants`: authorization provider over the grant table

pub mod db;
pub mod errors;
pub mod grants;
pub mod migrations;
pub mod session;

// Re-export key types
pub use errors::Result;
pub use grants::SqliteGrants;
pub use session::{SqliteSession, SqliteSessionFactory};
