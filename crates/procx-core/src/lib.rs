//! procx Core - command execution and transaction-retry kernel
//!
//! This crate runs discrete commands against shared, versioned state:
//! - Interceptor chain (retry, transaction, authorization, logging, context)
//! - Command context with an entity cache acting as unit of work
//! - Optimistic locking on flush with bounded whole-attempt retry
//! - Authorization checks against user and group grants
//! - Operation log written atomically with the changes it describes
//! - Command catalogue for jobs, tasks, process instances and variables
//!
//! Storage is reached through the [`persistence::SessionFactory`] trait; an
//! in-memory implementation ships with this crate.

pub mod authorization;
pub mod clock;
pub mod command;
pub mod commands;
pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod interceptor;
pub mod logging_facility;
pub mod managers;
pub mod model;
pub mod persistence;
pub mod state;

// Re-export commonly used types
pub use authorization::{Authentication, AuthorizationProvider, Permission, ResourceType};
pub use clock::{Clock, FixedClock, SystemClock};
pub use command::{Authorizable, Command, FnCommand, Loggable};
pub use config::{AuditVerbosity, ExecutorConfig, InterceptorKind, RetryBackoff};
pub use context::CommandContext;
pub use errors::{CommandError, ErrorKind, Result};
pub use executor::{CommandExecutor, CommandExecutorBuilder};
pub use persistence::{EntityType, InMemoryStore, PersistenceSession, SessionFactory};
pub use state::InvocationState;
