//! Command executor configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{CommandError, Result};

/// Stages of the interceptor chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterceptorKind {
    Retry,
    Transaction,
    Authorization,
    Logging,
    Context,
}

impl InterceptorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterceptorKind::Retry => "retry",
            InterceptorKind::Transaction => "transaction",
            InterceptorKind::Authorization => "authorization",
            InterceptorKind::Logging => "logging",
            InterceptorKind::Context => "context",
        }
    }
}

impl fmt::Display for InterceptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterceptorKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "retry" => Ok(InterceptorKind::Retry),
            "transaction" => Ok(InterceptorKind::Transaction),
            "authorization" => Ok(InterceptorKind::Authorization),
            "logging" => Ok(InterceptorKind::Logging),
            "context" => Ok(InterceptorKind::Context),
            other => Err(CommandError::configuration(format!(
                "unknown interceptor '{other}'"
            ))),
        }
    }
}

/// Which operations are written to the operation log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditVerbosity {
    /// Nothing is logged
    Off,
    /// Only operations performed by an authenticated user
    #[default]
    Authenticated,
    /// Every operation, including system invocations
    Full,
}

impl FromStr for AuditVerbosity {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "off" => Ok(AuditVerbosity::Off),
            "authenticated" => Ok(AuditVerbosity::Authenticated),
            "full" => Ok(AuditVerbosity::Full),
            other => Err(CommandError::configuration(format!(
                "unknown audit verbosity '{other}'"
            ))),
        }
    }
}

/// Exponential backoff between retry attempts; zero disables sleeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryBackoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl RetryBackoff {
    /// Delay before the given retry (1 = first retry)
    pub fn delay_for(&self, retry: u32) -> Duration {
        if self.base_ms == 0 {
            return Duration::ZERO;
        }
        let exp = retry.saturating_sub(1).min(16);
        let delay = self.base_ms.saturating_mul(1u64 << exp);
        let capped = if self.max_ms > 0 {
            delay.min(self.max_ms)
        } else {
            delay
        };
        Duration::from_millis(capped)
    }
}

/// Command executor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Extra attempts after the first one on optimistic-lock conflict
    pub retry_budget: u32,
    pub retry_backoff: RetryBackoff,
    /// Outermost first
    pub interceptors: Vec<InterceptorKind>,
    pub authorization_enabled: bool,
    pub audit: AuditVerbosity,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            retry_backoff: RetryBackoff::default(),
            interceptors: Self::default_interceptors(),
            authorization_enabled: false,
            audit: AuditVerbosity::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn default_interceptors() -> Vec<InterceptorKind> {
        vec![
            InterceptorKind::Retry,
            InterceptorKind::Transaction,
            InterceptorKind::Authorization,
            InterceptorKind::Logging,
            InterceptorKind::Context,
        ]
    }

    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn with_authorization(mut self, enabled: bool) -> Self {
        self.authorization_enabled = enabled;
        self
    }

    pub fn with_audit(mut self, audit: AuditVerbosity) -> Self {
        self.audit = audit;
        self
    }

    /// Check the interceptor order
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `context` is missing or not last, if
    /// `transaction` is missing, if `retry` does not wrap `transaction`, or
    /// if a stage appears twice.
    pub fn validate(&self) -> Result<()> {
        let order = &self.interceptors;
        for (i, kind) in order.iter().enumerate() {
            if order[..i].contains(kind) {
                return Err(CommandError::configuration(format!(
                    "interceptor '{kind}' listed more than once"
                )));
            }
        }

        let position = |kind: InterceptorKind| order.iter().position(|k| *k == kind);

        match position(InterceptorKind::Context) {
            Some(i) if i + 1 == order.len() => {}
            Some(_) => {
                return Err(CommandError::configuration(
                    "interceptor 'context' must be the innermost stage",
                ))
            }
            None => {
                return Err(CommandError::configuration(
                    "interceptor chain requires a 'context' stage",
                ))
            }
        }

        let transaction = position(InterceptorKind::Transaction).ok_or_else(|| {
            CommandError::configuration("interceptor chain requires a 'transaction' stage")
        })?;

        if let Some(retry) = position(InterceptorKind::Retry) {
            if retry > transaction {
                return Err(CommandError::configuration(
                    "interceptor 'retry' must wrap 'transaction'",
                ));
            }
        }

        Ok(())
    }
}
