//! Command capability traits
//!
//! A command is an immutable description of work. It declares the
//! permissions it needs ([`Authorizable`]), names itself for logs and audit
//! ([`Loggable`]) and runs its body against a [`CommandContext`].

use std::any::Any;

use crate::authorization::PermissionCheck;
use crate::context::CommandContext;
use crate::errors::Result;

/// Permissions a command needs before its body runs
pub trait Authorizable {
    /// Derived from the command's parameters only; no entity is loaded yet
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        Vec::new()
    }
}

pub trait Loggable {
    /// Stable operation name used in logs
    fn operation_type(&self) -> &str;
}

/// A unit of work executed inside one transaction
///
/// The body may run several times when the executor retries after an
/// optimistic-lock conflict, so it must re-read everything it depends on
/// from the context.
pub trait Command: Authorizable + Loggable + Send + Sync {
    type Output: Send + 'static;

    /// # Errors
    ///
    /// Terminal errors (validation, not found, business rule) abort the
    /// invocation; optimistic-lock errors may cause a retry.
    fn execute(&self, ctx: &mut CommandContext) -> Result<Self::Output>;
}

/// Object-safe view of a command used inside the interceptor chain
pub trait DynCommand: Send + Sync {
    fn name(&self) -> &str;
    fn required_permissions(&self) -> Vec<PermissionCheck>;
    fn execute_boxed(&self, ctx: &mut CommandContext) -> Result<Box<dyn Any + Send>>;
}

impl<C: Command> DynCommand for C {
    fn name(&self) -> &str {
        self.operation_type()
    }

    fn required_permissions(&self) -> Vec<PermissionCheck> {
        self.authorization_checks()
    }

    fn execute_boxed(&self, ctx: &mut CommandContext) -> Result<Box<dyn Any + Send>> {
        let output = self.execute(ctx)?;
        Ok(Box::new(output))
    }
}

/// Ad-hoc command built from a closure
pub struct FnCommand<F> {
    name: String,
    checks: Vec<PermissionCheck>,
    body: F,
}

impl<F> FnCommand<F> {
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            checks: Vec::new(),
            body,
        }
    }

    pub fn with_check(mut self, check: PermissionCheck) -> Self {
        self.checks.push(check);
        self
    }
}

impl<F> Authorizable for FnCommand<F> {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        self.checks.clone()
    }
}

impl<F> Loggable for FnCommand<F> {
    fn operation_type(&self) -> &str {
        &self.name
    }
}

impl<F, T> Command for FnCommand<F>
where
    F: Fn(&mut CommandContext) -> Result<T> + Send + Sync,
    T: Send + 'static,
{
    type Output = T;

    fn execute(&self, ctx: &mut CommandContext) -> Result<T> {
        (self.body)(ctx)
    }
}
