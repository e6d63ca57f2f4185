use std::sync::Arc;

use super::{CommandInterceptor, Invocation, Next, Output};
use crate::authorization::{check_all, AuthorizationProvider};
use crate::errors::Result;

/// Evaluates the command's declared permission checks before its body runs
///
/// A no-op when authorization is disabled or the invocation carries no
/// authentication (system calls).
pub struct AuthorizationInterceptor {
    provider: Arc<dyn AuthorizationProvider>,
    enabled: bool,
}

impl AuthorizationInterceptor {
    pub fn new(provider: Arc<dyn AuthorizationProvider>, enabled: bool) -> Self {
        Self { provider, enabled }
    }
}

impl CommandInterceptor for AuthorizationInterceptor {
    fn name(&self) -> &'static str {
        "authorization"
    }

    fn invoke(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Output> {
        if self.enabled {
            if let Some(authentication) = &invocation.authentication {
                let checks = invocation.command().required_permissions();
                check_all(self.provider.as_ref(), authentication, &checks)?;
            }
        }
        next.run(invocation)
    }
}
