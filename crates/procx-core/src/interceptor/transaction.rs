use std::sync::Arc;

use procx_core_types::schema::EVENT_ROLLBACK;

use super::{CommandInterceptor, Invocation, Next, Output};
use crate::errors::{CommandError, Result};
use crate::persistence::{PersistenceSession, SessionFactory};

/// Opens a session per attempt; commits on success, rolls back on any error
pub struct TransactionInterceptor {
    factory: Arc<dyn SessionFactory>,
}

impl TransactionInterceptor {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self { factory }
    }
}

fn rollback(
    session: &mut dyn PersistenceSession,
    invocation: &Invocation<'_>,
    cause: &CommandError,
) {
    tracing::debug!(
        component = module_path!(),
        op = invocation.operation(),
        event = EVENT_ROLLBACK,
        invocation_id = %invocation.correlation.invocation_id,
        attempt = invocation.correlation.attempt,
        err_code = cause.code(),
    );
    if let Err(err) = session.rollback() {
        tracing::warn!(
            component = module_path!(),
            op = invocation.operation(),
            error = %err,
            "rollback failed"
        );
    }
}

impl CommandInterceptor for TransactionInterceptor {
    fn name(&self) -> &'static str {
        "transaction"
    }

    fn invoke(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Output> {
        let mut session = self.factory.open_session()?;
        session.begin()?;
        invocation.attach_session(session);

        let result = next.run(invocation);

        let Some(mut session) = invocation.take_session() else {
            return result.and_then(|_| {
                Err(CommandError::internal(
                    "session was not handed back to the transaction stage",
                ))
            });
        };

        match result {
            Ok(output) => match session.commit() {
                Ok(()) => Ok(output),
                Err(err) => {
                    rollback(session.as_mut(), invocation, &err);
                    Err(err)
                }
            },
            Err(err) => {
                rollback(session.as_mut(), invocation, &err);
                Err(err)
            }
        }
    }
}
