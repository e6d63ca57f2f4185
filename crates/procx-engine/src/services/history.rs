use procx_core::commands::ListOperationLogCmd;
use procx_core::errors::Result;
use procx_core::managers::OperationLogQuery;
use procx_core::model::OperationLogEntry;
use procx_core::Authentication;

use crate::engine::ProcessEngine;

/// Read access to the operation log
#[derive(Clone)]
pub struct HistoryService<'e> {
    engine: &'e ProcessEngine,
    authentication: Option<Authentication>,
}

impl<'e> HistoryService<'e> {
    pub(crate) fn new(engine: &'e ProcessEngine, authentication: Option<Authentication>) -> Self {
        Self {
            engine,
            authentication,
        }
    }

    pub fn as_user(&self, authentication: Authentication) -> Self {
        Self::new(self.engine, Some(authentication))
    }

    /// Matching entries, oldest first
    pub fn operation_log(&self, query: OperationLogQuery) -> Result<Vec<OperationLogEntry>> {
        self.engine.run(
            &ListOperationLogCmd::new(query),
            self.authentication.as_ref(),
        )
    }
}
