use crate::authorization::{Permission, PermissionCheck, ResourceType, ANY};
use crate::command::{Authorizable, Command, Loggable};
use crate::context::CommandContext;
use crate::errors::Result;
use crate::managers::OperationLogQuery;
use crate::model::OperationLogEntry;

/// Read committed audit entries, oldest first
#[derive(Debug, Clone, Default)]
pub struct ListOperationLogCmd {
    pub query: OperationLogQuery,
}

impl ListOperationLogCmd {
    pub fn new(query: OperationLogQuery) -> Self {
        Self { query }
    }
}

impl Authorizable for ListOperationLogCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(
            Permission::Read,
            ResourceType::OperationLog,
            ANY,
        )]
    }
}

impl Loggable for ListOperationLogCmd {
    fn operation_type(&self) -> &str {
        "ListOperationLog"
    }
}

impl Command for ListOperationLogCmd {
    type Output = Vec<OperationLogEntry>;

    fn execute(&self, ctx: &mut CommandContext) -> Result<Vec<OperationLogEntry>> {
        ctx.operation_log().list(&self.query)
    }
}
