use crate::context::CommandContext;
use crate::errors::Result;
use crate::model::Execution;

pub struct ExecutionManager<'c> {
    ctx: &'c mut CommandContext,
}

impl<'c> ExecutionManager<'c> {
    pub(crate) fn new(ctx: &'c mut CommandContext) -> Self {
        Self { ctx }
    }

    pub fn find_by_id(&mut self, id: &str) -> Result<Option<Execution>> {
        self.ctx.find(id)
    }

    pub fn get(&mut self, id: &str) -> Result<Execution> {
        self.ctx.get(id)
    }

    pub fn insert(&mut self, execution: &Execution) -> Result<()> {
        self.ctx.insert(execution)
    }

    pub fn update(&mut self, execution: &Execution) -> Result<()> {
        self.ctx.update(execution)
    }

    pub fn delete(&mut self, execution: &Execution) -> Result<()> {
        self.ctx.delete(execution)
    }
}
