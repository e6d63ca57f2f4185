use crate::context::CommandContext;
use crate::errors::Result;
use crate::model::Task;
use crate::persistence::EntityQuery;

pub struct TaskManager<'c> {
    ctx: &'c mut CommandContext,
}

impl<'c> TaskManager<'c> {
    pub(crate) fn new(ctx: &'c mut CommandContext) -> Self {
        Self { ctx }
    }

    pub fn find_by_id(&mut self, id: &str) -> Result<Option<Task>> {
        self.ctx.find(id)
    }

    pub fn get(&mut self, id: &str) -> Result<Task> {
        self.ctx.get(id)
    }

    pub fn insert(&mut self, task: &Task) -> Result<()> {
        self.ctx.insert(task)
    }

    pub fn update(&mut self, task: &Task) -> Result<()> {
        self.ctx.update(task)
    }

    pub fn delete(&mut self, task: &Task) -> Result<()> {
        self.ctx.delete(task)
    }

    pub fn find_by_process_instance(&mut self, process_instance_id: &str) -> Result<Vec<Task>> {
        self.ctx.select_list(
            &EntityQuery::of::<Task>().filter("process_instance_id", process_instance_id),
        )
    }
}
