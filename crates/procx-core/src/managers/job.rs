use chrono::{DateTime, Utc};

use crate::context::CommandContext;
use crate::errors::Result;
use crate::model::{Job, SuspensionState};
use crate::persistence::EntityQuery;

pub struct JobManager<'c> {
    ctx: &'c mut CommandContext,
}

impl<'c> JobManager<'c> {
    pub(crate) fn new(ctx: &'c mut CommandContext) -> Self {
        Self { ctx }
    }

    pub fn find_by_id(&mut self, id: &str) -> Result<Option<Job>> {
        self.ctx.find(id)
    }

    pub fn get(&mut self, id: &str) -> Result<Job> {
        self.ctx.get(id)
    }

    pub fn insert(&mut self, job: &Job) -> Result<()> {
        self.ctx.insert(job)
    }

    pub fn update(&mut self, job: &Job) -> Result<()> {
        self.ctx.update(job)
    }

    pub fn delete(&mut self, job: &Job) -> Result<()> {
        self.ctx.delete(job)
    }

    pub fn find_by_process_instance(&mut self, process_instance_id: &str) -> Result<Vec<Job>> {
        self.ctx.select_list(
            &EntityQuery::of::<Job>().filter("process_instance_id", process_instance_id),
        )
    }

    pub fn find_by_query(&mut self, query: &EntityQuery) -> Result<Vec<Job>> {
        self.ctx.select_list(query)
    }

    /// Up to `limit` jobs eligible for acquisition, earliest due first
    pub fn find_executable(&mut self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .ctx
            .select_list::<Job>(
                &EntityQuery::of::<Job>()
                    .filter("suspension_state", SuspensionState::Active.as_str()),
            )?
            .into_iter()
            .filter(|job| job.is_executable(now))
            .collect();
        jobs.sort_by(|a, b| {
            let due_a = a.due_date.unwrap_or(a.created_at);
            let due_b = b.due_date.unwrap_or(b.created_at);
            due_a.cmp(&due_b).then_with(|| a.id.cmp(&b.id))
        });
        jobs.truncate(limit);
        Ok(jobs)
    }
}
