use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{db_entity, SuspensionState};
use crate::persistence::EntityType;

/// An asynchronous unit of work picked up by the job executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,

    /// Optimistic-lock token; owned by the persistence layer
    #[serde(skip)]
    pub rev: i64,

    /// Selects the job handler that executes this job
    pub job_type: String,

    pub process_instance_id: Option<String>,

    /// Remaining execution attempts; 0 means the job is no longer acquired
    pub retries: i32,

    pub lock_owner: Option<String>,
    pub lock_expiration: Option<DateTime<Utc>>,

    pub due_date: Option<DateTime<Utc>>,

    pub suspension_state: SuspensionState,

    /// Message of the last failed execution
    pub exception_message: Option<String>,

    /// Handler configuration
    #[serde(default)]
    pub payload: Value,

    pub created_at: DateTime<Utc>,
}

db_entity!(Job, EntityType::Job);

impl Job {
    pub const DEFAULT_RETRIES: i32 = 3;

    pub fn new(job_type: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            rev: 0,
            job_type: job_type.into(),
            process_instance_id: None,
            retries: Self::DEFAULT_RETRIES,
            lock_owner: None,
            lock_expiration: None,
            due_date: None,
            suspension_state: SuspensionState::Active,
            exception_message: None,
            payload: Value::Null,
            created_at: now,
        }
    }

    /// Locked if some owner holds an unexpired lock
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_owner.is_some() && self.lock_expiration.map_or(false, |exp| exp > now)
    }

    /// Eligible for acquisition at `now`
    pub fn is_executable(&self, now: DateTime<Utc>) -> bool {
        self.retries > 0
            && !self.suspension_state.is_suspended()
            && !self.is_locked(now)
            && self.due_date.map_or(true, |due| due <= now)
    }

    pub fn lock(&mut self, owner: impl Into<String>, expiration: DateTime<Utc>) {
        self.lock_owner = Some(owner.into());
        self.lock_expiration = Some(expiration);
    }

    pub fn unlock(&mut self) {
        self.lock_owner = None;
        self.lock_expiration = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap()
    }

    #[test]
    fn test_lock_expires() {
        let mut job = Job::new("email", at(0));
        job.lock("worker-1", at(5));

        assert!(job.is_locked(at(4)));
        assert!(!job.is_locked(at(5)));
        assert!(job.is_executable(at(6)));
    }

    #[test]
    fn test_not_executable_without_retries_or_when_suspended() {
        let mut job = Job::new("email", at(0));
        job.retries = 0;
        assert!(!job.is_executable(at(1)));

        job.retries = 1;
        job.suspension_state = SuspensionState::Suspended;
        assert!(!job.is_executable(at(1)));
    }

    #[test]
    fn test_due_date_gates_execution() {
        let mut job = Job::new("timer", at(0));
        job.due_date = Some(at(0) + Duration::minutes(10));

        assert!(!job.is_executable(at(9)));
        assert!(job.is_executable(at(10)));
    }

    #[test]
    fn test_revision_not_serialized() {
        let mut job = Job::new("email", at(0));
        job.rev = 7;
        let value = serde_json::to_value(&job).unwrap();

        assert!(value.get("rev").is_none());
        let back: Job = serde_json::from_value(value).unwrap();
        assert_eq!(back.rev, 0);
    }
}
