use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use procx_core::model::Job;
use procx_core::persistence::{
    DbOperation, EntityQuery, EntityRow, EntityType, FlushResult, PersistenceSession,
    SessionFactory,
};
use procx_core::{CommandExecutor, ExecutorConfig, InMemoryStore, Result};

type Hook = Box<dyn FnOnce() + Send>;

/// Session factory over an [`InMemoryStore`] that counts what the chain does
/// and can run a hook right before the next flush reaches the store.
///
/// The hook simulates a competing transaction committing between an
/// attempt's load and its flush.
#[derive(Clone)]
#[allow(dead_code)]
pub struct CountingFactory {
    pub store: InMemoryStore,
    pub sessions: Arc<AtomicUsize>,
    pub flushes: Arc<AtomicUsize>,
    pub commits: Arc<AtomicUsize>,
    before_flush: Arc<Mutex<Option<Hook>>>,
}

#[allow(dead_code)]
impl CountingFactory {
    pub fn new(store: InMemoryStore) -> Self {
        Self {
            store,
            sessions: Arc::new(AtomicUsize::new(0)),
            flushes: Arc::new(AtomicUsize::new(0)),
            commits: Arc::new(AtomicUsize::new(0)),
            before_flush: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `hook` once, before the next flush of any session
    pub fn before_next_flush(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_flush.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl SessionFactory for CountingFactory {
    fn open_session(&self) -> Result<Box<dyn PersistenceSession>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSession {
            inner: self.store.open_session()?,
            counter: self.clone(),
        }))
    }
}

struct CountingSession {
    inner: Box<dyn PersistenceSession>,
    counter: CountingFactory,
}

impl PersistenceSession for CountingSession {
    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn select_by_id(&mut self, entity_type: EntityType, id: &str) -> Result<Option<EntityRow>> {
        self.inner.select_by_id(entity_type, id)
    }

    fn select_list(&mut self, query: &EntityQuery) -> Result<Vec<EntityRow>> {
        self.inner.select_list(query)
    }

    fn execute_operations(&mut self, ops: &[DbOperation]) -> Result<FlushResult> {
        let hook = self.counter.before_flush.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        self.counter.flushes.fetch_add(1, Ordering::SeqCst);
        self.inner.execute_operations(ops)
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()?;
        self.counter.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }
}

#[allow(dead_code)]
pub fn executor(factory: &CountingFactory, config: ExecutorConfig) -> CommandExecutor {
    CommandExecutor::builder(Arc::new(factory.clone()))
        .config(config)
        .build()
        .unwrap()
}

/// Seed a job directly at the given revision
#[allow(dead_code)]
pub fn seed_job(store: &InMemoryStore, id: &str, rev: i64, retries: i32) -> Job {
    let mut job = Job::new("email", Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
    job.id = id.to_string();
    job.rev = rev;
    job.retries = retries;
    store.seed_entity(&job).unwrap();
    job
}

#[allow(dead_code)]
pub fn stored_job(store: &InMemoryStore, id: &str) -> Job {
    store.get_entity(id).unwrap().unwrap()
}

#[allow(dead_code)]
pub fn audit_count(store: &InMemoryStore) -> usize {
    store.count(EntityType::OperationLog).unwrap()
}
