use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode, Version};
use tokio::sync::Notify;

use crate::protocol::ContractViolation;

/// How the entity of a job's request is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEntity {
    None,
    ContentLength,
    Chunked,
}

/// The resolution of a [`Job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Succeeded { status: StatusCode, body: Option<Bytes> },
    Failed(String),
}

impl JobState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, JobState::Pending)
    }
}

/// Correlates a request with its eventual response.
///
/// A job asks for `pattern` repeated `count` times, addressed as `/{pattern}x{count}`.
/// Exactly one producer resolves it, with [`Job::set_result`] or [`Job::fail`], while
/// any number of consumers may wait for it from threads ([`Job::wait`]) or tasks
/// ([`Job::completed`]).
#[derive(Debug, Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

#[derive(Debug)]
struct JobInner {
    pattern: String,
    count: usize,
    method: Method,
    version: Version,
    entity: JobEntity,
    expect_continue: bool,
    state: Mutex<JobState>,
    resolved: Condvar,
    notify: Notify,
}

impl Job {
    pub fn new<S: Into<String>>(pattern: S, count: usize) -> Self {
        Self::builder(pattern, count).build()
    }

    pub fn builder<S: Into<String>>(pattern: S, count: usize) -> JobBuilder {
        JobBuilder {
            pattern: pattern.into(),
            count,
            method: Method::GET,
            version: Version::HTTP_11,
            entity: JobEntity::None,
            expect_continue: false,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.inner.pattern
    }

    pub fn count(&self) -> usize {
        self.inner.count
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn version(&self) -> Version {
        self.inner.version
    }

    pub fn entity(&self) -> JobEntity {
        self.inner.entity
    }

    pub fn expect_continue(&self) -> bool {
        self.inner.expect_continue
    }

    pub fn uri(&self) -> String {
        format!("/{}x{}", self.inner.pattern, self.inner.count)
    }

    /// The entity the server is expected to answer with.
    pub fn expected(&self) -> String {
        self.inner.pattern.repeat(self.inner.count)
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, resolution: JobState) -> Result<(), ContractViolation> {
        let mut state = self.lock();
        if state.is_resolved() {
            return Err(ContractViolation::AlreadyResolved("job"));
        }
        *state = resolution;
        drop(state);

        self.inner.resolved.notify_all();
        self.inner.notify.notify_waiters();
        Ok(())
    }

    pub fn set_result(&self, status: StatusCode, body: Option<Bytes>) -> Result<(), ContractViolation> {
        self.resolve(JobState::Succeeded { status, body })
    }

    pub fn fail<S: Into<String>>(&self, reason: S) -> Result<(), ContractViolation> {
        self.resolve(JobState::Failed(reason.into()))
    }

    pub fn state(&self) -> JobState {
        self.lock().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.lock().is_resolved()
    }

    pub fn status(&self) -> Option<StatusCode> {
        match &*self.lock() {
            JobState::Succeeded { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The response entity as text, if the job succeeded with one.
    pub fn result(&self) -> Option<String> {
        match &*self.lock() {
            JobState::Succeeded { body: Some(body), .. } => Some(String::from_utf8_lossy(body).into_owned()),
            _ => None,
        }
    }

    pub fn failure_message(&self) -> Option<String> {
        match &*self.lock() {
            JobState::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Blocks the calling thread until the job is resolved.
    pub fn wait(&self) -> JobState {
        let mut state = self.lock();
        while !state.is_resolved() {
            state = self.inner.resolved.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.clone()
    }

    /// Like [`Job::wait`], giving up after `timeout` and returning `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobState> {
        let state = self.lock();
        let (state, _timeout) = self
            .inner
            .resolved
            .wait_timeout_while(state, timeout, |state| !state.is_resolved())
            .unwrap_or_else(PoisonError::into_inner);
        state.is_resolved().then(|| state.clone())
    }

    /// Waits asynchronously until the job is resolved.
    pub async fn completed(&self) -> JobState {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let state = self.state();
            if state.is_resolved() {
                return state;
            }
            notified.await;
        }
    }
}

#[derive(Debug)]
pub struct JobBuilder {
    pattern: String,
    count: usize,
    method: Method,
    version: Version,
    entity: JobEntity,
    expect_continue: bool,
}

impl JobBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Sends the expected entity along with the request, so the server can echo it.
    pub fn entity(mut self, entity: JobEntity) -> Self {
        self.entity = entity;
        self
    }

    pub fn expect_continue(mut self, expect_continue: bool) -> Self {
        self.expect_continue = expect_continue;
        self
    }

    pub fn build(self) -> Job {
        Job {
            inner: Arc::new(JobInner {
                pattern: self.pattern,
                count: self.count,
                method: self.method,
                version: self.version,
                entity: self.entity,
                expect_continue: self.expect_continue,
                state: Mutex::new(JobState::Pending),
                resolved: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }
}
