use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::exchange::Job;

/// A FIFO of jobs shared by any number of client connections.
///
/// Jobs are cheap handles, so whoever pushes a job usually keeps a clone of it to
/// wait for its resolution.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Default::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, job: Job) {
        self.lock().push_back(job);
    }

    /// Puts a job back at the head of the queue, e.g. when the connection that
    /// took it closed before writing it.
    pub fn push_front(&self, job: Job) {
        self.lock().push_front(job);
    }

    pub fn pop(&self) -> Option<Job> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl FromIterator<Job> for JobQueue {
    fn from_iter<T: IntoIterator<Item = Job>>(iter: T) -> Self {
        Self { jobs: Mutex::new(iter.into_iter().collect()) }
    }
}
