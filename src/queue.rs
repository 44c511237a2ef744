//! Thread-safe queue of pending scraper jobs.
//!
//! A job names a scraper variant by `(module, class)`. The queue keeps
//! insertion order and refuses a second job for a module that is already
//! queued (module identities compare case-insensitively). Every operation
//! takes the single queue-wide lock for exactly one critical section, so
//! check-then-insert is atomic.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Identifies a scraper variant to instantiate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Module identity, also used as the unit's assigned name.
    pub module: String,
    /// Class identity within the module.
    pub class: String,
}

impl Job {
    pub fn new(module: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            class: class.into(),
        }
    }

    /// Case-insensitive comparison on the module identity.
    pub fn is_module(&self, module: &str) -> bool {
        self.module.to_lowercase() == module.to_lowercase()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.class)
    }
}

/// FIFO of jobs with unique module identities.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a queue from an ordered list, dropping later duplicates.
    pub fn from_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let queue = Self::new();
        for job in jobs {
            queue.enqueue(job.module, job.class);
        }
        queue
    }

    fn jobs(&self) -> MutexGuard<'_, VecDeque<Job>> {
        // A panicking holder cannot leave the deque half-modified, so the
        // data behind a poisoned lock is still consistent.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a job unless its module is already queued.
    ///
    /// Returns `true` if the job was added.
    pub fn enqueue(&self, module: impl Into<String>, class: impl Into<String>) -> bool {
        let job = Job::new(module, class);
        let mut jobs = self.jobs();
        if jobs.iter().any(|queued| queued.is_module(&job.module)) {
            return false;
        }
        jobs.push_back(job);
        true
    }

    /// Remove and return the head of the queue, or `None` when empty.
    pub fn dequeue(&self) -> Option<Job> {
        self.jobs().pop_front()
    }

    /// Remove every job for `module`. Returns how many were removed.
    pub fn delete(&self, module: &str) -> usize {
        let mut jobs = self.jobs();
        let before = jobs.len();
        jobs.retain(|job| !job.is_module(module));
        before - jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    /// Ordered copy of the queued jobs.
    pub fn snapshot(&self) -> Vec<Job> {
        self.jobs().iter().cloned().collect()
    }

    /// Replace the whole queue (used when a configuration is loaded).
    pub fn replace(&self, jobs: impl IntoIterator<Item = Job>) {
        let mut fresh: VecDeque<Job> = VecDeque::new();
        for job in jobs {
            if !fresh.iter().any(|queued| queued.is_module(&job.module)) {
                fresh.push_back(job);
            }
        }
        *self.jobs() = fresh;
    }

    /// Space-separated module names, as shown by the `config` command.
    pub fn module_names(&self) -> String {
        self.jobs()
            .iter()
            .map(|job| job.module.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_ignores_duplicate_module_in_any_case() {
        let queue = JobQueue::new();
        assert!(queue.enqueue("SiteA", "X"));
        assert!(!queue.enqueue("SiteA", "X"));
        assert!(!queue.enqueue("sitea", "Y"));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.snapshot(), vec![Job::new("SiteA", "X")]);
    }

    #[test]
    fn dequeue_is_fifo() {
        let queue = JobQueue::new();
        queue.enqueue("siteA", "ClassA");
        queue.enqueue("siteB", "ClassB");
        queue.enqueue("siteC", "ClassC");

        assert_eq!(queue.dequeue(), Some(Job::new("siteA", "ClassA")));
        assert_eq!(queue.dequeue(), Some(Job::new("siteB", "ClassB")));
        assert_eq!(queue.dequeue(), Some(Job::new("siteC", "ClassC")));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn dequeue_on_empty_returns_none() {
        let queue = JobQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue(), None);
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn delete_is_case_insensitive_and_keeps_order() {
        let queue = JobQueue::new();
        queue.enqueue("siteA", "A");
        queue.enqueue("SiteB", "B");
        queue.enqueue("siteC", "C");

        assert_eq!(queue.delete("SITEB"), 1);
        assert_eq!(queue.delete("missing"), 0);
        assert_eq!(
            queue.snapshot(),
            vec![Job::new("siteA", "A"), Job::new("siteC", "C")]
        );
    }

    #[test]
    fn module_can_be_requeued_after_dequeue() {
        let queue = JobQueue::new();
        queue.enqueue("siteA", "A");
        queue.dequeue();
        assert!(queue.enqueue("siteA", "A"));
    }

    #[test]
    fn replace_drops_duplicates() {
        let queue = JobQueue::new();
        queue.enqueue("old", "Old");
        queue.replace(vec![
            Job::new("a", "A"),
            Job::new("A", "Other"),
            Job::new("b", "B"),
        ]);
        assert_eq!(queue.snapshot(), vec![Job::new("a", "A"), Job::new("b", "B")]);
        assert_eq!(queue.module_names(), "a b");
    }
}
