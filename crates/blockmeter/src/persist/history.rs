//! Bounded bookkeeping of finished persistence jobs.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Retention limits for finished-job bookkeeping.
pub const DEFAULT_COMPLETED_LIMIT: usize = 100;
pub const DEFAULT_FAILED_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    pub id: u64,
    pub block_number: u64,
    pub attempts_used: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedJob {
    pub id: u64,
    pub block_number: u64,
    pub error: String,
}

/// Ring buffers of the most recently completed and failed jobs.
///
/// Keeps job bookkeeping bounded no matter how long the process runs;
/// older entries fall off the front. Shared by every worker.
#[derive(Debug)]
pub struct JobHistory {
    completed: Mutex<VecDeque<CompletedJob>>,
    failed: Mutex<VecDeque<FailedJob>>,
    completed_limit: usize,
    failed_limit: usize,
}

impl JobHistory {
    pub fn new(completed_limit: usize, failed_limit: usize) -> Self {
        Self {
            completed: Mutex::new(VecDeque::with_capacity(completed_limit)),
            failed: Mutex::new(VecDeque::with_capacity(failed_limit)),
            completed_limit,
            failed_limit,
        }
    }

    pub fn record_completed(&self, job: CompletedJob) {
        let mut completed = self.completed.lock();
        completed.push_back(job);
        while completed.len() > self.completed_limit {
            completed.pop_front();
        }
    }

    pub fn record_failed(&self, job: FailedJob) {
        let mut failed = self.failed.lock();
        failed.push_back(job);
        while failed.len() > self.failed_limit {
            failed.pop_front();
        }
    }

    /// Snapshot of retained completed jobs, oldest first.
    pub fn completed(&self) -> Vec<CompletedJob> {
        self.completed.lock().iter().cloned().collect()
    }

    /// Snapshot of retained failed jobs, oldest first.
    pub fn failed(&self) -> Vec<FailedJob> {
        self.failed.lock().iter().cloned().collect()
    }
}

impl Default for JobHistory {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETED_LIMIT, DEFAULT_FAILED_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_ring_is_bounded() {
        let history = JobHistory::new(3, 3);
        for id in 0..5u64 {
            history.record_completed(CompletedJob {
                id,
                block_number: id,
                attempts_used: 1,
            });
        }

        let retained: Vec<u64> = history.completed().iter().map(|job| job.id).collect();
        assert_eq!(retained, vec![2, 3, 4]);
    }

    #[test]
    fn failed_ring_is_bounded() {
        let history = JobHistory::new(3, 2);
        for id in 0..4u64 {
            history.record_failed(FailedJob {
                id,
                block_number: id,
                error: "store unavailable: connection refused".to_string(),
            });
        }

        let retained: Vec<u64> = history.failed().iter().map(|job| job.id).collect();
        assert_eq!(retained, vec![2, 3]);
    }

    #[test]
    fn default_limits() {
        let history = JobHistory::default();
        assert_eq!(history.completed_limit, DEFAULT_COMPLETED_LIMIT);
        assert_eq!(history.failed_limit, DEFAULT_FAILED_LIMIT);
    }
}
