//! Write-behind worker draining the persistence queue.

use crate::{
    persist::{
        JobHistory,
        PersistJob,
        PersistJobReceiver,
        history::{
            CompletedJob,
            FailedJob,
        },
    },
    store::BlockStore,
};
use metrics::counter;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{
    error,
    info,
    warn,
};

/// Consumes persistence jobs and upserts them into the durable store.
///
/// Any number of workers may share the same receiver; each job is delivered
/// to exactly one of them. A job that exhausts its attempts is logged,
/// recorded in the failed history, and dropped; nothing propagates back to
/// the caller that produced it.
#[derive(Debug)]
pub struct PersistWorker<S> {
    rx: PersistJobReceiver,
    store: Arc<S>,
    history: Arc<JobHistory>,
    cancel: CancellationToken,
}

impl<S: BlockStore> PersistWorker<S> {
    pub fn new(
        rx: PersistJobReceiver,
        store: Arc<S>,
        history: Arc<JobHistory>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rx,
            store,
            history,
            cancel,
        }
    }

    /// Runs until shutdown is signalled or every producer is gone.
    pub async fn run(self) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!(
                        target = "persist",
                        "Persistence worker received cancellation signal, shutting down..."
                    );
                    break;
                }
                job = self.rx.recv_async() => {
                    match job {
                        Ok(job) => self.process(job).await,
                        Err(_) => break,
                    }
                }
            }
        }
    }

    async fn process(&self, job: PersistJob) {
        let block_number = job.record.block_number;
        info!(
            target = "persist",
            job_id = job.id,
            block_number,
            "Processing block storage job"
        );

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.store.upsert(&job.record) {
                Ok(_) => {
                    counter!("blockmeter_persist_jobs_completed_total").increment(1);
                    info!(
                        target = "persist",
                        job_id = job.id,
                        block_number,
                        "Stored block data"
                    );
                    self.history.record_completed(CompletedJob {
                        id: job.id,
                        block_number,
                        attempts_used: attempt,
                    });
                    return;
                }
                Err(err) if attempt < job.attempts => {
                    counter!("blockmeter_persist_upsert_retries_total").increment(1);
                    let delay = job.backoff.delay(attempt - 1);
                    warn!(
                        target = "persist",
                        job_id = job.id,
                        block_number,
                        attempt,
                        delay = ?delay,
                        error = ?err,
                        "Upsert failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    counter!("blockmeter_persist_jobs_failed_total").increment(1);
                    error!(
                        target = "persist",
                        job_id = job.id,
                        block_number,
                        attempts = attempt,
                        error = ?err,
                        "Dropping persistence job after exhausting attempts"
                    );
                    self.history.record_failed(FailedJob {
                        id: job.id,
                        block_number,
                        error: err.to_string(),
                    });
                    return;
                }
            }
        }
    }
}

/// Spawns `count` workers over the shared receiver.
pub fn spawn_workers<S: BlockStore + 'static>(
    count: usize,
    rx: &PersistJobReceiver,
    store: &Arc<S>,
    history: &Arc<JobHistory>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|_| {
            let worker = PersistWorker::new(
                rx.clone(),
                Arc::clone(store),
                Arc::clone(history),
                cancel.clone(),
            );
            tokio::spawn(worker.run())
        })
        .collect()
}
