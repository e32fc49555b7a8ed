//! Single-consumer job queue.
//!
//! Every browse and download operation goes through one [`TaskEngine`],
//! which runs jobs strictly one at a time in submission order. Nothing in
//! the crawlers or the downloader is built for concurrent use; this queue
//! is what guarantees they never see it.

use crate::ftp::error::{FtpError, FtpResult};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Serial executor for long-running operations.
pub struct TaskEngine {
    tx: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl TaskEngine {
    /// Spawn the worker task on the current tokio runtime.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));
        let counter = pending.clone();
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }
            log::debug!("Task engine stopped");
        });
        Self { tx, pending, worker }
    }

    /// Queue a job without waiting for it.
    pub fn submit<F>(&self, job: F) -> FtpResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(Box::pin(job)).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            FtpError::cancelled("Task engine has stopped")
        })
    }

    /// Queue a job and wait for its result.
    pub async fn run<F, T>(&self, job: F) -> FtpResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(async move {
            let _ = done_tx.send(job.await);
        })?;
        done_rx
            .await
            .map_err(|_| FtpError::cancelled("Job was dropped before completing"))
    }

    /// A job is queued or executing.
    pub fn is_operation_running(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    /// Finish queued jobs, then stop the worker.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            log::warn!("Task engine worker ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn jobs_run_one_at_a_time_in_order() {
        let engine = TaskEngine::start();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            engine
                .submit(async move {
                    log.lock().unwrap().push(format!("start {}", i));
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    log.lock().unwrap().push(format!("end {}", i));
                })
                .unwrap();
        }
        engine.shutdown().await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["start 0", "end 0", "start 1", "end 1", "start 2", "end 2"]
        );
    }

    #[tokio::test]
    async fn run_returns_the_job_result() {
        let engine = TaskEngine::start();
        assert_eq!(engine.run(async { 40 + 2 }).await.unwrap(), 42);
        assert!(!engine.is_operation_running());
    }

    #[tokio::test]
    async fn reports_running_while_a_job_is_in_flight() {
        let engine = TaskEngine::start();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        engine
            .submit(async move {
                let _ = release_rx.await;
            })
            .unwrap();
        assert!(engine.is_operation_running());

        release_tx.send(()).unwrap();
        engine.run(async {}).await.unwrap();
        assert!(!engine.is_operation_running());
    }
}
