use std::future::Future;
use std::sync::{Arc, OnceLock};

use tokio::sync::Semaphore;

use crate::kernel::constants;

/// Bounded concurrency for descriptor analysis.
///
/// Discovery fans analysis tasks out onto the async runtime; the pool caps
/// how many run at once. The default, process-wide pool is created lazily
/// and sized by the `PLUGIN_MANAGER_MAX_THREADS` environment variable,
/// falling back to hardware concurrency when the variable is unset or
/// non-positive. Tasks are not interruptible mid-analysis; shutdown lets
/// in-flight tasks drain.
#[derive(Debug, Clone)]
pub struct AnalysisPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl AnalysisPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Pool sized from the environment.
    pub fn from_env() -> Self {
        let configured = std::env::var(constants::MAX_THREADS_ENV)
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let workers = if configured > 0 {
            configured as usize
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        };
        Self::new(workers)
    }

    /// The lazily-initialized process-wide default pool.
    pub fn shared() -> AnalysisPool {
        static SHARED: OnceLock<AnalysisPool> = OnceLock::new();
        SHARED.get_or_init(AnalysisPool::from_env).clone()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `task` once a worker slot is free.
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("analysis pool semaphore closed");
        task.await
    }
}
