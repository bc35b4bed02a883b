//! Memory-aware worker pool for CPU-bound work.
//!
//! OCR subprocess batches and page rasterization funnel through a single
//! process-wide [`ProcessPoolManager`]. Work runs on blocking workers behind
//! a semaphore whose width is derived from a memory budget: by default 75% of
//! the RAM available at construction, divided by the caller-declared
//! per-task memory footprint.

use crate::error::{KreuzbergError, Result};
use crate::types::DeviceInfo;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use sysinfo::System;
use tokio::sync::Semaphore;

/// Fraction of available RAM budgeted for pool work.
const DEFAULT_MEMORY_FRACTION: f64 = 0.75;
/// How long a submit waits for a worker slot before failing.
const WORKER_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Snapshot of host state and pool occupancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub cpu_count: usize,
    pub cpu_percent: f32,
    pub memory_total: u64,
    pub memory_available: u64,
    pub active_tasks: usize,
    pub max_processes: usize,
    pub memory_limit: u64,
}

pub struct ProcessPoolManager {
    max_processes: usize,
    max_memory_bytes: u64,
    active_tasks: AtomicUsize,
    shut_down: AtomicBool,
    /// Rebuilt whenever the memory-derived width changes or a worker dies.
    semaphore: Mutex<(usize, Arc<Semaphore>)>,
}

impl ProcessPoolManager {
    pub fn new(max_processes: Option<usize>, memory_limit_gb: Option<f64>) -> Self {
        let max_processes = max_processes.unwrap_or_else(num_cpus::get).max(1);

        let max_memory_bytes = match memory_limit_gb {
            Some(gb) => (gb * 1024.0 * 1024.0 * 1024.0) as u64,
            None => {
                let mut system = System::new();
                system.refresh_memory();
                (system.available_memory() as f64 * DEFAULT_MEMORY_FRACTION) as u64
            }
        };

        Self {
            max_processes,
            max_memory_bytes,
            active_tasks: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
            semaphore: Mutex::new((max_processes, Arc::new(Semaphore::new(max_processes)))),
        }
    }

    /// Worker count for a task with the given memory footprint, floor 1.
    pub fn optimal_workers(&self, task_memory_mb: f64) -> usize {
        let task_memory_bytes = (task_memory_mb * 1024.0 * 1024.0).max(1.0) as u64;
        let memory_based = ((self.max_memory_bytes / task_memory_bytes) as usize).max(1);
        self.max_processes.min(memory_based)
    }

    fn semaphore_for(&self, workers: usize) -> Arc<Semaphore> {
        let mut slot = self.semaphore.lock();
        if slot.0 != workers || slot.1.is_closed() {
            *slot = (workers, Arc::new(Semaphore::new(workers)));
        }
        Arc::clone(&slot.1)
    }

    async fn acquire_worker(&self, workers: usize) -> Result<tokio::sync::OwnedSemaphorePermit> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(KreuzbergError::resource("Worker pool has been shut down"));
        }

        let semaphore = self.semaphore_for(workers);
        match tokio::time::timeout(WORKER_ACQUIRE_TIMEOUT, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(KreuzbergError::resource("Worker pool has been shut down")),
            Err(_) => Err(KreuzbergError::resource(format!(
                "Timed out waiting {}s for a pool worker",
                WORKER_ACQUIRE_TIMEOUT.as_secs()
            ))),
        }
    }

    /// Run `f` on a blocking worker, awaiting its result.
    pub async fn submit_task<T, F>(&self, f: F, task_memory_mb: f64) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let workers = self.optimal_workers(task_memory_mb);
        let _permit = self.acquire_worker(workers).await?;

        self.active_tasks.fetch_add(1, Ordering::Relaxed);
        let outcome = tokio::task::spawn_blocking(f).await;
        self.active_tasks.fetch_sub(1, Ordering::Relaxed);

        match outcome {
            Ok(result) => result,
            Err(join_err) => {
                // A panicked worker leaves the pool structurally intact; the
                // semaphore is rebuilt on the next submit.
                self.semaphore.lock().1.close();
                Err(KreuzbergError::resource(format!("Pool worker panicked: {}", join_err)))
            }
        }
    }

    /// Parallel fan-out preserving input order; per-item errors are returned
    /// inline.
    pub async fn submit_batch<T, A, F>(
        &self,
        f: F,
        args: Vec<A>,
        task_memory_mb: f64,
        max_concurrent: Option<usize>,
    ) -> Vec<Result<T>>
    where
        T: Send + 'static,
        A: Send + 'static,
        F: Fn(A) -> Result<T> + Send + Sync + Clone + 'static,
    {
        if args.is_empty() {
            return Vec::new();
        }

        let workers = self.optimal_workers(task_memory_mb);
        let concurrency = max_concurrent.unwrap_or(workers).clamp(1, workers);
        let limiter = Arc::new(Semaphore::new(concurrency));

        let mut tasks = tokio::task::JoinSet::new();
        for (index, arg) in args.into_iter().enumerate() {
            let limiter = Arc::clone(&limiter);
            let f = f.clone();
            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await;
                let result = tokio::task::spawn_blocking(move || f(arg))
                    .await
                    .unwrap_or_else(|join_err| {
                        Err(KreuzbergError::resource(format!("Pool worker panicked: {}", join_err)))
                    });
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<T>>> = (0..tasks.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(join_err) => {
                    tracing::debug!("Batch task join failure: {}", join_err);
                }
            }
        }

        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(KreuzbergError::resource("Batch task vanished"))))
            .collect()
    }

    pub fn system_info(&self) -> SystemInfo {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_usage();

        SystemInfo {
            cpu_count: num_cpus::get(),
            cpu_percent: system.global_cpu_usage(),
            memory_total: system.total_memory(),
            memory_available: system.available_memory(),
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            max_processes: self.max_processes,
            memory_limit: self.max_memory_bytes,
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        let mut system = System::new();
        system.refresh_memory();
        DeviceInfo {
            device_type: "cpu".to_string(),
            device_id: None,
            memory_total_gb: Some(system.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0)),
            memory_available_gb: Some(system.available_memory() as f64 / (1024.0 * 1024.0 * 1024.0)),
            name: None,
        }
    }

    /// Idempotent shutdown. With `wait`, in-flight tasks drain first.
    pub async fn shutdown(&self, wait: bool) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if wait {
            while self.active_tasks.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
        self.semaphore.lock().1.close();
    }
}

/// Tie-break rules for sizing a fan-out.
///
/// 1 task → 1 worker; 2–3 tasks → one worker each (capped by cores); larger
/// batches use every core for CPU-intensive work, or up to twice the cores
/// for IO-leaning work.
pub fn optimal_worker_count(num_tasks: usize, cpu_intensive: bool) -> usize {
    let cpu_count = num_cpus::get();

    if num_tasks == 1 {
        return 1;
    }
    if num_tasks <= 3 {
        return num_tasks.min(cpu_count);
    }
    if cpu_intensive {
        return cpu_count;
    }
    (cpu_count * 2).min(cpu_count.max(num_tasks))
}

static GLOBAL_POOL: Lazy<ProcessPoolManager> = Lazy::new(|| ProcessPoolManager::new(None, None));

/// The process-wide pool instance shared by OCR and rasterization.
pub fn get_process_pool() -> &'static ProcessPoolManager {
    &GLOBAL_POOL
}

/// Tear down the global pool.
pub async fn shutdown_process_pool(wait: bool) {
    GLOBAL_POOL.shutdown(wait).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimal_worker_count_rules() {
        let cores = num_cpus::get();
        assert_eq!(optimal_worker_count(1, true), 1);
        assert_eq!(optimal_worker_count(2, true), 2.min(cores));
        assert_eq!(optimal_worker_count(3, false), 3.min(cores));
        assert_eq!(optimal_worker_count(100, true), cores);
        assert_eq!(optimal_worker_count(100, false), (cores * 2).min(cores.max(100)));
    }

    #[test]
    fn test_memory_based_sizing() {
        let pool = ProcessPoolManager::new(Some(8), Some(1.0));
        // 1 GiB budget, 512 MiB tasks: two workers.
        assert_eq!(pool.optimal_workers(512.0), 2);
        // Huge tasks floor at one worker.
        assert_eq!(pool.optimal_workers(1024.0 * 64.0), 1);
        // Tiny tasks cap at max_processes.
        assert_eq!(pool.optimal_workers(1.0), 8);
    }

    #[tokio::test]
    async fn test_submit_task() {
        let pool = ProcessPoolManager::new(Some(2), Some(1.0));
        let result = pool.submit_task(|| Ok(21 * 2), 10.0).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_submit_batch_preserves_order() {
        let pool = ProcessPoolManager::new(Some(4), Some(1.0));
        let args: Vec<usize> = (0..20).collect();
        let results = pool.submit_batch(|n| Ok(n * 2), args, 10.0, Some(3)).await;

        assert_eq!(results.len(), 20);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(*result.as_ref().unwrap(), i * 2);
        }
    }

    #[tokio::test]
    async fn test_submit_batch_inline_errors() {
        let pool = ProcessPoolManager::new(Some(2), Some(1.0));
        let results = pool
            .submit_batch(
                |n: usize| {
                    if n == 1 {
                        Err(KreuzbergError::validation("odd one out"))
                    } else {
                        Ok(n)
                    }
                },
                vec![0, 1, 2],
                10.0,
                None,
            )
            .await;

        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_rejects_new_work() {
        let pool = ProcessPoolManager::new(Some(2), Some(1.0));
        pool.shutdown(true).await;
        pool.shutdown(true).await;

        let result = pool.submit_task(|| Ok(()), 10.0).await;
        assert!(matches!(result, Err(KreuzbergError::Resource { .. })));
    }

    #[test]
    fn test_system_info_shape() {
        let pool = ProcessPoolManager::new(Some(2), Some(1.0));
        let info = pool.system_info();
        assert!(info.cpu_count >= 1);
        assert_eq!(info.max_processes, 2);
        assert_eq!(info.memory_limit, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_device_info_is_cpu() {
        let pool = ProcessPoolManager::new(None, None);
        let device = pool.device_info();
        assert_eq!(device.device_type, "cpu");
        assert!(device.memory_total_gb.unwrap_or(0.0) > 0.0);
    }
}
