//! Parallel execution of independent, indexed tasks
//!
//! A probabilistic sensitivity analysis evaluates the same model once per
//! parameter draw. Each evaluation reads only its own inputs and writes only
//! its own outputs, so the runs can be spread across worker threads without
//! locking. This crate provides the runner used for that.
//!
//! # Example: Running 100 independent tasks
//!
//! ```rust
//! use runner::{ParallelRunner, simple_progress_reporter};
//!
//! let results = ParallelRunner::new(100, |task_id| Ok::<usize, String>(task_id * 2))
//!     .progress(simple_progress_reporter(10))
//!     .num_threads(4)
//!     .run();
//!
//! for (id, result) in results.iter().enumerate() {
//!     match result {
//!         Ok(value) => assert_eq!(*value, id * 2),
//!         Err(e) => eprintln!("Task {} failed: {}", id, e),
//!     }
//! }
//! ```
//!
//! # Determinism
//!
//! Results are returned in task_id order regardless of thread count or
//! scheduling. Tasks must not share mutable state; anything random has to be
//! drawn before the runner starts (or derived from `task_id`).
//!
//! # Error Handling
//!
//! A task that returns `Err(e)` is reported as `RunError::Failed(e)`. A task
//! that panics is caught and reported as `RunError::Panicked(message)`. The
//! remaining tasks run to completion either way; use [`into_ordered`] to turn
//! the result list into the first failure by task_id.

use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Why a single task did not produce a value
#[derive(Debug, Clone, PartialEq)]
pub enum RunError<E> {
    /// The task returned an error
    Failed(E),
    /// The task panicked; the payload message is preserved
    Panicked(String),
}

impl<E: fmt::Display> fmt::Display for RunError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Failed(e) => write!(f, "{}", e),
            RunError::Panicked(msg) => write!(f, "task panicked: {}", msg),
        }
    }
}

impl<E> std::error::Error for RunError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Failed(e) => Some(e),
            RunError::Panicked(_) => None,
        }
    }
}

/// Executes indexed tasks in parallel
///
/// Generic over:
/// - `S`: Value produced by a successful task
/// - `E`: Error produced by a failed task
/// - `F`: Task function type
///
/// # Type Bounds
///
/// The task function `F` must be:
/// - `Fn(usize) -> Result<S, E>`: Takes task_id, returns the task's outcome
/// - `Send + Sync`: Safe to call from multiple threads
///
/// # Example
///
/// ```rust
/// use runner::ParallelRunner;
///
/// let results = ParallelRunner::new(50, |task_id| Ok::<usize, String>(task_id))
///     .num_threads(2)
///     .run();
///
/// assert_eq!(results.len(), 50);
/// ```
pub struct ParallelRunner<S, E, F>
where
    F: Fn(usize) -> Result<S, E> + Send + Sync,
    S: Send,
    E: Send,
{
    num_tasks: usize,
    task: F,
    num_threads: Option<usize>,
    progress_callback: Option<Arc<dyn Fn(usize, usize) + Send + Sync>>,
}

impl<S, E, F> ParallelRunner<S, E, F>
where
    F: Fn(usize) -> Result<S, E> + Send + Sync,
    S: Send,
    E: Send,
{
    /// Create a new parallel runner
    ///
    /// # Arguments
    ///
    /// * `num_tasks` - Number of independent tasks to run
    /// * `task` - Closure that evaluates the task with the given task_id
    pub fn new(num_tasks: usize, task: F) -> Self {
        ParallelRunner {
            num_tasks,
            task,
            num_threads: None,
            progress_callback: None,
        }
    }

    /// Set number of threads (defaults to rayon's global pool)
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Set progress callback (called after each task completes)
    ///
    /// The callback receives `(completed_count, total_count)`. Completion
    /// order is not task order, so only the count is meaningful.
    pub fn progress<P>(mut self, callback: P) -> Self
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Execute all tasks and return results in task_id order
    ///
    /// If a dedicated pool of the requested size cannot be built, the tasks
    /// run on rayon's global pool instead.
    pub fn run(self) -> Vec<Result<S, RunError<E>>> {
        let progress_counter = Arc::new(AtomicUsize::new(0));

        let pool = self.num_threads.and_then(|n| {
            match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(threads = n, error = %e, "falling back to global thread pool");
                    None
                }
            }
        });

        let execute = || {
            (0..self.num_tasks)
                .into_par_iter()
                .map(|task_id| {
                    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        (self.task)(task_id)
                    }));

                    let completed = progress_counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(completed, self.num_tasks);
                    }

                    match outcome {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => Err(RunError::Failed(e)),
                        Err(panic) => Err(RunError::Panicked(panic_message(panic.as_ref()))),
                    }
                })
                .collect()
        };

        if let Some(pool) = pool {
            pool.install(execute)
        } else {
            execute()
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Run tasks in parallel with simple API
///
/// For more control (thread count, progress reporting), use `ParallelRunner`.
///
/// ```rust
/// use runner::run_parallel;
///
/// let results = run_parallel(100, |task_id| Ok::<u64, String>(task_id as u64));
/// assert_eq!(results.len(), 100);
/// ```
pub fn run_parallel<S, E, F>(num_tasks: usize, task: F) -> Vec<Result<S, RunError<E>>>
where
    F: Fn(usize) -> Result<S, E> + Send + Sync,
    S: Send,
    E: Send,
{
    ParallelRunner::new(num_tasks, task).run()
}

/// Unwrap ordered results, or return the lowest task_id that failed
///
/// ```rust
/// use runner::{into_ordered, run_parallel, RunError};
///
/// let results = run_parallel(10, |task_id| {
///     if task_id % 4 == 3 { Err(format!("bad {}", task_id)) } else { Ok(task_id) }
/// });
/// let (failed_id, error) = into_ordered(results).unwrap_err();
/// assert_eq!(failed_id, 3);
/// assert_eq!(error, RunError::Failed("bad 3".to_string()));
/// ```
pub fn into_ordered<S, E>(
    results: Vec<Result<S, RunError<E>>>,
) -> Result<Vec<S>, (usize, RunError<E>)> {
    let mut values = Vec::with_capacity(results.len());
    for (task_id, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => values.push(value),
            Err(e) => return Err((task_id, e)),
        }
    }
    Ok(values)
}

/// Pre-built progress reporter for common use case
///
/// Emits an `info` event every `interval` completed tasks and on the last.
pub fn simple_progress_reporter(interval: usize) -> impl Fn(usize, usize) + Send + Sync {
    let interval = interval.max(1);
    move |completed, total| {
        if completed % interval == 0 || completed == total {
            info!(completed, total, "progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_basic() {
        let results = run_parallel(10, |task_id| Ok::<usize, String>(task_id * 3));

        assert_eq!(results.len(), 10);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap(), &(i * 3));
        }
    }

    #[test]
    fn test_parallel_determinism() {
        let task = |task_id: usize| Ok::<f64, String>((task_id as f64).sqrt());

        let run1 = ParallelRunner::new(20, task).num_threads(1).run();
        let run2 = ParallelRunner::new(20, task).num_threads(4).run();

        assert_eq!(run1, run2);
    }

    #[test]
    fn test_failed_tasks_reported_in_place() {
        let results = run_parallel(10, |task_id| {
            if task_id == 5 {
                Err("bad input".to_string())
            } else {
                Ok(task_id)
            }
        });

        assert_eq!(results.len(), 10);
        assert_eq!(results[5], Err(RunError::Failed("bad input".to_string())));
        for (i, result) in results.iter().enumerate() {
            if i != 5 {
                assert!(result.is_ok());
            }
        }
    }

    #[test]
    fn test_parallel_panic_isolation() {
        let results = run_parallel(10, |task_id| {
            if task_id == 7 {
                panic!("Test panic");
            }
            Ok::<usize, String>(task_id)
        });

        assert_eq!(results[7], Err(RunError::Panicked("Test panic".to_string())));
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 9);
    }

    #[test]
    fn test_parallel_progress_callback() {
        use std::sync::Mutex;
        let completed = Arc::new(Mutex::new(0));
        let completed_clone = completed.clone();

        ParallelRunner::new(5, |task_id| Ok::<usize, String>(task_id))
            .progress(move |count, _total| {
                let mut last = completed_clone.lock().unwrap();
                *last = (*last).max(count);
            })
            .run();

        assert_eq!(*completed.lock().unwrap(), 5);
    }

    #[test]
    fn test_into_ordered_returns_lowest_failure() {
        let results = run_parallel(30, |task_id| {
            if task_id == 12 || task_id == 25 {
                Err(task_id)
            } else {
                Ok(task_id)
            }
        });

        let (task_id, error) = into_ordered(results).unwrap_err();
        assert_eq!(task_id, 12);
        assert_eq!(error, RunError::Failed(12));
    }

    #[test]
    fn test_into_ordered_success() {
        let results = run_parallel(4, |task_id| Ok::<usize, String>(task_id + 1));
        assert_eq!(into_ordered(results).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_empty_tasks() {
        let results = run_parallel(0, |task_id| Ok::<usize, String>(task_id));
        assert!(results.is_empty());
    }

    #[test]
    fn test_run_error_display() {
        let failed: RunError<String> = RunError::Failed("negative complement".to_string());
        let panicked: RunError<String> = RunError::Panicked("boom".to_string());
        assert_eq!(failed.to_string(), "negative complement");
        assert_eq!(panicked.to_string(), "task panicked: boom");
    }
}
