use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::{ErrorKind, StrataError, StrataResult};

/// A fixed-size pool description for running one stage of per-partition tasks.
///
/// Every call to [`Executor::run`] is a barrier: it returns only after all
/// tasks have finished, and outputs come back in input order.
#[derive(Clone, Debug)]
pub struct Executor {
    threads: usize,
}

impl Default for Executor {
    fn default() -> Self {
        Executor::new(crate::get_cpu_count())
    }
}

impl Executor {
    pub fn new(threads: usize) -> Executor {
        Executor {
            threads: threads.max(1),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs `task(index, input)` for every input on up to `threads` scoped
    /// workers fed from a shared queue.
    ///
    /// # Errors
    ///
    /// The error of the lowest-indexed failing task is returned unchanged.
    /// Once a task fails, queued tasks that have not started are skipped. A
    /// panicking task is reported as an `ExecutionError`.
    pub fn run<I, O, F>(&self, stage: &str, inputs: Vec<I>, task: F) -> StrataResult<Vec<O>>
    where
        I: Send,
        O: Send,
        F: Fn(usize, I) -> StrataResult<O> + Sync,
    {
        let count = inputs.len();
        if count == 0 {
            return Ok(Vec::new());
        }

        let workers = self.threads.min(count);
        log::debug!("Stage {}: {} tasks on {} workers", stage, count, workers);

        if workers == 1 {
            return inputs
                .into_iter()
                .enumerate()
                .map(|(index, input)| {
                    guarded(&task, index, input).map_err(|err| report(stage, index, err))
                })
                .collect();
        }

        let (task_tx, task_rx) = crossbeam_channel::unbounded::<(usize, I)>();
        for (index, input) in inputs.into_iter().enumerate() {
            task_tx.send((index, input)).map_err(|_| {
                StrataError::new("Task queue closed unexpectedly", ErrorKind::InternalError)
            })?;
        }
        drop(task_tx);

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, StrataResult<O>)>();
        let failed = AtomicBool::new(false);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                let task = &task;
                let failed = &failed;
                scope.spawn(move || {
                    for (index, input) in task_rx.iter() {
                        if failed.load(Ordering::Relaxed) {
                            continue;
                        }
                        let result = guarded(task, index, input);
                        if result.is_err() {
                            failed.store(true, Ordering::Relaxed);
                        }
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut outputs: Vec<Option<O>> = (0..count).map(|_| None).collect();
        let mut first_error: Option<(usize, StrataError)> = None;
        for (index, result) in result_rx.try_iter() {
            match result {
                Ok(output) => outputs[index] = Some(output),
                Err(err) => {
                    if first_error.as_ref().map_or(true, |(i, _)| index < *i) {
                        first_error = Some((index, err));
                    }
                }
            }
        }

        if let Some((index, err)) = first_error {
            return Err(report(stage, index, err));
        }

        outputs
            .into_iter()
            .enumerate()
            .map(|(index, output)| {
                output.ok_or_else(|| {
                    StrataError::new(
                        &format!("Stage {} lost the output of task {}", stage, index),
                        ErrorKind::InternalError,
                    )
                })
            })
            .collect()
    }
}

fn guarded<I, O, F>(task: &F, index: usize, input: I) -> StrataResult<O>
where
    F: Fn(usize, I) -> StrataResult<O>,
{
    match catch_unwind(AssertUnwindSafe(|| task(index, input))) {
        Ok(result) => result,
        Err(panic) => {
            let reason = if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(StrataError::new(
                &format!("Task {} panicked: {}", index, reason),
                ErrorKind::ExecutionError,
            ))
        }
    }
}

fn report(stage: &str, index: usize, err: StrataError) -> StrataError {
    log::error!("Stage {} failed on partition {}: {}", stage, index, err);
    err
}
