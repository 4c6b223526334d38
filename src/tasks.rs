//! Per-spec fan-out with an explicit join point.
//!
//! Every task starts running as soon as it is spawned; nothing waits for the previous spec
//! before starting the next. [`TaskSet::join_all`] is the only synchronization point and
//! returns one [`SpecOutcome`] per spawned task, in spawn order. A task that panics yields a
//! failed outcome instead of tearing down the caller.

use crate::error::{Error, Result};
use std::future::Future;
use tokio::task::JoinSet;

/// Result of the work done for one spec.
#[derive(Debug)]
pub struct SpecOutcome<T> {
    pub name: String,
    pub result: Result<T>,
}

impl<T> SpecOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct TaskSet<T> {
    set: JoinSet<(usize, Result<T>)>,
    names: Vec<String>,
}

impl<T: Send + 'static> TaskSet<T> {
    pub fn new() -> Self {
        Self {
            set: JoinSet::new(),
            names: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Starts `task` immediately on the runtime. Must be called within a tokio runtime.
    pub fn spawn<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let index = self.names.len();
        self.names.push(name.into());

        // The inner spawn turns a panic into a JoinError we can report per spec.
        let inner = tokio::spawn(task);
        self.set.spawn(async move {
            let result = match inner.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(Error::Task("task panicked".to_string())),
                Err(e) => Err(Error::Task(e.to_string())),
            };
            (index, result)
        });
    }

    /// Waits for every task and returns their outcomes in spawn order.
    pub async fn join_all(mut self) -> Vec<SpecOutcome<T>> {
        let mut results: Vec<Option<Result<T>>> = self.names.iter().map(|_| None).collect();

        while let Some(joined) = self.set.join_next().await {
            // The wrapper task never panics; it is only lost if the runtime shuts down.
            if let Ok((index, result)) = joined {
                results[index] = Some(result);
            }
        }

        self.names
            .into_iter()
            .zip(results)
            .map(|(name, result)| SpecOutcome {
                name,
                result: result
                    .unwrap_or_else(|| Err(Error::Task("task was cancelled".to_string()))),
            })
            .collect()
    }
}

impl<T: Send + 'static> Default for TaskSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
