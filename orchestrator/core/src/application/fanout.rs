// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Bounded fan-out for service operations.
//!
//! Deploying a stack touches many containers; doing that serially is slow
//! and doing it unbounded can overwhelm the engine daemon. `run_pooled`
//! runs a fixed worker pool over a shared queue: never more workers than
//! items, never more than the requested parallelism.
//!
//! Failure handling is deliberate: the first failure is the one reported,
//! later failures are logged, and in-flight work is never cancelled. A
//! partially deployed stack stays inspectable instead of being torn down
//! half way.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Worker count used when the caller has no opinion.
pub const DEFAULT_PARALLELISM: usize = 5;

/// Run `task` over every item with at most `parallelism` tasks in flight.
///
/// Returns the first error raised, after every item has been attempted.
pub async fn run_pooled<T, F, Fut>(parallelism: usize, items: Vec<T>, task: F) -> Result<()>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    if items.is_empty() {
        return Ok(());
    }

    let total = items.len();
    let workers = parallelism.max(1).min(total);
    debug!(total, workers, "starting pooled run");

    let queue = Arc::new(Mutex::new(VecDeque::from(items)));
    let first_error = Arc::new(Mutex::new(None::<anyhow::Error>));
    let task = Arc::new(task);

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let first_error = Arc::clone(&first_error);
        let task = Arc::clone(&task);
        handles.push(tokio::spawn(async move {
            loop {
                let item = queue.lock().pop_front();
                let Some(item) = item else { break };
                if let Err(error) = task(item).await {
                    let mut slot = first_error.lock();
                    if slot.is_none() {
                        *slot = Some(error);
                    } else {
                        warn!("additional pooled task failure: {error:#}");
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.await.context("pooled worker panicked")?;
    }

    let first_error = first_error.lock().take();
    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
