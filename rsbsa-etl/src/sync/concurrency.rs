//! Concurrency limiter for table-group lanes
//!
//! A semaphore caps how many lanes of one page talk to the databases at once,
//! keeping the lane count below the connection pool size.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::debug;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Semaphore-based limiter for concurrent table groups
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    acquired: Arc<AtomicU64>,
    waited: Arc<AtomicU64>,
}

impl ConcurrencyLimiter {
    /// `max_concurrent` of 0 is treated as 1
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            acquired: Arc::new(AtomicU64::new(0)),
            waited: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Acquire a permit, waiting if at capacity.
    /// The permit is released when dropped.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        if self.semaphore.available_permits() == 0 {
            self.waited.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Group limiter: waiting for permit ({} in use)",
                self.max_concurrent
            );
        }

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Group limiter closed")?;
        self.acquired.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Group limiter: acquired permit ({}/{} in use)",
            self.max_concurrent - self.semaphore.available_permits(),
            self.max_concurrent
        );

        Ok(permit)
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn stats(&self) -> ConcurrencyStats {
        ConcurrencyStats {
            available_permits: self.available_permits(),
            max_concurrent: self.max_concurrent,
            acquired: self.acquired.load(Ordering::Relaxed),
            waited: self.waited.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for the group limiter
#[derive(Debug, Clone)]
pub struct ConcurrencyStats {
    pub available_permits: usize,
    pub max_concurrent: usize,
    /// Total permits acquired since creation
    pub acquired: u64,
    /// Number of times a lane had to wait for a permit
    pub waited: u64,
}

impl ConcurrencyStats {
    /// Fraction of acquisitions that had to wait
    pub fn wait_rate(&self) -> f64 {
        if self.acquired == 0 {
            0.0
        } else {
            self.waited as f64 / self.acquired as f64
        }
    }
}
