//! Agent trait and shared run accounting

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors surfaced by agent cycles
///
/// Store, model, and source errors are carried as strings so agents can
/// stay generic over the store and model error types.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The claim store failed
    #[error("store error: {0}")]
    Store(String),

    /// The language model failed
    #[error("model error: {0}")]
    Model(String),

    /// A literature source failed
    #[error("source error: {0}")]
    Source(String),

    /// A named agent does not exist
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// A cycle panicked instead of returning
    #[error("cycle panicked: {0}")]
    Panicked(String),
}

/// Counters for one agent cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items the cycle looked at
    pub processed: usize,
    /// Items that completed their transition
    pub succeeded: usize,
    /// Items that errored
    pub failed: usize,
    /// Items intentionally left alone (duplicates, empty batches)
    pub skipped: usize,
}

/// One pipeline agent
///
/// `process` runs a single bounded cycle and returns its counters. A
/// returned error means the cycle could not run at all; per-item
/// failures are counted in the summary instead.
pub trait Agent {
    /// Agent name for logging
    fn name(&self) -> &'static str;

    /// Run one cycle
    fn process(&mut self) -> Result<RunSummary, AgentError>;
}

/// Lock a shared store, recovering from poisoning
///
/// A panic in one agent must not take down its siblings. The data a
/// cycle writes is committed row by row, so a guard dropped mid-panic
/// leaves the store consistent and the lock is safe to retake.
pub fn lock_store<T>(store: &Mutex<T>) -> MutexGuard<'_, T> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Current Unix time in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
