//! Plumbing shared by the cache actor loops.

use crate::error::Result;
use std::future::{Future, pending};
use std::pin::Pin;
use tokio::time::{Instant, sleep_until};

/// The single load an instance may have in flight.
pub(crate) type LoadFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Resolves with the in-flight load's outcome, or never if nothing is loading.
pub(crate) async fn settle<T>(load: &mut Option<LoadFuture<T>>) -> Result<T> {
    match load {
        Some(future) => future.await,
        None => pending().await,
    }
}

/// Resolves at the deadline, or never if no retry is scheduled.
pub(crate) async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}
