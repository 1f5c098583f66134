//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Keep "took too long" distinct from "failed"
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the wrapped future is dropped on expiry,
//!   which cancels the upstream call
//! - Timed-out requests become 504 Gateway Timeout upstream of here

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Failure of a call run under a deadline.
#[derive(Debug, Error)]
pub enum BoundedError<E> {
    #[error("deadline of {0:?} exceeded")]
    Elapsed(Duration),

    #[error(transparent)]
    Inner(E),
}

/// Run `call`, giving up after `deadline`.
pub async fn bounded<F, T, E>(deadline: Duration, call: F) -> Result<T, BoundedError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result.map_err(BoundedError::Inner),
        Err(_) => Err(BoundedError::Elapsed(deadline)),
    }
}
