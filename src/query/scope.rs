//! Acquire/use/release with release guaranteed on every exit path.
//!
//! Every place that gives back a statement or cursor goes through
//! [`merge_release`], so a release failure never hides the error that caused
//! the unwinding, and still surfaces when nothing else went wrong.

use crate::error::StreamError;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use tracing::warn;

/// Combine the outcome of a body with the outcome of releasing its resource.
///
/// - body ok, release ok: the body's value
/// - body ok, release failed: the release error
/// - body failed: the body's error, with any release error suppressed into it
pub fn merge_release<T>(
    outcome: Result<T, StreamError>,
    released: Result<(), StreamError>,
) -> Result<T, StreamError> {
    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release_error)) => Err(release_error),
        (Err(primary), released) => Err(suppress(primary, released)),
    }
}

/// Attach a failed release to a primary error.
pub fn suppress(primary: StreamError, released: Result<(), StreamError>) -> StreamError {
    match released {
        Ok(()) => primary,
        Err(release_error) => primary.with_suppressed(release_error),
    }
}

/// Run `body` with `resource`, releasing the resource only if the body fails.
///
/// This is the opening half of a scope whose closing half runs later, such as
/// a stream that keeps its statement until the consumer is done. A panic in
/// the body releases the resource and resumes unwinding.
pub async fn release_on_error<R, T, B, BF, L, LF>(
    resource: R,
    body: B,
    release: L,
) -> Result<T, StreamError>
where
    R: Copy,
    B: FnOnce(R) -> BF,
    BF: Future<Output = Result<T, StreamError>>,
    L: FnOnce(R) -> LF,
    LF: Future<Output = Result<(), StreamError>>,
{
    match AssertUnwindSafe(body(resource)).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(primary)) => Err(suppress(primary, release(resource).await)),
        Err(panic) => {
            if let Err(release_error) = release(resource).await {
                warn!(error = %release_error, "Release failed while unwinding from a panic");
            }
            resume_unwind(panic)
        }
    }
}

/// Bracket a resource: acquire it, run `body`, then release it exactly once.
///
/// A failed acquisition is returned as is and nothing is released. Release
/// runs whether the body returns a value, returns an error or panics; the
/// outcomes combine as described on [`merge_release`].
pub async fn with_resource<R, T, A, B, BF, L, LF>(
    acquire: A,
    body: B,
    release: L,
) -> Result<T, StreamError>
where
    R: Copy,
    A: Future<Output = Result<R, StreamError>>,
    B: FnOnce(R) -> BF,
    BF: Future<Output = Result<T, StreamError>>,
    L: FnOnce(R) -> LF,
    LF: Future<Output = Result<(), StreamError>>,
{
    let resource = acquire.await?;

    match AssertUnwindSafe(body(resource)).catch_unwind().await {
        Ok(outcome) => merge_release(outcome, release(resource).await),
        Err(panic) => {
            if let Err(release_error) = release(resource).await {
                warn!(error = %release_error, "Release failed while unwinding from a panic");
            }
            resume_unwind(panic)
        }
    }
}
