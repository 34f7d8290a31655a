//! # Thread Affinity
//!
//! The host owns exactly one primary thread on which its shell APIs must be
//! called. Everything else runs on the tokio worker pool. Components never talk
//! to the host dispatcher directly; they go through [`ThreadHandling`], which
//! keeps the primary thread fakeable in tests and replaceable per host.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lintbridge_core::threading::{PrimaryThread, ThreadHandling, ThreadHandlingExt};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let primary = PrimaryThread::spawn("lintbridge-primary")?;
//!
//! // Hops onto the primary thread, runs the closure, and resumes here afterward
//! let on_primary = primary.run_on_primary_thread(|| std::thread::current().name().map(str::to_owned)).await?;
//! assert_eq!(on_primary.as_deref(), Some("lintbridge-primary"));
//!
//! // Keeps blocking work off the primary thread
//! let sum = primary.run_on_background_thread(|| (1..=10).sum::<u32>()).await?;
//! assert_eq!(sum, 55);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod primary_thread;

pub use errors::ThreadAffinityError;
pub use primary_thread::PrimaryThread;

use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::oneshot;

/// Unit of work queued onto the primary thread
pub type PrimaryWork = Box<dyn FnOnce() + Send + 'static>;

/// Capability for detecting and marshalling onto the host's primary thread
pub trait ThreadHandling: Send + Sync {
    /// Whether the calling thread is the primary thread
    fn is_on_primary_thread(&self) -> bool;

    /// Queue work for execution on the primary thread.
    ///
    /// Returns once the work is queued, not once it has run.
    fn dispatch_to_primary(&self, work: PrimaryWork) -> Result<(), ThreadAffinityError>;

    /// Fail fast unless called from the primary thread
    fn require_on_primary_thread(&self, operation: &str) -> Result<(), ThreadAffinityError> {
        if self.is_on_primary_thread() {
            Ok(())
        } else {
            Err(ThreadAffinityError::expected_primary(operation))
        }
    }

    /// Fail fast when called from the primary thread
    fn require_off_primary_thread(&self, operation: &str) -> Result<(), ThreadAffinityError> {
        if self.is_on_primary_thread() {
            Err(ThreadAffinityError::expected_background(operation))
        } else {
            Ok(())
        }
    }
}

/// Generic marshalling helpers available on every [`ThreadHandling`],
/// including `dyn ThreadHandling`
pub trait ThreadHandlingExt: ThreadHandling {
    /// Run `work` on the primary thread and hand its result back to the caller.
    ///
    /// Already on the primary thread: `work` runs inline, with no hop, so
    /// re-entrant calls cannot deadlock against themselves.
    fn run_on_primary_thread<'a, F, R>(&'a self, work: F) -> BoxFuture<'a, Result<R, ThreadAffinityError>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        Box::pin(async move {
            if self.is_on_primary_thread() {
                return Ok(work());
            }

            let (result_sender, result_receiver) = oneshot::channel();
            self.dispatch_to_primary(Box::new(move || {
                let _ = result_sender.send(work());
            }))?;

            result_receiver
                .await
                .map_err(|_| ThreadAffinityError::PrimaryWorkAbandoned)
        })
    }

    /// Run blocking or expensive `work` on the worker pool
    fn run_on_background_thread<'a, F, R>(&'a self, work: F) -> BoxFuture<'a, Result<R, ThreadAffinityError>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        Box::pin(async move {
            tokio::task::spawn_blocking(work)
                .await
                .map_err(|e| ThreadAffinityError::BackgroundWorkFailed {
                    message: e.to_string(),
                })
        })
    }

    /// Drive `work` to completion from a synchronous call site.
    ///
    /// Refuses to run on the primary thread, where blocking would starve the
    /// very thread the work may need to marshal back onto. The future must not
    /// depend on a current-thread runtime driven by the caller.
    fn run_blocking<Fut>(&self, operation: &str, work: Fut) -> Result<Fut::Output, ThreadAffinityError>
    where
        Fut: Future,
    {
        self.require_off_primary_thread(operation)?;
        Ok(futures::executor::block_on(work))
    }
}

impl<T: ThreadHandling + ?Sized> ThreadHandlingExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::InlineThreadHandling;

    #[test]
    fn test_require_guards_follow_affinity() {
        let primary = InlineThreadHandling::primary();
        assert!(primary.require_on_primary_thread("read_solution").is_ok());
        assert_eq!(
            primary.require_off_primary_thread("scan_files"),
            Err(ThreadAffinityError::expected_background("scan_files"))
        );

        let background = InlineThreadHandling::background();
        assert!(background.require_off_primary_thread("scan_files").is_ok());
        assert!(matches!(
            background.require_on_primary_thread("read_solution"),
            Err(ThreadAffinityError::ExpectedPrimary { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_on_primary_is_inline_when_already_there() {
        let primary = InlineThreadHandling::primary();
        let value = primary.run_on_primary_thread(|| 42).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(primary.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn test_run_on_primary_dispatches_from_background() {
        let background = InlineThreadHandling::background();
        let value = background
            .run_on_primary_thread(|| "marshalled".to_string())
            .await
            .unwrap();
        assert_eq!(value, "marshalled");
        assert_eq!(background.dispatch_count(), 1);
    }

    #[test]
    fn test_run_blocking_refuses_primary_thread() {
        let primary = InlineThreadHandling::primary();
        let result = primary.run_blocking("legacy_load", async { 1 });
        assert!(matches!(result, Err(ThreadAffinityError::ExpectedBackground { .. })));

        let background = InlineThreadHandling::background();
        assert_eq!(background.run_blocking("legacy_load", async { 7 }), Ok(7));
    }

    #[tokio::test]
    async fn test_run_on_background_thread_returns_result() {
        let background = InlineThreadHandling::background();
        let total = background
            .run_on_background_thread(|| (1..=4).product::<u32>())
            .await
            .unwrap();
        assert_eq!(total, 24);
    }
}
