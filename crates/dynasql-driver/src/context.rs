//! Execution context: deadline and cancellation.
//!
//! Every suspension point of the driver (schema fetch, store call) runs
//! under an [`ExecContext`]. Cancellation between result pages aborts
//! cleanly; no partial page is ever surfaced.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use dynasql_core::error::Error;

/// Deadline and cancellation for one statement execution.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl ExecContext {
    /// A context with no deadline and a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attach a caller-owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The cancellation token driving this context.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run a future under this context's deadline and cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the token fires or the deadline
    /// passes before the future completes.
    pub(crate) async fn run<T>(&self, fut: impl Future<Output = T>) -> Result<T, Error> {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            () = deadline => Err(Error::Cancelled),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_should_pass_through_when_not_cancelled() {
        let ctx = ExecContext::new();
        let out = ctx.run(async { 7 }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_should_abort_on_pre_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ExecContext::new().with_cancellation(token);
        let result = ctx.run(async { 7 }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_abort_on_deadline() {
        let ctx = ExecContext::new().with_timeout(Duration::from_millis(5));
        let result = ctx.run(std::future::pending::<()>()).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
