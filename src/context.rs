//! Per-call cancellation and deadlines.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{HistoryError, Result};

/// Carries the caller's cancellation signal into a store operation.
///
/// When the token fires or the deadline passes, the in-flight store future is
/// dropped and the call returns [`HistoryError::Cancelled`] or
/// [`HistoryError::DeadlineExceeded`]. Whatever the backend already committed
/// stays committed.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set a deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// A context cancelled along with this one but cancellable on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `operation` until it completes, the token fires, or the deadline
    /// passes, whichever comes first.
    pub async fn run<F, T>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.token.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(HistoryError::DeadlineExceeded);
        }

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(HistoryError::Cancelled),
            _ = expired => Err(HistoryError::DeadlineExceeded),
            result = operation => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_result() {
        let ctx = CallContext::new();
        let value = ctx.run(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let ctx = CallContext::new();
        ctx.cancel();

        let result = ctx.run(async { Ok(()) }).await;
        assert!(matches!(result, Err(HistoryError::Cancelled)));
    }

    #[tokio::test]
    async fn cancelling_parent_cancels_child() {
        let parent = CallContext::new();
        let child = parent.child();
        parent.cancel();

        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn cancelling_child_leaves_parent() {
        let parent = CallContext::new();
        let child = parent.child();
        child.cancel();

        assert!(!parent.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_aborts_slow_operation() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(HistoryError::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn token_aborts_in_flight_operation() {
        let ctx = CallContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(HistoryError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_deadline_wins() {
        let ctx = CallContext::new()
            .with_timeout(Duration::from_millis(10))
            .with_timeout(Duration::from_secs(60));
        let first = ctx.deadline().unwrap();

        assert!(first <= Instant::now() + Duration::from_millis(10));
    }
}
