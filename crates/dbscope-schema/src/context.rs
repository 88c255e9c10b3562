//! Deadline and cancellation scope for one introspection call

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{SchemaError, SchemaResult};

/// Bounds the database work of one tool call.
///
/// Clones share the same cancellation token, so cancelling any clone stops
/// every operation running under the call.
#[derive(Debug, Clone, Default)]
pub struct IntrospectionContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl IntrospectionContext {
    /// Context without a deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose deadline is `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            token: CancellationToken::new(),
        }
    }

    /// Replace the cancellation token, e.g. with a child of a caller token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` without a deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `future` until it finishes, the deadline passes, or the context
    /// is cancelled, whichever comes first.
    ///
    /// The future is dropped when interrupted.
    pub async fn run<F, T>(&self, operation: &str, future: F) -> SchemaResult<T>
    where
        F: Future<Output = T>,
    {
        if self.token.is_cancelled() {
            return Err(SchemaError::Cancelled {
                operation: operation.to_string(),
            });
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SchemaError::Cancelled {
                operation: operation.to_string(),
            }),
            _ = deadline => Err(SchemaError::Timeout {
                operation: operation.to_string(),
            }),
            output = future => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn finishes_before_deadline() {
        let ctx = IntrospectionContext::with_timeout(Duration::from_secs(1));
        let out = ctx
            .run("tables", async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                7
            })
            .await
            .unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_slow_work() {
        let ctx = IntrospectionContext::with_timeout(Duration::from_millis(100));
        let err = ctx
            .run("tables", tokio::time::sleep(Duration::from_secs(60)))
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::Timeout { .. }));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn cancelled_context_refuses_new_work() {
        let ctx = IntrospectionContext::new();
        let clone = ctx.clone();
        clone.cancel();

        assert!(ctx.is_cancelled());
        let err = ctx.run("tables", async { 1 }).await.unwrap_err();
        assert!(matches!(err, SchemaError::Cancelled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_running_work() {
        let ctx = IntrospectionContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = ctx
            .run("columns(orders)", tokio::time::sleep(Duration::from_secs(60)))
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::Cancelled { .. }));
    }
}
