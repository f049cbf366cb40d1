//! Cooperative cancellation shared between a caller and in-flight conversions

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable cancellation flag that can also be awaited.
///
/// Every clone observes the same flag; once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Drive `future` to completion unless cancelled first.
    ///
    /// Returns None when cancelled; the future is dropped in that case.
    pub async fn run_until_cancelled<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = future => Some(output),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn new_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn run_completes_when_not_cancelled() {
        let token = CancellationToken::new();
        let output = token.run_until_cancelled(async { 7 }).await;
        assert_eq!(output, Some(7));
    }

    #[tokio::test]
    async fn run_returns_none_after_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        let output = token
            .run_until_cancelled(tokio::time::sleep(Duration::from_secs(3600)))
            .await;
        assert!(output.is_none());
    }

    #[tokio::test]
    async fn cancel_wakes_pending_future() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let output = token
            .run_until_cancelled(tokio::time::sleep(Duration::from_secs(3600)))
            .await;
        assert!(output.is_none());
    }
}
