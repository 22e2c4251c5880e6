//! Caller-supplied cancellation and deadline
//!
//! A [`TransferContext`] is passed into every coordinator call. When it
//! fires before the batch body has finished, the open scope is rolled back.
//! It never interrupts a commit.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::error::CancelReason;

#[derive(Debug, Clone, Default)]
pub struct TransferContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Trigger side of a cancellable context
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        // send_replace never fails, even with no receiver left
        self.0.send_replace(true);
    }
}

impl TransferContext {
    /// Never cancelled, no deadline
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline_at(Instant::now() + timeout)
    }

    /// Keep the earlier of the existing and the new deadline
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn cancellable(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancel = Some(rx);
        (self, CancelHandle(tx))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reason the context has already fired, if it has
    pub fn check(&self) -> Option<CancelReason> {
        if self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(CancelReason::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(CancelReason::DeadlineExceeded);
        }
        None
    }

    /// Resolves when the context fires; pending forever for `background()`
    pub async fn done(&self) -> CancelReason {
        let mut cancel = self.cancel.clone();
        let cancelled = async {
            if let Some(rx) = cancel.as_mut() {
                // Err means the handle was dropped and can no longer cancel
                let fired = rx.wait_for(|c| *c).await.is_ok();
                if fired {
                    return;
                }
            }
            std::future::pending::<()>().await
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => CancelReason::Cancelled,
            _ = expired => CancelReason::DeadlineExceeded,
        }
    }
}
