//! In-flight tracking for report requests.
//!
//! At most one request is outstanding. Admission happens synchronously on the
//! UI loop via [`LifecycleFlag::try_begin`]; the returned guard flips the flag
//! back to idle when it is dropped, which the viewer does only after it has
//! applied the outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestLifecycle {
    #[default]
    Idle,
    InFlight {
        request_id: u64,
    },
}

impl RequestLifecycle {
    pub fn is_in_flight(self) -> bool {
        matches!(self, RequestLifecycle::InFlight { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LifecycleFlag {
    state: Arc<Mutex<RequestLifecycle>>,
    next_id: Arc<AtomicU64>,
}

impl LifecycleFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> RequestLifecycle {
        *self.state.lock()
    }

    /// Claim the flag. Fails with the id of the outstanding request when one
    /// is already in flight.
    pub fn try_begin(&self) -> Result<InFlightGuard, u64> {
        let mut state = self.state.lock();
        if let RequestLifecycle::InFlight { request_id } = *state {
            return Err(request_id);
        }
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        *state = RequestLifecycle::InFlight { request_id };
        Ok(InFlightGuard {
            request_id,
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    request_id: u64,
    state: Arc<Mutex<RequestLifecycle>>,
}

impl InFlightGuard {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if *state
            == (RequestLifecycle::InFlight {
                request_id: self.request_id,
            })
        {
            *state = RequestLifecycle::Idle;
        }
    }
}

/// Cooperative cancellation shared between the viewer and a pending request.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail early.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn only_one_request_in_flight() {
        let flag = LifecycleFlag::new();
        assert_eq!(flag.current(), RequestLifecycle::Idle);

        let guard = flag.try_begin().expect("first admission");
        let first = guard.request_id();
        assert_eq!(flag.current(), RequestLifecycle::InFlight { request_id: first });
        assert_eq!(flag.try_begin().expect_err("second is rejected"), first);

        drop(guard);
        assert_eq!(flag.current(), RequestLifecycle::Idle);
        let next = flag.try_begin().expect("admission after release");
        assert!(next.request_id() > first);
    }

    #[test]
    fn clones_share_state() {
        let flag = LifecycleFlag::new();
        let other = flag.clone();
        let _guard = flag.try_begin().expect("admission");
        assert!(other.current().is_in_flight());
        assert!(other.try_begin().is_err());
    }

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!token.is_cancelled());
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter woke up")
            .expect("task completed");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_after_cancel() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already cancelled");
    }
}
