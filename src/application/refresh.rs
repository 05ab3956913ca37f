// src/application/refresh.rs
use crate::application::ApplicationResult;
use std::{
    future::Future,
    mem,
    sync::{Mutex, PoisonError},
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The new access token.
    Refreshed(String),
    /// The refresh did not produce a token; callers fall back to whatever the
    /// session currently holds.
    Failed,
}

enum RefreshState {
    Idle,
    Refreshing(Vec<oneshot::Sender<RefreshOutcome>>),
}

/// Ensures at most one token refresh is in flight. Callers arriving while a
/// refresh runs wait for its outcome instead of starting their own.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            RefreshState::Refreshing(_)
        )
    }

    /// Runs `refresh` unless one is already running, in which case the result
    /// of the running one is awaited. Every caller gets exactly one outcome,
    /// also when the leading caller is cancelled mid-refresh.
    pub async fn run<F, Fut>(&self, refresh: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApplicationResult<String>>,
    {
        let waiter = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match &mut *state {
                RefreshState::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            debug!("waiting for in-flight token refresh");
            return rx.await.unwrap_or(RefreshOutcome::Failed);
        }

        let mut guard = SettleGuard {
            coordinator: self,
            settled: false,
        };
        let outcome = match refresh().await {
            Ok(token) => RefreshOutcome::Refreshed(token),
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                RefreshOutcome::Failed
            }
        };
        guard.settle(outcome.clone());
        outcome
    }

    fn settle(&self, outcome: &RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing(waiters) => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };
        debug!(waiters = waiters.len(), "token refresh settled");
        for waiter in waiters {
            // A waiter whose request was dropped no longer listens.
            let _ = waiter.send(outcome.clone());
        }
    }
}

struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl SettleGuard<'_> {
    fn settle(&mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(&outcome);
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle(&RefreshOutcome::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ApplicationError;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use std::time::Duration;

    #[tokio::test]
    async fn lone_caller_runs_refresh() {
        let coordinator = RefreshCoordinator::new();
        let outcome = coordinator.run(|| async { Ok("t1".to_owned()) }).await;
        assert_eq!(outcome, RefreshOutcome::Refreshed("t1".into()));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn failure_returns_to_idle() {
        let coordinator = RefreshCoordinator::new();
        let outcome = coordinator
            .run(|| async { Err(ApplicationError::unauthorized("expired")) })
            .await;
        assert_eq!(outcome, RefreshOutcome::Failed);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_leader_releases_waiters() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                coordinator
                    .run(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok("never".to_owned())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(coordinator.is_refreshing());

        let follower = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.run(|| async { Ok("unused".to_owned()) }).await })
        };
        tokio::task::yield_now().await;

        leader.abort();
        let outcome = follower.await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_refreshing());
    }
}
