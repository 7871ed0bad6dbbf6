//! Fail-fast task group
//!
//! Runs tasks concurrently under one [`CancellationToken`]. The first task
//! to fail cancels the token so every sibling waiting on it can wind down;
//! [`TaskGroup::wait`] joins them all and reports that first failure.

use crate::error::{LifecycleError, Result};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A set of tasks that fail together
///
/// # Example
///
/// ```rust
/// use maestro::lifecycle::TaskGroup;
/// use maestro::LifecycleError;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut group = TaskGroup::new();
///
/// let token = group.token();
/// group.spawn(async move {
///     token.cancelled().await;
///     Err(LifecycleError::Canceled)
/// });
/// group.spawn(async { Err(LifecycleError::internal("boom")) });
///
/// assert_eq!(group.wait().await, Err(LifecycleError::internal("boom")));
/// # }
/// ```
pub struct TaskGroup {
    token: CancellationToken,
    tasks: JoinSet<()>,
    first_error: Arc<OnceLock<LifecycleError>>,
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGroup {
    /// Create a group with a fresh token
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Create a group whose token is a child of `parent`
    ///
    /// Cancelling `parent` cancels the group; a failure inside the group
    /// does not cancel `parent`.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self::with_token(parent.child_token())
    }

    fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            tasks: JoinSet::new(),
            first_error: Arc::new(OnceLock::new()),
        }
    }

    /// Token shared by every task in the group
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the group without recording a failure
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Number of tasks that have not been joined yet
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run `task` concurrently with the rest of the group
    ///
    /// A task returning [`LifecycleError::Canceled`] is treated as having
    /// exited cleanly. Any other error is recorded (if it is the first)
    /// and cancels the group.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let token = self.token.clone();
        let first_error = Arc::clone(&self.first_error);

        self.tasks.spawn(async move {
            match task.await {
                Ok(()) => {}
                Err(err) if err.is_canceled() => {}
                Err(err) => fail(&first_error, &token, err),
            }
        });
    }

    /// Wait for every task, then return the first real failure
    pub async fn wait(mut self) -> Result<()> {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(join_err) = joined {
                let err = if join_err.is_panic() {
                    LifecycleError::internal(format!("task panicked: {}", join_err))
                } else {
                    LifecycleError::internal(format!("task aborted: {}", join_err))
                };
                fail(&self.first_error, &self.token, err);
            }
        }

        self.first_error.get().cloned().map_or(Ok(()), Err)
    }
}

fn fail(first_error: &OnceLock<LifecycleError>, token: &CancellationToken, err: LifecycleError) {
    if first_error.set(err).is_err() {
        tracing::debug!("task failed after the group was already failing");
    }
    token.cancel();
}
