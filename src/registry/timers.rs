use tokio::task::{AbortHandle, JoinHandle};

use crate::models::RunToken;

/// Background tasks driving one analysis attempt's synthetic progress.
///
/// Aborted when dropped, so removing a registry entry stops its timers.
#[derive(Debug)]
pub struct TimerSet {
    token: RunToken,
    handles: Vec<AbortHandle>,
}

impl TimerSet {
    pub fn new(token: RunToken) -> Self {
        Self {
            token,
            handles: Vec::new(),
        }
    }

    pub fn token(&self) -> RunToken {
        self.token
    }

    pub fn push<T>(&mut self, task: JoinHandle<T>) {
        self.handles.push(task.abort_handle());
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn cancel(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drop_aborts_tasks() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            let _ = tx.send(());
        });

        let mut timers = TimerSet::new(RunToken::mint());
        timers.push(task);
        assert_eq!(timers.len(), 1);
        drop(timers);

        // Sender is dropped without sending once the task is aborted.
        assert!(rx.await.is_err());
    }
}
