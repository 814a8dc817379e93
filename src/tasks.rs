// src/tasks.rs

use std::future::Future;

use tokio::task::JoinHandle;

/// Cancellable handle for a background task.
///
/// Periodic work (timekeeper ticks, heartbeats, autosave debounce,
/// signal handling) is spawned through this so its lifecycle is tied
/// to the session controller's state transitions: the controller
/// stops every handle the moment it leaves ACTIVE. A callback that
/// was already scheduled when the handle was stopped must no-op on
/// its own, guarded by the session lock.
pub struct TaskHandle {
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
