use tokio::runtime::Handle;

use crate::mailbox::{Executor, Job};

/// Runs drain jobs on the runtime's blocking pool.
///
/// Handlers are free to block, so drains never run on the async workers
/// that read from the sockets.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Executor for the runtime the caller is running on
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, job: Job) {
        drop(self.handle.spawn_blocking(job));
    }
}
