//! Scheduling seam between the finder and its host runtime.
//!
//! The finder owns no runtime of its own. It hands its background work to
//! a [`FinderRuntime`] in two roles with different lifetime contracts: the
//! long-lived loops (status handler, upstream forwarders) that run until
//! shutdown, and the short-lived fetch workers that must always run to
//! completion. [`TokioRuntime`] schedules both on whatever Tokio runtime
//! the embedding application already runs.

use std::future::Future;
use std::pin::Pin;

/// A boxed unit of background work handed to the runtime.
pub type FinderTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Where the finder's background work runs.
///
/// The two roles carry different obligations, so implementations can place
/// them differently (a dedicated thread for the loops, a shared pool for
/// the workers, instrumentation per role).
pub trait FinderRuntime: Send + Sync {
    /// Launches a long-lived loop: the status handler or one of the
    /// upstream forwarders.
    ///
    /// Loops exit on their own when the finder's shutdown token cancels;
    /// the runtime must keep them scheduled for as long as the finder
    /// runs.
    fn spawn_loop(&self, name: &'static str, task: FinderTask);

    /// Launches a short-lived fetch worker.
    ///
    /// Workers MUST run to completion even if the finder stops meanwhile:
    /// their final step releases the per-device request claim, and
    /// dropping one mid-flight would wedge that source device until
    /// restart.
    fn spawn_worker(&self, name: &'static str, task: FinderTask);
}

/// Schedules finder tasks on an existing Tokio runtime.
#[derive(Clone)]
pub struct TokioRuntime {
    handle: tokio::runtime::Handle,
}

impl TokioRuntime {
    /// Creates a scheduler for the given runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a scheduler for the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl FinderRuntime for TokioRuntime {
    fn spawn_loop(&self, name: &'static str, task: FinderTask) {
        log::debug!("[FinderRuntime] Launching {name} loop");
        self.handle.spawn(task);
    }

    fn spawn_worker(&self, name: &'static str, task: FinderTask) {
        log::debug!("[FinderRuntime] Launching {name} worker");
        self.handle.spawn(task);
    }
}
