use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::AbortHandle;

use super::events::JobEvent;

/// Remote control for an open job stream.
///
/// Closing is synchronous and idempotent: the reader task is aborted and the
/// intentionally-closed flag is set before this call returns, so no further
/// events can be delivered afterwards. A late terminal event from the server
/// is simply never observed.
#[derive(Clone, Debug)]
pub struct SubscriptionHandle {
    closed: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl SubscriptionHandle {
    pub(crate) fn new(closed: Arc<AtomicBool>, abort: AbortHandle) -> Self {
        Self { closed, abort }
    }

    /// Tear down the underlying transport. Safe to call multiple times.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.abort.abort();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// An open server-push stream for one job.
///
/// Events arrive on the channel in send order; nothing follows a terminal
/// event. Dropping the subscription without calling
/// [`close`](SubscriptionHandle::close) leaves the reader running until the
/// stream terminates on its own, so cancellation paths must close explicitly.
pub struct JobSubscription {
    events: flume::Receiver<JobEvent>,
    handle: SubscriptionHandle,
}

impl JobSubscription {
    pub(crate) fn new(events: flume::Receiver<JobEvent>, handle: SubscriptionHandle) -> Self {
        Self { events, handle }
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Receive the next event; `None` once the stream is finished or closed.
    pub async fn next(&self) -> Option<JobEvent> {
        self.events.recv_async().await.ok()
    }

    /// Split into the raw event receiver and the close handle, for callers
    /// that consume events from a spawned task.
    pub fn split(self) -> (flume::Receiver<JobEvent>, SubscriptionHandle) {
        (self.events, self.handle)
    }
}
