//! Run queue for batched block execution.
//!
//! A multi-selection "run" fans out into independent per-block triggers. The
//! queue is a hint, not an authority: per-block concurrency is enforced by the
//! [`BlockStatus`](crate::types::BlockStatus) gate in the runtime, the queue
//! only guarantees that each queued id is claimed at most once.

use parking_lot::Mutex;

use crate::types::NodeId;

/// Queue of block ids awaiting a triggered execution.
///
/// `request_run` replaces the queue wholesale (last caller wins; concurrent
/// multi-select run requests are not merged). Claims are
/// dequeue-then-execute: [`try_claim`](Self::try_claim) removes the id under
/// the lock before the caller begins executing, so racing observers can never
/// double-trigger one id.
///
/// # Examples
///
/// ```rust
/// use blockweave::scheduler::RunScheduler;
///
/// let scheduler = RunScheduler::new();
/// scheduler.request_run(vec!["a".into(), "b".into()]);
///
/// assert!(scheduler.try_claim(&"a".into()));
/// assert!(!scheduler.try_claim(&"a".into())); // already claimed
/// assert!(scheduler.try_claim(&"b".into()));
/// assert!(scheduler.is_empty());
/// ```
pub struct RunScheduler {
    queue: Mutex<Vec<NodeId>>,
    wakers: Mutex<Vec<flume::Sender<()>>>,
}

impl Default for RunScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RunScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            wakers: Mutex::new(Vec::new()),
        }
    }

    /// Replace the queue with `ids`. Last caller wins; previously queued ids
    /// that were not yet claimed are dropped.
    pub fn request_run(&self, ids: impl IntoIterator<Item = NodeId>) {
        {
            let mut queue = self.queue.lock();
            *queue = ids.into_iter().collect();
        }
        self.wake();
    }

    /// Remove `id` from the queue. Returns true only if it was present; the
    /// check and the removal happen under one lock acquisition.
    pub fn try_claim(&self, id: &NodeId) -> bool {
        let mut queue = self.queue.lock();
        match queue.iter().position(|n| n == id) {
            Some(index) => {
                queue.remove(index);
                true
            }
            None => false,
        }
    }

    /// Claim the next queued id, front first.
    pub fn claim_next(&self) -> Option<NodeId> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }

    pub fn queued(&self, id: &NodeId) -> bool {
        self.queue.lock().iter().any(|n| n == id)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    /// Subscribe to queue-change notifications. A unit message is sent every
    /// time the queue is replaced, so eligible idle blocks are told to poll
    /// instead of relying on incidental re-evaluation.
    pub fn subscribe(&self) -> flume::Receiver<()> {
        let (tx, rx) = flume::unbounded();
        self.wakers.lock().push(tx);
        rx
    }

    fn wake(&self) {
        let mut wakers = self.wakers.lock();
        wakers.retain(|tx| tx.send(()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn replace_semantics_last_caller_wins() {
        let scheduler = RunScheduler::new();
        scheduler.request_run(vec!["a".into(), "b".into()]);
        scheduler.request_run(vec!["c".into()]);
        assert!(!scheduler.queued(&"a".into()));
        assert!(scheduler.queued(&"c".into()));
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn each_queued_id_claimed_exactly_once_across_threads() {
        let scheduler = Arc::new(RunScheduler::new());
        let ids: Vec<NodeId> = (0..32).map(|i| NodeId::from(format!("n{i}"))).collect();
        scheduler.request_run(ids.clone());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let scheduler = Arc::clone(&scheduler);
            let ids = ids.clone();
            handles.push(std::thread::spawn(move || {
                let mut claimed = Vec::new();
                for id in &ids {
                    if scheduler.try_claim(id) {
                        claimed.push(id.clone());
                    }
                }
                claimed
            }));
        }

        let mut all: Vec<NodeId> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("claimer thread panicked"))
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), ids.len(), "every id claimed exactly once");
        assert!(scheduler.is_empty());
    }

    #[test]
    fn claim_next_drains_front_first() {
        let scheduler = RunScheduler::new();
        scheduler.request_run(vec!["a".into(), "b".into()]);
        assert_eq!(scheduler.claim_next(), Some("a".into()));
        assert_eq!(scheduler.claim_next(), Some("b".into()));
        assert_eq!(scheduler.claim_next(), None);
    }

    #[test]
    fn request_run_wakes_subscribers() {
        let scheduler = RunScheduler::new();
        let rx = scheduler.subscribe();
        scheduler.request_run(vec!["a".into()]);
        assert!(rx.try_recv().is_ok());
    }
}
