use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use super::event::CostEvent;

/// What to discard when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Evict the oldest queued event to make room for the new one
    #[default]
    DropOldest,
    /// Discard the incoming event
    DropNewest,
}

impl DropPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropPolicy::DropOldest => "drop_oldest",
            DropPolicy::DropNewest => "drop_newest",
        }
    }
}

impl FromStr for DropPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop_oldest" | "oldest" => Ok(DropPolicy::DropOldest),
            "drop_newest" | "newest" => Ok(DropPolicy::DropNewest),
            other => Err(format!(
                "Unknown telemetry drop policy '{other}', expected drop_oldest or drop_newest"
            )),
        }
    }
}

/// Bounded multi-producer queue with a single async consumer.
///
/// `push` never waits: the lock is held only to touch the deque.
pub struct TelemetryQueue {
    events: Mutex<VecDeque<CostEvent>>,
    capacity: usize,
    policy: DropPolicy,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl TelemetryQueue {
    pub fn new(capacity: usize, policy: DropPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue an event. Returns false if an event was dropped to honor the
    /// capacity, or the queue is closed.
    pub fn push(&self, event: CostEvent) -> bool {
        if self.closed.load(Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let accepted = {
            let mut events = self.events.lock();
            if events.len() < self.capacity {
                events.push_back(event);
                true
            } else {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                if self.policy == DropPolicy::DropOldest {
                    events.pop_front();
                    events.push_back(event);
                }
                false
            }
        };

        self.notify.notify_one();
        accepted
    }

    /// Wait for the next event. Returns `None` once the queue is closed and
    /// drained.
    pub async fn pop(&self) -> Option<CostEvent> {
        loop {
            if let Some(event) = self.events.lock().pop_front() {
                return Some(event);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Stop accepting events and wake the consumer so it can drain and exit.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> DropPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::telemetry::event::Stage;

    fn event(turn: u64) -> CostEvent {
        CostEvent::new("s", turn, Stage::Synthesis)
    }

    #[test]
    fn test_drop_oldest_keeps_latest() {
        let queue = TelemetryQueue::new(2, DropPolicy::DropOldest);
        assert!(queue.push(event(1)));
        assert!(queue.push(event(2)));
        assert!(!queue.push(event(3)));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        let turns: Vec<u64> = queue.events.lock().iter().map(|e| e.turn).collect();
        assert_eq!(turns, vec![2, 3]);
    }

    #[test]
    fn test_drop_newest_keeps_earliest() {
        let queue = TelemetryQueue::new(2, DropPolicy::DropNewest);
        queue.push(event(1));
        queue.push(event(2));
        queue.push(event(3));

        let turns: Vec<u64> = queue.events.lock().iter().map(|e| e.turn).collect();
        assert_eq!(turns, vec![1, 2]);
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("drop_oldest".parse::<DropPolicy>(), Ok(DropPolicy::DropOldest));
        assert_eq!("DROP_NEWEST".parse::<DropPolicy>(), Ok(DropPolicy::DropNewest));
        assert!("drop_random".parse::<DropPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = std::sync::Arc::new(TelemetryQueue::new(4, DropPolicy::DropOldest));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::task::yield_now().await;
        queue.push(event(7));

        let popped = consumer.await.unwrap();
        assert_eq!(popped.map(|e| e.turn), Some(7));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = TelemetryQueue::new(4, DropPolicy::DropOldest);
        queue.push(event(1));
        queue.close();

        assert!(!queue.push(event(2)));
        assert_eq!(queue.pop().await.map(|e| e.turn), Some(1));
        assert!(queue.pop().await.is_none());
    }
}
