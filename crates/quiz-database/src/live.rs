//! Live subscriptions to the singleton stats row.
//!
//! Subscribers receive the full row after every committed change. The hub
//! is notified from the SQLite executor thread right after commit, so
//! updates arrive in commit order.

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::UserStats;

/// A subscription to stats updates.
pub struct StatsSubscription {
    receiver: UnboundedReceiver<UserStats>,
}

impl StatsSubscription {
    /// Wait for the next update. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<UserStats> {
        self.receiver.recv().await
    }

    /// Take an update if one is queued.
    pub fn try_recv(&mut self) -> Option<UserStats> {
        self.receiver.try_recv().ok()
    }

    /// Drain queued updates and return the newest, if any.
    pub fn latest(&mut self) -> Option<UserStats> {
        let mut latest = None;
        while let Ok(stats) = self.receiver.try_recv() {
            latest = Some(stats);
        }
        latest
    }
}

/// Fan-out of stats snapshots to every live subscriber.
#[derive(Debug, Default)]
pub struct StatsHub {
    subscribers: Mutex<Vec<UnboundedSender<UserStats>>>,
}

impl StatsHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Only changes after this call are delivered.
    pub fn subscribe(&self) -> StatsSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().push(sender);
        StatsSubscription { receiver }
    }

    /// Register a subscriber whose first item is `current`.
    pub fn subscribe_with(&self, current: UserStats) -> StatsSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        // Receiver is alive, send cannot fail
        let _ = sender.send(current);
        self.subscribers.lock().push(sender);
        StatsSubscription { receiver }
    }

    /// Broadcast a committed snapshot, dropping dead subscribers.
    pub fn notify(&self, stats: &UserStats) {
        self.subscribers
            .lock()
            .retain(|sender| sender.send(stats.clone()).is_ok());
    }

    /// Registered subscribers, including dead ones not yet pruned by `notify`.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with_correct(correct: i64) -> UserStats {
        UserStats {
            total_correct_answers: correct,
            total_questions_answered: correct,
            ..Default::default()
        }
    }

    #[test]
    fn subscribe_and_receive() {
        let hub = StatsHub::new();
        let mut sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);

        hub.notify(&stats_with_correct(3));
        assert_eq!(sub.try_recv().unwrap().total_correct_answers, 3);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn subscribe_with_delivers_current_first() {
        let hub = StatsHub::new();
        let mut sub = hub.subscribe_with(stats_with_correct(1));
        hub.notify(&stats_with_correct(2));

        assert_eq!(sub.try_recv().unwrap().total_correct_answers, 1);
        assert_eq!(sub.try_recv().unwrap().total_correct_answers, 2);
    }

    #[test]
    fn latest_drains_queue() {
        let hub = StatsHub::new();
        let mut sub = hub.subscribe();
        for n in 1..=4 {
            hub.notify(&stats_with_correct(n));
        }
        assert_eq!(sub.latest().unwrap().total_correct_answers, 4);
        assert!(sub.latest().is_none());
    }

    #[test]
    fn dead_subscriber_cleanup() {
        let hub = StatsHub::new();
        {
            let _sub = hub.subscribe();
            assert_eq!(hub.subscriber_count(), 1);
        }
        hub.notify(&UserStats::default());
        assert_eq!(hub.subscriber_count(), 0);
    }
}
