use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};

use {tokio::sync::mpsc, tracing::debug};

use crate::EngineEvent;

pub type EventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Token returned by [`Subscribers::subscribe`], used to revoke it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registry of event subscribers owned by an engine.
///
/// Each connection subscribes when it starts and unsubscribes when it is
/// torn down; there is no process-wide callback table.
pub struct Subscribers {
    next: AtomicU64,
    senders: Mutex<Vec<(SubscriptionId, EventSender)>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            senders: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, sender: EventSender) -> SubscriptionId {
        let id = SubscriptionId(self.next.fetch_add(1, Ordering::Relaxed));
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.push((id, sender));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        let before = senders.len();
        senders.retain(|(sid, _)| *sid != id);
        senders.len() != before
    }

    /// Deliver `event` to every live subscriber. Subscribers whose receiver
    /// was dropped are pruned.
    pub fn publish(&self, event: EngineEvent) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|(id, tx)| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                debug!(subscription = ?id, "dropping closed engine subscriber");
            }
            alive
        });
    }

    pub fn len(&self) -> usize {
        self.senders.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Subscribers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, crate::AccountKey};

    fn signed_on() -> EngineEvent {
        EngineEvent::SignedOn {
            account: AccountKey::new("loopback", "me"),
        }
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let subs = Subscribers::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        subs.subscribe(tx1);
        subs.subscribe(tx2);
        subs.publish(signed_on());
        assert!(matches!(rx1.try_recv(), Ok(EngineEvent::SignedOn { .. })));
        assert!(matches!(rx2.try_recv(), Ok(EngineEvent::SignedOn { .. })));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let subs = Subscribers::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = subs.subscribe(tx);
        assert!(subs.unsubscribe(id));
        assert!(!subs.unsubscribe(id));
        subs.publish(signed_on());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receivers_are_pruned() {
        let subs = Subscribers::new();
        let (tx, rx) = mpsc::unbounded_channel();
        subs.subscribe(tx);
        drop(rx);
        subs.publish(signed_on());
        assert!(subs.is_empty());
    }
}
