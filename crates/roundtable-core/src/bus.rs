//! Fan-out of audit records to registered subscribers.

use crate::session::AuditRecord;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};

/// Callback type for audit/UI event subscribers.
pub type EventSubscriber = Arc<dyn Fn(&AuditRecord) + Send + Sync>;

/// Fans structured audit records out to registered subscribers.
///
/// Contract: subscriber panics are isolated and logged, never propagated
/// to the operation that published the record. Publishing never blocks on
/// a subscriber beyond its synchronous call.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<EventSubscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber that receives every published record.
    pub fn subscribe(&self, subscriber: EventSubscriber) {
        self.subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(subscriber);
    }

    /// Publishes a record to every subscriber, in registration order.
    pub fn publish(&self, record: &AuditRecord) {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for subscriber in subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(record))).is_err() {
                tracing::error!(
                    action = %record.action,
                    "event subscriber panicked; continuing fan-out"
                );
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(action: &str) -> AuditRecord {
        AuditRecord::success(action, "owner", None, serde_json::Map::new())
    }

    #[test]
    fn all_subscribers_receive_published_records() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let seen = seen.clone();
            bus.subscribe(Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        }

        bus.publish(&record("create_session"));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn panicking_subscriber_does_not_stop_fan_out() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        bus.subscribe(Arc::new(|_| panic!("subscriber bug")));
        let counter = seen.clone();
        bus.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        bus.publish(&record("advance_turn"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
