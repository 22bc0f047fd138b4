//! Coalescing notification queue for fuel-state subscribers.
//!
//! Updates enqueue an event; bursts of the same kind collapse into one entry
//! that keeps its original queue position and carries the latest payload.
//! A flush delivers every pending event to every subscriber in registration
//! order. The internal lock is never held while a subscriber runs, so
//! callbacks may read from (or write to) the manager that notified them.

use crate::master::FuelCalculations;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelEventKind {
    PolicyUpdated,
    WeatherUpdated,
    WeatherSegmentsUpdated,
    WaypointsUpdated,
    AircraftUpdated,
    RefuelStopsUpdated,
    OverridesApplied,
    CalculationsUpdated,
}

impl FuelEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuelEventKind::PolicyUpdated => "policy_updated",
            FuelEventKind::WeatherUpdated => "weather_updated",
            FuelEventKind::WeatherSegmentsUpdated => "weather_segments_updated",
            FuelEventKind::WaypointsUpdated => "waypoints_updated",
            FuelEventKind::AircraftUpdated => "aircraft_updated",
            FuelEventKind::RefuelStopsUpdated => "refuel_stops_updated",
            FuelEventKind::OverridesApplied => "overrides_applied",
            FuelEventKind::CalculationsUpdated => "calculations_updated",
        }
    }
}

impl fmt::Display for FuelEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delivery to one subscriber.
#[derive(Debug, Clone)]
pub struct FuelNotification {
    pub kind: FuelEventKind,
    /// Flush cycle this delivery belongs to
    pub sequence: u64,
    /// Ordinal spacing of this subscriber within the cycle
    pub stagger_offset: Duration,
    pub calculations: Option<Arc<FuelCalculations>>,
}

pub type SubscriptionId = u64;
pub type FuelSubscriber = Arc<dyn Fn(&FuelNotification) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    name: String,
    callback: FuelSubscriber,
}

struct PendingEvent {
    kind: FuelEventKind,
    calculations: Option<Arc<FuelCalculations>>,
}

#[derive(Default)]
struct QueueInner {
    subscribers: Vec<Subscriber>,
    pending: Vec<PendingEvent>,
    next_id: SubscriptionId,
    sequence: u64,
}

/// Handle returned by `subscribe`. Dropping it keeps the subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    queue: Weak<Mutex<QueueInner>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the subscriber. False if it was already gone or the queue was dropped.
    pub fn unsubscribe(self) -> bool {
        let Some(queue) = self.queue.upgrade() else {
            return false;
        };
        let mut inner = lock_inner(&queue);
        remove_subscriber(&mut inner, self.id)
    }
}

fn lock_inner(inner: &Mutex<QueueInner>) -> MutexGuard<'_, QueueInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn remove_subscriber(inner: &mut QueueInner, id: SubscriptionId) -> bool {
    let before = inner.subscribers.len();
    inner.subscribers.retain(|s| s.id != id);
    inner.subscribers.len() != before
}

pub struct NotificationQueue {
    inner: Arc<Mutex<QueueInner>>,
    stagger: Duration,
}

impl fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("NotificationQueue")
            .field(
                "subscribers",
                &inner.subscribers.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .field("pending", &inner.pending.len())
            .field("stagger", &self.stagger)
            .finish()
    }
}

impl NotificationQueue {
    pub fn new(stagger: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner::default())),
            stagger,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        lock_inner(&self.inner)
    }

    pub fn subscribe(
        &self,
        name: impl Into<String>,
        callback: impl Fn(&FuelNotification) + Send + Sync + 'static,
    ) -> Subscription {
        let callback: FuelSubscriber = Arc::new(callback);
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        let name = name.into();
        tracing::debug!("Subscriber '{}' registered as #{}", name, id);
        inner.subscribers.push(Subscriber { id, name, callback });
        Subscription {
            id,
            queue: Arc::downgrade(&self.inner),
        }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        remove_subscriber(&mut self.lock(), id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Queue an event, folding it into a pending event of the same kind.
    pub fn enqueue(&self, kind: FuelEventKind, calculations: Option<Arc<FuelCalculations>>) {
        let mut inner = self.lock();
        if let Some(existing) = inner.pending.iter_mut().find(|event| event.kind == kind) {
            if calculations.is_some() {
                existing.calculations = calculations;
            }
            return;
        }
        inner.pending.push(PendingEvent { kind, calculations });
    }

    /// Deliver everything pending. Returns the number of callback invocations.
    pub fn flush(&self) -> usize {
        let (events, subscribers, sequence) = {
            let mut inner = self.lock();
            if inner.pending.is_empty() {
                return 0;
            }
            inner.sequence += 1;
            let events = std::mem::take(&mut inner.pending);
            let subscribers: Vec<(String, FuelSubscriber)> = inner
                .subscribers
                .iter()
                .map(|s| (s.name.clone(), Arc::clone(&s.callback)))
                .collect();
            (events, subscribers, inner.sequence)
        };

        let mut delivered = 0;
        for event in &events {
            for (ordinal, (name, callback)) in subscribers.iter().enumerate() {
                let notification = FuelNotification {
                    kind: event.kind,
                    sequence,
                    stagger_offset: self.stagger * ordinal as u32,
                    calculations: event.calculations.clone(),
                };
                tracing::trace!("Delivering {} #{} to '{}'", event.kind, sequence, name);
                callback(&notification);
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(queue: &NotificationQueue, name: &str) -> Arc<Mutex<Vec<(FuelEventKind, u64, Duration)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        queue.subscribe(name, move |n: &FuelNotification| {
            sink.lock().unwrap().push((n.kind, n.sequence, n.stagger_offset));
        });
        seen
    }

    #[test]
    fn bursts_coalesce_by_kind_keeping_order() {
        let queue = NotificationQueue::new(Duration::from_millis(10));
        let seen = recorder(&queue, "panel");

        queue.enqueue(FuelEventKind::WaypointsUpdated, None);
        queue.enqueue(FuelEventKind::AircraftUpdated, None);
        queue.enqueue(FuelEventKind::WaypointsUpdated, None);
        assert_eq!(queue.pending_len(), 2);

        assert_eq!(queue.flush(), 2);
        let kinds: Vec<FuelEventKind> = seen.lock().unwrap().iter().map(|e| e.0).collect();
        assert_eq!(
            kinds,
            vec![FuelEventKind::WaypointsUpdated, FuelEventKind::AircraftUpdated]
        );
        assert_eq!(queue.flush(), 0);
    }

    #[test]
    fn subscribers_are_staggered_in_registration_order() {
        let queue = NotificationQueue::new(Duration::from_millis(10));
        let first = recorder(&queue, "first");
        let second = recorder(&queue, "second");

        queue.enqueue(FuelEventKind::PolicyUpdated, None);
        queue.flush();

        assert_eq!(first.lock().unwrap()[0], (FuelEventKind::PolicyUpdated, 1, Duration::ZERO));
        assert_eq!(
            second.lock().unwrap()[0],
            (FuelEventKind::PolicyUpdated, 1, Duration::from_millis(10))
        );
    }

    #[test]
    fn unsubscribed_callbacks_stop_receiving() {
        let queue = NotificationQueue::new(Duration::ZERO);
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let handle = queue.subscribe("counter", move |_: &FuelNotification| {
            *sink.lock().unwrap() += 1;
        });
        let id = handle.id();

        queue.enqueue(FuelEventKind::WeatherUpdated, None);
        queue.flush();
        assert!(handle.unsubscribe());
        assert!(!queue.unsubscribe(id));
        queue.enqueue(FuelEventKind::WeatherUpdated, None);
        queue.flush();

        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(queue.subscriber_count(), 0);
    }

    #[test]
    fn handle_outliving_queue_is_harmless() {
        let queue = NotificationQueue::new(Duration::ZERO);
        let handle = queue.subscribe("late", |_: &FuelNotification| {});
        drop(queue);
        assert!(!handle.unsubscribe());
    }

    #[test]
    fn callbacks_may_enqueue_during_flush() {
        let queue = Arc::new(NotificationQueue::new(Duration::ZERO));
        let inner = Arc::clone(&queue);
        queue.subscribe("echo", move |n: &FuelNotification| {
            if n.kind == FuelEventKind::WaypointsUpdated {
                inner.enqueue(FuelEventKind::CalculationsUpdated, None);
            }
        });

        queue.enqueue(FuelEventKind::WaypointsUpdated, None);
        assert_eq!(queue.flush(), 1);
        assert_eq!(queue.pending_len(), 1);
    }
}
