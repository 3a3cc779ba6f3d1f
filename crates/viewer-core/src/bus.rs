//! Event bus: fans registry mutations out to live subscribers.
//!
//! Each subscriber owns a slot holding a soft-bounded queue and a condition
//! variable. Publishing never waits on a subscriber: it appends under the
//! slot's own mutex and signals. A subscriber that falls behind has its
//! superseded show events coalesced instead of stalling the producer.
//!
//! The bus itself does not know about the registry. The registry publishes
//! while holding its write lock and attaches new subscribers while holding
//! its read lock, which is what makes replay and the live stream seamless.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;
use viewer_types::ShowEvent;

use crate::error::{ViewerError, ViewerResult};

/// Outcome of one receive call on a [`Subscription`].
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// The next event in registry order.
    Event(ShowEvent),
    /// Nothing arrived within the keep-alive window.
    KeepAlive,
    /// The subscription was cancelled through its token or dropped.
    Cancelled,
    /// The bus was shut down and every pending event has been delivered.
    Closed,
}

/// Synchronous observer of published batches.
///
/// Called while the registry's write lock is held, so implementations must
/// be quick and must not call back into the registry's mutating API.
pub trait BusListener: Send + Sync {
    fn on_events(&self, events: &[ShowEvent]);
}

#[derive(Debug, Default)]
struct SlotState {
    pending: VecDeque<ShowEvent>,
    cancelled: bool,
    closed: bool,
    coalesced: u64,
    overflowing: bool,
}

impl SlotState {
    /// Append an event, coalescing superseded shows once the queue is full.
    fn push(&mut self, event: ShowEvent, capacity: usize, subscriber: Uuid) {
        if self.pending.len() >= capacity {
            if let Some(pos) = self.superseded_by(&event) {
                self.pending.remove(pos);
                self.coalesced += 1;
            } else if let Some(pos) = self.oldest_superseded_show() {
                self.pending.remove(pos);
                self.coalesced += 1;
            } else if !self.overflowing {
                self.overflowing = true;
                warn!(
                    %subscriber,
                    pending = self.pending.len(),
                    capacity,
                    "subscriber queue over capacity with nothing to coalesce"
                );
            }
        } else {
            self.overflowing = false;
        }
        self.pending.push_back(event);
    }

    /// A pending show for the same name as the incoming event.
    fn superseded_by(&self, incoming: &ShowEvent) -> Option<usize> {
        self.pending
            .iter()
            .position(|e| !e.removed && e.name == incoming.name)
    }

    /// The oldest pending show that has a later pending event for its name.
    fn oldest_superseded_show(&self) -> Option<usize> {
        self.pending.iter().enumerate().find_map(|(i, e)| {
            let newer = self
                .pending
                .iter()
                .skip(i + 1)
                .any(|later| later.name == e.name);
            (!e.removed && newer).then_some(i)
        })
    }
}

type SlotList = Mutex<Vec<Arc<Slot>>>;

struct Slot {
    id: Uuid,
    state: Mutex<SlotState>,
    ready: Condvar,
    /// The bus list holding this slot, so cancelling can detach it at once.
    owner: Weak<SlotList>,
}

impl Slot {
    /// Mark cancelled, wake the receiver and drop the bus's reference.
    ///
    /// The slot lock is released before the list lock is taken; `publish`
    /// takes them in the opposite order.
    fn cancel(&self) {
        let first = {
            let mut state = self.state.lock();
            !std::mem::replace(&mut state.cancelled, true)
        };
        self.ready.notify_all();
        if let Some(list) = self.owner.upgrade() {
            list.lock().retain(|slot| slot.id != self.id);
        }
        if first {
            debug!(subscriber = %self.id, "released cancelled subscriber");
        }
    }

    fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}

/// Fan-out point for registry events.
pub struct EventBus {
    slots: Arc<SlotList>,
    listeners: RwLock<Vec<Weak<dyn BusListener>>>,
    shut_down: AtomicBool,
    keepalive: Duration,
    capacity: usize,
}

impl EventBus {
    pub fn new(keepalive: Duration, capacity: usize) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Vec::new())),
            listeners: RwLock::new(Vec::new()),
            shut_down: AtomicBool::new(false),
            keepalive,
            capacity: capacity.max(1),
        }
    }

    /// Register a synchronous listener. Held weakly; a dropped listener is
    /// skipped and forgotten.
    pub fn add_listener(&self, listener: Weak<dyn BusListener>) {
        self.listeners.write().push(listener);
    }

    /// Number of live (not cancelled) subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|slot| !slot.is_cancelled())
            .count()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Create a subscription whose queue starts with `replay`.
    ///
    /// Callers must hold whatever lock orders `replay` against concurrent
    /// publishes; the registry does this with its read lock.
    pub(crate) fn attach(&self, replay: Vec<ShowEvent>) -> ViewerResult<Subscription> {
        if self.is_shut_down() {
            return Err(ViewerError::Shutdown);
        }

        let slot = Arc::new(Slot {
            id: Uuid::new_v4(),
            state: Mutex::new(SlotState {
                pending: replay.into(),
                ..SlotState::default()
            }),
            ready: Condvar::new(),
            owner: Arc::downgrade(&self.slots),
        });
        self.slots.lock().push(Arc::clone(&slot));
        debug!(subscriber = %slot.id, "subscriber attached");

        Ok(Subscription {
            slot,
            keepalive: self.keepalive,
        })
    }

    /// Deliver one batch to every listener and subscriber.
    ///
    /// The whole batch is appended to each queue under a single slot lock,
    /// so no receiver can observe part of it without the rest queued.
    pub(crate) fn publish(&self, events: &[ShowEvent]) {
        if events.is_empty() {
            return;
        }

        {
            let mut listeners = self.listeners.write();
            listeners.retain(|weak| match weak.upgrade() {
                Some(listener) => {
                    listener.on_events(events);
                    true
                }
                None => false,
            });
        }

        let mut slots = self.slots.lock();
        slots.retain(|slot| {
            let mut state = slot.state.lock();
            if state.cancelled {
                return false;
            }
            for event in events {
                state.push(event.clone(), self.capacity, slot.id);
            }
            drop(state);
            slot.ready.notify_all();
            true
        });
    }

    /// Close every subscription and refuse new ones.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let slots = std::mem::take(&mut *self.slots.lock());
        for slot in &slots {
            slot.state.lock().closed = true;
            slot.ready.notify_all();
        }
        debug!(subscribers = slots.len(), "event bus shut down");
    }
}

/// Handle that cancels a subscription from any thread.
#[derive(Clone)]
pub struct CancelToken {
    slot: Weak<Slot>,
}

impl CancelToken {
    /// Wake the subscriber and make every later receive return `Cancelled`.
    pub fn cancel(&self) {
        if let Some(slot) = self.slot.upgrade() {
            slot.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.slot.upgrade().map_or(true, |slot| slot.is_cancelled())
    }
}

/// One consumer's ordered view of the registry's event stream.
///
/// Starts with a synthetic show per visible object, then carries every
/// later mutation. Dropping it cancels the subscription.
pub struct Subscription {
    slot: Arc<Slot>,
    keepalive: Duration,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.slot.id
    }

    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            slot: Arc::downgrade(&self.slot),
        }
    }

    pub fn cancel(&self) {
        self.slot.cancel();
    }

    /// Wait for the next event using the bus's keep-alive window.
    pub fn recv(&self) -> Delivery {
        self.recv_timeout(self.keepalive)
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Delivery {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.state.lock();
        loop {
            if state.cancelled {
                return Delivery::Cancelled;
            }
            if let Some(event) = state.pending.pop_front() {
                return Delivery::Event(event);
            }
            if state.closed {
                return Delivery::Closed;
            }
            if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
                if state.cancelled {
                    return Delivery::Cancelled;
                }
                return match state.pending.pop_front() {
                    Some(event) => Delivery::Event(event),
                    None if state.closed => Delivery::Closed,
                    None => Delivery::KeepAlive,
                };
            }
        }
    }

    /// Take every queued event without waiting.
    pub fn drain(&self) -> Vec<ShowEvent> {
        self.slot.state.lock().pending.drain(..).collect()
    }

    /// Events currently queued.
    pub fn pending_len(&self) -> usize {
        self.slot.state.lock().pending.len()
    }

    /// Show events dropped because a newer event for the same name was queued.
    pub fn coalesced_count(&self) -> u64 {
        self.slot.state.lock().coalesced
    }
}

impl Iterator for Subscription {
    type Item = Delivery;

    /// Yields events and keep-alives; ends once cancelled or closed.
    fn next(&mut self) -> Option<Delivery> {
        match self.recv() {
            Delivery::Cancelled | Delivery::Closed => None,
            delivery => Some(delivery),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.slot.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewer_types::ContentHash;

    fn event(sequence: u64, name: &str, revision: u64, removed: bool) -> ShowEvent {
        ShowEvent {
            sequence,
            name: name.to_string(),
            revision,
            content_hash: ContentHash(revision),
            removed,
            timestamp: 0.0,
        }
    }

    fn bus(capacity: usize) -> EventBus {
        EventBus::new(Duration::from_millis(20), capacity)
    }

    #[test]
    fn replay_comes_before_live_events() {
        let bus = bus(16);
        let sub = bus.attach(vec![event(1, "a", 1, false)]).unwrap();
        bus.publish(&[event(2, "b", 1, false)]);

        let seqs: Vec<u64> = sub.drain().iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn idle_receive_yields_keepalive() {
        let bus = bus(16);
        let sub = bus.attach(Vec::new()).unwrap();
        assert_eq!(sub.recv(), Delivery::KeepAlive);
    }

    #[test]
    fn full_queue_drops_pending_show_of_same_name() {
        let bus = bus(2);
        let sub = bus.attach(Vec::new()).unwrap();
        bus.publish(&[event(1, "a", 1, false), event(2, "b", 1, false)]);
        bus.publish(&[event(3, "a", 2, false)]);

        let got: Vec<(String, u64)> = sub
            .drain()
            .into_iter()
            .map(|e| (e.name, e.revision))
            .collect();
        assert_eq!(got, vec![("b".to_string(), 1), ("a".to_string(), 2)]);
        assert_eq!(sub.coalesced_count(), 1);
    }

    #[test]
    fn removals_are_never_coalesced() {
        let bus = bus(2);
        let sub = bus.attach(Vec::new()).unwrap();
        bus.publish(&[event(1, "a", 1, true), event(2, "b", 1, true)]);
        bus.publish(&[event(3, "c", 1, true)]);

        assert_eq!(sub.pending_len(), 3);
        assert_eq!(sub.coalesced_count(), 0);
    }

    #[test]
    fn cancel_wakes_blocked_receiver() {
        let bus = Arc::new(EventBus::new(Duration::from_secs(30), 16));
        let sub = bus.attach(Vec::new()).unwrap();
        let token = sub.cancel_token();

        let waiter = std::thread::spawn(move || {
            let started = Instant::now();
            let delivery = sub.recv();
            (delivery, started.elapsed())
        });
        std::thread::sleep(Duration::from_millis(20));
        token.cancel();

        let (delivery, waited) = waiter.join().unwrap();
        assert_eq!(delivery, Delivery::Cancelled);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn dropped_subscriptions_are_released_without_a_publish() {
        let bus = bus(16);
        for _ in 0..1000 {
            let sub = bus.attach(vec![event(1, "a", 1, false)]).unwrap();
            drop(sub);
        }
        assert!(bus.slots.lock().is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn token_cancel_releases_slot_but_not_the_receiver() {
        let bus = bus(16);
        let sub = bus.attach(Vec::new()).unwrap();
        let token = sub.cancel_token();

        token.cancel();
        assert!(bus.slots.lock().is_empty());
        assert!(token.is_cancelled());
        assert_eq!(sub.recv(), Delivery::Cancelled);

        bus.publish(&[event(1, "a", 1, false)]);
        assert_eq!(sub.pending_len(), 0);
    }

    #[test]
    fn shutdown_closes_after_pending_events() {
        let bus = bus(16);
        let sub = bus.attach(vec![event(1, "a", 1, false)]).unwrap();
        bus.shutdown();

        assert!(matches!(sub.recv(), Delivery::Event(_)));
        assert_eq!(sub.recv(), Delivery::Closed);
        assert!(matches!(bus.attach(Vec::new()), Err(ViewerError::Shutdown)));
    }
}
