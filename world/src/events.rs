//! Typed event channel owned by the session context.

use std::collections::BTreeMap;

use wave_director_core::Event;

/// Identifier returned when subscribing to the event bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u32);

impl SubscriberId {
    /// Numeric representation of the subscriber.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Broadcast channel that keeps one ordered queue per subscriber.
///
/// Events published while nobody listens are dropped. Unsubscribing discards
/// the subscriber's pending queue immediately.
#[derive(Debug, Default)]
pub struct EventBus {
    next_id: u32,
    queues: BTreeMap<SubscriberId, Vec<Event>>,
}

impl EventBus {
    /// Creates an empty event bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    pub fn subscribe(&mut self) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let _ = self.queues.insert(id, Vec::new());
        id
    }

    /// Removes a subscriber, returning whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.queues.remove(&id).is_some()
    }

    /// Appends the event to every subscriber's queue.
    pub fn publish(&mut self, event: Event) {
        log::trace!("event published: {event:?}");
        for queue in self.queues.values_mut() {
            queue.push(event.clone());
        }
    }

    /// Takes every queued event for the subscriber.
    pub fn drain(&mut self, id: SubscriberId) -> Vec<Event> {
        self.queues
            .get_mut(&id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.queues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_events_independently() {
        let mut bus = EventBus::new();
        let ui = bus.subscribe();
        bus.publish(Event::Victory);
        let late = bus.subscribe();
        bus.publish(Event::Defeat);

        assert_eq!(bus.drain(ui), vec![Event::Victory, Event::Defeat]);
        assert_eq!(bus.drain(late), vec![Event::Defeat]);
        assert!(bus.drain(ui).is_empty(), "drain must empty the queue");
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let id = bus.subscribe();
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(Event::Victory);
        assert!(bus.drain(id).is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
