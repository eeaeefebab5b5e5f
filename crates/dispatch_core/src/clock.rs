//! Simulation clock: a deterministic min-heap of future events.
//!
//! All timestamps and delays are abstract simulated seconds. Events scheduled
//! for the same instant pop in insertion order, so same-tick interleavings are
//! reproducible across runs with the same seed.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::{Entity, Resource};

pub const ONE_MIN_SECS: u64 = 60;
pub const ONE_HOUR_SECS: u64 = 60 * ONE_MIN_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    SimulationStarted,
    SubmitOrder,
    SpawnCourier,
    DispatcherTick,
    CancellationCheck,
    NotificationDecision,
    EvaluateRelocation,
    MoveStep,
    ExecuteNextStop,
    ServiceComplete,
    CourierLogOff,
}

/// Entity the event is addressed to, when it targets one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventSubject {
    Courier(Entity),
    Order(Entity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: u64,
    pub kind: EventKind,
    pub subject: Option<EventSubject>,
    /// Insertion order, used to break ties at equal timestamps.
    seq: u64,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap: earliest timestamp
        // first, FIFO within a timestamp.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The event currently being processed by the schedule.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

#[derive(Debug, Default, Resource)]
pub struct SimulationClock {
    now: u64,
    next_seq: u64,
    events: BinaryHeap<Event>,
}

impl SimulationClock {
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn schedule_at(&mut self, timestamp: u64, kind: EventKind, subject: Option<EventSubject>) {
        debug_assert!(
            timestamp >= self.now,
            "event timestamp must be >= current time"
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            timestamp,
            kind,
            subject,
            seq,
        });
    }

    pub fn schedule_in(&mut self, delay: u64, kind: EventKind, subject: Option<EventSubject>) {
        self.schedule_at(self.now + delay, kind, subject);
    }

    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|e| e.timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pops_events_in_time_order() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(10, EventKind::DispatcherTick, None);
        clock.schedule_at(5, EventKind::SubmitOrder, None);
        clock.schedule_at(20, EventKind::DispatcherTick, None);

        let first = clock.pop_next().expect("first event");
        assert_eq!(first.timestamp, 5);
        assert_eq!(clock.now(), 5);

        let second = clock.pop_next().expect("second event");
        assert_eq!(second.timestamp, 10);

        let third = clock.pop_next().expect("third event");
        assert_eq!(third.timestamp, 20);
        assert_eq!(clock.now(), 20);

        assert!(clock.pop_next().is_none());
        assert!(clock.is_empty());
    }

    #[test]
    fn same_instant_events_pop_in_insertion_order() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(7, EventKind::CancellationCheck, None);
        clock.schedule_at(7, EventKind::NotificationDecision, None);
        clock.schedule_at(7, EventKind::DispatcherTick, None);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| clock.pop_next())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::CancellationCheck,
                EventKind::NotificationDecision,
                EventKind::DispatcherTick,
            ]
        );
    }

    #[test]
    fn schedule_in_offsets_from_current_time() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(100, EventKind::DispatcherTick, None);
        clock.pop_next().expect("tick");
        clock.schedule_in(30, EventKind::ExecuteNextStop, None);

        let next = clock.pop_next().expect("follow-up");
        assert_eq!(next.timestamp, 130);
    }
}
