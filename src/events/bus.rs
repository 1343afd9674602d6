//! Sequence event bus
//!
//! The director emits a `SequenceEvent` for every lifecycle step. Host
//! systems drain them for logging; tests and the scenario runner read the
//! full history to check ordering and progress.

use super::types::SequenceEvent;

/// Events kept per queue (pending and processed); older ones are dropped
const CAPACITY: usize = 4096;

fn keep_newest(events: &mut Vec<BusEvent>) {
    if events.len() > CAPACITY {
        let excess = events.len() - CAPACITY;
        events.drain(..excess);
    }
}

/// Timestamped event for the event bus
#[derive(Debug, Clone)]
pub struct BusEvent {
    /// Stage time in milliseconds
    pub time_ms: u32,
    /// The event data
    pub event: SequenceEvent,
}

#[derive(Debug, Default)]
pub struct SequenceEventBus {
    /// Events emitted since the last drain
    pending: Vec<BusEvent>,

    /// Events that have been drained
    processed: Vec<BusEvent>,

    /// Current stage time in milliseconds (for timestamping)
    elapsed_ms: u32,

    /// Whether the bus is enabled
    enabled: bool,
}

impl SequenceEventBus {
    /// Create a new enabled event bus
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Create a disabled event bus (events are dropped)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Update the timestamp used for subsequent events
    pub fn update_time(&mut self, elapsed_ms: f64) {
        self.elapsed_ms = elapsed_ms.max(0.0) as u32;
    }

    /// Emit an event to the bus
    pub fn emit(&mut self, event: SequenceEvent) {
        if !self.enabled {
            return;
        }
        self.pending.push(BusEvent {
            time_ms: self.elapsed_ms,
            event,
        });
        keep_newest(&mut self.pending);
    }

    /// Get pending events (does not drain)
    pub fn peek(&self) -> &[BusEvent] {
        &self.pending
    }

    /// Drain pending events, moving them to processed
    pub fn drain(&mut self) -> Vec<BusEvent> {
        let events = std::mem::take(&mut self.pending);
        self.processed.extend(events.iter().cloned());
        keep_newest(&mut self.processed);
        events
    }

    /// Get all drained events
    pub fn processed(&self) -> &[BusEvent] {
        &self.processed
    }

    /// Every event ever emitted (processed first, then pending)
    pub fn history(&self) -> impl Iterator<Item = &BusEvent> {
        self.processed.iter().chain(self.pending.iter())
    }

    pub fn clear_processed(&mut self) {
        self.processed.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_drain() {
        let mut bus = SequenceEventBus::new();
        bus.update_time(1500.0);

        bus.emit(SequenceEvent::LevelRequested {
            level: "docks".into(),
        });

        assert_eq!(bus.pending_count(), 1);
        assert!(bus.has_pending());

        let events = bus.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time_ms, 1500);
        assert_eq!(bus.pending_count(), 0);
        assert_eq!(bus.processed().len(), 1);
    }

    #[test]
    fn test_history_spans_drains() {
        let mut bus = SequenceEventBus::new();
        bus.emit(SequenceEvent::Advanced {
            sequence: "intro".into(),
            cursor: 1,
        });
        bus.drain();
        bus.emit(SequenceEvent::Advanced {
            sequence: "intro".into(),
            cursor: 2,
        });
        assert_eq!(bus.history().count(), 2);
    }

    #[test]
    fn test_undrained_bus_keeps_newest() {
        let mut bus = SequenceEventBus::new();
        for cursor in 0..CAPACITY + 10 {
            bus.emit(SequenceEvent::Advanced {
                sequence: "loop".into(),
                cursor,
            });
        }
        assert_eq!(bus.pending_count(), CAPACITY);
        assert!(matches!(
            &bus.peek()[0].event,
            SequenceEvent::Advanced { cursor: 10, .. }
        ));
        assert!(matches!(
            &bus.peek()[CAPACITY - 1].event,
            SequenceEvent::Advanced { cursor, .. } if *cursor == CAPACITY + 9
        ));
    }

    #[test]
    fn test_disabled_bus() {
        let mut bus = SequenceEventBus::disabled();
        bus.emit(SequenceEvent::LevelRequested {
            level: "docks".into(),
        });
        assert_eq!(bus.pending_count(), 0);
    }
}
