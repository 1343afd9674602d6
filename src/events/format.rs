//! Compact text format for sequence events
//!
//! Format: `T:NNNNN|CODE|data...`
//! - T:NNNNN = timestamp in milliseconds (5 digits, wraps at 99999)
//! - CODE = 2-char event type code
//! - data = pipe-separated values specific to event type
//!
//! Examples:
//! ```text
//! T:01200|SS|docks_ambush|1|T
//! T:01200|AD|docks_ambush|0|pause
//! T:01210|AV|docks_ambush|1
//! T:31210|TO|docks_ambush|4|waitForEnemiesCleared
//! T:31230|SC|docks_ambush|6
//! ```

use super::types::SequenceEvent;

/// Pipes would break the field split; free text gets them replaced
fn clean(text: &str) -> String {
    text.replace('|', "/")
}

/// Serialize a SequenceEvent to compact text format
pub fn serialize_event(time_ms: u32, event: &SequenceEvent) -> String {
    let ts = format!("T:{:05}", time_ms % 100000);
    let code = event.type_code();

    let data = match event {
        SequenceEvent::Started { sequence, run, cause } => format!("{}|{}|{}", sequence, run, cause),
        SequenceEvent::Completed { sequence, cursor } => format!("{}|{}", sequence, cursor),
        SequenceEvent::Abandoned {
            sequence,
            cursor,
            reason,
        } => format!("{}|{}|{}", sequence, cursor, clean(reason)),
        SequenceEvent::Chained { from, to } => format!("{}|{}", from, to),
        SequenceEvent::ActionDispatched {
            sequence,
            cursor,
            action,
        } => format!("{}|{}|{}", sequence, cursor, action),
        SequenceEvent::Advanced { sequence, cursor } => format!("{}|{}", sequence, cursor),
        SequenceEvent::ActionSkipped {
            sequence,
            cursor,
            action,
            reason,
        } => format!("{}|{}|{}|{}", sequence, cursor, action, clean(reason)),
        SequenceEvent::TimedOut {
            sequence,
            cursor,
            action,
        } => format!("{}|{}|{}", sequence, cursor, action),
        SequenceEvent::LevelRequested { level } => level.clone(),
        SequenceEvent::ActorSpawned { actor, kind, label } => format!("{}|{}|{}", actor, kind, clean(label)),
        SequenceEvent::ActorDestroyed { actor, label } => format!("{}|{}", actor, clean(label)),
    };

    format!("{}|{}|{}", ts, code, data)
}

/// Split a line into (timestamp, code, data fields)
pub fn parse_line(line: &str) -> Option<(u32, &str, Vec<&str>)> {
    let mut parts = line.trim().split('|');
    let time_ms = parts.next()?.strip_prefix("T:")?.parse().ok()?;
    let code = parts.next()?;
    Some((time_ms, code, parts.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_line_layout() {
        let event = SequenceEvent::ActionSkipped {
            sequence: "bridge".into(),
            cursor: 2,
            action: "destroyEnemy".into(),
            reason: "no target matches 'enemy_9'".into(),
        };
        let line = serialize_event(123_456, &event);
        assert_eq!(line, "T:23456|AK|bridge|2|destroyEnemy|no target matches 'enemy_9'");

        let (time_ms, code, fields) = parse_line(&line).unwrap();
        assert_eq!(time_ms, 23456);
        assert_eq!(code, "AK");
        assert_eq!(fields, vec!["bridge", "2", "destroyEnemy", "no target matches 'enemy_9'"]);
    }

    #[test]
    fn test_free_text_pipes_are_replaced() {
        let event = SequenceEvent::Abandoned {
            sequence: "s".into(),
            cursor: 0,
            reason: "a|b".into(),
        };
        let line = serialize_event(0, &event);
        assert_eq!(parse_line(&line).unwrap().2.len(), 3);
    }
}
