//! Sequence event log
//!
//! Every step the director takes is recorded as a timestamped
//! `SequenceEvent`, with a compact one-line text form for log output.

mod bus;
mod format;
mod types;

pub use bus::{BusEvent, SequenceEventBus};
pub use format::{parse_line, serialize_event};
pub use types::{SequenceEvent, StartCause};
