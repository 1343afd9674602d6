//! Dialogue box collaborator
//!
//! Holds at most one conversation. Lines advance on player input
//! (`next_line`) or, when configured, automatically after a fixed time.
//! Closing the last line hands back the completion payload given to `show`.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// What a `dialogue` action asks the box to show
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueSpec {
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub portrait: Option<String>,
}

impl DialogueSpec {
    pub fn single(speaker: Option<&str>, line: &str) -> Self {
        Self {
            speaker: speaker.map(str::to_string),
            lines: vec![line.to_string()],
            portrait: None,
        }
    }
}

#[derive(Debug)]
struct OpenDialogue<C> {
    spec: DialogueSpec,
    line: usize,
    line_elapsed_ms: f32,
    on_complete: C,
}

#[derive(Debug)]
pub struct DialogueBox<C> {
    open: Option<OpenDialogue<C>>,
    /// Auto-advance each line after this long (None = wait for input)
    pub auto_advance_ms: Option<f32>,
    shown: usize,
}

impl<C> Default for DialogueBox<C> {
    fn default() -> Self {
        Self {
            open: None,
            auto_advance_ms: None,
            shown: 0,
        }
    }
}

impl<C> DialogueBox<C> {
    /// Open a conversation. Returns the completion payload of a conversation
    /// that was still open and got replaced; it will never fire.
    pub fn show(&mut self, spec: DialogueSpec, on_complete: C) -> Option<C> {
        let replaced = self.open.take().map(|open| {
            warn!("Dialogue replaced while still open ({:?})", open.spec.speaker);
            open.on_complete
        });
        self.shown += 1;
        self.open = Some(OpenDialogue {
            spec,
            line: 0,
            line_elapsed_ms: 0.0,
            on_complete,
        });
        replaced
    }

    pub fn is_active(&self) -> bool {
        self.open.is_some()
    }

    pub fn speaker(&self) -> Option<&str> {
        self.open.as_ref()?.spec.speaker.as_deref()
    }

    pub fn current_line(&self) -> Option<&str> {
        let open = self.open.as_ref()?;
        open.spec.lines.get(open.line).map(String::as_str)
    }

    /// Number of conversations opened since creation
    pub fn shown_count(&self) -> usize {
        self.shown
    }

    /// Step to the next line; closing the last one returns the payload
    pub fn next_line(&mut self) -> Option<C> {
        let open = self.open.as_mut()?;
        open.line += 1;
        open.line_elapsed_ms = 0.0;
        if open.line < open.spec.lines.len() {
            return None;
        }
        self.open.take().map(|open| open.on_complete)
    }

    /// Auto-advance timing
    pub fn tick(&mut self, dt_ms: f32) -> Option<C> {
        let auto = self.auto_advance_ms?;
        let open = self.open.as_mut()?;
        open.line_elapsed_ms += dt_ms;
        if open.line_elapsed_ms >= auto {
            return self.next_line();
        }
        None
    }

    /// Close without finishing the remaining lines
    pub fn close(&mut self) -> Option<C> {
        self.open.take().map(|open| open.on_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_lines() -> DialogueSpec {
        DialogueSpec {
            speaker: Some("Boss".into()),
            lines: vec!["You made it.".into(), "Too bad.".into()],
            portrait: None,
        }
    }

    #[test]
    fn test_lines_then_completion() {
        let mut dialogue: DialogueBox<u32> = DialogueBox::default();
        dialogue.show(two_lines(), 5);
        assert_eq!(dialogue.current_line(), Some("You made it."));
        assert_eq!(dialogue.next_line(), None);
        assert_eq!(dialogue.current_line(), Some("Too bad."));
        assert_eq!(dialogue.next_line(), Some(5));
        assert!(!dialogue.is_active());
        assert_eq!(dialogue.next_line(), None);
    }

    #[test]
    fn test_empty_dialogue_closes_on_first_advance() {
        let mut dialogue: DialogueBox<u32> = DialogueBox::default();
        dialogue.show(DialogueSpec::default(), 1);
        assert_eq!(dialogue.current_line(), None);
        assert_eq!(dialogue.next_line(), Some(1));
    }

    #[test]
    fn test_auto_advance() {
        let mut dialogue: DialogueBox<u32> = DialogueBox {
            auto_advance_ms: Some(1000.0),
            ..Default::default()
        };
        dialogue.show(two_lines(), 2);
        assert_eq!(dialogue.tick(999.0), None);
        assert_eq!(dialogue.tick(1.0), None);
        assert_eq!(dialogue.current_line(), Some("Too bad."));
        assert_eq!(dialogue.tick(1000.0), Some(2));
    }

    #[test]
    fn test_replacing_returns_old_payload() {
        let mut dialogue: DialogueBox<u32> = DialogueBox::default();
        assert_eq!(dialogue.show(two_lines(), 1), None);
        assert_eq!(dialogue.show(two_lines(), 2), Some(1));
        assert_eq!(dialogue.shown_count(), 2);
        assert_eq!(dialogue.close(), Some(2));
    }
}
