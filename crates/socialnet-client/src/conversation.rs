//! Rendering of a private conversation.

use chrono::{Local, TimeZone};
use socialnet_core::{MessageTime, PrivateMessage};
use std::fmt;

/// Shown instead of a time of day when the stored timestamp is unusable.
pub const PLACEHOLDER_TIME: &str = "??:??";

/// Width of the gutter that pushes own messages to the right.
const RIGHT_GUTTER: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Written by the other party.
    Left,
    /// Written by this user.
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationLine {
    pub sender: String,
    pub text: String,
    /// `HH:MM` in local time, or [`PLACEHOLDER_TIME`].
    pub time: String,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    peer: String,
    lines: Vec<ConversationLine>,
}

impl Conversation {
    /// Lay out `messages` as seen by `me`.
    pub fn render(me: &str, peer: &str, messages: &[PrivateMessage]) -> Self {
        let lines = messages
            .iter()
            .map(|m| ConversationLine {
                sender: m.sender.clone(),
                text: m.text.clone(),
                time: time_of_day(&m.sent_at),
                alignment: if m.sender == me {
                    Alignment::Right
                } else {
                    Alignment::Left
                },
            })
            .collect();
        Self {
            peer: peer.to_string(),
            lines,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn lines(&self) -> &[ConversationLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn time_of_day(sent_at: &MessageTime) -> String {
    sent_at
        .epoch_seconds()
        .and_then(|secs| Local.timestamp_opt(secs, 0).single())
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| PLACEHOLDER_TIME.to_string())
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Conversation with {}", self.peer)?;
        writeln!(f, "{}", "-".repeat(50))?;
        if self.lines.is_empty() {
            return writeln!(f, "no messages yet");
        }
        for line in &self.lines {
            match line.alignment {
                Alignment::Right => writeln!(
                    f,
                    "{:>width$} {}: {}  🕒{}",
                    "",
                    line.sender,
                    line.text,
                    line.time,
                    width = RIGHT_GUTTER
                )?,
                Alignment::Left => {
                    writeln!(f, "{}: {}  🕒{}", line.sender, line.text, line.time)?
                }
            }
        }
        Ok(())
    }
}
