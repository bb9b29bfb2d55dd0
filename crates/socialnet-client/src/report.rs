//! Structured results of the user-facing actions, with console rendering.

use crate::command::MessageOutcome;
use crate::conversation::Conversation;
use socialnet_core::{Notification, TimelinePost};
use std::fmt;

/// Result of checking notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReport {
    pub notifications: Vec<Notification>,
}

impl NotificationReport {
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

impl fmt::Display for NotificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.notifications.is_empty() {
            return writeln!(f, "no new notifications");
        }
        for (idx, notification) in self.notifications.iter().enumerate() {
            writeln!(f, "[{}] {}", idx + 1, notification)?;
        }
        Ok(())
    }
}

/// Result of sending a private message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReport {
    pub outcome: MessageOutcome,
    /// Refreshed history, fetched only after a successful send.
    pub conversation: Option<Conversation>,
}

/// Posts as received, rendered one block per post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineView<'a>(pub &'a [TimelinePost]);

impl fmt::Display for TimelineView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Posts ---")?;
        if self.0.is_empty() {
            return writeln!(f, "no posts yet");
        }
        for post in self.0 {
            writeln!(f, "{}", "-".repeat(34))?;
            writeln!(f, "User: {}", post.author)?;
            writeln!(f, "Text: {}", post.text)?;
            writeln!(f, "Sent at: {}", post.sent_at)?;
        }
        Ok(())
    }
}
