//! Push notifications.
//!
//! Frame format: `topic text`
//!
//! The server publishes every notification prefixed with the recipient's
//! topic. Subscribers match on that prefix, so a topic is also a filter:
//! subscribing to `user_1` receives frames for `user_1` and `user_10`
//! alike. Topics handed out at registration avoid that overlap.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A notification received on the subscribe channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Notification {
    topic: String,
    text: String,
}

impl Notification {
    /// Create a new notification.
    pub fn new(topic: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            text: text.into(),
        }
    }

    /// Split a raw frame at the first space. A frame without one is all topic.
    pub fn parse(frame: &str) -> Self {
        match frame.split_once(' ') {
            Some((topic, text)) => Self::new(topic, text),
            None => Self::new(frame, ""),
        }
    }

    /// Whether a raw frame is addressed to `topic` (prefix match).
    pub fn is_addressed_to(frame: &str, topic: &str) -> bool {
        frame.starts_with(topic)
    }

    /// The topic this notification was published on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The human-readable body.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The frame as it travels on the wire.
    pub fn to_frame(&self) -> String {
        if self.text.is_empty() {
            self.topic.clone()
        } else {
            format!("{} {}", self.topic, self.text)
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<String> for Notification {
    fn from(frame: String) -> Self {
        Self::parse(&frame)
    }
}

impl From<Notification> for String {
    fn from(notification: Notification) -> Self {
        notification.to_frame()
    }
}
