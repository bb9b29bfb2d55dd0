//! Command records.
//!
//! Field names are part of the wire contract with the server and are kept
//! verbatim through `serde(rename)`; the Rust names describe what they hold.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A command sent from client to server on the request-reply channel.
///
/// Every command produces exactly one reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Claim a username and receive an id plus a notification topic.
    #[serde(rename = "add_user")]
    Register { username: String },
    /// Publish a post on the shared timeline.
    PostText {
        username: String,
        id: u64,
        #[serde(rename = "texto")]
        text: String,
        /// Local send time, `YYYY-MM-DDTHH:MM:SS`.
        #[serde(rename = "tempoEnvioMensagem")]
        sent_at: String,
    },
    /// Follow another user by name.
    #[serde(rename = "add_follower")]
    Follow {
        id: u64,
        #[serde(rename = "to_follow")]
        target: String,
    },
    /// Send a direct message.
    #[serde(rename = "add_private_message")]
    SendPrivateMessage {
        #[serde(rename = "remetente")]
        sender: String,
        #[serde(rename = "destinatario")]
        recipient: String,
        #[serde(rename = "mensagem")]
        text: String,
        /// Unix epoch seconds.
        timestamp: i64,
    },
    /// Fetch the conversation between two users.
    GetPrivateMessages {
        #[serde(rename = "remetente")]
        sender: String,
        #[serde(rename = "destinatario")]
        recipient: String,
    },
    /// Fetch every post known to the server.
    GetTimeline,
}

impl Command {
    /// Which command this is, without its fields.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Register { .. } => CommandKind::Register,
            Command::PostText { .. } => CommandKind::PostText,
            Command::Follow { .. } => CommandKind::Follow,
            Command::SendPrivateMessage { .. } => CommandKind::SendPrivateMessage,
            Command::GetPrivateMessages { .. } => CommandKind::GetPrivateMessages,
            Command::GetTimeline => CommandKind::GetTimeline,
        }
    }
}

/// Discriminant of a [`Command`], used to decode the matching reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Register,
    PostText,
    Follow,
    SendPrivateMessage,
    GetPrivateMessages,
    GetTimeline,
}

impl CommandKind {
    /// The wire `action` value.
    pub fn action(self) -> &'static str {
        match self {
            CommandKind::Register => "add_user",
            CommandKind::PostText => "post_text",
            CommandKind::Follow => "add_follower",
            CommandKind::SendPrivateMessage => "add_private_message",
            CommandKind::GetPrivateMessages => "get_private_messages",
            CommandKind::GetTimeline => "get_timeline",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}
