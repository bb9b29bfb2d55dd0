//! Reply records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome class of a reply, taken from its `ret` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    /// The named user does not exist.
    NotFound,
    /// Any other code, kept raw. A reply without a code is `Error(-1)`.
    Error(i64),
}

impl Status {
    pub const SUCCESS: i64 = 0;
    pub const USER_NOT_FOUND: i64 = 2;
    pub const MISSING: i64 = -1;

    /// Classify a reply's `ret` field.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(Self::SUCCESS) => Status::Ok,
            Some(Self::USER_NOT_FOUND) => Status::NotFound,
            Some(other) => Status::Error(other),
            None => Status::Error(Self::MISSING),
        }
    }

    /// The raw code, as it appeared on the wire.
    pub fn code(self) -> i64 {
        match self {
            Status::Ok => Self::SUCCESS,
            Status::NotFound => Self::USER_NOT_FOUND,
            Status::Error(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("ok"),
            Status::NotFound => f.write_str("not found"),
            Status::Error(code) => write!(f, "error (code {code})"),
        }
    }
}

/// Identity handed out by the server on successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: u64,
    /// Subscribe-channel topic carrying this user's notifications.
    pub topic: String,
}

/// Send time of a private message as stored by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTime {
    Epoch(i64),
    /// Anything that is not an integer or a numeric string.
    Malformed(String),
}

impl MessageTime {
    /// Seconds since the Unix epoch, when the server stored a usable value.
    pub fn epoch_seconds(&self) -> Option<i64> {
        match self {
            MessageTime::Epoch(secs) => Some(*secs),
            MessageTime::Malformed(_) => None,
        }
    }
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateMessage {
    pub text: String,
    pub sent_at: MessageTime,
    pub sender: String,
}

/// A post as returned by the timeline query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimelinePost {
    #[serde(rename = "username", default)]
    pub author: String,
    #[serde(rename = "texto", default)]
    pub text: String,
    /// Pre-formatted by the sender; shown as-is.
    #[serde(rename = "tempoEnvioMensagem", default)]
    pub sent_at: String,
}

/// A decoded reply, one variant per command kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Register {
        status: Status,
        /// Present whenever `status` is `Ok`.
        assignment: Option<Assignment>,
    },
    PostText {
        status: Status,
        message: Option<String>,
    },
    Follow {
        status: Status,
    },
    SendPrivateMessage {
        status: Status,
    },
    PrivateMessages {
        status: Status,
        messages: Vec<PrivateMessage>,
    },
    Timeline {
        status: Status,
        posts: Vec<TimelinePost>,
    },
}

impl Response {
    /// Status of the reply, whatever its kind.
    pub fn status(&self) -> Status {
        match self {
            Response::Register { status, .. }
            | Response::PostText { status, .. }
            | Response::Follow { status }
            | Response::SendPrivateMessage { status }
            | Response::PrivateMessages { status, .. }
            | Response::Timeline { status, .. } => *status,
        }
    }
}
