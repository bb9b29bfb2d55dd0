//! Client-side implementation of the socialnet protocol.
//!
//! Two channels connect a client to the service: a request-reply channel
//! carrying one command and one reply at a time, and a subscribe channel on
//! which the server pushes notifications. A [`Session`] drives both: it
//! issues commands in the foreground while a [`NotificationListener`] task
//! fills a bounded [`NotificationBuffer`] in the background.

pub mod audit;
pub mod buffer;
pub mod channel;
pub mod clock;
pub mod command;
pub mod conversation;
mod error;
pub mod listener;
pub mod memory;
pub mod report;
pub mod session;
pub mod ws;

pub use audit::{AuditLevel, AuditLog, FileAuditLog, MemoryAuditLog};
pub use buffer::{Admission, NotificationBuffer};
pub use channel::{RequestChannel, SubscribeChannel};
pub use clock::{Clock, ClockOffset, SystemClock};
pub use command::{CommandClient, FollowOutcome, MessageOutcome, PostOutcome, RegisterOutcome};
pub use conversation::Conversation;
pub use error::{CommandError, PreconditionRejected, SessionError, TransportError};
pub use listener::{ListenerExit, NotificationListener};
pub use report::{MessageReport, NotificationReport, TimelineView};
pub use session::{Registration, Session, SessionBuilder, UsernamePrompt};
pub use ws::{WsRequestChannel, WsSubscribeChannel};
