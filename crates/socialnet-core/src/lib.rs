//! Core types for the socialnet command protocol.
//!
//! This crate provides the wire primitives shared by every client: the
//! commands a client can issue, the replies a server sends back, the
//! notification frames pushed on the subscribe channel, and the codec that
//! maps between them and bytes. Transports live elsewhere; this crate only
//! knows about records.

pub mod codec;
mod message;
mod notification;
mod response;

pub use codec::{ProtocolError, decode, encode};
pub use message::{Command, CommandKind};
pub use notification::Notification;
pub use response::{Assignment, MessageTime, PrivateMessage, Response, Status, TimelinePost};
