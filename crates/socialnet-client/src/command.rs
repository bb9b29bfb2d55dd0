//! One method per command: build it, send it, read exactly one reply.

use crate::channel::RequestChannel;
use crate::CommandError;
use socialnet_core::{
    Assignment, Command, PrivateMessage, Response, Status, TimelinePost, codec,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered(Assignment),
    /// Usually a taken username; the caller picks another one.
    Rejected(Status),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Published,
    Failed(Status),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Following,
    NotFound,
    Failed(Status),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Delivered,
    RecipientNotFound,
    Failed(Status),
}

/// Typed front end of a [`RequestChannel`].
pub struct CommandClient<R> {
    channel: R,
}

impl<R: RequestChannel> CommandClient<R> {
    /// Wrap a connected channel.
    pub fn new(channel: R) -> Self {
        Self { channel }
    }

    /// Close the underlying channel. Later commands fail with a transport error.
    pub async fn close(&mut self) -> Result<(), CommandError> {
        self.channel.close().await?;
        tracing::debug!("Command channel closed");
        Ok(())
    }

    async fn execute(&mut self, command: Command) -> Result<Response, CommandError> {
        let kind = command.kind();
        let request = codec::encode(&command)?;
        tracing::debug!(action = %kind, "Sending command");
        let reply = self.channel.call(request).await?;
        let response = codec::decode(kind, &reply)?;
        tracing::debug!(action = %kind, status = %response.status(), "Received reply");
        Ok(response)
    }

    /// Claim `username`. A rejection is an outcome, so the caller can retry.
    pub async fn register(&mut self, username: &str) -> Result<RegisterOutcome, CommandError> {
        let command = Command::Register {
            username: username.to_string(),
        };
        Ok(match self.execute(command).await? {
            Response::Register {
                status: Status::Ok,
                assignment: Some(assignment),
            } => RegisterOutcome::Registered(assignment),
            other => RegisterOutcome::Rejected(other.status()),
        })
    }

    /// `sent_at` is already skewed and formatted by the caller.
    pub async fn post_text(
        &mut self,
        username: &str,
        id: u64,
        text: &str,
        sent_at: String,
    ) -> Result<PostOutcome, CommandError> {
        let command = Command::PostText {
            username: username.to_string(),
            id,
            text: text.to_string(),
            sent_at,
        };
        Ok(match self.execute(command).await?.status() {
            Status::Ok => PostOutcome::Published,
            status => PostOutcome::Failed(status),
        })
    }

    /// Follow `target` on behalf of user `id`.
    pub async fn follow(&mut self, id: u64, target: &str) -> Result<FollowOutcome, CommandError> {
        let command = Command::Follow {
            id,
            target: target.to_string(),
        };
        Ok(match self.execute(command).await?.status() {
            Status::Ok => FollowOutcome::Following,
            Status::NotFound => FollowOutcome::NotFound,
            status => FollowOutcome::Failed(status),
        })
    }

    /// Send `text` from `sender` to `recipient`, stamped with `timestamp`
    /// (epoch seconds).
    pub async fn send_private_message(
        &mut self,
        sender: &str,
        recipient: &str,
        text: &str,
        timestamp: i64,
    ) -> Result<MessageOutcome, CommandError> {
        let command = Command::SendPrivateMessage {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            text: text.to_string(),
            timestamp,
        };
        Ok(match self.execute(command).await?.status() {
            Status::Ok => MessageOutcome::Delivered,
            Status::NotFound => MessageOutcome::RecipientNotFound,
            status => MessageOutcome::Failed(status),
        })
    }

    /// Conversation between `sender` and `recipient`, in server order.
    /// No messages yet is an empty list, not an error.
    pub async fn private_messages(
        &mut self,
        sender: &str,
        recipient: &str,
    ) -> Result<Vec<PrivateMessage>, CommandError> {
        let command = Command::GetPrivateMessages {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
        };
        Ok(match self.execute(command).await? {
            Response::PrivateMessages { messages, .. } => messages,
            _ => Vec::new(),
        })
    }

    /// All posts, in the order the server returns them.
    pub async fn timeline(&mut self) -> Result<Vec<TimelinePost>, CommandError> {
        match self.execute(Command::GetTimeline).await? {
            Response::Timeline {
                status: Status::Ok,
                posts,
            } => Ok(posts),
            other => {
                tracing::warn!(status = %other.status(), "Timeline query failed");
                Ok(Vec::new())
            }
        }
    }
}
