use socialnet_core::ProtocolError;
use tokio_tungstenite::tungstenite;

/// The channel to the server failed. Fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("channel closed by peer")]
    Closed,
}

/// A command refused locally, before any request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionRejected {
    #[error("you cannot follow yourself")]
    SelfFollow,
    #[error("you cannot send a message to yourself")]
    SelfMessage,
}

/// Failure of a single command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Rejected(#[from] PreconditionRejected),
}

impl CommandError {
    /// Whether the session can keep going after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::Transport(_))
    }
}

/// Failure while establishing a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("registration abandoned after username '{username}' was rejected")]
    RegistrationAborted { username: String },
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::Command(err.into())
    }
}
