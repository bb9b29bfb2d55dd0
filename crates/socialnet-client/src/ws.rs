//! WebSocket transports.

use crate::channel::{RequestChannel, SubscribeChannel};
use crate::TransportError;
use futures_util::{SinkExt, StreamExt};
use socialnet_core::Notification;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(url: &str) -> Result<WsStream, TransportError> {
    let (stream, _response) =
        tokio_tungstenite::connect_async(url)
            .await
            .map_err(|source| TransportError::Connect {
                url: url.to_string(),
                source,
            })?;
    Ok(stream)
}

/// Command channel over a single WebSocket connection.
pub struct WsRequestChannel {
    url: String,
    stream: WsStream,
}

impl WsRequestChannel {
    /// Open the command connection to `url` (`ws://host:port`).
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let stream = connect(url).await?;
        tracing::debug!("Command channel connected to {}", url);
        Ok(Self {
            url: url.to_string(),
            stream,
        })
    }

    /// Address this channel connected to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Send a close frame; a connection that is already gone counts as closed.
async fn close_stream(stream: &mut WsStream) -> Result<(), TransportError> {
    match stream.close(None).await {
        Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

impl RequestChannel for WsRequestChannel {
    async fn call(&mut self, request: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let frame = match String::from_utf8(request) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => Message::binary(e.into_bytes()),
        };
        self.stream.send(frame).await?;

        // Exactly one data frame answers each request.
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().as_bytes().to_vec()),
                Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        close_stream(&mut self.stream).await
    }
}

/// Notification channel over a WebSocket connection.
///
/// Subscriptions are announced to the server with a `{"subscribe": topic}`
/// frame and also enforced locally, so a server that broadcasts everything
/// still only yields frames for this client's topics.
pub struct WsSubscribeChannel {
    stream: WsStream,
    topics: Vec<String>,
}

impl WsSubscribeChannel {
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let stream = connect(url).await?;
        tracing::debug!("Notification channel connected to {}", url);
        Ok(Self {
            stream,
            topics: Vec::new(),
        })
    }

    fn wants(&self, frame: &str) -> bool {
        self.topics
            .iter()
            .any(|topic| Notification::is_addressed_to(frame, topic))
    }
}

impl SubscribeChannel for WsSubscribeChannel {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let request = serde_json::json!({ "subscribe": topic });
        self.stream
            .send(Message::Text(request.to_string().into()))
            .await?;
        self.topics.push(topic.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let frame = match self.stream.next().await {
                Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                Some(Ok(Message::Binary(data))) => String::from_utf8_lossy(&data).into_owned(),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {
                    return Ok(None);
                }
                Some(Err(e)) => return Err(e.into()),
            };
            if self.wants(&frame) {
                return Ok(Some(frame));
            }
            tracing::trace!("Ignoring frame for another topic");
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        close_stream(&mut self.stream).await
    }
}
