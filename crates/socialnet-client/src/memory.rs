//! In-process transports.
//!
//! These stand in for a server when embedding the client or testing it: a
//! request channel answered by a closure, and a subscribe channel fed by a
//! [`NotificationPublisher`].

use crate::channel::{RequestChannel, SubscribeChannel};
use crate::TransportError;
use serde_json::Value;
use socialnet_core::Notification;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

type Handler = Box<dyn FnMut(&[u8]) -> Result<Vec<u8>, TransportError> + Send>;

/// Every request a [`MemoryRequestChannel`] has carried, in order, and
/// whether it has been closed.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl RequestLog {
    fn push(&self, request: &[u8]) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.to_vec());
    }

    pub fn len(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requests parsed as JSON; unparseable ones become `Null`.
    pub fn json(&self) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).unwrap_or(Value::Null))
            .collect()
    }

    /// The `action` of every request.
    pub fn actions(&self) -> Vec<String> {
        self.json()
            .iter()
            .map(|v| v["action"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Whether the channel was closed by its owner.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Request channel answered synchronously by a handler.
pub struct MemoryRequestChannel {
    handler: Handler,
    log: RequestLog,
}

impl MemoryRequestChannel {
    pub fn new(
        handler: impl FnMut(&[u8]) -> Result<Vec<u8>, TransportError> + Send + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            log: RequestLog::default(),
        }
    }

    /// A channel whose handler maps request JSON to reply JSON.
    pub fn json(mut handler: impl FnMut(&Value) -> Value + Send + 'static) -> Self {
        Self::new(move |request| {
            let request = serde_json::from_slice(request).unwrap_or(Value::Null);
            Ok(handler(&request).to_string().into_bytes())
        })
    }

    /// Handle on everything this channel carries; stays valid after the
    /// channel moves into a session.
    pub fn log(&self) -> RequestLog {
        self.log.clone()
    }
}

impl RequestChannel for MemoryRequestChannel {
    async fn call(&mut self, request: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        if self.log.is_closed() {
            return Err(TransportError::Closed);
        }
        self.log.push(&request);
        (self.handler)(&request)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Create a connected publisher and subscribe channel.
pub fn subscription() -> (NotificationPublisher, MemorySubscribeChannel) {
    let (tx, rx) = mpsc::unbounded_channel();
    let topics = Arc::new(Mutex::new(Vec::new()));
    let publisher = NotificationPublisher {
        tx,
        topics: topics.clone(),
    };
    (publisher, MemorySubscribeChannel { rx, topics })
}

/// Server side of an in-process subscription. Dropping it closes the channel.
#[derive(Clone)]
pub struct NotificationPublisher {
    tx: mpsc::UnboundedSender<String>,
    topics: Arc<Mutex<Vec<String>>>,
}

impl NotificationPublisher {
    /// Publish a raw frame. Returns `false` once the subscriber is gone.
    pub fn publish(&self, frame: impl Into<String>) -> bool {
        self.tx.send(frame.into()).is_ok()
    }

    pub fn notify(&self, topic: &str, text: &str) -> bool {
        self.publish(Notification::new(topic, text).to_frame())
    }

    /// Topics the subscriber has asked for so far.
    pub fn subscriptions(&self) -> Vec<String> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Client side of an in-process subscription, filtering by topic prefix.
pub struct MemorySubscribeChannel {
    rx: mpsc::UnboundedReceiver<String>,
    topics: Arc<Mutex<Vec<String>>>,
}

impl MemorySubscribeChannel {
    fn wants(&self, frame: &str) -> bool {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|topic| Notification::is_addressed_to(frame, topic))
    }
}

impl SubscribeChannel for MemorySubscribeChannel {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(topic.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(frame) = self.rx.recv().await {
            if self.wants(&frame) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.rx.close();
        Ok(())
    }
}
