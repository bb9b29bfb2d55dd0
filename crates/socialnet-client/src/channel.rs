//! Transport seams.
//!
//! A [`RequestChannel`] is lock-step: one request, then exactly one reply,
//! before the next request. `call` takes `&mut self`, so two commands can
//! never be in flight on the same channel. A [`SubscribeChannel`] only
//! receives; it is owned by the notification listener task.

use crate::TransportError;
use std::future::Future;

/// Strict single-outstanding-request transport.
///
/// No timeout and no retry: a server that never answers stalls the caller.
pub trait RequestChannel {
    fn call(
        &mut self,
        request: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Tell the server this client is leaving. Calls after this fail.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Receive side of the publish-subscribe endpoint.
pub trait SubscribeChannel: Send + 'static {
    /// Start receiving frames published on `topic` (prefix match).
    fn subscribe(&mut self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Next frame addressed to a subscribed topic, or `None` once closed.
    ///
    /// Must be cancel-safe: the listener drops a pending `recv` on shutdown.
    fn recv(&mut self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
