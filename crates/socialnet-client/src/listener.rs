//! Background task moving notifications from the subscribe channel into
//! the buffer.

use crate::buffer::{Admission, NotificationBuffer};
use crate::channel::SubscribeChannel;
use crate::TransportError;
use socialnet_core::Notification;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Why the listener stopped.
#[derive(Debug)]
pub enum ListenerExit {
    /// Asked to stop, or its owner went away.
    Shutdown,
    /// The server closed the subscribe channel.
    ChannelClosed,
    Failed(TransportError),
    /// The task panicked or was cancelled by the runtime.
    Aborted,
}

/// Handle to the running listener task.
pub struct NotificationListener {
    stop: watch::Sender<bool>,
    task: JoinHandle<ListenerExit>,
}

impl NotificationListener {
    /// Start receiving on an already-subscribed channel.
    pub fn spawn<S: SubscribeChannel>(channel: S, buffer: Arc<NotificationBuffer>) -> Self {
        let (stop, stopped) = watch::channel(false);
        let task = tokio::spawn(run(channel, buffer, stopped));
        Self { stop, task }
    }

    /// Whether the task has already exited on its own.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop receiving, close the channel and wait for the task to exit.
    pub async fn shutdown(self) -> ListenerExit {
        // Err means the task already returned and dropped its receiver.
        let _ = self.stop.send(true);
        match self.task.await {
            Ok(exit) => exit,
            Err(e) => {
                tracing::error!("Notification listener aborted: {}", e);
                ListenerExit::Aborted
            }
        }
    }
}

async fn run<S: SubscribeChannel>(
    mut channel: S,
    buffer: Arc<NotificationBuffer>,
    mut stopped: watch::Receiver<bool>,
) -> ListenerExit {
    tracing::debug!("Notification listener started");
    loop {
        tokio::select! {
            biased;

            // Fires on `send(true)` and when the handle is dropped.
            _ = stopped.changed() => {
                tracing::debug!("Notification listener stopping");
                if let Err(e) = channel.close().await {
                    tracing::debug!("Closing notification channel failed: {}", e);
                }
                return ListenerExit::Shutdown;
            }

            frame = channel.recv() => match frame {
                Ok(Some(frame)) => {
                    if buffer.push(Notification::parse(&frame)) == Admission::Dropped {
                        tracing::debug!(
                            dropped = buffer.dropped(),
                            "Notification buffer full, discarding incoming notification"
                        );
                    }
                }
                Ok(None) => {
                    tracing::info!("Notification channel closed");
                    return ListenerExit::ChannelClosed;
                }
                Err(e) => {
                    tracing::warn!("Notification channel failed: {}", e);
                    return ListenerExit::Failed(e);
                }
            }
        }
    }
}
