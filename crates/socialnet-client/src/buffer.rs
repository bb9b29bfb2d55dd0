//! Bounded hand-off between the notification listener and the session.
//!
//! One producer appends, one consumer drains. Both hold the same lock for
//! the length of a push or a drain and nothing else; no I/O and no `.await`
//! happen under it. When the buffer is full the *incoming* notification is
//! discarded and counted, so older unread notifications always win.

use socialnet_core::Notification;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 100;

/// What happened to a pushed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// The buffer was full.
    Dropped,
}

#[derive(Debug)]
pub struct NotificationBuffer {
    entries: Mutex<VecDeque<Notification>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl NotificationBuffer {
    /// An empty buffer holding at most `capacity` notifications.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Append `notification`, or drop it if the buffer is full.
    pub fn push(&self, notification: Notification) -> Admission {
        let mut entries = self.lock();
        if entries.len() < self.capacity {
            entries.push_back(notification);
            return Admission::Accepted;
        }
        drop(entries);
        self.dropped.fetch_add(1, Ordering::Relaxed);
        Admission::Dropped
    }

    /// Take everything buffered, oldest first, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Notification> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Notifications discarded because the buffer was full, over its lifetime.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    // A panic elsewhere cannot leave the deque half-updated, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NotificationBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn note(i: usize) -> Notification {
        Notification::new("t", format!("n{i}"))
    }

    fn texts(notes: &[Notification]) -> Vec<String> {
        notes.iter().map(|n| n.text().to_string()).collect()
    }

    #[test]
    fn drain_returns_everything_in_order() {
        for n in [0, 1, 57, DEFAULT_CAPACITY] {
            let buffer = NotificationBuffer::default();
            for i in 0..n {
                assert_eq!(buffer.push(note(i)), Admission::Accepted);
            }
            let drained = buffer.drain();
            assert_eq!(texts(&drained), (0..n).map(|i| format!("n{i}")).collect::<Vec<_>>());
            assert!(buffer.is_empty());
            assert_eq!(buffer.dropped(), 0);
        }
    }

    #[test]
    fn overflow_keeps_the_oldest() {
        let buffer = NotificationBuffer::default();
        for i in 0..250 {
            let admission = buffer.push(note(i));
            assert_eq!(admission == Admission::Accepted, i < DEFAULT_CAPACITY);
        }
        assert_eq!(buffer.len(), DEFAULT_CAPACITY);

        let drained = buffer.drain();
        assert_eq!(drained.len(), DEFAULT_CAPACITY);
        assert_eq!(drained.first().unwrap().text(), "n0");
        assert_eq!(drained.last().unwrap().text(), "n99");
        assert_eq!(buffer.dropped(), 150);
    }

    #[test]
    fn space_frees_up_after_drain() {
        let buffer = NotificationBuffer::new(2);
        buffer.push(note(0));
        buffer.push(note(1));
        assert_eq!(buffer.push(note(2)), Admission::Dropped);
        buffer.drain();
        assert_eq!(buffer.push(note(3)), Admission::Accepted);
        assert_eq!(texts(&buffer.drain()), vec!["n3"]);
    }

    #[test]
    fn zero_capacity_drops_everything() {
        let buffer = NotificationBuffer::new(0);
        assert_eq!(buffer.push(note(0)), Admission::Dropped);
        assert!(buffer.drain().is_empty());
        assert_eq!(buffer.dropped(), 1);
    }

    #[test]
    fn concurrent_push_and_drain_never_lose_or_duplicate() {
        const ARRIVALS: usize = 20_000;

        for capacity in [1, 7, DEFAULT_CAPACITY] {
            let buffer = Arc::new(NotificationBuffer::new(capacity));

            let producer = {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    let mut accepted = 0u64;
                    for i in 0..ARRIVALS {
                        if buffer.push(note(i)) == Admission::Accepted {
                            accepted += 1;
                        }
                    }
                    accepted
                })
            };

            let mut batches = Vec::new();
            while !producer.is_finished() {
                batches.push(buffer.drain());
                thread::yield_now();
            }
            let accepted = producer.join().unwrap();
            batches.push(buffer.drain());

            let seen: Vec<usize> = batches
                .iter()
                .flatten()
                .map(|n| n.text()[1..].parse().unwrap())
                .collect();

            // Arrival order holds within and across batches.
            assert!(seen.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(seen.len() as u64, accepted);
            assert_eq!(accepted + buffer.dropped(), ARRIVALS as u64);
            assert!(batches.iter().all(|b| b.len() <= capacity));
        }
    }
}
