//! Bounded relay from the pipeline to a visualization consumer
//!
//! Publishing never blocks: when the queue is full the new value is dropped
//! and counted. The consumer drains at its own cadence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Create a relay holding at most `capacity` values (clamped to at least 1)
pub fn bounded(capacity: usize) -> (RelaySender, RelayReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        RelaySender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        RelayReceiver { rx, dropped, capacity },
    )
}

/// Producer half, owned by the pipeline
#[derive(Debug)]
pub struct RelaySender {
    tx: Sender<f64>,
    dropped: Arc<AtomicU64>,
}

impl RelaySender {
    /// Offer a value. Returns false when it was not queued.
    pub fn publish(&self, value: f64) -> bool {
        match self.tx.try_send(value) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            // Consumer has gone away; publishing is best-effort
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Values dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half
#[derive(Debug)]
pub struct RelayReceiver {
    rx: Receiver<f64>,
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

impl RelayReceiver {
    /// Take everything currently queued, oldest first
    pub fn drain(&self) -> impl Iterator<Item = f64> + '_ {
        self.rx.try_iter()
    }

    /// Values currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let (tx, rx) = bounded(8);
        for i in 0..5 {
            assert!(tx.publish(i as f64));
        }
        let values: Vec<f64> = rx.drain().collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_overflow_drops_newest() {
        let (tx, rx) = bounded(3);
        let accepted: Vec<bool> = (0..10).map(|i| tx.publish(i as f64)).collect();

        assert_eq!(accepted.iter().filter(|&&ok| ok).count(), 3);
        assert_eq!(rx.len(), 3);
        assert_eq!(rx.dropped(), 7);
        assert_eq!(tx.dropped(), 7);

        let values: Vec<f64> = rx.drain().collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);

        // Space frees up once drained
        assert!(tx.publish(42.0));
        assert_eq!(rx.drain().collect::<Vec<_>>(), vec![42.0]);
    }

    #[test]
    fn test_interleaved_consumer_sees_ordered_subsequence() {
        let (tx, rx) = bounded(4);
        let mut seen = Vec::new();
        for i in 0..100 {
            tx.publish(i as f64);
            if i % 7 == 0 {
                seen.extend(rx.drain());
            }
        }
        seen.extend(rx.drain());

        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.len() as u64 + rx.dropped(), 100);
    }

    #[test]
    fn test_publish_after_consumer_dropped() {
        let (tx, rx) = bounded(2);
        drop(rx);
        assert!(!tx.publish(1.0));
        assert_eq!(tx.dropped(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (tx, rx) = bounded(0);
        assert_eq!(rx.capacity(), 1);
        assert!(tx.publish(1.0));
        assert!(!tx.publish(2.0));
    }

    #[test]
    fn test_producer_thread_never_blocks() {
        let (tx, rx) = bounded(16);
        let handle = std::thread::spawn(move || {
            for i in 0..100_000 {
                tx.publish(i as f64);
            }
        });
        handle.join().unwrap();
        assert_eq!(rx.len(), 16);
        assert_eq!(rx.dropped(), 100_000 - 16);
    }
}
