//! # Message Batcher
//!
//! Decouples the rate of arriving items from the rate of delivery to a
//! consumer. Items accumulate in insertion order and are flushed to the
//! configured callback either when the size threshold is reached (immediately
//! and synchronously) or when the holding interval elapses, whichever comes
//! first.
//!
//! Guarantees to the consumer:
//! - at most one flush callback per accumulated set of items,
//! - items delivered in insertion order,
//! - no item delivered twice,
//! - no timer fires into a destroyed batcher.
//!
//! The interval timer is a spawned tokio task, so a `Batcher` must live on a
//! tokio runtime. `destroy` performs one final flush and releases the timer;
//! dropping the batcher aborts a pending timer without flushing.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Callback receiving each flushed batch.
pub type FlushFn<T> = dyn Fn(Vec<T>) + Send + Sync;

struct BatchInner<T> {
    items: Vec<T>,
    timer: Option<JoinHandle<()>>,
}

struct BatcherShared<T> {
    max_size: usize,
    interval: Duration,
    on_flush: Box<FlushFn<T>>,
    inner: Mutex<BatchInner<T>>,
}

impl<T> BatcherShared<T> {
    /// Takes the pending items (and the timer handle) and delivers them
    /// outside the lock. `abort_timer` is false when called from the timer
    /// task itself.
    fn flush(&self, abort_timer: bool) {
        let items = {
            let mut inner = self.inner.lock().expect("batcher lock poisoned");
            if let Some(timer) = inner.timer.take() {
                if abort_timer {
                    timer.abort();
                }
            }
            std::mem::take(&mut inner.items)
        };

        if !items.is_empty() {
            (self.on_flush)(items);
        }
    }
}

/// An accumulating buffer of items awaiting delivery.
pub struct Batcher<T: Send + 'static> {
    shared: Arc<BatcherShared<T>>,
}

impl<T: Send + 'static> Batcher<T> {
    /// Creates a batcher flushing at `max_size` items or after `interval`,
    /// whichever comes first.
    ///
    /// A `max_size` of zero is treated as one.
    pub fn new<F>(max_size: usize, interval: Duration, on_flush: F) -> Self
    where
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(BatcherShared {
                max_size: max_size.max(1),
                interval,
                on_flush: Box::new(on_flush),
                inner: Mutex::new(BatchInner {
                    items: Vec::new(),
                    timer: None,
                }),
            }),
        }
    }

    /// Appends an item.
    ///
    /// If the buffer reaches the size threshold the batch is delivered
    /// immediately on the calling task and any pending timer is cancelled.
    /// Otherwise a flush timer is started if none is pending.
    pub fn add(&self, item: T) {
        let full_batch = {
            let mut inner = self.shared.inner.lock().expect("batcher lock poisoned");
            inner.items.push(item);

            if inner.items.len() >= self.shared.max_size {
                if let Some(timer) = inner.timer.take() {
                    timer.abort();
                }
                Some(std::mem::take(&mut inner.items))
            } else {
                if inner.timer.is_none() {
                    let shared = Arc::clone(&self.shared);
                    inner.timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(shared.interval).await;
                        shared.flush(false);
                    }));
                }
                None
            }
        };

        // Deliver outside the lock so the callback may call back into us.
        if let Some(items) = full_batch {
            (self.shared.on_flush)(items);
        }
    }

    /// Delivers any pending items now and cancels a pending timer.
    pub fn flush(&self) {
        self.shared.flush(true);
    }

    /// Performs one final flush and releases timer resources.
    pub fn destroy(&self) {
        self.flush();
    }

    /// Number of items currently buffered.
    pub fn pending(&self) -> usize {
        self.shared
            .inner
            .lock()
            .expect("batcher lock poisoned")
            .items
            .len()
    }
}

impl<T: Send + 'static> Drop for Batcher<T> {
    fn drop(&mut self) {
        // A timer that fires after teardown would deliver into a consumer
        // that no longer expects it. Abort, do not flush.
        if let Ok(mut inner) = self.shared.inner.lock() {
            if let Some(timer) = inner.timer.take() {
                timer.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_batcher(
        max_size: usize,
        interval: Duration,
    ) -> (Batcher<u32>, Arc<Mutex<Vec<Vec<u32>>>>) {
        let flushes: Arc<Mutex<Vec<Vec<u32>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&flushes);
        let batcher = Batcher::new(max_size, interval, move |items| {
            sink.lock().unwrap().push(items);
        });
        (batcher, flushes)
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_threshold_flushes_synchronously() {
        let (batcher, flushes) = collecting_batcher(3, Duration::from_millis(100));

        batcher.add(1);
        batcher.add(2);
        assert!(flushes.lock().unwrap().is_empty());

        // The third add crosses the threshold and delivers on this task.
        batcher.add(3);
        assert_eq!(*flushes.lock().unwrap(), vec![vec![1, 2, 3]]);
        assert_eq!(batcher.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_flushes_partial_batch() {
        let (batcher, flushes) = collecting_batcher(10, Duration::from_millis(100));

        batcher.add(7);
        batcher.add(8);
        assert!(flushes.lock().unwrap().is_empty());

        // Let the paused clock run past the holding interval.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*flushes.lock().unwrap(), vec![vec![7, 8]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_delivers_expected_batches() {
        // 1. 25 items against a threshold of 10 and a 100ms interval
        let (batcher, flushes) = collecting_batcher(10, Duration::from_millis(100));
        for i in 0..25 {
            batcher.add(i);
        }

        // 2. Two full batches flush synchronously during the burst
        {
            let seen = flushes.lock().unwrap();
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[0], (0..10).collect::<Vec<_>>());
            assert_eq!(seen[1], (10..20).collect::<Vec<_>>());
        }

        // 3. The trailing 5 arrive once the interval elapses
        tokio::time::sleep(Duration::from_millis(150)).await;
        let seen = flushes.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], (20..25).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_flushes_remainder_and_stops_timer() {
        let (batcher, flushes) = collecting_batcher(10, Duration::from_millis(100));
        batcher.add(1);
        batcher.add(2);

        batcher.destroy();
        assert_eq!(*flushes.lock().unwrap(), vec![vec![1, 2]]);

        // No stray timer delivery afterwards.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(flushes.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_flush_empty_is_a_no_op() {
        let (batcher, flushes) = collecting_batcher(10, Duration::from_millis(100));
        batcher.flush();
        assert!(flushes.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_item_delivered_twice_across_timer_and_size() {
        let (batcher, flushes) = collecting_batcher(3, Duration::from_millis(100));

        // A partial batch arms the timer, then a size-triggered flush takes
        // the items first.
        batcher.add(1);
        batcher.add(2);
        batcher.add(3);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let seen = flushes.lock().unwrap();
        let delivered: Vec<u32> = seen.iter().flatten().copied().collect();
        assert_eq!(delivered, vec![1, 2, 3]);
    }
}
