use crate::error::{PipelineError, Result};
use crate::monitor::Monitor;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Error returned by [`BoundedQueue::push`] when the queue has entered its
/// finished phase. The rejected item is handed back so the caller keeps
/// ownership, mirroring `std::sync::mpsc::SendError`.
pub struct PushError<T>(pub T);

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PushError(..)")
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is finished and no longer accepts items")
    }
}

impl<T> std::error::Error for PushError<T> {}

struct State<T> {
    buf: VecDeque<T>,
    capacity: usize,
    finished: bool,
}

/// A blocking FIFO of fixed capacity with a terminal "finished" phase.
///
/// Producers block in [`push`](BoundedQueue::push) while the queue is full;
/// consumers block in [`pop`](BoundedQueue::pop) while it is empty. Once
/// [`signal_finished`](BoundedQueue::signal_finished) has been called, new
/// pushes are refused, already-buffered items drain in FIFO order, and `pop`
/// returns `None` when the queue is empty, the end-of-stream condition.
///
/// Waiting never spins: each blocking operation parks on one of three
/// [`Monitor`]s (`not_full`, `not_empty`, `finished`). The waiter resets the
/// monitor *while still holding the state lock*, releases the lock, sleeps,
/// then re-acquires and re-checks the predicate; signalers flip state under
/// the lock and signal only after releasing it. The remembered signal bit
/// makes this sequence immune to the wake-up sliding in between the release
/// and the sleep.
pub struct BoundedQueue<T> {
    state: Mutex<State<T>>,
    not_full: Monitor,
    not_empty: Monitor,
    finished: Monitor,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// Fails with [`PipelineError::InvalidCapacity`] for a zero capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::InvalidCapacity);
        }
        Ok(Self {
            state: Mutex::new(State {
                buf: VecDeque::with_capacity(capacity),
                capacity,
                finished: false,
            }),
            not_full: Monitor::new(),
            not_empty: Monitor::new(),
            finished: Monitor::new(),
        })
    }

    /// Add an item, blocking while the queue is full.
    ///
    /// Refused with [`PushError`] (item returned to the caller) if the
    /// finished signal was already observed when the push began. A push that
    /// started blocking *before* the signal is allowed to complete once a
    /// consumer frees a slot, so shutdown never destroys items already in
    /// flight to the queue boundary.
    pub fn push(&self, item: T) -> std::result::Result<(), PushError<T>> {
        let mut state = self.state.lock();
        if state.finished {
            return Err(PushError(item));
        }
        while state.buf.len() == state.capacity {
            self.not_full.reset();
            drop(state);
            self.not_full.wait();
            state = self.state.lock();
            // No finished re-check: this push began before the signal and
            // may complete once space opens.
        }
        state.buf.push_back(item);
        drop(state);
        self.not_empty.signal();
        Ok(())
    }

    /// Remove the oldest item, blocking while the queue is empty and not
    /// finished.
    ///
    /// Returns `None` exactly when the queue is finished *and* drained: the
    /// end-of-stream condition. The pop that drains a finished queue wakes
    /// every [`wait_finished`](BoundedQueue::wait_finished) caller.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.buf.pop_front() {
                let drained = state.finished && state.buf.is_empty();
                drop(state);
                self.not_full.signal();
                if drained {
                    self.finished.signal();
                }
                return Some(item);
            }
            if state.finished {
                return None;
            }
            self.not_empty.reset();
            drop(state);
            self.not_empty.wait();
            state = self.state.lock();
        }
    }

    /// Enter the finished phase. Idempotent.
    ///
    /// Subsequent pushes are refused; consumers parked on an empty queue are
    /// woken so they can observe end-of-stream.
    pub fn signal_finished(&self) {
        let mut state = self.state.lock();
        if state.finished {
            return;
        }
        state.finished = true;
        drop(state);
        self.finished.signal();
        self.not_empty.signal();
    }

    /// Block until the queue is finished and fully drained
    pub fn wait_finished(&self) {
        let mut state = self.state.lock();
        while !(state.finished && state.buf.is_empty()) {
            self.finished.reset();
            drop(state);
            self.finished.wait();
            state = self.state.lock();
        }
    }

    /// Bounded form of [`wait_finished`](BoundedQueue::wait_finished).
    ///
    /// Returns `true` if the queue finished and drained within `timeout`.
    pub fn wait_finished_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.finished && state.buf.is_empty() {
                return true;
            }
            self.finished.reset();
            drop(state);
            let now = Instant::now();
            if now >= deadline || !self.finished.wait_for(deadline - now) {
                let state = self.state.lock();
                return state.finished && state.buf.is_empty();
            }
            state = self.state.lock();
        }
    }

    /// Current number of buffered items
    pub fn len(&self) -> usize {
        self.state.lock().buf.len()
    }

    /// Whether the queue currently holds no items
    pub fn is_empty(&self) -> bool {
        self.state.lock().buf.is_empty()
    }

    /// The fixed capacity
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Whether the finished signal has been raised
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            BoundedQueue::<i32>::with_capacity(0),
            Err(PipelineError::InvalidCapacity)
        ));
    }

    #[test]
    fn test_push_pop_fifo() {
        let queue = BoundedQueue::with_capacity(8).unwrap();
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(queue.pop(), Some(i));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_len_and_capacity() {
        let queue = BoundedQueue::with_capacity(4).unwrap();
        assert_eq!(queue.capacity(), 4);
        queue.push("a").unwrap();
        queue.push("b").unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_push_rejected_after_finished() {
        let queue = BoundedQueue::with_capacity(4).unwrap();
        queue.push(1).unwrap();
        queue.signal_finished();
        let err = queue.push(2).unwrap_err();
        // Ownership of the rejected item comes back to the caller.
        assert_eq!(err.0, 2);
        // Buffered items still drain, then end-of-stream.
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_signal_finished_is_idempotent() {
        let queue = BoundedQueue::<i32>::with_capacity(2).unwrap();
        queue.signal_finished();
        queue.signal_finished();
        assert!(queue.is_finished());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(BoundedQueue::with_capacity(2).unwrap());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };
        thread::sleep(Duration::from_millis(30));
        queue.push(7).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(7));
    }

    #[test]
    fn test_push_blocks_while_full_then_completes() {
        let queue = Arc::new(BoundedQueue::with_capacity(1).unwrap());
        queue.push(1).unwrap();
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };
        thread::sleep(Duration::from_millis(30));
        // The producer is parked on not_full; freeing the slot unblocks it.
        assert_eq!(queue.pop(), Some(1));
        producer.join().unwrap().unwrap();
        assert_eq!(queue.pop(), Some(2));
    }

    #[test]
    fn test_inflight_push_completes_after_finished() {
        // A push that began blocking before the finished signal must be
        // allowed to complete once space opens.
        let queue = Arc::new(BoundedQueue::with_capacity(1).unwrap());
        queue.push(1).unwrap();
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };
        thread::sleep(Duration::from_millis(30));
        queue.signal_finished();
        assert_eq!(queue.pop(), Some(1));
        producer.join().unwrap().unwrap();
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_wait_finished_blocks_until_drained() {
        let queue = Arc::new(BoundedQueue::with_capacity(4).unwrap());
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        queue.signal_finished();
        assert!(!queue.wait_finished_timeout(Duration::from_millis(20)));

        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_finished())
        };
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        waiter.join().expect("wait_finished never returned");
        assert!(queue.wait_finished_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_wait_finished_returns_on_empty_finished_queue() {
        let queue = BoundedQueue::<i32>::with_capacity(4).unwrap();
        queue.signal_finished();
        queue.wait_finished();
    }

    #[test]
    fn test_fifo_under_concurrency() {
        let queue = Arc::new(BoundedQueue::with_capacity(3).unwrap());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(item) = queue.pop() {
                    seen.push(item);
                }
                seen
            })
        };
        for i in 0..1000 {
            queue.push(i).unwrap();
        }
        queue.signal_finished();
        let seen = consumer.join().unwrap();
        assert_eq!(seen, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_occupancy_never_exceeds_capacity() {
        let queue = Arc::new(BoundedQueue::with_capacity(2).unwrap());
        let observer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut max_seen = 0;
                while !queue.is_finished() || !queue.is_empty() {
                    max_seen = max_seen.max(queue.len());
                    thread::yield_now();
                }
                max_seen
            })
        };
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || while queue.pop().is_some() {})
        };
        for i in 0..500 {
            queue.push(i).unwrap();
        }
        queue.signal_finished();
        consumer.join().unwrap();
        assert!(observer.join().unwrap() <= 2);
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_drop_releases_resident_items_exactly_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let queue = BoundedQueue::with_capacity(8).unwrap();
            for _ in 0..5 {
                queue.push(DropCounter(Arc::clone(&drops))).unwrap();
            }
            // One item leaves the queue and is released by the caller.
            drop(queue.pop());
        }
        assert_eq!(drops.load(Ordering::SeqCst), 5);
    }
}
