//! Bounded per-connection outbound queue.
//!
//! [`SendQueue`] sits between a room's fan-out and a connection's write
//! loop. Its capacity bounds queued data frames; offering a data frame to a
//! full queue triggers the configured [`OverflowPolicy`]. Control frames are
//! always accepted and do not count against the capacity.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use tokio::sync::{Mutex, Notify};

use super::Frame;
use crate::error::RelayError;

/// What happens when a data frame is offered to a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued data frame, keeping the newest state.
    #[default]
    DropOldest,
    /// Make the offering side wait until the writer frees space or the
    /// queue is closed. One slow recipient slows its sender.
    Backpressure,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropOldest => f.write_str("drop_oldest"),
            Self::Backpressure => f.write_str("backpressure"),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop_oldest" | "drop-oldest" => Ok(Self::DropOldest),
            "backpressure" | "block" => Ok(Self::Backpressure),
            other => Err(RelayError::InvalidRequest(format!(
                "unknown overflow policy: {other}"
            ))),
        }
    }
}

/// Outcome of offering a frame to a [`SendQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Frame queued without loss.
    Queued,
    /// Frame queued after evicting the oldest data frame.
    DroppedOldest,
    /// Queue is closed; nothing was queued.
    Closed,
}

#[derive(Debug, Default)]
struct Inner {
    frames: VecDeque<Frame>,
    /// Data frames currently in `frames`.
    data_len: usize,
    closed: bool,
}

impl Inner {
    fn push_back(&mut self, frame: Frame) {
        if !frame.is_control() {
            self.data_len += 1;
        }
        self.frames.push_back(frame);
    }

    fn pop_front(&mut self) -> Option<Frame> {
        let frame = self.frames.pop_front()?;
        if !frame.is_control() {
            self.data_len -= 1;
        }
        Some(frame)
    }

    /// Evicts the oldest data frame. Returns `false` if none is queued.
    fn evict_oldest_data(&mut self) -> bool {
        match self.frames.iter().position(|f| !f.is_control()) {
            Some(oldest) => {
                self.frames.remove(oldest);
                self.data_len -= 1;
                true
            }
            None => false,
        }
    }
}

/// Bounded FIFO of outbound frames with a single consumer.
#[derive(Debug)]
pub struct SendQueue {
    inner: Mutex<Inner>,
    capacity: usize,
    policy: OverflowPolicy,
    readable: Notify,
    writable: Notify,
}

impl SendQueue {
    /// Creates an empty queue. A zero capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            policy,
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    /// Offers a frame, applying the overflow policy if the queue is full.
    pub async fn push(&self, frame: Frame) -> PushOutcome {
        loop {
            let space = self.writable.notified();
            {
                let mut inner = self.inner.lock().await;
                if inner.closed {
                    return PushOutcome::Closed;
                }
                if frame.is_control() || inner.data_len < self.capacity {
                    inner.push_back(frame);
                    drop(inner);
                    self.readable.notify_one();
                    return PushOutcome::Queued;
                }
                if self.policy == OverflowPolicy::DropOldest {
                    // data_len >= capacity >= 1, so a data frame is queued.
                    inner.evict_oldest_data();
                    inner.push_back(frame);
                    drop(inner);
                    self.readable.notify_one();
                    return PushOutcome::DroppedOldest;
                }
            }
            space.await;
        }
    }

    /// Waits for the next frame. Returns `None` once the queue is closed;
    /// frames still queued at close time stay available to [`SendQueue::drain`].
    pub async fn pop(&self) -> Option<Frame> {
        loop {
            let ready = self.readable.notified();
            {
                let mut inner = self.inner.lock().await;
                if inner.closed {
                    return None;
                }
                if let Some(frame) = inner.pop_front() {
                    drop(inner);
                    self.writable.notify_waiters();
                    return Some(frame);
                }
            }
            ready.await;
        }
    }

    /// Removes every queued frame without waiting.
    pub async fn drain(&self) -> Vec<Frame> {
        let frames: Vec<Frame> = {
            let mut inner = self.inner.lock().await;
            inner.data_len = 0;
            inner.frames.drain(..).collect()
        };
        self.writable.notify_waiters();
        frames
    }

    /// Closes the queue, waking the consumer and any blocked producers.
    /// Idempotent.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        drop(inner);
        self.readable.notify_one();
        self.writable.notify_waiters();
    }

    /// Returns the number of queued frames.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.frames.len()
    }

    /// Returns the number of queued data frames.
    pub async fn data_len(&self) -> usize {
        self.inner.lock().await.data_len
    }

    /// Returns `true` if no frames are queued.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.frames.is_empty()
    }

    /// Returns `true` once [`SendQueue::close`] has been called.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }

    /// Configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured overflow policy.
    #[must_use]
    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::domain::{ControlEvent, ConnectionId, Role};

    fn data(n: u64) -> Frame {
        Frame::data(Role::Publisher, serde_json::json!(n))
    }

    fn control() -> Frame {
        Frame::control(&ControlEvent::MemberLeft {
            connection_id: ConnectionId::new(),
            role: Role::Observer,
        })
    }

    async fn payloads(queue: &SendQueue) -> Vec<serde_json::Value> {
        queue.drain().await.into_iter().map(|f| f.payload).collect()
    }

    #[tokio::test]
    async fn fifo_order() {
        let queue = SendQueue::new(8, OverflowPolicy::DropOldest);
        for n in 1..=3 {
            assert_eq!(queue.push(data(n)).await, PushOutcome::Queued);
        }
        assert_eq!(
            payloads(&queue).await,
            vec![serde_json::json!(1), serde_json::json!(2), serde_json::json!(3)]
        );
    }

    #[tokio::test]
    async fn drop_oldest_keeps_newest() {
        let queue = SendQueue::new(2, OverflowPolicy::DropOldest);
        queue.push(data(1)).await;
        queue.push(data(2)).await;
        assert_eq!(queue.push(data(3)).await, PushOutcome::DroppedOldest);
        assert_eq!(
            payloads(&queue).await,
            vec![serde_json::json!(2), serde_json::json!(3)]
        );
    }

    #[tokio::test]
    async fn control_frames_survive_full_queue() {
        let queue = SendQueue::new(2, OverflowPolicy::DropOldest);
        queue.push(control()).await;
        queue.push(data(1)).await;
        queue.push(data(2)).await;
        assert_eq!(queue.push(control()).await, PushOutcome::Queued);

        let frames = queue.drain().await;
        assert_eq!(frames.len(), 4);
        assert_eq!(frames.iter().filter(|f| f.is_control()).count(), 2);
    }

    #[tokio::test]
    async fn control_frames_leave_data_capacity_untouched() {
        let queue = SendQueue::new(2, OverflowPolicy::DropOldest);
        queue.push(control()).await;
        queue.push(control()).await;
        assert_eq!(queue.push(data(1)).await, PushOutcome::Queued);
        assert_eq!(queue.push(data(2)).await, PushOutcome::Queued);
        assert_eq!(queue.push(data(3)).await, PushOutcome::DroppedOldest);
        assert_eq!(queue.len().await, 4);
        assert_eq!(queue.data_len().await, 2);

        let frames = queue.drain().await;
        let data: Vec<_> = frames
            .iter()
            .filter(|f| !f.is_control())
            .map(|f| f.payload.clone())
            .collect();
        assert_eq!(data, vec![serde_json::json!(2), serde_json::json!(3)]);
        assert_eq!(queue.data_len().await, 0);
    }

    #[tokio::test]
    async fn backpressure_ignores_queued_control_frames() {
        let queue = SendQueue::new(1, OverflowPolicy::Backpressure);
        queue.push(control()).await;
        let Ok(outcome) =
            tokio::time::timeout(Duration::from_millis(100), queue.push(data(1))).await
        else {
            panic!("data push should not wait behind a control frame");
        };
        assert_eq!(outcome, PushOutcome::Queued);
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let queue = Arc::new(SendQueue::new(4, OverflowPolicy::DropOldest));
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(data(7)).await;

        let Ok(Some(frame)) = consumer.await else {
            panic!("consumer should receive a frame");
        };
        assert_eq!(frame.payload, serde_json::json!(7));
    }

    #[tokio::test]
    async fn close_wakes_consumer() {
        let queue = Arc::new(SendQueue::new(4, OverflowPolicy::DropOldest));
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close().await;
        queue.close().await;

        let Ok(result) = consumer.await else {
            panic!("consumer task failed");
        };
        assert!(result.is_none());
        assert_eq!(queue.push(data(1)).await, PushOutcome::Closed);
    }

    #[tokio::test]
    async fn backpressure_waits_for_space() {
        let queue = Arc::new(SendQueue::new(1, OverflowPolicy::Backpressure));
        queue.push(data(1)).await;

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.push(data(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());

        let Some(first) = queue.pop().await else {
            panic!("expected first frame");
        };
        assert_eq!(first.payload, serde_json::json!(1));

        let Ok(outcome) = tokio::time::timeout(Duration::from_secs(1), producer).await else {
            panic!("producer should be released");
        };
        assert!(matches!(outcome, Ok(PushOutcome::Queued)));
    }

    #[tokio::test]
    async fn backpressure_producer_woken_by_drain() {
        let queue = SendQueue::new(1, OverflowPolicy::Backpressure);
        queue.push(data(1)).await;

        let mut producer = tokio_test::task::spawn(queue.push(data(2)));
        tokio_test::assert_pending!(producer.poll());

        assert_eq!(queue.drain().await.len(), 1);
        assert!(producer.is_woken());
        tokio_test::assert_ready_eq!(producer.poll(), PushOutcome::Queued);
    }

    #[tokio::test]
    async fn backpressure_released_by_close() {
        let queue = Arc::new(SendQueue::new(1, OverflowPolicy::Backpressure));
        queue.push(data(1)).await;

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.push(data(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close().await;

        let Ok(outcome) = tokio::time::timeout(Duration::from_secs(1), producer).await else {
            panic!("producer should be released");
        };
        assert!(matches!(outcome, Ok(PushOutcome::Closed)));
    }

    #[test]
    fn policy_parses() {
        assert_eq!(
            "drop_oldest".parse::<OverflowPolicy>().ok(),
            Some(OverflowPolicy::DropOldest)
        );
        assert_eq!(
            "Backpressure".parse::<OverflowPolicy>().ok(),
            Some(OverflowPolicy::Backpressure)
        );
        assert!("lossy".parse::<OverflowPolicy>().is_err());
    }
}
