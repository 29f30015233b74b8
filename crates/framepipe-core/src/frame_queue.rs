//! Frame queue for decoupling decode timing from presentation timing.
//!
//! A thread-safe FIFO of normalized frames: one producer (the decode loop)
//! appends at the tail, one consumer (the presentation layer) takes from the
//! head. The queue stays correct under general mutual exclusion rather than
//! assuming a lock-free single-producer/single-consumer scheme.
//!
//! The lock covers queue mutation only. Decode and normalization complete
//! before `push` is called, and pixel contents are never touched after
//! enqueue, so no pixel data is ever copied or inspected inside the critical
//! section. `pop` moves the frame out of the queue; ownership transfers to
//! the caller without a copy.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::video::VideoFrame;

/// A thread-safe queue of decoded frames awaiting presentation.
///
/// The queue is unbounded: the baseline design has no backpressure between
/// producer and consumer. Node allocation failure aborts the process, which
/// is the intended unrecoverable-exhaustion behavior.
pub struct FrameQueue {
    /// Frames in presentation order
    frames: Mutex<VecDeque<VideoFrame>>,
    /// Signals a consumer blocked in [`pop_blocking`](Self::pop_blocking)
    frame_available: Condvar,
    /// Latched once the producer has delivered the last frame
    eos: AtomicBool,
    /// Latched at shutdown; wakes blocked waiters and discards new pushes
    stopped: AtomicBool,
}

impl FrameQueue {
    /// Creates a new, empty queue.
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
            frame_available: Condvar::new(),
            eos: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Appends a frame at the tail.
    ///
    /// Returns false if the queue has been stopped, in which case the frame
    /// is discarded. Never blocks.
    pub fn push(&self, frame: VideoFrame) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }

        let mut frames = self.frames.lock();
        frames.push_back(frame);
        drop(frames);

        self.frame_available.notify_one();
        true
    }

    /// Takes the frame at the head, transferring ownership to the caller.
    ///
    /// Returns `None` immediately when the queue is empty. That is a normal
    /// condition, not an error: the consumer treats it as "no new frame yet".
    pub fn pop(&self) -> Option<VideoFrame> {
        self.frames.lock().pop_front()
    }

    /// Takes the frame at the head, waiting up to `timeout` for one to
    /// arrive.
    ///
    /// Returns `None` on timeout, or without waiting when the queue is empty
    /// and end-of-stream or stop has been signaled.
    pub fn pop_blocking(&self, timeout: Duration) -> Option<VideoFrame> {
        let mut frames = self.frames.lock();

        if frames.is_empty() {
            if self.eos.load(Ordering::Acquire) || self.stopped.load(Ordering::Acquire) {
                return None;
            }

            let result = self.frame_available.wait_for(&mut frames, timeout);
            if result.timed_out() && frames.is_empty() {
                return None;
            }
        }

        frames.pop_front()
    }

    /// Returns the presentation timestamp of the head frame without
    /// removing it. Used by presentation pacing.
    pub fn peek_pts(&self) -> Option<Duration> {
        self.frames.lock().front().map(|f| f.pts)
    }

    /// Returns the number of queued frames.
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Returns true if no frames are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and drops every remaining frame.
    ///
    /// Teardown path, called after the producer is confirmed stopped.
    /// Returns the number of frames dropped.
    pub fn drain(&self) -> usize {
        let mut frames = self.frames.lock();
        let count = frames.len();
        frames.clear();
        drop(frames);

        if count > 0 {
            tracing::debug!("drained {} undisplayed frames", count);
        }
        count
    }

    /// Marks that the producer has delivered the last frame.
    pub fn set_eos(&self) {
        self.eos.store(true, Ordering::Release);
        self.frame_available.notify_all();
    }

    /// Returns true if end-of-stream has been signaled.
    pub fn is_eos(&self) -> bool {
        self.eos.load(Ordering::Acquire)
    }

    /// Re-arms the queue for another run after end-of-stream.
    pub fn clear_eos(&self) {
        self.eos.store(false, Ordering::Release);
    }

    /// Stops the queue: subsequent pushes are discarded and blocked waiters
    /// wake up. Frames already queued remain poppable until drained.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.frame_available.notify_all();
    }

    /// Returns true if the queue has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::video::{CanonicalFrame, PixelFormat, Plane};

    fn make_test_frame(pts: Duration) -> VideoFrame {
        let plane = Plane {
            data: vec![128; 100],
            stride: 10,
        };
        let frame = CanonicalFrame::new(PixelFormat::Yuv420p, 10, 10, vec![plane]);
        VideoFrame::new(pts, frame)
    }

    #[test]
    fn test_push_pop_preserves_order() {
        let queue = FrameQueue::new();

        queue.push(make_test_frame(Duration::from_millis(0)));
        queue.push(make_test_frame(Duration::from_millis(33)));
        queue.push(make_test_frame(Duration::from_millis(66)));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek_pts(), Some(Duration::from_millis(0)));

        let pts: Vec<_> = std::iter::from_fn(|| queue.pop()).map(|f| f.pts_ms()).collect();
        assert_eq!(pts, vec![0, 33, 66]);
    }

    #[test]
    fn test_pop_empty_returns_none() {
        let queue = FrameQueue::new();
        assert!(queue.pop().is_none());
        assert!(queue.peek_pts().is_none());
    }

    #[test]
    fn test_drain_after_full_consumption_is_noop() {
        let queue = FrameQueue::new();
        let n = 16;

        for i in 0..n {
            queue.push(make_test_frame(Duration::from_millis(i * 33)));
        }
        for _ in 0..n {
            let Some(_) = queue.pop() else {
                panic!("Expected frame from queue");
            };
        }

        assert!(queue.is_empty());
        assert_eq!(queue.drain(), 0);
    }

    #[test]
    fn test_drain_drops_remaining() {
        let queue = FrameQueue::new();
        queue.push(make_test_frame(Duration::from_millis(0)));
        queue.push(make_test_frame(Duration::from_millis(33)));

        assert_eq!(queue.drain(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_after_stop_discards() {
        let queue = FrameQueue::new();
        queue.push(make_test_frame(Duration::from_millis(0)));
        queue.stop();

        assert!(!queue.push(make_test_frame(Duration::from_millis(33))));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_pop_blocking_times_out() {
        let queue = FrameQueue::new();
        let frame = queue.pop_blocking(Duration::from_millis(10));
        assert!(frame.is_none());
    }

    #[test]
    fn test_pop_blocking_returns_immediately_after_eos() {
        let queue = FrameQueue::new();
        queue.set_eos();

        // Must not wait out the full timeout once EOS is latched.
        let start = std::time::Instant::now();
        assert!(queue.pop_blocking(Duration::from_secs(5)).is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_stop_wakes_blocked_consumer() {
        let queue = Arc::new(FrameQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_blocking(Duration::from_secs(10)))
        };

        thread::sleep(Duration::from_millis(20));
        queue.stop();

        let Ok(frame) = consumer.join() else {
            panic!("Consumer thread panicked");
        };
        assert!(frame.is_none());
    }

    #[test]
    fn test_concurrent_delivery_exactly_once() {
        const FRAMES: u64 = 10_000;
        let queue = Arc::new(FrameQueue::new());

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..FRAMES {
                    assert!(queue.push(make_test_frame(Duration::from_millis(i))));
                }
                queue.set_eos();
            })
        };

        let mut seen = Vec::with_capacity(FRAMES as usize);
        while seen.len() < FRAMES as usize {
            match queue.pop() {
                Some(frame) => seen.push(frame.pts_ms()),
                None => thread::yield_now(),
            }
        }

        let Ok(()) = producer.join() else {
            panic!("Producer thread panicked");
        };

        // Every frame exactly once, in order, nothing left behind.
        assert!(queue.is_empty());
        assert_eq!(seen.len(), FRAMES as usize);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&(FRAMES - 1)));
    }
}
