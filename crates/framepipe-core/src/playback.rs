//! Playback context and decode-loop driver.
//!
//! [`PlaybackContext`] owns the source, decoder, and normalizer handles plus
//! the frame queue, and runs the decode loop that keeps the queue fed.
//! [`DecodeThread`] puts that loop on its own thread so the presentation
//! layer can pop concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::decode::{MediaBackend, PixelNormalizer, StreamDecoder};
use crate::frame_queue::FrameQueue;
use crate::source::{MediaKind, MediaSource, StreamInfo, Timebase};
use crate::video::{VideoError, VideoFrame};

/// Fallback frame duration for missing timestamps before any inter-frame
/// delta has been observed (~30 fps).
const DEFAULT_FRAME_DURATION_MS: u64 = 33;

/// How long a paused decode loop waits for the next command.
const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Playback driver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Initialized, decode loop not yet running
    Ready,
    /// Decode loop in progress
    Running,
    /// Decode loop exited (stop signal, source exhaustion, or error)
    Stopped,
}

/// Commands sent to the decode thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeCommand {
    /// Start or resume decoding
    Resume,
    /// Park the producer between iterations without touching decoder state
    Pause,
    /// Exit the decode loop
    Stop,
}

/// Cooperative cancellation signal for the decode loop.
///
/// Cloneable so a consumer thread can halt the producer. The loop checks the
/// flag once per iteration, before pulling the next unit, so a stop lands
/// within one iteration and never tears down the source mid-decode.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests that the decode loop exit at the next iteration boundary.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Re-arms the signal so the loop can be run again after a stop.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Presentation-timestamp bookkeeping for the selected stream.
///
/// Converts decoder-native timestamps to truncated milliseconds. A missing
/// or negative timestamp inherits the previous timestamp plus an estimated
/// frame duration (the last observed inter-frame delta). Output is clamped
/// to be non-decreasing so queue order always equals presentation order.
#[derive(Debug)]
struct PtsTracker {
    timebase: Timebase,
    last_ms: Option<u64>,
    last_delta_ms: Option<u64>,
}

impl PtsTracker {
    fn new(timebase: Timebase) -> Self {
        Self {
            timebase,
            last_ms: None,
            last_delta_ms: None,
        }
    }

    fn next(&mut self, decoder_ts: Option<i64>) -> u64 {
        let ms = match decoder_ts {
            Some(ts) if ts >= 0 => self.timebase.to_millis(ts),
            _ => {
                let estimate = self.last_delta_ms.unwrap_or(DEFAULT_FRAME_DURATION_MS);
                self.last_ms.map_or(0, |last| last + estimate)
            }
        };

        let ms = match self.last_ms {
            Some(last) if ms < last => last,
            _ => ms,
        };

        if let Some(last) = self.last_ms {
            if ms > last {
                self.last_delta_ms = Some(ms - last);
            }
        }
        self.last_ms = Some(ms);
        ms
    }
}

/// Outcome of one decode-loop iteration.
enum LoopStep {
    /// More input may follow
    Continue,
    /// Source exhausted and decoder flushed
    Finished,
}

/// Owns one selected stream's decode pipeline and the frame queue.
///
/// # State Machine
///
/// ```text
/// init(source, kind, backend) → Ready
///
/// run() → Running
///   stop signal / source exhaustion → Stopped  (run() is repeatable)
///   fatal error                     → Stopped, error returned once
///
/// shutdown() / drop → handles released, queue drained
/// ```
///
/// The source, decoder, and normalizer handles are touched only by the
/// producer: the context moves onto the decode thread whole, and the
/// consumer side holds nothing but the queue and the stop handle.
pub struct PlaybackContext<S, B>
where
    S: MediaSource,
    B: MediaBackend,
{
    source: S,
    decoder: B::Decoder,
    normalizer: B::Normalizer,
    /// The stream selected at init; units from other streams are discarded
    stream: StreamInfo,
    queue: Arc<FrameQueue>,
    stop: StopHandle,
    state: PlaybackState,
    pts: PtsTracker,
}

impl<S, B> PlaybackContext<S, B>
where
    S: MediaSource,
    B: MediaBackend,
{
    /// Binds a source and selects the first stream of the requested kind.
    ///
    /// Fails with [`VideoError::NoMatchingStream`] when the container has no
    /// such stream, [`VideoError::DecoderUnavailable`] when the backend has
    /// no decoder for its codec, and [`VideoError::NormalizerInit`] when the
    /// conversion context cannot be built. On any failure nothing is left
    /// running and the source is dropped.
    pub fn init(source: S, desired: MediaKind, backend: &B) -> Result<Self, VideoError> {
        let stream = source
            .streams()
            .iter()
            .find(|s| s.kind == desired)
            .cloned()
            .ok_or(VideoError::NoMatchingStream(desired))?;

        tracing::debug!(
            "selected {} stream {} ({}, {}x{})",
            desired,
            stream.index,
            stream.codec,
            stream.width,
            stream.height
        );

        let decoder = backend.find_decoder(&stream)?;
        let normalizer = backend.normalizer(&stream)?;
        let pts = PtsTracker::new(stream.timebase);

        Ok(Self {
            source,
            decoder,
            normalizer,
            stream,
            queue: Arc::new(FrameQueue::new()),
            stop: StopHandle::new(),
            state: PlaybackState::Ready,
            pts,
        })
    }

    /// Returns the current driver state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Returns the stream selected at init.
    pub fn selected_stream(&self) -> &StreamInfo {
        &self.stream
    }

    /// Returns a shared handle to the frame queue for the consumer side.
    pub fn frame_queue(&self) -> Arc<FrameQueue> {
        Arc::clone(&self.queue)
    }

    /// Returns a stop handle for halting the loop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Takes the next frame for presentation, if one is queued.
    pub fn pop_frame(&self) -> Option<VideoFrame> {
        self.queue.pop()
    }

    /// Runs the decode loop until the stop signal or source exhaustion.
    ///
    /// Repeatable: a later call resumes reading where the source left off
    /// (clear the stop handle first if a stop was signaled). A fatal error
    /// is reported once and ends the loop.
    pub fn run(&mut self) -> Result<(), VideoError> {
        self.state = PlaybackState::Running;
        tracing::debug!("decode loop running on stream {}", self.stream.index);

        let result = loop {
            if self.stop.is_stopped() {
                tracing::debug!("decode loop observed stop signal");
                break Ok(());
            }
            match self.step() {
                Ok(LoopStep::Continue) => {}
                Ok(LoopStep::Finished) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.state = PlaybackState::Stopped;
        if let Err(e) = &result {
            tracing::error!("decode loop failed: {e}");
        }
        result
    }

    /// One loop iteration: pull a unit, filter, submit, drain output.
    fn step(&mut self) -> Result<LoopStep, VideoError> {
        let unit = match self.source.read_next_unit()? {
            Some(unit) => unit,
            None => {
                self.finish_stream()?;
                return Ok(LoopStep::Finished);
            }
        };

        // Containers interleave streams; only the selected one is ours.
        if unit.stream_index != self.stream.index {
            return Ok(LoopStep::Continue);
        }

        if let Err(e) = self.decoder.submit(unit) {
            if e.is_transient() {
                tracing::warn!("skipping undecodable unit: {e}");
                return Ok(LoopStep::Continue);
            }
            return Err(e);
        }

        self.drain_decoder()?;
        Ok(LoopStep::Continue)
    }

    /// Drains every frame the decoder has ready, normalizing and queueing
    /// each. One submitted unit may yield zero, one, or several frames.
    fn drain_decoder(&mut self) -> Result<(), VideoError> {
        loop {
            let raw = match self.decoder.receive_frame() {
                Ok(Some(raw)) => raw,
                Ok(None) => return Ok(()),
                Err(e) if e.is_transient() => {
                    tracing::warn!("dropping corrupt frame: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let frame = self.normalizer.convert(&raw)?;
            let pts_ms = self.pts.next(raw.pts);
            if !self.queue.push(VideoFrame::new(Duration::from_millis(pts_ms), frame)) {
                // Queue stopped mid-shutdown; nothing left to deliver to.
                return Ok(());
            }
            tracing::trace!("queued frame at {} ms", pts_ms);
        }
    }

    /// Source exhausted: flush the decoder and drain what it buffered so
    /// trailing frames are not dropped, then latch end-of-stream.
    fn finish_stream(&mut self) -> Result<(), VideoError> {
        self.decoder.flush()?;
        self.drain_decoder()?;
        self.queue.set_eos();
        tracing::debug!("source exhausted, {} frames queued", self.queue.len());
        Ok(())
    }

    /// Stops the loop if one is pending and empties the queue. Decoder,
    /// normalizer, and source handles are released when the context drops.
    pub fn shutdown(&mut self) {
        self.stop.stop();
        self.queue.stop();
        self.queue.drain();
        self.state = PlaybackState::Stopped;
    }
}

/// Runs a playback context on a dedicated producer thread.
///
/// Decoding starts immediately. The consumer keeps a clone of the frame
/// queue (or calls [`pop_frame`](Self::pop_frame)) and never touches the
/// context itself, which lives on the producer thread until it exits.
pub struct DecodeThread {
    /// Producer thread handle; taken on join/drop
    handle: Option<JoinHandle<Result<(), VideoError>>>,
    command_tx: Sender<DecodeCommand>,
    queue: Arc<FrameQueue>,
    stop: StopHandle,
}

impl DecodeThread {
    /// Moves the context onto a new thread and starts the decode loop.
    pub fn spawn<S, B>(ctx: PlaybackContext<S, B>) -> Self
    where
        S: MediaSource + Send + 'static,
        B: MediaBackend + 'static,
    {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let queue = ctx.frame_queue();
        let stop = ctx.stop_handle();

        let handle = thread::spawn(move || decode_loop(ctx, &command_rx));

        Self {
            handle: Some(handle),
            command_tx,
            queue,
            stop,
        }
    }

    /// Resumes a paused producer.
    pub fn resume(&self) {
        let _ = self.command_tx.send(DecodeCommand::Resume);
    }

    /// Parks the producer between iterations. Decoder state is untouched.
    pub fn pause(&self) {
        let _ = self.command_tx.send(DecodeCommand::Pause);
    }

    /// Halts the producer within one loop iteration.
    ///
    /// The queue is stopped first so a consumer blocked in `pop_blocking`
    /// wakes up; frames already queued remain poppable until drained.
    pub fn stop(&self) {
        self.queue.stop();
        self.stop.stop();
        let _ = self.command_tx.send(DecodeCommand::Stop);
    }

    /// Returns a shared handle to the frame queue.
    pub fn frame_queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }

    /// Takes the next frame for presentation, if one is queued.
    pub fn pop_frame(&self) -> Option<VideoFrame> {
        self.queue.pop()
    }

    /// Returns true once the decode loop has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Waits for the decode loop to exit (stop signal or source exhaustion)
    /// and returns its result.
    pub fn join(mut self) -> Result<(), VideoError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(VideoError::Decode("decode thread panicked".into()))),
            None => Ok(()),
        }
    }
}

impl Drop for DecodeThread {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.queue.drain();
    }
}

/// The decode loop body for the threaded driver.
///
/// Same per-iteration contract as [`PlaybackContext::run`], with a command
/// channel layered on: commands are drained non-blockingly each iteration,
/// and a paused loop waits on the channel instead of spinning.
fn decode_loop<S, B>(
    mut ctx: PlaybackContext<S, B>,
    command_rx: &Receiver<DecodeCommand>,
) -> Result<(), VideoError>
where
    S: MediaSource,
    B: MediaBackend,
{
    ctx.state = PlaybackState::Running;
    let mut playing = true;

    let result = loop {
        if ctx.stop.is_stopped() {
            tracing::debug!("decode thread observed stop signal");
            break Ok(());
        }

        let mut stop_requested = false;
        while let Ok(cmd) = command_rx.try_recv() {
            match cmd {
                DecodeCommand::Stop => stop_requested = true,
                DecodeCommand::Pause => playing = false,
                DecodeCommand::Resume => playing = true,
            }
        }
        if stop_requested {
            break Ok(());
        }

        if !playing {
            match command_rx.recv_timeout(COMMAND_POLL_INTERVAL) {
                Ok(DecodeCommand::Resume) => playing = true,
                Ok(DecodeCommand::Stop) => break Ok(()),
                Ok(DecodeCommand::Pause) | Err(_) => {}
            }
            continue;
        }

        match ctx.step() {
            Ok(LoopStep::Continue) => {}
            Ok(LoopStep::Finished) => break Ok(()),
            Err(e) => {
                tracing::error!("decode thread failed: {e}");
                break Err(e);
            }
        }
    };

    ctx.state = PlaybackState::Stopped;
    result
}
