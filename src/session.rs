//! Capture session lifecycle.
//!
//! A [`Session`] owns the device stream and the block channel. It is opened at
//! most once and closed exactly once, whichever way the caller exits.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::pipeline::{BlockChannel, BlockPublisher, ChannelStats};
use crate::source::{CaptureStream, DeviceSource};
use crate::{
    EventCallback, OverflowPolicy, SampleBlock, StreamConfig, StreamError, StreamEvent,
};

/// Lifecycle states of a capture session.
///
/// `Idle → Running → Stopping → Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamState {
    /// Device not yet opened.
    Idle = 0,
    /// Capture active, blocks flowing.
    Running = 1,
    /// Close requested, device failed, or end of stream; waiting for release.
    Stopping = 2,
    /// Device released. No further transitions.
    Closed = 3,
}

impl StreamState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Statistics about a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Current lifecycle state.
    pub state: StreamState,
    /// Blocks accepted from the device.
    pub blocks_published: u64,
    /// Blocks handed to the render side.
    pub blocks_taken: u64,
    /// Blocks discarded without being rendered.
    pub blocks_dropped: u64,
}

/// State shared between the session and its capture context.
pub(crate) struct SessionState {
    state: AtomicU8,
    device_error: Mutex<Option<String>>,
    finished: AtomicBool,
    event_callback: Option<EventCallback>,
}

impl SessionState {
    pub fn new(event_callback: Option<EventCallback>) -> Self {
        Self {
            state: AtomicU8::new(StreamState::Idle as u8),
            device_error: Mutex::new(None),
            finished: AtomicBool::new(false),
            event_callback,
        }
    }

    pub fn current(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Moves `from → to` if the session is still in `from`.
    pub fn transition(&self, from: StreamState, to: StreamState) -> bool {
        let moved = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if moved {
            tracing::debug!("Stream state {} -> {}", from, to);
            self.emit(StreamEvent::StateChanged { from, to });
        }
        moved
    }

    /// Records a terminal device error. Only the first one is kept.
    pub fn fail(&self, reason: String) -> bool {
        if self.current() == StreamState::Closed {
            return false;
        }
        {
            let mut slot = self.device_error.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason.clone());
        }

        tracing::warn!(%reason, "Capture device failed");
        self.emit(StreamEvent::DeviceError { reason });
        self.transition(StreamState::Running, StreamState::Stopping);
        true
    }

    /// Records that the capture side delivered its last block.
    pub fn finish(&self) -> bool {
        if self.current() == StreamState::Closed || self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }

        tracing::info!("Capture reached end of stream");
        self.transition(StreamState::Running, StreamState::Stopping);
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Forgets errors and end of stream reported by a capture that never opened.
    pub fn clear_capture_outcome(&self) {
        self.device_error.lock().take();
        self.finished.store(false, Ordering::SeqCst);
    }

    pub fn device_error(&self) -> Option<String> {
        self.device_error.lock().clone()
    }

    pub fn emit(&self, event: StreamEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}

/// Handle to one capture stream and its block channel.
///
/// # Lifecycle
///
/// 1. Created `Idle` by [`Session::new()`] or [`LiveCaptureBuilder::build()`]
/// 2. [`open()`](Session::open) starts the device and moves to `Running`
/// 3. The render side pulls blocks with [`try_take()`](Session::try_take)
/// 4. [`close()`](Session::close) closes the channel, releases the device, and
///    moves to `Closed`. Dropping the `Session` also closes it.
///
/// A device error or the end of a finite stream moves the session to
/// `Stopping` on its own; the device is still released only by `close`.
///
/// # Example
///
/// ```
/// use scope_stream::{MockSource, OverflowPolicy, Session, StreamConfig, StreamState};
///
/// let source = MockSource::new().unpaced();
/// let mut session = Session::new(StreamConfig::default(), OverflowPolicy::LatestWins)?;
/// session.open(&source)?;
/// assert_eq!(session.state(), StreamState::Running);
///
/// session.close();
/// session.close(); // no-op
/// assert_eq!(session.state(), StreamState::Closed);
/// assert_eq!(source.releases(), 1);
/// # Ok::<(), scope_stream::StreamError>(())
/// ```
///
/// [`LiveCaptureBuilder::build()`]: crate::LiveCaptureBuilder::build
pub struct Session {
    config: StreamConfig,
    state: Arc<SessionState>,
    channel: Arc<BlockChannel>,
    capture: Option<CaptureStream>,
}

impl Session {
    /// Creates an idle session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the config or policy is unusable.
    pub fn new(config: StreamConfig, policy: OverflowPolicy) -> Result<Self, StreamError> {
        Self::with_event_callback(config, policy, None)
    }

    pub(crate) fn with_event_callback(
        config: StreamConfig,
        policy: OverflowPolicy,
        event_callback: Option<EventCallback>,
    ) -> Result<Self, StreamError> {
        let channel = BlockChannel::new(&config, policy)?;
        Ok(Self {
            config,
            state: Arc::new(SessionState::new(event_callback)),
            channel: Arc::new(channel),
            capture: None,
        })
    }

    /// Starts the device stream and moves `Idle → Running`.
    ///
    /// If the source fails, nothing was acquired and the session stays `Idle`.
    /// Anything the failed capture reported is discarded, so `open` can be
    /// retried.
    ///
    /// # Errors
    ///
    /// - `DeviceUnavailable` if the source cannot open the device
    /// - `AlreadyOpen` if the session is running or stopping
    /// - `StreamClosed` if the session has been closed
    pub fn open<S: DeviceSource + ?Sized>(&mut self, source: &S) -> Result<(), StreamError> {
        match self.state() {
            StreamState::Idle => {}
            StreamState::Closed => return Err(StreamError::StreamClosed),
            StreamState::Running | StreamState::Stopping => return Err(StreamError::AlreadyOpen),
        }

        let publisher = BlockPublisher::new(
            &self.config,
            Arc::clone(&self.channel),
            Arc::clone(&self.state),
        );
        let capture = source.open(&self.config, publisher).map_err(|e| {
            tracing::warn!(source = source.name(), error = %e, "Failed to open capture stream");
            self.state.clear_capture_outcome();
            e
        })?;

        let device = capture.device_name().to_string();
        self.capture = Some(capture);
        self.state.transition(StreamState::Idle, StreamState::Running);

        tracing::info!(
            "Capture opened: device={}, {}Hz/{}ch, block={} frames, policy={:?}",
            device,
            self.config.sample_rate,
            self.config.channels,
            self.config.block_len,
            self.channel.policy()
        );
        self.state.emit(StreamEvent::Opened { device });

        // The device may have failed or ended before the session reached Running.
        if self.state.device_error().is_some() || self.state.is_finished() {
            self.state
                .transition(StreamState::Running, StreamState::Stopping);
        }
        Ok(())
    }

    /// Takes the next block for rendering without waiting.
    ///
    /// # Errors
    ///
    /// Returns `StreamClosed` after [`close()`](Self::close).
    pub fn try_take(&self) -> Result<Option<SampleBlock>, StreamError> {
        self.channel.try_take()
    }

    /// Asks a running session to stop (`Running → Stopping`).
    ///
    /// Blocks keep flowing until [`close()`](Self::close) releases the device.
    /// Returns `false` if the session was not running.
    pub fn request_stop(&self) -> bool {
        self.state
            .transition(StreamState::Running, StreamState::Stopping)
    }

    /// Closes the channel, releases the device, and moves to `Closed`.
    ///
    /// Idempotent and infallible. On an `Idle` session (never opened, or whose
    /// open failed) there is nothing to release and this does nothing.
    pub fn close(&mut self) {
        match self.state() {
            StreamState::Idle | StreamState::Closed => return,
            StreamState::Running => {
                self.state
                    .transition(StreamState::Running, StreamState::Stopping);
            }
            StreamState::Stopping => {}
        }

        // Close the channel first so the capture context is rejected even if
        // it is mid-publish while the device shuts down.
        self.channel.close();
        if let Some(capture) = self.capture.take() {
            capture.stop();
        }
        self.state
            .transition(StreamState::Stopping, StreamState::Closed);

        let stats = self.channel.stats();
        tracing::info!(
            "Capture closed: {} blocks published, {} rendered, {} dropped",
            stats.published,
            stats.taken,
            stats.dropped
        );
        self.state.emit(StreamEvent::Closed {
            published: stats.published,
            dropped: stats.dropped,
        });
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state.current()
    }

    /// Returns `true` while blocks are flowing.
    pub fn is_running(&self) -> bool {
        self.state() == StreamState::Running
    }

    /// Returns `true` once the capture side has delivered its last block.
    ///
    /// Blocks published before the end may still be waiting in the channel.
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// The terminal device error, if the device has failed.
    pub fn device_error(&self) -> Option<StreamError> {
        self.state.device_error().map(StreamError::device_error)
    }

    /// Name of the opened device, if any.
    pub fn device_name(&self) -> Option<&str> {
        self.capture.as_ref().map(CaptureStream::device_name)
    }

    /// The stream configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The block channel shared with the capture context.
    pub fn channel(&self) -> &Arc<BlockChannel> {
        &self.channel
    }

    /// Returns current session statistics.
    pub fn stats(&self) -> SessionStats {
        let ChannelStats {
            published,
            taken,
            dropped,
        } = self.channel.stats();
        SessionStats {
            state: self.state(),
            blocks_published: published,
            blocks_taken: taken,
            blocks_dropped: dropped,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if matches!(self.state(), StreamState::Running | StreamState::Stopping) {
            tracing::debug!("Session dropped without close() - releasing device");
            self.close();
        }
    }
}
