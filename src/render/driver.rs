//! Render loop driver.
//!
//! Pulls blocks from a [`Session`] at the display's cadence and hands them to
//! a [`Renderer`]. The driver is the only place that decides when the loop
//! ends, and it always closes the session before reporting why.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::pipeline::ChannelStats;
use crate::render::Renderer;
use crate::session::{Session, StreamState};
use crate::{RenderError, SampleBlock, StreamError};

/// Why the render loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The renderer reported that its display was closed.
    DisplayClosed,
    /// The [`StopSignal`] was triggered.
    Cancelled,
    /// The device reported a terminal error.
    DeviceError,
    /// The renderer failed to draw a block.
    RenderFailure,
    /// The session was closed from elsewhere.
    StreamClosed,
    /// The source delivered its last block and every queued block was taken.
    EndOfStream,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisplayClosed => write!(f, "display closed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeviceError => write!(f, "device error"),
            Self::RenderFailure => write!(f, "render failure"),
            Self::StreamClosed => write!(f, "stream closed"),
            Self::EndOfStream => write!(f, "end of stream"),
        }
    }
}

/// Outcome of one render tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Keep ticking.
    Continue,
    /// The loop is done. Every later tick returns the same reason.
    Stop(StopReason),
}

/// Cloneable cancellation flag for a render loop.
///
/// # Example
///
/// ```
/// use scope_stream::StopSignal;
///
/// let signal = StopSignal::new();
/// let for_ctrl_c = signal.clone();
/// for_ctrl_c.cancel();
/// assert!(signal.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the render loop to stop at its next tick.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel()`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters kept by a [`RenderDriver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Ticks that ran before the loop stopped.
    pub ticks: u64,
    /// Blocks drawn successfully.
    pub frames: u64,
    /// Ticks where no new block had arrived.
    pub empty_ticks: u64,
    /// Sequence numbers skipped between drawn blocks.
    pub skipped: u64,
    /// Sequence number of the last block handed to the renderer.
    pub last_sequence: Option<u64>,
}

/// Summary returned by [`RenderDriver::run()`] on a clean stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    /// Why the loop stopped.
    pub reason: StopReason,
    /// Render-side counters.
    pub render: RenderStats,
    /// Channel counters at close.
    pub channel: ChannelStats,
    /// Session state after close (always `Closed`).
    pub final_state: StreamState,
}

/// Drives a [`Renderer`] from a [`Session`].
///
/// Each [`tick()`](Self::tick) checks for a stop condition, then takes at most
/// one block and draws it. Once a tick returns [`Tick::Stop`] the driver never
/// touches the session's channel again.
pub struct RenderDriver<R> {
    renderer: R,
    stop_signal: StopSignal,
    stats: RenderStats,
    stopped: Option<StopReason>,
    render_error: Option<RenderError>,
}

impl<R: Renderer> RenderDriver<R> {
    /// Creates a driver for `renderer`.
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            stop_signal: StopSignal::new(),
            stats: RenderStats::default(),
            stopped: None,
            render_error: None,
        }
    }

    /// Uses an existing stop signal, e.g. one wired to Ctrl-C.
    #[must_use]
    pub fn with_stop_signal(mut self, signal: StopSignal) -> Self {
        self.stop_signal = signal;
        self
    }

    /// Returns a handle that cancels this driver.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop_signal.clone()
    }

    /// The driven renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Mutable access to the driven renderer.
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Consumes the driver and returns its renderer.
    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Render-side counters so far.
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Why the driver stopped, if it has.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stopped
    }

    /// Runs one iteration of the render loop.
    ///
    /// On a stop condition the session is asked to stop, but not closed; the
    /// caller (or [`run()`](Self::run)) owns the session and closes it.
    pub fn tick(&mut self, session: &Session) -> Tick {
        if let Some(reason) = self.stopped {
            return Tick::Stop(reason);
        }
        self.stats.ticks += 1;

        let reason = if self.renderer.is_closed() {
            Some(StopReason::DisplayClosed)
        } else if self.stop_signal.is_cancelled() {
            Some(StopReason::Cancelled)
        } else if session.device_error().is_some() {
            Some(StopReason::DeviceError)
        } else {
            // Read before taking: a block published ahead of the end is then
            // already in the channel, so an empty take means fully drained.
            let finished = session.is_finished();
            match session.try_take() {
                Ok(Some(block)) => self.render(block),
                Ok(None) if finished => Some(StopReason::EndOfStream),
                Ok(None) => {
                    self.stats.empty_ticks += 1;
                    None
                }
                Err(_) => Some(StopReason::StreamClosed),
            }
        };

        match reason {
            Some(reason) => self.stop(session, reason),
            None => Tick::Continue,
        }
    }

    /// Ticks every `interval` until a stop condition, then closes the session.
    ///
    /// Missed ticks are skipped rather than bursted, so a slow renderer simply
    /// sees fewer blocks.
    ///
    /// # Errors
    ///
    /// - `DeviceError` if the device failed
    /// - `RenderFailure` if the renderer failed
    /// - `InvalidConfig` if `interval` is zero
    ///
    /// In every case the session has been closed and the device released
    /// before the error is returned.
    pub async fn run(
        &mut self,
        mut session: Session,
        interval: Duration,
    ) -> Result<RenderSummary, StreamError> {
        if interval.is_zero() {
            session.close();
            return Err(StreamError::invalid_config("render interval must be non-zero"));
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let reason = loop {
            ticker.tick().await;
            if let Tick::Stop(reason) = self.tick(&session) {
                break reason;
            }
        };

        let device_error = session.device_error();
        session.close();

        match reason {
            StopReason::DeviceError => Err(device_error
                .unwrap_or_else(|| StreamError::device_error("device stopped"))),
            StopReason::RenderFailure => Err(self.render_error.take().map_or_else(
                || StreamError::RenderFailure {
                    reason: "renderer failed".to_string(),
                },
                StreamError::from,
            )),
            _ => Ok(RenderSummary {
                reason,
                render: self.stats,
                channel: session.channel().stats(),
                final_state: session.state(),
            }),
        }
    }

    fn render(&mut self, block: SampleBlock) -> Option<StopReason> {
        let sequence = block.sequence();
        if let Some(last) = self.stats.last_sequence {
            self.stats.skipped += sequence.saturating_sub(last + 1);
        }
        self.stats.last_sequence = Some(sequence);

        match self.renderer.update(block) {
            Ok(()) => {
                self.stats.frames += 1;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, sequence, "Renderer failed");
                self.render_error = Some(e);
                Some(StopReason::RenderFailure)
            }
        }
    }

    fn stop(&mut self, session: &Session, reason: StopReason) -> Tick {
        tracing::info!(
            "Render loop stopping ({}): {} frames drawn, {} skipped",
            reason,
            self.stats.frames,
            self.stats.skipped
        );
        self.stopped = Some(reason);
        session.request_stop();
        Tick::Stop(reason)
    }
}
