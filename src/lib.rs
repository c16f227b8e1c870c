//! # scope-stream
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Live audio capture for real-time displays.
//!
//! `scope-stream` captures fixed-size sample blocks from an input device via
//! CPAL and hands them to a slower consumer, typically a plot or level meter,
//! without ever blocking the capture path. The device is released exactly once
//! however the display loop ends.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scope_stream::{CpalSource, LiveCapture, RenderDriver, RenderError, Renderer, SampleBlock};
//! use std::time::Duration;
//!
//! struct Meter;
//!
//! impl Renderer for Meter {
//!     fn update(&mut self, block: SampleBlock) -> Result<(), RenderError> {
//!         println!("{:>6.1} dBFS", block.levels().rms_db);
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), scope_stream::StreamError> {
//! let session = LiveCapture::builder()
//!     .sample_rate(44100)
//!     .block_len(1024)
//!     .on_event(|e| tracing::debug!(?e, "stream event"))
//!     .open(&CpalSource::new())?;
//!
//! // Redraw at ~30 fps until the display closes or Ctrl-C
//! let summary = RenderDriver::new(Meter)
//!     .run(session, Duration::from_millis(33))
//!     .await?;
//! println!("rendered {} frames", summary.render.frames);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Capture context**: CPAL callback (or a blocking reader thread) that
//!   assembles blocks and publishes them; it never waits on the renderer
//! - **Block channel**: Latest-wins slot (or small bounded queue) guarded by a
//!   lock held only for O(1) work
//! - **Render context**: [`RenderDriver`] ticks at the display's own cadence,
//!   takes the newest block, and draws it
//!
//! A slow renderer therefore sees fewer blocks, never stale ones, and the
//! device never overruns because of drawing.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![allow(clippy::unwrap_used)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod block;
mod builder;
mod config;
mod error;
mod event;
pub mod format;
mod pipeline;
mod render;
mod session;
pub mod source;

pub use block::{BlockLevels, SampleBlock};
pub use builder::{LiveCapture, LiveCaptureBuilder};
pub use config::{DeviceSelection, OverflowPolicy, StreamConfig};
pub use error::{RenderError, StreamError};
pub use event::{event_callback, EventCallback, StreamEvent};
pub use pipeline::{BlockAssembler, BlockChannel, BlockPublisher, ChannelStats, ErrorReporter};
pub use render::{
    ChannelRenderer, RenderDriver, RenderStats, RenderSummary, Renderer, StopReason, StopSignal,
    Tick,
};
pub use session::{Session, SessionStats, StreamState};
pub use source::{
    spawn_read_loop, BlockReader, CaptureStream, CpalSource, DeviceInfo, DeviceSource, MockSignal,
    MockSource, StopCapture,
};
