//! Capture-side handle - assembles device buffers into blocks and publishes them.
//!
//! A [`BlockPublisher`] is moved into the device callback (or blocking reader
//! thread) when a session opens. It owns the block assembler, so sequence
//! numbering and timestamps are decided in exactly one place.

use std::sync::Arc;

use crate::format::{i16_into_f32, u16_into_f32};
use crate::pipeline::{BlockAssembler, BlockChannel};
use crate::session::SessionState;
use crate::{StreamConfig, StreamError};

/// Publishes a device's samples into a session's block channel.
///
/// Every method is non-blocking with respect to the render side.
pub struct BlockPublisher {
    assembler: BlockAssembler,
    channel: Arc<BlockChannel>,
    state: Arc<SessionState>,
    /// Conversion buffer for integer device formats.
    scratch: Vec<f32>,
    block_samples: usize,
}

impl BlockPublisher {
    pub(crate) fn new(
        config: &StreamConfig,
        channel: Arc<BlockChannel>,
        state: Arc<SessionState>,
    ) -> Self {
        let block_samples = config.samples_per_block();
        Self {
            assembler: BlockAssembler::new(config),
            channel,
            state,
            scratch: Vec::with_capacity(block_samples),
            block_samples,
        }
    }

    /// Pushes interleaved `f32` samples of any length.
    ///
    /// Complete blocks are published as they fill; the remainder waits for the
    /// next call.
    ///
    /// # Errors
    ///
    /// Returns `StreamClosed` once the session has closed.
    pub fn push_interleaved(&mut self, data: &[f32]) -> Result<(), StreamError> {
        let channel = &self.channel;
        self.assembler.push(data, |block| channel.publish(block))
    }

    /// Pushes interleaved signed 16-bit samples.
    ///
    /// # Errors
    ///
    /// Returns `StreamClosed` once the session has closed.
    pub fn push_i16(&mut self, data: &[i16]) -> Result<(), StreamError> {
        i16_into_f32(data, &mut self.scratch);
        let channel = &self.channel;
        self.assembler
            .push(&self.scratch, |block| channel.publish(block))
    }

    /// Pushes interleaved unsigned 16-bit samples.
    ///
    /// # Errors
    ///
    /// Returns `StreamClosed` once the session has closed.
    pub fn push_u16(&mut self, data: &[u16]) -> Result<(), StreamError> {
        u16_into_f32(data, &mut self.scratch);
        let channel = &self.channel;
        self.assembler
            .push(&self.scratch, |block| channel.publish(block))
    }

    /// Publishes one complete block read by a blocking reader.
    ///
    /// # Errors
    ///
    /// - `StreamClosed` once the session has closed
    /// - `InvalidBlock` if `samples` is not exactly one block long
    pub fn publish_samples(&mut self, samples: Vec<f32>) -> Result<(), StreamError> {
        if samples.len() != self.block_samples {
            return Err(StreamError::invalid_block(format!(
                "expected {} samples, got {}",
                self.block_samples,
                samples.len()
            )));
        }
        let block = self.assembler.stamp(samples);
        self.channel.publish(block)
    }

    /// Reports a terminal device error to the session.
    ///
    /// Only the first error of a session is kept.
    pub fn report_error(&self, reason: impl Into<String>) {
        self.state.fail(reason.into());
    }

    /// Tells the session that no more blocks will arrive.
    ///
    /// The render side drains what is already queued and then stops. Returns
    /// `false` if the end was already reported or the session closed.
    pub fn finish(&self) -> bool {
        self.state.finish()
    }

    /// Returns a cloneable reporter for backends with a separate error callback.
    pub fn error_reporter(&self) -> ErrorReporter {
        ErrorReporter {
            state: Arc::clone(&self.state),
        }
    }

    /// Samples per block (`block_len × channels`).
    pub fn block_samples(&self) -> usize {
        self.block_samples
    }

    /// Returns `true` once the session has closed its channel.
    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}

/// Reports terminal device errors from outside the data callback.
#[derive(Clone)]
pub struct ErrorReporter {
    state: Arc<SessionState>,
}

impl ErrorReporter {
    /// Records `reason` as the session's device error.
    ///
    /// Returns `false` if an error was already recorded or the session closed.
    pub fn report(&self, reason: impl Into<String>) -> bool {
        self.state.fail(reason.into())
    }
}
