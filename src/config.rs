//! Configuration types for capture streams.

use std::fmt;
use std::time::Duration;

use crate::StreamError;

/// Specifies which audio input device to capture from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelection {
    /// Use the system's default input device.
    #[default]
    Default,
    /// Use the device at this position in [`DeviceSource::list_devices()`].
    ///
    /// [`DeviceSource::list_devices()`]: crate::DeviceSource::list_devices
    Index(usize),
    /// Use a specific device by name.
    Name(String),
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default input"),
            Self::Index(index) => write!(f, "device #{index}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// What the block channel does when the renderer falls behind.
///
/// Neither policy ever blocks the capture path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Keep only the newest unconsumed block; older ones are discarded.
    ///
    /// Right for live displays that only ever show the current frame.
    #[default]
    LatestWins,

    /// Keep up to `capacity` unconsumed blocks, dropping the oldest on overflow.
    ///
    /// Tolerates brief render stalls when every block matters for analysis.
    BoundedQueue {
        /// Maximum number of queued blocks (at least 1).
        capacity: usize,
    },
}

impl OverflowPolicy {
    /// Creates a bounded-queue policy with the given capacity.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self::BoundedQueue { capacity }
    }

    /// Returns how many blocks the channel can hold at once.
    #[must_use]
    pub fn capacity(&self) -> usize {
        match self {
            Self::LatestWins => 1,
            Self::BoundedQueue { capacity } => *capacity,
        }
    }
}

/// Configuration for a capture stream.
///
/// Fixed for the lifetime of one stream: every [`SampleBlock`](crate::SampleBlock)
/// carries exactly `block_len` frames of `channels` interleaved samples.
///
/// # Example
///
/// ```
/// use scope_stream::{DeviceSelection, StreamConfig};
///
/// let config = StreamConfig {
///     device: DeviceSelection::Index(0),
///     ..Default::default()
/// };
/// assert_eq!(config.samples_per_block(), 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Sample rate in Hz.
    ///
    /// Default: 44100
    pub sample_rate: u32,

    /// Number of interleaved channels per frame.
    ///
    /// Default: 1
    pub channels: u16,

    /// Frames per block (samples per channel).
    ///
    /// Default: 1024 (~23ms at 44.1kHz)
    pub block_len: usize,

    /// Input device to open.
    pub device: DeviceSelection,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            block_len: 1024,
            device: DeviceSelection::Default,
        }
    }
}

impl StreamConfig {
    /// Checks that every field is positive.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.sample_rate == 0 {
            return Err(StreamError::invalid_config("sample rate must be positive"));
        }
        if self.channels == 0 {
            return Err(StreamError::invalid_config("channel count must be positive"));
        }
        if self.block_len == 0 {
            return Err(StreamError::invalid_config("block length must be positive"));
        }
        Ok(())
    }

    /// Total interleaved samples in one block.
    #[must_use]
    pub fn samples_per_block(&self) -> usize {
        self.block_len * self.channels as usize
    }

    /// Wall-clock duration covered by one block.
    #[must_use]
    pub fn block_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.block_len as f64 / f64::from(self.sample_rate))
    }
}
