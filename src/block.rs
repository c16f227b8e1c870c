//! Fixed-size sample block with stream metadata.

use std::time::Duration;

/// Effective silence floor in dBFS.
const SILENCE_FLOOR_DB: f32 = -96.0;

/// A fixed-length run of interleaved `f32` samples handed from capture to render.
///
/// `SampleBlock` is the unit of transfer through the pipeline. Samples are
/// interleaved frame by frame (`L R L R ...` for stereo) and nominally in
/// `[-1.0, 1.0]`. A block is moved, never shared: once published, only the
/// channel owns it until the render side takes it.
///
/// # Example
///
/// ```
/// use scope_stream::SampleBlock;
/// use std::time::Duration;
///
/// let block = SampleBlock::new(1, vec![0.0; 1024], Duration::ZERO, 44100, 1);
/// assert_eq!(block.frame_count(), 1024);
/// assert_eq!(block.sequence(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    sequence: u64,
    samples: Vec<f32>,
    timestamp: Duration,
    sample_rate: u32,
    channels: u16,
}

impl SampleBlock {
    /// Creates a new block.
    ///
    /// `timestamp` is the stream time of the first frame.
    pub fn new(
        sequence: u64,
        samples: Vec<f32>,
        timestamp: Duration,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        Self {
            sequence,
            samples,
            timestamp,
            sample_rate,
            channels,
        }
    }

    /// Monotonically increasing position of this block in its stream, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consumes the block and returns its sample buffer.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Stream time of the first frame.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Total number of samples across all channels.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if this block contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the number of frames in this block.
    ///
    /// A frame contains one sample per channel.
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Returns the duration covered by this block.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate))
    }

    /// Iterates over the samples of one channel.
    ///
    /// Yields nothing if `channel` is out of range.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        let stride = self.channels as usize;
        let start = if channel < stride {
            channel
        } else {
            self.samples.len()
        };
        self.samples
            .get(start..)
            .unwrap_or_default()
            .iter()
            .step_by(stride.max(1))
            .copied()
    }

    /// Summarises the block's signal level for display.
    pub fn levels(&self) -> BlockLevels {
        BlockLevels::measure(&self.samples)
    }
}

/// Peak, RMS, and clipping summary of a block.
///
/// Renderers use this to draw meters without touching raw samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockLevels {
    /// Largest absolute sample value.
    pub peak: f32,
    /// RMS level in dBFS, floored at -96 dB.
    pub rms_db: f32,
    /// Samples at or beyond full scale.
    pub clipped: u32,
}

impl BlockLevels {
    /// Measures a run of samples.
    pub fn measure(samples: &[f32]) -> Self {
        if samples.is_empty() {
            return Self {
                peak: 0.0,
                rms_db: SILENCE_FLOOR_DB,
                clipped: 0,
            };
        }

        let mut peak = 0.0_f32;
        let mut sum_squares = 0.0_f64;
        let mut clipped = 0_u32;

        for &s in samples {
            let abs = s.abs();
            if abs > peak {
                peak = abs;
            }
            sum_squares += f64::from(s) * f64::from(s);
            if abs >= 1.0 {
                clipped += 1;
            }
        }

        Self {
            peak,
            rms_db: rms_to_db(sum_squares, samples.len()),
            clipped,
        }
    }
}

fn rms_to_db(sum_squares: f64, count: usize) -> f32 {
    let rms = (sum_squares / count as f64).sqrt();
    if rms > 0.0 {
        (20.0 * rms.log10()).max(f64::from(SILENCE_FLOOR_DB)) as f32
    } else {
        SILENCE_FLOOR_DB
    }
}
