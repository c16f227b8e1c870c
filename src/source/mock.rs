//! Mock audio source for testing without hardware.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::pipeline::BlockPublisher;
use crate::source::{
    spawn_read_loop, BlockReader, CaptureStream, DeviceInfo, DeviceSource, ReadLoop, StopCapture,
};
use crate::{DeviceSelection, StreamConfig, StreamError};

const DEFAULT_DEVICE: &str = "Mock Input";

/// Synthetic signal produced by a [`MockSource`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockSignal {
    /// All zeros.
    Silence,
    /// Phase-continuous sine wave, same on every channel.
    Sine {
        /// Frequency in Hz.
        frequency: f64,
        /// Peak amplitude in `[0.0, 1.0]`.
        amplitude: f32,
    },
    /// Deterministic white noise.
    Noise {
        /// Peak amplitude in `[0.0, 1.0]`.
        amplitude: f32,
    },
}

impl Default for MockSignal {
    fn default() -> Self {
        Self::Sine {
            frequency: 440.0,
            amplitude: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pace {
    /// One block per block duration.
    RealTime,
    Every(Duration),
    Unpaced,
}

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    releases: AtomicUsize,
}

/// A device source that generates synthetic audio for testing.
///
/// Each opened stream runs on its own reader thread, paced like a real device
/// by default. This allows testing the full pipeline without requiring actual
/// audio hardware, making it suitable for CI environments.
///
/// # Example
///
/// ```
/// use scope_stream::{LiveCapture, MockSource};
/// use std::time::Duration;
///
/// let source = MockSource::new()
///     .with_block_interval(Duration::from_millis(2))
///     .with_block_limit(10);
///
/// let mut session = LiveCapture::builder().block_len(256).open(&source)?;
/// session.close();
///
/// assert_eq!(source.opens(), 1);
/// assert_eq!(source.releases(), 1);
/// # Ok::<(), scope_stream::StreamError>(())
/// ```
pub struct MockSource {
    devices: Vec<String>,
    signal: MockSignal,
    pace: Pace,
    block_limit: Option<u64>,
    fail_open: Option<String>,
    fail_after: Option<u64>,
    counters: Arc<Counters>,
}

impl MockSource {
    /// Creates a mock source with one device producing a 440Hz sine.
    pub fn new() -> Self {
        Self {
            devices: vec![DEFAULT_DEVICE.to_string()],
            signal: MockSignal::default(),
            pace: Pace::RealTime,
            block_limit: None,
            fail_open: None,
            fail_after: None,
            counters: Arc::default(),
        }
    }

    /// Sets the generated signal.
    #[must_use]
    pub fn with_signal(mut self, signal: MockSignal) -> Self {
        self.signal = signal;
        self
    }

    /// Replaces the device list. The first device is the default.
    #[must_use]
    pub fn with_devices<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.devices = names.into_iter().map(Into::into).collect();
        self
    }

    /// Delivers one block per `interval` instead of real-time cadence.
    #[must_use]
    pub fn with_block_interval(mut self, interval: Duration) -> Self {
        self.pace = Pace::Every(interval);
        self
    }

    /// Delivers blocks as fast as the channel accepts them.
    #[must_use]
    pub fn unpaced(mut self) -> Self {
        self.pace = Pace::Unpaced;
        self
    }

    /// Ends the stream after `blocks` blocks.
    #[must_use]
    pub fn with_block_limit(mut self, blocks: u64) -> Self {
        self.block_limit = Some(blocks);
        self
    }

    /// Makes every `open` fail with `DeviceUnavailable`.
    #[must_use]
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.fail_open = Some(reason.into());
        self
    }

    /// Simulates a device disconnect after `blocks` blocks.
    #[must_use]
    pub fn fail_after(mut self, blocks: u64) -> Self {
        self.fail_after = Some(blocks);
        self
    }

    /// Number of successful opens.
    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// Number of device releases.
    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    fn resolve(&self, selection: &DeviceSelection) -> Option<String> {
        match selection {
            DeviceSelection::Default => self.devices.first().cloned(),
            DeviceSelection::Index(index) => self.devices.get(*index).cloned(),
            DeviceSelection::Name(name) => self.devices.iter().find(|d| *d == name).cloned(),
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, StreamError> {
        Ok(self
            .devices
            .iter()
            .enumerate()
            .map(|(index, name)| DeviceInfo {
                index,
                name: name.clone(),
            })
            .collect())
    }

    fn open(
        &self,
        config: &StreamConfig,
        publisher: BlockPublisher,
    ) -> Result<CaptureStream, StreamError> {
        if let Some(ref reason) = self.fail_open {
            return Err(StreamError::device_unavailable(
                config.device.to_string(),
                reason.clone(),
            ));
        }
        let device = self.resolve(&config.device).ok_or_else(|| {
            StreamError::device_unavailable(config.device.to_string(), "no such mock device")
        })?;

        let interval = match self.pace {
            Pace::RealTime => Some(config.block_duration()),
            Pace::Every(interval) => Some(interval),
            Pace::Unpaced => None,
        };
        let reader = MockReader {
            generator: SignalGenerator::new(self.signal, config),
            interval,
            deadline: Instant::now(),
            blocks_read: 0,
            block_limit: self.block_limit,
            fail_after: self.fail_after,
        };

        let read_loop = spawn_read_loop(reader, publisher, "mock-capture")?;
        self.counters.opens.fetch_add(1, Ordering::SeqCst);

        Ok(CaptureStream::new(
            device,
            MockCapture {
                read_loop,
                counters: Arc::clone(&self.counters),
            },
        ))
    }
}

struct MockCapture {
    read_loop: ReadLoop,
    counters: Arc<Counters>,
}

impl StopCapture for MockCapture {
    fn stop(self: Box<Self>) {
        let Self {
            read_loop,
            counters,
        } = *self;
        Box::new(read_loop).stop();
        counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockReader {
    generator: SignalGenerator,
    interval: Option<Duration>,
    deadline: Instant,
    blocks_read: u64,
    block_limit: Option<u64>,
    fail_after: Option<u64>,
}

impl BlockReader for MockReader {
    fn read_block(&mut self, buf: &mut [f32]) -> Result<bool, String> {
        if self.fail_after.is_some_and(|n| self.blocks_read >= n) {
            return Err("simulated device disconnect".to_string());
        }
        if self.block_limit.is_some_and(|n| self.blocks_read >= n) {
            return Ok(false);
        }

        // Sleep to an absolute deadline so the cadence does not drift.
        if let Some(interval) = self.interval {
            self.deadline += interval;
            let now = Instant::now();
            if self.deadline > now {
                std::thread::sleep(self.deadline - now);
            }
        }

        self.generator.fill(buf);
        self.blocks_read += 1;
        Ok(true)
    }
}

/// Produces a continuous signal across blocks.
struct SignalGenerator {
    signal: MockSignal,
    sample_rate: f64,
    channels: usize,
    frame: u64,
    seed: u32,
}

impl SignalGenerator {
    fn new(signal: MockSignal, config: &StreamConfig) -> Self {
        Self {
            signal,
            sample_rate: f64::from(config.sample_rate),
            channels: usize::from(config.channels),
            frame: 0,
            seed: 12345,
        }
    }

    fn fill(&mut self, buf: &mut [f32]) {
        for frame in buf.chunks_exact_mut(self.channels) {
            let value = self.next_value();
            frame.fill(value);
        }
    }

    fn next_value(&mut self) -> f32 {
        let t = self.frame as f64 / self.sample_rate;
        self.frame += 1;
        match self.signal {
            MockSignal::Silence => 0.0,
            MockSignal::Sine {
                frequency,
                amplitude,
            } => (2.0 * std::f64::consts::PI * frequency * t).sin() as f32 * amplitude,
            MockSignal::Noise { amplitude } => {
                // Simple LCG for deterministic "random" noise
                self.seed = self.seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                let random = f32::from((self.seed >> 16) as u16) / 32768.0 - 1.0;
                random * amplitude
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(channels: u16) -> StreamConfig {
        StreamConfig {
            sample_rate: 16000,
            channels,
            block_len: 160,
            ..Default::default()
        }
    }

    #[test]
    fn test_generator_silence() {
        let mut generator = SignalGenerator::new(MockSignal::Silence, &config(1));
        let mut buf = vec![1.0; 160];
        generator.fill(&mut buf);
        assert!(buf.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_generator_sine() {
        let signal = MockSignal::Sine {
            frequency: 440.0,
            amplitude: 1.0,
        };
        let mut generator = SignalGenerator::new(signal, &config(1));
        let mut buf = vec![0.0; 160];
        generator.fill(&mut buf);

        // Sine wave should have positive and negative values
        assert!(buf.iter().any(|&s| s > 0.0));
        assert!(buf.iter().any(|&s| s < 0.0));
        assert!(buf.iter().all(|&s| s.abs() <= 1.0));
    }

    #[test]
    fn test_generator_is_continuous_across_blocks() {
        let signal = MockSignal::default();
        let mut split = SignalGenerator::new(signal, &config(1));
        let mut whole = SignalGenerator::new(signal, &config(1));

        let mut a = vec![0.0; 80];
        let mut b = vec![0.0; 80];
        split.fill(&mut a);
        split.fill(&mut b);
        let mut c = vec![0.0; 160];
        whole.fill(&mut c);

        a.extend(b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_generator_stereo_duplicates_channels() {
        let signal = MockSignal::Noise { amplitude: 0.5 };
        let mut generator = SignalGenerator::new(signal, &config(2));
        let mut buf = vec![0.0; 320];
        generator.fill(&mut buf);
        assert!(buf.chunks_exact(2).all(|f| f[0] == f[1]));
        assert!(buf.iter().all(|&s| s.abs() <= 0.5));
    }

    #[test]
    fn test_reader_limit_and_failure() {
        let mut reader = MockReader {
            generator: SignalGenerator::new(MockSignal::Silence, &config(1)),
            interval: None,
            deadline: Instant::now(),
            blocks_read: 0,
            block_limit: Some(2),
            fail_after: None,
        };
        let mut buf = vec![0.0; 160];
        assert_eq!(reader.read_block(&mut buf), Ok(true));
        assert_eq!(reader.read_block(&mut buf), Ok(true));
        assert_eq!(reader.read_block(&mut buf), Ok(false));

        reader.fail_after = Some(2);
        assert!(reader.read_block(&mut buf).is_err());
    }

    #[test]
    fn test_list_devices() {
        let source = MockSource::new().with_devices(["Built-in", "USB"]);
        let devices = source.list_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].name, "USB");
        assert_eq!(devices[1].index, 1);
    }

    #[test]
    fn test_resolve_selection() {
        let source = MockSource::new().with_devices(["Built-in", "USB"]);
        let resolve = |selection: DeviceSelection| source.resolve(&selection);

        assert_eq!(resolve(DeviceSelection::Default).as_deref(), Some("Built-in"));
        assert_eq!(resolve(DeviceSelection::Index(1)).as_deref(), Some("USB"));
        assert_eq!(resolve(DeviceSelection::Name("USB".into())).as_deref(), Some("USB"));
        assert!(resolve(DeviceSelection::Index(2)).is_none());
    }
}
