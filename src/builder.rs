//! Builder pattern for `LiveCapture`.

use crate::session::Session;
use crate::source::DeviceSource;
use crate::{
    event_callback, DeviceSelection, EventCallback, OverflowPolicy, StreamConfig, StreamError,
    StreamEvent,
};

/// Entry point for live capture sessions.
///
/// # Example
///
/// ```
/// use scope_stream::{LiveCapture, MockSource, OverflowPolicy};
///
/// let source = MockSource::new().unpaced();
/// let session = LiveCapture::builder()
///     .sample_rate(48000)
///     .block_len(512)
///     .policy(OverflowPolicy::bounded(4))
///     .open(&source)?;
///
/// assert!(session.is_running());
/// # Ok::<(), scope_stream::StreamError>(())
/// ```
pub struct LiveCapture;

impl LiveCapture {
    /// Creates a builder with default settings (44.1kHz mono, 1024-frame blocks).
    pub fn builder() -> LiveCaptureBuilder {
        LiveCaptureBuilder::new()
    }
}

/// Builder for configuring and opening a capture [`Session`].
///
/// Use [`LiveCapture::builder()`] to create a new builder.
#[must_use]
pub struct LiveCaptureBuilder {
    config: StreamConfig,
    policy: OverflowPolicy,
    event_callback: Option<EventCallback>,
}

impl Default for LiveCaptureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveCaptureBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: StreamConfig::default(),
            policy: OverflowPolicy::default(),
            event_callback: None,
        }
    }

    /// Set the sample rate in Hz.
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Set the number of interleaved channels.
    pub fn channels(mut self, channels: u16) -> Self {
        self.config.channels = channels;
        self
    }

    /// Set the number of frames per block.
    pub fn block_len(mut self, block_len: usize) -> Self {
        self.config.block_len = block_len;
        self
    }

    /// Select the input device.
    pub fn device(mut self, device: DeviceSelection) -> Self {
        self.config.device = device;
        self
    }

    /// Set what happens when the renderer falls behind.
    ///
    /// Default: [`OverflowPolicy::LatestWins`]
    pub fn policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Events include state transitions, device errors, and the final close summary.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(StreamEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Set custom stream configuration.
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration built so far.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Creates an idle session without opening a device.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the config or policy is unusable.
    pub fn build(self) -> Result<Session, StreamError> {
        Session::with_event_callback(self.config, self.policy, self.event_callback)
    }

    /// Opens the configured device and returns a running session.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config or policy is invalid
    /// - The device cannot be opened
    pub fn open<S: DeviceSource + ?Sized>(self, source: &S) -> Result<Session, StreamError> {
        let mut session = self.build()?;
        session.open(source)?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockSource;
    use crate::StreamState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_builder_defaults() {
        let builder = LiveCapture::builder();
        assert_eq!(builder.config(), &StreamConfig::default());
        assert_eq!(builder.policy, OverflowPolicy::LatestWins);
        assert!(builder.event_callback.is_none());
    }

    #[test]
    fn test_builder_setters() {
        let builder = LiveCapture::builder()
            .sample_rate(48000)
            .channels(2)
            .block_len(256)
            .device(DeviceSelection::Index(1));

        let config = builder.config();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.channels, 2);
        assert_eq!(config.block_len, 256);
        assert_eq!(config.device, DeviceSelection::Index(1));
    }

    #[test]
    fn test_builder_with_config() {
        let config = StreamConfig {
            sample_rate: 8000,
            ..Default::default()
        };
        let builder = LiveCapture::builder().with_config(config.clone());
        assert_eq!(builder.config(), &config);
    }

    #[test]
    fn test_builder_rejects_zero_block_len() {
        let result = LiveCapture::builder().block_len(0).build();
        assert!(matches!(result, Err(StreamError::InvalidConfig { .. })));
    }

    #[test]
    fn test_builder_rejects_empty_queue() {
        let result = LiveCapture::builder()
            .policy(OverflowPolicy::bounded(0))
            .build();
        assert!(matches!(result, Err(StreamError::InvalidConfig { .. })));
    }

    #[test]
    fn test_builder_build_is_idle() {
        let session = LiveCapture::builder().build().unwrap();
        assert_eq!(session.state(), StreamState::Idle);
    }

    #[test]
    fn test_builder_open_unavailable_device() {
        let source = MockSource::new().unavailable("device busy");
        let result = LiveCapture::builder().open(&source);
        assert!(matches!(result, Err(StreamError::DeviceUnavailable { .. })));
        assert_eq!(source.releases(), 0);
    }

    #[test]
    fn test_builder_event_callback_is_wired() {
        let events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&events);

        let source = MockSource::new();
        let mut session = LiveCapture::builder()
            .on_event(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .open(&source)
            .unwrap();
        session.close();

        // Idle->Running, Opened, Running->Stopping, Stopping->Closed, Closed
        assert_eq!(events.load(Ordering::SeqCst), 5);
    }
}
