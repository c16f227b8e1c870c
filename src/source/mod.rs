//! Audio sources and the capture handles they return.
//!
//! A [`DeviceSource`] turns a [`StreamConfig`] into a running capture that
//! feeds a [`BlockPublisher`]. Two backends ship with the crate:
//!
//! - [`CpalSource`]: real input devices via CPAL's callback API
//! - [`MockSource`]: a synthetic signal on a paced reader thread, for tests
//!
//! Backends with a blocking read API implement [`BlockReader`] and get their
//! capture thread from [`spawn_read_loop()`].

mod device;
mod mock;
mod reader;

pub use device::CpalSource;
pub use mock::{MockSignal, MockSource};
pub use reader::{spawn_read_loop, BlockReader, ReadLoop};

use std::fmt;

use crate::pipeline::BlockPublisher;
use crate::{StreamConfig, StreamError};

/// An input device enumerated by a [`DeviceSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Position in the source's device list, as used by [`DeviceSelection::Index`].
    ///
    /// [`DeviceSelection::Index`]: crate::DeviceSelection::Index
    pub index: usize,
    /// Human-readable device name.
    pub name: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.index, self.name)
    }
}

/// A backend that can open input devices.
pub trait DeviceSource {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Lists the input devices this backend can open.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the backend cannot enumerate devices.
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, StreamError>;

    /// Opens the configured device and starts delivering blocks to `publisher`.
    ///
    /// Must either return a running [`CaptureStream`] or fail without having
    /// acquired the device.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the device is missing, busy, or does not
    /// support the requested format.
    fn open(
        &self,
        config: &StreamConfig,
        publisher: BlockPublisher,
    ) -> Result<CaptureStream, StreamError>;
}

/// Backend-specific shutdown for a running capture.
///
/// `stop` must not return until the backend has stopped calling into its
/// [`BlockPublisher`].
pub trait StopCapture {
    /// Stops delivery and releases the device.
    fn stop(self: Box<Self>);
}

/// A running capture.
///
/// Capture continues while this is held. [`stop()`](Self::stop) or dropping
/// it releases the device exactly once.
pub struct CaptureStream {
    device: String,
    handle: Option<Box<dyn StopCapture>>,
}

impl CaptureStream {
    /// Wraps a backend handle for the named device.
    pub fn new(device: impl Into<String>, handle: impl StopCapture + 'static) -> Self {
        Self {
            device: device.into(),
            handle: Some(Box::new(handle)),
        }
    }

    /// Name of the captured device.
    pub fn device_name(&self) -> &str {
        &self.device
    }

    /// Stops capture and releases the device.
    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(device = %self.device, "Releasing capture device");
            handle.stop();
        }
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureStream")
            .field("device", &self.device)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandle(Arc<AtomicUsize>);

    impl StopCapture for CountingHandle {
        fn stop(self: Box<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_capture_stream_stops_once() {
        let stops = Arc::new(AtomicUsize::new(0));
        let stream = CaptureStream::new("mic", CountingHandle(Arc::clone(&stops)));
        assert_eq!(stream.device_name(), "mic");

        stream.stop();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_capture_stream_drop_releases() {
        let stops = Arc::new(AtomicUsize::new(0));
        drop(CaptureStream::new("mic", CountingHandle(Arc::clone(&stops))));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo {
            index: 2,
            name: "USB Microphone".to_string(),
        };
        assert_eq!(info.to_string(), "2: USB Microphone");
    }
}
