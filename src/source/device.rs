//! CPAL input devices.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, Stream, StreamConfig as CpalStreamConfig};

use crate::pipeline::{BlockPublisher, ErrorReporter};
use crate::source::{CaptureStream, DeviceInfo, DeviceSource, StopCapture};
use crate::{DeviceSelection, StreamConfig, StreamError};

/// Sample formats we can capture, most preferred first.
const PREFERRED_FORMATS: [SampleFormat; 3] =
    [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16];

/// Input devices of a CPAL host.
///
/// Streams are opened at exactly the configured rate and channel count; a
/// device that cannot capture that format is reported as unavailable rather
/// than silently resampled.
pub struct CpalSource {
    host: Host,
}

impl CpalSource {
    /// Uses the platform's default audio host.
    pub fn new() -> Self {
        Self::with_host(cpal::default_host())
    }

    /// Uses a specific CPAL host.
    pub fn with_host(host: Host) -> Self {
        Self { host }
    }

    /// Name of the host's default input device, if any.
    pub fn default_device_name(&self) -> Option<String> {
        self.host
            .default_input_device()
            .and_then(|d| d.name().ok())
    }

    fn resolve(&self, selection: &DeviceSelection) -> Result<(Device, String), StreamError> {
        match selection {
            DeviceSelection::Default => {
                let device = self.host.default_input_device().ok_or_else(|| {
                    StreamError::device_unavailable(
                        selection.to_string(),
                        "no default input device",
                    )
                })?;
                let name = device_name(&device);
                Ok((device, name))
            }
            DeviceSelection::Index(index) => self
                .input_devices()?
                .nth(*index)
                .map(|device| {
                    let name = device_name(&device);
                    (device, name)
                })
                .ok_or_else(|| {
                    StreamError::device_unavailable(
                        selection.to_string(),
                        "no input device at that index",
                    )
                }),
            DeviceSelection::Name(wanted) => self
                .input_devices()?
                .find_map(|device| {
                    let name = device.name().ok()?;
                    (name == *wanted).then_some((device, name))
                })
                .ok_or_else(|| StreamError::device_unavailable(wanted.clone(), "device not found")),
        }
    }

    fn input_devices(&self) -> Result<impl Iterator<Item = Device>, StreamError> {
        self.host
            .input_devices()
            .map_err(|e| StreamError::BackendError(e.to_string()))
    }
}

impl Default for CpalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSource for CpalSource {
    fn name(&self) -> &str {
        self.host.id().name()
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, StreamError> {
        Ok(self
            .input_devices()?
            .enumerate()
            .map(|(index, device)| DeviceInfo {
                index,
                name: device_name(&device),
            })
            .collect())
    }

    fn open(
        &self,
        config: &StreamConfig,
        publisher: BlockPublisher,
    ) -> Result<CaptureStream, StreamError> {
        let (device, name) = self.resolve(&config.device).map_err(|e| match e {
            StreamError::BackendError(reason) => {
                StreamError::device_unavailable(config.device.to_string(), reason)
            }
            other => other,
        })?;
        let sample_format = supported_format(&device, config).ok_or_else(|| {
            StreamError::device_unavailable(
                &name,
                format!(
                    "does not support {}Hz/{}ch capture",
                    config.sample_rate, config.channels
                ),
            )
        })?;

        let cpal_config = CpalStreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        tracing::debug!(
            "Opening {} at {}Hz/{}ch ({:?})",
            name,
            config.sample_rate,
            config.channels,
            sample_format
        );

        let reporter = publisher.error_reporter();
        let stream = match sample_format {
            SampleFormat::I16 => {
                build_stream(&device, &cpal_config, publisher, reporter, BlockPublisher::push_i16)
            }
            SampleFormat::U16 => {
                build_stream(&device, &cpal_config, publisher, reporter, BlockPublisher::push_u16)
            }
            _ => build_stream(
                &device,
                &cpal_config,
                publisher,
                reporter,
                BlockPublisher::push_interleaved,
            ),
        }
        .map_err(|e| StreamError::device_unavailable(&name, e.to_string()))?;

        stream
            .play()
            .map_err(|e| StreamError::device_unavailable(&name, e.to_string()))?;

        Ok(CaptureStream::new(name, CpalCapture { stream }))
    }
}

/// Keeps the CPAL stream alive until stopped.
struct CpalCapture {
    stream: Stream,
}

impl StopCapture for CpalCapture {
    fn stop(self: Box<Self>) {
        if let Err(e) = self.stream.pause() {
            tracing::debug!("Failed to pause input stream: {}", e);
        }
        // Dropping the stream joins the backend's callback thread.
        drop(self.stream);
    }
}

fn device_name(device: &Device) -> String {
    device.name().unwrap_or_else(|_| "unknown".to_string())
}

/// Picks the best sample format the device offers at the requested rate and
/// channel count.
fn supported_format(device: &Device, config: &StreamConfig) -> Option<SampleFormat> {
    let ranges: Vec<_> = device.supported_input_configs().ok()?.collect();
    PREFERRED_FORMATS.into_iter().find(|format| {
        ranges.iter().any(|range| {
            range.sample_format() == *format
                && range.channels() == config.channels
                && range.min_sample_rate().0 <= config.sample_rate
                && config.sample_rate <= range.max_sample_rate().0
        })
    })
}

fn build_stream<T>(
    device: &Device,
    config: &CpalStreamConfig,
    mut publisher: BlockPublisher,
    reporter: ErrorReporter,
    push: fn(&mut BlockPublisher, &[T]) -> Result<(), StreamError>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + Send + 'static,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Fails only once the session has closed; close() stops us next.
            let _ = push(&mut publisher, data);
        },
        move |err| {
            tracing::error!("Audio stream error: {}", err);
            reporter.report(err.to_string());
        },
        None,
    )
}
