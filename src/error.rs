//! Error types for scope-stream.
//!
//! Errors are split into two categories:
//! - **Stream errors** ([`StreamError`]): lifecycle, device, and hand-off failures
//! - **Render errors** ([`RenderError`]): raised by a [`Renderer`](crate::Renderer)
//!   implementation and only observed by the driver, never interpreted

/// Errors raised by the capture pipeline and its lifecycle.
///
/// `DeviceUnavailable` is returned from [`Session::open()`] and means the stream
/// never started. `DeviceError` is terminal for a running stream and is surfaced
/// once, after the device has been released.
///
/// [`Session::open()`]: crate::Session::open
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The device could not be opened (bad index, unsupported config, device busy).
    #[error("device unavailable: {device} - {reason}")]
    DeviceUnavailable {
        /// Description of the requested device.
        device: String,
        /// Reason the device could not be opened.
        reason: String,
    },

    /// An operation was attempted on a stream that has already been closed.
    #[error("stream closed")]
    StreamClosed,

    /// The device failed while capturing (disconnect, overrun).
    #[error("device error: {reason}")]
    DeviceError {
        /// Description reported by the device backend.
        reason: String,
    },

    /// The display collaborator failed while rendering.
    #[error("render failure: {reason}")]
    RenderFailure {
        /// Description reported by the renderer.
        reason: String,
    },

    /// The stream configuration is not usable.
    #[error("invalid stream config: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A published block does not match the stream shape or ordering.
    #[error("invalid block: {reason}")]
    InvalidBlock {
        /// What is wrong with the block.
        reason: String,
    },

    /// `open` was called on a session that is already running.
    #[error("stream already open")]
    AlreadyOpen,

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    BackendError(String),
}

impl StreamError {
    /// Creates a `DeviceUnavailable` error.
    pub fn device_unavailable(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `DeviceError` with the given reason.
    pub fn device_error(reason: impl Into<String>) -> Self {
        Self::DeviceError {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidConfig` error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidBlock` error with the given reason.
    pub fn invalid_block(reason: impl Into<String>) -> Self {
        Self::InvalidBlock {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error ends a running stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::StreamClosed | Self::DeviceError { .. } | Self::RenderFailure { .. }
        )
    }
}

/// Errors that can occur within a [`Renderer`](crate::Renderer) implementation.
///
/// The driver does not retry or inspect these: any render error stops the loop
/// and is re-raised as [`StreamError::RenderFailure`] once the stream is closed.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Updating the display failed.
    #[error("update failed: {reason}")]
    UpdateFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// The display surface went away while updating.
    #[error("display closed")]
    DisplayClosed,

    /// Custom error for user-implemented renderers.
    #[error("{0}")]
    Custom(String),
}

impl RenderError {
    /// Creates a custom render error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates an update failed error with the given reason.
    pub fn update_failed(reason: impl Into<String>) -> Self {
        Self::UpdateFailed {
            reason: reason.into(),
        }
    }
}

impl From<RenderError> for StreamError {
    fn from(err: RenderError) -> Self {
        Self::RenderFailure {
            reason: err.to_string(),
        }
    }
}
