//! Runtime events for monitoring stream health.
//!
//! Events are notifications, not control flow: the callback runs on whichever
//! thread produced the event (including the device's error thread) and must
//! return quickly.

use std::sync::Arc;

use crate::session::StreamState;

/// Runtime events emitted during a capture session.
///
/// # Example
///
/// ```
/// use scope_stream::StreamEvent;
///
/// fn handle_event(event: StreamEvent) {
///     match event {
///         StreamEvent::Opened { device } => println!("capturing from {device}"),
///         StreamEvent::StateChanged { from, to } => println!("{from} -> {to}"),
///         StreamEvent::DeviceError { reason } => eprintln!("device failed: {reason}"),
///         StreamEvent::Closed { published, dropped } => {
///             println!("closed after {published} blocks ({dropped} dropped)");
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The device stream started producing blocks.
    Opened {
        /// Name of the device that was opened.
        device: String,
    },

    /// The session moved between lifecycle states.
    StateChanged {
        /// Previous state.
        from: StreamState,
        /// New state.
        to: StreamState,
    },

    /// The device reported a terminal error. Emitted at most once per session.
    DeviceError {
        /// Description of the failure.
        reason: String,
    },

    /// The device was released and the session is closed.
    Closed {
        /// Blocks accepted by the channel over the session.
        published: u64,
        /// Blocks discarded without being rendered.
        dropped: u64,
    },
}

/// Callback type for receiving runtime events.
///
/// Register an event callback via [`LiveCaptureBuilder::on_event()`].
///
/// [`LiveCaptureBuilder::on_event()`]: crate::LiveCaptureBuilder::on_event
pub type EventCallback = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use scope_stream::{event_callback, StreamEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(StreamEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
