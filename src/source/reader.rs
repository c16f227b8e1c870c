//! Dedicated capture thread for blocking-read backends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::pipeline::BlockPublisher;
use crate::source::StopCapture;
use crate::StreamError;

/// A device that delivers audio through a blocking read call.
pub trait BlockReader: Send + 'static {
    /// Blocks until `buf` holds the next block of interleaved samples.
    ///
    /// Returns `Ok(false)` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns a description of a terminal device failure.
    fn read_block(&mut self, buf: &mut [f32]) -> Result<bool, String>;
}

/// Handle to a running read loop thread.
///
/// Stopping sets a flag checked between reads and joins the thread, so no
/// block is published after [`StopCapture::stop`] returns.
pub struct ReadLoop {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// Spawns a thread that reads blocks from `reader` and publishes them.
///
/// The loop exits when stopped, when the reader reports end of stream (the
/// session is told it has finished), when the reader fails (the error is
/// reported to the session), or when the session closes its channel.
///
/// # Errors
///
/// Returns `BackendError` if the thread cannot be spawned.
pub fn spawn_read_loop<R: BlockReader>(
    mut reader: R,
    mut publisher: BlockPublisher,
    thread_name: &str,
) -> Result<ReadLoop, StreamError> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let block_samples = publisher.block_samples();

    let thread = std::thread::Builder::new()
        .name(thread_name.to_string())
        .spawn(move || {
            let mut blocks = 0_u64;
            while !stop_flag.load(Ordering::Acquire) {
                let mut buf = vec![0.0; block_samples];
                match reader.read_block(&mut buf) {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!("Reader reached end of stream after {} blocks", blocks);
                        publisher.finish();
                        break;
                    }
                    Err(reason) => {
                        publisher.report_error(reason);
                        break;
                    }
                }

                // A read may have straddled stop(); drop its block.
                if stop_flag.load(Ordering::Acquire) {
                    break;
                }
                match publisher.publish_samples(buf) {
                    Ok(()) => blocks += 1,
                    Err(StreamError::StreamClosed) => break,
                    Err(e) => {
                        publisher.report_error(e.to_string());
                        break;
                    }
                }
            }
        })
        .map_err(|e| StreamError::BackendError(format!("failed to spawn capture thread: {e}")))?;

    Ok(ReadLoop {
        stop,
        thread: Some(thread),
    })
}

impl StopCapture for ReadLoop {
    fn stop(mut self: Box<Self>) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for ReadLoop {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}
