//! Tokio mpsc channel renderer implementation.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::render::Renderer;
use crate::{RenderError, SampleBlock};

/// A renderer that forwards blocks to a tokio mpsc channel.
///
/// Useful when the actual display lives on another task or thread. Sending
/// never waits: if the channel is full the frame is skipped, since a live view
/// only cares about the newest block. The renderer reports itself closed once
/// the receiver is dropped.
///
/// # Example
///
/// ```
/// use scope_stream::{ChannelRenderer, SampleBlock};
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::channel::<SampleBlock>(4);
/// let renderer = ChannelRenderer::new(tx);
///
/// // Drive it with a RenderDriver...
/// // Then receive blocks:
/// // while let Some(block) = rx.recv().await { ... }
/// ```
pub struct ChannelRenderer {
    sender: mpsc::Sender<SampleBlock>,
    skipped: u64,
}

impl ChannelRenderer {
    /// Creates a new channel renderer with the given sender.
    pub fn new(sender: mpsc::Sender<SampleBlock>) -> Self {
        Self { sender, skipped: 0 }
    }

    /// Frames skipped because the channel was full.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Renderer for ChannelRenderer {
    fn update(&mut self, block: SampleBlock) -> Result<(), RenderError> {
        match self.sender.try_send(block) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(block)) => {
                self.skipped += 1;
                tracing::trace!("Render channel full, skipped block #{}", block.sequence());
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(RenderError::DisplayClosed),
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn block(seq: u64) -> SampleBlock {
        SampleBlock::new(seq, vec![0.0; 4], Duration::ZERO, 44100, 1)
    }

    #[tokio::test]
    async fn test_channel_renderer_sends_blocks() {
        let (tx, mut rx) = mpsc::channel::<SampleBlock>(10);
        let mut renderer = ChannelRenderer::new(tx);

        renderer.update(block(1)).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.sequence(), 1);
    }

    #[tokio::test]
    async fn test_channel_renderer_skips_when_full() {
        let (tx, mut rx) = mpsc::channel::<SampleBlock>(1);
        let mut renderer = ChannelRenderer::new(tx);

        renderer.update(block(1)).unwrap();
        renderer.update(block(2)).unwrap();
        assert_eq!(renderer.skipped(), 1);

        assert_eq!(rx.recv().await.unwrap().sequence(), 1);
    }

    #[tokio::test]
    async fn test_channel_renderer_closed() {
        let (tx, rx) = mpsc::channel::<SampleBlock>(10);
        let mut renderer = ChannelRenderer::new(tx);

        // Drop the receiver
        drop(rx);

        assert!(renderer.is_closed());
        assert!(matches!(
            renderer.update(block(1)),
            Err(RenderError::DisplayClosed)
        ));
    }
}
