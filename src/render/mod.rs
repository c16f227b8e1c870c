//! Renderer trait and the loop that drives it.
//!
//! A [`Renderer`] is any consumer that draws (or otherwise displays) sample
//! blocks at its own pace. The crate provides:
//!
//! - [`RenderDriver`]: pulls the newest block from a [`Session`] each tick and
//!   stops on close, cancellation, or error
//! - [`ChannelRenderer`]: forwards blocks to a tokio mpsc channel
//!
//! You can implement the [`Renderer`] trait for plot windows, terminal meters,
//! or network viewers.
//!
//! [`Session`]: crate::Session

mod channel;
mod driver;

pub use channel::ChannelRenderer;
pub use driver::{RenderDriver, RenderStats, RenderSummary, StopReason, StopSignal, Tick};

use crate::{RenderError, SampleBlock};

/// A display that consumes sample blocks.
///
/// # Implementation Notes
///
/// - `update` runs on the render context, never on the capture callback
/// - The block is moved in; keep it if you need to redraw the last frame
/// - Returning an error stops the render loop and is re-raised after the
///   stream has been closed
///
/// # Example
///
/// ```
/// use scope_stream::{RenderError, Renderer, SampleBlock};
///
/// struct PeakPrinter;
///
/// impl Renderer for PeakPrinter {
///     fn update(&mut self, block: SampleBlock) -> Result<(), RenderError> {
///         println!("#{} peak {:.2}", block.sequence(), block.levels().peak);
///         Ok(())
///     }
/// }
/// ```
pub trait Renderer {
    /// Draws one block.
    fn update(&mut self, block: SampleBlock) -> Result<(), RenderError>;

    /// Returns `true` once the display has been closed by its user.
    ///
    /// Default implementation never closes.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn update(&mut self, block: SampleBlock) -> Result<(), RenderError> {
        (**self).update(block)
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct CountingRenderer {
        count: usize,
        close_after: usize,
    }

    impl Renderer for CountingRenderer {
        fn update(&mut self, _block: SampleBlock) -> Result<(), RenderError> {
            self.count += 1;
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.count >= self.close_after
        }
    }

    #[test]
    fn test_renderer_closes() {
        let mut renderer = CountingRenderer {
            count: 0,
            close_after: 2,
        };
        let block = SampleBlock::new(1, vec![0.0; 4], Duration::ZERO, 44100, 1);

        renderer.update(block.clone()).unwrap();
        assert!(!renderer.is_closed());
        renderer.update(block).unwrap();
        assert!(renderer.is_closed());
    }

    #[test]
    fn test_boxed_renderer_delegates() {
        let mut renderer: Box<dyn Renderer> = Box::new(CountingRenderer {
            count: 0,
            close_after: 1,
        });
        let block = SampleBlock::new(1, vec![0.0; 4], Duration::ZERO, 44100, 1);

        assert!(!renderer.is_closed());
        renderer.update(block).unwrap();
        assert!(renderer.is_closed());
    }
}
