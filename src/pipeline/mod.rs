//! Capture-to-render pipeline components.
//!
//! ```text
//! Device callback → BlockPublisher → BlockChannel → Session::try_take → Renderer
//!                   (BlockAssembler)
//! ```
//!
//! - **Assembler**: Cuts device buffers into fixed-size, sequenced blocks
//! - **Publisher**: The capture context's handle, owns the assembler
//! - **Channel**: Latest-wins slot or bounded queue between the two contexts
//!
//! The channel lock is held only for O(1) work, so the device callback never
//! waits on the render side.

mod assembler;
mod capture;
mod channel;

pub use assembler::BlockAssembler;
pub use capture::{BlockPublisher, ErrorReporter};
pub use channel::{BlockChannel, ChannelStats};
