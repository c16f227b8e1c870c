//! Sample format conversion.
//!
//! Blocks always carry `f32` samples. Devices that only offer integer formats
//! are converted in the capture callback before block assembly.

mod convert;

pub use convert::{i16_into_f32, i16_to_f32, u16_into_f32, u16_to_f32};
