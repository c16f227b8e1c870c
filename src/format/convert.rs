//! Integer to float sample conversion for device callbacks.

/// Converts an i16 sample to f32.
///
/// Output will be in the range [-1.0, 1.0).
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// Converts an unsigned 16-bit sample (midpoint 32768) to f32.
#[inline]
pub fn u16_to_f32(sample: u16) -> f32 {
    (f32::from(sample) - 32768.0) / 32768.0
}

/// Converts i16 samples into `out`, replacing its contents.
///
/// Reuses `out`'s allocation so device callbacks stay allocation-free once warm.
pub fn i16_into_f32(samples: &[i16], out: &mut Vec<f32>) {
    out.clear();
    out.extend(samples.iter().map(|&s| i16_to_f32(s)));
}

/// Converts u16 samples into `out`, replacing its contents.
pub fn u16_into_f32(samples: &[u16], out: &mut Vec<f32>) {
    out.clear();
    out.extend(samples.iter().map(|&s| u16_to_f32(s)));
}
