//! Sample and frame primitives

/// Interleaved stream element type. All pipeline buffers are 32-bit floats.
pub type Sample = f32;

/// Complex spectrum bin type used by the FFT engine and spectral stages.
pub type Complex32 = num_complex::Complex<f32>;

/// Number of frames in an interleaved buffer.
#[inline]
pub fn frame_count(buffer_len: usize, channels: usize) -> usize {
    debug_assert!(channels > 0);
    buffer_len / channels
}

/// Timestamp of frame `frame` in an interleaved timestamp lane.
///
/// The executor replicates each frame time across all channels, so the
/// first element of the frame is the frame time.
#[inline]
pub fn frame_time(timestamps: &[Sample], frame: usize, channels: usize) -> Sample {
    timestamps[frame * channels]
}

/// Round up to the next power of two (minimum 1).
#[inline]
pub fn next_pow2(n: usize) -> usize {
    let mut p = 1usize;
    while p < n {
        p <<= 1;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_pow2() {
        assert_eq!(next_pow2(0), 1);
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(2), 2);
        assert_eq!(next_pow2(3), 4);
        assert_eq!(next_pow2(5), 8);
        assert_eq!(next_pow2(1024), 1024);
        assert_eq!(next_pow2(1025), 2048);
    }

    #[test]
    fn test_frame_helpers() {
        assert_eq!(frame_count(12, 3), 4);
        let ts = [0.0, 0.0, 10.0, 10.0, 20.0, 20.0];
        assert_eq!(frame_time(&ts, 2, 2), 20.0);
    }
}
