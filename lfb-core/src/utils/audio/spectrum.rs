//! Microphone front end: sample accumulation and magnitude spectrum.
//!
//! Audio arrives as interleaved blocks `[right, left, back, front, right, ...]`
//! of `i16`, 160 samples per microphone every 10 ms. One microphone is
//! copied into an interleaved complex buffer (imaginary part zero) until
//! `FFT_SIZE` points are collected; the transform then runs in place and the
//! magnitudes are returned.

use crate::utils::config::FFT_SIZE;

/// Channel order within an interleaved audio block.
pub const MIC_RIGHT: usize = 0;
pub const MIC_LEFT: usize = 1;
pub const MIC_BACK: usize = 2;
pub const MIC_FRONT: usize = 3;
pub const MIC_COUNT: usize = 4;

/// In-place complex FFT over `[re0, im0, re1, im1, ...]`.
pub trait ComplexFft {
    fn transform(
        &mut self,
        interleaved: &mut [f32],
    );
}

/// Accumulates one microphone into FFT-sized frames.
pub struct AudioFrontEnd<F> {
    fft: F,
    mic: usize,
    input: [f32; 2 * FFT_SIZE],
    output: [f32; FFT_SIZE],
    filled: usize,
}

impl<F: ComplexFft> AudioFrontEnd<F> {
    /// `mic` must be one of the `MIC_*` indices.
    pub fn new(
        fft: F,
        mic: usize,
    ) -> Self {
        Self {
            fft,
            mic: mic.min(MIC_COUNT - 1),
            input: [0.0; 2 * FFT_SIZE],
            output: [0.0; FFT_SIZE],
            filled: 0,
        }
    }

    /// Number of complex points collected towards the next spectrum.
    pub fn pending(&self) -> usize {
        self.filled / 2
    }

    /// Append one block. Returns the spectrum when the buffer completes.
    ///
    /// Samples of the completing block past the buffer end are dropped.
    pub fn push_block(
        &mut self,
        data: &[i16],
    ) -> Option<&[f32]> {
        for frame in data.chunks_exact(MIC_COUNT) {
            self.input[self.filled] = frame[self.mic] as f32;
            self.input[self.filled + 1] = 0.0;
            self.filled += 2;
            if self.filled >= 2 * FFT_SIZE {
                break;
            }
        }

        if self.filled < 2 * FFT_SIZE {
            return None;
        }

        self.fft.transform(&mut self.input);
        for (out, c) in self.output.iter_mut().zip(self.input.chunks_exact(2)) {
            *out = libm::sqrtf(c[0] * c[0] + c[1] * c[1]);
        }
        self.filled = 0;
        Some(&self.output)
    }
}
