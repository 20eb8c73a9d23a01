//! Stand-in for the vendor DSP transform used on the robot.

use lfb_core::utils::{audio::ComplexFft, config::FFT_SIZE};
use microfft::Complex32;

/// 1024-point in-place complex FFT backed by `microfft`.
pub struct MicroFft {
    scratch: [Complex32; FFT_SIZE],
}

impl MicroFft {
    pub fn new() -> Self {
        Self {
            scratch: [Complex32::new(0.0, 0.0); FFT_SIZE],
        }
    }
}

impl Default for MicroFft {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplexFft for MicroFft {
    fn transform(
        &mut self,
        data: &mut [f32],
    ) {
        if data.len() != 2 * FFT_SIZE {
            tracing::error!(len = data.len(), "FFT buffer must hold {} points", FFT_SIZE);
            return;
        }

        for (c, pair) in self.scratch.iter_mut().zip(data.chunks_exact(2)) {
            *c = Complex32::new(pair[0], pair[1]);
        }
        let spectrum = microfft::complex::cfft_1024(&mut self.scratch);
        for (pair, c) in data.chunks_exact_mut(2).zip(spectrum.iter()) {
            pair[0] = c.re;
            pair[1] = c.im;
        }
    }
}
