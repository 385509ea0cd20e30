//! The FFT primitive, treated as an opaque real-to-halfcomplex transform.
//!
//! Halfcomplex layout (length `F`, half size `H = F/2`): bin `k`'s real part
//! lives at index `k`, its imaginary part at index `F - k` for `0 < k < H`.
//! The DC bin (`k = 0`) and the Nyquist bin (`k = H`) are real-only.
//!
//! This is FFTW's `R2HC`/`HC2R` packing, which is what the engine this was
//! ported from uses directly. `RustFftBackend` wraps `rustfft`'s native
//! complex buffers to produce the same layout so the rest of the engine
//! never has to know which FFT crate is underneath. `ReferenceDft` is a
//! direct O(n^2) transform used in tests to check `RustFftBackend`
//! bin-for-bin.
//!
//! Neither `forward` nor `inverse` normalizes by `F`; that scaling is the
//! STFT framer's job (it already needs to apply overlap-add normalization in
//! the same place), matching the unnormalized FFTW convention.

use rustfft::{num_complex::Complex32, Fft, FftPlanner};
use std::sync::Arc;

pub trait FftBackend {
    /// `real` has length `fft_size`; `halfcomplex_out` has length `fft_size`.
    fn forward(&mut self, real: &[f32], halfcomplex_out: &mut [f32]);
    /// `halfcomplex` has length `fft_size`; `real_out` has length `fft_size`.
    fn inverse(&mut self, halfcomplex: &[f32], real_out: &mut [f32]);
}

pub struct RustFftBackend {
    fft_size: usize,
    half_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
}

impl RustFftBackend {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft_size,
            half_size: fft_size / 2,
            forward: planner.plan_fft_forward(fft_size),
            inverse: planner.plan_fft_inverse(fft_size),
            scratch: vec![Complex32::default(); fft_size],
        }
    }
}

impl FftBackend for RustFftBackend {
    fn forward(&mut self, real: &[f32], halfcomplex_out: &mut [f32]) {
        debug_assert_eq!(real.len(), self.fft_size);
        debug_assert_eq!(halfcomplex_out.len(), self.fft_size);

        for (dst, &src) in self.scratch.iter_mut().zip(real) {
            *dst = Complex32::new(src, 0.0);
        }
        self.forward.process(&mut self.scratch);

        let h = self.half_size;
        halfcomplex_out[0] = self.scratch[0].re;
        halfcomplex_out[h] = self.scratch[h].re;
        for k in 1..h {
            halfcomplex_out[k] = self.scratch[k].re;
            halfcomplex_out[self.fft_size - k] = self.scratch[k].im;
        }
    }

    fn inverse(&mut self, halfcomplex: &[f32], real_out: &mut [f32]) {
        debug_assert_eq!(halfcomplex.len(), self.fft_size);
        debug_assert_eq!(real_out.len(), self.fft_size);

        let h = self.half_size;
        self.scratch[0] = Complex32::new(halfcomplex[0], 0.0);
        self.scratch[h] = Complex32::new(halfcomplex[h], 0.0);
        for k in 1..h {
            let re = halfcomplex[k];
            let im = halfcomplex[self.fft_size - k];
            self.scratch[k] = Complex32::new(re, im);
            self.scratch[self.fft_size - k] = Complex32::new(re, -im);
        }
        self.inverse.process(&mut self.scratch);

        for (dst, src) in real_out.iter_mut().zip(&self.scratch) {
            *dst = src.re;
        }
    }
}

/// Direct O(n^2) DFT, used only to validate [`RustFftBackend`] in tests.
pub struct ReferenceDft {
    fft_size: usize,
}

impl ReferenceDft {
    pub fn new(fft_size: usize) -> Self {
        Self { fft_size }
    }
}

impl FftBackend for ReferenceDft {
    fn forward(&mut self, real: &[f32], halfcomplex_out: &mut [f32]) {
        let n = self.fft_size;
        let h = n / 2;
        for k in 0..=h {
            let mut re = 0.0f64;
            let mut im = 0.0f64;
            for (t, &x) in real.iter().enumerate() {
                let angle = -2.0 * std::f64::consts::PI * k as f64 * t as f64 / n as f64;
                re += x as f64 * angle.cos();
                im += x as f64 * angle.sin();
            }
            if k == 0 || k == h {
                halfcomplex_out[k] = re as f32;
            } else {
                halfcomplex_out[k] = re as f32;
                halfcomplex_out[n - k] = im as f32;
            }
        }
    }

    fn inverse(&mut self, halfcomplex: &[f32], real_out: &mut [f32]) {
        let n = self.fft_size;
        let h = n / 2;
        let mut re = vec![0.0f64; n];
        let mut im = vec![0.0f64; n];
        re[0] = halfcomplex[0] as f64;
        re[h] = halfcomplex[h] as f64;
        for k in 1..h {
            re[k] = halfcomplex[k] as f64;
            im[k] = halfcomplex[n - k] as f64;
            re[n - k] = halfcomplex[k] as f64;
            im[n - k] = -(halfcomplex[n - k] as f64);
        }

        for t in 0..n {
            let mut acc = 0.0f64;
            for k in 0..n {
                let angle = 2.0 * std::f64::consts::PI * k as f64 * t as f64 / n as f64;
                acc += re[k] * angle.cos() - im[k] * angle.sin();
            }
            real_out[t] = acc as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rustfft_matches_reference_dft() {
        let n = 64;
        let mut signal = vec![0.0f32; n];
        for (i, s) in signal.iter_mut().enumerate() {
            *s = (2.0 * std::f32::consts::PI * 3.0 * i as f32 / n as f32).sin()
                + 0.3 * (2.0 * std::f32::consts::PI * 11.0 * i as f32 / n as f32).cos();
        }

        let mut rf = RustFftBackend::new(n);
        let mut dft = ReferenceDft::new(n);

        let mut hc_rf = vec![0.0f32; n];
        let mut hc_dft = vec![0.0f32; n];
        rf.forward(&signal, &mut hc_rf);
        dft.forward(&signal, &mut hc_dft);

        for (a, b) in hc_rf.iter().zip(&hc_dft) {
            assert!((a - b).abs() < 1e-2, "{} vs {}", a, b);
        }
    }

    #[test]
    fn forward_then_inverse_recovers_signal_up_to_scale() {
        let n = 128;
        let mut signal = vec![0.0f32; n];
        for (i, s) in signal.iter_mut().enumerate() {
            *s = (2.0 * std::f32::consts::PI * 5.0 * i as f32 / n as f32).sin();
        }

        let mut fft = RustFftBackend::new(n);
        let mut hc = vec![0.0f32; n];
        fft.forward(&signal, &mut hc);

        let mut out = vec![0.0f32; n];
        fft.inverse(&hc, &mut out);

        for (orig, rec) in signal.iter().zip(&out) {
            assert!((orig - rec / n as f32).abs() < 1e-3);
        }
    }
}
