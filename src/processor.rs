//! Per-frame orchestration: wet/dry crossfade, power spectrum extraction,
//! the learn/apply branch, residual whitening, and the final halfcomplex
//! write-back.

use crate::fft::FftBackend;
use crate::gain::{GainEstimator, GainParams};
use crate::noise_profile::NoiseProfile;
use crate::params::Parameters;

const WHITENING_FLOOR: f32 = 0.02;

pub struct SpectralProcessor {
    half_size: usize,
    fft_size: usize,

    tau: f32,
    wet_dry: f32,

    residual_max: Vec<f32>,
    whitening_window_count: u32,
    max_decay: f32,

    gain_estimator: GainEstimator,

    power: Vec<f32>,
    gain: Vec<f32>,
    denoised: Vec<f32>,
    residual: Vec<f32>,
    processed: Vec<f32>,
}

impl SpectralProcessor {
    pub fn new(fft_size: usize, sample_rate: f32, hop: usize, fft: &mut dyn FftBackend) -> Self {
        let half_size = fft_size / 2;
        let tau = 1.0 - (-2.0 * std::f32::consts::PI * 25.0 * 64.0 / sample_rate).exp();
        let max_decay = (-1000.0 / ((1000.0 * sample_rate) / hop as f32)).exp();

        Self {
            half_size,
            fft_size,
            tau,
            wet_dry: 0.0,
            residual_max: vec![0.0; half_size + 1],
            whitening_window_count: 0,
            max_decay,
            gain_estimator: GainEstimator::new(fft_size, sample_rate, hop, fft),
            power: vec![0.0; half_size + 1],
            gain: vec![0.0; half_size + 1],
            denoised: vec![0.0; half_size + 1],
            residual: vec![0.0; half_size + 1],
            processed: vec![0.0; half_size + 1],
        }
    }

    /// `halfcomplex` has length `fft_size`; mutated in place.
    pub fn run(&mut self, halfcomplex: &mut [f32], noise_profile: &mut NoiseProfile, params: &Parameters) {
        debug_assert_eq!(halfcomplex.len(), self.fft_size);

        let target = if params.enable { 1.0 } else { 0.0 };
        self.wet_dry += self.tau * (target - self.wet_dry) + f32::MIN_POSITIVE;

        self.extract_power(halfcomplex);

        if !is_empty(&self.power) {
            if params.learn_noise {
                noise_profile.learn(&self.power);
                // Dry pass-through: `processed` starts equal to the dry
                // spectrum below and is never overwritten on this path.
            } else if noise_profile.is_available() {
                let gain_params = GainParams {
                    transient_threshold: params.transient_threshold(),
                    masking_ceiling: params.masking_ceiling_limit(),
                    release_time: params.release_time_seconds(),
                    noise_rescale: params.noise_rescale(),
                };
                self.gain_estimator
                    .estimate(&self.power, noise_profile.values(), &gain_params, &mut self.gain);

                for k in 1..=self.half_size {
                    self.denoised[k] = halfcomplex[k] * self.gain[k];
                    self.residual[k] = halfcomplex[k] - self.denoised[k];
                }

                let whitening_factor = params.whitening_factor();
                if whitening_factor > 0.0 {
                    self.whiten_residual(whitening_factor);
                }

                let reduction = params.reduction_amount();
                if params.residual_listen {
                    self.processed[1..=self.half_size]
                        .copy_from_slice(&self.residual[1..=self.half_size]);
                } else {
                    for k in 1..=self.half_size {
                        self.processed[k] = self.denoised[k] + reduction * self.residual[k];
                    }
                }
            }
        }

        self.soft_bypass_and_writeback(halfcomplex);
    }

    fn extract_power(&mut self, halfcomplex: &[f32]) {
        self.power[0] = halfcomplex[0] * halfcomplex[0];
        for k in 1..=self.half_size {
            let re = halfcomplex[k];
            let im = if k < self.half_size {
                halfcomplex[self.fft_size - k]
            } else {
                0.0
            };
            self.power[k] = re * re + im * im;
        }
        // Dry default: until the apply path above overwrites it, `processed`
        // tracks the original spectrum so learn/empty frames stay dry.
        self.processed[1..=self.half_size].copy_from_slice(&halfcomplex[1..=self.half_size]);
    }

    fn whiten_residual(&mut self, whitening_factor: f32) {
        self.whitening_window_count += 1;
        for k in 1..=self.half_size {
            self.residual_max[k] = if self.whitening_window_count > 1 {
                self.residual[k]
                    .max(WHITENING_FLOOR)
                    .max(self.residual_max[k] * self.max_decay)
            } else {
                self.residual[k].max(WHITENING_FLOOR)
            };
        }
        for k in 1..=self.half_size {
            if self.residual[k] > f32::MIN_POSITIVE {
                let whitened = self.residual[k] / self.residual_max[k];
                self.residual[k] = (1.0 - whitening_factor) * self.residual[k] + whitening_factor * whitened;
            }
        }
    }

    fn soft_bypass_and_writeback(&mut self, halfcomplex: &mut [f32]) {
        for k in 1..=self.half_size {
            self.processed[k] = (1.0 - self.wet_dry) * halfcomplex[k] + self.wet_dry * self.processed[k];
        }

        // Bin 0 (DC) has no halfcomplex pair and is left untouched.
        for k in 1..self.half_size {
            let original = halfcomplex[k];
            let gain = if original.abs() > f32::MIN_POSITIVE {
                self.processed[k] / original
            } else {
                0.0
            };
            halfcomplex[k] *= gain;
            halfcomplex[self.fft_size - k] *= gain;
        }
        let nyquist = self.half_size;
        let original = halfcomplex[nyquist];
        let gain = if original.abs() > f32::MIN_POSITIVE {
            self.processed[nyquist] / original
        } else {
            0.0
        };
        halfcomplex[nyquist] *= gain;
    }
}

fn is_empty(power: &[f32]) -> bool {
    power[1..].iter().all(|&p| p <= f32::MIN_POSITIVE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::RustFftBackend;

    #[test]
    fn silent_frame_is_skipped_and_stays_zero() {
        let fft_size = 512;
        let mut fft = RustFftBackend::new(fft_size);
        let mut processor = SpectralProcessor::new(fft_size, 48_000.0, fft_size / 4, &mut fft);
        let mut profile = NoiseProfile::new(fft_size);
        let mut halfcomplex = vec![0.0f32; fft_size];
        let params = Parameters::default();

        for _ in 0..8 {
            processor.run(&mut halfcomplex, &mut profile, &params);
        }
        for &v in &halfcomplex {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn disabled_processing_converges_to_dry_passthrough() {
        let fft_size = 512;
        let mut fft = RustFftBackend::new(fft_size);
        let mut processor = SpectralProcessor::new(fft_size, 48_000.0, fft_size / 4, &mut fft);
        let mut profile = NoiseProfile::new(fft_size);
        let params = Parameters {
            enable: false,
            ..Default::default()
        };

        let mut halfcomplex = vec![0.1f32; fft_size];
        for _ in 0..2000 {
            let original = halfcomplex.clone();
            processor.run(&mut halfcomplex, &mut profile, &params);
            if processor.wet_dry < 1e-6 {
                for (a, b) in halfcomplex.iter().zip(&original) {
                    assert!((a - b).abs() < 1e-3);
                }
                return;
            }
        }
        panic!("wet_dry never converged to 0");
    }

    #[test]
    fn learn_mode_updates_profile_and_leaves_spectrum_dry() {
        let fft_size = 512;
        let mut fft = RustFftBackend::new(fft_size);
        let mut processor = SpectralProcessor::new(fft_size, 48_000.0, fft_size / 4, &mut fft);
        let mut profile = NoiseProfile::new(fft_size);
        let params = Parameters {
            learn_noise: true,
            ..Default::default()
        };

        let mut halfcomplex = vec![0.2f32; fft_size];
        let original = halfcomplex.clone();
        processor.run(&mut halfcomplex, &mut profile, &params);

        assert!(profile.is_available());
        for (a, b) in halfcomplex.iter().zip(&original) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}
