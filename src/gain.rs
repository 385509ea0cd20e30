//! Per-bin gain estimation: masking-threshold oversubtraction, transient
//! protection, and asymmetric (release-only) smoothing.
//!
//! The oversubtraction mapping and the transient-detection statistic are
//! left as "a monotone function with these endpoints" by the model this was
//! ported from; the choices made here (documented in `DESIGN.md`) are a
//! linear map from masking headroom and an EMA-baseline power-delta
//! detector.

use crate::fft::FftBackend;
use crate::masking::MaskingModel;

const ALPHA_MIN: f32 = 1.0;
const ALPHA_MAX: f32 = 6.0;
const BASELINE_TAU: f32 = 0.1;
const TRANSIENT_BIAS: f32 = 0.5;
const EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct GainParams {
    pub transient_threshold: f32,
    pub masking_ceiling: f32,
    pub release_time: f32,
    pub noise_rescale: f32,
}

pub struct GainEstimator {
    half_size: usize,
    sample_rate: f32,
    hop: usize,
    masking: MaskingModel,

    masking_thresholds: Vec<f32>,
    prev_gain: Vec<f32>,
    prev_power: Vec<f32>,
    baseline: f32,
}

impl GainEstimator {
    pub fn new(fft_size: usize, sample_rate: f32, hop: usize, fft: &mut dyn FftBackend) -> Self {
        let half_size = fft_size / 2;
        Self {
            half_size,
            sample_rate,
            hop,
            masking: MaskingModel::new(fft_size, sample_rate, fft),
            masking_thresholds: vec![0.0; half_size + 1],
            prev_gain: vec![0.0; half_size + 1],
            prev_power: vec![0.0; half_size + 1],
            baseline: 0.0,
        }
    }

    /// `power`, `noise`, and `gain_out` all have length `half_size + 1`.
    pub fn estimate(&mut self, power: &[f32], noise: &[f32], params: &GainParams, gain_out: &mut [f32]) {
        debug_assert_eq!(power.len(), self.half_size + 1);
        debug_assert_eq!(noise.len(), self.half_size + 1);
        debug_assert_eq!(gain_out.len(), self.half_size + 1);

        self.masking.masking_thresholds(power, &mut self.masking_thresholds);

        let ceiling = params.masking_ceiling.max(EPS);
        let spl_reference = self.masking.spl_reference();

        let delta: f32 = power
            .iter()
            .zip(&self.prev_power)
            .map(|(&p, &prev)| (p - prev).max(0.0))
            .sum();
        self.baseline += BASELINE_TAU * (delta - self.baseline);
        let transient = delta > params.transient_threshold * self.baseline.max(EPS);

        let release_coef = (-1.0 / (params.release_time * self.sample_rate / self.hop as f32)).exp();

        for k in 0..=self.half_size {
            // Signal-to-mask margin in dB: how far the bin's own current
            // level sits above its masking threshold (both put on the same
            // calibrated dB SPL scale via `spl_reference`, which otherwise
            // cancels out of this difference). A tone sticking out above
            // its threshold (margin > 0) is audible and gets little
            // oversubtraction; a bin sitting at or under threshold (margin
            // <= 0, the common case for a noise-only signal) is already
            // masked and takes the full oversubtraction multiplier.
            let power_db = 10.0 * power[k].max(EPS).log10() + spl_reference[k];
            let margin_db = (power_db - self.masking_thresholds[k]).max(0.0);
            let headroom = (margin_db / ceiling).clamp(0.0, 1.0);
            let alpha = ALPHA_MAX + (ALPHA_MIN - ALPHA_MAX) * headroom;

            let scaled_noise = params.noise_rescale * alpha * noise[k];
            let mut g_raw = (1.0 - scaled_noise / power[k].max(EPS)).max(0.0);
            if transient {
                g_raw += (1.0 - g_raw) * TRANSIENT_BIAS;
            }

            let smoothed = g_raw.max(release_coef * self.prev_gain[k]);
            gain_out[k] = smoothed.clamp(0.0, 1.0);
        }

        self.prev_gain.copy_from_slice(gain_out);
        self.prev_power.copy_from_slice(power);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::RustFftBackend;

    fn default_params() -> GainParams {
        GainParams {
            transient_threshold: 3.0,
            masking_ceiling: 20.0,
            release_time: 0.1,
            noise_rescale: 1.0,
        }
    }

    #[test]
    fn gain_stays_in_unit_range() {
        let fft_size = 512;
        let mut fft = RustFftBackend::new(fft_size);
        let mut estimator = GainEstimator::new(fft_size, 48_000.0, fft_size / 4, &mut fft);
        let half = fft_size / 2;
        let power = vec![0.4f32; half + 1];
        let noise = vec![0.1f32; half + 1];
        let mut gain = vec![0.0f32; half + 1];

        let params = default_params();
        for _ in 0..8 {
            estimator.estimate(&power, &noise, &params, &mut gain);
            for &g in &gain {
                assert!((0.0..=1.0).contains(&g));
            }
        }
    }

    #[test]
    fn zero_noise_yields_unity_gain() {
        let fft_size = 512;
        let mut fft = RustFftBackend::new(fft_size);
        let mut estimator = GainEstimator::new(fft_size, 48_000.0, fft_size / 4, &mut fft);
        let half = fft_size / 2;
        let power = vec![0.4f32; half + 1];
        let noise = vec![0.0f32; half + 1];
        let mut gain = vec![0.0f32; half + 1];

        let params = default_params();
        estimator.estimate(&power, &noise, &params, &mut gain);
        for &g in &gain {
            assert!(g > 0.99);
        }
    }

    #[test]
    fn release_smoothing_prevents_gain_from_dropping_instantly() {
        let fft_size = 512;
        let mut fft = RustFftBackend::new(fft_size);
        let mut estimator = GainEstimator::new(fft_size, 48_000.0, fft_size / 4, &mut fft);
        let half = fft_size / 2;
        let loud = vec![1.0f32; half + 1];
        let noise = vec![0.01f32; half + 1];
        let mut gain = vec![0.0f32; half + 1];
        let params = default_params();

        estimator.estimate(&loud, &noise, &params, &mut gain);
        let high_gain = gain.clone();

        let quiet = vec![0.0001f32; half + 1];
        estimator.estimate(&quiet, &noise, &params, &mut gain);
        for (after, before) in gain.iter().zip(&high_gain) {
            assert!(*after >= 0.0);
            assert!(*after <= *before + 1e-6);
        }
    }
}
