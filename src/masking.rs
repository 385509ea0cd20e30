//! Bark-scale psychoacoustic masking-threshold model.
//!
//! Everything here is computed once at construction (depends only on
//! `fft_size` and `sample_rate`) except [`MaskingModel::masking_thresholds`],
//! which runs once per frame over the current power spectrum.

use crate::fft::FftBackend;
use crate::window::{build_window, WindowKind};

const BARK_BANDS: usize = 25;
const REFERENCE_LEVEL: f32 = 90.0;
const SPL_SINE_FREQ: f32 = 1000.0;

pub struct MaskingModel {
    half_size: usize,
    bark_z: Vec<f32>,
    absolute_thresholds: Vec<f32>,
    spl_reference: Vec<f32>,
    spreading: Vec<f32>,
    spreaded_unity: Vec<f32>,

    // Per-frame scratch, reused to keep `masking_thresholds` allocation-free.
    bark_spectrum: [f32; BARK_BANDS],
    band_end_bin: [usize; BARK_BANDS],
    bins_per_band: [usize; BARK_BANDS],
    spreaded: [f32; BARK_BANDS],
    threshold_j: [f32; BARK_BANDS],
}

fn bin_to_freq(k: usize, sample_rate: f32, fft_size: usize) -> f32 {
    k as f32 * sample_rate / fft_size as f32
}

impl MaskingModel {
    pub fn new(fft_size: usize, sample_rate: f32, fft: &mut dyn FftBackend) -> Self {
        let half_size = fft_size / 2;

        let mut bark_z = vec![0.0f32; half_size + 1];
        for (k, bz) in bark_z.iter_mut().enumerate() {
            let f = bin_to_freq(k, sample_rate, fft_size);
            *bz = 1.0 + 13.0 * (0.00076 * f).atan() + 3.5 * (f / 7500.0).powi(2).atan();
        }

        let mut absolute_thresholds = vec![0.0f32; half_size + 1];
        for k in 1..=half_size {
            let khz = bin_to_freq(k, sample_rate, fft_size) / 1000.0;
            absolute_thresholds[k] = 3.64 * khz.powf(-0.8) - 6.5 * (-0.6 * (khz - 3.3).powi(2)).exp()
                + 1e-3 * khz.powi(4);
        }

        let spl_reference = compute_spl_reference(fft_size, half_size, sample_rate, fft);

        let mut spreading = vec![0.0f32; BARK_BANDS * BARK_BANDS];
        for i in 0..BARK_BANDS {
            for j in 0..BARK_BANDS {
                let y = i as f32 - j as f32;
                let s = 15.81 + 7.5 * (y + 0.474) - 17.5 * (1.0 + (y + 0.474).powi(2)).sqrt();
                spreading[i * BARK_BANDS + j] = 10f32.powf(s / 10.0);
            }
        }

        let mut spreaded_unity = [0.0f32; BARK_BANDS];
        for (i, out) in spreaded_unity.iter_mut().enumerate() {
            *out = (0..BARK_BANDS).map(|j| spreading[i * BARK_BANDS + j]).sum();
        }

        Self {
            half_size,
            bark_z,
            absolute_thresholds,
            spl_reference,
            spreading,
            spreaded_unity: spreaded_unity.to_vec(),
            bark_spectrum: [0.0; BARK_BANDS],
            band_end_bin: [0; BARK_BANDS],
            bins_per_band: [0; BARK_BANDS],
            spreaded: [0.0; BARK_BANDS],
            threshold_j: [0.0; BARK_BANDS],
        }
    }

    pub fn absolute_thresholds(&self) -> &[f32] {
        &self.absolute_thresholds
    }

    /// Per-bin dB SPL calibration offset (see `compute_spl_reference`): the
    /// amount added to a bin's raw threshold so that a unit-amplitude 1kHz
    /// sine registers at 90dB SPL. Away from that reference bin this value
    /// is large, since it's calibrated against near-zero reference power —
    /// callers that need a per-bin masking *margin* should subtract this
    /// back out rather than comparing `masking_thresholds` directly against
    /// an absolute dB ceiling.
    pub fn spl_reference(&self) -> &[f32] {
        &self.spl_reference
    }

    /// `power` and `out` both have length `half_size + 1`.
    pub fn masking_thresholds(&mut self, power: &[f32], out: &mut [f32]) {
        debug_assert_eq!(power.len(), self.half_size + 1);
        debug_assert_eq!(out.len(), self.half_size + 1);

        // Partition bins into Bark bands. Bin 0 (DC) never belongs to a band.
        let mut last_position = 0usize;
        for j in 0..BARK_BANDS {
            let mut cont = if j == 0 { 1 } else { 0 };
            let mut sum = 0.0f32;
            while last_position + cont <= self.half_size
                && (self.bark_z[last_position + cont]).floor() as i32 == (j + 1) as i32
            {
                sum += power[last_position + cont];
                cont += 1;
            }
            self.bark_spectrum[j] = sum;
            last_position += cont;
            self.bins_per_band[j] = cont;
            self.band_end_bin[j] = last_position;
        }

        for i in 0..BARK_BANDS {
            self.spreaded[i] = (0..BARK_BANDS)
                .map(|j| self.spreading[i * BARK_BANDS + j] * self.bark_spectrum[j])
                .sum();
        }

        for j in 0..BARK_BANDS {
            let (start_pos, end_pos) = if j == 0 {
                (0, self.bins_per_band[0])
            } else {
                (self.band_end_bin[j - 1], self.band_end_bin[j - 1] + self.bins_per_band[j])
            };

            let tonality = tonality_factor(power, start_pos, end_pos.min(self.half_size + 1));

            let masking_offset = tonality * (14.5 + (j + 1) as f32) + 5.5 * (1.0 - tonality);

            let spreaded = self.spreaded[j].max(f32::MIN_POSITIVE);
            let mut threshold = 10f32.powf(spreaded.log10() - masking_offset / 10.0);
            threshold -= 10.0 * self.spreaded_unity[j].max(f32::MIN_POSITIVE).log10();
            self.threshold_j[j] = threshold;

            let band_start = if j == 0 { 0 } else { self.band_end_bin[j - 1] };
            let band_end = self.band_end_bin[j];
            for k in band_start..band_end {
                out[k] = threshold;
            }
        }

        for k in 0..=self.half_size {
            out[k] += self.spl_reference[k];
            out[k] = out[k].max(self.absolute_thresholds[k]);
        }
    }
}

fn tonality_factor(power: &[f32], start_pos: usize, end_pos: usize) -> f32 {
    if end_pos <= start_pos {
        return 0.0;
    }
    let n = (end_pos - start_pos) as f32;
    let mut sum_p = 0.0f32;
    let mut sum_log_p = 0.0f32;
    for &p in &power[start_pos..end_pos] {
        let p = p.max(f32::MIN_POSITIVE);
        sum_p += p;
        sum_log_p += p.log10();
    }
    let sfm = 10.0 * (sum_log_p / n - (sum_p / n).log10());
    (sfm / -60.0).min(1.0)
}

fn compute_spl_reference(
    fft_size: usize,
    half_size: usize,
    sample_rate: f32,
    fft: &mut dyn FftBackend,
) -> Vec<f32> {
    let window = build_window(WindowKind::Hann, fft_size);
    let mut sine = vec![0.0f32; fft_size];
    for (k, s) in sine.iter_mut().enumerate() {
        *s = (2.0 * std::f32::consts::PI * k as f32 * SPL_SINE_FREQ / sample_rate).sin();
    }
    for (s, w) in sine.iter_mut().zip(&window) {
        *s *= w;
    }

    let mut halfcomplex = vec![0.0f32; fft_size];
    fft.forward(&sine, &mut halfcomplex);

    let mut power = vec![0.0f32; half_size + 1];
    power[0] = halfcomplex[0] * halfcomplex[0];
    for k in 1..=half_size {
        let re = halfcomplex[k];
        let im = if k < half_size { halfcomplex[fft_size - k] } else { 0.0 };
        power[k] = re * re + im * im;
    }

    power
        .iter()
        .map(|&p| REFERENCE_LEVEL - 10.0 * p.max(f32::MIN_POSITIVE).log10())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::RustFftBackend;

    #[test]
    fn masking_threshold_never_below_absolute_threshold() {
        let fft_size = 1024;
        let mut fft = RustFftBackend::new(fft_size);
        let mut model = MaskingModel::new(fft_size, 48_000.0, &mut fft);

        let half = fft_size / 2;
        let power = vec![0.05f32; half + 1];
        let mut out = vec![0.0f32; half + 1];
        model.masking_thresholds(&power, &mut out);

        for k in 1..=half {
            assert!(
                out[k] >= model.absolute_thresholds()[k] - 1e-4,
                "bin {} below absolute threshold",
                k
            );
        }
    }

    #[test]
    fn bark_mapping_is_monotonic() {
        let fft_size = 2048;
        let mut fft = RustFftBackend::new(fft_size);
        let model = MaskingModel::new(fft_size, 48_000.0, &mut fft);
        for w in model.bark_z.windows(2) {
            assert!(w[1] >= w[0] - 1e-6);
        }
    }
}
