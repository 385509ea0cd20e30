//! The engine façade: owns the STFT framer, the spectral processor, and the
//! noise profile, and exposes the single realtime `run` entry point plus
//! construction/persistence helpers.

use crate::error::ConfigError;
use crate::fft::RustFftBackend;
use crate::noise_profile::{NoiseProfile, NoiseProfileSnapshot};
use crate::params::Parameters;
use crate::processor::SpectralProcessor;
use crate::stft::StftProcessor;
use crate::window::{WindowKind, WindowPair};

const MIN_FFT_SIZE: usize = 64;
const MAX_FFT_SIZE: usize = 16384;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub sample_rate: f32,
    pub fft_size: usize,
    pub overlap_factor: usize,
    pub window: WindowKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            fft_size: 2048,
            overlap_factor: 4,
            window: WindowKind::default(),
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate <= 0.0 {
            return Err(ConfigError::NonPositiveSampleRate);
        }
        if !self.fft_size.is_power_of_two() {
            return Err(ConfigError::NonPowerOfTwoFftSize(self.fft_size));
        }
        if self.fft_size < MIN_FFT_SIZE || self.fft_size > MAX_FFT_SIZE {
            return Err(ConfigError::FftSizeOutOfRange {
                size: self.fft_size,
                min: MIN_FFT_SIZE,
                max: MAX_FFT_SIZE,
            });
        }
        if self.overlap_factor == 0 || !self.fft_size.is_multiple_of(self.overlap_factor) {
            return Err(ConfigError::OverlapDoesNotDivideFftSize {
                fft_size: self.fft_size,
                overlap_factor: self.overlap_factor,
            });
        }
        Ok(())
    }
}

pub struct Engine {
    stft: StftProcessor,
    processor: SpectralProcessor,
    noise_profile: NoiseProfile,
    fft_size: usize,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let hop = config.fft_size / config.overlap_factor;
        let window = WindowPair::new(config.window, config.window, config.fft_size);

        // A throwaway backend used only to compute the masking model's SPL
        // reference curve at construction time; the STFT framer owns the
        // backend actually used on the realtime path.
        let mut init_fft = RustFftBackend::new(config.fft_size);
        let processor = SpectralProcessor::new(config.fft_size, config.sample_rate, hop, &mut init_fft);

        let stft_fft = Box::new(RustFftBackend::new(config.fft_size));
        let stft = StftProcessor::new(config.fft_size, config.overlap_factor, window, stft_fft);

        let noise_profile = NoiseProfile::new(config.fft_size);

        log::info!(
            "engine initialized: fft_size={} hop={} latency={} sample_rate={}",
            config.fft_size,
            hop,
            stft.latency(),
            config.sample_rate
        );

        Ok(Self {
            stft,
            processor,
            noise_profile,
            fft_size: config.fft_size,
        })
    }

    /// Reported latency (`fft_size - hop`), matching spec's "Reported
    /// latency" contract and the original plugin's
    /// `stft_processor_get_latency`. Not the true bit-exact reconstruction
    /// delay — see `StftProcessor::latency` and DESIGN.md.
    pub fn latency_samples(&self) -> usize {
        self.stft.latency()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Reads `n_samples` from `input`, writing the corresponding delayed
    /// (and possibly denoised) output into `output`. Allocation-free;
    /// `params` is read once per call.
    pub fn run(&mut self, input: &[f32], output: &mut [f32], n_samples: usize, params: &Parameters) {
        let Engine {
            stft,
            processor,
            noise_profile,
            ..
        } = self;
        stft.process(input, output, n_samples, &mut |halfcomplex| {
            processor.run(halfcomplex, noise_profile, params);
        });
    }

    pub fn noise_profile_snapshot(&self) -> NoiseProfileSnapshot {
        self.noise_profile.snapshot()
    }

    /// Returns `false` without mutating engine state if `snapshot` was
    /// captured from an engine with a different `fft_size`.
    pub fn restore_noise_profile(&mut self, snapshot: &NoiseProfileSnapshot) -> bool {
        match self.noise_profile.restore(snapshot) {
            Ok(()) => {
                log::info!("noise profile restored ({} frames)", snapshot.frames_learned);
                true
            }
            Err(err) => {
                log::warn!("rejected noise profile restore: {err}");
                false
            }
        }
    }

    pub fn clear_noise_profile(&mut self) {
        self.noise_profile.clear();
    }
}
