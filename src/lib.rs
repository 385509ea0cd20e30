//! Realtime single-channel spectral noise-reduction engine.
//!
//! Streaming STFT overlap-add, a learned noise power-spectrum profile, a
//! Bark-scale masking-threshold gain estimator, and a residual-whitening /
//! soft-bypass mixing stage. See [`Engine`] for the entry point.

pub mod engine;
pub mod error;
pub mod fft;
pub mod gain;
pub mod masking;
pub mod noise_profile;
pub mod params;
pub mod processor;
pub mod stft;
pub mod window;

pub use engine::{Engine, EngineConfig};
pub use error::ConfigError;
pub use noise_profile::{NoiseProfileSnapshot, ProfileError};
pub use params::Parameters;
