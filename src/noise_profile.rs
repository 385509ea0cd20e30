//! Learned noise power-spectrum profile.

use serde::{Deserialize, Serialize};
use std::fmt;

/// External persistence shape: `{fft_size, frames_learned, values}`.
///
/// Corrects the source's `sizeof`-in-`memcpy` bug by carrying an explicit
/// length (`values.len()`) rather than a raw byte copy sized off the wrong
/// field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoiseProfileSnapshot {
    pub fft_size: usize,
    pub frames_learned: f32,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileError {
    FftSizeMismatch { expected: usize, found: usize },
    LengthMismatch { expected: usize, found: usize },
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::FftSizeMismatch { expected, found } => write!(
                f,
                "noise profile fft_size mismatch: expected {expected}, found {found}"
            ),
            ProfileError::LengthMismatch { expected, found } => write!(
                f,
                "noise profile values length mismatch: expected {expected}, found {found}"
            ),
        }
    }
}

impl std::error::Error for ProfileError {}

pub struct NoiseProfile {
    fft_size: usize,
    noise: Vec<f32>,
    frames_learned: f32,
}

impl NoiseProfile {
    pub fn new(fft_size: usize) -> Self {
        Self {
            fft_size,
            noise: vec![0.0; fft_size / 2 + 1],
            frames_learned: 0.0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.frames_learned > 0.0
    }

    pub fn frames_learned(&self) -> f32 {
        self.frames_learned
    }

    pub fn values(&self) -> &[f32] {
        &self.noise
    }

    pub fn learn(&mut self, power: &[f32]) {
        debug_assert_eq!(power.len(), self.noise.len());
        if self.frames_learned == 0.0 {
            self.noise.copy_from_slice(power);
            self.frames_learned = 1.0;
        } else {
            for (n, &p) in self.noise.iter_mut().zip(power) {
                *n = ((self.frames_learned - 1.0) * *n + p) / self.frames_learned;
            }
            self.frames_learned += 1.0;
        }
    }

    pub fn clear(&mut self) {
        self.noise.iter_mut().for_each(|n| *n = 0.0);
        self.frames_learned = 0.0;
    }

    pub fn snapshot(&self) -> NoiseProfileSnapshot {
        NoiseProfileSnapshot {
            fft_size: self.fft_size,
            frames_learned: self.frames_learned,
            values: self.noise.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &NoiseProfileSnapshot) -> Result<(), ProfileError> {
        if snapshot.fft_size != self.fft_size {
            return Err(ProfileError::FftSizeMismatch {
                expected: self.fft_size,
                found: snapshot.fft_size,
            });
        }
        if snapshot.values.len() != self.noise.len() {
            return Err(ProfileError::LengthMismatch {
                expected: self.noise.len(),
                found: snapshot.values.len(),
            });
        }
        self.noise.copy_from_slice(&snapshot.values);
        self.frames_learned = snapshot.frames_learned;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learning_identical_frames_converges_to_that_power() {
        let half = 8;
        let mut profile = NoiseProfile::new(half * 2);
        let power = vec![0.3f32; half + 1];
        for _ in 0..10 {
            profile.learn(&power);
        }
        for (&n, &p) in profile.values().iter().zip(&power) {
            assert!((n - p).abs() < 1e-5);
        }
        assert_eq!(profile.frames_learned(), 10.0);
    }

    #[test]
    fn is_available_tracks_frames_learned() {
        let mut profile = NoiseProfile::new(16);
        assert!(!profile.is_available());
        profile.learn(&[1.0; 9]);
        assert!(profile.is_available());
        profile.clear();
        assert!(!profile.is_available());
    }

    #[test]
    fn restore_rejects_fft_size_mismatch_without_mutating_state() {
        let mut profile = NoiseProfile::new(16);
        profile.learn(&[0.5; 9]);
        let mut other = NoiseProfile::new(32);
        other.learn(&[0.9; 17]);
        let snapshot = other.snapshot();

        let before = profile.values().to_vec();
        let result = profile.restore(&snapshot);
        assert!(result.is_err());
        assert_eq!(profile.values(), before.as_slice());
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut profile = NoiseProfile::new(16);
        profile.learn(&[0.2; 9]);
        let snapshot = profile.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: NoiseProfileSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }
}
