//! Analysis/synthesis window generation.
//!
//! Four window families are supported, matching the STFT front end this
//! engine was ported from. Vorbis is the default for both analysis and
//! synthesis since it is COLA-compatible at overlap >= 2 and gives cleaner
//! sidelobes than Hann for this application.

use std::f32::consts::PI;

/// Tagged window family. No dynamic dispatch is needed since the set is
/// closed and fixed at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Default)]
pub enum WindowKind {
    Hann,
    Hamming,
    Blackman,
    #[default]
    Vorbis,
}


/// Builds a window of length `n` for the given family.
pub fn build_window(kind: WindowKind, n: usize) -> Vec<f32> {
    (0..n).map(|k| window_sample(kind, k, n)).collect()
}

fn window_sample(kind: WindowKind, k: usize, n: usize) -> f32 {
    let p = k as f32 / n as f32;
    match kind {
        WindowKind::Hann => 0.5 - 0.5 * (2.0 * PI * p).cos(),
        WindowKind::Hamming => 0.54 - 0.46 * (2.0 * PI * p).cos(),
        WindowKind::Blackman => {
            0.42 - 0.5 * (2.0 * PI * p).cos() + 0.08 * (4.0 * PI * p).cos()
        }
        WindowKind::Vorbis => {
            let s = (PI * p).sin();
            (PI / 2.0 * s * s).sin()
        }
    }
}

/// An analysis/synthesis window pair plus the overlap-add normalization
/// factor they imply. Immutable after construction.
pub struct WindowPair {
    pub analysis: Vec<f32>,
    pub synthesis: Vec<f32>,
    /// `(sum(analysis[k] * synthesis[k])) / n`, used to normalize overlap-add
    /// to unit gain together with the overlap factor.
    pub overlap_scale: f32,
}

impl WindowPair {
    pub fn new(analysis_kind: WindowKind, synthesis_kind: WindowKind, n: usize) -> Self {
        let analysis = build_window(analysis_kind, n);
        let synthesis = build_window(synthesis_kind, n);
        let sum: f32 = analysis
            .iter()
            .zip(&synthesis)
            .map(|(a, s)| a * s)
            .sum();
        let overlap_scale = sum / n as f32;
        Self {
            analysis,
            synthesis,
            overlap_scale,
        }
    }
}
