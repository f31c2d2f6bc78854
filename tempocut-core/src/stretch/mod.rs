//! Time-stretch primitive seam and per-category speed configuration.
//!
//! The `TimeStretcher` trait is the engine's DSP boundary: the engine never
//! resamples audio itself. Implementations live outside the core (see the
//! tempocut-media crate for the rubato binding) and are free to build
//! whatever per-call state they need — the seam is `&self` so a run may
//! stretch many chunks concurrently.

pub mod render;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::segment::Category;

/// Black-box time-stretch primitive.
pub trait TimeStretcher: Send + Sync {
    /// Re-time `samples` (interleaved, `channels` wide, at `sample_rate`)
    /// to play at `speed`×; the result holds ≈ `input_frames / speed`
    /// sample frames.
    ///
    /// Must be deterministic for a given input/speed pair. A returned slice
    /// with a ragged tail (not a whole number of sample frames) is trimmed
    /// by the caller.
    fn stretch(
        &self,
        samples: &[f32],
        channels: u16,
        sample_rate: u32,
        speed: f64,
    ) -> Result<Vec<f32>>;
}

/// Playback-speed multiplier per chunk category.
///
/// The silent speed may be arbitrarily large — at extreme values the
/// stretcher returns no samples and silent spans become hard jump cuts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedTable {
    pub sounded: f64,
    pub silent: f64,
}

impl SpeedTable {
    pub fn speed_for(&self, category: Category) -> f64 {
        match category {
            Category::Sounded => self.sounded,
            Category::Silent => self.silent,
        }
    }
}

impl Default for SpeedTable {
    fn default() -> Self {
        Self {
            sounded: 1.0,
            silent: 5.0,
        }
    }
}
