//! `TempocutEngine` — top-level run controller.
//!
//! ## Lifecycle
//!
//! ```text
//! TempocutEngine::new(config, stretcher)
//!     └─► run(audio, frame_store)
//!             classify ─► segment ─► per-chunk render/commit ─► RunReport
//! ```
//!
//! One engine may execute many runs; nothing carries over between them.
//! The engine owns the configuration and the time-stretch primitive; the
//! audio buffer and frame store are supplied per run.

pub mod pipeline;

use std::sync::Arc;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audio::AudioBuffer;
use crate::engine::pipeline::ChunkOutcome;
use crate::error::{Result, TempocutError};
use crate::events::ProgressEvent;
use crate::remap::FrameStore;
use crate::stretch::{SpeedTable, TimeStretcher};

/// What to do when the time-stretch primitive fails for one chunk.
///
/// Leaving the output pointer stale while later chunks keep committing
/// would silently desynchronize every subsequent frame window, so the only
/// choices are to keep sync on a best-effort basis or to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipPolicy {
    /// Advance the output by the chunk's nominal re-timed duration, padded
    /// with silence, and keep going.
    GapFill,
    /// Abort the run naming the failed chunk.
    Fatal,
}

/// Configuration for `TempocutEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Peak-relative loudness threshold in `[0, 1]`. Windows below it are
    /// silent. Default: 0.03.
    pub silence_threshold: f32,
    /// Playback speed per category. Defaults: sounded 1.0, silent 5.0.
    pub speeds: SpeedTable,
    /// Silent frames of context kept around each sounded span. Default: 1.
    pub frame_margin: usize,
    /// Video frame rate in Hz. Correctable from container metadata before
    /// the run. Default: 30.0.
    pub frame_rate: f64,
    /// Fade-envelope length in sample frames. Chunks shorter than this are
    /// silenced rather than partially faded. Default: 400.
    pub fade_envelope: usize,
    /// Stretch-failure policy. Default: `GapFill`.
    pub skip_policy: SkipPolicy,
    /// Worker threads for the render phase. 1 = fully sequential. Commits
    /// are serialized in chunk order regardless. Default: 1.
    pub render_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.03,
            speeds: SpeedTable::default(),
            frame_margin: 1,
            frame_rate: 30.0,
            fade_envelope: 400,
            skip_policy: SkipPolicy::GapFill,
            render_workers: 1,
        }
    }
}

impl EngineConfig {
    /// Check the configuration before a run.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.silence_threshold) {
            return Err(TempocutError::InvalidConfig(format!(
                "silence_threshold must be within [0, 1], got {}",
                self.silence_threshold
            )));
        }
        for (name, speed) in [
            ("sounded_speed", self.speeds.sounded),
            ("silent_speed", self.speeds.silent),
        ] {
            if !(speed.is_finite() && speed > 0.0) {
                return Err(TempocutError::InvalidConfig(format!(
                    "{name} must be a positive finite number, got {speed}"
                )));
            }
        }
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(TempocutError::InvalidConfig(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if self.fade_envelope == 0 {
            return Err(TempocutError::InvalidConfig(
                "fade_envelope must be at least 1 sample frame".into(),
            ));
        }
        if self.render_workers == 0 {
            return Err(TempocutError::InvalidConfig(
                "render_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Terminal output of one run.
#[derive(Debug)]
pub struct RunReport {
    /// Concatenated, re-timed output audio.
    pub audio: AudioBuffer,
    /// Per-chunk outcomes, in chunk order.
    pub outcomes: Vec<ChunkOutcome>,
    /// Highest output frame index materialized, if any frame was written.
    /// The frame sequence `0..=last_written_output_frame` is gap-free.
    pub last_written_output_frame: Option<usize>,
    /// Output frame slots left without an image (frame missing before any
    /// fallback existed). Reported as a warning, never fatal.
    pub unresolved_frames: usize,
}

impl RunReport {
    pub fn committed_chunks(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ChunkOutcome::Committed { .. }))
            .count()
    }

    pub fn skipped_chunks(&self) -> usize {
        self.outcomes.len() - self.committed_chunks()
    }
}

/// The top-level engine handle.
pub struct TempocutEngine {
    config: EngineConfig,
    stretcher: Arc<dyn TimeStretcher>,
    progress_tx: Option<Sender<ProgressEvent>>,
}

impl TempocutEngine {
    pub fn new(config: EngineConfig, stretcher: Arc<dyn TimeStretcher>) -> Self {
        Self {
            config,
            stretcher,
            progress_tx: None,
        }
    }

    /// Stream progress events to `tx` during runs.
    pub fn with_progress(mut self, tx: Sender<ProgressEvent>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute one full run over a materialized audio buffer.
    ///
    /// # Errors
    /// - `TempocutError::InvalidConfig` when the configuration is rejected.
    /// - `TempocutError::StretchFailed` under `SkipPolicy::Fatal`.
    /// - Frame-store I/O errors are always fatal (missing frames are not —
    ///   they fall back per the remapper rules).
    pub fn run(&self, audio: &AudioBuffer, frames: &mut dyn FrameStore) -> Result<RunReport> {
        self.config.validate()?;
        info!(
            sample_rate = audio.sample_rate(),
            channels = audio.channels(),
            input_frames = audio.frame_len(),
            duration_secs = audio.duration_secs(),
            "run starting"
        );

        pipeline::run(pipeline::PipelineContext {
            config: &self.config,
            audio,
            stretcher: self.stretcher.as_ref(),
            frames,
            progress_tx: self.progress_tx.as_ref(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut cfg = EngineConfig::default();
        cfg.silence_threshold = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(TempocutError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_non_positive_speeds() {
        let mut cfg = EngineConfig::default();
        cfg.speeds.silent = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.speeds.sounded = f64::INFINITY;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_frame_rate_envelope_and_workers() {
        let mut cfg = EngineConfig::default();
        cfg.frame_rate = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.fade_envelope = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.render_workers = 0;
        assert!(cfg.validate().is_err());
    }
}
