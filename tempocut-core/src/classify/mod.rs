//! Per-video-frame loudness classification.
//!
//! ## Algorithm
//!
//! 1. Take the buffer's global peak amplitude as the normalization reference.
//! 2. Cut the track into video-frame-duration windows of
//!    `samples_per_frame = sample_rate / frame_rate` sample frames
//!    (fractional; window boundaries floor consistently).
//! 3. A window is loud when `local_peak / global_peak >= threshold`.
//!
//! A buffer whose global peak is zero classifies as all-quiet — degenerate
//! input never reaches a division.

use tracing::debug;

use crate::audio::{peak_amplitude, AudioBuffer};

/// One video-frame-duration window of audio, classified loud or quiet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeFrame {
    pub is_loud: bool,
}

/// Peak-threshold volume classifier.
#[derive(Debug, Clone)]
pub struct VolumeClassifier {
    /// Peak-relative loudness threshold in `[0, 1]`. Windows whose local
    /// peak reaches this fraction of the global peak are loud.
    threshold: f32,
}

impl VolumeClassifier {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Classify every video-frame window of `audio`.
    ///
    /// Window `i` spans sample frames
    /// `[floor(i·spf), min(floor((i+1)·spf), total))`; the window count is
    /// `ceil(total / spf)`. Pure function of its inputs — classifying the
    /// same buffer twice yields identical output.
    pub fn classify(&self, audio: &AudioBuffer, samples_per_frame: f64) -> Vec<VolumeFrame> {
        let total = audio.frame_len();
        if total == 0 || samples_per_frame <= 0.0 {
            return Vec::new();
        }

        let window_count = (total as f64 / samples_per_frame).ceil() as usize;
        let global_peak = audio.peak();

        if global_peak == 0.0 {
            debug!(window_count, "zero global peak — classifying all windows quiet");
            return vec![VolumeFrame { is_loud: false }; window_count];
        }

        let mut frames = Vec::with_capacity(window_count);
        for i in 0..window_count {
            let start = (i as f64 * samples_per_frame).floor() as usize;
            let end = ((i + 1) as f64 * samples_per_frame).floor() as usize;
            let local_peak = peak_amplitude(audio.frame_slice(start, end.min(total)));
            frames.push(VolumeFrame {
                is_loud: local_peak / global_peak >= self.threshold,
            });
        }
        frames
    }
}
