//! Thin wrappers over the ffmpeg / ffprobe CLIs.
//!
//! Container decoding and encoding stay outside the engine. These helpers
//! extract the numbered frame images and the audio track the engine
//! consumes, probe the container's video frame rate (which overrides a
//! configured rate when present), and mux the re-timed result back into an
//! output container.
//!
//! All commands are built as argument vectors and run without a shell;
//! argument construction is unit tested without invoking ffmpeg.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Numbered source-frame pattern written by the extractor (1-based).
pub const FRAME_PATTERN: &str = "frame%06d.jpg";
/// Numbered output-frame pattern produced by the frame store (1-based).
pub const OUTPUT_FRAME_PATTERN: &str = "newFrame%06d.jpg";
/// Name of the extracted audio track inside the working directory.
pub const AUDIO_TRACK: &str = "audio.wav";

/// Handle to the ffmpeg and ffprobe executables.
pub struct FfmpegCli {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegCli {
    /// Locate ffmpeg and ffprobe on `PATH`.
    pub fn discover() -> MediaResult<Self> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
        let ffprobe = which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;
        Ok(Self { ffmpeg, ffprobe })
    }

    /// Extract numbered JPEG frames into `work_dir`.
    ///
    /// `quality` is ffmpeg's `-qscale:v` (1 best – 31 worst, 3 typical).
    pub fn extract_frames(&self, input: &Path, work_dir: &Path, quality: u8) -> MediaResult<()> {
        info!(input = %input.display(), quality, "extracting frames");
        self.run(&self.ffmpeg, &frame_extract_args(input, work_dir, quality))
    }

    /// Extract the audio track to `work_dir/audio.wav` at `sample_rate`, stereo.
    pub fn extract_audio(
        &self,
        input: &Path,
        work_dir: &Path,
        sample_rate: u32,
    ) -> MediaResult<PathBuf> {
        let track = work_dir.join(AUDIO_TRACK);
        info!(input = %input.display(), sample_rate, "extracting audio track");
        self.run(&self.ffmpeg, &audio_extract_args(input, &track, sample_rate))?;
        Ok(track)
    }

    /// Probe the container's video frame rate, if a video stream reports one.
    pub fn probe_frame_rate(&self, input: &Path) -> MediaResult<Option<f64>> {
        let args = probe_frame_rate_args(input);
        debug!(program = %self.ffprobe.display(), ?args, "probing frame rate");
        let output = Command::new(&self.ffprobe).args(&args).output()?;
        if !output.status.success() {
            return Err(MediaError::command_failed("ffprobe", &output));
        }
        Ok(parse_frame_rate(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Mux the re-numbered frame sequence and the new audio track into `output`.
    pub fn mux(
        &self,
        work_dir: &Path,
        audio: &Path,
        frame_rate: f64,
        output: &Path,
    ) -> MediaResult<()> {
        info!(output = %output.display(), frame_rate, "muxing re-timed video");
        self.run(&self.ffmpeg, &mux_args(work_dir, audio, frame_rate, output))
    }

    fn run(&self, program: &Path, args: &[String]) -> MediaResult<()> {
        debug!(program = %program.display(), ?args, "running");
        let output = Command::new(program).args(args).output()?;
        if !output.status.success() {
            let name = program
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| program.display().to_string());
            return Err(MediaError::command_failed(name, &output));
        }
        Ok(())
    }
}

fn frame_extract_args(input: &Path, work_dir: &Path, quality: u8) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
        "-qscale:v".into(),
        quality.to_string(),
        work_dir.join(FRAME_PATTERN).display().to_string(),
    ]
}

fn audio_extract_args(input: &Path, track: &Path, sample_rate: u32) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
        "-ab".into(),
        "160k".into(),
        "-ac".into(),
        "2".into(),
        "-ar".into(),
        sample_rate.to_string(),
        "-vn".into(),
        track.display().to_string(),
    ]
}

fn probe_frame_rate_args(input: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-select_streams".into(),
        "v:0".into(),
        "-show_entries".into(),
        "stream=r_frame_rate".into(),
        "-of".into(),
        "default=nokey=1:noprint_wrappers=1".into(),
        input.display().to_string(),
    ]
}

fn mux_args(work_dir: &Path, audio: &Path, frame_rate: f64, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-framerate".into(),
        frame_rate.to_string(),
        "-i".into(),
        work_dir.join(OUTPUT_FRAME_PATTERN).display().to_string(),
        "-i".into(),
        audio.display().to_string(),
        "-strict".into(),
        "-2".into(),
        output.display().to_string(),
    ]
}

/// Parse ffprobe's `r_frame_rate` value (e.g. `30000/1001` or `25/1`).
fn parse_frame_rate(raw: &str) -> Option<f64> {
    let line = raw.trim().lines().next()?.trim();
    if let Some((num, den)) = line.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        (num > 0.0 && den > 0.0).then_some(num / den)
    } else {
        line.parse::<f64>().ok().filter(|v| *v > 0.0)
    }
}
