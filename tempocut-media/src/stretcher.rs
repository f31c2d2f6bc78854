//! Rate-conversion time-stretch primitive backed by rubato.
//!
//! The engine consumes time-stretching as a black box. This binding runs a
//! `FastFixedIn` polynomial resampler per call: a chunk played at speed `s`
//! is resampled by ratio `1/s`, so pitch follows speed the way varispeed
//! playback does. Per-call construction keeps the seam stateless — no
//! history bleeds between chunks, and concurrent chunk renders never share
//! DSP state.
//!
//! Speeds at or beyond [`JUMP_CUT_SPEED`] skip the resampler entirely and
//! return no samples: the chunk is cut rather than stretched.

use anyhow::anyhow;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use tempocut_core::error::Result;
use tempocut_core::stretch::TimeStretcher;

/// Speeds at or above this produce an empty slice (hard jump cut).
pub const JUMP_CUT_SPEED: f64 = 1_000.0;

/// Input frames fed to rubato per process call.
const CHUNK_FRAMES: usize = 1_024;

/// Silent flush blocks allowed while draining the resampler tail.
const MAX_FLUSH_BLOCKS: usize = 64;

/// Stateless `TimeStretcher` implementation over rubato.
#[derive(Debug, Default, Clone)]
pub struct RubatoStretcher;

impl RubatoStretcher {
    pub fn new() -> Self {
        Self
    }
}

impl TimeStretcher for RubatoStretcher {
    fn stretch(
        &self,
        samples: &[f32],
        channels: u16,
        _sample_rate: u32,
        speed: f64,
    ) -> Result<Vec<f32>> {
        let ch = channels.max(1) as usize;
        let in_frames = samples.len() / ch;
        if in_frames == 0 || speed >= JUMP_CUT_SPEED {
            return Ok(Vec::new());
        }

        let target_frames = (in_frames as f64 / speed).floor() as usize;
        if target_frames == 0 {
            return Ok(Vec::new());
        }
        if (speed - 1.0).abs() < 1e-9 {
            // Unit speed is a passthrough — no resampler session at all.
            return Ok(samples[..in_frames * ch].to_vec());
        }

        let ratio = 1.0 / speed;
        let mut resampler =
            FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, CHUNK_FRAMES, ch)
                .map_err(|e| anyhow!("resampler init (speed {speed}): {e}"))?;

        // Deinterleave into planar buffers, zero-padded to whole rubato blocks.
        let padded = in_frames.div_ceil(CHUNK_FRAMES) * CHUNK_FRAMES;
        let mut planar: Vec<Vec<f32>> = (0..ch).map(|_| Vec::with_capacity(padded)).collect();
        for frame in samples[..in_frames * ch].chunks_exact(ch) {
            for (channel, &sample) in planar.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        for channel in &mut planar {
            channel.resize(padded, 0.0);
        }

        let max_out = resampler.output_frames_max();
        let mut scratch: Vec<Vec<f32>> = vec![vec![0f32; max_out]; ch];
        let mut rendered: Vec<Vec<f32>> =
            (0..ch).map(|_| Vec::with_capacity(target_frames)).collect();

        let mut pos = 0;
        while pos < padded {
            let block: Vec<&[f32]> = planar
                .iter()
                .map(|channel| &channel[pos..pos + CHUNK_FRAMES])
                .collect();
            let (_, produced) = resampler
                .process_into_buffer(&block, &mut scratch, None)
                .map_err(|e| anyhow!("resampler process: {e}"))?;
            for (channel, out) in rendered.iter_mut().zip(&scratch) {
                channel.extend_from_slice(&out[..produced]);
            }
            pos += CHUNK_FRAMES;
        }

        // The interpolation delay can leave the tail short; drain with
        // silent blocks until the nominal length is reached.
        let silent = vec![0f32; CHUNK_FRAMES];
        let mut flushes = 0;
        while rendered[0].len() < target_frames && flushes < MAX_FLUSH_BLOCKS {
            let block: Vec<&[f32]> = (0..ch).map(|_| silent.as_slice()).collect();
            let (_, produced) = resampler
                .process_into_buffer(&block, &mut scratch, None)
                .map_err(|e| anyhow!("resampler flush: {e}"))?;
            for (channel, out) in rendered.iter_mut().zip(&scratch) {
                channel.extend_from_slice(&out[..produced]);
            }
            flushes += 1;
        }

        // Pin the output to the nominal re-timed length.
        for channel in &mut rendered {
            channel.resize(target_frames, 0.0);
        }

        debug!(in_frames, target_frames, speed, "chunk resampled");

        let mut out = Vec::with_capacity(target_frames * ch);
        for frame in 0..target_frames {
            for channel in &rendered {
                out.push(channel[frame]);
            }
        }
        Ok(out)
    }
}
