//! Per-chunk render: slice → stretch → normalize → fade.
//!
//! Rendering is a pure function of one chunk and the immutable input
//! buffer. It holds no cross-chunk state, which is what makes the
//! "parallel compute, sequential commit" split in the pipeline sound.

use tracing::debug;

use crate::audio::{envelope, AudioBuffer};
use crate::error::Result;
use crate::segment::Chunk;
use crate::stretch::TimeStretcher;

/// Re-timed, normalized, edge-shaped audio for one chunk, ready to commit.
#[derive(Debug, Clone)]
pub struct RenderedChunk {
    /// Interleaved output samples.
    pub samples: Vec<f32>,
    /// Sample-frame count (`samples.len() / channels`).
    pub frames: usize,
    /// Speed the chunk was stretched at.
    pub speed: f64,
}

/// Render one chunk of the input buffer at `speed`.
///
/// The input slice covers sample frames
/// `[trunc(start_frame · spf), trunc(end_frame · spf))`. The stretched
/// result is divided by the buffer's global peak so chunks cut from quiet
/// and loud regions land at a consistent output level, then fade-shaped at
/// the edges. A zero-peak buffer renders as silence of the stretched
/// length.
pub fn render_chunk(
    audio: &AudioBuffer,
    chunk: &Chunk,
    speed: f64,
    stretcher: &dyn TimeStretcher,
    fade_envelope: usize,
    samples_per_frame: f64,
) -> Result<RenderedChunk> {
    let start = (chunk.start_frame as f64 * samples_per_frame) as usize;
    let end = (chunk.end_frame as f64 * samples_per_frame) as usize;
    let slice = audio.frame_slice(start, end);

    let mut stretched = stretcher.stretch(slice, audio.channels(), audio.sample_rate(), speed)?;

    let ch = audio.channels() as usize;
    let frames = stretched.len() / ch;
    stretched.truncate(frames * ch);

    let peak = audio.peak();
    if peak > 0.0 {
        for s in stretched.iter_mut() {
            *s /= peak;
        }
    } else {
        stretched.fill(0.0);
    }

    envelope::shape_edges(&mut stretched, audio.channels(), fade_envelope);

    debug!(
        start_frame = chunk.start_frame,
        end_frame = chunk.end_frame,
        speed,
        frames,
        "chunk rendered"
    );

    Ok(RenderedChunk {
        samples: stretched,
        frames,
        speed,
    })
}
