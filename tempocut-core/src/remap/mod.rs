//! Output-frame to input-frame remapping with last-known-good fallback.
//!
//! After a chunk's audio commits, the output frames that came into
//! existence are `[ceil(before / spf), ceil(after / spf))` where `before`
//! and `after` are the output sample pointer around the commit. Each output
//! frame resolves to an input frame by walking the chunk at its playback
//! speed; indices that fall outside the available frames (rounding near
//! chunk boundaries, end-of-clip truncation) repeat the most recent frame
//! that did resolve, so the output frame sequence never has a gap.

use tracing::warn;

use crate::error::Result;
use crate::segment::Chunk;

/// Result of asking the frame store to materialize one output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameWrite {
    /// The input frame existed and was written to the output slot.
    Done,
    /// The input frame does not exist in the store.
    Missing,
}

/// Narrow collaborator interface over the numbered frame images.
///
/// Implementations locate/copy/link the image for `input_frame` under the
/// name of `output_frame`. `Missing` means the source frame does not exist;
/// hard failures (I/O) are errors.
pub trait FrameStore {
    fn materialize(&mut self, input_frame: usize, output_frame: usize) -> Result<FrameWrite>;
}

/// The frame window and per-slot results of mapping one chunk.
#[derive(Debug, Clone)]
pub struct MappedFrames {
    /// First output frame covered by the chunk (inclusive).
    pub start_output_frame: usize,
    /// End of the window (exclusive). Equal to the start when the chunk's
    /// audio was too short to produce any output frame.
    pub end_output_frame: usize,
    /// `(output_frame, resolved_input_frame)` for every slot that was
    /// materialized, fallback substitutions included.
    pub mappings: Vec<(usize, usize)>,
    /// Highest output frame materialized by this chunk, if any.
    pub last_written: Option<usize>,
}

impl MappedFrames {
    pub fn written(&self) -> usize {
        self.mappings.len()
    }
}

/// Maps each output frame slot of a committed chunk to a source frame.
pub struct FrameRemapper {
    samples_per_frame: f64,
    /// Most recent input frame successfully materialized. Updated only on
    /// confirmed success.
    last_good: Option<usize>,
    /// Output slots that could not be resolved at all (frame missing and no
    /// fallback available yet).
    unresolved: usize,
}

impl FrameRemapper {
    pub fn new(samples_per_frame: f64) -> Self {
        Self {
            samples_per_frame,
            last_good: None,
            unresolved: 0,
        }
    }

    /// Map the output frames brought into existence by one chunk's commit.
    ///
    /// `pointer_before` / `pointer_after` are the output sample pointer (in
    /// sample frames) around the chunk's audio append. A zero-length range
    /// maps zero frames and returns an empty window.
    pub fn map_chunk(
        &mut self,
        chunk: &Chunk,
        speed: f64,
        pointer_before: usize,
        pointer_after: usize,
        store: &mut dyn FrameStore,
    ) -> Result<MappedFrames> {
        let start_out = (pointer_before as f64 / self.samples_per_frame).ceil() as usize;
        let end_out = (pointer_after as f64 / self.samples_per_frame).ceil() as usize;

        let mut mappings = Vec::with_capacity(end_out.saturating_sub(start_out));
        let mut last_written = None;

        for output_frame in start_out..end_out {
            let offset = speed * (output_frame - start_out) as f64;
            let input_frame = chunk.start_frame + offset as usize;

            match store.materialize(input_frame, output_frame)? {
                FrameWrite::Done => {
                    self.last_good = Some(input_frame);
                    mappings.push((output_frame, input_frame));
                    last_written = Some(output_frame);
                }
                FrameWrite::Missing => match self.last_good {
                    Some(fallback) => match store.materialize(fallback, output_frame)? {
                        FrameWrite::Done => {
                            mappings.push((output_frame, fallback));
                            last_written = Some(output_frame);
                        }
                        FrameWrite::Missing => {
                            self.unresolved += 1;
                            warn!(
                                output_frame,
                                fallback, "fallback frame vanished — slot left unresolved"
                            );
                        }
                    },
                    None => {
                        self.unresolved += 1;
                        warn!(
                            output_frame,
                            input_frame, "frame missing with no fallback yet — slot left unresolved"
                        );
                    }
                },
            }
        }

        Ok(MappedFrames {
            start_output_frame: start_out,
            end_output_frame: end_out,
            mappings,
            last_written,
        })
    }

    /// Output slots left without any image, reported at end of run.
    pub fn unresolved_slots(&self) -> usize {
        self.unresolved
    }
}
