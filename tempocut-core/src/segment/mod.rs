//! Run-length chunk segmentation with contextual margin dilation.
//!
//! ## Algorithm
//!
//! 1. Dilate the per-frame loudness by `margin`: frame `i` is included as
//!    sounded when any frame in `[i − margin, i + margin]` is loud. This
//!    pulls silent frames adjacent to speech into the sounded category so
//!    onsets and offsets are not clipped.
//! 2. Walk the dilated signal left to right and start a new chunk at every
//!    flip; close the final chunk at `N`.
//!
//! The output chunks are contiguous, ordered, non-overlapping and cover
//! `[0, N)` exactly. A single chunk spanning the whole clip is valid.

use serde::{Deserialize, Serialize};

use crate::classify::VolumeFrame;

/// Speed category of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Loud audio (or within the margin of loud audio).
    Sounded,
    /// Quiet audio away from any loud frame.
    Silent,
}

impl Category {
    pub fn is_sounded(self) -> bool {
        self == Category::Sounded
    }

    fn from_included(included: bool) -> Self {
        if included {
            Category::Sounded
        } else {
            Category::Silent
        }
    }
}

/// A maximal run of consecutive video frames sharing one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub start_frame: usize,
    /// Exclusive.
    pub end_frame: usize,
    pub category: Category,
}

impl Chunk {
    pub fn frame_count(&self) -> usize {
        self.end_frame - self.start_frame
    }
}

/// Segments a classified frame sequence into speed chunks.
#[derive(Debug, Clone)]
pub struct ChunkSegmenter {
    /// Frames of context kept around each loud span.
    margin: usize,
}

impl ChunkSegmenter {
    pub fn new(margin: usize) -> Self {
        Self { margin }
    }

    /// Run-length encode the margin-dilated loudness signal.
    pub fn segment(&self, frames: &[VolumeFrame]) -> Vec<Chunk> {
        let n = frames.len();
        if n == 0 {
            return Vec::new();
        }

        let include = self.dilate(frames);

        let mut chunks = Vec::new();
        let mut run_start = 0usize;
        for i in 1..n {
            if include[i] != include[i - 1] {
                chunks.push(Chunk {
                    start_frame: run_start,
                    end_frame: i,
                    category: Category::from_included(include[i - 1]),
                });
                run_start = i;
            }
        }
        chunks.push(Chunk {
            start_frame: run_start,
            end_frame: n,
            category: Category::from_included(include[n - 1]),
        });
        chunks
    }

    /// Max-pool each frame's loudness over `[i − margin, i + margin]`.
    fn dilate(&self, frames: &[VolumeFrame]) -> Vec<bool> {
        let n = frames.len();
        (0..n)
            .map(|i| {
                let lo = i.saturating_sub(self.margin);
                let hi = (i + self.margin + 1).min(n);
                frames[lo..hi].iter().any(|f| f.is_loud)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(pattern: &[bool]) -> Vec<VolumeFrame> {
        pattern.iter().map(|&is_loud| VolumeFrame { is_loud }).collect()
    }

    fn assert_exact_cover(chunks: &[Chunk], n: usize) {
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].start_frame, 0);
        assert_eq!(chunks.last().unwrap().end_frame, n);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_frame, pair[1].start_frame, "gap or overlap");
            assert_ne!(pair[0].category, pair[1].category, "adjacent runs merged");
        }
    }

    #[test]
    fn quiet_loud_quiet_yields_three_chunks() {
        let chunks = ChunkSegmenter::new(0).segment(&frames(&[
            false, false, false, true, true, false, false,
        ]));
        assert_exact_cover(&chunks, 7);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].category, Category::Silent);
        assert_eq!(chunks[1], Chunk {
            start_frame: 3,
            end_frame: 5,
            category: Category::Sounded,
        });
        assert_eq!(chunks[2].category, Category::Silent);
    }

    #[test]
    fn margin_pulls_neighbours_into_sounded() {
        let chunks = ChunkSegmenter::new(1).segment(&frames(&[
            false, false, false, true, false, false, false,
        ]));
        assert_exact_cover(&chunks, 7);
        assert_eq!(chunks.len(), 3);
        // The single loud frame at 3 spreads to [2, 5)
        assert_eq!(chunks[1], Chunk {
            start_frame: 2,
            end_frame: 5,
            category: Category::Sounded,
        });
    }

    #[test]
    fn margin_bridges_nearby_loud_spans() {
        // Loud at 2 and 5; margin 1 dilates to [1,4) and [4,7) — one run
        let chunks = ChunkSegmenter::new(1).segment(&frames(&[
            false, false, true, false, false, true, false, false,
        ]));
        assert_exact_cover(&chunks, 8);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], Chunk {
            start_frame: 1,
            end_frame: 7,
            category: Category::Sounded,
        });
    }

    #[test]
    fn all_quiet_is_one_silent_chunk() {
        let chunks = ChunkSegmenter::new(2).segment(&frames(&[false; 10]));
        assert_eq!(chunks, vec![Chunk {
            start_frame: 0,
            end_frame: 10,
            category: Category::Silent,
        }]);
    }

    #[test]
    fn all_loud_is_one_sounded_chunk() {
        let chunks = ChunkSegmenter::new(0).segment(&frames(&[true; 4]));
        assert_eq!(chunks, vec![Chunk {
            start_frame: 0,
            end_frame: 4,
            category: Category::Sounded,
        }]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(ChunkSegmenter::new(1).segment(&[]).is_empty());
    }

    #[test]
    fn large_margin_covers_everything() {
        let chunks = ChunkSegmenter::new(100).segment(&frames(&[
            false, false, true, false, false,
        ]));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].category, Category::Sounded);
    }

    #[test]
    fn cover_invariant_holds_across_margins() {
        let pattern: Vec<bool> = (0..64).map(|i| (i / 7) % 3 == 1).collect();
        let input = frames(&pattern);
        for margin in 0..8 {
            let chunks = ChunkSegmenter::new(margin).segment(&input);
            assert_exact_cover(&chunks, 64);

            // Dilation correctness: every loud frame sits at least `margin`
            // frames inside its sounded chunk (clamped at the clip edges).
            for (i, f) in input.iter().enumerate() {
                if !f.is_loud {
                    continue;
                }
                let chunk = chunks
                    .iter()
                    .find(|c| c.start_frame <= i && i < c.end_frame)
                    .unwrap();
                assert!(chunk.category.is_sounded());
                assert!(chunk.start_frame <= i.saturating_sub(margin));
                assert!(chunk.end_frame >= (i + margin + 1).min(64));
            }
        }
    }

    #[test]
    fn round_trip_reconstructs_frame_range() {
        let pattern: Vec<bool> = (0..40).map(|i| i % 5 == 0).collect();
        let chunks = ChunkSegmenter::new(1).segment(&frames(&pattern));
        let mut covered = Vec::new();
        for c in &chunks {
            covered.extend(c.start_frame..c.end_frame);
        }
        assert_eq!(covered, (0..40).collect::<Vec<_>>());
    }
}
