//! Progress events emitted while a run executes.
//!
//! Consumers subscribe by handing the engine a `crossbeam_channel::Sender`;
//! the pipeline sends one event per chunk commit/skip and one terminal
//! summary. Sends never block the run — a dropped receiver is ignored.

use serde::{Deserialize, Serialize};

use crate::segment::Category;

/// One progress update from a running pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProgressEvent {
    /// A chunk finished its commit phase.
    #[serde(rename_all = "camelCase")]
    ChunkCommitted {
        index: usize,
        category: Category,
        /// Sample frames appended to the output.
        output_frames: usize,
        /// Output frame images materialized.
        frames_written: usize,
    },
    /// A chunk was skipped; under gap-fill the output still advanced.
    #[serde(rename_all = "camelCase")]
    ChunkSkipped {
        index: usize,
        category: Category,
        reason: String,
        /// Sample frames of silence appended to preserve sync.
        gap_frames: usize,
    },
    /// The run completed.
    #[serde(rename_all = "camelCase")]
    Finished {
        chunks: usize,
        skipped: usize,
        unresolved_frames: usize,
    },
}
