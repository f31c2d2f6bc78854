//! # tempocut-core
//!
//! Silence-driven non-linear time-remapping engine.
//!
//! ## Architecture
//!
//! ```text
//! AudioBuffer → VolumeClassifier → ChunkSegmenter → chunks
//!                                                     │
//!                              render: TimeStretcher::stretch + fade
//!                              (pure per chunk, parallel-safe)
//!                                                     │
//!                              commit: append audio, advance pointer,
//!                              FrameRemapper → FrameStore
//!                              (strictly in chunk order)
//! ```
//!
//! Rendering is a pure function of a single chunk. Commits are serialized in
//! chunk order because each chunk's output-frame window derives from the
//! output sample pointer left behind by the previous commit.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod classify;
pub mod engine;
pub mod error;
pub mod events;
pub mod remap;
pub mod segment;
pub mod stretch;

// Convenience re-exports for downstream crates
pub use audio::AudioBuffer;
pub use engine::pipeline::{ChunkOutcome, OutputState, SkipReason};
pub use engine::{EngineConfig, RunReport, SkipPolicy, TempocutEngine};
pub use error::TempocutError;
pub use events::ProgressEvent;
pub use remap::{FrameStore, FrameWrite};
pub use segment::{Category, Chunk};
pub use stretch::{SpeedTable, TimeStretcher};
