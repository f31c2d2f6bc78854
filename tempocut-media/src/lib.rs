//! # tempocut-media
//!
//! Collaborator bindings for the tempocut engine: WAV decode/encode via
//! hound, frame extraction / probing / muxing via the ffmpeg CLI, a
//! rubato-backed time-stretch primitive, and a directory-backed numbered
//! frame store.
//!
//! ## Wiring
//!
//! ```ignore
//! let cli = FfmpegCli::discover()?;
//! cli.extract_frames(&input, &work_dir, 3)?;
//! let track = cli.extract_audio(&input, &work_dir, 44_100)?;
//! let audio = wav::read_wav(&track)?;
//!
//! let mut config = EngineConfig::default();
//! if let Some(rate) = cli.probe_frame_rate(&input)? {
//!     config.frame_rate = rate;
//! }
//!
//! let engine = TempocutEngine::new(config.clone(), Arc::new(RubatoStretcher::new()));
//! let mut frames = DirFrameStore::new(&work_dir);
//! let report = engine.run(&audio, &mut frames)?;
//!
//! let retimed = work_dir.join("audioNew.wav");
//! wav::write_wav(&retimed, &report.audio)?;
//! cli.mux(&work_dir, &retimed, config.frame_rate, &output)?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod ffmpeg;
pub mod frames;
pub mod logging;
pub mod stretcher;
pub mod wav;

pub use error::MediaError;
pub use ffmpeg::FfmpegCli;
pub use frames::DirFrameStore;
pub use stretcher::RubatoStretcher;
