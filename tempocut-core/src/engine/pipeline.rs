//! Batch pipeline: classify → segment → render chunks → commit in order.
//!
//! ## Per-chunk stages
//!
//! ```text
//! pending audio ─► stretched ─► faded ─► appended ─► frames mapped ─► done
//!        └──────────── stretch failure ────────────► skipped (terminal)
//! ```
//!
//! ## Ordering guarantee
//!
//! Chunk `k+1`'s output-frame window is computed from the output sample
//! pointer left behind by chunk `k`'s commit, so commits happen strictly in
//! chunk order. Rendering is a pure per-chunk function and may run on a
//! small worker pool; results are re-ordered by chunk index before the
//! commit phase ("parallel compute, sequential commit"). `OutputState` is
//! owned by the committer and never shared.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, info, warn};

use crate::audio::AudioBuffer;
use crate::classify::VolumeClassifier;
use crate::engine::{EngineConfig, RunReport, SkipPolicy};
use crate::error::{Result, TempocutError};
use crate::events::ProgressEvent;
use crate::remap::{FrameRemapper, FrameStore};
use crate::segment::{Chunk, ChunkSegmenter};
use crate::stretch::render::{render_chunk, RenderedChunk};
use crate::stretch::TimeStretcher;

/// The single piece of state threaded chunk to chunk.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputState {
    /// Next write position in the output, in sample frames.
    pub output_sample_pointer: usize,
    /// Highest output frame index materialized so far.
    pub last_written_output_frame: Option<usize>,
}

/// Why a chunk was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The external time-stretch primitive failed.
    Stretch(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Stretch(reason) => write!(f, "time-stretch failed: {reason}"),
        }
    }
}

/// Terminal state of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Committed {
        chunk: Chunk,
        /// Output sample-frame range occupied by the chunk's audio.
        output_range: Range<usize>,
        /// Output frame images materialized during frame mapping.
        frames_written: usize,
    },
    Skipped {
        chunk: Chunk,
        reason: SkipReason,
        /// Sample frames of silence appended under `SkipPolicy::GapFill`.
        gap_frames: usize,
    },
}

/// All context one run needs, passed as one struct so the call site stays tidy.
pub(crate) struct PipelineContext<'a> {
    pub config: &'a EngineConfig,
    pub audio: &'a AudioBuffer,
    pub stretcher: &'a dyn TimeStretcher,
    pub frames: &'a mut dyn FrameStore,
    pub progress_tx: Option<&'a Sender<ProgressEvent>>,
}

/// Execute one full run.
pub(crate) fn run(ctx: PipelineContext<'_>) -> Result<RunReport> {
    let PipelineContext {
        config,
        audio,
        stretcher,
        frames,
        progress_tx,
    } = ctx;

    let samples_per_frame = audio.sample_rate() as f64 / config.frame_rate;

    // ── Pass 1 + 2: classify, then segment ───────────────────────────────
    let volume_frames =
        VolumeClassifier::new(config.silence_threshold).classify(audio, samples_per_frame);
    let chunks = ChunkSegmenter::new(config.frame_margin).segment(&volume_frames);
    info!(
        video_frames = volume_frames.len(),
        chunks = chunks.len(),
        samples_per_frame,
        "input classified and segmented"
    );

    let mut committer = Committer {
        config,
        audio,
        samples_per_frame,
        frames,
        progress_tx,
        remapper: FrameRemapper::new(samples_per_frame),
        state: OutputState::default(),
        output: Vec::new(),
        outcomes: Vec::with_capacity(chunks.len()),
    };

    let workers = config.render_workers.min(chunks.len().max(1));
    if workers <= 1 {
        for (index, chunk) in chunks.iter().enumerate() {
            let speed = config.speeds.speed_for(chunk.category);
            let render = render_chunk(
                audio,
                chunk,
                speed,
                stretcher,
                config.fade_envelope,
                samples_per_frame,
            );
            committer.commit(index, chunk, speed, render)?;
        }
    } else {
        render_with_workers(config, audio, stretcher, &chunks, workers, &mut committer)?;
    }

    Ok(committer.finish())
}

/// Fan chunk renders out to a worker pool; commit in chunk order as results
/// stream back. No chunk begins its commit before all lower-indexed chunks
/// have committed.
fn render_with_workers(
    config: &EngineConfig,
    audio: &AudioBuffer,
    stretcher: &dyn TimeStretcher,
    chunks: &[Chunk],
    workers: usize,
    committer: &mut Committer<'_>,
) -> Result<()> {
    let samples_per_frame = committer.samples_per_frame;
    let (job_tx, job_rx) = unbounded::<usize>();
    let (done_tx, done_rx) = unbounded::<(usize, Result<RenderedChunk>)>();
    for index in 0..chunks.len() {
        let _ = job_tx.send(index);
    }
    drop(job_tx);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                while let Ok(index) = job_rx.recv() {
                    let chunk = &chunks[index];
                    let speed = config.speeds.speed_for(chunk.category);
                    let render = render_chunk(
                        audio,
                        chunk,
                        speed,
                        stretcher,
                        config.fade_envelope,
                        samples_per_frame,
                    );
                    if done_tx.send((index, render)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);
        drop(job_rx);

        let mut pending: BTreeMap<usize, Result<RenderedChunk>> = BTreeMap::new();
        let mut next = 0usize;
        let mut failure = None;
        'recv: for (index, render) in done_rx.iter() {
            pending.insert(index, render);
            while let Some(render) = pending.remove(&next) {
                let chunk = &chunks[next];
                let speed = config.speeds.speed_for(chunk.category);
                if let Err(e) = committer.commit(next, chunk, speed, render) {
                    failure = Some(e);
                    break 'recv;
                }
                next += 1;
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
}

/// Owns the commit phase: output buffer, output state, frame remapping.
struct Committer<'a> {
    config: &'a EngineConfig,
    audio: &'a AudioBuffer,
    samples_per_frame: f64,
    frames: &'a mut dyn FrameStore,
    progress_tx: Option<&'a Sender<ProgressEvent>>,
    remapper: FrameRemapper,
    state: OutputState,
    output: Vec<f32>,
    outcomes: Vec<ChunkOutcome>,
}

impl Committer<'_> {
    fn commit(
        &mut self,
        index: usize,
        chunk: &Chunk,
        speed: f64,
        render: Result<RenderedChunk>,
    ) -> Result<()> {
        match render {
            Ok(rendered) => {
                let before = self.state.output_sample_pointer;
                let after = before + rendered.frames;
                self.output.extend_from_slice(&rendered.samples);

                let mapped =
                    self.remapper
                        .map_chunk(chunk, speed, before, after, self.frames)?;

                self.state.output_sample_pointer = after;
                self.note_last_written(mapped.last_written);

                debug!(
                    index,
                    category = ?chunk.category,
                    output_frames = rendered.frames,
                    frames_written = mapped.written(),
                    "chunk committed"
                );
                self.send(ProgressEvent::ChunkCommitted {
                    index,
                    category: chunk.category,
                    output_frames: rendered.frames,
                    frames_written: mapped.written(),
                });
                self.outcomes.push(ChunkOutcome::Committed {
                    chunk: *chunk,
                    output_range: before..after,
                    frames_written: mapped.written(),
                });
                Ok(())
            }
            Err(error) => self.skip(index, chunk, speed, error),
        }
    }

    /// Apply the configured skip policy to a chunk whose render failed.
    fn skip(
        &mut self,
        index: usize,
        chunk: &Chunk,
        speed: f64,
        error: TempocutError,
    ) -> Result<()> {
        match self.config.skip_policy {
            SkipPolicy::Fatal => {
                warn!(index, error = %error, "stretch failed — aborting run");
                Err(TempocutError::StretchFailed {
                    chunk_index: index,
                    reason: error.to_string(),
                })
            }
            SkipPolicy::GapFill => {
                // Advance by the chunk's nominal re-timed duration and pad
                // with silence; later chunks' frame windows stay aligned
                // and the image sequence stays continuous over the gap.
                let gap = self.nominal_output_frames(chunk, speed);
                let before = self.state.output_sample_pointer;
                let after = before + gap;
                let channels = self.audio.channels() as usize;
                self.output
                    .extend(std::iter::repeat(0.0).take(gap * channels));

                let mapped =
                    self.remapper
                        .map_chunk(chunk, speed, before, after, self.frames)?;

                self.state.output_sample_pointer = after;
                self.note_last_written(mapped.last_written);

                warn!(
                    index,
                    error = %error,
                    gap_frames = gap,
                    "stretch failed — chunk gap-filled with silence"
                );
                self.send(ProgressEvent::ChunkSkipped {
                    index,
                    category: chunk.category,
                    reason: error.to_string(),
                    gap_frames: gap,
                });
                self.outcomes.push(ChunkOutcome::Skipped {
                    chunk: *chunk,
                    reason: SkipReason::Stretch(error.to_string()),
                    gap_frames: gap,
                });
                Ok(())
            }
        }
    }

    /// Expected output length for a chunk whose stretched audio never
    /// arrived: the input slice re-timed at the chunk's speed.
    fn nominal_output_frames(&self, chunk: &Chunk, speed: f64) -> usize {
        let start = (chunk.start_frame as f64 * self.samples_per_frame) as usize;
        let end = (chunk.end_frame as f64 * self.samples_per_frame) as usize;
        let channels = self.audio.channels() as usize;
        let input_frames = self.audio.frame_slice(start, end).len() / channels;
        (input_frames as f64 / speed).round() as usize
    }

    fn note_last_written(&mut self, last: Option<usize>) {
        if let Some(last) = last {
            self.state.last_written_output_frame = Some(
                self.state
                    .last_written_output_frame
                    .map_or(last, |cur| cur.max(last)),
            );
        }
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = self.progress_tx {
            let _ = tx.send(event);
        }
    }

    fn finish(self) -> RunReport {
        let unresolved = self.remapper.unresolved_slots();
        let skipped = self
            .outcomes
            .iter()
            .filter(|o| matches!(o, ChunkOutcome::Skipped { .. }))
            .count();
        self.send(ProgressEvent::Finished {
            chunks: self.outcomes.len(),
            skipped,
            unresolved_frames: unresolved,
        });
        info!(
            chunks = self.outcomes.len(),
            skipped,
            output_sample_frames = self.state.output_sample_pointer,
            last_written_output_frame = ?self.state.last_written_output_frame,
            unresolved_frames = unresolved,
            "run complete"
        );

        RunReport {
            audio: AudioBuffer::from_interleaved(
                self.output,
                self.audio.channels(),
                self.audio.sample_rate(),
            ),
            outcomes: self.outcomes,
            last_written_output_frame: self.state.last_written_output_frame,
            unresolved_frames: unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remap::FrameWrite;
    use crate::segment::Category;
    use crate::stretch::SpeedTable;

    /// Nearest-neighbour stretcher with exact output length
    /// `floor(input_frames / speed)`.
    struct ExactStretcher;

    impl TimeStretcher for ExactStretcher {
        fn stretch(
            &self,
            samples: &[f32],
            channels: u16,
            _sample_rate: u32,
            speed: f64,
        ) -> Result<Vec<f32>> {
            let ch = channels as usize;
            let in_frames = samples.len() / ch;
            let out_frames = (in_frames as f64 / speed).floor() as usize;
            let mut out = Vec::with_capacity(out_frames * ch);
            for f in 0..out_frames {
                let src = ((f as f64 * speed) as usize).min(in_frames.saturating_sub(1));
                out.extend_from_slice(&samples[src * ch..(src + 1) * ch]);
            }
            Ok(out)
        }
    }

    /// Fails on sounded chunks, stretches silent ones exactly.
    struct FailOnSounded;

    impl TimeStretcher for FailOnSounded {
        fn stretch(
            &self,
            samples: &[f32],
            channels: u16,
            sample_rate: u32,
            speed: f64,
        ) -> Result<Vec<f32>> {
            // Sounded chunks run at unit speed in these tests.
            if speed == 1.0 {
                return Err(TempocutError::Other(anyhow::anyhow!("primitive exploded")));
            }
            ExactStretcher.stretch(samples, channels, sample_rate, speed)
        }
    }

    struct MemFrameStore {
        available: usize,
        writes: Vec<(usize, usize)>,
    }

    impl MemFrameStore {
        fn new(available: usize) -> Self {
            Self {
                available,
                writes: Vec::new(),
            }
        }
    }

    impl FrameStore for MemFrameStore {
        fn materialize(&mut self, input_frame: usize, output_frame: usize) -> Result<FrameWrite> {
            if input_frame >= self.available {
                return Ok(FrameWrite::Missing);
            }
            self.writes.push((input_frame, output_frame));
            Ok(FrameWrite::Done)
        }
    }

    /// 1 s quiet, 1 s loud, 1 s quiet at 1000 samples per second,
    /// 10 samples per video frame → 300 video frames.
    fn quiet_loud_quiet() -> AudioBuffer {
        let mut samples = vec![0.0f32; 1_000];
        samples.extend(vec![0.9f32; 1_000]);
        samples.extend(vec![0.0f32; 1_000]);
        AudioBuffer::from_interleaved(samples, 1, 1_000)
    }

    fn scenario_config() -> EngineConfig {
        EngineConfig {
            silence_threshold: 0.5,
            speeds: SpeedTable {
                sounded: 1.0,
                silent: 5.0,
            },
            frame_margin: 0,
            frame_rate: 100.0, // 10 samples per video frame
            fade_envelope: 4,
            skip_policy: SkipPolicy::GapFill,
            render_workers: 1,
        }
    }

    fn run_scenario(
        config: &EngineConfig,
        stretcher: &dyn TimeStretcher,
        store: &mut MemFrameStore,
    ) -> Result<RunReport> {
        let audio = quiet_loud_quiet();
        run(PipelineContext {
            config,
            audio: &audio,
            stretcher,
            frames: store,
            progress_tx: None,
        })
    }

    #[test]
    fn quiet_loud_quiet_produces_three_retimed_chunks() {
        let config = scenario_config();
        let mut store = MemFrameStore::new(300);
        let report = run_scenario(&config, &ExactStretcher, &mut store).expect("run");

        assert_eq!(report.outcomes.len(), 3);
        let categories: Vec<Category> = report
            .outcomes
            .iter()
            .map(|o| match o {
                ChunkOutcome::Committed { chunk, .. } => chunk.category,
                ChunkOutcome::Skipped { chunk, .. } => chunk.category,
            })
            .collect();
        assert_eq!(
            categories,
            vec![Category::Silent, Category::Sounded, Category::Silent]
        );

        // Silent spans shrink to 1/5, the sounded span keeps its duration
        match &report.outcomes[0] {
            ChunkOutcome::Committed { output_range, .. } => {
                assert_eq!(output_range.clone(), 0..200)
            }
            other => panic!("expected committed chunk, got {other:?}"),
        }
        match &report.outcomes[1] {
            ChunkOutcome::Committed { output_range, .. } => {
                assert_eq!(output_range.clone(), 200..1_200)
            }
            other => panic!("expected committed chunk, got {other:?}"),
        }
        match &report.outcomes[2] {
            ChunkOutcome::Committed { output_range, .. } => {
                assert_eq!(output_range.clone(), 1_200..1_400)
            }
            other => panic!("expected committed chunk, got {other:?}"),
        }

        assert_eq!(report.audio.frame_len(), 1_400);
        // ceil(1400 / 10) = 140 output frames, all materialized
        assert_eq!(report.last_written_output_frame, Some(139));
        assert_eq!(report.unresolved_frames, 0);

        // The image sequence is gap-free
        let mut outputs: Vec<usize> = store.writes.iter().map(|&(_, out)| out).collect();
        outputs.sort_unstable();
        assert_eq!(outputs, (0..140).collect::<Vec<_>>());
    }

    #[test]
    fn gap_fill_keeps_later_chunks_in_sync() {
        let config = scenario_config();
        let mut store = MemFrameStore::new(300);
        let report = run_scenario(&config, &FailOnSounded, &mut store).expect("run");

        match &report.outcomes[1] {
            ChunkOutcome::Skipped {
                reason: SkipReason::Stretch(_),
                gap_frames,
                ..
            } => assert_eq!(*gap_frames, 1_000),
            other => panic!("expected skipped chunk, got {other:?}"),
        }

        // The gap preserves the pointer: the final silent chunk lands where
        // it would have landed on a clean run.
        match &report.outcomes[2] {
            ChunkOutcome::Committed { output_range, .. } => {
                assert_eq!(output_range.clone(), 1_200..1_400)
            }
            other => panic!("expected committed chunk, got {other:?}"),
        }

        // Gap audio is silence
        let samples = report.audio.samples();
        assert!(samples[200..1_200].iter().all(|&s| s == 0.0));

        // Frame sequence still continuous across the gap
        assert_eq!(report.last_written_output_frame, Some(139));
        let mut outputs: Vec<usize> = store.writes.iter().map(|&(_, out)| out).collect();
        outputs.sort_unstable();
        assert_eq!(outputs, (0..140).collect::<Vec<_>>());
    }

    #[test]
    fn fatal_policy_aborts_naming_the_chunk() {
        let mut config = scenario_config();
        config.skip_policy = SkipPolicy::Fatal;
        let mut store = MemFrameStore::new(300);
        let err = run_scenario(&config, &FailOnSounded, &mut store).unwrap_err();

        match err {
            TempocutError::StretchFailed { chunk_index, .. } => assert_eq!(chunk_index, 1),
            other => panic!("expected StretchFailed, got {other:?}"),
        }
    }

    #[test]
    fn parallel_render_matches_sequential_run() {
        // Alternating loud/quiet speech pattern → many chunks
        let mut samples = Vec::new();
        for burst in 0..8 {
            let level = if burst % 2 == 0 { 0.9 } else { 0.0 };
            samples.extend(vec![level; 500]);
        }
        let audio = AudioBuffer::from_interleaved(samples, 1, 1_000);

        let mut config = scenario_config();
        config.render_workers = 1;
        let mut store_seq = MemFrameStore::new(400);
        let sequential = run(PipelineContext {
            config: &config,
            audio: &audio,
            stretcher: &ExactStretcher,
            frames: &mut store_seq,
            progress_tx: None,
        })
        .expect("sequential run");

        config.render_workers = 4;
        let mut store_par = MemFrameStore::new(400);
        let parallel = run(PipelineContext {
            config: &config,
            audio: &audio,
            stretcher: &ExactStretcher,
            frames: &mut store_par,
            progress_tx: None,
        })
        .expect("parallel run");

        assert_eq!(parallel.outcomes, sequential.outcomes);
        assert_eq!(parallel.audio.samples(), sequential.audio.samples());
        assert_eq!(store_par.writes, store_seq.writes);

        // Commit order follows chunk order: output ranges are contiguous
        let mut expected_start = 0usize;
        for outcome in &parallel.outcomes {
            match outcome {
                ChunkOutcome::Committed { output_range, .. } => {
                    assert_eq!(output_range.start, expected_start);
                    expected_start = output_range.end;
                }
                ChunkOutcome::Skipped { .. } => panic!("no chunk should skip"),
            }
        }
    }

    #[test]
    fn extreme_speed_advances_mapping_with_zero_output_frames() {
        let mut config = scenario_config();
        config.speeds.silent = 1_000_000.0;
        let mut store = MemFrameStore::new(300);
        let report = run_scenario(&config, &ExactStretcher, &mut store).expect("run");

        // Silent chunks produce no audio at all; the sounded chunk remains
        match &report.outcomes[0] {
            ChunkOutcome::Committed { output_range, .. } => {
                assert_eq!(output_range.clone(), 0..0)
            }
            other => panic!("expected committed chunk, got {other:?}"),
        }
        assert_eq!(report.audio.frame_len(), 1_000);
        // 100 output frames from the sounded chunk alone
        assert_eq!(report.last_written_output_frame, Some(99));
    }

    #[test]
    fn empty_audio_completes_with_no_chunks() {
        let audio = AudioBuffer::from_interleaved(vec![], 1, 1_000);
        let config = scenario_config();
        let mut store = MemFrameStore::new(0);
        let report = run(PipelineContext {
            config: &config,
            audio: &audio,
            stretcher: &ExactStretcher,
            frames: &mut store,
            progress_tx: None,
        })
        .expect("run");

        assert!(report.outcomes.is_empty());
        assert!(report.audio.is_empty());
        assert_eq!(report.last_written_output_frame, None);
        assert_eq!(report.unresolved_frames, 0);
    }

    #[test]
    fn progress_events_stream_per_chunk_then_finish() {
        let config = scenario_config();
        let audio = quiet_loud_quiet();
        let mut store = MemFrameStore::new(300);
        let (tx, rx) = unbounded();

        run(PipelineContext {
            config: &config,
            audio: &audio,
            stretcher: &ExactStretcher,
            frames: &mut store,
            progress_tx: Some(&tx),
        })
        .expect("run");
        drop(tx);

        let events: Vec<ProgressEvent> = rx.iter().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[0],
            ProgressEvent::ChunkCommitted { index: 0, .. }
        ));
        assert!(matches!(
            events[3],
            ProgressEvent::Finished {
                chunks: 3,
                skipped: 0,
                unresolved_frames: 0,
            }
        ));
    }
}
