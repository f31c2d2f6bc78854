//! Directory-backed numbered frame store.
//!
//! The extractor writes source frames as 1-based `frame%06d.jpg`; the
//! engine addresses frames 0-based. Materializing copies the source image
//! under the 1-based `newFrame%06d.jpg` output name the muxer consumes.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use tempocut_core::error::Result;
use tempocut_core::remap::{FrameStore, FrameWrite};

/// Frame store over the working directory's numbered JPEG files.
pub struct DirFrameStore {
    work_dir: PathBuf,
}

impl DirFrameStore {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    fn source_path(&self, input_frame: usize) -> PathBuf {
        self.work_dir.join(format!("frame{:06}.jpg", input_frame + 1))
    }

    fn output_path(&self, output_frame: usize) -> PathBuf {
        self.work_dir
            .join(format!("newFrame{:06}.jpg", output_frame + 1))
    }
}

impl FrameStore for DirFrameStore {
    fn materialize(&mut self, input_frame: usize, output_frame: usize) -> Result<FrameWrite> {
        let source = self.source_path(input_frame);
        if !source.is_file() {
            return Ok(FrameWrite::Missing);
        }
        fs::copy(&source, self.output_path(output_frame))?;
        debug!(input_frame, output_frame, "frame materialized");
        Ok(FrameWrite::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copies_source_frame_under_output_name() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("frame000005.jpg"), b"jpeg bytes").expect("seed frame");

        let mut store = DirFrameStore::new(dir.path());
        let write = store.materialize(4, 0).expect("materialize");

        assert_eq!(write, FrameWrite::Done);
        let copied = fs::read(dir.path().join("newFrame000001.jpg")).expect("output frame");
        assert_eq!(copied, b"jpeg bytes");
    }

    #[test]
    fn missing_source_reports_missing_without_output() {
        let dir = tempdir().expect("tempdir");
        let mut store = DirFrameStore::new(dir.path());

        let write = store.materialize(41, 7).expect("materialize");

        assert_eq!(write, FrameWrite::Missing);
        assert!(!dir.path().join("newFrame000008.jpg").exists());
    }

    #[test]
    fn same_source_can_fill_many_output_slots() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("frame000001.jpg"), b"first").expect("seed frame");

        let mut store = DirFrameStore::new(dir.path());
        for output_frame in 0..3 {
            assert_eq!(
                store.materialize(0, output_frame).expect("materialize"),
                FrameWrite::Done
            );
        }

        for name in ["newFrame000001.jpg", "newFrame000002.jpg", "newFrame000003.jpg"] {
            assert_eq!(fs::read(dir.path().join(name)).expect("output"), b"first");
        }
    }
}
