//! WAV decode/encode between disk and `AudioBuffer`.
//!
//! The extracted audio track arrives as a WAV file (see [`crate::ffmpeg`]);
//! this module loads it into the engine's interleaved f32 buffer and writes
//! the re-timed result back out as 16-bit PCM for muxing.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use tempocut_core::audio::AudioBuffer;

use crate::error::{MediaError, MediaResult};

/// Read a WAV file into an interleaved `AudioBuffer`.
///
/// Integer PCM (up to 32-bit) is scaled to `[-1, 1]`; float PCM is taken
/// as-is. Channel order is preserved.
pub fn read_wav(path: &Path) -> MediaResult<AudioBuffer> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(MediaError::MalformedWav {
            path: path.to_path_buf(),
            reason: "zero channels".into(),
        });
    }

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    debug!(
        path = %path.display(),
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        samples = samples.len(),
        "WAV loaded"
    );

    Ok(AudioBuffer::from_interleaved(
        samples,
        spec.channels,
        spec.sample_rate,
    ))
}

/// Write an `AudioBuffer` as 16-bit integer PCM.
pub fn write_wav(path: &Path, audio: &AudioBuffer) -> MediaResult<()> {
    let spec = WavSpec {
        channels: audio.channels(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in audio.samples() {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;

    debug!(path = %path.display(), frames = audio.frame_len(), "WAV written");
    Ok(())
}
