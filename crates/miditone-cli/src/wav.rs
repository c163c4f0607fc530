//! WAV reading and writing with `hound`.

use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Write per-channel buffers as an interleaved 32-bit float WAV.
pub fn write_channels(path: &Path, channels: &[Vec<f32>], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("creating '{}'", path.display()))?;

    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    for frame in 0..frames {
        for channel in channels {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Read a WAV file into `channels` float buffers.
///
/// Integer files are scaled to `[-1, 1)`. A mono file feeds every output
/// channel; otherwise output channel `c` reads file channel `c % n`.
pub fn read_channels(path: &Path, channels: usize) -> Result<(Vec<Vec<f32>>, u32)> {
    let reader =
        WavReader::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    let spec = reader.spec();
    let file_channels = usize::from(spec.channels.max(1));

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let decoded: Vec<Vec<f32>> = (0..file_channels)
        .map(|c| {
            samples
                .iter()
                .skip(c)
                .step_by(file_channels)
                .copied()
                .collect()
        })
        .collect();
    let mapped = (0..channels)
        .map(|c| decoded[c % file_channels].clone())
        .collect();
    Ok((mapped, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_roundtrip_keeps_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let channels = vec![vec![0.1, 0.2, 0.3], vec![-0.1, -0.2, -0.3]];
        write_channels(&path, &channels, 48000).unwrap();

        let (read, rate) = read_channels(&path, 2).unwrap();
        assert_eq!(rate, 48000);
        assert_eq!(read, channels);
    }

    #[test]
    fn mono_file_feeds_every_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_channels(&path, &[vec![0.5, -0.5]], 44100).unwrap();

        let (read, _) = read_channels(&path, 3).unwrap();
        assert_eq!(read.len(), 3);
        assert!(read.iter().all(|ch| ch == &[0.5, -0.5]));
    }
}
