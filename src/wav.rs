//! WAV file I/O for training audio and synthesis output.
//!
//! The builder ingests mono or stereo 16-bit PCM; stereo is averaged down to
//! mono. Output is always mono 16-bit PCM at the database sample rate.

use std::path::Path;

use crate::error::{Error, Result};

/// Read a 16-bit PCM WAV file into a mono sample vector.
///
/// Stereo files are averaged channel-pairwise; anything other than 1 or 2
/// channels, or a non-integer/non-16-bit format, is rejected as invalid.
pub fn read_wav(path: &Path) -> Result<Vec<i16>> {
    let mut reader = hound::WavReader::open(path).map_err(|err| match err {
        hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            Error::FileNotFound(path.to_path_buf())
        }
        hound::Error::IoError(io) => Error::Read(io),
        other => Error::InvalidWav(format!("{}: {}", path.display(), other)),
    })?;

    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(Error::InvalidWav(format!(
            "{}: expected 16-bit PCM, got {}-bit {:?}",
            path.display(),
            spec.bits_per_sample,
            spec.sample_format
        )));
    }

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<_, _>>()
        .map_err(|err| Error::InvalidWav(format!("{}: {}", path.display(), err)))?;

    match spec.channels {
        1 => Ok(samples),
        2 => Ok(samples
            .chunks_exact(2)
            .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
            .collect()),
        n => Err(Error::InvalidWav(format!(
            "{}: unsupported channel count {}",
            path.display(),
            n
        ))),
    }
}

/// Write mono 16-bit PCM samples to a WAV file at `sample_rate` Hz.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(to_write_error)?;
    for &s in samples {
        writer.write_sample(s).map_err(to_write_error)?;
    }
    writer.finalize().map_err(to_write_error)
}

fn to_write_error(err: hound::Error) -> Error {
    match err {
        hound::Error::IoError(io) => Error::Write(io),
        other => Error::Write(std::io::Error::other(other.to_string())),
    }
}
