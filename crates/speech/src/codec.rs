//! Binary audio codec
//!
//! Pure functions converting between float sample buffers and an
//! uncompressed RIFF/WAVE container (16-bit linear PCM, little-endian).
//! Compressed formats from the remote tier are handed to the platform
//! decoder; this codec owns only the uncompressed container.

use crate::error::SpeechError;

/// Fixed WAV header size in bytes
const HEADER_LEN: usize = 44;

/// Audio decoded from a WAV container
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples normalized to [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
}

/// Encode interleaved float samples into a WAV container
///
/// Samples are clamped to [-1, 1]; negative values scale by 32768 and
/// non-negative values by 32767 into 16-bit PCM.
///
/// # Errors
///
/// Returns `EncodeFailure` for a zero sample rate, zero channels, a buffer
/// whose length is not a multiple of the channel count, or a buffer too
/// large for the 32-bit chunk sizes.
pub fn encode_wav(
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<Vec<u8>, SpeechError> {
    if sample_rate == 0 {
        return Err(SpeechError::EncodeFailure(
            "sample rate must be greater than 0".to_string(),
        ));
    }
    if channels == 0 {
        return Err(SpeechError::EncodeFailure(
            "channel count must be greater than 0".to_string(),
        ));
    }
    if samples.len() % usize::from(channels) != 0 {
        return Err(SpeechError::EncodeFailure(format!(
            "buffer of {} samples is not a whole number of {}-channel frames",
            samples.len(),
            channels
        )));
    }

    let data_len = u32::try_from(samples.len() * 2)
        .map_err(|_| SpeechError::EncodeFailure("buffer too large for WAV".to_string()))?;
    let byte_rate = sample_rate * u32::from(channels) * 2;
    let block_align = channels * 2;

    let mut out = Vec::with_capacity(HEADER_LEN + samples.len() * 2);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // linear PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for &sample in samples {
        out.extend_from_slice(&pcm16_from_f32(sample).to_le_bytes());
    }

    Ok(out)
}

/// Decode a WAV container produced by [`encode_wav`]
///
/// Strictly validates the fixed header layout; arbitrary externally-produced
/// audio belongs to the platform decoder, not this function.
///
/// # Errors
///
/// Returns `DecodeFailure` when the container deviates from the layout this
/// codec emits.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, SpeechError> {
    if bytes.len() < HEADER_LEN {
        return Err(decode_err(format!(
            "container of {} bytes is shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }

    expect_tag(bytes, 0, b"RIFF")?;
    expect_tag(bytes, 8, b"WAVE")?;
    expect_tag(bytes, 12, b"fmt ")?;
    expect_tag(bytes, 36, b"data")?;

    if read_u32(bytes, 16) != 16 {
        return Err(decode_err("unexpected fmt sub-chunk size".to_string()));
    }
    if read_u16(bytes, 20) != 1 {
        return Err(decode_err("not linear PCM".to_string()));
    }
    if read_u16(bytes, 34) != 16 {
        return Err(decode_err("not 16 bits per sample".to_string()));
    }

    let channels = read_u16(bytes, 22);
    if channels == 0 {
        return Err(decode_err("zero channel count".to_string()));
    }

    let sample_rate = read_u32(bytes, 24);
    if sample_rate == 0 {
        return Err(decode_err("zero sample rate".to_string()));
    }

    let data_len = read_u32(bytes, 40) as usize;
    if data_len % 2 != 0 || (data_len / 2) % usize::from(channels) != 0 {
        return Err(decode_err("data length is not whole frames".to_string()));
    }
    if bytes.len() < HEADER_LEN + data_len {
        return Err(decode_err("data sub-chunk is truncated".to_string()));
    }

    let samples = bytes[HEADER_LEN..HEADER_LEN + data_len]
        .chunks_exact(2)
        .map(|pair| f32_from_pcm16(i16::from_le_bytes([pair[0], pair[1]])))
        .collect();

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Quantize one float sample to 16-bit PCM with asymmetric scaling
#[allow(clippy::cast_possible_truncation)]
fn pcm16_from_f32(sample: f32) -> i16 {
    let clamped = if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    };
    if clamped < 0.0 {
        (clamped * 32768.0).round().clamp(-32768.0, 0.0) as i16
    } else {
        (clamped * 32767.0).round() as i16
    }
}

/// Inverse of [`pcm16_from_f32`]
fn f32_from_pcm16(value: i16) -> f32 {
    if value < 0 {
        f32::from(value) / 32768.0
    } else {
        f32::from(value) / 32767.0
    }
}

fn expect_tag(bytes: &[u8], offset: usize, tag: &[u8; 4]) -> Result<(), SpeechError> {
    if &bytes[offset..offset + 4] == tag {
        Ok(())
    } else {
        Err(decode_err(format!(
            "missing {:?} tag at offset {offset}",
            String::from_utf8_lossy(tag)
        )))
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn decode_err(message: String) -> SpeechError {
    SpeechError::DecodeFailure(message)
}
