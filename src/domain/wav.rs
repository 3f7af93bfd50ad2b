//! WAV wrapping for raw PCM returned by speech models.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// Highest sample rate accepted from a MIME type.
const MAX_RATE: u32 = 384_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub bits_per_sample: u16,
    pub rate: u32,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            bits_per_sample: 16,
            rate: 24_000,
        }
    }
}

/// Read sample size and rate from a MIME type such as `audio/L16;codec=pcm;rate=24000`.
/// Values hound cannot write fall back to the defaults.
pub fn parse_audio_mime(mime: &str) -> PcmFormat {
    let mut format = PcmFormat::default();
    for param in mime.split(';').map(str::trim) {
        if param.to_lowercase().starts_with("rate=") {
            if let Some(Ok(rate)) = param.split_once('=').map(|(_, v)| v.trim().parse::<u32>()) {
                if (1..=MAX_RATE).contains(&rate) {
                    format.rate = rate;
                }
            }
        } else if let Some(bits) = param.strip_prefix("audio/L") {
            if let Ok(bits @ (8 | 16 | 24 | 32)) = bits.parse::<u16>() {
                format.bits_per_sample = bits;
            }
        }
    }
    format
}

/// Whether the payload is headerless PCM that needs [`pcm_to_wav`].
pub fn is_raw_pcm(mime: &str) -> bool {
    let base = mime.split(';').next().unwrap_or("").trim().to_lowercase();
    base.starts_with("audio/l") || base == "audio/pcm"
}

/// Encode little-endian mono PCM as a WAV file. A trailing partial sample is dropped.
pub fn pcm_to_wav(data: &[u8], mime: &str) -> Result<Vec<u8>, hound::Error> {
    let format = parse_audio_mime(mime);
    let spec = WavSpec {
        channels: 1,
        sample_rate: format.rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + data.len()));
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    let width = usize::from(format.bits_per_sample / 8);
    for sample in data.chunks_exact(width) {
        match sample {
            [a] => writer.write_sample(*a as i8)?,
            [a, b] => writer.write_sample(i16::from_le_bytes([*a, *b]))?,
            [a, b, c] => writer.write_sample(i32::from_le_bytes([0, *a, *b, *c]) >> 8)?,
            [a, b, c, d] => writer.write_sample(i32::from_le_bytes([*a, *b, *c, *d]))?,
            _ => return Err(hound::Error::Unsupported),
        }
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}
