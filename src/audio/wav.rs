//! RIFF/WAVE decoding for the native soundtrack
//!
//! Handles integer PCM (8/16/24/32-bit) and 32-bit IEEE float, including the
//! WAVE_FORMAT_EXTENSIBLE wrapper. Samples come out interleaved in -1..1.

use thiserror::Error;

const FORMAT_PCM: u16 = 1;
const FORMAT_FLOAT: u16 = 3;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WavError {
    #[error("not a RIFF/WAVE file")]
    NotWave,
    #[error("missing '{0}' chunk")]
    MissingChunk(&'static str),
    #[error("unsupported sample format (tag {format}, {bits} bits)")]
    Unsupported { format: u16, bits: u16 },
    #[error("malformed format chunk")]
    BadFormat,
}

/// Decoded audio
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples
    pub samples: Vec<f32>,
}

impl Pcm {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.max(1) as f64
    }

    /// Sample of `channel` at frame `frame`; the last channel is reused for
    /// missing ones so mono plays on both speakers
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.channels.max(1) as usize;
        let c = channel.min(channels - 1);
        self.samples.get(frame * channels + c).copied().unwrap_or(0.0)
    }
}

fn u16_at(b: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(b.get(at..at + 2)?.try_into().ok()?))
}

fn u32_at(b: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(b.get(at..at + 4)?.try_into().ok()?))
}

struct Format {
    tag: u16,
    channels: u16,
    sample_rate: u32,
    bits: u16,
}

fn parse_format(chunk: &[u8]) -> Result<Format, WavError> {
    let mut tag = u16_at(chunk, 0).ok_or(WavError::BadFormat)?;
    let channels = u16_at(chunk, 2).ok_or(WavError::BadFormat)?;
    let sample_rate = u32_at(chunk, 4).ok_or(WavError::BadFormat)?;
    let bits = u16_at(chunk, 14).ok_or(WavError::BadFormat)?;
    if tag == FORMAT_EXTENSIBLE {
        // First two bytes of the SubFormat GUID carry the real tag
        tag = u16_at(chunk, 24).ok_or(WavError::BadFormat)?;
    }
    if channels == 0 || sample_rate == 0 {
        return Err(WavError::BadFormat);
    }
    Ok(Format { tag, channels, sample_rate, bits })
}

fn convert(format: &Format, data: &[u8]) -> Result<Vec<f32>, WavError> {
    let samples = match (format.tag, format.bits) {
        (FORMAT_PCM, 8) => data.iter().map(|&b| (b as f32 - 128.0) / 128.0).collect(),
        (FORMAT_PCM, 16) => data
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
            .collect(),
        (FORMAT_PCM, 24) => data
            .chunks_exact(3)
            .map(|c| {
                let v = i32::from_le_bytes([0, c[0], c[1], c[2]]) >> 8;
                v as f32 / 8_388_608.0
            })
            .collect(),
        (FORMAT_PCM, 32) => data
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32 / 2_147_483_648.0)
            .collect(),
        (FORMAT_FLOAT, 32) => data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]).clamp(-1.0, 1.0))
            .collect(),
        (format, bits) => return Err(WavError::Unsupported { format, bits }),
    };
    Ok(samples)
}

/// Decode a complete WAV file held in memory
pub fn decode(bytes: &[u8]) -> Result<Pcm, WavError> {
    if bytes.get(0..4) != Some(&b"RIFF"[..]) || bytes.get(8..12) != Some(&b"WAVE"[..]) {
        return Err(WavError::NotWave);
    }

    let mut format = None;
    let mut data = None;
    let mut at = 12;
    while let (Some(id), Some(len)) = (bytes.get(at..at + 4), u32_at(bytes, at + 4)) {
        let start = at + 8;
        // Tolerate a data chunk whose declared length runs past the end
        let end = (start + len as usize).min(bytes.len());
        let body = &bytes[start..end];
        match id {
            b"fmt " => format = Some(parse_format(body)?),
            b"data" => data = Some(body),
            _ => {}
        }
        // Chunks are word aligned
        at = start + len as usize + (len as usize & 1);
    }

    let format = format.ok_or(WavError::MissingChunk("fmt "))?;
    let data = data.ok_or(WavError::MissingChunk("data"))?;
    let samples = convert(&format, data)?;
    Ok(Pcm {
        sample_rate: format.sample_rate,
        channels: format.channels,
        samples,
    })
}
