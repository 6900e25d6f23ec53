use std::fs::File;
use std::io::{Cursor, ErrorKind};
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported or corrupt audio: {0}")]
    Probe(String),
    #[error("Audio contains no decodable track")]
    NoTrack,
    #[error("Track is missing a sample rate")]
    NoSampleRate,
    #[error("Decoder error: {0}")]
    Codec(String),
    #[error("Audio produced no samples")]
    Empty,
}

/// Decoded mono waveform.
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

/// Decode an audio file on disk, downmixing to mono at the native rate.
pub fn load_file(path: &Path) -> Result<MonoAudio, DecodeError> {
    let file = File::open(path)?;
    let ext = path.extension().and_then(|e| e.to_str());
    decode_source(Box::new(file), ext)
}

/// Decode an in-memory byte stream (e.g. a streamed preview clip).
pub fn load_bytes(data: Vec<u8>, ext_hint: Option<&str>) -> Result<MonoAudio, DecodeError> {
    decode_source(Box::new(Cursor::new(data)), ext_hint)
}

fn decode_source(source: Box<dyn MediaSource>, ext_hint: Option<&str>) -> Result<MonoAudio, DecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = ext_hint {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Probe(e.to_string()))?;
    let mut format = probed.format;

    let track = format.default_track().ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or(DecodeError::NoSampleRate)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(buffer) => {
                let spec = *buffer.spec();
                let channels = spec.channels.count();
                if channels == 0 {
                    continue;
                }
                let mut sample_buf = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(buffer);
                downmix_into(sample_buf.samples(), channels, &mut samples);
            }
            // A corrupt packet is skipped, the rest of the stream is still usable
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {msg}");
            }
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(MonoAudio { samples, sample_rate })
}

/// Average interleaved channels into mono samples.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}
