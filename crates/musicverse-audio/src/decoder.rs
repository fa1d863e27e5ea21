//! Audio decoding seam.
//!
//! Peak extraction only needs mono PCM. Decoders hand back the first
//! channel of the source plus its format metadata.

use musicverse_core::{Result, StudioError};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Decoded PCM audio, first channel only.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Source sample rate.
    pub sample_rate: u32,
    /// Channel count of the source before extraction.
    pub channels: u16,
}

impl DecodedAudio {
    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Turns an encoded audio resource into PCM samples.
pub trait AudioDecoder: Send + Sync {
    /// Decode an in-memory resource. Failures are `StudioError::AudioDecode`.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio>;

    /// Read and decode a file.
    fn decode_file(&self, path: &Path) -> Result<DecodedAudio> {
        let bytes = std::fs::read(path)?;
        self.decode(&bytes)
    }
}

/// WAV decoder backed by `hound`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio> {
        let reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| StudioError::AudioDecode(format!("Failed to read WAV header: {}", e)))?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(StudioError::AudioDecode("WAV file has no channels".into()));
        }
        let stride = spec.channels as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| StudioError::AudioDecode(format!("Bad float sample: {}", e)))?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(StudioError::AudioDecode(format!(
                        "Unsupported bit depth: {}",
                        spec.bits_per_sample
                    )));
                }
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| StudioError::AudioDecode(format!("Bad int sample: {}", e)))?
            }
        };

        let samples: Vec<f32> = interleaved.into_iter().step_by(stride).collect();
        debug!(
            frames = samples.len(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            "Decoded WAV"
        );

        Ok(DecodedAudio {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        })
    }
}
