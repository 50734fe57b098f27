//! PCM16 decoding: turns the synthesis payload into playable samples.
//!
//! The speech service returns base64-encoded little-endian signed 16-bit
//! PCM, mono, 24 kHz. Decoding normalizes each sample to `[-1, 1)` by
//! dividing by 32768; a trailing odd byte is an incomplete sample and is
//! dropped without error.

use thiserror::Error;

/// Sample rate of all synthesized speech.
pub const SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, Error)]
pub enum AudioDecodeError {
    #[error("invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// An in-memory mono sample buffer. Created per utterance, discarded after
/// playback starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }
}

/// Decode a base64 PCM16 payload into a 24 kHz mono buffer.
pub fn decode_pcm16_base64(payload: &str) -> Result<SampleBuffer, AudioDecodeError> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload)?;
    Ok(decode_pcm16(&bytes))
}

/// Decode raw little-endian PCM16 bytes into a 24 kHz mono buffer.
pub fn decode_pcm16(bytes: &[u8]) -> SampleBuffer {
    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();
    SampleBuffer::new(samples, SAMPLE_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn encode(samples: &[i16]) -> String {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_round_trip_within_quantization_bound() {
        let samples: Vec<i16> = vec![0, 1, -1, 100, -100, 12345, -12345, i16::MAX, i16::MIN];
        let buffer = decode_pcm16_base64(&encode(&samples)).unwrap();
        assert_eq!(buffer.len(), samples.len());
        for (float, int) in buffer.samples().iter().zip(&samples) {
            let expected = *int as f32 / 32768.0;
            assert!((float - expected).abs() <= 1.0 / 32768.0);
            assert!((-1.0..1.0).contains(float) || *int == i16::MIN);
        }
    }

    #[test]
    fn test_odd_byte_count_drops_trailing_byte() {
        let bytes = [0x10, 0x20, 0x30, 0x40, 0x55];
        let buffer = decode_pcm16(&bytes);
        assert_eq!(buffer.len(), 2);
        assert_eq!(
            buffer.samples()[0],
            i16::from_le_bytes([0x10, 0x20]) as f32 / 32768.0
        );
    }

    #[test]
    fn test_empty_payload() {
        let buffer = decode_pcm16_base64("").unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration_ms(), 0);
    }

    #[test]
    fn test_invalid_base64_is_an_error() {
        assert!(decode_pcm16_base64("not base64 😀").is_err());
    }

    #[test]
    fn test_duration() {
        let buffer = SampleBuffer::new(vec![0.0; 24_000], SAMPLE_RATE);
        assert_eq!(buffer.duration_ms(), 1000);
        let buffer = SampleBuffer::new(vec![0.0; 12_000], SAMPLE_RATE);
        assert_eq!(buffer.duration_ms(), 500);
    }
}
