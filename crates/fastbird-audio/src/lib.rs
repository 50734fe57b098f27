//! Speech audio pipeline: base64 PCM16 decoding and speaker playback.

pub mod pcm;
pub mod playback;

pub use pcm::{decode_pcm16, decode_pcm16_base64, AudioDecodeError, SampleBuffer, SAMPLE_RATE};
pub use playback::{AudioError, AudioOutput};
