//! Fire-and-forget speech playback via cpal.
//!
//! One output context per process, constructed lazily on the first
//! utterance and reused for every following one. Each utterance runs on
//! its own detached stream; playback is never tracked or cancelled, and
//! overlapping utterances are allowed to play simultaneously.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::pcm::SampleBuffer;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio output error: {0}")]
    Output(String),
}

struct OutputContext {
    device: cpal::Device,
    config: StreamConfig,
}

/// The process-lifetime audio output resource.
///
/// Construction is cheap and touches no device; the device and stream
/// config are resolved on first [`AudioOutput::play`] under a mutex, so
/// two near-simultaneous utterances still construct the context once.
/// [`AudioOutput::close`] releases the device for test teardown.
pub struct AudioOutput {
    preferred_device: Option<String>,
    inner: Mutex<Option<OutputContext>>,
}

impl AudioOutput {
    pub fn new(preferred_device: Option<String>) -> Self {
        Self {
            preferred_device,
            inner: Mutex::new(None),
        }
    }

    /// Whether the output context has been constructed.
    pub fn is_open(&self) -> bool {
        self.inner.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    /// Release the output context. The next `play` re-resolves the device.
    pub fn close(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = None;
        }
    }

    fn ensure_context(&self) -> Result<(cpal::Device, StreamConfig), AudioError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| AudioError::Output("output context lock poisoned".into()))?;

        if let Some(ctx) = guard.as_ref() {
            return Ok((ctx.device.clone(), ctx.config.clone()));
        }

        let host = cpal::default_host();
        let device = match &self.preferred_device {
            Some(name) => host
                .output_devices()
                .map_err(|e| AudioError::Output(format!("cannot enumerate devices: {e}")))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| AudioError::Output(format!("output device '{name}' not found")))?,
            None => host
                .default_output_device()
                .ok_or_else(|| AudioError::Output("no default output device".into()))?,
        };

        let device_name = device.name().unwrap_or_else(|_| "<unknown>".into());
        info!("using output device: {device_name}");

        let config = StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(crate::pcm::SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let pair = (device.clone(), config.clone());
        *guard = Some(OutputContext { device, config });
        Ok(pair)
    }

    /// Start playing a decoded utterance and return immediately.
    ///
    /// The buffer is handed to a detached thread that owns the stream
    /// until the samples drain. Errors after the thread starts are logged,
    /// not surfaced.
    pub fn play(&self, buffer: SampleBuffer) -> Result<(), AudioError> {
        if buffer.is_empty() {
            return Ok(());
        }
        let (device, config) = self.ensure_context()?;

        std::thread::Builder::new()
            .name("fastbird-playback".into())
            .spawn(move || {
                if let Err(e) = run_stream(&device, &config, buffer) {
                    warn!(%e, "Speech playback failed");
                }
            })
            .map_err(|e| AudioError::Output(e.to_string()))?;
        Ok(())
    }
}

struct PlaybackCursor {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}

fn run_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    buffer: SampleBuffer,
) -> Result<(), AudioError> {
    let cursor = Arc::new(Mutex::new(PlaybackCursor {
        samples: buffer.into_samples(),
        position: 0,
        finished: false,
    }));
    let cb_cursor = Arc::clone(&cursor);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut cur = match cb_cursor.lock() {
                    Ok(c) => c,
                    Err(_) => return,
                };
                for sample in data.iter_mut() {
                    if cur.position < cur.samples.len() {
                        *sample = cur.samples[cur.position];
                        cur.position += 1;
                    } else {
                        *sample = 0.0;
                        cur.finished = true;
                    }
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
            },
            None,
        )
        .map_err(|e| AudioError::Output(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| AudioError::Output(format!("failed to start output stream: {e}")))?;

    // Keep the stream alive until the samples drain.
    loop {
        std::thread::sleep(Duration::from_millis(10));
        let finished = cursor.lock().map(|c| c.finished).unwrap_or(true);
        if finished {
            break;
        }
    }
    // Let the device flush its last buffer before dropping the stream.
    std::thread::sleep(Duration::from_millis(50));
    drop(stream);
    Ok(())
}
