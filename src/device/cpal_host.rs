//! cpal-backed audio device host
//! Adapts cpal's callback-driven streams to the blocking session traits the
//! engines drive from their worker threads.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, Stream, StreamConfig};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

use super::{AudioDeviceHost, AudioInputSession, AudioOutputSession, SessionId};
use crate::audio::{AudioFormat, FRAME_DURATION_MS};
use crate::error::CaptureError;

/// Callback-side buffer cap; older samples are dropped if the reader stalls.
const MAX_BUFFERED_WINDOWS: usize = 50;

pub struct CpalAudioHost {
    host: Host,
}

impl CpalAudioHost {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// One read window's worth of bytes: the device-layer minimum.
    fn window_bytes(format: &AudioFormat) -> usize {
        format.bytes_per_second() * FRAME_DURATION_MS as usize / 1000
    }

    fn stream_config(format: &AudioFormat) -> StreamConfig {
        StreamConfig {
            channels: format.channels.count(),
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        }
    }

    fn input_device(&self) -> Result<Device, CaptureError> {
        self.host
            .default_input_device()
            .ok_or_else(|| CaptureError::HardwareInit("no input device available".into()))
    }

    fn output_device(&self) -> Result<Device, CaptureError> {
        self.host
            .default_output_device()
            .ok_or_else(|| CaptureError::HardwareInit("no output device available".into()))
    }
}

impl Default for CpalAudioHost {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: the host is only used to enumerate and open devices; all mutable
// state lives behind the per-session Mutexes.
unsafe impl Send for CpalAudioHost {}
unsafe impl Sync for CpalAudioHost {}

/// Find a supported sample format for the requested rate and channel count.
fn supported_input_format(
    device: &Device,
    format: &AudioFormat,
) -> Result<SampleFormat, CaptureError> {
    let configs = device
        .supported_input_configs()
        .map_err(|e| CaptureError::HardwareInit(format!("failed to query input configs: {e}")))?;

    pick_format(configs, format)
        .ok_or_else(|| CaptureError::HardwareInit("device does not support 16 kHz mono PCM".into()))
}

fn supported_output_format(
    device: &Device,
    format: &AudioFormat,
) -> Result<SampleFormat, CaptureError> {
    let configs = device
        .supported_output_configs()
        .map_err(|e| CaptureError::HardwareInit(format!("failed to query output configs: {e}")))?;

    pick_format(configs, format)
        .ok_or_else(|| CaptureError::HardwareInit("device does not support 16 kHz mono PCM".into()))
}

fn pick_format(
    configs: impl Iterator<Item = cpal::SupportedStreamConfigRange>,
    format: &AudioFormat,
) -> Option<SampleFormat> {
    let rate = cpal::SampleRate(format.sample_rate);
    let mut fallback = None;
    for range in configs {
        if range.channels() != format.channels.count() {
            continue;
        }
        if range.min_sample_rate() > rate || range.max_sample_rate() < rate {
            continue;
        }
        match range.sample_format() {
            SampleFormat::I16 => return Some(SampleFormat::I16),
            SampleFormat::F32 => fallback = Some(SampleFormat::F32),
            _ => {}
        }
    }
    fallback
}

struct InputShared {
    buffer: Mutex<VecDeque<u8>>,
    available: Condvar,
    failed: Mutex<Option<String>>,
    max_buffered: usize,
}

impl InputShared {
    fn push_samples(&self, samples: &[i16]) {
        let mut buffer = self.buffer.lock();
        for sample in samples {
            buffer.extend(sample.to_le_bytes());
        }
        while buffer.len() > self.max_buffered {
            buffer.pop_front();
        }
        drop(buffer);
        self.available.notify_one();
    }

    fn fail(&self, message: String) {
        *self.failed.lock() = Some(message);
        self.available.notify_all();
    }
}

struct CpalInputSession {
    id: SessionId,
    shared: Arc<InputShared>,
    // Held for its Drop: dropping the stream stops capture.
    _stream: Stream,
}

// Safety: the Stream is never touched after construction; all shared access
// goes through Mutex-protected state.
unsafe impl Send for CpalInputSession {}

impl AudioInputSession for CpalInputSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        let mut buffer = self.shared.buffer.lock();
        loop {
            if let Some(message) = self.shared.failed.lock().take() {
                return Err(CaptureError::Io(message));
            }
            if !buffer.is_empty() {
                break;
            }
            self.shared.available.wait(&mut buffer);
        }

        let n = buf.len().min(buffer.len());
        for (dst, src) in buf.iter_mut().zip(buffer.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

struct CpalOutputSession {
    id: SessionId,
    buffer: Arc<Mutex<VecDeque<u8>>>,
    stream: Option<Stream>,
}

// Safety: as above; the Stream is only dropped, never called across threads.
unsafe impl Send for CpalOutputSession {}

impl AudioOutputSession for CpalOutputSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), CaptureError> {
        if self.stream.is_none() {
            return Err(CaptureError::Io("output session already stopped".into()));
        }
        let mut buffer = self.buffer.lock();
        buffer.extend(buf.iter().copied());
        Ok(())
    }

    fn stop(&mut self) {
        self.stream.take();
        self.buffer.lock().clear();
    }
}

impl AudioDeviceHost for CpalAudioHost {
    fn min_input_buffer_size(&self, format: &AudioFormat) -> Result<usize, CaptureError> {
        let device = self.input_device()?;
        supported_input_format(&device, format)?;
        Ok(Self::window_bytes(format))
    }

    fn open_input(
        &self,
        format: &AudioFormat,
        buffer_size: usize,
    ) -> Result<Box<dyn AudioInputSession>, CaptureError> {
        let device = self.input_device()?;
        let sample_format = supported_input_format(&device, format)?;
        let config = Self::stream_config(format);

        let shared = Arc::new(InputShared {
            buffer: Mutex::new(VecDeque::with_capacity(buffer_size)),
            available: Condvar::new(),
            failed: Mutex::new(None),
            max_buffered: Self::window_bytes(format) * MAX_BUFFERED_WINDOWS,
        });

        let data_shared = shared.clone();
        let err_shared = shared.clone();
        let err_fn = move |err: cpal::StreamError| {
            tracing::error!("audio input error: {err}");
            err_shared.fail(err.to_string());
        };

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    data_shared.push_samples(data);
                },
                err_fn,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    data_shared.push_samples(&samples);
                },
                err_fn,
                None,
            ),
            other => {
                return Err(CaptureError::HardwareInit(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|e| CaptureError::HardwareInit(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| CaptureError::HardwareInit(format!("failed to start stream: {e}")))?;

        let id = SessionId::new();
        tracing::debug!(session = %id, "microphone session opened");

        Ok(Box::new(CpalInputSession {
            id,
            shared,
            _stream: stream,
        }))
    }

    fn min_output_buffer_size(&self, format: &AudioFormat) -> Result<usize, CaptureError> {
        let device = self.output_device()?;
        supported_output_format(&device, format)?;
        Ok(Self::window_bytes(format))
    }

    fn open_output(
        &self,
        format: &AudioFormat,
        buffer_size: usize,
    ) -> Result<Box<dyn AudioOutputSession>, CaptureError> {
        let device = self.output_device()?;
        let sample_format = supported_output_format(&device, format)?;
        let config = Self::stream_config(format);

        let buffer: Arc<Mutex<VecDeque<u8>>> =
            Arc::new(Mutex::new(VecDeque::with_capacity(buffer_size)));

        let err_fn = |err: cpal::StreamError| {
            tracing::error!("audio output error: {err}");
        };

        let data_buffer = buffer.clone();
        let stream = match sample_format {
            SampleFormat::I16 => device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let mut queued = data_buffer.lock();
                    for sample in data.iter_mut() {
                        *sample = pop_sample(&mut queued).unwrap_or(0);
                    }
                },
                err_fn,
                None,
            ),
            SampleFormat::F32 => device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queued = data_buffer.lock();
                    for sample in data.iter_mut() {
                        *sample = pop_sample(&mut queued)
                            .map(|s| s as f32 / i16::MAX as f32)
                            .unwrap_or(0.0);
                    }
                },
                err_fn,
                None,
            ),
            other => {
                return Err(CaptureError::HardwareInit(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|e| CaptureError::HardwareInit(format!("failed to build output stream: {e}")))?;

        stream
            .play()
            .map_err(|e| CaptureError::HardwareInit(format!("failed to start stream: {e}")))?;

        let id = SessionId::new();
        tracing::debug!(session = %id, "output session opened");

        Ok(Box::new(CpalOutputSession {
            id,
            buffer,
            stream: Some(stream),
        }))
    }
}

/// Pop one little-endian 16-bit sample, or None if fewer than two bytes
/// remain queued.
fn pop_sample(queued: &mut VecDeque<u8>) -> Option<i16> {
    if queued.len() < 2 {
        return None;
    }
    let lo = queued.pop_front()?;
    let hi = queued.pop_front()?;
    Some(i16::from_le_bytes([lo, hi]))
}
