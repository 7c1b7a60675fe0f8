//! Audio playback engine
//! Renders a complete in-memory buffer to the output device and suspends the
//! caller for the duration derived from the byte count, instead of trusting a
//! hardware completion callback.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::AudioFormat;
use crate::device::{AudioDeviceHost, AudioOutputSession};
use crate::error::CaptureError;

pub struct AudioPlaybackEngine {
    host: Arc<dyn AudioDeviceHost>,
    format: AudioFormat,
    session: Arc<Mutex<Option<Box<dyn AudioOutputSession>>>>,
    /// Notify for the playback in flight; present only while playing.
    stop_signal: Mutex<Option<Arc<Notify>>>,
}

impl AudioPlaybackEngine {
    pub fn new(host: Arc<dyn AudioDeviceHost>) -> Self {
        Self {
            host,
            format: AudioFormat::capture(),
            session: Arc::new(Mutex::new(None)),
            stop_signal: Mutex::new(None),
        }
    }

    /// How long the given buffer takes to render at the fixed format.
    fn render_duration(&self, byte_len: usize) -> Duration {
        Duration::from_secs_f64(byte_len as f64 / self.format.bytes_per_second() as f64)
    }

    /// Render `bytes` to the output device. Suspends until the derived
    /// duration has elapsed or `stop_playback` interrupts it. The output
    /// session is released on every exit path.
    pub async fn play_audio(&self, bytes: Vec<u8>) -> Result<(), CaptureError> {
        let stop = {
            let mut signal = self.stop_signal.lock();
            if signal.is_some() {
                return Err(CaptureError::AlreadyActive("playback"));
            }
            let stop = Arc::new(Notify::new());
            *signal = Some(stop.clone());
            stop
        };

        let result = self.run_playback(bytes, stop).await;

        // Teardown runs whether the write failed, the wait completed, or
        // stop_playback fired first.
        if let Some(mut session) = self.session.lock().take() {
            session.stop();
        }
        *self.stop_signal.lock() = None;

        result
    }

    async fn run_playback(&self, bytes: Vec<u8>, stop: Arc<Notify>) -> Result<(), CaptureError> {
        let min_size = self.host.min_output_buffer_size(&self.format)?;
        let session = self.host.open_output(&self.format, min_size * 2)?;

        tracing::info!(
            session = %session.id(),
            bytes = bytes.len(),
            "playback started"
        );

        *self.session.lock() = Some(session);

        let wait = self.render_duration(bytes.len());

        // Streaming write off the async context.
        let shared = self.session.clone();
        let written: Result<bool, CaptureError> = tokio::task::spawn_blocking(move || {
            let mut guard = shared.lock();
            match guard.as_mut() {
                // stop_playback got here first
                None => Ok(false),
                Some(session) => session.write(&bytes).map(|()| true),
            }
        })
        .await
        .map_err(|e| CaptureError::Io(e.to_string()))?;

        if !written? {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                tracing::debug!("playback completed");
            }
            _ = stop.notified() => {
                tracing::debug!("playback interrupted");
            }
        }

        Ok(())
    }

    /// Interrupt any in-flight wait and release the output session.
    /// Idempotent; a no-op when nothing is playing.
    pub fn stop_playback(&self) {
        if let Some(stop) = self.stop_signal.lock().take() {
            stop.notify_one();
        }
        if let Some(mut session) = self.session.lock().take() {
            session.stop();
            tracing::info!("playback stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::AudioInputSession;

    struct NullHost;

    impl AudioDeviceHost for NullHost {
        fn min_input_buffer_size(&self, _: &AudioFormat) -> Result<usize, CaptureError> {
            Ok(crate::audio::FRAME_BYTES)
        }

        fn open_input(
            &self,
            _: &AudioFormat,
            _: usize,
        ) -> Result<Box<dyn AudioInputSession>, CaptureError> {
            Err(CaptureError::HardwareInit("no input".into()))
        }

        fn min_output_buffer_size(&self, _: &AudioFormat) -> Result<usize, CaptureError> {
            Ok(crate::audio::FRAME_BYTES)
        }

        fn open_output(
            &self,
            _: &AudioFormat,
            _: usize,
        ) -> Result<Box<dyn AudioOutputSession>, CaptureError> {
            Err(CaptureError::HardwareInit("no output".into()))
        }
    }

    #[test]
    fn one_second_of_pcm_waits_one_second() {
        let engine = AudioPlaybackEngine::new(Arc::new(NullHost));
        // 32_000 bytes at 16 kHz mono 16-bit = exactly one second
        assert_eq!(engine.render_duration(32_000), Duration::from_secs(1));
        assert_eq!(engine.render_duration(16_000), Duration::from_millis(500));
        assert_eq!(engine.render_duration(0), Duration::ZERO);
    }

    #[tokio::test]
    async fn stop_playback_with_nothing_playing_is_a_no_op() {
        let engine = AudioPlaybackEngine::new(Arc::new(NullHost));
        engine.stop_playback();
        engine.stop_playback();
    }

    #[tokio::test]
    async fn open_failure_propagates_and_leaves_no_session() {
        let engine = AudioPlaybackEngine::new(Arc::new(NullHost));
        let err = engine.play_audio(vec![0u8; 64]).await.unwrap_err();
        assert!(matches!(err, CaptureError::HardwareInit(_)));
        assert!(engine.session.lock().is_none());
        assert!(engine.stop_signal.lock().is_none());
    }
}
