//! Single entry point for the UI layer
//! One facade = one capture session scope: it owns one instance of each
//! engine and delegates commands without adding behavior of its own.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::audio::{
    AmplitudeMonitor, AudioCaptureEngine, AudioFrame, AudioPlaybackEngine, RecordingState,
};
use crate::camera::{CameraPipeline, CameraState, CaptureResult, FlashMode, LensFacing};
use crate::device::camera::{CameraProvider, PreviewSurface};
use crate::device::AudioDeviceHost;
use crate::error::{CaptureError, PermissionChecker};
use crate::storage::MediaStore;

pub struct MediaCaptureFacade {
    capture: AudioCaptureEngine,
    playback: AudioPlaybackEngine,
    amplitude: AmplitudeMonitor,
    camera: CameraPipeline,
    store: MediaStore,
}

impl MediaCaptureFacade {
    pub fn new(
        audio_host: Arc<dyn AudioDeviceHost>,
        camera_provider: Arc<dyn CameraProvider>,
        permissions: Arc<dyn PermissionChecker>,
        store: MediaStore,
    ) -> Self {
        let capture = AudioCaptureEngine::new(audio_host.clone(), permissions.clone());
        let amplitude = AmplitudeMonitor::new(&capture);
        Self {
            capture,
            playback: AudioPlaybackEngine::new(audio_host),
            amplitude,
            camera: CameraPipeline::new(camera_provider, permissions, store.clone()),
            store,
        }
    }

    // --- audio ---

    pub async fn start_recording(
        &self,
    ) -> Result<mpsc::Receiver<Result<AudioFrame, CaptureError>>, CaptureError> {
        self.capture.start_recording().await
    }

    pub fn stop_recording(&self) {
        self.capture.stop_recording();
    }

    pub fn recording_state(&self) -> watch::Receiver<RecordingState> {
        self.capture.watch_state()
    }

    pub fn amplitude_stream(&self) -> mpsc::Receiver<f32> {
        self.amplitude.amplitude_stream()
    }

    pub async fn play_audio(&self, bytes: Vec<u8>) -> Result<(), CaptureError> {
        self.playback.play_audio(bytes).await
    }

    pub fn stop_playback(&self) {
        self.playback.stop_playback();
    }

    /// Persist an encoded take under `audio/`. The recording state shows
    /// Processing for the duration of the write.
    pub async fn save_recording(&self, bytes: &[u8]) -> Result<PathBuf, CaptureError> {
        self.capture.begin_processing()?;
        let result = self.write_take(bytes).await;
        self.capture.finish_processing();
        result
    }

    async fn write_take(&self, bytes: &[u8]) -> Result<PathBuf, CaptureError> {
        let path = self.store.audio_path()?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CaptureError::Io(e.to_string()))?;
        tracing::info!(path = %path.display(), size = bytes.len(), "recording saved");
        Ok(path)
    }

    // --- camera ---

    pub async fn initialize_camera(&self) -> Result<(), CaptureError> {
        self.camera.initialize().await
    }

    /// Start the preview with the pipeline's current lens facing
    /// (Back until switched).
    pub fn start_preview(&self, surface: &PreviewSurface) -> Result<(), CaptureError> {
        self.camera.start_preview(surface, self.camera.lens_facing())
    }

    pub fn stop_preview(&self) {
        self.camera.stop_preview();
    }

    pub async fn take_picture(&self) -> CaptureResult {
        self.camera.take_picture().await
    }

    pub fn switch_camera(&self) -> LensFacing {
        self.camera.switch_camera()
    }

    pub fn set_flash_mode(&self, mode: FlashMode) {
        self.camera.set_flash_mode(mode);
    }

    pub fn camera_state(&self) -> watch::Receiver<CameraState> {
        self.camera.watch_state()
    }

    pub fn release_camera(&self) {
        self.camera.release();
    }

    pub fn photo_thumbnail(&self, path: &Path, max_width: u32) -> Result<String, CaptureError> {
        self.store.photo_thumbnail(path, max_width)
    }

    /// Stop everything and release all hardware. Safe to call repeatedly.
    pub fn release_all(&self) {
        self.capture.stop_recording();
        self.playback.stop_playback();
        self.camera.release();
    }
}
