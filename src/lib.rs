//! storycap — device media capture pipeline
//! Audio recording/playback and camera preview/capture behind explicit state
//! machines, with guaranteed hardware release on every exit path.

pub mod audio;
pub mod camera;
pub mod device;
pub mod error;
pub mod facade;
pub mod storage;

pub use audio::{
    AmplitudeMonitor, AudioCaptureEngine, AudioFormat, AudioFrame, AudioPlaybackEngine,
    ChannelConfig, RecordingState, SampleEncoding,
};
pub use camera::{CameraPipeline, CameraState, CaptureResult, CapturedPhoto, FlashMode, LensFacing};
pub use device::camera::{CameraDevice, CameraProvider, PreviewSurface};
pub use device::{AudioDeviceHost, AudioInputSession, AudioOutputSession, CpalAudioHost, SessionId};
pub use error::{AllGranted, CaptureError, Permission, PermissionChecker};
pub use facade::MediaCaptureFacade;
pub use storage::MediaStore;

/// Install the default tracing subscriber. Call once from the embedding app.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}
