//! Camera hardware seam
//! The platform supplies a listener-style provider; the pipeline bridges its
//! callbacks into single suspension points. Every callback fires exactly
//! once, possibly on a thread the pipeline does not own.

use std::path::Path;

use crate::camera::{FlashMode, LensFacing};
use crate::error::CaptureError;

/// Opaque handle to the UI's preview output. The pipeline passes it through
/// to the device untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSurface(pub u64);

pub type DeviceReadyCallback = Box<dyn FnOnce(Result<Box<dyn CameraDevice>, CaptureError>) + Send>;
pub type PictureSavedCallback = Box<dyn FnOnce(Result<(), CaptureError>) + Send>;

/// Asynchronous acquisition of the platform camera provider.
pub trait CameraProvider: Send + Sync {
    /// Request the device. `on_ready` must be invoked exactly once, with the
    /// opened device or the acquisition failure.
    fn request_device(&self, on_ready: DeviceReadyCallback);
}

/// One exclusive camera acquisition. Dropping the device tears down any
/// bound use cases and the capture callback thread.
pub trait CameraDevice: Send {
    /// Bind preview + still-capture use cases for the given lens. The device
    /// holds at most one active configuration; callers unbind first.
    fn bind_preview(
        &mut self,
        surface: &PreviewSurface,
        lens: LensFacing,
    ) -> Result<(), CaptureError>;

    /// Unbind all use cases. Idempotent.
    fn unbind_all(&mut self);

    /// Capture a still to `path`. `on_saved` is invoked exactly once: Ok when
    /// the file is durably written, Err otherwise (a partial file may remain
    /// for the caller to clean up).
    fn take_picture(&mut self, path: &Path, flash: FlashMode, on_saved: PictureSavedCallback);
}
