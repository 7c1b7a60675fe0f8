//! Camera pipeline
//! Bridges the listener-based provider into suspension points, owns the
//! camera state machine and the captured-file persistence.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

use super::{CameraState, CaptureResult, CapturedPhoto, FlashMode, LensFacing};
use crate::device::camera::{CameraDevice, CameraProvider, PreviewSurface};
use crate::error::{CaptureError, Permission, PermissionChecker};
use crate::storage::MediaStore;

pub struct CameraPipeline {
    provider: Arc<dyn CameraProvider>,
    permissions: Arc<dyn PermissionChecker>,
    store: MediaStore,
    state_tx: watch::Sender<CameraState>,
    device: Mutex<Option<Box<dyn CameraDevice>>>,
    lens: Mutex<LensFacing>,
    flash: Mutex<FlashMode>,
    /// Serializes initializers so the state check and the provider
    /// acquisition form one claim.
    init_lock: tokio::sync::Mutex<()>,
}

impl CameraPipeline {
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        permissions: Arc<dyn PermissionChecker>,
        store: MediaStore,
    ) -> Self {
        let (state_tx, _) = watch::channel(CameraState::Idle);
        Self {
            provider,
            permissions,
            store,
            state_tx,
            device: Mutex::new(None),
            lens: Mutex::new(LensFacing::default()),
            flash: Mutex::new(FlashMode::default()),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Observable camera state. Each pipeline instance publishes its own.
    pub fn watch_state(&self) -> watch::Receiver<CameraState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> CameraState {
        self.state_tx.borrow().clone()
    }

    pub fn lens_facing(&self) -> LensFacing {
        *self.lens.lock()
    }

    pub fn flash_mode(&self) -> FlashMode {
        *self.flash.lock()
    }

    /// Acquire the camera provider: Idle → Initializing → Ready. Suspends
    /// until the provider's listener fires. Re-initializing is only allowed
    /// after an error or a release.
    pub async fn initialize(&self) -> Result<(), CaptureError> {
        // One initializer at a time; a concurrent second caller sees
        // Initializing (or Ready) once the winner has claimed it.
        let _init = self.init_lock.lock().await;

        match &*self.state_tx.borrow() {
            CameraState::Idle | CameraState::Error { .. } => {}
            _ => return Err(CaptureError::AlreadyActive("camera")),
        }

        if !self.permissions.is_granted(Permission::Camera) {
            return Err(CaptureError::PermissionDenied(Permission::Camera));
        }

        self.state_tx.send_replace(CameraState::Initializing);

        let (tx, rx) = oneshot::channel();
        self.provider.request_device(Box::new(move |result| {
            // Receiver may have been dropped by a cancelled caller.
            let _ = tx.send(result);
        }));

        let result = rx.await.unwrap_or_else(|_| {
            Err(CaptureError::HardwareInit(
                "camera provider dropped without responding".into(),
            ))
        });

        match result {
            Ok(device) => {
                *self.device.lock() = Some(device);
                self.state_tx.send_replace(CameraState::Ready);
                tracing::info!("camera initialized");
                Ok(())
            }
            Err(e) => {
                self.state_tx.send_replace(CameraState::Error {
                    message: e.to_string(),
                });
                tracing::error!(error = %e, "camera initialization failed");
                Err(e)
            }
        }
    }

    /// Bind preview + capture use cases for `lens` and enter Previewing.
    /// Only one configuration is ever bound; any existing one is unbound
    /// first. Valid from Ready or Previewing, otherwise fails without
    /// touching state.
    pub fn start_preview(
        &self,
        surface: &PreviewSurface,
        lens: LensFacing,
    ) -> Result<(), CaptureError> {
        match &*self.state_tx.borrow() {
            CameraState::Ready | CameraState::Previewing => {}
            other => return Err(CaptureError::invalid_transition("start_preview", other)),
        }

        let mut device = self.device.lock();
        let device = device
            .as_mut()
            .ok_or_else(|| CaptureError::HardwareInit("camera device not acquired".into()))?;

        device.unbind_all();
        if let Err(e) = device.bind_preview(surface, lens) {
            self.state_tx.send_replace(CameraState::Error {
                message: e.to_string(),
            });
            return Err(e);
        }

        *self.lens.lock() = lens;
        self.state_tx.send_replace(CameraState::Previewing);
        tracing::debug!(?lens, "preview started");
        Ok(())
    }

    /// Unbind all use cases: Previewing → Ready. A no-op from any other
    /// state.
    pub fn stop_preview(&self) {
        let previewing = self.state_tx.send_if_modified(|state| {
            if *state == CameraState::Previewing {
                *state = CameraState::Ready;
                true
            } else {
                false
            }
        });

        if previewing {
            if let Some(device) = self.device.lock().as_mut() {
                device.unbind_all();
            }
            tracing::debug!("preview stopped");
        }
    }

    /// Capture one still: Previewing → Capturing → Previewing on both
    /// branches. Ok carries the written path and its bytes; on failure any
    /// partial file is deleted before the error is returned.
    pub async fn take_picture(&self) -> CaptureResult {
        {
            let state = self.state_tx.borrow();
            if *state != CameraState::Previewing {
                return Err(CaptureError::invalid_transition("take_picture", &*state));
            }
        }
        self.state_tx.send_replace(CameraState::Capturing);

        let result = self.capture_to_file().await;

        // Capturing never strands the pipeline, success or not — but a
        // release that landed mid-capture wins: don't resurrect Previewing
        // over Idle.
        self.state_tx.send_if_modified(|state| {
            if *state == CameraState::Capturing {
                *state = CameraState::Previewing;
                true
            } else {
                false
            }
        });
        result
    }

    async fn capture_to_file(&self) -> CaptureResult {
        let path = self.store.pipeline_photo_path()?;
        let flash = *self.flash.lock();

        let (tx, rx) = oneshot::channel();
        {
            let mut device = self.device.lock();
            let device = device
                .as_mut()
                .ok_or_else(|| CaptureError::HardwareInit("camera device not acquired".into()))?;
            device.take_picture(
                &path,
                flash,
                Box::new(move |result| {
                    let _ = tx.send(result);
                }),
            );
        }

        let saved = rx.await.unwrap_or_else(|_| {
            Err(CaptureError::Io(
                "capture callback dropped without responding".into(),
            ))
        });

        match saved {
            Ok(()) => match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    tracing::info!(path = %path.display(), size = bytes.len(), "picture saved");
                    Ok(CapturedPhoto { path, bytes })
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&path).await;
                    Err(CaptureError::Io(e.to_string()))
                }
            },
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                tracing::error!(error = %e, "capture failed");
                Err(e)
            }
        }
    }

    /// Toggle lens facing and stop the preview. The caller rebinds with a
    /// fresh `start_preview`; switching never does the heavyweight rebind
    /// itself. Returns the new facing.
    pub fn switch_camera(&self) -> LensFacing {
        let lens = {
            let mut lens = self.lens.lock();
            *lens = lens.toggled();
            *lens
        };
        self.stop_preview();
        tracing::debug!(?lens, "camera switched");
        lens
    }

    /// Flash applies to the next capture only; no state effect.
    pub fn set_flash_mode(&self, mode: FlashMode) {
        *self.flash.lock() = mode;
    }

    /// Unbind everything, drop the device handle, force Idle. Safe from any
    /// state, including after a prior release.
    pub fn release(&self) {
        if let Some(mut device) = self.device.lock().take() {
            device.unbind_all();
            tracing::info!("camera released");
        }
        self.state_tx.send_replace(CameraState::Idle);
    }
}
