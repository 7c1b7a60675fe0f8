//! Microphone capture engine
//! Turns an exclusive input session into a cancellable stream of timestamped
//! PCM frames, publishing RecordingState to observers the whole time.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::{AudioFormat, AudioFrame, RecordingState};
use crate::device::AudioDeviceHost;
use crate::error::{CaptureError, Permission, PermissionChecker};

/// Frames buffered between the hardware read loop and the consumer.
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Re-check cadence for the stop flag while the frame channel is full.
const SEND_RETRY: std::time::Duration = std::time::Duration::from_millis(5);

/// Fan-out point for the amplitude monitor: the read loop deposits each
/// window here so the monitor never needs its own hardware read.
#[derive(Clone, Default)]
pub(crate) struct AmplitudeTap {
    window: Arc<Mutex<Vec<u8>>>,
}

impl AmplitudeTap {
    fn store(&self, bytes: &[u8]) {
        let mut window = self.window.lock();
        window.clear();
        window.extend_from_slice(bytes);
    }

    fn clear(&self) {
        self.window.lock().clear();
    }

    pub(crate) fn latest(&self) -> Vec<u8> {
        self.window.lock().clone()
    }
}

pub struct AudioCaptureEngine {
    host: Arc<dyn AudioDeviceHost>,
    permissions: Arc<dyn PermissionChecker>,
    format: AudioFormat,
    state_tx: watch::Sender<RecordingState>,
    stop_flag: Arc<AtomicBool>,
    tap: AmplitudeTap,
    /// Join handle of the previous read loop; awaited before a new session
    /// opens so two exclusive acquisitions never overlap.
    prev_worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Serializes starters: the state check, the prior-teardown wait, and
    /// the session open form one claim.
    start_lock: tokio::sync::Mutex<()>,
}

impl AudioCaptureEngine {
    pub fn new(host: Arc<dyn AudioDeviceHost>, permissions: Arc<dyn PermissionChecker>) -> Self {
        let (state_tx, _) = watch::channel(RecordingState::Idle);
        Self {
            host,
            permissions,
            format: AudioFormat::capture(),
            state_tx,
            stop_flag: Arc::new(AtomicBool::new(false)),
            tap: AmplitudeTap::default(),
            prev_worker: Mutex::new(None),
            start_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Observable recording state. Each engine instance publishes its own.
    pub fn watch_state(&self) -> watch::Receiver<RecordingState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> RecordingState {
        self.state_tx.borrow().clone()
    }

    pub(crate) fn amplitude_tap(&self) -> AmplitudeTap {
        self.tap.clone()
    }

    /// Start capturing. Yields frames until the receiver is dropped,
    /// `stop_recording` is called, or the hardware read fails.
    ///
    /// Rejected with `AlreadyActive` while a recording or processing pass is
    /// in flight; starting from `Error` is allowed and clears it.
    pub async fn start_recording(
        &self,
    ) -> Result<mpsc::Receiver<Result<AudioFrame, CaptureError>>, CaptureError> {
        // One starter at a time; a concurrent second caller sees Recording
        // once the winner has claimed it, never a half-started engine.
        let _start = self.start_lock.lock().await;

        match &*self.state_tx.borrow() {
            RecordingState::Recording | RecordingState::Processing => {
                return Err(CaptureError::AlreadyActive("recording"));
            }
            RecordingState::Idle | RecordingState::Error { .. } => {}
        }

        if !self.permissions.is_granted(Permission::Microphone) {
            return Err(CaptureError::PermissionDenied(Permission::Microphone));
        }

        // Wait for the previous session's teardown before opening a new one.
        let prev = self.prev_worker.lock().take();
        if let Some(handle) = prev {
            let _ = handle.await;
        }

        let min_size = match self.host.min_input_buffer_size(&self.format) {
            Ok(size) => size,
            Err(e) => {
                self.state_tx.send_replace(RecordingState::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        let buffer_size = min_size * 2;

        let mut session = match self.host.open_input(&self.format, buffer_size) {
            Ok(session) => session,
            Err(e) => {
                self.state_tx.send_replace(RecordingState::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        tracing::info!(
            session = %session.id(),
            buffer_size,
            "recording started"
        );

        self.stop_flag.store(false, Ordering::SeqCst);
        self.state_tx.send_replace(RecordingState::Recording);

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let stop_flag = self.stop_flag.clone();
        let state_tx = self.state_tx.clone();
        let tap = self.tap.clone();
        let format = self.format;

        let worker = tokio::task::spawn_blocking(move || {
            let session_id = session.id();
            let mut buf = vec![0u8; buffer_size];
            let mut last_ts = 0i64;

            let exit = 'session: loop {
                if stop_flag.load(Ordering::SeqCst) {
                    break Ok(());
                }

                let n = match session.read(&mut buf) {
                    Ok(n) => n,
                    Err(e) => break Err(e),
                };

                // Clock steps must not produce a decreasing timestamp.
                let now = chrono::Utc::now().timestamp_millis();
                last_ts = now.max(last_ts);

                let frame = AudioFrame::new(buf[..n].to_vec(), &format, last_ts);
                tap.store(&frame.data);

                // Bounded send that stays responsive to the stop flag: a
                // stalled consumer must not keep the session alive forever.
                let mut pending = Ok(frame);
                loop {
                    match tx.try_send(pending) {
                        Ok(()) => break,
                        // Consumer dropped the receiver: cancellation.
                        Err(mpsc::error::TrySendError::Closed(_)) => break 'session Ok(()),
                        Err(mpsc::error::TrySendError::Full(rejected)) => {
                            if stop_flag.load(Ordering::SeqCst) {
                                break 'session Ok(());
                            }
                            std::thread::sleep(SEND_RETRY);
                            pending = rejected;
                        }
                    }
                }
            };

            // Session drops here on every path; native teardown runs in Drop.
            drop(session);
            tap.clear();

            match exit {
                Ok(()) => {
                    state_tx.send_if_modified(|state| {
                        if *state == RecordingState::Recording {
                            *state = RecordingState::Idle;
                            true
                        } else {
                            false
                        }
                    });
                    tracing::info!(session = %session_id, "recording stopped");
                }
                Err(e) => {
                    tracing::error!(session = %session_id, error = %e, "recording failed");
                    state_tx.send_replace(RecordingState::Error {
                        message: e.to_string(),
                    });
                    let _ = tx.blocking_send(Err(e));
                }
            }
        });

        *self.prev_worker.lock() = Some(worker);
        Ok(rx)
    }

    /// Signal the read loop to stop. Idempotent, never fails; a no-op when
    /// not recording, and does not clear a sticky `Error`.
    pub fn stop_recording(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.state_tx.send_if_modified(|state| {
            if *state == RecordingState::Recording {
                *state = RecordingState::Idle;
                true
            } else {
                false
            }
        });
    }

    /// Mark the engine as persisting a finished take. Only valid from Idle.
    pub(crate) fn begin_processing(&self) -> Result<(), CaptureError> {
        let mut entered = false;
        self.state_tx.send_if_modified(|state| {
            if *state == RecordingState::Idle {
                *state = RecordingState::Processing;
                entered = true;
                true
            } else {
                false
            }
        });
        if entered {
            Ok(())
        } else {
            Err(CaptureError::AlreadyActive("processing"))
        }
    }

    pub(crate) fn finish_processing(&self) {
        self.state_tx.send_if_modified(|state| {
            if *state == RecordingState::Processing {
                *state = RecordingState::Idle;
                true
            } else {
                false
            }
        });
    }
}
