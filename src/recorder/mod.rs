pub mod arecord;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::control::DashboardApi;
use crate::error::RecorderError;

/// A microphone backend.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn start(&self) -> Result<Box<dyn CaptureSession>, RecorderError>;
}

/// One running capture. Stopping it hands back everything recorded.
#[async_trait]
pub trait CaptureSession: Send {
    async fn stop(self: Box<Self>) -> Result<Vec<u8>, RecorderError>;
}

/// Push-to-talk control for one room.
///
/// At most one recording runs at a time. A recording ends on `release`
/// or when the time limit passes, and its audio is uploaded exactly once.
pub struct PushToTalk {
    room: String,
    capture: Arc<dyn AudioCapture>,
    api: Arc<dyn DashboardApi>,
    limit: Duration,
    recording: Arc<AtomicBool>,
    stop_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl PushToTalk {
    pub fn new(
        room: impl Into<String>,
        capture: Arc<dyn AudioCapture>,
        api: Arc<dyn DashboardApi>,
        limit: Duration,
    ) -> Self {
        Self {
            room: room.into(),
            capture,
            api,
            limit,
            recording: Arc::new(AtomicBool::new(false)),
            stop_tx: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    /// Start recording. Returns `Ok(false)` if a recording is already running.
    pub async fn press(&self) -> Result<bool, RecorderError> {
        if self.recording.swap(true, Ordering::AcqRel) {
            debug!("Already listening in {}", self.room);
            return Ok(false);
        }

        let session = match self.capture.start().await {
            Ok(session) => session,
            Err(e) => {
                self.recording.store(false, Ordering::Release);
                return Err(e);
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        if let Ok(mut slot) = self.stop_tx.lock() {
            *slot = Some(stop_tx);
        }

        info!("Listening in {}...", self.room);
        tokio::spawn(finish_recording(
            session,
            stop_rx,
            self.limit,
            self.api.clone(),
            self.room.clone(),
            self.recording.clone(),
            self.stop_tx.clone(),
        ));
        Ok(true)
    }

    /// Stop the running recording early. Returns false if none was running.
    pub fn release(&self) -> bool {
        let sender = self.stop_tx.lock().ok().and_then(|mut slot| slot.take());
        match sender {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

async fn finish_recording(
    session: Box<dyn CaptureSession>,
    stop_rx: oneshot::Receiver<()>,
    limit: Duration,
    api: Arc<dyn DashboardApi>,
    room: String,
    recording: Arc<AtomicBool>,
    stop_slot: Arc<Mutex<Option<oneshot::Sender<()>>>>,
) {
    tokio::select! {
        _ = stop_rx => debug!("Recording in {} released", room),
        _ = tokio::time::sleep(limit) => debug!("Recording in {} hit the {:?} limit", room, limit),
    }
    if let Ok(mut slot) = stop_slot.lock() {
        slot.take();
    }

    match session.stop().await {
        Ok(audio) => {
            info!("Sending {} bytes of audio for {}", audio.len(), room);
            if let Err(e) = api.upload_audio(&room, audio).await {
                warn!("Audio upload for {} failed: {}", room, e);
            }
        }
        Err(e) => error!("Recording in {} failed: {}", room, e),
    }

    recording.store(false, Ordering::Release);
    info!("Tap to speak ({})", room);
}
