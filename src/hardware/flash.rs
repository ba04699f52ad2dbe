use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::Mutex;

use super::camera::{TrackCapabilities, VideoTrack};
use crate::runtime::Runtime;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TorchError {
    #[error("torch not available on this device")]
    Unsupported,
    #[error("torch request rejected: {0}")]
    Rejected(String),
}

/// Torch capability of the current camera session.
///
/// Cloned into pulse tasks; `revoke` is called when the session goes away so a
/// leftover clone can no longer reach the hardware. Writes are serialised: a write
/// owns the gate until the track answers, even if the task that asked for it is
/// cancelled, so a later write can never be overtaken by an earlier one.
#[derive(Clone)]
pub struct Flash {
    track: Arc<dyn VideoTrack>,
    runtime: Runtime,
    gate: Arc<Mutex<()>>,
    revoked: Arc<AtomicBool>,
    unsupported: Arc<AtomicBool>,
}

impl Flash {
    pub fn new(track: Arc<dyn VideoTrack>, runtime: Runtime) -> Self {
        Flash{
            track,
            runtime,
            gate: Arc::new(Mutex::new(())),
            revoked: Arc::new(AtomicBool::new(false)),
            unsupported: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn capabilities(&self) -> TrackCapabilities {
        self.track.capabilities()
    }

    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Best-effort torch switch. Returns whether the hardware accepted it; failures
    /// never propagate since drivers may reject fast toggles near their duty-cycle limit.
    pub async fn set(&self, on: bool) -> bool {
        let gate = self.gate.clone().lock_owned().await;
        if self.is_revoked() {return false;}
        let track = self.track.clone();
        let write = self.runtime.detach(async move {
            let result = track.set_torch(on).await;
            drop(gate);
            result
        });
        let result = match write.await {
            Ok(result) => result,
            Err(e) => Err(TorchError::Rejected(e.to_string())),
        };
        match result {
            Ok(()) => true,
            Err(TorchError::Unsupported) => {
                if !self.unsupported.swap(true, Ordering::SeqCst) {
                    log::debug!("torch not supported by the camera track, toggling is a no-op");
                }
                false
            }
            Err(e) => {
                log::trace!("torch({on}) ignored: {e}");
                false
            }
        }
    }
}

impl std::fmt::Debug for Flash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flash").field("revoked", &self.is_revoked()).finish()
    }
}
