use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::TorchError;

mod simulated;
pub use simulated::{SimulatedCamera, Outcome, Latch, TorchCall};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::SysfsTorch;

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod apple;
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub use apple::AppleCamera;

/// Why a camera could not be acquired. Each variant's message is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera needs HTTPS or Localhost")]
    InsecureContext,
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("No camera device found")]
    NotFound,
    #[error("No video track found")]
    NoVideoTrack,
    #[error("Failed to start camera: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Rear camera, the one that carries the flash LED.
    #[default]
    Environment,
    User,
}

/// What `acquire` asks the host for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraints {
    pub facing: Facing,
    pub audio: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Constraints{facing: Facing::Environment, audio: false}
    }
}

/// Capabilities a track advertises. `torch: None` means the platform said nothing,
/// which is not the same as "unsupported".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackCapabilities {
    pub torch: Option<bool>,
}

/// Host side of the camera: grants or denies access to a media session.
#[async_trait]
pub trait CameraProvider: Send + Sync {
    async fn acquire(&self, constraints: &Constraints) -> Result<Box<dyn CameraSession>, CameraError>;
}

/// An acquired camera stream. Dropping it without `release` leaks the hardware lock.
pub trait CameraSession: Send {
    fn video_track(&self) -> Option<Arc<dyn VideoTrack>>;

    /// Stops every track of the session. Errors while stopping are swallowed.
    fn release(self: Box<Self>);
}

/// The controllable hardware light of a session.
#[async_trait]
pub trait VideoTrack: Send + Sync {
    fn capabilities(&self) -> TrackCapabilities;
    async fn set_torch(&self, on: bool) -> Result<(), TorchError>;
}

#[async_trait]
impl<P: CameraProvider + ?Sized> CameraProvider for Arc<P> {
    async fn acquire(&self, constraints: &Constraints) -> Result<Box<dyn CameraSession>, CameraError> {
        (**self).acquire(constraints).await
    }
}
