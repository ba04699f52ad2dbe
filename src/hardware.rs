pub mod camera;
mod flash;

pub use camera::{
    CameraError,
    CameraProvider,
    CameraSession,
    Constraints,
    Facing,
    TrackCapabilities,
    VideoTrack,
    SimulatedCamera,
    Outcome,
    Latch,
    TorchCall,
};
#[cfg(target_os = "linux")]
pub use camera::SysfsTorch;
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub use camera::AppleCamera;
pub use flash::{Flash, TorchError};

use std::sync::Arc;

/// The camera backend native to the platform this was built for, if there is one.
pub fn platform_camera() -> Option<Arc<dyn CameraProvider>> {
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    let provider: Option<Arc<dyn CameraProvider>> = Some(Arc::new(AppleCamera));
    #[cfg(target_os = "linux")]
    let provider: Option<Arc<dyn CameraProvider>> = Some(Arc::new(SysfsTorch::default()));
    #[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "linux")))]
    let provider: Option<Arc<dyn CameraProvider>> = None;
    provider
}
