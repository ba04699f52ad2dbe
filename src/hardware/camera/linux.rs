//! Torch backend for Linux devices that expose their flash LED through the LED
//! class (`/sys/class/leds/<name>/brightness`).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{CameraError, CameraProvider, CameraSession, Constraints, Facing, TrackCapabilities, VideoTrack};
use crate::hardware::TorchError;

pub const LEDS_ROOT: &str = "/sys/class/leds";

#[derive(Debug, Clone)]
pub struct SysfsTorch {
    root: PathBuf,
}

impl Default for SysfsTorch {
    fn default() -> Self {Self::new(LEDS_ROOT)}
}

impl SysfsTorch {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SysfsTorch{root: root.into()}
    }

    async fn find_led(&self) -> Result<PathBuf, CameraError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CameraError::NotFound),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => return Err(CameraError::PermissionDenied),
            Err(e) => return Err(CameraError::Backend(e.to_string())),
        };
        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| CameraError::Backend(e.to_string()))? {
            let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
            if name.contains("torch") || name.contains("flash") {
                candidates.push(entry.path());
            }
        }
        candidates.sort();
        candidates.into_iter().next().ok_or(CameraError::NotFound)
    }
}

async fn read_max_brightness(led: &Path) -> Result<u32, CameraError> {
    let raw = tokio::fs::read_to_string(led.join("max_brightness")).await.map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => CameraError::PermissionDenied,
        ErrorKind::NotFound => CameraError::NoVideoTrack,
        _ => CameraError::Backend(e.to_string()),
    })?;
    raw.trim().parse::<u32>().map_err(|e| CameraError::Backend(format!("bad max_brightness {raw:?}: {e}")))
}

#[async_trait]
impl CameraProvider for SysfsTorch {
    async fn acquire(&self, constraints: &Constraints) -> Result<Box<dyn CameraSession>, CameraError> {
        if constraints.facing == Facing::User {
            log::debug!("sysfs torch ignores front-facing request, using the flash LED");
        }
        let led = self.find_led().await?;
        let max_brightness = read_max_brightness(&led).await?.max(1);

        // Opening for write up front surfaces missing udev permissions as a connect error.
        tokio::fs::OpenOptions::new().write(true).open(led.join("brightness")).await.map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => CameraError::PermissionDenied,
            _ => CameraError::Backend(e.to_string()),
        })?;

        log::info!("using LED {} (max brightness {max_brightness})", led.display());
        Ok(Box::new(LedSession(Arc::new(Led{dir: led, max_brightness, released: Mutex::new(false)}))))
    }
}

/// One LED. `released` is held across every brightness write so a write can
/// never land after `release` switched the LED off.
struct Led {
    dir: PathBuf,
    max_brightness: u32,
    released: Mutex<bool>,
}

impl Led {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.released.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self, on: bool) -> std::io::Result<()> {
        let value = if on {self.max_brightness} else {0};
        std::fs::write(self.dir.join("brightness"), value.to_string())
    }
}

struct LedSession(Arc<Led>);

impl CameraSession for LedSession {
    fn video_track(&self) -> Option<Arc<dyn VideoTrack>> {
        Some(Arc::new(LedTrack(self.0.clone())))
    }

    fn release(self: Box<Self>) {
        let mut released = self.0.lock();
        *released = true;
        // Blocking write: release runs outside the runtime's async context too.
        if let Err(e) = self.0.write(false) {
            log::debug!("failed to switch {} off on release: {e}", self.0.dir.display());
        }
    }
}

struct LedTrack(Arc<Led>);

#[async_trait]
impl VideoTrack for LedTrack {
    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities{torch: Some(true)}
    }

    async fn set_torch(&self, on: bool) -> Result<(), TorchError> {
        let led = self.0.clone();
        let written = tokio::task::spawn_blocking(move || {
            let released = led.lock();
            if *released {
                return Err(TorchError::Rejected("session released".to_string()));
            }
            led.write(on).map_err(|e| match e.kind() {
                ErrorKind::NotFound => TorchError::Unsupported,
                _ => TorchError::Rejected(e.to_string()),
            })
        });
        written.await.map_err(|e| TorchError::Rejected(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn led(root: &Path, name: &str, max: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("max_brightness"), max).unwrap();
        std::fs::write(dir.join("brightness"), "0").unwrap();
        dir
    }

    fn brightness(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("brightness")).unwrap()
    }

    #[tokio::test]
    async fn drives_the_flash_led() {
        let root = tempfile::tempdir().unwrap();
        led(root.path(), "input3::capslock", "1");
        let flash = led(root.path(), "white:flash", "255\n");

        let session = SysfsTorch::new(root.path()).acquire(&Constraints::default()).await.unwrap();
        let track = session.video_track().unwrap();
        assert_eq!(track.capabilities().torch, Some(true));

        track.set_torch(true).await.unwrap();
        assert_eq!(brightness(&flash), "255");
        track.set_torch(false).await.unwrap();
        assert_eq!(brightness(&flash), "0");

        track.set_torch(true).await.unwrap();
        session.release();
        assert_eq!(brightness(&flash), "0");
        assert!(track.set_torch(true).await.is_err());
    }

    #[tokio::test]
    async fn missing_led_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        led(root.path(), "mmc0::", "1");
        let result = SysfsTorch::new(root.path()).acquire(&Constraints::default()).await;
        assert_eq!(result.err(), Some(CameraError::NotFound));

        let result = SysfsTorch::new(root.path().join("absent")).acquire(&Constraints::default()).await;
        assert_eq!(result.err(), Some(CameraError::NotFound));
    }

    #[tokio::test]
    async fn garbage_max_brightness_is_a_backend_error() {
        let root = tempfile::tempdir().unwrap();
        led(root.path(), "led:torch", "lots");
        let result = SysfsTorch::new(root.path()).acquire(&Constraints::default()).await;
        assert!(matches!(result.err(), Some(CameraError::Backend(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn release_always_leaves_the_led_dark() {
        let root = tempfile::tempdir().unwrap();
        let flash = led(root.path(), "white:torch", "255");
        for _ in 0..50 {
            let session = SysfsTorch::new(root.path()).acquire(&Constraints::default()).await.unwrap();
            let track = session.video_track().unwrap();
            let write = tokio::spawn(async move {track.set_torch(true).await});
            session.release();
            let _ = write.await.unwrap();
            assert_eq!(brightness(&flash), "0");
        }
    }
}
