#![cfg(any(target_os = "macos", target_os = "ios"))]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use block2::RcBlock;
use objc2::msg_send;
use objc2::rc::Retained;
use objc2::runtime::Bool;
use objc2_av_foundation::{
    AVAuthorizationStatus,
    AVCaptureDevice,
    AVCaptureDeviceDiscoverySession,
    AVCaptureDevicePosition,
    AVCaptureDeviceTypeBuiltInWideAngleCamera,
    AVCaptureTorchMode,
    AVMediaTypeVideo,
};
use objc2_foundation::{NSArray, NSError};
use tokio::sync::oneshot;

use super::{CameraError, CameraProvider, CameraSession, Constraints, Facing, TrackCapabilities, VideoTrack};
use crate::hardware::TorchError;

enum Access {
    Granted,
    Denied,
    Pending(oneshot::Receiver<bool>),
}

fn authorization() -> Result<Access, CameraError> {
    unsafe {
        let media_type = AVMediaTypeVideo.ok_or(CameraError::NotFound)?;
        match AVCaptureDevice::authorizationStatusForMediaType(media_type) {
            AVAuthorizationStatus::Authorized => Ok(Access::Granted),
            AVAuthorizationStatus::NotDetermined => {
                let (tx, rx) = oneshot::channel();
                let tx = Mutex::new(Some(tx));
                let handler = RcBlock::new(move |granted: Bool| {
                    if let Some(tx) = tx.lock().ok().and_then(|mut tx| tx.take()) {
                        let _ = tx.send(granted.as_bool());
                    }
                });
                AVCaptureDevice::requestAccessForMediaType_completionHandler(media_type, &handler);
                Ok(Access::Pending(rx))
            }
            _ => Ok(Access::Denied),
        }
    }
}

/// AVCaptureDevice configuration is serialised by `lockForConfiguration`.
struct Device(Retained<AVCaptureDevice>);
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

fn find_device(facing: Facing) -> Option<Device> {
    let position = match facing {
        Facing::Environment => AVCaptureDevicePosition::Back,
        Facing::User => AVCaptureDevicePosition::Front,
    };
    unsafe {
        let device_types = NSArray::from_slice(&[AVCaptureDeviceTypeBuiltInWideAngleCamera]);
        let discovery = AVCaptureDeviceDiscoverySession::discoverySessionWithDeviceTypes_mediaType_position(
            &device_types, AVMediaTypeVideo, position);
        discovery.devices().into_iter().next().map(Device)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppleCamera;

#[async_trait]
impl CameraProvider for AppleCamera {
    async fn acquire(&self, constraints: &Constraints) -> Result<Box<dyn CameraSession>, CameraError> {
        let granted = match authorization()? {
            Access::Granted => true,
            Access::Denied => false,
            Access::Pending(rx) => rx.await.unwrap_or(false),
        };
        if !granted {
            return Err(CameraError::PermissionDenied);
        }
        let device = find_device(constraints.facing).ok_or(CameraError::NotFound)?;
        Ok(Box::new(AppleSession(Arc::new(AppleTorch{device, released: Mutex::new(false)}))))
    }
}

struct AppleSession(Arc<AppleTorch>);

impl CameraSession for AppleSession {
    fn video_track(&self) -> Option<Arc<dyn VideoTrack>> {
        Some(self.0.clone())
    }

    fn release(self: Box<Self>) {
        let mut released = self.0.lock();
        *released = true;
        if let Err(e) = self.0.apply(false) {
            log::debug!("failed to switch torch off on release: {e}");
        }
    }
}

/// `released` is held across every torch change so none lands after release.
struct AppleTorch {
    device: Device,
    released: Mutex<bool>,
}

impl AppleTorch {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.released.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, on: bool) -> Result<(), TorchError> {
        let device = &self.device.0;
        unsafe {
            if !device.hasTorch() {
                return Err(TorchError::Unsupported);
            }
            device.lockForConfiguration().map_err(|e| TorchError::Rejected(format!("{e:?}")))?;
            let accepted = if on {
                let ok: Bool = msg_send![&**device, setTorchModeOnWithLevel: 1.0f32, error: std::ptr::null_mut::<*mut NSError>()];
                ok.as_bool()
            } else {
                let _: () = msg_send![&**device, setTorchMode: AVCaptureTorchMode::Off];
                true
            };
            device.unlockForConfiguration();
            match accepted {
                true => Ok(()),
                false => Err(TorchError::Rejected("setTorchModeOnWithLevel failed".to_string())),
            }
        }
    }
}

#[async_trait]
impl VideoTrack for AppleTorch {
    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities{torch: Some(unsafe { self.device.0.hasTorch() })}
    }

    async fn set_torch(&self, on: bool) -> Result<(), TorchError> {
        let released = self.lock();
        if *released {
            return Err(TorchError::Rejected("session released".to_string()));
        }
        self.apply(on)
    }
}
