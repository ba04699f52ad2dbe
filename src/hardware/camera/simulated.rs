use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::{CameraError, CameraProvider, CameraSession, Constraints, TrackCapabilities, VideoTrack};
use crate::hardware::TorchError;

/// Scripted result of the next `acquire`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Grant,
    GrantWithoutTrack,
    Deny(CameraError),
}

/// One `set_torch` request as seen by the simulated hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TorchCall {
    pub at: Instant,
    pub session: u64,
    pub on: bool,
    pub accepted: bool,
}

/// Holds an acquisition or torch write open until `open` is called (or the latch
/// is dropped).
#[derive(Debug)]
pub struct Latch(oneshot::Sender<()>);
impl Latch {
    pub fn open(self) {
        let _ = self.0.send(());
    }
}

#[derive(Debug)]
struct Sim {
    script: VecDeque<Outcome>,
    latches: VecDeque<oneshot::Receiver<()>>,
    torch_latches: VecDeque<oneshot::Receiver<()>>,
    advertise: Option<bool>,
    supported: bool,
    reject: bool,
    lit: bool,
    next_id: u64,
    acquired: usize,
    released: usize,
    live: usize,
    max_live: usize,
    calls: Vec<TorchCall>,
    constraints: Option<Constraints>,
}

/// In-process camera for tests and demos. Cheap to clone, clones share state.
#[derive(Debug, Clone)]
pub struct SimulatedCamera(Arc<Mutex<Sim>>);

impl Default for SimulatedCamera {
    fn default() -> Self {Self::new()}
}

impl SimulatedCamera {
    pub fn new() -> Self {
        SimulatedCamera(Arc::new(Mutex::new(Sim{
            script: VecDeque::new(),
            latches: VecDeque::new(),
            torch_latches: VecDeque::new(),
            advertise: Some(true),
            supported: true,
            reject: false,
            lit: false,
            next_id: 0,
            acquired: 0,
            released: 0,
            live: 0,
            max_live: 0,
            calls: Vec::new(),
            constraints: None,
        })))
    }

    /// A camera whose track has no light at all.
    pub fn without_torch(self) -> Self {
        {
            let mut sim = self.lock();
            sim.supported = false;
            sim.advertise = Some(false);
        }
        self
    }

    /// The track works but does not advertise a torch capability.
    pub fn silent_capabilities(self) -> Self {
        self.lock().advertise = None;
        self
    }

    pub fn push(&self, outcome: Outcome) {
        self.lock().script.push_back(outcome);
    }

    pub fn deny(&self, error: CameraError) {
        self.push(Outcome::Deny(error));
    }

    /// The next acquisition will not resolve until the returned latch opens.
    pub fn defer(&self) -> Latch {
        let (tx, rx) = oneshot::channel();
        self.lock().latches.push_back(rx);
        Latch(tx)
    }

    /// The next `set_torch` stays in flight until the returned latch opens. Release
    /// is checked when the write lands, as a driver would.
    pub fn defer_torch(&self) -> Latch {
        let (tx, rx) = oneshot::channel();
        self.lock().torch_latches.push_back(rx);
        Latch(tx)
    }

    pub fn reject_torch(&self, reject: bool) {
        self.lock().reject = reject;
    }

    pub fn acquisitions(&self) -> usize {self.lock().acquired}
    pub fn releases(&self) -> usize {self.lock().released}
    pub fn live_sessions(&self) -> usize {self.lock().live}
    pub fn max_live_sessions(&self) -> usize {self.lock().max_live}
    pub fn is_lit(&self) -> bool {self.lock().lit}
    pub fn last_constraints(&self) -> Option<Constraints> {self.lock().constraints}

    pub fn torch_calls(&self) -> Vec<TorchCall> {
        self.lock().calls.clone()
    }

    /// `on` values of every torch request, accepted or not.
    pub fn torch_log(&self) -> Vec<bool> {
        self.lock().calls.iter().map(|call| call.on).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Sim> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CameraProvider for SimulatedCamera {
    async fn acquire(&self, constraints: &Constraints) -> Result<Box<dyn CameraSession>, CameraError> {
        let (outcome, latch) = {
            let mut sim = self.lock();
            sim.constraints = Some(*constraints);
            (sim.script.pop_front().unwrap_or(Outcome::Grant), sim.latches.pop_front())
        };
        if let Some(latch) = latch {
            let _ = latch.await;
        }

        let with_track = match outcome {
            Outcome::Deny(error) => return Err(error),
            Outcome::Grant => true,
            Outcome::GrantWithoutTrack => false,
        };
        let mut sim = self.lock();
        sim.next_id += 1;
        sim.acquired += 1;
        sim.live += 1;
        sim.max_live = sim.max_live.max(sim.live);
        let id = sim.next_id;
        let track = with_track.then(|| Arc::new(SimulatedTrack{id, camera: self.clone(), stopped: AtomicBool::new(false)}));
        Ok(Box::new(SimulatedSession{camera: self.clone(), track}))
    }
}

struct SimulatedSession {
    camera: SimulatedCamera,
    track: Option<Arc<SimulatedTrack>>,
}

impl CameraSession for SimulatedSession {
    fn video_track(&self) -> Option<Arc<dyn VideoTrack>> {
        self.track.clone().map(|track| track as Arc<dyn VideoTrack>)
    }

    fn release(self: Box<Self>) {
        if let Some(track) = &self.track {
            track.stopped.store(true, Ordering::SeqCst);
        }
        let mut sim = self.camera.lock();
        sim.released += 1;
        sim.live = sim.live.saturating_sub(1);
        sim.lit = false;
    }
}

struct SimulatedTrack {
    id: u64,
    camera: SimulatedCamera,
    stopped: AtomicBool,
}

#[async_trait]
impl VideoTrack for SimulatedTrack {
    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities{torch: self.camera.lock().advertise}
    }

    async fn set_torch(&self, on: bool) -> Result<(), TorchError> {
        let latch = self.camera.lock().torch_latches.pop_front();
        if let Some(latch) = latch {
            let _ = latch.await;
        }
        let mut sim = self.camera.lock();
        let result = if self.stopped.load(Ordering::SeqCst) {
            Err(TorchError::Rejected("track ended".to_string()))
        } else if !sim.supported {
            Err(TorchError::Unsupported)
        } else if sim.reject {
            Err(TorchError::Rejected("driver busy".to_string()))
        } else {
            Ok(())
        };
        sim.calls.push(TorchCall{at: Instant::now(), session: self.id, on, accepted: result.is_ok()});
        if result.is_ok() {
            sim.lit = on;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_outcomes_run_in_order() {
        let camera = SimulatedCamera::new();
        camera.deny(CameraError::PermissionDenied);
        camera.push(Outcome::GrantWithoutTrack);

        let denied = camera.acquire(&Constraints::default()).await;
        assert_eq!(denied.err(), Some(CameraError::PermissionDenied));

        let trackless = camera.acquire(&Constraints::default()).await.unwrap();
        assert!(trackless.video_track().is_none());
        trackless.release();

        let granted = camera.acquire(&Constraints::default()).await.unwrap();
        assert!(granted.video_track().is_some());
        granted.release();

        assert_eq!(camera.acquisitions(), 2);
        assert_eq!(camera.releases(), 2);
        assert_eq!(camera.live_sessions(), 0);
    }

    #[tokio::test]
    async fn released_track_rejects_torch() {
        let camera = SimulatedCamera::new();
        let session = camera.acquire(&Constraints::default()).await.unwrap();
        let track = session.video_track().unwrap();
        track.set_torch(true).await.unwrap();
        session.release();
        assert!(!camera.is_lit());
        assert!(matches!(track.set_torch(true).await, Err(TorchError::Rejected(_))));
        assert_eq!(camera.torch_calls().iter().filter(|c| c.accepted).count(), 1);
    }

    #[tokio::test]
    async fn deferred_acquisition_waits_for_latch() {
        let camera = SimulatedCamera::new();
        let latch = camera.defer();
        let pending = tokio::spawn({
            let camera = camera.clone();
            async move {camera.acquire(&Constraints::default()).await.map(|s| s.release())}
        });
        tokio::task::yield_now().await;
        assert_eq!(camera.acquisitions(), 0);
        latch.open();
        pending.await.unwrap().unwrap();
        assert_eq!(camera.acquisitions(), 1);
        assert_eq!(camera.releases(), 1);
    }

    #[tokio::test]
    async fn deferred_torch_write_checks_release_when_it_lands() {
        let camera = SimulatedCamera::new();
        let session = camera.acquire(&Constraints::default()).await.unwrap();
        let track = session.video_track().unwrap();
        let latch = camera.defer_torch();
        let write = tokio::spawn(async move {track.set_torch(true).await});
        tokio::task::yield_now().await;
        session.release();
        latch.open();
        assert!(write.await.unwrap().is_err());
        assert!(!camera.is_lit());
    }
}
