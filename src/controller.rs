//! The torch controller: owns the camera session and keeps the hardware torch in
//! line with the user's [`LightSelection`].
//!
//! Hardware is only touched by effects. An effect is spawned by `reconcile` after
//! the selection changes or a session becomes ready, and carries a [`Ticket`]
//! naming the session epoch and effect generation it was started for. Anything
//! that invalidates it (a new selection, disconnect, drop) bumps one of the two
//! counters under the lock, so a stale pulse task can never drive a newer session.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tokio::sync::watch;

use crate::config::TorchConfig;
use crate::hardware::{CameraError, CameraProvider, CameraSession, Flash};
use crate::runtime::{self, Duration, Effect, Runtime};
use crate::selection::{Color, LightMode, LightSelection};
use crate::state::{Status, TorchState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    epoch: u64,
    effect: u64,
}

/// What one synchronisation pass does with the torch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    Dark,
    Steady,
    Pulse(Duration),
}

impl Plan {
    fn for_selection(selection: &LightSelection, interval: Duration) -> Plan {
        if selection.color.is_off() {
            return Plan::Dark;
        }
        match selection.mode {
            LightMode::Solid => Plan::Steady,
            LightMode::Pulse => Plan::Pulse(interval),
        }
    }
}

struct Inner {
    status: Status,
    selection: LightSelection,
    session: Option<Box<dyn CameraSession>>,
    flash: Option<Flash>,
    epoch: u64,
    effect_gen: u64,
    effect: Option<Effect>,
}

impl Inner {
    fn ticket(&self) -> Ticket {
        Ticket{epoch: self.epoch, effect: self.effect_gen}
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.epoch == ticket.epoch && self.effect_gen == ticket.effect && self.status.state.is_connected()
    }

    fn cancel_effect(&mut self) {
        self.effect_gen += 1;
        self.effect.take();
    }

    /// Cancels the effect, revokes the torch and releases the session.
    /// Returns whether a session was released.
    fn teardown(&mut self) -> bool {
        self.cancel_effect();
        if let Some(flash) = self.flash.take() {
            flash.revoke();
        }
        match self.session.take() {
            Some(session) => {
                session.release();
                true
            }
            None => false,
        }
    }
}

struct Shared {
    provider: Arc<dyn CameraProvider>,
    config: TorchConfig,
    runtime: OnceLock<Runtime>,
    inner: Mutex<Inner>,
    status: watch::Sender<Status>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, inner: &mut Inner, status: Status) {
        if inner.status == status {return;}
        log::debug!("torch {} -> {}", inner.status.state, status.state);
        inner.status = status.clone();
        self.status.send_replace(status);
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.lock().is_current(ticket)
    }

    /// The runtime effects run on: the one given at construction, else the one the
    /// first `connect` is polled on.
    fn runtime(&self) -> Option<&Runtime> {
        match self.runtime.get() {
            Some(runtime) => Some(runtime),
            None => Runtime::try_current().map(|runtime| self.runtime.get_or_init(move || runtime)),
        }
    }

    fn armed(&self) -> Option<(Flash, Ticket)> {
        let inner = self.lock();
        if !inner.status.state.is_connected() {return None;}
        inner.flash.clone().map(|flash| (flash, inner.ticket()))
    }

    /// Cancels whatever effect is running and, while connected, starts the one the
    /// current selection asks for.
    fn reconcile(self: &Arc<Self>, inner: &mut Inner) {
        inner.cancel_effect();
        if !inner.status.state.is_connected() {return;}
        let Some(flash) = inner.flash.clone() else {return};
        let Some(runtime) = self.runtime.get() else {return};
        let plan = Plan::for_selection(&inner.selection, self.config.pulse_interval());
        log::debug!("sync {} {} -> {plan:?}", inner.selection.color, inner.selection.mode);
        let ticket = inner.ticket();
        inner.effect = Some(runtime.spawn(Arc::clone(self).run(plan, flash, ticket)));
    }

    async fn run(self: Arc<Self>, plan: Plan, flash: Flash, ticket: Ticket) {
        match plan {
            Plan::Dark => {self.apply(&flash, false, ticket).await;},
            Plan::Steady => {self.apply(&flash, true, ticket).await;},
            Plan::Pulse(period) => {
                let mut lit = true;
                self.apply(&flash, lit, ticket).await;
                let mut ticker = runtime::ticker(period);
                loop {
                    ticker.tick().await;
                    if !self.is_current(ticket) {break;}
                    lit = !lit;
                    self.apply(&flash, lit, ticket).await;
                }
            }
        }
    }

    async fn apply(&self, flash: &Flash, on: bool, ticket: Ticket) -> bool {
        if !self.is_current(ticket) {return false;}
        flash.set(on).await && self.commit(on, ticket)
    }

    fn commit(&self, on: bool, ticket: Ticket) -> bool {
        let mut inner = self.lock();
        if !inner.is_current(ticket) {return false;}
        let state = if on {TorchState::On} else {TorchState::Off};
        self.transition(&mut inner, Status::new(state));
        true
    }

    /// Installs the outcome of an acquisition started at `epoch`, unless the
    /// controller moved on in the meantime, in which case the session is released.
    fn install(self: &Arc<Self>, epoch: u64, runtime: Runtime, result: Result<Box<dyn CameraSession>, CameraError>) {
        let mut inner = self.lock();
        if inner.epoch != epoch || inner.status.state != TorchState::Starting {
            if let Ok(session) = result {
                log::info!("camera granted after disconnect, releasing it");
                session.release();
            }
            return;
        }

        let acquired = result.and_then(|session| match session.video_track() {
            Some(track) => Ok((session, track)),
            None => {
                session.release();
                Err(CameraError::NoVideoTrack)
            }
        });
        match acquired {
            Ok((session, track)) => {
                let flash = Flash::new(track, runtime);
                if flash.capabilities().torch != Some(true) {
                    log::debug!("track does not advertise a torch, trying it anyway");
                }
                inner.session = Some(session);
                inner.flash = Some(flash);
                self.transition(&mut inner, Status::new(TorchState::Ready));
                log::info!("camera ready");
                self.reconcile(&mut inner);
            }
            Err(e) => {
                log::warn!("camera unavailable: {e}");
                self.transition(&mut inner, Status::error(e.to_string()));
            }
        }
    }
}

/// Puts a `starting` controller back to `idle` if the `connect` future is dropped
/// before the camera answers.
struct Pending<'a> {
    shared: &'a Shared,
    epoch: u64,
    armed: bool,
}

impl Pending<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if !self.armed {return;}
        let mut inner = self.shared.lock();
        if inner.epoch == self.epoch && inner.status.state == TorchState::Starting {
            log::debug!("connect cancelled before the camera answered");
            inner.epoch += 1;
            self.shared.transition(&mut inner, Status::new(TorchState::Idle));
        }
    }
}

/// Binds the camera torch to a colour/pulse selection.
///
/// Dropping the controller disconnects it: the session is released and any
/// pulse timer is cancelled.
pub struct TorchController {
    shared: Arc<Shared>,
}

impl TorchController {
    /// Uses the default config. Effects run on the tokio runtime current here, or
    /// failing that on the one the first `connect` is polled on.
    pub fn new<P: CameraProvider + 'static>(provider: P) -> Self {
        Self::with_config(provider, TorchConfig::default())
    }

    pub fn with_config<P: CameraProvider + 'static>(provider: P, config: TorchConfig) -> Self {
        Self::build(provider, config, Runtime::try_current())
    }

    pub fn with_runtime<P: CameraProvider + 'static>(provider: P, config: TorchConfig, runtime: Runtime) -> Self {
        Self::build(provider, config, Some(runtime))
    }

    fn build<P: CameraProvider + 'static>(provider: P, config: TorchConfig, runtime: Option<Runtime>) -> Self {
        let (status, _) = watch::channel(Status::default());
        TorchController{shared: Arc::new(Shared{
            provider: Arc::new(provider),
            config,
            runtime: runtime.map(OnceLock::from).unwrap_or_default(),
            inner: Mutex::new(Inner{
                status: Status::default(),
                selection: LightSelection::default(),
                session: None,
                flash: None,
                epoch: 0,
                effect_gen: 0,
                effect: None,
            }),
            status,
        })}
    }

    pub fn config(&self) -> &TorchConfig {&self.shared.config}

    pub fn status(&self) -> Status {
        self.shared.lock().status.clone()
    }

    pub fn state(&self) -> TorchState {
        self.shared.lock().status.state
    }

    pub fn selection(&self) -> LightSelection {
        self.shared.lock().selection
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.shared.status.subscribe()
    }

    /// Acquires the rear camera. Does nothing unless `idle` or `error`; failures
    /// land in the status as `error` with a message instead of being returned.
    pub async fn connect(&self) {
        let (epoch, runtime) = {
            let mut inner = self.shared.lock();
            if !inner.status.state.can_connect() {
                log::debug!("connect ignored while {}", inner.status.state);
                return;
            }
            let Some(runtime) = self.shared.runtime().cloned() else {
                log::warn!("connect polled outside of a tokio runtime");
                let error = CameraError::Backend("no tokio runtime".to_string());
                self.shared.transition(&mut inner, Status::error(error.to_string()));
                return;
            };
            inner.teardown();
            inner.epoch += 1;
            self.shared.transition(&mut inner, Status::new(TorchState::Starting));
            (inner.epoch, runtime)
        };

        log::info!("requesting camera");
        let constraints = self.shared.config.constraints();
        let pending = Pending{shared: &self.shared, epoch, armed: true};
        let result = self.shared.provider.acquire(&constraints).await;
        pending.disarm();
        self.shared.install(epoch, runtime, result);
    }

    /// Releases the camera and returns to `idle`. Safe to call at any time.
    pub fn disconnect(&self) {
        let mut inner = self.shared.lock();
        inner.epoch += 1;
        if inner.teardown() {
            log::info!("camera released");
        }
        self.shared.transition(&mut inner, Status::new(TorchState::Idle));
    }

    /// Records the user's choice; the torch follows through the next effect.
    pub fn set_selection(&self, selection: LightSelection) {
        let mut inner = self.shared.lock();
        if inner.selection == selection {return;}
        inner.selection = selection;
        self.shared.reconcile(&mut inner);
    }

    pub fn set_color(&self, color: Color) {
        let selection = LightSelection{color, ..self.selection()};
        self.set_selection(selection);
    }

    pub fn set_mode(&self, mode: LightMode) {
        let selection = LightSelection{mode, ..self.selection()};
        self.set_selection(selection);
    }

    /// Switches the torch directly. Best effort: returns whether the hardware took it.
    pub async fn apply_torch(&self, on: bool) -> bool {
        let Some((flash, ticket)) = self.shared.armed() else {return false};
        self.shared.apply(&flash, on, ticket).await
    }
}

impl Drop for TorchController {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for TorchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("TorchController")
            .field("status", &inner.status)
            .field("selection", &inner.selection)
            .finish()
    }
}
