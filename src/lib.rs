//! Penlight: drives a device's camera torch from a colour/pulse selector.
//!
//! A [`TorchController`] owns the camera session handed out by a
//! [`CameraProvider`](hardware::CameraProvider) and keeps the torch in line with
//! the current [`LightSelection`]: dark when the colour is off, lit in solid mode,
//! strobing every `pulse_interval_ms` in pulse mode. A [`Panel`] sits where the
//! page would and turns user intents into controller calls.

mod state;
pub use state::{Status, TorchState};

mod selection;
pub use selection::{Color, ColorError, LightMode, LightSelection, ModeError, Swatch, PALETTE};

mod config;
pub use config::{ConfigError, TorchConfig, DEFAULT_PULSE_INTERVAL_MS};

pub mod hardware;
pub use crate::hardware::{CameraError, TorchError};

pub mod runtime;

mod controller;
pub use controller::TorchController;

mod panel;
pub use panel::{Indicator, Intent, Panel, View};

mod logger;
pub use logger::{Logger, LOG_ENV};

pub mod prelude {
    pub use crate::{Color, Intent, LightMode, LightSelection, Panel, TorchConfig, TorchController, TorchState};
    pub use crate::hardware::{CameraProvider, SimulatedCamera};
}
