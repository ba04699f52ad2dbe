use serde::{Deserialize, Serialize};

/// Lifecycle of the torch controller. Only the controller moves between these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorchState {
    #[default]
    Idle,
    Starting,
    Ready,
    On,
    Off,
    Error,
}

impl TorchState {
    /// Ready, On or Off: a session with a torch capability is installed.
    pub fn is_connected(&self) -> bool {
        matches!(self, TorchState::Ready | TorchState::On | TorchState::Off)
    }

    /// Whether `connect` would start an acquisition from this state.
    pub fn can_connect(&self) -> bool {
        matches!(self, TorchState::Idle | TorchState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TorchState::Idle => "idle",
            TorchState::Starting => "starting",
            TorchState::Ready => "ready",
            TorchState::On => "on",
            TorchState::Off => "off",
            TorchState::Error => "error",
        }
    }
}

impl std::fmt::Display for TorchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {write!(f, "{}", self.as_str())}
}

/// What a renderer needs: the state plus the message of the last failed connect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub state: TorchState,
    pub message: Option<String>,
}

impl Status {
    pub fn new(state: TorchState) -> Self {
        Status{state, message: None}
    }

    pub fn error(message: impl Into<String>) -> Self {
        Status{state: TorchState::Error, message: Some(message.into())}
    }
}
