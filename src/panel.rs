use serde::Serialize;

use crate::controller::TorchController;
use crate::selection::{Color, LightMode, LightSelection};
use crate::state::TorchState;

/// Something the user did on the penlight page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Connect,
    Disconnect,
    SelectColor(Color),
    SelectMode(LightMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    /// Torch is on and a colour is selected.
    Lit,
    /// Connected, waiting for the selection to light the torch.
    Standby,
}

impl Indicator {
    pub fn label(&self) -> &'static str {
        match self {
            Indicator::Lit => "Torch on",
            Indicator::Standby => "Standing by",
        }
    }
}

/// Everything the page renders, derived from controller state and selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct View {
    pub state: TorchState,
    pub message: Option<String>,
    pub selection: LightSelection,
    pub connect_button: bool,
    pub indicator: Option<Indicator>,
    pub backdrop: Color,
    pub strobe: bool,
}

/// Headless model of the penlight page: feeds intents to the controller and
/// derives the view.
pub struct Panel {
    controller: TorchController,
}

impl Panel {
    pub fn new(controller: TorchController) -> Self {
        Panel{controller}
    }

    pub fn controller(&self) -> &TorchController {&self.controller}

    pub async fn handle(&self, intent: Intent) {
        log::trace!("intent {intent:?}");
        match intent {
            Intent::Connect => self.controller.connect().await,
            Intent::Disconnect => self.controller.disconnect(),
            Intent::SelectColor(color) => self.controller.set_color(color),
            Intent::SelectMode(mode) => self.controller.set_mode(mode),
        }
    }

    pub fn view(&self) -> View {
        let status = self.controller.status();
        let selection = self.controller.selection();
        let connect_button = status.state.can_connect();
        let indicator = match connect_button {
            true => None,
            false if !selection.color.is_off() && status.state == TorchState::On => Some(Indicator::Lit),
            false => Some(Indicator::Standby),
        };
        let backdrop = match selection.mode {
            LightMode::Solid if !selection.color.is_off() => selection.color,
            _ => Color::BLACK,
        };
        View{
            state: status.state,
            message: status.message,
            selection,
            connect_button,
            indicator,
            backdrop,
            strobe: selection.mode == LightMode::Pulse && !selection.color.is_off(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{CameraError, SimulatedCamera};
    use crate::runtime::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn idle_page_offers_connect() {
        let panel = Panel::new(TorchController::new(SimulatedCamera::new()));
        let view = panel.view();
        assert!(view.connect_button);
        assert_eq!(view.indicator, None);
        assert_eq!(view.backdrop, Color::Rgb(255, 0, 0));
        assert!(!view.strobe);
    }

    #[tokio::test(start_paused = true)]
    async fn connected_solid_colour_is_lit() {
        let panel = Panel::new(TorchController::new(SimulatedCamera::new()));
        panel.handle(Intent::Connect).await;
        settle().await;
        let view = panel.view();
        assert_eq!(view.state, TorchState::On);
        assert!(!view.connect_button);
        assert_eq!(view.indicator, Some(Indicator::Lit));
    }

    #[tokio::test(start_paused = true)]
    async fn off_colour_stands_by_on_black() {
        let panel = Panel::new(TorchController::new(SimulatedCamera::new()));
        panel.handle(Intent::Connect).await;
        panel.handle(Intent::SelectColor(Color::Off)).await;
        settle().await;
        let view = panel.view();
        assert_eq!(view.state, TorchState::Off);
        assert_eq!(view.indicator, Some(Indicator::Standby));
        assert_eq!(view.backdrop, Color::BLACK);
    }

    #[tokio::test(start_paused = true)]
    async fn pulse_strobes_on_black() {
        let panel = Panel::new(TorchController::new(SimulatedCamera::new()));
        panel.handle(Intent::SelectMode(LightMode::Pulse)).await;
        let view = panel.view();
        assert!(view.strobe);
        assert_eq!(view.backdrop, Color::BLACK);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_shows_message_and_retry() {
        let camera = SimulatedCamera::new();
        camera.deny(CameraError::InsecureContext);
        let panel = Panel::new(TorchController::new(camera));
        panel.handle(Intent::Connect).await;
        let view = panel.view();
        assert_eq!(view.state, TorchState::Error);
        assert_eq!(view.message.as_deref(), Some("Camera needs HTTPS or Localhost"));
        assert!(view.connect_button);
    }
}
