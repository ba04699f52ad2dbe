use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid colour {0:?}: expected #RRGGBB, #RGB, a palette name or \"off\"")]
pub struct ColorError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid light mode {0:?}: expected solid or pulse")]
pub struct ModeError(pub String);

/// Target colour of the penlight. `Off` keeps the torch dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Color {
    Rgb(u8, u8, u8),
    Off,
}

impl Color {
    pub const BLACK: Color = Color::Rgb(0, 0, 0);

    pub fn is_off(&self) -> bool {
        matches!(self, Color::Off)
    }

    fn parse_hex(hex: &str) -> Option<Color> {
        let digits = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Color::Rgb(digits(&hex[0..2])?, digits(&hex[2..4])?, digits(&hex[4..6])?)),
            3 => {
                let mut channels = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
                Some(Color::Rgb(channels.next()??, channels.next()??, channels.next()??))
            }
            _ => None,
        }
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("off") || trimmed.eq_ignore_ascii_case("transparent") {
            return Ok(Color::Off);
        }
        if let Some(hex) = trimmed.strip_prefix('#') {
            if hex.chars().all(|c| c.is_ascii_hexdigit()) {
                if let Some(color) = Color::parse_hex(hex) {
                    return Ok(color);
                }
            }
            return Err(ColorError(s.to_string()));
        }
        Swatch::find(trimmed).map(|swatch| swatch.color).ok_or_else(|| ColorError(s.to_string()))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorError;
    fn try_from(value: String) -> Result<Self, Self::Error> {value.parse()}
}

impl From<Color> for String {
    fn from(color: Color) -> String {color.to_string()}
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Rgb(r, g, b) => write!(f, "#{r:02X}{g:02X}{b:02X}"),
            Color::Off => write!(f, "off"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightMode {
    #[default]
    Solid,
    Pulse,
}

impl FromStr for LightMode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solid" => Ok(LightMode::Solid),
            "pulse" => Ok(LightMode::Pulse),
            _ => Err(ModeError(s.to_string())),
        }
    }
}

impl std::fmt::Display for LightMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LightMode::Solid => write!(f, "solid"),
            LightMode::Pulse => write!(f, "pulse"),
        }
    }
}

/// The user's chosen target. Written by the UI, read by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LightSelection {
    pub color: Color,
    pub mode: LightMode,
}

impl LightSelection {
    pub fn new(color: Color, mode: LightMode) -> Self {
        LightSelection{color, mode}
    }

    pub fn solid(color: Color) -> Self {
        LightSelection::new(color, LightMode::Solid)
    }

    pub fn pulse(color: Color) -> Self {
        LightSelection::new(color, LightMode::Pulse)
    }

    pub fn off() -> Self {
        LightSelection::new(Color::Off, LightMode::Solid)
    }
}

impl Default for LightSelection {
    fn default() -> Self {
        LightSelection::solid(PALETTE[0].color)
    }
}

/// A named entry of the selector palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swatch {
    pub name: &'static str,
    pub color: Color,
}

impl Swatch {
    pub fn find(name: &str) -> Option<&'static Swatch> {
        PALETTE.iter().find(|swatch| swatch.name.eq_ignore_ascii_case(name))
    }
}

pub const PALETTE: [Swatch; 15] = [
    Swatch{name: "Red", color: Color::Rgb(0xFF, 0x00, 0x00)},
    Swatch{name: "Blue", color: Color::Rgb(0x00, 0x00, 0xFF)},
    Swatch{name: "White", color: Color::Rgb(0xFF, 0xFF, 0xFF)},
    Swatch{name: "Orange", color: Color::Rgb(0xFF, 0xA5, 0x00)},
    Swatch{name: "Green", color: Color::Rgb(0x00, 0x80, 0x00)},
    Swatch{name: "Purple", color: Color::Rgb(0x80, 0x00, 0x80)},
    Swatch{name: "Pink", color: Color::Rgb(0xFF, 0xC0, 0xCB)},
    Swatch{name: "Yellow", color: Color::Rgb(0xFF, 0xFF, 0x00)},
    Swatch{name: "Light Green", color: Color::Rgb(0x90, 0xEE, 0x90)},
    Swatch{name: "Light Blue", color: Color::Rgb(0xAD, 0xD8, 0xE6)},
    Swatch{name: "Light Pink", color: Color::Rgb(0xFF, 0xB6, 0xC1)},
    Swatch{name: "Violet", color: Color::Rgb(0xEE, 0x82, 0xEE)},
    Swatch{name: "Lime", color: Color::Rgb(0x00, 0xFF, 0x00)},
    Swatch{name: "Turquoise", color: Color::Rgb(0x40, 0xE0, 0xD0)},
    Swatch{name: "OFF", color: Color::Off},
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!("#FF0000".parse::<Color>().unwrap(), Color::Rgb(255, 0, 0));
        assert_eq!("#90ee90".parse::<Color>().unwrap(), Color::Rgb(0x90, 0xEE, 0x90));
        assert_eq!("#0f8".parse::<Color>().unwrap(), Color::Rgb(0x00, 0xFF, 0x88));
    }

    #[test]
    fn parses_off_aliases_and_palette_names() {
        assert_eq!("transparent".parse::<Color>().unwrap(), Color::Off);
        assert_eq!(" OFF ".parse::<Color>().unwrap(), Color::Off);
        assert_eq!("light blue".parse::<Color>().unwrap(), Color::Rgb(0xAD, 0xD8, 0xE6));
    }

    #[test]
    fn rejects_garbage() {
        assert!("#12345".parse::<Color>().is_err());
        assert!("#GG0000".parse::<Color>().is_err());
        assert!("#+F0000".parse::<Color>().is_err());
        assert!("#ÿÿÿ".parse::<Color>().is_err());
        assert!("magenta".parse::<Color>().is_err());
    }

    #[test]
    fn displays_as_upper_hex() {
        assert_eq!(Color::Rgb(0x40, 0xE0, 0xD0).to_string(), "#40E0D0");
        assert_eq!(Color::Off.to_string(), "off");
    }

    #[test]
    fn selection_serializes_with_string_colour() {
        let json = serde_json::to_string(&LightSelection::pulse(Color::Rgb(255, 0, 0))).unwrap();
        assert_eq!(json, r##"{"color":"#FF0000","mode":"pulse"}"##);
        let back: LightSelection = serde_json::from_str(r#"{"color":"transparent","mode":"solid"}"#).unwrap();
        assert_eq!(back, LightSelection::off());
    }

    #[test]
    fn default_is_first_swatch_solid() {
        let selection = LightSelection::default();
        assert_eq!(selection.color, Color::Rgb(255, 0, 0));
        assert_eq!(selection.mode, LightMode::Solid);
    }

    #[test]
    fn palette_ends_with_off() {
        assert!(PALETTE[PALETTE.len() - 1].color.is_off());
        assert_eq!(PALETTE.iter().filter(|s| s.color.is_off()).count(), 1);
    }
}
