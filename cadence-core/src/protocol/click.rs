use serde::{Deserialize, Serialize};

/// Mouse buttons as numbered by X11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    ScrollUp,
    ScrollDown,
    Other(u32),
}

impl From<u32> for MouseButton {
    fn from(code: u32) -> Self {
        match code {
            1 => MouseButton::Left,
            2 => MouseButton::Middle,
            3 => MouseButton::Right,
            4 => MouseButton::ScrollUp,
            5 => MouseButton::ScrollDown,
            n => MouseButton::Other(n),
        }
    }
}

/// One click object from the bar. Fields past `x`/`y` depend on the bar
/// version and are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub button: u32,
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl ClickEvent {
    /// A bare click at `(x, y)` aimed at `instance`.
    pub fn new(instance: impl Into<String>, button: u32, x: i32, y: i32) -> Self {
        Self {
            name: None,
            instance: Some(instance.into()),
            button,
            x,
            y,
            modifiers: Vec::new(),
            relative_x: None,
            relative_y: None,
            output_x: None,
            output_y: None,
            width: None,
            height: None,
            scale: None,
        }
    }

    pub fn mouse_button(&self) -> MouseButton {
        MouseButton::from(self.button)
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}
