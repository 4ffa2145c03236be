//! Block state and snapshots.
//!
//! A [`State`] is what a block says about itself: the text plus whatever
//! optional i3bar fields it cares about. A [`Snapshot`] is the state the
//! runner actually emits, with `name` and `instance` stamped on top.

use serde::{Deserialize, Serialize};

/// Conventional colors (i3status palette).
pub struct Color;

impl Color {
    pub const GOOD: &'static str = "#00FF00";
    pub const WARN: &'static str = "#FFFF00";
    pub const URGENT: &'static str = "#FF0000";
    pub const NEUTRAL: Option<&'static str> = None;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Markup {
    None,
    Pango,
}

/// `min_width` is either a pixel count or a sample string whose rendered
/// width is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MinWidth {
    Pixels(u32),
    Text(String),
}

impl From<u32> for MinWidth {
    fn from(px: u32) -> Self {
        MinWidth::Pixels(px)
    }
}

impl From<&str> for MinWidth {
    fn from(sample: &str) -> Self {
        MinWidth::Text(sample.to_string())
    }
}

/// Protocol fields a block controls. `full_text` is always emitted;
/// every `None` field is left out of the JSON entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub full_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_top: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_right: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_bottom: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_left: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<MinWidth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator_block_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<Markup>,
}

impl State {
    pub fn text(full_text: impl Into<String>) -> Self {
        Self {
            full_text: full_text.into(),
            ..Self::default()
        }
    }

    pub fn with_short_text(mut self, short_text: impl Into<String>) -> Self {
        self.short_text = Some(short_text.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Like [`State::with_color`], but a `None` leaves the field untouched.
    pub fn with_optional_color(mut self, color: Option<&str>) -> Self {
        if let Some(color) = color {
            self.color = Some(color.to_string());
        }
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = Some(background.into());
        self
    }

    pub fn with_border(mut self, border: impl Into<String>) -> Self {
        self.border = Some(border.into());
        self
    }

    pub fn with_min_width(mut self, min_width: impl Into<MinWidth>) -> Self {
        self.min_width = Some(min_width.into());
        self
    }

    pub fn with_align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    pub fn with_urgent(mut self, urgent: bool) -> Self {
        self.urgent = Some(urgent);
        self
    }

    pub fn with_separator(mut self, separator: bool) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn with_separator_block_width(mut self, width: u32) -> Self {
        self.separator_block_width = Some(width);
        self
    }

    pub fn with_markup(mut self, markup: Markup) -> Self {
        self.markup = Some(markup);
        self
    }

    /// Layer `self` on top of `defaults`: every field set here wins, every
    /// field left `None` falls back to the default. `full_text` always comes
    /// from `self`.
    pub fn merged_over(self, defaults: &State) -> State {
        State {
            full_text: self.full_text,
            short_text: self.short_text.or_else(|| defaults.short_text.clone()),
            color: self.color.or_else(|| defaults.color.clone()),
            background: self.background.or_else(|| defaults.background.clone()),
            border: self.border.or_else(|| defaults.border.clone()),
            border_top: self.border_top.or(defaults.border_top),
            border_right: self.border_right.or(defaults.border_right),
            border_bottom: self.border_bottom.or(defaults.border_bottom),
            border_left: self.border_left.or(defaults.border_left),
            min_width: self.min_width.or_else(|| defaults.min_width.clone()),
            align: self.align.or(defaults.align),
            urgent: self.urgent.or(defaults.urgent),
            separator: self.separator.or(defaults.separator),
            separator_block_width: self
                .separator_block_width
                .or(defaults.separator_block_width),
            markup: self.markup.or(defaults.markup),
        }
    }
}

/// One rendering of one block. Immutable once built; the registry swaps
/// whole snapshots rather than editing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub instance: String,
    #[serde(flatten)]
    pub state: State,
}

impl Snapshot {
    pub fn new(name: impl Into<String>, instance: impl Into<String>, state: State) -> Self {
        Self {
            name: name.into(),
            instance: instance.into(),
            state,
        }
    }

    pub fn full_text(&self) -> &str {
        &self.state.full_text
    }
}
