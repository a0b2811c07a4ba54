//! Typed property sets carried by elements.
//!
//! Each view kind has an explicit field set instead of a string-keyed bag.
//! Every directive is optional so that a partial set can be layered over a
//! base set with [`Merge`].

use templatekit_macros::Merge;

use crate::element::Properties;
use crate::event::{Callback, Event};

/// Type-checked override: fields present in `overrides` replace the ones in
/// `self`, nested property groups merge field by field.
pub trait Merge {
    fn merge(&mut self, overrides: Self);

    fn merged(mut self, overrides: Self) -> Self
    where
        Self: Sized,
    {
        self.merge(overrides);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SelfAlignment {
    Auto,
    Start,
    Center,
    End,
    Stretch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const CLEAR: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `0xRRGGBB`.
    pub const fn from_hex(hex: u32) -> Self {
        Self::rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Merge)]
pub struct LayoutProperties {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub margin_top: Option<f32>,
    pub margin_bottom: Option<f32>,
    pub margin_left: Option<f32>,
    pub margin_right: Option<f32>,
    pub self_alignment: Option<SelfAlignment>,
    pub flex_grow: Option<f32>,
}

impl LayoutProperties {
    pub fn sized(width: f32, height: f32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Merge)]
pub struct StyleProperties {
    pub background_color: Option<Color>,
    pub opacity: Option<f32>,
    pub corner_radius: Option<f32>,
}

/// Handlers are stored as values and invoked directly by the node that
/// receives the gesture.
#[derive(Clone, Debug, Default, PartialEq, Merge)]
pub struct GestureProperties {
    pub on_tap: Option<Callback<Event>>,
    pub on_double_tap: Option<Callback<Event>>,
    pub on_long_press: Option<Callback<Event>>,
}

impl GestureProperties {
    pub fn is_empty(&self) -> bool {
        self.on_tap.is_none() && self.on_double_tap.is_none() && self.on_long_press.is_none()
    }
}

/// Properties common to every view.
#[derive(Clone, Debug, Default, PartialEq, Merge)]
pub struct BaseProperties {
    pub key: Option<String>,
    pub layout: LayoutProperties,
    pub style: StyleProperties,
    pub gestures: GestureProperties,
}

impl BaseProperties {
    pub fn keyed(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }
}

impl Properties for BaseProperties {
    fn base(&self) -> Option<&BaseProperties> {
        Some(self)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContentMode {
    ScaleToFill,
    #[default]
    ScaleAspectFit,
    ScaleAspectFill,
    Center,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImageSource {
    Url(String),
    Named(String),
}

#[derive(Clone, Debug, Default, PartialEq, Merge)]
pub struct ImageProperties {
    pub base: BaseProperties,
    pub content_mode: Option<ContentMode>,
    pub source: Option<ImageSource>,
}

impl ImageProperties {
    pub fn content_mode(&self) -> ContentMode {
        self.content_mode.unwrap_or_default()
    }
}

impl Properties for ImageProperties {
    fn base(&self) -> Option<&BaseProperties> {
        Some(&self.base)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Merge)]
pub struct TextProperties {
    pub base: BaseProperties,
    pub text: Option<String>,
    pub font_size: Option<f32>,
    pub color: Option<Color>,
}

impl TextProperties {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

impl Properties for TextProperties {
    fn base(&self) -> Option<&BaseProperties> {
        Some(&self.base)
    }
}
