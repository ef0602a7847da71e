//! Validated slide-deck entities.
//!
//! Everything in this module is *trusted*: values only come into existence
//! through the [`crate::pipeline::validate`] stage (or through a caller that
//! constructs them directly), so downstream code never re-checks ranges.
//!
//! Element identity is purely positional — an element is "the element at
//! index `i` of a page", nothing more. Updating an element after the fact
//! (asset back-fill, region extraction) therefore replaces the whole value at
//! that index via [`Page::replace_element`] rather than mutating a field, so
//! a `Page` reads as a consistent snapshot at every observation point.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// Pattern is a literal; compilation cannot fail.
static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid hex colour pattern"));

// ── Geometry ─────────────────────────────────────────────────────────────

/// Position on the deck canvas, measured from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

/// Extent of an element. The validator guarantees both axes are ≥ 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

// ── Colour ───────────────────────────────────────────────────────────────

/// An `#RRGGBB` colour, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    /// Parse a `#RRGGBB` string.
    pub fn from_hex(hex: &str) -> Result<Self, ValidationError> {
        if HEX_COLOR.is_match(hex) {
            Ok(Self(hex.to_string()))
        } else {
            Err(ValidationError::InvalidColor {
                value: hex.to_string(),
            })
        }
    }

    /// Build from RGB components.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(format!("#{r:02x}{g:02x}{b:02x}"))
    }

    pub fn black() -> Self {
        Self("#000000".to_string())
    }

    pub fn white() -> Self {
        Self("#FFFFFF".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ── Deck configuration ───────────────────────────────────────────────────

/// Canonical slide-deck page formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeckSize {
    #[serde(rename = "16:9")]
    Widescreen16x9,
    #[serde(rename = "4:3")]
    Standard4x3,
    #[serde(rename = "A4")]
    A4,
    #[serde(rename = "letter")]
    Letter,
    #[serde(rename = "custom")]
    Custom,
}

impl DeckSize {
    /// Match the wire string used in composition JSON (`"16:9"`, `"A4"`, …).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "16:9" => Some(Self::Widescreen16x9),
            "4:3" => Some(Self::Standard4x3),
            "A4" | "a4" => Some(Self::A4),
            "letter" | "Letter" => Some(Self::Letter),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// The wire string, inverse of [`DeckSize::parse`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Widescreen16x9 => "16:9",
            Self::Standard4x3 => "4:3",
            Self::A4 => "A4",
            Self::Letter => "letter",
            Self::Custom => "custom",
        }
    }

    /// Canonical pixel dimensions; `None` for [`DeckSize::Custom`], which
    /// carries explicit width/height on the [`DeckConfig`] instead.
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            Self::Widescreen16x9 => Some((1920, 1080)),
            Self::Standard4x3 => Some((1024, 768)),
            Self::A4 => Some((1123, 794)),
            Self::Letter => Some((1056, 816)),
            Self::Custom => None,
        }
    }
}

/// Deck-wide background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Background {
    Color(Color),
    Image(String),
    None,
}

impl Default for Background {
    fn default() -> Self {
        Background::Color(Color::white())
    }
}

/// Global configuration for one deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckConfig {
    pub size: DeckSize,
    /// Canvas width in pixels; derived from `size` except for `Custom`.
    pub width: u32,
    /// Canvas height in pixels; derived from `size` except for `Custom`.
    pub height: u32,
    pub theme: String,
    pub background: Background,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            size: DeckSize::Widescreen16x9,
            width: 1920,
            height: 1080,
            theme: "default".to_string(),
            background: Background::default(),
        }
    }
}

// ── Elements ─────────────────────────────────────────────────────────────

/// Font settings for a text element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontConfig {
    pub family: String,
    pub size: u32,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: "Arial".to_string(),
            size: 18,
            color: Color::black(),
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            "justify" => Some(Self::Justify),
            _ => None,
        }
    }
}

/// How an image is fitted into its element box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Fit within the box, preserving aspect ratio (may letterbox).
    #[default]
    Contain,
    /// Cover the whole box, preserving aspect ratio (may crop).
    Cover,
    /// Stretch to the box, ignoring aspect ratio.
    Fill,
}

impl FitMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "contain" => Some(Self::Contain),
            "cover" => Some(Self::Cover),
            "fill" => Some(Self::Fill),
            _ => None,
        }
    }
}

/// A block of text on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub position: Position,
    pub size: Size,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    pub content: String,
    #[serde(default)]
    pub font: FontConfig,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f32,
}

/// An image placed on a page. `source` starts as whatever the model emitted
/// (a placeholder, a description, a crop id) and is rewritten by asset
/// generation or region extraction before rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageElement {
    pub position: Position,
    pub size: Size,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    pub source: String,
    #[serde(default)]
    pub fit_mode: FitMode,
    #[serde(default)]
    pub alt_text: String,
}

fn default_opacity() -> f32 {
    1.0
}

fn default_line_spacing() -> f32 {
    1.0
}

/// Closed tagged union of everything that can sit on a page.
///
/// The validator maps unrecognised `"type"` discriminators to *no* element
/// (dropped with a warning), so this enum never needs an "unknown" arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Text(TextElement),
    Image(ImageElement),
}

impl Element {
    pub fn position(&self) -> Position {
        match self {
            Element::Text(t) => t.position,
            Element::Image(i) => i.position,
        }
    }

    pub fn size(&self) -> Size {
        match self {
            Element::Text(t) => t.size,
            Element::Image(i) => i.size,
        }
    }

    pub fn z_index(&self) -> i32 {
        match self {
            Element::Text(t) => t.z_index,
            Element::Image(i) => i.z_index,
        }
    }

    pub fn opacity(&self) -> f32 {
        match self {
            Element::Text(t) => t.opacity,
            Element::Image(i) => i.opacity,
        }
    }
}

// ── Page ─────────────────────────────────────────────────────────────────

/// One validated slide.
///
/// `elements` preserves insertion order (the storage order); render order is
/// the derived z-index order from [`Page::elements_by_z_index`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based position within the deck; array order is authoritative.
    pub index: usize,
    pub title: Option<String>,
    pub background_color: Option<Color>,
    pub elements: Vec<Element>,
}

impl Page {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            title: None,
            background_color: None,
            elements: Vec::new(),
        }
    }

    /// Render order: ascending z-index, back to front. Stable for equal
    /// z-indexes, and non-destructive — storage order is untouched.
    pub fn elements_by_z_index(&self) -> Vec<&Element> {
        let mut ordered: Vec<&Element> = self.elements.iter().collect();
        ordered.sort_by_key(|e| e.z_index());
        ordered
    }

    pub fn text_elements(&self) -> impl Iterator<Item = &TextElement> {
        self.elements.iter().filter_map(|e| match e {
            Element::Text(t) => Some(t),
            Element::Image(_) => None,
        })
    }

    pub fn image_elements(&self) -> impl Iterator<Item = &ImageElement> {
        self.elements.iter().filter_map(|e| match e {
            Element::Image(i) => Some(i),
            Element::Text(_) => None,
        })
    }

    /// Replace the element at `index` with a new value.
    ///
    /// This is the only sanctioned way to "edit" an element: the old value is
    /// swapped out wholesale, never partially mutated.
    pub fn replace_element(&mut self, index: usize, element: Element) {
        if index < self.elements.len() {
            self.elements[index] = element;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_at(z: i32, content: &str) -> Element {
        Element::Text(TextElement {
            position: Position { x: 0, y: 0 },
            size: Size {
                width: 10,
                height: 10,
            },
            z_index: z,
            opacity: 1.0,
            content: content.to_string(),
            font: FontConfig::default(),
            alignment: Alignment::Left,
            line_spacing: 1.0,
        })
    }

    #[test]
    fn color_from_rgb() {
        assert_eq!(Color::from_rgb(255, 0, 0).as_str(), "#ff0000");
        assert_eq!(Color::from_rgb(0, 0, 0), Color::black());
    }

    #[test]
    fn color_from_hex_rejects_junk() {
        assert!(Color::from_hex("#FFAA00").is_ok());
        assert!(Color::from_hex("#FFAA0").is_err());
        assert!(Color::from_hex("red").is_err());
        assert!(Color::from_hex("#GGGGGG").is_err());
    }

    #[test]
    fn deck_size_parse_and_dimensions() {
        assert_eq!(DeckSize::parse("16:9"), Some(DeckSize::Widescreen16x9));
        assert_eq!(DeckSize::parse("nope"), None);
        assert_eq!(DeckSize::Widescreen16x9.dimensions(), Some((1920, 1080)));
        assert_eq!(DeckSize::Custom.dimensions(), None);
    }

    #[test]
    fn z_order_is_stable_and_non_destructive() {
        let mut page = Page::new(1);
        page.elements.push(text_at(2, "a"));
        page.elements.push(text_at(0, "b"));
        page.elements.push(text_at(2, "c"));

        let ordered: Vec<&str> = page
            .elements_by_z_index()
            .iter()
            .map(|e| match e {
                Element::Text(t) => t.content.as_str(),
                Element::Image(_) => unreachable!(),
            })
            .collect();
        assert_eq!(ordered, vec!["b", "a", "c"]);

        // Storage order untouched
        match &page.elements[0] {
            Element::Text(t) => assert_eq!(t.content, "a"),
            Element::Image(_) => unreachable!(),
        }
    }

    #[test]
    fn replace_element_swaps_whole_value() {
        let mut page = Page::new(1);
        page.elements.push(text_at(0, "old"));
        page.replace_element(0, text_at(5, "new"));
        assert_eq!(page.elements.len(), 1);
        assert_eq!(page.elements[0].z_index(), 5);

        // Out-of-range index is a no-op
        page.replace_element(9, text_at(0, "ghost"));
        assert_eq!(page.elements.len(), 1);
    }
}
