//! The Composition Validator: untrusted model JSON → typed deck entities.
//!
//! The model's output is treated as hostile input. Two kinds of defect get
//! two different treatments:
//!
//! * **Malformed optional data degrades silently** (with a warning): unknown
//!   element types are dropped, unknown alignments fall back to left,
//!   unparseable colours fall back to black, the deck config fills in its
//!   documented defaults.
//! * **Missing required data aborts the whole parse**: an element with no
//!   content, source, position, or size raises [`ValidationError`] for its
//!   page and no partial result is returned.
//!
//! Page indexes are assigned from array position (1-based); any index field
//! the model emits is ignored — array order is authoritative.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::deck::{
    Alignment, Background, Color, DeckConfig, DeckSize, Element, FitMode, FontConfig,
    ImageElement, Page, Position, Size, TextElement,
};
use crate::error::ValidationError;

/// Parse a full composition object: `{slideConfig: {...}, pages: [...]}`.
pub fn parse_composition(raw: &Value) -> Result<(DeckConfig, Vec<Page>), ValidationError> {
    let config = parse_deck_config(raw.get("slideConfig").unwrap_or(&Value::Null))?;
    let empty = Vec::new();
    let raw_pages = raw
        .get("pages")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let pages = parse_pages(raw_pages)?;
    Ok((config, pages))
}

/// Parse the deck-level config, filling in `{size: "16:9", theme: "default"}`
/// for missing fields. Unknown fields are ignored.
pub fn parse_deck_config(data: &Value) -> Result<DeckConfig, ValidationError> {
    let size_str = data.get("size").and_then(Value::as_str).unwrap_or("16:9");
    let size = DeckSize::parse(size_str).ok_or_else(|| ValidationError::DeckConfig {
        detail: format!("unknown deck size '{size_str}'"),
    })?;

    let (width, height) = match size.dimensions() {
        Some(dims) => dims,
        None => {
            // Custom size must spell out its canvas.
            let width = data.get("width").and_then(Value::as_u64);
            let height = data.get("height").and_then(Value::as_u64);
            match (width, height) {
                (Some(w), Some(h)) if w > 0 && h > 0 => (w as u32, h as u32),
                _ => {
                    return Err(ValidationError::DeckConfig {
                        detail: "custom size requires explicit positive width and height".into(),
                    })
                }
            }
        }
    };

    let theme = data
        .get("theme")
        .and_then(Value::as_str)
        .unwrap_or("default")
        .to_string();

    let background = match data.get("background") {
        Some(value) => parse_background(value),
        None => Background::default(),
    };

    debug!(size = size_str, theme = %theme, "deck config parsed");
    Ok(DeckConfig {
        size,
        width,
        height,
        theme,
        background,
    })
}

/// Parse the page array. Index comes from array position; a failure on any
/// page aborts the whole call — no partial page list is ever returned.
pub fn parse_pages(raw_pages: &[Value]) -> Result<Vec<Page>, ValidationError> {
    let mut pages = Vec::with_capacity(raw_pages.len());
    for (i, raw) in raw_pages.iter().enumerate() {
        pages.push(parse_page(raw, i + 1)?);
    }
    info!(count = pages.len(), "pages parsed");
    Ok(pages)
}

fn parse_page(data: &Value, index: usize) -> Result<Page, ValidationError> {
    let title = data
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string);
    let background_color = parse_optional_color(data.get("backgroundColor"));

    let mut elements = Vec::new();
    if let Some(raw_elements) = data.get("elements").and_then(Value::as_array) {
        for raw in raw_elements {
            if let Some(element) = parse_element(raw, index)? {
                elements.push(element);
            }
        }
    }

    Ok(Page {
        index,
        title,
        background_color,
        elements,
    })
}

/// Dispatch one raw element by its `"type"` discriminator.
///
/// Returns `Ok(None)` for unrecognised types: the element is dropped with a
/// warning and its siblings are untouched.
pub fn parse_element(data: &Value, page: usize) -> Result<Option<Element>, ValidationError> {
    match data.get("type").and_then(Value::as_str) {
        Some("text") => Ok(Some(Element::Text(parse_text_element(data, page)?))),
        Some("image") => Ok(Some(Element::Image(parse_image_element(data, page)?))),
        other => {
            warn!(page, element_type = ?other, "unknown element type, dropping element");
            Ok(None)
        }
    }
}

fn parse_text_element(data: &Value, page: usize) -> Result<TextElement, ValidationError> {
    let content = data
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| missing(page, "content"))?
        .to_string();

    Ok(TextElement {
        position: parse_position(data, page)?,
        size: parse_size(data, page)?,
        z_index: parse_z_index(data),
        opacity: parse_opacity(data),
        content,
        font: parse_font(data.get("font")),
        alignment: parse_alignment(data.get("alignment")),
        line_spacing: parse_line_spacing(data),
    })
}

fn parse_image_element(data: &Value, page: usize) -> Result<ImageElement, ValidationError> {
    let source = data
        .get("source")
        .and_then(Value::as_str)
        .ok_or_else(|| missing(page, "source"))?
        .to_string();

    Ok(ImageElement {
        position: parse_position(data, page)?,
        size: parse_size(data, page)?,
        z_index: parse_z_index(data),
        opacity: parse_opacity(data),
        source,
        fit_mode: parse_fit_mode(data.get("fitMode")),
        alt_text: data
            .get("altText")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    })
}

// ── Required geometry ────────────────────────────────────────────────────

fn parse_position(data: &Value, page: usize) -> Result<Position, ValidationError> {
    let pos = data.get("position").ok_or_else(|| missing(page, "position"))?;
    let x = coerce_coordinate(pos.get("x"), page, "position.x")?;
    let y = coerce_coordinate(pos.get("y"), page, "position.y")?;
    Ok(Position { x, y })
}

fn parse_size(data: &Value, page: usize) -> Result<Size, ValidationError> {
    let size = data.get("size").ok_or_else(|| missing(page, "size"))?;
    let width = coerce_extent(size.get("width"), page, "size.width")?;
    let height = coerce_extent(size.get("height"), page, "size.height")?;
    Ok(Size { width, height })
}

/// Coerce a coordinate to a non-negative integer. Fractional values are
/// truncated; negatives are clamped to zero with a warning.
fn coerce_coordinate(
    value: Option<&Value>,
    page: usize,
    field: &str,
) -> Result<u32, ValidationError> {
    let n = value
        .and_then(Value::as_f64)
        .ok_or_else(|| missing(page, field))?;
    if !n.is_finite() {
        return Err(invalid(page, field, format!("non-finite value {n}")));
    }
    if n < 0.0 {
        warn!(page, field, value = n, "negative coordinate clamped to 0");
        return Ok(0);
    }
    Ok(n as u32)
}

/// Coerce an extent to a strictly positive integer.
fn coerce_extent(value: Option<&Value>, page: usize, field: &str) -> Result<u32, ValidationError> {
    let n = value
        .and_then(Value::as_f64)
        .ok_or_else(|| missing(page, field))?;
    if !n.is_finite() || n < 1.0 {
        return Err(invalid(page, field, format!("expected positive integer, got {n}")));
    }
    Ok(n as u32)
}

// ── Lenient optional fields ──────────────────────────────────────────────

/// Merge a raw font object over the documented defaults
/// (`Arial 18pt black`, no emphasis). Absent or junk subfields keep their
/// defaults.
pub fn parse_font(data: Option<&Value>) -> FontConfig {
    let defaults = FontConfig::default();
    let Some(data) = data else { return defaults };

    let size = match data.get("size").and_then(Value::as_f64) {
        Some(s) if s >= 1.0 && s.is_finite() => s as u32,
        Some(s) => {
            warn!(value = s, default = defaults.size, "invalid font size, using default");
            defaults.size
        }
        None => defaults.size,
    };

    FontConfig {
        family: data
            .get("family")
            .and_then(Value::as_str)
            .unwrap_or(&defaults.family)
            .to_string(),
        size,
        color: data
            .get("color")
            .map(parse_color)
            .unwrap_or(defaults.color),
        bold: data.get("bold").and_then(Value::as_bool).unwrap_or(false),
        italic: data.get("italic").and_then(Value::as_bool).unwrap_or(false),
        underline: data
            .get("underline")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

/// Lower-cased alignment match; anything unrecognised falls back to left.
pub fn parse_alignment(value: Option<&Value>) -> Alignment {
    match value.and_then(Value::as_str) {
        None => Alignment::Left,
        Some(s) => Alignment::parse(s).unwrap_or_else(|| {
            warn!(value = s, "invalid alignment, using left");
            Alignment::Left
        }),
    }
}

/// Fit-mode match; anything unrecognised falls back to contain.
pub fn parse_fit_mode(value: Option<&Value>) -> FitMode {
    match value.and_then(Value::as_str) {
        None => FitMode::Contain,
        Some(s) => FitMode::parse(s).unwrap_or_else(|| {
            warn!(value = s, "invalid fit mode, using contain");
            FitMode::Contain
        }),
    }
}

/// Accept `{red, green, blue}` (each clamped to 0–255) or `"#RRGGBB"`.
/// Any other shape yields black.
pub fn parse_color(value: &Value) -> Color {
    match value {
        Value::Object(map) => {
            let channel = |name: &str| -> u8 {
                map.get(name)
                    .and_then(Value::as_f64)
                    .map(|v| v.clamp(0.0, 255.0) as u8)
                    .unwrap_or(0)
            };
            Color::from_rgb(channel("red"), channel("green"), channel("blue"))
        }
        Value::String(s) => Color::from_hex(s).unwrap_or_else(|_| {
            warn!(value = %s, "invalid hex colour, using black");
            Color::black()
        }),
        other => {
            warn!(value = %other, "unsupported colour shape, using black");
            Color::black()
        }
    }
}

/// An optional colour field: absent or null means "no colour"; a present but
/// unparseable value degrades to absence rather than painting black.
fn parse_optional_color(value: Option<&Value>) -> Option<Color> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => match Color::from_hex(s) {
            Ok(color) => Some(color),
            Err(_) => {
                warn!(value = %s, "invalid background colour, ignoring");
                None
            }
        },
        Some(other) => {
            warn!(value = %other, "unsupported background colour shape, ignoring");
            None
        }
    }
}

/// Parse a `{type: "color"|"image", value}` background object. Unknown
/// shapes fall back to the default white background.
pub fn parse_background(data: &Value) -> Background {
    match data.get("type").and_then(Value::as_str) {
        Some("color") => Background::Color(
            data.get("value").map(parse_color).unwrap_or_else(Color::white),
        ),
        Some("image") => match data.get("value").and_then(Value::as_str) {
            Some(path) if !path.is_empty() => Background::Image(path.to_string()),
            _ => {
                warn!("image background without a value, using default");
                Background::default()
            }
        },
        other => {
            debug!(background_type = ?other, "unrecognised background, using default");
            Background::default()
        }
    }
}

pub(crate) fn parse_z_index(data: &Value) -> i32 {
    data.get("zIndex")
        .and_then(Value::as_i64)
        .map(|z| z.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
        .unwrap_or(0)
}

pub(crate) fn parse_opacity(data: &Value) -> f32 {
    data.get("opacity")
        .and_then(Value::as_f64)
        .map(|o| o.clamp(0.0, 1.0) as f32)
        .unwrap_or(1.0)
}

fn parse_line_spacing(data: &Value) -> f32 {
    match data.get("lineSpacing").and_then(Value::as_f64) {
        Some(s) if s > 0.0 && s.is_finite() => s as f32,
        Some(s) => {
            warn!(value = s, "invalid line spacing, using 1.0");
            1.0
        }
        None => 1.0,
    }
}

fn missing(page: usize, field: &str) -> ValidationError {
    ValidationError::MissingField {
        page,
        field: field.to_string(),
    }
}

fn invalid(page: usize, field: &str, detail: String) -> ValidationError {
    ValidationError::InvalidField {
        page,
        field: field.to_string(),
        detail,
    }
}
