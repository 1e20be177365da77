//! Page mutator
//!
//! A [`MutationSpec`] is planned against one page's geometry, producing a
//! [`PageEdit`] that the document backend then carries out through the
//! [`PageSurface`] trait. Planning is pure: the same page and parameters
//! always give the same edit, independent of every other page.

use std::str::FromStr;

use super::selection::Selection;
use super::PageError;

/// Corner anchors sit this fraction of the way in from each edge
const CORNER_INSET: f32 = 0.2;

/// Distance of page numbers from the page edges, in points
pub const PAGE_NUMBER_MARGIN: f32 = 30.0;

/// Displayed page size in points plus the page's current rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    /// Clockwise display rotation, normalized to 0, 90, 180 or 270
    pub rotation: i64,
}

/// RGB colour with channels in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Parse `RRGGBB`, with or without a leading `#`
    pub fn parse(text: &str) -> Result<Self, PageError> {
        let invalid = || PageError::InvalidColor(text.to_string());
        let hex = text.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |range: std::ops::Range<usize>| -> Result<f32, PageError> {
            u8::from_str_radix(&hex[range], 16)
                .map(|v| f32::from(v) / 255.0)
                .map_err(|_| invalid())
        };

        Ok(Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl FromStr for Rgb {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Reference point for inserted text, with a top-left page origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    /// Explicit coordinates in points
    Point { x: f32, y: f32 },
}

impl Anchor {
    /// Parse a position token; unknown names fall back to the centre
    ///
    /// Besides the named anchors, `"x,y"` gives explicit coordinates.
    pub fn from_token(token: &str) -> Self {
        let token = token.trim();
        match token.to_ascii_lowercase().as_str() {
            "center" | "centre" => Anchor::Center,
            "top-left" => Anchor::TopLeft,
            "top-right" => Anchor::TopRight,
            "bottom-left" => Anchor::BottomLeft,
            "bottom-right" => Anchor::BottomRight,
            _ => parse_point(token).unwrap_or(Anchor::Center),
        }
    }

    /// Anchor position on a page of the given geometry
    pub fn resolve(&self, geometry: &PageGeometry) -> (f32, f32) {
        let (w, h) = (geometry.width, geometry.height);
        let near = CORNER_INSET;
        let far = 1.0 - CORNER_INSET;
        match *self {
            Anchor::Center => (w * 0.5, h * 0.5),
            Anchor::TopLeft => (w * near, h * near),
            Anchor::TopRight => (w * far, h * near),
            Anchor::BottomLeft => (w * near, h * far),
            Anchor::BottomRight => (w * far, h * far),
            Anchor::Point { x, y } => (x, y),
        }
    }
}

fn parse_point(token: &str) -> Option<Anchor> {
    let (x, y) = token.split_once(',')?;
    let x = x.trim().parse::<f32>().ok().filter(|v| v.is_finite())?;
    let y = y.trim().parse::<f32>().ok().filter(|v| v.is_finite())?;
    Some(Anchor::Point { x, y })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerticalEdge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HorizontalAlign {
    Left,
    Center,
    Right,
}

/// Page number placement parsed from tokens like `bottom-center`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberPosition {
    vertical: VerticalEdge,
    horizontal: HorizontalAlign,
}

impl NumberPosition {
    /// `top` anywhere in the token selects the top edge, otherwise bottom;
    /// `left`/`right` select a side, otherwise the number is centred.
    pub fn from_token(token: &str) -> Self {
        let token = token.to_ascii_lowercase();
        let vertical = if token.contains("top") {
            VerticalEdge::Top
        } else {
            VerticalEdge::Bottom
        };
        let horizontal = if token.contains("left") {
            HorizontalAlign::Left
        } else if token.contains("right") {
            HorizontalAlign::Right
        } else {
            HorizontalAlign::Center
        };
        Self {
            vertical,
            horizontal,
        }
    }

    pub fn resolve(&self, geometry: &PageGeometry, margin: f32) -> (f32, f32) {
        let y = match self.vertical {
            VerticalEdge::Top => margin,
            VerticalEdge::Bottom => geometry.height - margin,
        };
        let x = match self.horizontal {
            HorizontalAlign::Left => margin,
            HorizontalAlign::Right => geometry.width - margin,
            HorizontalAlign::Center => geometry.width / 2.0,
        };
        (x, y)
    }
}

/// Font size, colour and opacity of inserted text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub color: Rgb,
    /// 1.0 is fully opaque
    pub opacity: f32,
}

impl TextStyle {
    pub fn new(font_size: f32, color: Rgb) -> Self {
        Self {
            font_size,
            color,
            opacity: 1.0,
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = if opacity.is_finite() {
            opacity.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self
    }
}

/// Text to draw on one page
///
/// `x`/`y` locate the start of the baseline in displayed page space
/// (top-left origin, y growing downwards). The text is always drawn above
/// existing page content.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPlacement {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub style: TextStyle,
    /// Counter-clockwise text rotation in degrees
    pub angle: f32,
}

/// A per-page operation and its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum MutationSpec {
    /// Add `degrees` (a multiple of 90) to the page rotation
    Rotate { degrees: i64 },
    /// Draw text at an anchor
    InsertText {
        text: String,
        anchor: Anchor,
        style: TextStyle,
    },
    /// Draw rotated, translucent text at an anchor
    Watermark {
        text: String,
        anchor: Anchor,
        style: TextStyle,
        angle: f32,
    },
    /// Draw a page number rendered from a `{n}` / `{total}` template
    PageNumber {
        position: NumberPosition,
        template: String,
        style: TextStyle,
        start: i64,
        skip_first: bool,
    },
}

/// Concrete change for one page
#[derive(Debug, Clone, PartialEq)]
pub enum PageEdit {
    /// Set the absolute page rotation
    Rotate(i64),
    DrawText(TextPlacement),
}

impl MutationSpec {
    /// Rotation mutation; PDF only supports quarter turns
    pub fn rotate(degrees: i64) -> Result<Self, PageError> {
        if degrees % 90 != 0 {
            return Err(PageError::InvalidRotation(degrees));
        }
        Ok(MutationSpec::Rotate { degrees })
    }

    /// Short operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            MutationSpec::Rotate { .. } => "rotate",
            MutationSpec::InsertText { .. } => "insert-text",
            MutationSpec::Watermark { .. } => "watermark",
            MutationSpec::PageNumber { .. } => "page-number",
        }
    }

    /// Work out the edit for the page at `index`, if any
    pub fn plan(&self, index: usize, total_pages: usize, geometry: &PageGeometry) -> Option<PageEdit> {
        match self {
            MutationSpec::Rotate { degrees } => Some(PageEdit::Rotate(
                (geometry.rotation + degrees).rem_euclid(360),
            )),
            MutationSpec::InsertText {
                text,
                anchor,
                style,
            } => {
                if text.is_empty() {
                    return None;
                }
                let (x, y) = anchor.resolve(geometry);
                Some(PageEdit::DrawText(TextPlacement {
                    text: text.clone(),
                    x,
                    y,
                    style: *style,
                    angle: 0.0,
                }))
            }
            MutationSpec::Watermark {
                text,
                anchor,
                style,
                angle,
            } => {
                if text.is_empty() {
                    return None;
                }
                let (x, y) = anchor.resolve(geometry);
                Some(PageEdit::DrawText(TextPlacement {
                    text: text.clone(),
                    x,
                    y,
                    style: *style,
                    angle: *angle,
                }))
            }
            MutationSpec::PageNumber {
                position,
                template,
                style,
                start,
                skip_first,
            } => {
                if *skip_first && index == 0 {
                    return None;
                }
                // Offset is never negative: page 0 is skipped when skip_first is set
                let offset = index as i64 - i64::from(*skip_first);
                let number = start.saturating_add(offset);
                let text = template
                    .replace("{n}", &number.to_string())
                    .replace("{total}", &total_pages.to_string());
                let (x, y) = position.resolve(geometry, PAGE_NUMBER_MARGIN);
                Some(PageEdit::DrawText(TextPlacement {
                    text,
                    x,
                    y,
                    style: *style,
                    angle: 0.0,
                }))
            }
        }
    }
}

/// Document backend that pages can be edited through
pub trait PageSurface {
    type Error;

    fn page_count(&self) -> usize;

    fn geometry(&self, index: usize) -> Result<PageGeometry, Self::Error>;

    fn set_rotation(&mut self, index: usize, degrees: i64) -> Result<(), Self::Error>;

    fn draw_text(&mut self, index: usize, placement: &TextPlacement) -> Result<(), Self::Error>;
}

/// Apply a mutation to every selected page
///
/// Each page is edited at most once even if the selection repeats it.
/// Returns the number of pages actually changed.
pub fn apply<S: PageSurface>(
    surface: &mut S,
    selection: &Selection,
    spec: &MutationSpec,
) -> Result<usize, S::Error> {
    let total_pages = surface.page_count();
    let mut edited = 0;

    for index in selection.distinct_sorted() {
        let geometry = surface.geometry(index)?;
        match spec.plan(index, total_pages, &geometry) {
            Some(PageEdit::Rotate(degrees)) => surface.set_rotation(index, degrees)?,
            Some(PageEdit::DrawText(placement)) => surface.draw_text(index, &placement)?,
            None => continue,
        }
        edited += 1;
    }

    tracing::debug!(
        operation = spec.name(),
        selected = selection.len(),
        edited,
        "Applied page mutation"
    );

    Ok(edited)
}
