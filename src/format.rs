//! Cell formats and the workbook-wide format table
//!
//! A [`Format`] is a plain value: building one does not touch the workbook.
//! Writing a cell with a format registers a copy of it in the [`FormatTable`],
//! so changing the `Format` afterwards only affects later writes.

use std::hash::{Hash, Hasher};

use indexmap::IndexSet;

use crate::error::{Result, XlsxError};

pub(crate) const DEFAULT_FONT_NAME: &str = "Calibri";
pub(crate) const DEFAULT_FONT_SIZE: f64 = 11.0;

/// 24-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub const BLACK: Color = Color(0x000000);
    pub const BLUE: Color = Color(0x0000FF);
    pub const WHITE: Color = Color(0xFFFFFF);

    pub fn rgb(value: u32) -> Self {
        Color(value & 0xFF_FFFF)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Parse `#RRGGBB`, `RRGGBB` or one of the common color names
    pub fn parse(s: &str) -> Result<Self> {
        let named = match s.to_ascii_lowercase().as_str() {
            "black" => Some(0x000000),
            "blue" => Some(0x0000FF),
            "brown" => Some(0x800000),
            "cyan" => Some(0x00FFFF),
            "gray" | "grey" => Some(0x808080),
            "green" => Some(0x008000),
            "lime" => Some(0x00FF00),
            "magenta" => Some(0xFF00FF),
            "navy" => Some(0x000080),
            "orange" => Some(0xFF6600),
            "pink" => Some(0xFF00FF),
            "purple" => Some(0x800080),
            "red" => Some(0xFF0000),
            "silver" => Some(0xC0C0C0),
            "white" => Some(0xFFFFFF),
            "yellow" => Some(0xFFFF00),
            _ => None,
        };
        if let Some(value) = named {
            return Ok(Color(value));
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 {
            return Err(XlsxError::ParameterInvalid(format!("invalid color '{}'", s)));
        }
        u32::from_str_radix(hex, 16)
            .map(Color)
            .map_err(|_| XlsxError::ParameterInvalid(format!("invalid color '{}'", s)))
    }

    /// `FFRRGGBB` as used by the `rgb` attribute
    pub(crate) fn argb_hex(&self) -> String {
        format!("FF{:06X}", self.0)
    }
}

impl From<u32> for Color {
    fn from(value: u32) -> Self {
        Color::rgb(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Underline {
    #[default]
    None,
    Single,
    Double,
    SingleAccounting,
    DoubleAccounting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Pattern {
    #[default]
    None,
    Solid,
    MediumGray,
    DarkGray,
    LightGray,
    DarkHorizontal,
    DarkVertical,
    LightHorizontal,
    LightVertical,
    Gray125,
    Gray0625,
}

impl Pattern {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Pattern::None => "none",
            Pattern::Solid => "solid",
            Pattern::MediumGray => "mediumGray",
            Pattern::DarkGray => "darkGray",
            Pattern::LightGray => "lightGray",
            Pattern::DarkHorizontal => "darkHorizontal",
            Pattern::DarkVertical => "darkVertical",
            Pattern::LightHorizontal => "lightHorizontal",
            Pattern::LightVertical => "lightVertical",
            Pattern::Gray125 => "gray125",
            Pattern::Gray0625 => "gray0625",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Medium,
    Dashed,
    Dotted,
    Thick,
    Double,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

impl BorderStyle {
    pub(crate) fn as_str(&self) -> Option<&'static str> {
        match self {
            BorderStyle::None => None,
            BorderStyle::Thin => Some("thin"),
            BorderStyle::Medium => Some("medium"),
            BorderStyle::Dashed => Some("dashed"),
            BorderStyle::Dotted => Some("dotted"),
            BorderStyle::Thick => Some("thick"),
            BorderStyle::Double => Some("double"),
            BorderStyle::Hair => Some("hair"),
            BorderStyle::MediumDashed => Some("mediumDashed"),
            BorderStyle::DashDot => Some("dashDot"),
            BorderStyle::MediumDashDot => Some("mediumDashDot"),
            BorderStyle::DashDotDot => Some("dashDotDot"),
            BorderStyle::MediumDashDotDot => Some("mediumDashDotDot"),
            BorderStyle::SlantDashDot => Some("slantDashDot"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HorizontalAlign {
    #[default]
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterAcross,
    Distributed,
}

impl HorizontalAlign {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            HorizontalAlign::General => "general",
            HorizontalAlign::Left => "left",
            HorizontalAlign::Center => "center",
            HorizontalAlign::Right => "right",
            HorizontalAlign::Fill => "fill",
            HorizontalAlign::Justify => "justify",
            HorizontalAlign::CenterAcross => "centerContinuous",
            HorizontalAlign::Distributed => "distributed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerticalAlign {
    #[default]
    Bottom,
    Top,
    Center,
    Justify,
    Distributed,
}

impl VerticalAlign {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            VerticalAlign::Bottom => "bottom",
            VerticalAlign::Top => "top",
            VerticalAlign::Center => "center",
            VerticalAlign::Justify => "justify",
            VerticalAlign::Distributed => "distributed",
        }
    }
}

/// Font part of a format; also used for rich-string runs
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Font {
    pub bold: bool,
    pub italic: bool,
    pub underline: Underline,
    pub strikeout: bool,
    pub name: String,
    pub size: f64,
    pub color: Option<Color>,
}

impl Default for Font {
    fn default() -> Self {
        Font {
            bold: false,
            italic: false,
            underline: Underline::None,
            strikeout: false,
            name: DEFAULT_FONT_NAME.to_string(),
            size: DEFAULT_FONT_SIZE,
            color: None,
        }
    }
}

// Sizes are validated finite and positive, so bitwise equality is total.
impl Eq for Font {}

impl Hash for Font {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bold.hash(state);
        self.italic.hash(state);
        self.underline.hash(state);
        self.strikeout.hash(state);
        self.name.hash(state);
        self.size.to_bits().hash(state);
        self.color.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub(crate) struct Fill {
    pub pattern: Pattern,
    pub bg_color: Option<Color>,
    pub fg_color: Option<Color>,
}

impl Fill {
    /// A background color without an explicit pattern means a solid fill
    /// painted with that color, the way spreadsheet users expect.
    pub(crate) fn normalized(&self) -> Fill {
        let mut fill = self.clone();
        if matches!(fill.pattern, Pattern::None | Pattern::Solid) && fill.bg_color.is_some() {
            if fill.fg_color.is_none() {
                fill.fg_color = fill.bg_color.take();
            }
            fill.pattern = Pattern::Solid;
        }
        if fill.pattern == Pattern::None && fill.fg_color.is_some() {
            fill.pattern = Pattern::Solid;
        }
        fill
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub(crate) struct Border {
    pub left: BorderStyle,
    pub right: BorderStyle,
    pub top: BorderStyle,
    pub bottom: BorderStyle,
    pub left_color: Option<Color>,
    pub right_color: Option<Color>,
    pub top_color: Option<Color>,
    pub bottom_color: Option<Color>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub(crate) struct Alignment {
    pub horizontal: HorizontalAlign,
    pub vertical: VerticalAlign,
    pub wrap: bool,
    pub rotation: i16,
    pub indent: u8,
    pub shrink: bool,
}

/// A bundle of cell style attributes
///
/// ```
/// use impeller::Format;
///
/// let zebra = Format::new().set_italic().set_bg_color_str("#d3d3d3").unwrap();
/// let header = Format::new().set_bold();
/// assert_ne!(zebra, header);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Format {
    pub(crate) font: Font,
    pub(crate) fill: Fill,
    pub(crate) border: Border,
    pub(crate) num_format: String,
    pub(crate) alignment: Alignment,
}

impl Format {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bold(mut self) -> Self {
        self.font.bold = true;
        self
    }

    pub fn set_italic(mut self) -> Self {
        self.font.italic = true;
        self
    }

    pub fn set_underline(mut self, underline: Underline) -> Self {
        self.font.underline = underline;
        self
    }

    pub fn set_font_strikeout(mut self) -> Self {
        self.font.strikeout = true;
        self
    }

    pub fn set_font_name(mut self, name: &str) -> Self {
        if name.is_empty() {
            log::warn!("ignoring empty font name");
        } else {
            self.font.name = name.to_string();
        }
        self
    }

    /// Font size in points; non-finite or non-positive sizes are ignored
    pub fn set_font_size(mut self, size: f64) -> Self {
        if size.is_finite() && size > 0.0 {
            self.font.size = size;
        } else {
            log::warn!("ignoring invalid font size {}", size);
        }
        self
    }

    pub fn set_font_color(mut self, color: impl Into<Color>) -> Self {
        self.font.color = Some(color.into());
        self
    }

    pub fn set_pattern(mut self, pattern: Pattern) -> Self {
        self.fill.pattern = pattern;
        self
    }

    pub fn set_bg_color(mut self, color: impl Into<Color>) -> Self {
        self.fill.bg_color = Some(color.into());
        self
    }

    /// Background color from `#RRGGBB` or a color name
    pub fn set_bg_color_str(self, color: &str) -> Result<Self> {
        Ok(self.set_bg_color(Color::parse(color)?))
    }

    pub fn set_fg_color(mut self, color: impl Into<Color>) -> Self {
        self.fill.fg_color = Some(color.into());
        self
    }

    /// Same style on all four sides
    pub fn set_border(self, style: BorderStyle) -> Self {
        self.set_border_left(style)
            .set_border_right(style)
            .set_border_top(style)
            .set_border_bottom(style)
    }

    pub fn set_border_color(mut self, color: impl Into<Color>) -> Self {
        let color = Some(color.into());
        self.border.left_color = color;
        self.border.right_color = color;
        self.border.top_color = color;
        self.border.bottom_color = color;
        self
    }

    pub fn set_border_left(mut self, style: BorderStyle) -> Self {
        self.border.left = style;
        self
    }

    pub fn set_border_right(mut self, style: BorderStyle) -> Self {
        self.border.right = style;
        self
    }

    pub fn set_border_top(mut self, style: BorderStyle) -> Self {
        self.border.top = style;
        self
    }

    pub fn set_border_bottom(mut self, style: BorderStyle) -> Self {
        self.border.bottom = style;
        self
    }

    /// Number format code such as `0.00%` or `yyyy-mm-dd`
    pub fn set_num_format(mut self, num_format: &str) -> Self {
        self.num_format = num_format.to_string();
        self
    }

    pub fn set_align(mut self, align: HorizontalAlign) -> Self {
        self.alignment.horizontal = align;
        self
    }

    pub fn set_valign(mut self, align: VerticalAlign) -> Self {
        self.alignment.vertical = align;
        self
    }

    pub fn set_text_wrap(mut self) -> Self {
        self.alignment.wrap = true;
        self
    }

    pub fn set_shrink(mut self) -> Self {
        self.alignment.shrink = true;
        self
    }

    /// Text rotation in degrees (-90..=90) or 270 for stacked text
    pub fn set_rotation(mut self, degrees: i16) -> Self {
        if (-90..=90).contains(&degrees) || degrees == 270 {
            self.alignment.rotation = degrees;
        } else {
            log::warn!("ignoring rotation {} outside -90..=90", degrees);
        }
        self
    }

    pub fn set_indent(mut self, level: u8) -> Self {
        self.alignment.indent = level;
        self
    }

    pub fn num_format(&self) -> &str {
        &self.num_format
    }

    pub fn is_bold(&self) -> bool {
        self.font.bold
    }

    pub fn is_italic(&self) -> bool {
        self.font.italic
    }

    /// Format used for hyperlink cells written without an explicit format
    pub(crate) fn hyperlink() -> Self {
        Format::new()
            .set_underline(Underline::Single)
            .set_font_color(Color::BLUE)
    }
}

/// Deduplicating, append-only table of registered formats
///
/// Index 0 is always the default format.
#[derive(Debug)]
pub struct FormatTable {
    formats: IndexSet<Format>,
}

impl FormatTable {
    pub fn new() -> Self {
        let mut formats = IndexSet::new();
        formats.insert(Format::default());
        FormatTable { formats }
    }

    /// Register a copy of `format` and get its index
    pub fn register(&mut self, format: &Format) -> u32 {
        if let Some(index) = self.formats.get_index_of(format) {
            return index as u32;
        }
        let (index, _) = self.formats.insert_full(format.clone());
        index as u32
    }

    /// Index for an optional cell format
    pub(crate) fn index_for(&mut self, format: Option<&Format>) -> u32 {
        format.map(|f| self.register(f)).unwrap_or(0)
    }

    pub fn get(&self, index: u32) -> Option<&Format> {
        self.formats.get_index(index as usize)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Format> {
        self.formats.iter()
    }
}

impl Default for FormatTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_index_zero() {
        let mut table = FormatTable::new();
        assert_eq!(table.len(), 1);
        assert_eq!(table.register(&Format::new()), 0);
        assert_eq!(table.index_for(None), 0);
    }

    #[test]
    fn test_equal_formats_collapse() {
        let mut table = FormatTable::new();
        let bold_a = Format::new().set_bold();
        let bold_b = Format::new().set_bold();
        let italic = Format::new().set_italic();

        assert_eq!(table.register(&bold_a), 1);
        assert_eq!(table.register(&bold_b), 1);
        assert_eq!(table.register(&italic), 2);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_copy_on_register() {
        let mut table = FormatTable::new();
        let format = Format::new().set_bold();
        let first = table.register(&format);

        let format = format.set_italic();
        let second = table.register(&format);

        assert_ne!(first, second);
        assert!(!table.get(first).unwrap().is_italic());
    }

    #[test]
    fn test_color_parse() {
        assert_eq!(Color::parse("#d3d3d3").unwrap().value(), 0xD3D3D3);
        assert_eq!(Color::parse("red").unwrap().value(), 0xFF0000);
        assert_eq!(Color::parse("00FF00").unwrap().argb_hex(), "FF00FF00");
        assert!(Color::parse("#12").is_err());
        assert!(Color::parse("#zzzzzz").is_err());
    }

    #[test]
    fn test_font_size_validation() {
        let format = Format::new().set_font_size(f64::NAN).set_font_size(-1.0);
        assert_eq!(format.font.size, DEFAULT_FONT_SIZE);
        assert_eq!(Format::new().set_font_size(14.0).font.size, 14.0);
    }

    #[test]
    fn test_bg_color_becomes_solid_fill() {
        let fill = Format::new().set_bg_color(0xD3D3D3).fill.normalized();
        assert_eq!(fill.pattern, Pattern::Solid);
        assert_eq!(fill.fg_color, Some(Color::rgb(0xD3D3D3)));
        assert_eq!(fill.bg_color, None);
    }
}
