//! styles.xml rendering

use std::collections::HashMap;
use std::io::Write;

use crate::error::Result;
use crate::format::{
    Border, BorderStyle, Color, Fill, Font, Format, FormatTable, HorizontalAlign, Pattern,
    Underline, VerticalAlign, DEFAULT_FONT_NAME,
};

use super::xml_writer::XmlWriter;

const FIRST_CUSTOM_NUM_FORMAT: u32 = 164;

/// Number formats Excel knows by id
fn builtin_num_format(code: &str) -> Option<u32> {
    let id = match code {
        "" | "General" => 0,
        "0" => 1,
        "0.00" => 2,
        "#,##0" => 3,
        "#,##0.00" => 4,
        "0%" => 9,
        "0.00%" => 10,
        "0.00E+00" => 11,
        "# ?/?" => 12,
        "# ??/??" => 13,
        "mm-dd-yy" => 14,
        "d-mmm-yy" => 15,
        "d-mmm" => 16,
        "mmm-yy" => 17,
        "h:mm AM/PM" => 18,
        "h:mm:ss AM/PM" => 19,
        "h:mm" => 20,
        "h:mm:ss" => 21,
        "m/d/yy h:mm" => 22,
        "mm:ss" => 45,
        "[h]:mm:ss" => 46,
        "mm:ss.0" => 47,
        "##0.0E+0" => 48,
        "@" => 49,
        _ => return None,
    };
    Some(id)
}

/// Component ids of one `<xf>` entry
#[derive(Debug, Clone, Copy)]
struct XfIds {
    num_fmt: u32,
    font: u32,
    fill: u32,
    border: u32,
}

/// Deduplicated sub-tables derived from the format table
struct StyleParts<'a> {
    num_formats: Vec<(u32, &'a str)>,
    fonts: Vec<&'a Font>,
    fills: Vec<Fill>,
    borders: Vec<&'a Border>,
    xfs: Vec<XfIds>,
}

impl<'a> StyleParts<'a> {
    fn build(table: &'a FormatTable) -> Self {
        let mut num_format_ids: HashMap<&str, u32> = HashMap::new();
        let mut num_formats = Vec::new();
        let mut font_ids: HashMap<&Font, u32> = HashMap::new();
        let mut fonts = Vec::new();
        let mut fill_ids: HashMap<Fill, u32> = HashMap::new();
        // Excel requires the first two fills to be none and gray125
        let gray125 = Fill {
            pattern: Pattern::Gray125,
            ..Fill::default()
        };
        let mut fills = vec![Fill::default(), gray125.clone()];
        fill_ids.insert(Fill::default(), 0);
        fill_ids.insert(gray125, 1);
        let mut border_ids: HashMap<&Border, u32> = HashMap::new();
        let mut borders = Vec::new();
        let mut xfs = Vec::with_capacity(table.len());

        for format in table.iter() {
            let num_fmt = match builtin_num_format(&format.num_format) {
                Some(id) => id,
                None => *num_format_ids
                    .entry(format.num_format.as_str())
                    .or_insert_with(|| {
                        let id = FIRST_CUSTOM_NUM_FORMAT + num_formats.len() as u32;
                        num_formats.push((id, format.num_format.as_str()));
                        id
                    }),
            };

            let font = *font_ids.entry(&format.font).or_insert_with(|| {
                fonts.push(&format.font);
                fonts.len() as u32 - 1
            });

            let normalized = format.fill.normalized();
            let fill = match fill_ids.get(&normalized) {
                Some(&id) => id,
                None => {
                    let id = fills.len() as u32;
                    fills.push(normalized.clone());
                    fill_ids.insert(normalized, id);
                    id
                }
            };

            let border = *border_ids.entry(&format.border).or_insert_with(|| {
                borders.push(&format.border);
                borders.len() as u32 - 1
            });

            xfs.push(XfIds {
                num_fmt,
                font,
                fill,
                border,
            });
        }

        StyleParts {
            num_formats,
            fonts,
            fills,
            borders,
            xfs,
        }
    }
}

/// Write xl/styles.xml for every registered format
pub(crate) fn write_styles<W: Write>(table: &FormatTable, writer: &mut XmlWriter<W>) -> Result<()> {
    let parts = StyleParts::build(table);

    writer.declaration()?;
    writer.start_element("styleSheet")?;
    writer.attribute(
        "xmlns",
        "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
    )?;
    writer.close_start_tag()?;

    if !parts.num_formats.is_empty() {
        writer.start_element("numFmts")?;
        writer.attribute_int("count", parts.num_formats.len())?;
        writer.close_start_tag()?;
        for (id, code) in &parts.num_formats {
            writer.start_element("numFmt")?;
            writer.attribute_int("numFmtId", *id)?;
            writer.attribute("formatCode", code)?;
            writer.close_empty_tag()?;
        }
        writer.end_element("numFmts")?;
    }

    writer.start_element("fonts")?;
    writer.attribute_int("count", parts.fonts.len())?;
    writer.close_start_tag()?;
    for font in &parts.fonts {
        writer.open_element("font")?;
        write_font_properties(writer, font, false)?;
        writer.end_element("font")?;
    }
    writer.end_element("fonts")?;

    writer.start_element("fills")?;
    writer.attribute_int("count", parts.fills.len())?;
    writer.close_start_tag()?;
    for fill in &parts.fills {
        write_fill(writer, fill)?;
    }
    writer.end_element("fills")?;

    writer.start_element("borders")?;
    writer.attribute_int("count", parts.borders.len())?;
    writer.close_start_tag()?;
    for border in &parts.borders {
        write_border(writer, border)?;
    }
    writer.end_element("borders")?;

    writer.write_str(
        "<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>",
    )?;

    writer.start_element("cellXfs")?;
    writer.attribute_int("count", parts.xfs.len())?;
    writer.close_start_tag()?;
    for (format, ids) in table.iter().zip(&parts.xfs) {
        write_xf(writer, format, *ids)?;
    }
    writer.end_element("cellXfs")?;

    writer.write_str(
        "<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>\
         <dxfs count=\"0\"/>\
         <tableStyles count=\"0\" defaultTableStyle=\"TableStyleMedium9\" defaultPivotStyle=\"PivotStyleLight16\"/>",
    )?;

    writer.end_element("styleSheet")?;
    writer.flush()
}

fn write_color<W: Write>(writer: &mut XmlWriter<W>, tag: &str, color: &Color) -> Result<()> {
    writer.start_element(tag)?;
    writer.attribute("rgb", &color.argb_hex())?;
    writer.close_empty_tag()
}

/// Font children shared by `<font>` and rich-string `<rPr>`
pub(crate) fn write_font_properties<W: Write>(
    writer: &mut XmlWriter<W>,
    font: &Font,
    rich_run: bool,
) -> Result<()> {
    if font.bold {
        writer.empty_element("b")?;
    }
    if font.italic {
        writer.empty_element("i")?;
    }
    if font.strikeout {
        writer.empty_element("strike")?;
    }
    match font.underline {
        Underline::None => {}
        Underline::Single => writer.empty_element("u")?,
        Underline::Double => writer.write_str("<u val=\"double\"/>")?,
        Underline::SingleAccounting => writer.write_str("<u val=\"singleAccounting\"/>")?,
        Underline::DoubleAccounting => writer.write_str("<u val=\"doubleAccounting\"/>")?,
    }

    writer.start_element("sz")?;
    writer.attribute_f64("val", font.size)?;
    writer.close_empty_tag()?;

    match &font.color {
        Some(color) => write_color(writer, "color", color)?,
        None => writer.write_str("<color theme=\"1\"/>")?,
    }

    writer.start_element(if rich_run { "rFont" } else { "name" })?;
    writer.attribute("val", &font.name)?;
    writer.close_empty_tag()?;
    writer.write_str("<family val=\"2\"/>")?;
    if font.name == DEFAULT_FONT_NAME {
        writer.write_str("<scheme val=\"minor\"/>")?;
    }
    Ok(())
}

fn write_fill<W: Write>(writer: &mut XmlWriter<W>, fill: &Fill) -> Result<()> {
    writer.open_element("fill")?;
    writer.start_element("patternFill")?;
    writer.attribute("patternType", fill.pattern.as_str())?;

    if fill.fg_color.is_none() && fill.bg_color.is_none() {
        writer.close_empty_tag()?;
    } else {
        writer.close_start_tag()?;
        if let Some(color) = &fill.fg_color {
            write_color(writer, "fgColor", color)?;
        }
        match &fill.bg_color {
            Some(color) => write_color(writer, "bgColor", color)?,
            None => writer.write_str("<bgColor indexed=\"64\"/>")?,
        }
        writer.end_element("patternFill")?;
    }
    writer.end_element("fill")
}

fn write_border_edge<W: Write>(
    writer: &mut XmlWriter<W>,
    tag: &str,
    style: BorderStyle,
    color: Option<&Color>,
) -> Result<()> {
    let Some(style_name) = style.as_str() else {
        return writer.empty_element(tag);
    };

    writer.start_element(tag)?;
    writer.attribute("style", style_name)?;
    writer.close_start_tag()?;
    match color {
        Some(color) => write_color(writer, "color", color)?,
        None => writer.write_str("<color auto=\"1\"/>")?,
    }
    writer.end_element(tag)
}

fn write_border<W: Write>(writer: &mut XmlWriter<W>, border: &Border) -> Result<()> {
    writer.open_element("border")?;
    write_border_edge(writer, "left", border.left, border.left_color.as_ref())?;
    write_border_edge(writer, "right", border.right, border.right_color.as_ref())?;
    write_border_edge(writer, "top", border.top, border.top_color.as_ref())?;
    write_border_edge(writer, "bottom", border.bottom, border.bottom_color.as_ref())?;
    writer.empty_element("diagonal")?;
    writer.end_element("border")
}

fn write_xf<W: Write>(writer: &mut XmlWriter<W>, format: &Format, ids: XfIds) -> Result<()> {
    writer.start_element("xf")?;
    writer.attribute_int("numFmtId", ids.num_fmt)?;
    writer.attribute_int("fontId", ids.font)?;
    writer.attribute_int("fillId", ids.fill)?;
    writer.attribute_int("borderId", ids.border)?;
    writer.attribute_int("xfId", 0u32)?;
    if ids.num_fmt != 0 {
        writer.attribute("applyNumberFormat", "1")?;
    }
    if ids.font != 0 {
        writer.attribute("applyFont", "1")?;
    }
    if ids.fill != 0 {
        writer.attribute("applyFill", "1")?;
    }
    if ids.border != 0 {
        writer.attribute("applyBorder", "1")?;
    }

    let alignment = &format.alignment;
    if *alignment == Default::default() {
        return writer.close_empty_tag();
    }

    writer.attribute("applyAlignment", "1")?;
    writer.close_start_tag()?;
    writer.start_element("alignment")?;
    if alignment.horizontal != HorizontalAlign::General {
        writer.attribute("horizontal", alignment.horizontal.as_str())?;
    }
    if alignment.vertical != VerticalAlign::Bottom {
        writer.attribute("vertical", alignment.vertical.as_str())?;
    }
    if alignment.indent != 0 {
        writer.attribute_int("indent", alignment.indent)?;
    }
    if alignment.rotation != 0 {
        let rotation = match alignment.rotation {
            270 => 255,
            r if r < 0 => 90 - r,
            r => r,
        };
        writer.attribute_int("textRotation", rotation)?;
    }
    if alignment.wrap {
        writer.attribute("wrapText", "1")?;
    }
    if alignment.shrink {
        writer.attribute("shrinkToFit", "1")?;
    }
    writer.close_empty_tag()?;
    writer.end_element("xf")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(table: &FormatTable) -> String {
        let mut output = Vec::new();
        write_styles(table, &mut XmlWriter::new(&mut output)).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_default_stylesheet() {
        let xml = render(&FormatTable::new());
        assert!(xml.contains("<fonts count=\"1\">"));
        assert!(xml.contains("<fills count=\"2\">"));
        assert!(xml.contains("<cellXfs count=\"1\">"));
        assert!(!xml.contains("<numFmts"));
    }

    #[test]
    fn test_sub_tables_are_deduplicated() {
        let mut table = FormatTable::new();
        table.register(&Format::new().set_bold());
        table.register(&Format::new().set_bold().set_num_format("0.000"));
        table.register(&Format::new().set_italic().set_bg_color(0xD3D3D3));
        table.register(&Format::new().set_num_format("0.00%"));

        let xml = render(&table);
        assert!(xml.contains("<cellXfs count=\"5\">"));
        // default, bold, italic
        assert!(xml.contains("<fonts count=\"3\">"));
        assert!(xml.contains("<fills count=\"3\">"));
        assert!(xml.contains("<numFmt numFmtId=\"164\" formatCode=\"0.000\"/>"));
        assert!(xml.contains("numFmtId=\"10\""));
        assert!(xml.contains(
            "<patternFill patternType=\"solid\"><fgColor rgb=\"FFD3D3D3\"/><bgColor indexed=\"64\"/></patternFill>"
        ));
    }

    #[test]
    fn test_alignment_and_border() {
        let mut table = FormatTable::new();
        table.register(
            &Format::new()
                .set_align(HorizontalAlign::Center)
                .set_text_wrap()
                .set_border(BorderStyle::Thin)
                .set_pattern(Pattern::Gray125),
        );
        let xml = render(&table);
        assert!(xml.contains("<alignment horizontal=\"center\" wrapText=\"1\"/>"));
        assert!(xml.contains("<left style=\"thin\"><color auto=\"1\"/></left>"));
        assert!(xml.contains("<borders count=\"2\">"));
    }
}
