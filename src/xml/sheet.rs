//! Worksheet part and its relationships

use std::io::Write;

use crate::error::Result;
use crate::format::Format;
use crate::types::{CellData, ColNum, RowNum};
use crate::utility::push_cell_reference;
use crate::worksheet::{ColumnInfo, HyperlinkTarget, RowData, Worksheet};

use super::styles::write_font_properties;
use super::xml_writer::{escape_into, needs_preserve, push_f64, XmlWriter};

const MAX_DIGIT_WIDTH: f64 = 7.0;
const COLUMN_PADDING: f64 = 5.0;

const HYPERLINK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

/// Character width as stored in `<col width>`, rounded to whole pixels of the default font
pub(crate) fn stored_column_width(width: f64) -> f64 {
    if width <= 0.0 {
        0.0
    } else if width < 1.0 {
        let pixels = (width * (MAX_DIGIT_WIDTH + COLUMN_PADDING) + 0.5).trunc();
        (pixels / MAX_DIGIT_WIDTH * 256.0).trunc() / 256.0
    } else {
        let pixels = (width * MAX_DIGIT_WIDTH + 0.5).trunc() + COLUMN_PADDING;
        (pixels / MAX_DIGIT_WIDTH * 256.0).trunc() / 256.0
    }
}

/// Render rich-string runs to the `<r>` XML stored in the shared strings table
pub(crate) fn render_rich_runs(runs: &[(Option<&Format>, &str)]) -> Result<String> {
    let mut writer = XmlWriter::new(Vec::new());
    for (format, text) in runs {
        writer.open_element("r")?;
        if let Some(format) = format {
            writer.open_element("rPr")?;
            write_font_properties(&mut writer, &format.font, true)?;
            writer.end_element("rPr")?;
        }
        writer.start_element("t")?;
        if needs_preserve(text) {
            writer.attribute("xml:space", "preserve")?;
        }
        writer.close_start_tag()?;
        writer.write_escaped(text)?;
        writer.end_element("t")?;
        writer.end_element("r")?;
    }
    let bytes = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Serialize `sheet` as `xl/worksheets/sheetN.xml`
pub(crate) fn write_worksheet<W: Write>(
    sheet: &Worksheet,
    selected: bool,
    writer: &mut XmlWriter<W>,
) -> Result<()> {
    writer.declaration()?;
    writer.write_str(
        "<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
         xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">",
    )?;

    write_dimension(sheet, writer)?;

    writer.write_str("<sheetViews><sheetView")?;
    if selected {
        writer.attribute("tabSelected", "1")?;
    }
    writer.write_str(" workbookViewId=\"0\"/></sheetViews>")?;
    writer.write_str("<sheetFormatPr defaultRowHeight=\"15\"/>")?;

    write_columns(sheet, writer)?;
    write_sheet_data(sheet, writer)?;
    write_hyperlinks(sheet, writer)?;

    writer.write_str(
        "<pageMargins left=\"0.7\" right=\"0.7\" top=\"0.75\" bottom=\"0.75\" header=\"0.3\" footer=\"0.3\"/>",
    )?;
    writer.end_element("worksheet")?;
    writer.flush()
}

fn write_dimension<W: Write>(sheet: &Worksheet, writer: &mut XmlWriter<W>) -> Result<()> {
    let mut range = Vec::with_capacity(16);
    match sheet.dimensions() {
        None => range.extend_from_slice(b"A1"),
        Some(d) => {
            push_cell_reference(&mut range, d.first_row, d.first_col);
            if (d.first_row, d.first_col) != (d.last_row, d.last_col) {
                range.push(b':');
                push_cell_reference(&mut range, d.last_row, d.last_col);
            }
        }
    }
    writer.write_str("<dimension ref=\"")?;
    writer.write_raw(&range)?;
    writer.write_str("\"/>")
}

/// Coalesce consecutive columns with identical settings into `<col>` spans
fn column_spans(sheet: &Worksheet) -> Vec<(ColNum, ColNum, ColumnInfo)> {
    let mut spans: Vec<(ColNum, ColNum, ColumnInfo)> = Vec::new();
    for (&col, info) in &sheet.columns {
        if let Some((_, last, prev)) = spans.last_mut() {
            if *last + 1 == col && *prev == *info {
                *last = col;
                continue;
            }
        }
        spans.push((col, col, *info));
    }
    spans
}

fn write_columns<W: Write>(sheet: &Worksheet, writer: &mut XmlWriter<W>) -> Result<()> {
    let spans = column_spans(sheet);
    if spans.is_empty() {
        return Ok(());
    }

    writer.open_element("cols")?;
    for (first, last, info) in spans {
        writer.start_element("col")?;
        writer.attribute_int("min", first as u32 + 1)?;
        writer.attribute_int("max", last as u32 + 1)?;
        writer.attribute_f64("width", stored_column_width(info.width))?;
        if info.format != 0 {
            writer.attribute_int("style", info.format)?;
        }
        if info.width == 0.0 {
            writer.attribute("hidden", "1")?;
        }
        writer.attribute("customWidth", "1")?;
        writer.close_empty_tag()?;
    }
    writer.end_element("cols")
}

fn write_sheet_data<W: Write>(sheet: &Worksheet, writer: &mut XmlWriter<W>) -> Result<()> {
    if sheet.rows.is_empty() {
        return writer.empty_element("sheetData");
    }

    writer.open_element("sheetData")?;
    let mut scratch = Vec::with_capacity(256);
    for (&row, data) in &sheet.rows {
        scratch.clear();
        push_row(&mut scratch, row, data);
        writer.write_raw(&scratch)?;
    }
    writer.end_element("sheetData")
}

fn push_row(buf: &mut Vec<u8>, row: RowNum, data: &RowData) {
    let mut num = itoa::Buffer::new();

    buf.extend_from_slice(b"<row r=\"");
    buf.extend_from_slice(num.format(row + 1).as_bytes());
    buf.push(b'"');
    if data.format != 0 {
        buf.extend_from_slice(b" s=\"");
        buf.extend_from_slice(num.format(data.format).as_bytes());
        buf.extend_from_slice(b"\" customFormat=\"1\"");
    }
    if let Some(height) = data.height {
        buf.extend_from_slice(b" ht=\"");
        push_f64(buf, height);
        buf.push(b'"');
        if height == 0.0 {
            buf.extend_from_slice(b" hidden=\"1\"");
        }
        buf.extend_from_slice(b" customHeight=\"1\"");
    }

    if data.cells.is_empty() {
        buf.extend_from_slice(b"/>");
        return;
    }
    buf.push(b'>');

    for (&col, cell) in &data.cells {
        buf.extend_from_slice(b"<c r=\"");
        push_cell_reference(buf, row, col);
        buf.push(b'"');
        if cell.format != 0 {
            buf.extend_from_slice(b" s=\"");
            buf.extend_from_slice(num.format(cell.format).as_bytes());
            buf.push(b'"');
        }

        match &cell.value {
            CellData::Blank => buf.extend_from_slice(b"/>"),
            CellData::Number(v) | CellData::DateTime(v) => {
                buf.extend_from_slice(b"><v>");
                push_f64(buf, *v);
                buf.extend_from_slice(b"</v></c>");
            }
            CellData::String(index) => {
                buf.extend_from_slice(b" t=\"s\"><v>");
                buf.extend_from_slice(num.format(*index).as_bytes());
                buf.extend_from_slice(b"</v></c>");
            }
            CellData::Formula { formula, result } => {
                buf.extend_from_slice(b"><f>");
                escape_into(buf, formula, false);
                buf.extend_from_slice(b"</f><v>");
                push_f64(buf, *result);
                buf.extend_from_slice(b"</v></c>");
            }
            CellData::Boolean(b) => {
                buf.extend_from_slice(b" t=\"b\"><v>");
                buf.push(if *b { b'1' } else { b'0' });
                buf.extend_from_slice(b"</v></c>");
            }
            CellData::Error(e) => {
                buf.extend_from_slice(b" t=\"e\"><v>");
                escape_into(buf, e.as_str(), false);
                buf.extend_from_slice(b"</v></c>");
            }
        }
    }
    buf.extend_from_slice(b"</row>");
}

fn write_hyperlinks<W: Write>(sheet: &Worksheet, writer: &mut XmlWriter<W>) -> Result<()> {
    if sheet.hyperlinks.is_empty() {
        return Ok(());
    }

    let mut reference = Vec::with_capacity(10);
    let mut rel_id = 0u32;
    writer.open_element("hyperlinks")?;
    for (&(row, col), link) in &sheet.hyperlinks {
        reference.clear();
        push_cell_reference(&mut reference, row, col);
        writer.write_str("<hyperlink ref=\"")?;
        writer.write_raw(&reference)?;
        writer.write_str("\"")?;
        match &link.target {
            HyperlinkTarget::External(_) => {
                rel_id += 1;
                writer.attribute("r:id", &format!("rId{}", rel_id))?;
            }
            HyperlinkTarget::Internal(location) => {
                writer.attribute("location", location)?;
                writer.attribute("display", location)?;
            }
        }
        if let Some(tooltip) = &link.tooltip {
            writer.attribute("tooltip", tooltip)?;
        }
        writer.close_empty_tag()?;
    }
    writer.end_element("hyperlinks")
}

/// Serialize `xl/worksheets/_rels/sheetN.xml.rels`; only called when the
/// sheet has external links
pub(crate) fn write_sheet_rels<W: Write>(sheet: &Worksheet, writer: &mut XmlWriter<W>) -> Result<()> {
    writer.declaration()?;
    writer.write_str(
        "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    )?;

    let targets = sheet.hyperlinks.values().filter_map(|link| match &link.target {
        HyperlinkTarget::External(url) => Some(url),
        HyperlinkTarget::Internal(_) => None,
    });
    for (i, url) in targets.enumerate() {
        writer.start_element("Relationship")?;
        writer.attribute("Id", &format!("rId{}", i + 1))?;
        writer.attribute("Type", HYPERLINK_REL_TYPE)?;
        writer.attribute("Target", url)?;
        writer.attribute("TargetMode", "External")?;
        writer.close_empty_tag()?;
    }

    writer.end_element("Relationships")?;
    writer.flush()
}
