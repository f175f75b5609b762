//! Package-level parts: content types, relationships, workbook and properties

use std::io::Write;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::properties::{CustomProperties, CustomValue, DocProperties};

use super::xml_writer::XmlWriter;

const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const DOC_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const VT_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes";
const CUSTOM_FMTID: &str = "{D5CDD505-2E9C-101B-9397-08002B2CF9AE}";
const W3CDTF: &str = "%Y-%m-%dT%H:%M:%SZ";

fn relationship<W: Write>(
    writer: &mut XmlWriter<W>,
    id: usize,
    rel_type: &str,
    target: &str,
) -> Result<()> {
    writer.start_element("Relationship")?;
    writer.attribute("Id", &format!("rId{}", id))?;
    writer.attribute("Type", rel_type)?;
    writer.attribute("Target", target)?;
    writer.close_empty_tag()
}

fn override_part<W: Write>(writer: &mut XmlWriter<W>, part: &str, content_type: &str) -> Result<()> {
    writer.start_element("Override")?;
    writer.attribute("PartName", part)?;
    writer.attribute("ContentType", content_type)?;
    writer.close_empty_tag()
}

pub(crate) fn write_content_types<W: Write>(
    sheet_count: usize,
    has_custom: bool,
    writer: &mut XmlWriter<W>,
) -> Result<()> {
    writer.declaration()?;
    writer.write_str(
        "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>",
    )?;

    override_part(
        writer,
        "/docProps/app.xml",
        "application/vnd.openxmlformats-officedocument.extended-properties+xml",
    )?;
    override_part(
        writer,
        "/docProps/core.xml",
        "application/vnd.openxmlformats-package.core-properties+xml",
    )?;
    if has_custom {
        override_part(
            writer,
            "/docProps/custom.xml",
            "application/vnd.openxmlformats-officedocument.custom-properties+xml",
        )?;
    }
    override_part(
        writer,
        "/xl/styles.xml",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml",
    )?;
    override_part(
        writer,
        "/xl/workbook.xml",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
    )?;
    for n in 1..=sheet_count {
        override_part(
            writer,
            &format!("/xl/worksheets/sheet{}.xml", n),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
        )?;
    }
    override_part(
        writer,
        "/xl/sharedStrings.xml",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml",
    )?;

    writer.end_element("Types")?;
    writer.flush()
}

pub(crate) fn write_root_rels<W: Write>(has_custom: bool, writer: &mut XmlWriter<W>) -> Result<()> {
    writer.declaration()?;
    writer.start_element("Relationships")?;
    writer.attribute("xmlns", RELS_NS)?;
    writer.close_start_tag()?;

    relationship(writer, 1, &format!("{}/officeDocument", DOC_REL), "xl/workbook.xml")?;
    relationship(
        writer,
        2,
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties",
        "docProps/core.xml",
    )?;
    relationship(
        writer,
        3,
        &format!("{}/extended-properties", DOC_REL),
        "docProps/app.xml",
    )?;
    if has_custom {
        relationship(
            writer,
            4,
            &format!("{}/custom-properties", DOC_REL),
            "docProps/custom.xml",
        )?;
    }

    writer.end_element("Relationships")?;
    writer.flush()
}

pub(crate) fn write_workbook<W: Write>(sheet_names: &[&str], writer: &mut XmlWriter<W>) -> Result<()> {
    writer.declaration()?;
    writer.start_element("workbook")?;
    writer.attribute(
        "xmlns",
        "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
    )?;
    writer.attribute("xmlns:r", DOC_REL)?;
    writer.close_start_tag()?;

    writer.write_str(
        "<bookViews><workbookView xWindow=\"240\" yWindow=\"15\" windowWidth=\"16095\" windowHeight=\"9660\"/></bookViews>",
    )?;

    writer.open_element("sheets")?;
    for (i, name) in sheet_names.iter().enumerate() {
        writer.start_element("sheet")?;
        writer.attribute("name", name)?;
        writer.attribute_int("sheetId", i + 1)?;
        writer.attribute("r:id", &format!("rId{}", i + 1))?;
        writer.close_empty_tag()?;
    }
    writer.end_element("sheets")?;

    writer.write_str("<calcPr calcId=\"124519\" fullCalcOnLoad=\"1\"/>")?;
    writer.end_element("workbook")?;
    writer.flush()
}

/// Sheets are `rId1..=N`, then styles and shared strings
pub(crate) fn write_workbook_rels<W: Write>(sheet_count: usize, writer: &mut XmlWriter<W>) -> Result<()> {
    writer.declaration()?;
    writer.start_element("Relationships")?;
    writer.attribute("xmlns", RELS_NS)?;
    writer.close_start_tag()?;

    let worksheet_rel = format!("{}/worksheet", DOC_REL);
    for n in 1..=sheet_count {
        relationship(writer, n, &worksheet_rel, &format!("worksheets/sheet{}.xml", n))?;
    }
    relationship(
        writer,
        sheet_count + 1,
        &format!("{}/styles", DOC_REL),
        "styles.xml",
    )?;
    relationship(
        writer,
        sheet_count + 2,
        &format!("{}/sharedStrings", DOC_REL),
        "sharedStrings.xml",
    )?;

    writer.end_element("Relationships")?;
    writer.flush()
}

fn optional_text<W: Write>(writer: &mut XmlWriter<W>, name: &str, text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    writer.text_element(name, text)
}

pub(crate) fn write_core_props<W: Write>(
    props: &DocProperties,
    created: DateTime<Utc>,
    writer: &mut XmlWriter<W>,
) -> Result<()> {
    let timestamp = created.format(W3CDTF).to_string();

    writer.declaration()?;
    writer.write_str(
        "<cp:coreProperties \
         xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
         xmlns:dc=\"http://purl.org/dc/elements/1.1/\" \
         xmlns:dcterms=\"http://purl.org/dc/terms/\" \
         xmlns:dcmitype=\"http://purl.org/dc/dcmitype/\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">",
    )?;

    optional_text(writer, "dc:title", &props.title)?;
    optional_text(writer, "dc:subject", &props.subject)?;
    writer.text_element("dc:creator", &props.author)?;
    optional_text(writer, "cp:keywords", &props.keywords)?;
    optional_text(writer, "dc:description", &props.comments)?;
    writer.text_element("cp:lastModifiedBy", &props.author)?;

    for element in ["dcterms:created", "dcterms:modified"] {
        writer.start_element(element)?;
        writer.attribute("xsi:type", "dcterms:W3CDTF")?;
        writer.close_start_tag()?;
        writer.write_str(&timestamp)?;
        writer.end_element(element)?;
    }

    optional_text(writer, "cp:category", &props.category)?;
    optional_text(writer, "cp:contentStatus", &props.status)?;

    writer.end_element("cp:coreProperties")?;
    writer.flush()
}

pub(crate) fn write_app_props<W: Write>(
    props: &DocProperties,
    sheet_names: &[&str],
    writer: &mut XmlWriter<W>,
) -> Result<()> {
    writer.declaration()?;
    writer.start_element("Properties")?;
    writer.attribute(
        "xmlns",
        "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties",
    )?;
    writer.attribute("xmlns:vt", VT_NS)?;
    writer.close_start_tag()?;

    writer.write_str(
        "<Application>Microsoft Excel</Application><DocSecurity>0</DocSecurity><ScaleCrop>false</ScaleCrop>",
    )?;

    writer.write_str(
        "<HeadingPairs><vt:vector size=\"2\" baseType=\"variant\">\
         <vt:variant><vt:lpstr>Worksheets</vt:lpstr></vt:variant><vt:variant><vt:i4>",
    )?;
    writer.write_int(sheet_names.len())?;
    writer.write_str("</vt:i4></vt:variant></vt:vector></HeadingPairs>")?;

    writer.open_element("TitlesOfParts")?;
    writer.start_element("vt:vector")?;
    writer.attribute_int("size", sheet_names.len())?;
    writer.attribute("baseType", "lpstr")?;
    writer.close_start_tag()?;
    for name in sheet_names {
        writer.text_element("vt:lpstr", name)?;
    }
    writer.end_element("vt:vector")?;
    writer.end_element("TitlesOfParts")?;

    optional_text(writer, "Manager", &props.manager)?;
    writer.text_element("Company", &props.company)?;
    writer.write_str("<LinksUpToDate>false</LinksUpToDate><SharedDoc>false</SharedDoc>")?;
    optional_text(writer, "HyperlinkBase", &props.hyperlink_base)?;
    writer.write_str("<HyperlinksChanged>false</HyperlinksChanged><AppVersion>12.0000</AppVersion>")?;

    writer.end_element("Properties")?;
    writer.flush()
}

pub(crate) fn write_custom_props<W: Write>(
    custom: &CustomProperties,
    writer: &mut XmlWriter<W>,
) -> Result<()> {
    writer.declaration()?;
    writer.start_element("Properties")?;
    writer.attribute(
        "xmlns",
        "http://schemas.openxmlformats.org/officeDocument/2006/custom-properties",
    )?;
    writer.attribute("xmlns:vt", VT_NS)?;
    writer.close_start_tag()?;

    // pid 0 and 1 are reserved
    for (pid, (name, value)) in (2u32..).zip(custom.iter()) {
        writer.start_element("property")?;
        writer.attribute("fmtid", CUSTOM_FMTID)?;
        writer.attribute_int("pid", pid)?;
        writer.attribute("name", name)?;
        writer.close_start_tag()?;

        match value {
            CustomValue::Text(text) => writer.text_element("vt:lpwstr", text)?,
            CustomValue::Number(n) => {
                writer.open_element("vt:r8")?;
                writer.write_f64(*n)?;
                writer.end_element("vt:r8")?;
            }
            CustomValue::Integer(i) => {
                writer.open_element("vt:i4")?;
                writer.write_int(*i)?;
                writer.end_element("vt:i4")?;
            }
            CustomValue::Bool(b) => {
                writer.text_element("vt:bool", if *b { "true" } else { "false" })?
            }
            CustomValue::DateTime(dt) => {
                writer.text_element("vt:filetime", &dt.format(W3CDTF).to_string())?
            }
        }

        writer.end_element("property")?;
    }

    writer.end_element("Properties")?;
    writer.flush()
}
