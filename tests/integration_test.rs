//! Integration tests for impeller: write workbooks, then read the archives back

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, TimeZone, Utc};
use impeller::{
    Compression, DocProperties, ErrorKind, ErrorValue, Format, Options, Workbook, XlsxError,
};
use tempfile::TempDir;

fn open(path: &Path) -> zip::ZipArchive<File> {
    zip::ZipArchive::new(File::open(path).unwrap()).unwrap()
}

fn read_part(path: &Path, name: &str) -> String {
    let mut archive = open(path);
    let mut file = archive.by_name(name).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

fn part_names(path: &Path) -> Vec<String> {
    let mut archive = open(path);
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

fn fixed_properties() -> DocProperties {
    DocProperties::new()
        .set_author("Tester")
        .set_created(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
}

#[test]
fn test_minimal_workbook_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("minimal.xlsx");

    let mut workbook = Workbook::new(&path).unwrap();
    workbook
        .add_worksheet(None)
        .unwrap()
        .write(0, 0, "Hello", None)
        .unwrap();
    workbook.close().unwrap();

    assert_eq!(
        part_names(&path),
        [
            "docProps/core.xml",
            "docProps/app.xml",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/sharedStrings.xml",
            "xl/styles.xml",
            "xl/worksheets/sheet1.xml",
            "[Content_Types].xml",
            "_rels/.rels",
        ]
    );

    let sheet = read_part(&path, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<c r=\"A1\" t=\"s\"><v>0</v></c>"));
    let strings = read_part(&path, "xl/sharedStrings.xml");
    assert!(strings.contains("count=\"1\" uniqueCount=\"1\""));
    assert!(strings.contains("<si><t>Hello</t></si>"));
}

#[test]
fn test_number_precision_survives() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pi.xlsx");

    let mut workbook = Workbook::new(&path).unwrap();
    workbook
        .add_worksheet(None)
        .unwrap()
        .write_number(0, 0, 3.14159265358979, None)
        .unwrap();
    workbook.close().unwrap();

    let sheet = read_part(&path, "xl/worksheets/sheet1.xml");
    let start = sheet.find("<v>").unwrap() + 3;
    let end = sheet[start..].find("</v>").unwrap() + start;
    assert_eq!(sheet[start..end].parse::<f64>().unwrap(), 3.14159265358979);
}

#[test]
fn test_large_numeric_sheet() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.xlsx");

    let mut workbook = Workbook::new(&path).unwrap();
    {
        let mut sheet = workbook.add_worksheet(Some("Numbers")).unwrap();
        for row in 0..100_000u32 {
            for col in 0..10u16 {
                sheet
                    .write_number(row, col, (row as f64) * 10.0 + col as f64, None)
                    .unwrap();
            }
        }
    }
    workbook.close().unwrap();

    let strings = read_part(&path, "xl/sharedStrings.xml");
    assert!(strings.contains("uniqueCount=\"0\""));

    let sheet = read_part(&path, "xl/worksheets/sheet1.xml");
    assert_eq!(sheet.matches("<row ").count(), 100_000);
    assert!(sheet.contains("<dimension ref=\"A1:J100000\"/>"));
    assert!(sheet.contains("<c r=\"J100000\"><v>999999</v></c>"));
}

#[test]
fn test_output_is_deterministic() {
    let dir = TempDir::new().unwrap();

    let build = |name: &str| {
        let path = dir.path().join(name);
        let mut workbook = Workbook::new(&path).unwrap();
        workbook.set_properties(fixed_properties()).unwrap();
        workbook.set_custom_property("Build", 7).unwrap();
        {
            let bold = Format::new().set_bold();
            let mut sheet = workbook.add_worksheet(Some("Data")).unwrap();
            sheet.write(0, 0, "Name", Some(&bold)).unwrap();
            sheet.write(1, 0, 12.5, None).unwrap();
            sheet
                .write_url(2, 0, "https://example.com", None)
                .unwrap();
        }
        workbook.close().unwrap();
        std::fs::read(&path).unwrap()
    };

    assert_eq!(build("a.xlsx"), build("b.xlsx"));
}

#[test]
fn test_failed_close_keeps_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("existing.xlsx");
    std::fs::write(&path, b"previous contents").unwrap();

    let options = Options::new().set_tmpdir(dir.path().join("no-such-dir"));
    let mut workbook = Workbook::with_options(&path, options).unwrap();
    workbook
        .add_worksheet(None)
        .unwrap()
        .write(0, 0, 1, None)
        .unwrap();

    let err = workbook.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileWriteFailed);
    assert!(matches!(err, XlsxError::FileWriteFailed { .. }));
    assert_eq!(std::fs::read(&path).unwrap(), b"previous contents");
}

#[test]
fn test_separate_tmpdir_publishes_by_copy() {
    // /dev/shm is its own mount, so the final rename crosses filesystems
    let shm = Path::new("/dev/shm");
    if !shm.is_dir() {
        return;
    }
    let staging = TempDir::new_in(shm).unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("copied.xlsx");
    std::fs::write(&path, b"previous contents").unwrap();

    let options = Options::new().set_tmpdir(staging.path());
    let mut workbook = Workbook::with_options(&path, options).unwrap();
    workbook
        .add_worksheet(None)
        .unwrap()
        .write(0, 0, "moved", None)
        .unwrap();
    workbook.close().unwrap();

    assert!(read_part(&path, "xl/sharedStrings.xml").contains("<t>moved</t>"));
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_store_compression_is_readable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stored.xlsx");

    let options = Options::new().set_compression(Compression::Store);
    let mut workbook = Workbook::with_options(&path, options).unwrap();
    workbook
        .add_worksheet(None)
        .unwrap()
        .write(0, 0, "stored", None)
        .unwrap();
    workbook.close().unwrap();

    let mut archive = open(&path);
    for i in 0..archive.len() {
        let file = archive.by_index(i).unwrap();
        assert_eq!(file.compression(), zip::CompressionMethod::Stored);
    }
    assert!(read_part(&path, "xl/sharedStrings.xml").contains("<t>stored</t>"));
}

#[test]
fn test_document_and_custom_properties() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("props.xlsx");

    let mut workbook = Workbook::new(&path).unwrap();
    workbook
        .set_properties(fixed_properties().set_title("Report").set_company("Acme"))
        .unwrap();
    workbook.set_custom_property("Checked by", "Eve").unwrap();
    workbook.set_custom_property("Ratio", 0.25).unwrap();
    workbook.set_custom_property("Checked by", "Bob").unwrap();
    workbook.add_worksheet(Some("Summary")).unwrap();
    workbook.close().unwrap();

    let core = read_part(&path, "docProps/core.xml");
    assert!(core.contains("<dc:title>Report</dc:title>"));
    assert!(core.contains("2024-01-01T00:00:00Z"));

    let app = read_part(&path, "docProps/app.xml");
    assert!(app.contains("<vt:lpstr>Summary</vt:lpstr>"));
    assert!(app.contains("<Company>Acme</Company>"));

    let custom = read_part(&path, "docProps/custom.xml");
    assert!(custom.contains("pid=\"2\" name=\"Checked by\"><vt:lpwstr>Bob</vt:lpwstr>"));
    assert!(custom.contains("pid=\"3\" name=\"Ratio\"><vt:r8>0.25</vt:r8>"));
    assert!(!custom.contains("Eve"));

    assert!(read_part(&path, "[Content_Types].xml").contains("/docProps/custom.xml"));
    assert!(read_part(&path, "_rels/.rels").contains("docProps/custom.xml"));
}

#[test]
fn test_hyperlink_relationships() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("links.xlsx");

    let mut workbook = Workbook::new(&path).unwrap();
    {
        let mut first = workbook.add_worksheet(Some("Links")).unwrap();
        first.write_url(0, 0, "https://example.com", None).unwrap();
        first.write_url(1, 0, "internal:Other!A1", None).unwrap();
    }
    workbook
        .add_worksheet(Some("Other"))
        .unwrap()
        .write_url(0, 0, "internal:Links!A1", None)
        .unwrap();
    workbook.close().unwrap();

    let names = part_names(&path);
    assert!(names.contains(&"xl/worksheets/_rels/sheet1.xml.rels".to_string()));
    assert!(!names.contains(&"xl/worksheets/_rels/sheet2.xml.rels".to_string()));

    let rels = read_part(&path, "xl/worksheets/_rels/sheet1.xml.rels");
    assert!(rels.contains("Target=\"https://example.com\" TargetMode=\"External\""));

    let styles = read_part(&path, "xl/styles.xml");
    assert!(styles.contains("<u/>"));
    assert!(styles.contains("rgb=\"FF0000FF\""));
}

#[test]
fn test_dates_formats_and_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dates.xlsx");

    let mut workbook = Workbook::new(&path).unwrap();
    {
        let mut sheet = workbook.add_worksheet(None).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        sheet.write_date(0, 0, &date, None).unwrap();
        sheet
            .write_datetime(1, 0, &date.and_hms_opt(12, 0, 0).unwrap(), None)
            .unwrap();
        sheet.write_error(2, 0, ErrorValue::Div0, None).unwrap();
        sheet.write_boolean(3, 0, false, None).unwrap();
    }
    workbook.close().unwrap();

    let sheet = read_part(&path, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<c r=\"A1\" s=\"1\"><v>45292</v></c>"));
    assert!(sheet.contains("<c r=\"A2\" s=\"2\"><v>45292.5</v></c>"));
    assert!(sheet.contains("<c r=\"A3\" t=\"e\"><v>#DIV/0!</v></c>"));
    assert!(sheet.contains("<c r=\"A4\" t=\"b\"><v>0</v></c>"));

    let styles = read_part(&path, "xl/styles.xml");
    assert!(styles.contains("formatCode=\"yyyy-mm-dd\""));
    assert!(styles.contains("formatCode=\"yyyy-mm-dd hh:mm:ss\""));
}

#[test]
fn test_rich_string_and_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rich.xlsx");

    let mut workbook = Workbook::new(&path).unwrap();
    {
        let bold = Format::new().set_bold();
        let italic = Format::new().set_italic();
        let mut sheet = workbook.add_worksheet(None).unwrap();
        sheet
            .write_rich_string(
                0,
                0,
                &[(None, "This is "), (Some(&bold), "bold"), (Some(&italic), " and italic")],
                None,
            )
            .unwrap();
        sheet.set_column(0, 2, 30.0).unwrap();
        sheet.set_column_range("C:E", 50.0).unwrap();
    }
    workbook.close().unwrap();

    let strings = read_part(&path, "xl/sharedStrings.xml");
    assert!(strings.contains("<si><r><t xml:space=\"preserve\">This is </t></r><r><rPr><b/>"));
    assert!(strings.contains("<rFont val=\"Calibri\"/>"));

    let sheet = read_part(&path, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<col min=\"1\" max=\"2\" width=\"30.7109375\" customWidth=\"1\"/>"));
    assert!(sheet.contains("<col min=\"3\" max=\"5\" width=\"50.7109375\" customWidth=\"1\"/>"));
}

#[test]
fn test_error_kinds_are_reported() {
    let dir = TempDir::new().unwrap();
    let mut workbook = Workbook::new(dir.path().join("errors.xlsx")).unwrap();
    let mut sheet = workbook.add_worksheet(None).unwrap();

    let cases = [
        (sheet.write(0, 16_384, 1, None), ErrorKind::IndexOutOfRange),
        (
            sheet.write_string(0, 0, &"x".repeat(32_768), None),
            ErrorKind::StringTooLong,
        ),
        (
            sheet.write_url(0, 0, "notaurl", None),
            ErrorKind::ParameterInvalid,
        ),
    ];
    for (result, kind) in cases {
        assert_eq!(result.unwrap_err().kind(), kind);
    }

    assert_eq!(
        impeller::utility::cell_index(-1, 0).unwrap_err().kind(),
        ErrorKind::IndexOutOfRange
    );
}

#[test]
fn test_non_finite_numbers_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("finite.xlsx");
    let mut workbook = Workbook::new(&path).unwrap();
    {
        let mut sheet = workbook.add_worksheet(None).unwrap();
        let err = sheet.write_number(0, 0, f64::NAN, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterInvalid);
        let err = sheet
            .write_formula_with_result(0, 1, "=1/0", f64::INFINITY, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterInvalid);
        sheet.write_number(0, 2, -0.0, None).unwrap();
    }
    let err = workbook
        .set_custom_property("Ratio", f64::NEG_INFINITY)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParameterInvalid);
    workbook.close().unwrap();

    let sheet = read_part(&path, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<dimension ref=\"C1\"/>"));
    assert!(sheet.contains("<c r=\"C1\"><v>-0.0</v></c>"));
    assert!(!part_names(&path).contains(&"docProps/custom.xml".to_string()));
}

#[test]
fn test_overwritten_link_and_literal_escapes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("overwrite.xlsx");
    let mut workbook = Workbook::new(&path).unwrap();
    {
        let mut sheet = workbook.add_worksheet(None).unwrap();
        sheet.write_url(0, 0, "https://example.com", None).unwrap();
        sheet.write_number(0, 0, 5.0, None).unwrap();
        sheet.write_string(1, 0, "_x0041_", None).unwrap();
    }
    workbook.close().unwrap();

    let sheet = read_part(&path, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<c r=\"A1\"><v>5</v></c>"));
    assert!(!sheet.contains("<hyperlink"));
    assert!(!part_names(&path).contains(&"xl/worksheets/_rels/sheet1.xml.rels".to_string()));
    assert!(read_part(&path, "xl/sharedStrings.xml").contains("_x005F_x0041_"));
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_output_matches_sequential() {
    let dir = TempDir::new().unwrap();

    let build = |name: &str, parallel: bool| {
        let path = dir.path().join(name);
        let options = Options::new().set_parallel(parallel);
        let mut workbook = Workbook::with_options(&path, options).unwrap();
        workbook.set_properties(fixed_properties()).unwrap();
        for s in 0..4u32 {
            let mut sheet = workbook.add_worksheet(None).unwrap();
            for row in 0..1_000u32 {
                sheet.write(row, 0, row * s, None).unwrap();
                sheet.write(row, 1, format!("r{}", row % 17), None).unwrap();
            }
        }
        workbook.close().unwrap();
        std::fs::read(&path).unwrap()
    };

    assert_eq!(build("seq.xlsx", false), build("par.xlsx", true));
}
