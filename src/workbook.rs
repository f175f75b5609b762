//! Workbook: owns the worksheets and the shared tables, and packages them on close

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::error::{Result, XlsxError};
use crate::format::{Format, FormatTable};
use crate::options::Options;
use crate::packager::Packager;
use crate::properties::{CustomProperties, CustomValue, DocProperties};
use crate::shared_strings::SharedStringTable;
use crate::utility::validate_sheet_name;
use crate::worksheet::{Worksheet, WorksheetId, WorksheetWriter};
use crate::xml::parts::{
    write_app_props, write_content_types, write_core_props, write_custom_props, write_root_rels,
    write_workbook, write_workbook_rels,
};
use crate::xml::sheet::{write_sheet_rels, write_worksheet};
use crate::xml::styles::write_styles;
use crate::xml::xml_writer::XmlWriter;

const OUTPUT_BUFFER_SIZE: usize = 64 * 1024;

/// An in-memory workbook written out as a single `.xlsx` file by [`close`](Workbook::close)
///
/// Nothing touches the destination until `close`: the package is assembled in
/// a temporary file next to it and renamed into place, so the path either
/// holds a complete workbook or is left as it was.
///
/// ```no_run
/// use impeller::Workbook;
///
/// let mut workbook = Workbook::new("hello.xlsx")?;
/// let mut sheet = workbook.add_worksheet(None)?;
/// sheet.write(0, 0, "Hello", None)?;
/// sheet.write(0, 1, 42, None)?;
/// workbook.close()?;
/// # Ok::<(), impeller::XlsxError>(())
/// ```
#[derive(Debug)]
pub struct Workbook {
    path: PathBuf,
    options: Options,
    worksheets: Vec<Worksheet>,
    strings: SharedStringTable,
    formats: FormatTable,
    properties: DocProperties,
    custom: CustomProperties,
    closed: bool,
}

impl Workbook {
    /// Create a workbook that will be written to `path` with default options
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_options(path, Options::default())
    }

    pub fn with_options<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(XlsxError::ParameterInvalid(
                "output path must not be empty".to_string(),
            ));
        }

        log::debug!("new workbook for {}", path.display());
        Ok(Workbook {
            path: path.to_path_buf(),
            options,
            worksheets: Vec::new(),
            strings: SharedStringTable::new(),
            formats: FormatTable::new(),
            properties: DocProperties::default(),
            custom: CustomProperties::default(),
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(XlsxError::WorkbookClosed);
        }
        Ok(())
    }

    fn name_in_use(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.worksheets
            .iter()
            .any(|sheet| sheet.name().to_lowercase() == lower)
    }

    /// Lowest `SheetN` not taken yet
    fn next_default_name(&self) -> String {
        (1..)
            .map(|n| format!("Sheet{}", n))
            .find(|name| !self.name_in_use(name))
            .unwrap_or_default()
    }

    /// Append a worksheet, named `SheetN` when `name` is `None`
    ///
    /// Names are compared case-insensitively.
    pub fn add_worksheet(&mut self, name: Option<&str>) -> Result<WorksheetWriter<'_>> {
        self.ensure_open()?;

        let name = match name {
            Some(name) => {
                validate_sheet_name(name)?;
                if self.name_in_use(name) {
                    return Err(XlsxError::SheetNameAlreadyUsed(name.to_string()));
                }
                name.to_string()
            }
            None => self.next_default_name(),
        };

        let id = WorksheetId(self.worksheets.len());
        log::debug!("adding worksheet '{}' at position {}", name, id.0);
        self.worksheets.push(Worksheet::new(name));
        self.writer(id)
    }

    /// Writer for a previously added worksheet
    pub fn worksheet(&mut self, id: WorksheetId) -> Result<WorksheetWriter<'_>> {
        self.ensure_open()?;
        self.writer(id)
    }

    pub fn worksheet_by_name(&mut self, name: &str) -> Result<WorksheetWriter<'_>> {
        self.ensure_open()?;
        let lower = name.to_lowercase();
        let index = self
            .worksheets
            .iter()
            .position(|sheet| sheet.name().to_lowercase() == lower)
            .ok_or_else(|| XlsxError::WorksheetNotFound(name.to_string()))?;
        self.writer(WorksheetId(index))
    }

    fn writer(&mut self, id: WorksheetId) -> Result<WorksheetWriter<'_>> {
        let sheet = self
            .worksheets
            .get_mut(id.0)
            .ok_or_else(|| XlsxError::WorksheetNotFound(format!("#{}", id.0)))?;
        Ok(WorksheetWriter {
            id,
            sheet,
            strings: &mut self.strings,
            formats: &mut self.formats,
            options: &self.options,
        })
    }

    /// Read access to a worksheet's buffered content
    pub fn get_worksheet(&self, id: WorksheetId) -> Option<&Worksheet> {
        self.worksheets.get(id.0)
    }

    pub fn worksheet_count(&self) -> usize {
        self.worksheets.len()
    }

    pub fn worksheet_names(&self) -> Vec<&str> {
        self.worksheets.iter().map(|sheet| sheet.name()).collect()
    }

    /// A fresh default format; formats are registered when first used in a write
    pub fn add_format(&self) -> Format {
        Format::new()
    }

    pub fn shared_strings(&self) -> &SharedStringTable {
        &self.strings
    }

    pub fn formats(&self) -> &FormatTable {
        &self.formats
    }

    pub fn set_properties(&mut self, properties: DocProperties) -> Result<()> {
        self.ensure_open()?;
        self.properties = properties;
        Ok(())
    }

    /// Set a user-defined document property; setting a name again replaces its value
    pub fn set_custom_property(&mut self, name: &str, value: impl Into<CustomValue>) -> Result<()> {
        self.ensure_open()?;
        self.custom.set(name, value.into())
    }

    /// Serialize every part and publish the file at the workbook path
    ///
    /// A workbook without worksheets gets an empty `Sheet1`. On failure the
    /// destination is untouched and the workbook stays open, so `close` may be
    /// retried; after success further calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            log::warn!("{} is already closed", self.path.display());
            return Ok(());
        }
        if self.worksheets.is_empty() {
            self.add_worksheet(None)?;
        }

        let created = self.properties.created.unwrap_or_else(Utc::now);
        self.publish(created)
            .map_err(|err| match err {
                XlsxError::Io(source) => XlsxError::file_write(&self.path, source),
                other => other,
            })?;

        self.closed = true;
        log::info!(
            "wrote {} ({} worksheets, {} unique strings)",
            self.path.display(),
            self.worksheets.len(),
            self.strings.unique_count()
        );
        Ok(())
    }

    fn temp_dir(&self) -> PathBuf {
        match &self.options.tmpdir {
            Some(dir) => dir.clone(),
            None => destination_dir(&self.path),
        }
    }

    fn publish(&self, created: DateTime<Utc>) -> Result<()> {
        let mut temp = tempfile::Builder::new()
            .prefix(".impeller-")
            .suffix(".xlsx.tmp")
            .tempfile_in(self.temp_dir())?;

        {
            let output = BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, temp.as_file_mut());
            let (output, length) = self.write_package(output, created)?;
            let file: &mut File = output.into_inner().map_err(|e| e.into_error())?;
            file.set_len(length)?;
            file.sync_all()?;
        }

        if let Err(err) = temp.persist(&self.path) {
            // rename fails across filesystems, e.g. with a separate tmpdir
            log::debug!("rename failed ({}), staging a copy next to the destination", err.error);
            persist_copy(&err.file, &self.path)?;
        }
        Ok(())
    }

    fn write_package<W: Write + std::io::Seek>(
        &self,
        output: W,
        created: DateTime<Utc>,
    ) -> Result<(W, u64)> {
        let names = self.worksheet_names();
        let has_custom = !self.custom.is_empty();
        let prerendered = self.prerender_sheets()?;

        let mut packager = Packager::new(output, self.options.compression);

        packager.add_part("docProps/core.xml", |w| {
            write_core_props(&self.properties, created, &mut XmlWriter::new(w))
        })?;
        packager.add_part("docProps/app.xml", |w| {
            write_app_props(&self.properties, &names, &mut XmlWriter::new(w))
        })?;
        if has_custom {
            packager.add_part("docProps/custom.xml", |w| {
                write_custom_props(&self.custom, &mut XmlWriter::new(w))
            })?;
        }

        packager.add_part("xl/workbook.xml", |w| {
            write_workbook(&names, &mut XmlWriter::new(w))
        })?;
        packager.add_part("xl/_rels/workbook.xml.rels", |w| {
            write_workbook_rels(names.len(), &mut XmlWriter::new(w))
        })?;
        packager.add_part("xl/sharedStrings.xml", |w| {
            self.strings.write_xml(&mut XmlWriter::new(w))
        })?;
        packager.add_part("xl/styles.xml", |w| {
            write_styles(&self.formats, &mut XmlWriter::new(w))
        })?;

        for (i, sheet) in self.worksheets.iter().enumerate() {
            let part = format!("xl/worksheets/sheet{}.xml", i + 1);
            match prerendered.as_ref().and_then(|bufs| bufs.get(i)) {
                Some(xml) => packager.add_part(&part, |w| Ok(w.write_all(xml)?))?,
                None => packager.add_part(&part, |w| {
                    write_worksheet(sheet, i == 0, &mut XmlWriter::new(w))
                })?,
            }

            if sheet.has_external_links() {
                let rels = format!("xl/worksheets/_rels/sheet{}.xml.rels", i + 1);
                packager.add_part(&rels, |w| write_sheet_rels(sheet, &mut XmlWriter::new(w)))?;
            }
        }

        packager.add_part("[Content_Types].xml", |w| {
            write_content_types(names.len(), has_custom, &mut XmlWriter::new(w))
        })?;
        packager.add_part("_rels/.rels", |w| {
            write_root_rels(has_custom, &mut XmlWriter::new(w))
        })?;

        packager.finish()
    }

    /// Worksheet XML rendered on the rayon pool ahead of packaging
    #[cfg(feature = "parallel")]
    fn prerender_sheets(&self) -> Result<Option<Vec<Vec<u8>>>> {
        use rayon::prelude::*;

        if !self.options.parallel || self.worksheets.len() < 2 {
            return Ok(None);
        }

        log::debug!("rendering {} worksheets in parallel", self.worksheets.len());
        self.worksheets
            .par_iter()
            .enumerate()
            .map(|(i, sheet)| {
                let mut buf = Vec::new();
                write_worksheet(sheet, i == 0, &mut XmlWriter::new(&mut buf))?;
                Ok(buf)
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    #[cfg(not(feature = "parallel"))]
    fn prerender_sheets(&self) -> Result<Option<Vec<Vec<u8>>>> {
        if self.options.parallel {
            log::warn!("parallel serialization requested but the `parallel` feature is disabled");
        }
        Ok(None)
    }
}

impl Drop for Workbook {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("{} dropped without close(); nothing was written", self.path.display());
        }
    }
}

fn destination_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Copy a finished package into a second temporary file beside `path` and
/// rename that one into place, so a failed copy never reaches `path`
fn persist_copy(source: &NamedTempFile, path: &Path) -> Result<()> {
    let mut staged = tempfile::Builder::new()
        .prefix(".impeller-")
        .suffix(".xlsx.tmp")
        .tempfile_in(destination_dir(path))?;

    let mut reader = source.reopen()?;
    io::copy(&mut reader, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.xlsx");
        (dir, path)
    }

    #[test]
    fn test_sheet_names_are_unique_ignoring_case() {
        let (_dir, path) = scratch();
        let mut wb = Workbook::new(&path).unwrap();
        wb.add_worksheet(Some("Sheet1")).unwrap();
        assert!(matches!(
            wb.add_worksheet(Some("sheet1")),
            Err(XlsxError::SheetNameAlreadyUsed(_))
        ));
        assert_eq!(wb.worksheet_count(), 1);
    }

    #[test]
    fn test_sheet_name_length() {
        let (_dir, path) = scratch();
        let mut wb = Workbook::new(&path).unwrap();
        let err = wb.add_worksheet(Some(&"x".repeat(32))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SheetNameTooLong);
        wb.add_worksheet(Some(&"x".repeat(31))).unwrap();
        assert!(matches!(
            wb.add_worksheet(Some("a/b")),
            Err(XlsxError::SheetNameInvalidCharacter { character: '/', .. })
        ));
    }

    #[test]
    fn test_default_names_fill_gaps() {
        let (_dir, path) = scratch();
        let mut wb = Workbook::new(&path).unwrap();
        wb.add_worksheet(None).unwrap();
        wb.add_worksheet(Some("SHEET2")).unwrap();
        wb.add_worksheet(None).unwrap();
        assert_eq!(wb.worksheet_names(), ["Sheet1", "SHEET2", "Sheet3"]);
    }

    #[test]
    fn test_worksheet_lookup() {
        let (_dir, path) = scratch();
        let mut wb = Workbook::new(&path).unwrap();
        let id = wb.add_worksheet(Some("Data")).unwrap().id();
        wb.add_worksheet(Some("Other")).unwrap();

        wb.worksheet(id).unwrap().write(0, 0, 1, None).unwrap();
        wb.worksheet_by_name("data").unwrap().write(1, 0, 2, None).unwrap();
        assert_eq!(wb.get_worksheet(id).unwrap().cell_count(), 2);
        assert!(matches!(
            wb.worksheet_by_name("missing"),
            Err(XlsxError::WorksheetNotFound(_))
        ));
    }

    #[test]
    fn test_close_without_sheets_adds_one() {
        let (_dir, path) = scratch();
        let mut wb = Workbook::new(&path).unwrap();
        wb.close().unwrap();
        assert!(path.exists());
        assert_eq!(wb.worksheet_names(), ["Sheet1"]);
    }

    #[test]
    fn test_closed_workbook_rejects_changes() {
        let (_dir, path) = scratch();
        let mut wb = Workbook::new(&path).unwrap();
        wb.add_worksheet(None).unwrap();
        wb.close().unwrap();
        assert!(wb.is_closed());

        // a second close is a no-op
        wb.close().unwrap();
        assert!(matches!(
            wb.add_worksheet(None),
            Err(XlsxError::WorkbookClosed)
        ));
        assert!(matches!(
            wb.set_custom_property("k", "v"),
            Err(XlsxError::WorkbookClosed)
        ));
        assert!(wb.worksheet(WorksheetId(0)).is_err());
    }

    #[test]
    fn test_failed_close_leaves_nothing_and_can_retry() {
        let (dir, _) = scratch();
        let missing = dir.path().join("missing").join("book.xlsx");
        let mut wb = Workbook::new(&missing).unwrap();
        wb.add_worksheet(None).unwrap().write(0, 0, "x", None).unwrap();

        let err = wb.close().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileWriteFailed);
        assert!(!missing.exists());
        assert!(!wb.is_closed());

        std::fs::create_dir(dir.path().join("missing")).unwrap();
        wb.close().unwrap();
        assert!(missing.exists());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (dir, path) = scratch();
        let mut wb = Workbook::new(&path).unwrap();
        wb.add_worksheet(None).unwrap().write(0, 0, 1.5, None).unwrap();
        wb.close().unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, [std::ffi::OsString::from("book.xlsx")]);
    }

    fn entries(dir: &Path) -> Vec<std::ffi::OsString> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_copy_publish_replaces_destination() {
        let source_dir = TempDir::new().unwrap();
        let (dir, path) = scratch();
        std::fs::write(&path, b"old").unwrap();

        let mut source = NamedTempFile::new_in(source_dir.path()).unwrap();
        source.write_all(b"new package").unwrap();
        persist_copy(&source, &path).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new package");
        assert_eq!(entries(dir.path()), [std::ffi::OsString::from("book.xlsx")]);
    }

    #[test]
    fn test_failed_copy_publish_keeps_destination() {
        let source_dir = TempDir::new().unwrap();
        let (dir, path) = scratch();
        std::fs::write(&path, b"old").unwrap();

        let source = NamedTempFile::new_in(source_dir.path()).unwrap();
        std::fs::remove_file(source.path()).unwrap();
        assert!(persist_copy(&source, &path).is_err());

        assert_eq!(std::fs::read(&path).unwrap(), b"old");
        assert_eq!(entries(dir.path()), [std::ffi::OsString::from("book.xlsx")]);
    }

    #[test]
    fn test_copy_publish_onto_directory_fails_cleanly() {
        let source_dir = TempDir::new().unwrap();
        let (dir, path) = scratch();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"x").unwrap();

        let mut source = NamedTempFile::new_in(source_dir.path()).unwrap();
        source.write_all(b"package").unwrap();
        assert!(persist_copy(&source, &path).is_err());

        assert!(path.join("keep").exists());
        assert_eq!(entries(dir.path()), [std::ffi::OsString::from("book.xlsx")]);
    }

    #[test]
    fn test_empty_path_is_rejected() {
        assert!(matches!(
            Workbook::new(""),
            Err(XlsxError::ParameterInvalid(_))
        ));
    }
}
