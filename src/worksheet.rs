//! Sparse worksheet buffer and the handle used to write into it

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Result, XlsxError};
use crate::format::{Format, FormatTable};
use crate::options::Options;
use crate::shared_strings::SharedStringTable;
use crate::types::{
    Cell, CellData, CellValue, ColNum, ErrorValue, RowNum, MAX_STRING_LEN, MAX_URLS, MAX_URL_LEN,
};
use crate::utility::{check_dimensions, column_range, date_to_serial, datetime_to_serial};
use crate::xml::sheet::render_rich_runs;

/// Largest column width Excel accepts, in characters
const MAX_COLUMN_WIDTH: f64 = 255.0;

/// Largest row height Excel accepts, in points
const MAX_ROW_HEIGHT: f64 = 409.0;

/// Stable handle of a worksheet inside its workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorksheetId(pub(crate) usize);

impl WorksheetId {
    /// Zero-based position in the tab order
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Width and format of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnInfo {
    /// Width in character units; 0 hides the column
    pub width: f64,
    /// Format-table index
    pub format: u32,
}

#[derive(Debug, Default)]
pub(crate) struct RowData {
    pub height: Option<f64>,
    pub format: u32,
    pub cells: BTreeMap<ColNum, Cell>,
}

/// First and last written row/column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub first_row: RowNum,
    pub last_row: RowNum,
    pub first_col: ColNum,
    pub last_col: ColNum,
}

impl Dimensions {
    fn include(dims: &mut Option<Dimensions>, row: RowNum, col: ColNum) {
        match dims {
            None => {
                *dims = Some(Dimensions {
                    first_row: row,
                    last_row: row,
                    first_col: col,
                    last_col: col,
                })
            }
            Some(d) => {
                d.first_row = d.first_row.min(row);
                d.last_row = d.last_row.max(row);
                d.first_col = d.first_col.min(col);
                d.last_col = d.last_col.max(col);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HyperlinkTarget {
    /// http, https, ftp or mailto target; lives in the sheet relationships
    External(String),
    /// `Sheet!A1` style location inside the workbook
    Internal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Hyperlink {
    pub target: HyperlinkTarget,
    pub tooltip: Option<String>,
}

/// One worksheet's buffered content
#[derive(Debug)]
pub struct Worksheet {
    name: String,
    pub(crate) rows: BTreeMap<RowNum, RowData>,
    pub(crate) columns: BTreeMap<ColNum, ColumnInfo>,
    pub(crate) hyperlinks: BTreeMap<(RowNum, ColNum), Hyperlink>,
    dimensions: Option<Dimensions>,
}

impl Worksheet {
    pub(crate) fn new(name: String) -> Self {
        Worksheet {
            name,
            rows: BTreeMap::new(),
            columns: BTreeMap::new(),
            hyperlinks: BTreeMap::new(),
            dimensions: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cell stored at (row, col), if any
    pub fn cell(&self, row: RowNum, col: ColNum) -> Option<&Cell> {
        self.rows.get(&row).and_then(|r| r.cells.get(&col))
    }

    /// Number of stored cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.cells.len()).sum()
    }

    /// Range of written cells, `None` for an empty sheet
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    /// Width set for a column, in character units
    pub fn column_width(&self, col: ColNum) -> Option<f64> {
        self.columns.get(&col).map(|c| c.width)
    }

    pub fn row_height(&self, row: RowNum) -> Option<f64> {
        self.rows.get(&row).and_then(|r| r.height)
    }

    pub fn hyperlink_count(&self) -> usize {
        self.hyperlinks.len()
    }

    pub(crate) fn has_external_links(&self) -> bool {
        self.hyperlinks
            .values()
            .any(|h| matches!(h.target, HyperlinkTarget::External(_)))
    }

    fn store(&mut self, row: RowNum, col: ColNum, value: CellData, format: u32) {
        self.hyperlinks.remove(&(row, col));
        self.rows
            .entry(row)
            .or_default()
            .cells
            .insert(col, Cell { value, format });
        Dimensions::include(&mut self.dimensions, row, col);
    }

    fn set_columns(&mut self, first: ColNum, last: ColNum, info: ColumnInfo) -> Result<()> {
        let (first, last) = (first.min(last), first.max(last));
        check_dimensions(0, last)?;

        if !info.width.is_finite() || info.width < 0.0 || info.width > MAX_COLUMN_WIDTH {
            return Err(XlsxError::ParameterInvalid(format!(
                "column width {} must be between 0 and {}",
                info.width, MAX_COLUMN_WIDTH
            )));
        }

        for col in first..=last {
            self.columns.insert(col, info);
        }
        Ok(())
    }

    fn set_row_info(&mut self, row: RowNum, height: f64, format: u32) -> Result<()> {
        check_dimensions(row, 0)?;
        if !height.is_finite() || !(0.0..=MAX_ROW_HEIGHT).contains(&height) {
            return Err(XlsxError::ParameterInvalid(format!(
                "row height {} must be between 0 and {}",
                height, MAX_ROW_HEIGHT
            )));
        }

        let data = self.rows.entry(row).or_default();
        data.height = Some(height);
        data.format = format;
        Ok(())
    }
}

fn check_string(text: &str) -> Result<()> {
    let length = text.chars().count();
    if length > MAX_STRING_LEN {
        return Err(XlsxError::StringTooLong {
            length,
            limit: MAX_STRING_LEN,
        });
    }
    Ok(())
}

// NaN and infinities have no cell representation
fn check_finite(value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(XlsxError::ParameterInvalid(format!(
            "{} is not a finite number",
            value
        )));
    }
    Ok(())
}

/// Write access to one worksheet together with the workbook-wide tables
///
/// Obtained from [`Workbook::add_worksheet`](crate::Workbook::add_worksheet) or
/// [`Workbook::worksheet`](crate::Workbook::worksheet).
///
/// ```no_run
/// use impeller::{Format, Workbook};
///
/// let mut workbook = Workbook::new("report.xlsx")?;
/// let bold = Format::new().set_bold();
///
/// let mut sheet = workbook.add_worksheet(Some("Data"))?;
/// sheet.write(0, 0, "Name", Some(&bold))?;
/// sheet.write(1, 0, 3.5, None)?;
/// sheet.set_column_range("A:A", 20.0)?;
///
/// workbook.close()?;
/// # Ok::<(), impeller::XlsxError>(())
/// ```
#[derive(Debug)]
pub struct WorksheetWriter<'a> {
    pub(crate) id: WorksheetId,
    pub(crate) sheet: &'a mut Worksheet,
    pub(crate) strings: &'a mut SharedStringTable,
    pub(crate) formats: &'a mut FormatTable,
    pub(crate) options: &'a Options,
}

impl WorksheetWriter<'_> {
    pub fn id(&self) -> WorksheetId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.sheet.name()
    }

    /// Read access to the buffered sheet
    pub fn worksheet(&self) -> &Worksheet {
        self.sheet
    }

    /// Write any supported value, dispatching on its type
    pub fn write(
        &mut self,
        row: RowNum,
        col: ColNum,
        value: impl Into<CellValue>,
        format: Option<&Format>,
    ) -> Result<()> {
        match value.into() {
            CellValue::Empty => self.write_blank(row, col, format),
            CellValue::String(s) => self.write_string(row, col, &s, format),
            CellValue::Int(i) => self.write_number(row, col, i as f64, format),
            CellValue::Float(f) => self.write_number(row, col, f, format),
            CellValue::Bool(b) => self.write_boolean(row, col, b, format),
            CellValue::DateTime(dt) => self.write_datetime(row, col, &dt, format),
            CellValue::Date(d) => self.write_date(row, col, &d, format),
            CellValue::Error(e) => self.write_error(row, col, e, format),
            CellValue::Formula(f) => self.write_formula(row, col, &f, format),
        }
    }

    pub fn write_number(
        &mut self,
        row: RowNum,
        col: ColNum,
        value: f64,
        format: Option<&Format>,
    ) -> Result<()> {
        check_dimensions(row, col)?;
        check_finite(value)?;
        let xf = self.formats.index_for(format);
        self.sheet.store(row, col, CellData::Number(value), xf);
        Ok(())
    }

    pub fn write_string(
        &mut self,
        row: RowNum,
        col: ColNum,
        text: &str,
        format: Option<&Format>,
    ) -> Result<()> {
        check_dimensions(row, col)?;
        check_string(text)?;
        let index = self.strings.intern(text)?;
        let xf = self.formats.index_for(format);
        self.sheet.store(row, col, CellData::String(index), xf);
        Ok(())
    }

    /// Write a string made of differently formatted runs
    ///
    /// A run without a format uses the cell's default font.
    pub fn write_rich_string(
        &mut self,
        row: RowNum,
        col: ColNum,
        runs: &[(Option<&Format>, &str)],
        format: Option<&Format>,
    ) -> Result<()> {
        check_dimensions(row, col)?;
        if runs.len() < 2 {
            return Err(XlsxError::ParameterInvalid(
                "a rich string needs at least two runs".to_string(),
            ));
        }
        if runs.iter().any(|(_, text)| text.is_empty()) {
            return Err(XlsxError::ParameterInvalid(
                "rich string runs must not be empty".to_string(),
            ));
        }

        let length: usize = runs.iter().map(|(_, text)| text.chars().count()).sum();
        if length > MAX_STRING_LEN {
            return Err(XlsxError::StringTooLong {
                length,
                limit: MAX_STRING_LEN,
            });
        }

        let runs_xml = render_rich_runs(runs)?;
        let index = self.strings.intern_rich(&runs_xml)?;
        let xf = self.formats.index_for(format);
        self.sheet.store(row, col, CellData::String(index), xf);
        Ok(())
    }

    /// Write a formula with a cached result of 0; a leading `=` is dropped
    pub fn write_formula(
        &mut self,
        row: RowNum,
        col: ColNum,
        formula: &str,
        format: Option<&Format>,
    ) -> Result<()> {
        self.write_formula_with_result(row, col, formula, 0.0, format)
    }

    pub fn write_formula_with_result(
        &mut self,
        row: RowNum,
        col: ColNum,
        formula: &str,
        result: f64,
        format: Option<&Format>,
    ) -> Result<()> {
        check_dimensions(row, col)?;
        let formula = formula.strip_prefix('=').unwrap_or(formula);
        if formula.is_empty() {
            return Err(XlsxError::ParameterInvalid("empty formula".to_string()));
        }
        check_string(formula)?;
        check_finite(result)?;

        let xf = self.formats.index_for(format);
        let value = CellData::Formula {
            formula: formula.to_string(),
            result,
        };
        self.sheet.store(row, col, value, xf);
        Ok(())
    }

    pub fn write_boolean(
        &mut self,
        row: RowNum,
        col: ColNum,
        value: bool,
        format: Option<&Format>,
    ) -> Result<()> {
        check_dimensions(row, col)?;
        let xf = self.formats.index_for(format);
        self.sheet.store(row, col, CellData::Boolean(value), xf);
        Ok(())
    }

    /// Write a styled empty cell; without a format the call is a no-op
    pub fn write_blank(&mut self, row: RowNum, col: ColNum, format: Option<&Format>) -> Result<()> {
        check_dimensions(row, col)?;
        let Some(format) = format else {
            log::warn!("ignoring unformatted blank at ({}, {})", row, col);
            return Ok(());
        };
        let xf = self.formats.register(format);
        self.sheet.store(row, col, CellData::Blank, xf);
        Ok(())
    }

    pub fn write_error(
        &mut self,
        row: RowNum,
        col: ColNum,
        value: ErrorValue,
        format: Option<&Format>,
    ) -> Result<()> {
        check_dimensions(row, col)?;
        let xf = self.formats.index_for(format);
        self.sheet.store(row, col, CellData::Error(value), xf);
        Ok(())
    }

    pub fn write_datetime(
        &mut self,
        row: RowNum,
        col: ColNum,
        value: &NaiveDateTime,
        format: Option<&Format>,
    ) -> Result<()> {
        let serial = datetime_to_serial(value);
        let default = self.options.datetime_format.clone();
        self.store_date(row, col, serial, format, default)
    }

    pub fn write_date(
        &mut self,
        row: RowNum,
        col: ColNum,
        value: &NaiveDate,
        format: Option<&Format>,
    ) -> Result<()> {
        let serial = date_to_serial(value);
        let default = self.options.date_format.clone();
        self.store_date(row, col, serial, format, default)
    }

    fn store_date(
        &mut self,
        row: RowNum,
        col: ColNum,
        serial: f64,
        format: Option<&Format>,
        default_num_format: String,
    ) -> Result<()> {
        check_dimensions(row, col)?;
        let xf = match format {
            Some(f) if !f.num_format().is_empty() => self.formats.register(f),
            Some(f) => self
                .formats
                .register(&f.clone().set_num_format(&default_num_format)),
            None => self
                .formats
                .register(&Format::new().set_num_format(&default_num_format)),
        };
        self.sheet.store(row, col, CellData::DateTime(serial), xf);
        Ok(())
    }

    /// Write a hyperlink showing the URL itself
    ///
    /// Supported schemes are `http://`, `https://`, `ftp://`, `mailto:` and
    /// `internal:` (a `Sheet!A1` location inside this workbook).
    pub fn write_url(
        &mut self,
        row: RowNum,
        col: ColNum,
        url: &str,
        format: Option<&Format>,
    ) -> Result<()> {
        self.write_url_with_text(row, col, url, None, None, format)
    }

    pub fn write_url_with_text(
        &mut self,
        row: RowNum,
        col: ColNum,
        url: &str,
        text: Option<&str>,
        tooltip: Option<&str>,
        format: Option<&Format>,
    ) -> Result<()> {
        check_dimensions(row, col)?;

        let length = url.chars().count();
        if length > MAX_URL_LEN {
            return Err(XlsxError::StringTooLong {
                length,
                limit: MAX_URL_LEN,
            });
        }

        let (target, display) = if let Some(location) = url.strip_prefix("internal:") {
            (HyperlinkTarget::Internal(location.to_string()), location)
        } else if let Some(address) = url.strip_prefix("mailto:") {
            (HyperlinkTarget::External(url.to_string()), address)
        } else if ["http://", "https://", "ftp://"]
            .iter()
            .any(|scheme| url.starts_with(scheme))
        {
            (HyperlinkTarget::External(url.to_string()), url)
        } else {
            return Err(XlsxError::ParameterInvalid(format!(
                "unsupported hyperlink scheme in '{}'",
                url
            )));
        };

        if display.is_empty() {
            return Err(XlsxError::ParameterInvalid("empty hyperlink target".to_string()));
        }

        if self.sheet.hyperlinks.len() >= MAX_URLS
            && !self.sheet.hyperlinks.contains_key(&(row, col))
        {
            return Err(XlsxError::MaxUrlsExceeded {
                sheet: self.sheet.name.clone(),
                limit: MAX_URLS,
            });
        }

        let text = text.unwrap_or(display);
        match format {
            Some(f) => self.write_string(row, col, text, Some(f))?,
            None => self.write_string(row, col, text, Some(&Format::hyperlink()))?,
        }

        self.sheet.hyperlinks.insert(
            (row, col),
            Hyperlink {
                target,
                tooltip: tooltip.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Set the width of columns `first..=last`, in character units
    pub fn set_column(&mut self, first: ColNum, last: ColNum, width: f64) -> Result<()> {
        self.sheet
            .set_columns(first, last, ColumnInfo { width, format: 0 })
    }

    /// Same as [`set_column`](Self::set_column) with an `A:C` style range
    pub fn set_column_range(&mut self, range: &str, width: f64) -> Result<()> {
        let (first, last) = column_range(range)?;
        self.set_column(first, last, width)
    }

    /// Set width and default format of columns `first..=last`
    pub fn set_column_format(
        &mut self,
        first: ColNum,
        last: ColNum,
        width: f64,
        format: &Format,
    ) -> Result<()> {
        let xf = self.formats.register(format);
        self.sheet
            .set_columns(first, last, ColumnInfo { width, format: xf })
    }

    /// Set a custom row height in points; 0 hides the row
    pub fn set_row(&mut self, row: RowNum, height: f64) -> Result<()> {
        self.sheet.set_row_info(row, height, 0)
    }

    pub fn set_row_format(&mut self, row: RowNum, height: f64, format: &Format) -> Result<()> {
        let xf = self.formats.register(format);
        self.sheet.set_row_info(row, height, xf)
    }
}
