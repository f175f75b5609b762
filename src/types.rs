//! Type definitions for cell data

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Result, XlsxError};

/// Zero-based row index
pub type RowNum = u32;

/// Zero-based column index
pub type ColNum = u16;

/// Number of rows in a worksheet
pub const ROW_MAX: RowNum = 1_048_576;

/// Number of columns in a worksheet
pub const COL_MAX: ColNum = 16_384;

/// Maximum characters in a cell string
pub const MAX_STRING_LEN: usize = 32_767;

/// Maximum characters in a worksheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Maximum characters in a custom property name or string value
pub const MAX_PROPERTY_LEN: usize = 255;

/// Maximum characters in a hyperlink target
pub const MAX_URL_LEN: usize = 2_079;

/// Maximum hyperlinks per worksheet
pub const MAX_URLS: usize = 65_530;

/// Excel error literals that can be stored in a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorValue {
    Div0,
    NA,
    Name,
    Null,
    Num,
    Ref,
    Value,
}

impl ErrorValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorValue::Div0 => "#DIV/0!",
            ErrorValue::NA => "#N/A",
            ErrorValue::Name => "#NAME?",
            ErrorValue::Null => "#NULL!",
            ErrorValue::Num => "#NUM!",
            ErrorValue::Ref => "#REF!",
            ErrorValue::Value => "#VALUE!",
        }
    }

    /// Parse one of the seven error literals
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "#DIV/0!" => Ok(ErrorValue::Div0),
            "#N/A" => Ok(ErrorValue::NA),
            "#NAME?" => Ok(ErrorValue::Name),
            "#NULL!" => Ok(ErrorValue::Null),
            "#NUM!" => Ok(ErrorValue::Num),
            "#REF!" => Ok(ErrorValue::Ref),
            "#VALUE!" => Ok(ErrorValue::Value),
            other => Err(XlsxError::ParameterInvalid(format!(
                "'{}' is not an Excel error value",
                other
            ))),
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value handed to [`WorksheetWriter::write`](crate::WorksheetWriter::write)
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Blank cell (only kept when styled)
    Empty,
    /// String value
    String(String),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Date and time
    DateTime(NaiveDateTime),
    /// Date without time of day
    Date(NaiveDate),
    /// Error value
    Error(ErrorValue),
    /// Formula value (e.g., "=SUM(A1:A10)")
    Formula(String),
}

impl CellValue {
    /// Check if cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        CellValue::Int(i as i64)
    }
}

impl From<u32> for CellValue {
    fn from(i: u32) -> Self {
        CellValue::Int(i as i64)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::DateTime(dt)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}

impl From<ErrorValue> for CellValue {
    fn from(e: ErrorValue) -> Self {
        CellValue::Error(e)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

/// A stored cell: the value plus its format-table index
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellData,
    /// Index into the workbook format table (0 = default)
    pub format: u32,
}

/// Internal cell representation; strings are shared-string indices
#[derive(Debug, Clone, PartialEq)]
pub enum CellData {
    Blank,
    Number(f64),
    String(u32),
    Formula { formula: String, result: f64 },
    Boolean(bool),
    /// Day serial relative to 1899-12-30
    DateTime(f64),
    Error(ErrorValue),
}
