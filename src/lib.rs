//! # impeller
//!
//! A writer for Excel 2007+ (`.xlsx`) workbooks.
//!
//! ## Features
//!
//! - **Sparse worksheets**: cells are buffered per row, so only written cells cost memory
//! - **Typed writes**: numbers, strings, rich strings, formulas, booleans, dates, errors and hyperlinks
//! - **Shared formats**: formats are deduplicated into a single stylesheet
//! - **Document properties**: core, extended and custom properties
//! - **Atomic output**: the file appears complete on `close()` or not at all
//! - **Deterministic archives**: identical input produces identical bytes
//! - **Stable error codes**: every error maps to an [`ErrorKind`] with a fixed code
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use impeller::{Format, Workbook};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut workbook = Workbook::new("output.xlsx")?;
//! let header = Format::new().set_bold();
//!
//! let mut sheet = workbook.add_worksheet(Some("Sales"))?;
//! sheet.write(0, 0, "Region", Some(&header))?;
//! sheet.write(0, 1, "Total", Some(&header))?;
//! sheet.write(1, 0, "North", None)?;
//! sheet.write(1, 1, 1250.5, None)?;
//! sheet.write_formula(2, 1, "=SUM(B2:B2)", None)?;
//! sheet.set_column(0, 0, 18.0)?;
//!
//! workbook.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Options
//!
//! ```rust,no_run
//! use impeller::{Compression, Options, Workbook};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // IMPELLER_COMPRESSION_LEVEL, IMPELLER_TMPDIR and IMPELLER_PARALLEL are honoured here
//! let options = Options::from_env().set_compression(Compression::Deflate(1));
//! let mut workbook = Workbook::with_options("fast.xlsx", options)?;
//! workbook.add_worksheet(None)?.write(0, 0, 1, None)?;
//! workbook.close()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod format;
pub mod options;
mod packager;
pub mod properties;
pub mod shared_strings;
pub mod types;
pub mod utility;
pub mod workbook;
pub mod worksheet;
mod xml;

pub use error::{ErrorKind, Result, XlsxError};
pub use format::{
    BorderStyle, Color, Format, HorizontalAlign, Pattern, Underline, VerticalAlign,
};
pub use options::{Compression, Options};
pub use properties::{CustomValue, DocProperties};
pub use types::{CellValue, ErrorValue};
pub use workbook::Workbook;
pub use worksheet::{Worksheet, WorksheetId, WorksheetWriter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_imports() {
        let _ = std::marker::PhantomData::<XlsxError>;
        let _ = std::marker::PhantomData::<Workbook>;
        let _ = std::marker::PhantomData::<WorksheetWriter<'static>>;
        assert_eq!(ErrorKind::Other.code(), 13);
    }
}
