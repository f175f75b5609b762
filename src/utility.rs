//! Cell reference, column range and date helpers

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Result, XlsxError};
use crate::types::{ColNum, RowNum, COL_MAX, MAX_SHEET_NAME_LEN, ROW_MAX};

const SHEET_NAME_RESERVED: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Validate a signed (row, col) pair, as received from a scripting runtime
///
/// ```
/// use impeller::utility::cell_index;
///
/// assert_eq!(cell_index(0, 3).unwrap(), (0, 3));
/// assert!(cell_index(-1, 0).is_err());
/// ```
pub fn cell_index(row: i64, col: i64) -> Result<(RowNum, ColNum)> {
    if row < 0 || row >= ROW_MAX as i64 || col < 0 || col >= COL_MAX as i64 {
        return Err(XlsxError::IndexOutOfRange { row, col });
    }
    Ok((row as RowNum, col as ColNum))
}

pub(crate) fn check_dimensions(row: RowNum, col: ColNum) -> Result<()> {
    if row >= ROW_MAX || col >= COL_MAX {
        return Err(XlsxError::IndexOutOfRange {
            row: row as i64,
            col: col as i64,
        });
    }
    Ok(())
}

/// Convert column index to Excel letters (0 -> A, 25 -> Z, 26 -> AA)
pub fn column_name(col: ColNum) -> String {
    let mut buf = Vec::with_capacity(3);
    push_column_name(&mut buf, col);
    String::from_utf8_lossy(&buf).into_owned()
}

pub(crate) fn push_column_name(buf: &mut Vec<u8>, col: ColNum) {
    let mut letters = [0u8; 4];
    let mut n = col as u32 + 1;
    let mut i = letters.len();
    while n > 0 {
        let rem = (n - 1) % 26;
        i -= 1;
        letters[i] = b'A' + rem as u8;
        n = (n - 1) / 26;
    }
    buf.extend_from_slice(&letters[i..]);
}

/// A1-style reference of a zero-based cell
pub fn cell_reference(row: RowNum, col: ColNum) -> String {
    let mut buf = Vec::with_capacity(10);
    push_cell_reference(&mut buf, row, col);
    String::from_utf8_lossy(&buf).into_owned()
}

pub(crate) fn push_cell_reference(buf: &mut Vec<u8>, row: RowNum, col: ColNum) {
    push_column_name(buf, col);
    let mut num = itoa::Buffer::new();
    buf.extend_from_slice(num.format(row + 1).as_bytes());
}

/// Parse column letters (case-insensitive) into a zero-based index
pub fn column_from_name(name: &str) -> Result<ColNum> {
    let name = name.trim();
    if name.is_empty() || name.len() > 3 {
        return Err(XlsxError::ParameterInvalid(format!(
            "'{}' is not a column name",
            name
        )));
    }

    let mut n: u32 = 0;
    for ch in name.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(XlsxError::ParameterInvalid(format!(
                "'{}' is not a column name",
                name
            )));
        }
        n = n * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }

    if n > COL_MAX as u32 {
        return Err(XlsxError::IndexOutOfRange {
            row: 0,
            col: n as i64 - 1,
        });
    }
    Ok((n - 1) as ColNum)
}

/// Parse an `A:C` style range (a single column `B` or `B:B` is accepted too)
///
/// Row digits are ignored, so `C1:E1` resolves like `C:E`.
pub fn column_range(range: &str) -> Result<(ColNum, ColNum)> {
    let strip = |part: &str| -> String {
        part.trim()
            .trim_start_matches('$')
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect()
    };

    let (first, last) = match range.split_once(':') {
        Some((a, b)) => (strip(a), strip(b)),
        None => {
            let single = strip(range);
            (single.clone(), single)
        }
    };

    let first = column_from_name(&first)?;
    let last = column_from_name(&last)?;
    Ok((first.min(last), first.max(last)))
}

/// Check worksheet name rules: non-empty, at most 31 characters, no reserved characters
pub(crate) fn validate_sheet_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(XlsxError::ParameterInvalid(
            "worksheet name must not be empty".to_string(),
        ));
    }

    let length = name.chars().count();
    if length > MAX_SHEET_NAME_LEN {
        return Err(XlsxError::SheetNameTooLong {
            name: name.to_string(),
            length,
        });
    }

    if let Some(character) = name.chars().find(|c| SHEET_NAME_RESERVED.contains(c)) {
        return Err(XlsxError::SheetNameInvalidCharacter {
            name: name.to_string(),
            character,
        });
    }
    Ok(())
}

fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Excel day serial of a date-time (1899-12-30 epoch, millisecond precision)
pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
    let delta = *dt - excel_epoch();
    delta.num_milliseconds() as f64 / 86_400_000.0
}

/// Excel day serial of a date
pub fn date_to_serial(date: &NaiveDate) -> f64 {
    datetime_to_serial(&date.and_time(chrono::NaiveTime::MIN))
}
