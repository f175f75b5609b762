//! Error types for the impeller XLSX engine

use std::collections::TryReserveError;
use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias for impeller operations
pub type Result<T> = std::result::Result<T, XlsxError>;

/// Stable classification of every failure the engine can report.
///
/// Bindings translate an error into their own exception hierarchy through
/// [`XlsxError::kind`] and [`ErrorKind::code`]; the codes never change meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    MemoryExhausted = 1,
    FileWriteFailed = 2,
    ArchiveOperationFailed = 3,
    ParameterInvalid = 4,
    SheetNameTooLong = 5,
    SheetNameInvalidCharacter = 6,
    SheetNameAlreadyUsed = 7,
    StringTooLong = 8,
    SharedStringIndexNotFound = 9,
    IndexOutOfRange = 10,
    MaxUrlsExceeded = 11,
    ImageDimensionUnreadable = 12,
    Other = 13,
}

impl ErrorKind {
    /// Numeric identifier of the kind
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Short machine-friendly name of the kind
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MemoryExhausted => "memory_exhausted",
            ErrorKind::FileWriteFailed => "file_write_failed",
            ErrorKind::ArchiveOperationFailed => "archive_operation_failed",
            ErrorKind::ParameterInvalid => "parameter_invalid",
            ErrorKind::SheetNameTooLong => "sheet_name_too_long",
            ErrorKind::SheetNameInvalidCharacter => "sheet_name_invalid_character",
            ErrorKind::SheetNameAlreadyUsed => "sheet_name_already_used",
            ErrorKind::StringTooLong => "string_too_long",
            ErrorKind::SharedStringIndexNotFound => "shared_string_index_not_found",
            ErrorKind::IndexOutOfRange => "index_out_of_range",
            ErrorKind::MaxUrlsExceeded => "max_urls_exceeded",
            ErrorKind::ImageDimensionUnreadable => "image_dimension_unreadable",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Archive step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStep {
    Open,
    AddEntry,
    Close,
}

impl fmt::Display for ArchiveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArchiveStep::Open => "open",
            ArchiveStep::AddEntry => "add entry",
            ArchiveStep::Close => "close",
        };
        f.write_str(s)
    }
}

/// Main error type for all workbook operations
#[derive(Error, Debug)]
pub enum XlsxError {
    /// A buffer could not grow
    #[error("Memory allocation failed: {0}")]
    MemoryExhausted(String),

    /// The output file (or its temporary sibling) could not be created, written or renamed
    #[error("Failed to write '{path}': {source}")]
    FileWriteFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    /// IO error without path context, raised while streaming archive data
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Structural ZIP failure
    #[error("Archive operation failed ({step}): {message}")]
    ArchiveOperationFailed { step: ArchiveStep, message: String },

    /// Missing or malformed argument
    #[error("Invalid parameter: {0}")]
    ParameterInvalid(String),

    #[error("Worksheet name '{name}' is {length} characters long, Excel allows at most 31")]
    SheetNameTooLong { name: String, length: usize },

    #[error("Worksheet name '{name}' contains invalid character '{character}'")]
    SheetNameInvalidCharacter { name: String, character: char },

    #[error("Worksheet name '{0}' is already in use")]
    SheetNameAlreadyUsed(String),

    #[error("String of {length} characters exceeds the limit of {limit}")]
    StringTooLong { length: usize, limit: usize },

    #[error("Shared string index {0} not found")]
    SharedStringIndexNotFound(u32),

    #[error("Cell ({row}, {col}) is outside the worksheet bounds")]
    IndexOutOfRange { row: i64, col: i64 },

    #[error("Worksheet '{sheet}' exceeds the maximum of {limit} hyperlinks")]
    MaxUrlsExceeded { sheet: String, limit: usize },

    #[error("Cannot read image dimensions: {0}")]
    ImageDimensionUnreadable(String),

    #[error("Worksheet {0} not found")]
    WorksheetNotFound(String),

    #[error("Workbook has already been closed")]
    WorkbookClosed,
}

impl XlsxError {
    /// Taxonomy entry of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            XlsxError::MemoryExhausted(_) => ErrorKind::MemoryExhausted,
            XlsxError::FileWriteFailed { source, .. } | XlsxError::Io(source)
                if source.kind() == io::ErrorKind::OutOfMemory =>
            {
                ErrorKind::MemoryExhausted
            }
            XlsxError::FileWriteFailed { .. } | XlsxError::Io(_) => ErrorKind::FileWriteFailed,
            XlsxError::ArchiveOperationFailed { .. } => ErrorKind::ArchiveOperationFailed,
            XlsxError::ParameterInvalid(_) => ErrorKind::ParameterInvalid,
            XlsxError::SheetNameTooLong { .. } => ErrorKind::SheetNameTooLong,
            XlsxError::SheetNameInvalidCharacter { .. } => ErrorKind::SheetNameInvalidCharacter,
            XlsxError::SheetNameAlreadyUsed(_) => ErrorKind::SheetNameAlreadyUsed,
            XlsxError::StringTooLong { .. } => ErrorKind::StringTooLong,
            XlsxError::SharedStringIndexNotFound(_) => ErrorKind::SharedStringIndexNotFound,
            XlsxError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            XlsxError::MaxUrlsExceeded { .. } => ErrorKind::MaxUrlsExceeded,
            XlsxError::ImageDimensionUnreadable(_) => ErrorKind::ImageDimensionUnreadable,
            XlsxError::WorksheetNotFound(_) | XlsxError::WorkbookClosed => ErrorKind::Other,
        }
    }

    pub(crate) fn file_write<P: AsRef<std::path::Path>>(path: P, source: io::Error) -> Self {
        XlsxError::FileWriteFailed {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub(crate) fn archive(step: ArchiveStep, message: impl Into<String>) -> Self {
        XlsxError::ArchiveOperationFailed {
            step,
            message: message.into(),
        }
    }
}

impl From<TryReserveError> for XlsxError {
    fn from(err: TryReserveError) -> Self {
        XlsxError::MemoryExhausted(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorKind::MemoryExhausted.code(), 1);
        assert_eq!(ErrorKind::IndexOutOfRange.code(), 10);
        assert_eq!(ErrorKind::Other.code(), 13);
    }

    #[test]
    fn test_io_out_of_memory_maps_to_memory_kind() {
        let err = XlsxError::from(io::Error::new(io::ErrorKind::OutOfMemory, "oom"));
        assert_eq!(err.kind(), ErrorKind::MemoryExhausted);

        let err = XlsxError::file_write("out.xlsx", io::Error::other("disk full"));
        assert_eq!(err.kind(), ErrorKind::FileWriteFailed);
        assert!(err.to_string().contains("out.xlsx"));
    }

    #[test]
    fn test_closed_workbook_is_other() {
        assert_eq!(XlsxError::WorkbookClosed.kind(), ErrorKind::Other);
    }
}
