//! Workbook output options

use std::path::PathBuf;

/// How parts are stored inside the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression (zip method 0)
    Store,
    /// Deflate at level 1-9 (zip method 8)
    Deflate(u32),
}

impl Compression {
    /// Level 0 means store; anything above 9 is clamped
    pub fn from_level(level: u32) -> Self {
        match level {
            0 => Compression::Store,
            n => Compression::Deflate(n.min(9)),
        }
    }
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Deflate(6)
    }
}

/// Options fixed when the workbook is created
///
/// ```
/// use impeller::{Compression, Options};
///
/// let options = Options::new()
///     .set_compression(Compression::Store)
///     .set_date_format("dd/mm/yyyy");
/// assert_eq!(options.compression, Compression::Store);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub compression: Compression,
    /// Directory for the temporary file; defaults to the output file's directory
    pub tmpdir: Option<PathBuf>,
    /// Serialize worksheets on a thread pool (requires the `parallel` feature)
    pub parallel: bool,
    /// Number format applied to dates written without one
    pub date_format: String,
    /// Number format applied to date-times written without one
    pub datetime_format: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            compression: Compression::default(),
            tmpdir: None,
            parallel: false,
            date_format: "yyyy-mm-dd".to_string(),
            datetime_format: "yyyy-mm-dd hh:mm:ss".to_string(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `IMPELLER_COMPRESSION_LEVEL`, `IMPELLER_TMPDIR`
    /// and `IMPELLER_PARALLEL`
    pub fn from_env() -> Self {
        let mut options = Options::default();

        if let Some(level) = std::env::var("IMPELLER_COMPRESSION_LEVEL")
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
        {
            options.compression = Compression::from_level(level);
        }

        if let Some(dir) = std::env::var_os("IMPELLER_TMPDIR").filter(|d| !d.is_empty()) {
            options.tmpdir = Some(PathBuf::from(dir));
        }

        if let Ok(value) = std::env::var("IMPELLER_PARALLEL") {
            options.parallel = matches!(value.trim(), "1" | "true" | "yes" | "on");
        }

        options
    }

    pub fn set_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn set_tmpdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tmpdir = Some(dir.into());
        self
    }

    pub fn set_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn set_date_format(mut self, num_format: &str) -> Self {
        self.date_format = num_format.to_string();
        self
    }

    pub fn set_datetime_format(mut self, num_format: &str) -> Self {
        self.datetime_format = num_format.to_string();
        self
    }
}
