//! Shared strings table for string deduplication

use std::hash::{Hash, Hasher};
use std::io::Write;

use indexmap::{Equivalent, IndexSet};

use crate::error::{Result, XlsxError};
use crate::xml::xml_writer::{needs_preserve, XmlWriter};

const PLAIN: u8 = 0;
const RICH: u8 = 1;

/// One unique entry of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedString {
    /// Plain text
    Plain(String),
    /// Pre-rendered `<r>` runs of a rich string
    Rich(String),
}

impl SharedString {
    fn key(&self) -> SharedStringKey<'_> {
        match self {
            SharedString::Plain(s) => SharedStringKey { tag: PLAIN, text: s },
            SharedString::Rich(s) => SharedStringKey { tag: RICH, text: s },
        }
    }

    /// The stored text (run XML for rich strings)
    pub fn as_str(&self) -> &str {
        match self {
            SharedString::Plain(s) | SharedString::Rich(s) => s,
        }
    }
}

impl Hash for SharedString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Borrowed lookup key, so a repeated string costs no allocation
#[derive(Hash)]
struct SharedStringKey<'a> {
    tag: u8,
    text: &'a str,
}

impl Equivalent<SharedString> for SharedStringKey<'_> {
    fn equivalent(&self, key: &SharedString) -> bool {
        let other = key.key();
        self.tag == other.tag && self.text == other.text
    }
}

/// Shared strings table that deduplicates strings across the workbook
///
/// Indices are handed out in first-use order and never change.
#[derive(Debug, Default)]
pub struct SharedStringTable {
    strings: IndexSet<SharedString>,
    references: u64,
}

impl SharedStringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain string and get its index
    pub fn intern(&mut self, s: &str) -> Result<u32> {
        self.intern_key(SharedStringKey { tag: PLAIN, text: s })
    }

    /// Add pre-rendered rich-text runs and get their index
    pub(crate) fn intern_rich(&mut self, runs_xml: &str) -> Result<u32> {
        self.intern_key(SharedStringKey {
            tag: RICH,
            text: runs_xml,
        })
    }

    fn intern_key(&mut self, key: SharedStringKey<'_>) -> Result<u32> {
        self.references += 1;
        if let Some(index) = self.strings.get_index_of(&key) {
            return Ok(index as u32);
        }

        self.strings
            .try_reserve(1)
            .map_err(|e| XlsxError::MemoryExhausted(e.to_string()))?;
        let entry = if key.tag == RICH {
            SharedString::Rich(key.text.to_string())
        } else {
            SharedString::Plain(key.text.to_string())
        };
        let (index, _) = self.strings.insert_full(entry);
        Ok(index as u32)
    }

    /// Look a string back up by index
    pub fn get(&self, index: u32) -> Result<&SharedString> {
        self.strings
            .get_index(index as usize)
            .ok_or(XlsxError::SharedStringIndexNotFound(index))
    }

    /// Get number of unique strings
    pub fn unique_count(&self) -> usize {
        self.strings.len()
    }

    /// Total number of intern calls
    pub fn reference_count(&self) -> u64 {
        self.references
    }

    /// Write shared strings XML
    pub(crate) fn write_xml<W: Write>(&self, writer: &mut XmlWriter<W>) -> Result<()> {
        writer.declaration()?;

        writer.start_element("sst")?;
        writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        writer.attribute_int("count", self.references)?;
        writer.attribute_int("uniqueCount", self.strings.len())?;

        if self.strings.is_empty() {
            writer.close_empty_tag()?;
            return writer.flush();
        }
        writer.close_start_tag()?;

        for entry in &self.strings {
            writer.open_element("si")?;
            match entry {
                SharedString::Plain(s) => {
                    writer.start_element("t")?;
                    if needs_preserve(s) {
                        writer.attribute("xml:space", "preserve")?;
                    }
                    writer.close_start_tag()?;
                    writer.write_escaped(s)?;
                    writer.end_element("t")?;
                }
                SharedString::Rich(runs) => writer.write_str(runs)?,
            }
            writer.end_element("si")?;
        }

        writer.end_element("sst")?;
        writer.flush()
    }
}
