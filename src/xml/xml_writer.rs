//! Buffered XML writer with minimal allocations

use std::io::Write;

use crate::error::Result;

pub(crate) const XML_DECLARATION: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

const FLUSH_THRESHOLD: usize = 8 * 1024;

/// Fast XML writer that batches small writes before handing them to the sink
pub struct XmlWriter<W: Write> {
    writer: W,
    buffer: Vec<u8>,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(writer: W) -> Self {
        XmlWriter {
            writer,
            buffer: Vec::with_capacity(FLUSH_THRESHOLD + 512),
        }
    }

    /// Write raw bytes directly
    #[inline]
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        self.maybe_flush()
    }

    /// Write string data
    #[inline]
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_raw(s.as_bytes())
    }

    /// Write the standard XML declaration
    pub fn declaration(&mut self) -> Result<()> {
        self.write_str(XML_DECLARATION)
    }

    /// Write XML element start tag (attributes may follow)
    #[inline]
    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.buffer.push(b'<');
        self.write_str(name)
    }

    /// Write XML element end tag
    #[inline]
    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.buffer.extend_from_slice(b"</");
        self.buffer.extend_from_slice(name.as_bytes());
        self.write_raw(b">")
    }

    /// Write `<name>` with no attributes
    #[inline]
    pub fn open_element(&mut self, name: &str) -> Result<()> {
        self.start_element(name)?;
        self.close_start_tag()
    }

    /// Write self-closing element
    #[inline]
    pub fn empty_element(&mut self, name: &str) -> Result<()> {
        self.buffer.push(b'<');
        self.buffer.extend_from_slice(name.as_bytes());
        self.write_raw(b"/>")
    }

    /// Write attribute
    #[inline]
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.buffer.push(b' ');
        self.buffer.extend_from_slice(name.as_bytes());
        self.buffer.extend_from_slice(b"=\"");
        escape_into(&mut self.buffer, value, true);
        self.write_raw(b"\"")
    }

    /// Write attribute with integer value
    #[inline]
    pub fn attribute_int<I: itoa::Integer>(&mut self, name: &str, value: I) -> Result<()> {
        let mut num = itoa::Buffer::new();
        self.buffer.push(b' ');
        self.buffer.extend_from_slice(name.as_bytes());
        self.buffer.extend_from_slice(b"=\"");
        self.buffer.extend_from_slice(num.format(value).as_bytes());
        self.write_raw(b"\"")
    }

    /// Write attribute with floating point value
    #[inline]
    pub fn attribute_f64(&mut self, name: &str, value: f64) -> Result<()> {
        self.buffer.push(b' ');
        self.buffer.extend_from_slice(name.as_bytes());
        self.buffer.extend_from_slice(b"=\"");
        push_f64(&mut self.buffer, value);
        self.write_raw(b"\"")
    }

    /// Close start tag
    #[inline]
    pub fn close_start_tag(&mut self) -> Result<()> {
        self.write_raw(b">")
    }

    /// Close start tag as a self-closing element
    #[inline]
    pub fn close_empty_tag(&mut self) -> Result<()> {
        self.write_raw(b"/>")
    }

    /// Write text content with XML escaping
    #[inline]
    pub fn write_escaped(&mut self, text: &str) -> Result<()> {
        escape_into(&mut self.buffer, text, false);
        self.maybe_flush()
    }

    /// Write a number the way cell values are stored
    #[inline]
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        push_f64(&mut self.buffer, value);
        self.maybe_flush()
    }

    /// Write an integer
    #[inline]
    pub fn write_int<I: itoa::Integer>(&mut self, value: I) -> Result<()> {
        let mut num = itoa::Buffer::new();
        self.write_str(num.format(value))
    }

    /// `<name>text</name>` with escaped text
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.open_element(name)?;
        self.write_escaped(text)?;
        self.end_element(name)
    }

    #[inline]
    fn maybe_flush(&mut self) -> Result<()> {
        if self.buffer.len() > FLUSH_THRESHOLD {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Flush buffer to underlying writer
    pub fn flush(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.writer)
    }
}

/// Append `text` escaped for XML. Attribute values also escape `"`.
///
/// Control characters that XML 1.0 cannot carry are written as `_xHHHH_`,
/// the escape Excel uses in cell text. In element text a literal `_xHHHH_`
/// gets its underscore escaped as `_x005F_` so it is not decoded on open.
pub(crate) fn escape_into(buf: &mut Vec<u8>, text: &str, attribute: bool) {
    let bytes = text.as_bytes();
    let mut start = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        let replacement: &[u8] = match byte {
            b'&' => b"&amp;",
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            b'"' if attribute => b"&quot;",
            b'_' if !attribute && looks_escaped(&bytes[i..]) => b"_x005F_",
            b'\t' | b'\n' | b'\r' => continue,
            0x00..=0x1F => {
                buf.extend_from_slice(&bytes[start..i]);
                buf.extend_from_slice(format!("_x{:04X}_", byte).as_bytes());
                start = i + 1;
                continue;
            }
            _ => continue,
        };
        buf.extend_from_slice(&bytes[start..i]);
        buf.extend_from_slice(replacement);
        start = i + 1;
    }
    buf.extend_from_slice(&bytes[start..]);
}

/// `_xHHHH_` at the start of `bytes`
fn looks_escaped(bytes: &[u8]) -> bool {
    bytes.len() >= 7
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}

/// Append a float so that parsing it back yields the identical `f64`
pub(crate) fn push_f64(buf: &mut Vec<u8>, value: f64) {
    // -0.0 goes through ryu to keep its sign
    let negative_zero = value == 0.0 && value.is_sign_negative();
    if value.fract() == 0.0 && value.abs() < 1e15 && !negative_zero {
        let mut num = itoa::Buffer::new();
        buf.extend_from_slice(num.format(value as i64).as_bytes());
    } else if value.is_finite() {
        let mut num = ryu::Buffer::new();
        buf.extend_from_slice(num.format_finite(value).as_bytes());
    } else {
        // NaN and infinities have no spreadsheet representation
        buf.push(b'0');
    }
}

/// Text needs `xml:space="preserve"` when surrounding whitespace would otherwise be dropped
pub(crate) fn needs_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_writer() {
        let mut output = Vec::new();
        let mut writer = XmlWriter::new(&mut output);

        writer.start_element("root").unwrap();
        writer.attribute("attr", "value").unwrap();
        writer.attribute_int("n", 42u32).unwrap();
        writer.close_start_tag().unwrap();
        writer.write_str("content").unwrap();
        writer.end_element("root").unwrap();
        writer.flush().unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "<root attr=\"value\" n=\"42\">content</root>"
        );
    }

    #[test]
    fn test_xml_escaping() {
        let mut output = Vec::new();
        let mut writer = XmlWriter::new(&mut output);

        writer.write_escaped("<test>&\"value\"</test>").unwrap();
        writer.attribute("a", "\"q\" & <x>").unwrap();
        writer.flush().unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "&lt;test&gt;&amp;\"value\"&lt;/test&gt; a=\"&quot;q&quot; &amp; &lt;x&gt;\""
        );
    }

    #[test]
    fn test_control_characters_are_escaped() {
        let mut buf = Vec::new();
        escape_into(&mut buf, "a\u{1}b\tc", false);
        assert_eq!(String::from_utf8(buf).unwrap(), "a_x0001_b\tc");
    }

    #[test]
    fn test_literal_escape_sequences_are_protected() {
        let mut buf = Vec::new();
        escape_into(&mut buf, "_x0041_ and _x00_ and _xZZZZ_", false);
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "_x005F_x0041_ and _x00_ and _xZZZZ_"
        );

        let mut buf = Vec::new();
        escape_into(&mut buf, "_x0041_", true);
        assert_eq!(buf, b"_x0041_");
    }

    #[test]
    fn test_float_formatting_round_trips() {
        for value in [3.14159265358979, 0.1, 1e-7, 123456789.123, 1e20, -2.5] {
            let mut buf = Vec::new();
            push_f64(&mut buf, value);
            let text = String::from_utf8(buf).unwrap();
            assert_eq!(text.parse::<f64>().unwrap(), value, "{}", text);
        }

        let mut buf = Vec::new();
        push_f64(&mut buf, 100.0);
        assert_eq!(buf, b"100");

        let mut buf = Vec::new();
        push_f64(&mut buf, -0.0);
        let negative_zero = String::from_utf8(buf).unwrap().parse::<f64>().unwrap();
        assert_eq!(negative_zero, 0.0);
        assert!(negative_zero.is_sign_negative());
    }

    #[test]
    fn test_large_output_flushes_in_chunks() {
        let mut output = Vec::new();
        {
            let mut writer = XmlWriter::new(&mut output);
            for _ in 0..5_000 {
                writer.empty_element("x").unwrap();
            }
            writer.flush().unwrap();
        }
        assert_eq!(output.len(), 5_000 * 4);
    }
}
