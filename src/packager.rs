//! Zip packager that streams each part through the compressor straight into the output
//!
//! Local headers are written with zeroed CRC and sizes, then patched in place
//! once the part is finished, so no data descriptors are needed.

use std::cell::Cell;
use std::io::{self, Seek, SeekFrom, Write};

use crc32fast::Hasher as Crc32;
use flate2::write::DeflateEncoder;

use crate::error::{ArchiveStep, Result, XlsxError};
use crate::options::Compression;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_DIR_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;

const VERSION: u16 = 20;
const METHOD_STORE: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

/// 1980-01-01 00:00, so identical input gives identical archives
const DOS_TIME: u16 = 0;
const DOS_DATE: u16 = 0x0021;

/// Offset of the CRC field inside a local header
const CRC_OFFSET: u64 = 14;

const MAX_ENTRIES: usize = u16::MAX as usize;

struct ZipEntry {
    name: String,
    method: u16,
    local_header_offset: u32,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
}

/// Why writing one entry failed
enum EntryFailure {
    /// The output itself failed; nothing more can be written
    Sink(XlsxError),
    /// The part could not be compressed; the output is still usable
    Compressor(XlsxError),
}

impl From<io::Error> for EntryFailure {
    fn from(err: io::Error) -> Self {
        EntryFailure::Sink(err.into())
    }
}

impl From<XlsxError> for EntryFailure {
    fn from(err: XlsxError) -> Self {
        EntryFailure::Sink(err)
    }
}

/// Passes bytes to the output and records whether the output failed
struct SinkWriter<'a, W: Write> {
    output: &'a mut W,
    failed: &'a Cell<bool>,
}

impl<W: Write> Write for SinkWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf).inspect_err(|_| self.failed.set(true))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush().inspect_err(|_| self.failed.set(true))
    }
}

/// Hashes and counts uncompressed bytes on their way in
struct CrcWriter<W: Write> {
    inner: W,
    crc: Crc32,
    count: u64,
}

impl<W: Write> CrcWriter<W> {
    fn new(inner: W) -> Self {
        CrcWriter {
            inner,
            crc: Crc32::new(),
            count: 0,
        }
    }
}

impl<W: Write> Write for CrcWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.crc.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn to_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        XlsxError::archive(
            ArchiveStep::AddEntry,
            format!("{} of {} bytes needs zip64", what, value),
        )
    })
}

/// Writes zip entries in the order they are added
pub(crate) struct Packager<W: Write + Seek> {
    output: W,
    entries: Vec<ZipEntry>,
    compression: Compression,
    high_water: u64,
}

impl<W: Write + Seek> Packager<W> {
    pub fn new(output: W, compression: Compression) -> Self {
        Packager {
            output,
            entries: Vec::new(),
            compression,
            high_water: 0,
        }
    }

    /// Add one part; `render` streams its content and may be called twice
    /// when compression fails and the part is stored instead
    pub fn add_part<F>(&mut self, name: &str, render: F) -> Result<()>
    where
        F: Fn(&mut dyn Write) -> Result<()>,
    {
        if self.entries.len() >= MAX_ENTRIES {
            return Err(XlsxError::archive(
                ArchiveStep::AddEntry,
                format!("more than {} entries", MAX_ENTRIES),
            ));
        }

        let offset = self.output.stream_position()?;
        let entry = match self.write_entry(name, offset, self.compression, &render) {
            Ok(entry) => entry,
            Err(EntryFailure::Sink(err)) => return Err(err),
            Err(EntryFailure::Compressor(err)) if self.compression == Compression::Store => {
                return Err(err)
            }
            Err(EntryFailure::Compressor(first)) => {
                log::warn!("compressing {} failed ({}), storing it uncompressed", name, first);
                let abandoned_end = self.output.stream_position()?;
                self.high_water = self.high_water.max(abandoned_end);
                self.output.seek(SeekFrom::Start(offset))?;

                match self.write_entry(name, offset, Compression::Store, &render) {
                    Ok(entry) => entry,
                    Err(EntryFailure::Sink(err)) => return Err(err),
                    // the part itself is broken, not the compressor
                    Err(EntryFailure::Compressor(err)) if err.kind() == first.kind() => {
                        return Err(err)
                    }
                    Err(EntryFailure::Compressor(err)) => {
                        return Err(XlsxError::archive(
                            ArchiveStep::AddEntry,
                            format!(
                                "{} failed both compressed ({}) and stored: {}",
                                name, first, err
                            ),
                        ))
                    }
                }
            }
        };

        log::debug!(
            "added {} ({} -> {} bytes)",
            entry.name,
            entry.uncompressed_size,
            entry.compressed_size
        );
        self.entries.push(entry);
        Ok(())
    }

    fn write_entry<F>(
        &mut self,
        name: &str,
        offset: u64,
        compression: Compression,
        render: &F,
    ) -> std::result::Result<ZipEntry, EntryFailure>
    where
        F: Fn(&mut dyn Write) -> Result<()>,
    {
        let method = match compression {
            Compression::Store => METHOD_STORE,
            Compression::Deflate(_) => METHOD_DEFLATE,
        };

        let mut header = Vec::with_capacity(30 + name.len());
        put_u32(&mut header, LOCAL_HEADER_SIG);
        put_u16(&mut header, VERSION);
        put_u16(&mut header, 0); // flags
        put_u16(&mut header, method);
        put_u16(&mut header, DOS_TIME);
        put_u16(&mut header, DOS_DATE);
        put_u32(&mut header, 0); // crc32, patched below
        put_u32(&mut header, 0); // compressed size
        put_u32(&mut header, 0); // uncompressed size
        put_u16(&mut header, name.len() as u16);
        put_u16(&mut header, 0); // extra length
        header.extend_from_slice(name.as_bytes());
        self.output.write_all(&header)?;
        let data_start = offset + header.len() as u64;

        let sink_failed = Cell::new(false);
        let sink = SinkWriter {
            output: &mut self.output,
            failed: &sink_failed,
        };
        let classify = |err: XlsxError| {
            if sink_failed.get() {
                EntryFailure::Sink(err)
            } else {
                EntryFailure::Compressor(err)
            }
        };

        let (crc32, uncompressed) = match compression {
            Compression::Store => {
                let mut writer = CrcWriter::new(sink);
                render(&mut writer).map_err(classify)?;
                writer.flush()?;
                (writer.crc.finalize(), writer.count)
            }
            Compression::Deflate(level) => {
                let encoder = DeflateEncoder::new(sink, flate2::Compression::new(level.min(9)));
                let mut writer = CrcWriter::new(encoder);
                render(&mut writer).map_err(classify)?;
                let CrcWriter { inner, crc, count } = writer;
                inner
                    .finish()
                    .map_err(|e| classify(e.into()))?
                    .flush()?;
                (crc.finalize(), count)
            }
        };

        let end = self.output.stream_position()?;
        let entry = ZipEntry {
            name: name.to_string(),
            method,
            local_header_offset: to_u32(offset, "offset")?,
            crc32,
            compressed_size: to_u32(end - data_start, "compressed part")?,
            uncompressed_size: to_u32(uncompressed, "part")?,
        };

        let mut patch = Vec::with_capacity(12);
        put_u32(&mut patch, entry.crc32);
        put_u32(&mut patch, entry.compressed_size);
        put_u32(&mut patch, entry.uncompressed_size);
        self.output.seek(SeekFrom::Start(offset + CRC_OFFSET))?;
        self.output.write_all(&patch)?;
        self.output.seek(SeekFrom::Start(end))?;

        Ok(entry)
    }

    /// Write the central directory and hand back the output with the archive length
    ///
    /// Bytes past that length are leftovers of a part that was rewritten
    /// uncompressed; callers truncate them.
    pub fn finish(mut self) -> Result<(W, u64)> {
        let central_dir_offset = self.output.stream_position()?;

        let mut buf = Vec::with_capacity(self.entries.len() * 80 + 22);
        for entry in &self.entries {
            put_u32(&mut buf, CENTRAL_DIR_SIG);
            put_u16(&mut buf, VERSION); // made by
            put_u16(&mut buf, VERSION); // needed
            put_u16(&mut buf, 0);
            put_u16(&mut buf, entry.method);
            put_u16(&mut buf, DOS_TIME);
            put_u16(&mut buf, DOS_DATE);
            put_u32(&mut buf, entry.crc32);
            put_u32(&mut buf, entry.compressed_size);
            put_u32(&mut buf, entry.uncompressed_size);
            put_u16(&mut buf, entry.name.len() as u16);
            put_u16(&mut buf, 0); // extra length
            put_u16(&mut buf, 0); // comment length
            put_u16(&mut buf, 0); // disk number
            put_u16(&mut buf, 0); // internal attributes
            put_u32(&mut buf, 0); // external attributes
            put_u32(&mut buf, entry.local_header_offset);
            buf.extend_from_slice(entry.name.as_bytes());
        }

        let central_dir_size = buf.len() as u64;
        let count = self.entries.len() as u16;
        put_u32(&mut buf, END_OF_CENTRAL_DIR_SIG);
        put_u16(&mut buf, 0); // this disk
        put_u16(&mut buf, 0); // disk with central directory
        put_u16(&mut buf, count);
        put_u16(&mut buf, count);
        put_u32(&mut buf, to_archive_u32(central_dir_size)?);
        put_u32(&mut buf, to_archive_u32(central_dir_offset)?);
        put_u16(&mut buf, 0); // comment length

        self.output.write_all(&buf)?;
        self.output.flush()?;

        let length = self.output.stream_position()?;
        if self.high_water > length {
            log::debug!("{} stale bytes past the archive end", self.high_water - length);
        }
        log::debug!("archive finished: {} entries, {} bytes", count, length);
        Ok((self.output, length))
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

fn to_archive_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        XlsxError::archive(ArchiveStep::Close, "archive larger than 4 GiB needs zip64")
    })
}
