//! Types for writing AFS archives
//!

use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::PathBuf;

use binrw::BinWrite;
use bon::Builder;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use chrono::{DateTime, Local, NaiveDateTime};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::types::{AfsHeader, AfsTableEntry, AfsTimestamp, AfsVersion};

/// Options for how the AFS file should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct AfsWriterOptions {
    /// The alignment quantum for the entry table and entry data
    #[builder(default = 2048)]
    pub block_size: u32,

    /// Where the metadata pointer is placed
    #[builder(default)]
    pub version: AfsVersion,

    /// Whether source timestamps are written into the metadata block
    #[builder(default = true)]
    pub has_timestamps: bool,
}

impl Default for AfsWriterOptions {
    fn default() -> Self {
        AfsWriterOptions::builder().build()
    }
}

enum EntrySource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

struct PendingEntry {
    name: String,
    length: u32,
    timestamp: Option<NaiveDateTime>,
    source: EntrySource,
}

/// Callback fired after each entry's data has been copied into the archive.
pub type EntryWritten = Box<dyn FnMut(usize, &str)>;

/// AFS archive generator
///
/// Entries are registered up front so the entry table can be laid out before
/// any data is copied; [`AfsWriter::finish`] then streams everything in
/// archive order.
///
/// ```
/// # fn doit() -> sega_afs::error::Result<()>
/// # {
/// use sega_afs::{AfsWriter, AfsWriterOptions};
///
/// let mut afs = AfsWriter::new(
///     std::io::Cursor::new(Vec::new()),
///     AfsWriterOptions::builder().has_timestamps(false).build(),
/// )?;
///
/// afs.add_bytes("hello.txt", b"Hello, World!".to_vec(), None)?;
/// let _buffer = afs.finish()?;
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct AfsWriter<W: Write + Seek> {
    inner: W,
    options: AfsWriterOptions,
    entries: Vec<PendingEntry>,
    on_entry_written: Option<EntryWritten>,
}

impl<W: Write + Seek> AfsWriter<W> {
    /// Initializes the archive at the writer's current position.
    pub fn new(inner: W, options: AfsWriterOptions) -> Result<AfsWriter<W>> {
        if options.block_size == 0 {
            return Err(Error::InvalidArgument(
                "block size must be at least 1".into(),
            ));
        }

        Ok(AfsWriter {
            inner,
            options,
            entries: Vec::new(),
            on_entry_written: None,
        })
    }

    /// Register a progress callback, fired once per entry as its data lands.
    pub fn on_entry_written(&mut self, callback: impl FnMut(usize, &str) + 'static) {
        self.on_entry_written = Some(Box::new(callback));
    }

    /// Number of entries registered so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries have been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register an entry backed by a file on disk.
    ///
    /// The file's length is recorded now; its modification time becomes the
    /// entry timestamp when the writer has timestamps enabled.
    #[instrument(skip(self, name, path), err)]
    pub fn add_path(&mut self, name: impl ToString, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        let length = u32::try_from(metadata.len())
            .map_err(|_| Error::InvalidArgument(format!("{} exceeds 4 GiB", path.display())))?;

        let timestamp = metadata
            .modified()
            .ok()
            .map(|time| DateTime::<Local>::from(time).naive_local());

        self.push_entry(name.to_string(), length, timestamp, EntrySource::Path(path))
    }

    /// Register an entry from an in-memory buffer.
    pub fn add_bytes(
        &mut self,
        name: impl ToString,
        data: Vec<u8>,
        timestamp: Option<NaiveDateTime>,
    ) -> Result<()> {
        let length = u32::try_from(data.len())
            .map_err(|_| Error::InvalidArgument("entry exceeds 4 GiB".into()))?;
        self.push_entry(
            name.to_string(),
            length,
            timestamp,
            EntrySource::Bytes(data),
        )
    }

    fn push_entry(
        &mut self,
        name: String,
        length: u32,
        timestamp: Option<NaiveDateTime>,
        source: EntrySource,
    ) -> Result<()> {
        if name.len() > 32 {
            return Err(Error::InvalidArgument(format!(
                "{name:?} does not fit in the 32-byte name field"
            )));
        }

        self.entries.push(PendingEntry {
            name,
            length,
            timestamp,
            source,
        });
        Ok(())
    }

    /// Lay out and write the whole archive, returning the inner writer.
    ///
    /// On failure the destination may hold a partial prefix which callers
    /// should discard.
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        let block = self.options.block_size as u64;
        let count = self.entries.len() as u32;

        // Header and entry table, kept in memory because the metadata block
        // later duplicates words out of this region.
        let mut header_block = Cursor::new(Vec::new());
        AfsHeader { entries: count }.write(&mut header_block)?;

        let first_entry_offset = sega_io::round_up(12 + count as u64 * 8, block);
        let mut offset = first_entry_offset;
        let mut table = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            table.push(AfsTableEntry {
                offset: offset as u32,
                length: entry.length,
            });
            offset += sega_io::round_up(entry.length as u64, block);
        }
        let metadata_offset = offset;
        let metadata_length = count as u64 * 48;

        for record in &table {
            record.write(&mut header_block)?;
        }
        let header_bytes = header_block.into_inner();
        self.inner.write_all(&header_bytes)?;
        let mut position = header_bytes.len() as u64;

        // The metadata pointer: directly after the table for V2, in the 8
        // bytes before the first entry for V1.
        match self.options.version {
            AfsVersion::V2 => {
                self.inner.write_u32::<LittleEndian>(metadata_offset as u32)?;
                self.inner.write_u32::<LittleEndian>(metadata_length as u32)?;
                position += 8;
                position = self.pad_to(position, first_entry_offset)?;
            }
            AfsVersion::V1 => {
                if first_entry_offset < position + 8 {
                    return Err(Error::InvalidArgument(format!(
                        "block size {} leaves no room for the metadata pointer",
                        self.options.block_size
                    )));
                }
                position = self.pad_to(position, first_entry_offset - 8)?;
                self.inner.write_u32::<LittleEndian>(metadata_offset as u32)?;
                self.inner.write_u32::<LittleEndian>(metadata_length as u32)?;
                position += 8;
            }
        }
        debug_assert_eq!(position, first_entry_offset);

        // Entry data, each padded out to a block boundary.
        let mut callback = self.on_entry_written.take();
        for (index, entry) in self.entries.iter().enumerate() {
            let copied = match &entry.source {
                EntrySource::Path(path) => {
                    let mut source = File::open(path)?;
                    sega_io::copy_padded(&mut source, &mut self.inner, block, 0)?
                }
                EntrySource::Bytes(bytes) => {
                    sega_io::copy_padded(&mut &bytes[..], &mut self.inner, block, 0)?
                }
            };

            if copied != entry.length as u64 {
                return Err(Error::InvalidArgument(format!(
                    "{:?} changed size while the archive was being written",
                    entry.name
                )));
            }

            if let Some(callback) = callback.as_mut() {
                callback(index, &entry.name);
            }
        }

        // Metadata block: name, timestamp, and the duplicated header word.
        for (index, entry) in self.entries.iter().enumerate() {
            sega_io::write_cstr(&mut self.inner, &entry.name, 32)?;

            let timestamp = entry
                .timestamp
                .filter(|_| self.options.has_timestamps)
                .map(AfsTimestamp::from_datetime)
                .unwrap_or_default();
            timestamp.write(&mut self.inner)?;

            let tag_position = match self.options.version {
                AfsVersion::V1 => 8 + index * 8,
                AfsVersion::V2 => 4 + index * 4,
            };
            let tag = LittleEndian::read_u32(&header_bytes[tag_position..tag_position + 4]);
            self.inner.write_u32::<LittleEndian>(tag)?;
        }

        Ok(self.inner)
    }

    fn pad_to(&mut self, position: u64, target: u64) -> Result<u64> {
        if target < position {
            return Err(Error::InvalidArgument(format!(
                "block size {} leaves no room for the metadata pointer",
                self.options.block_size
            )));
        }

        let padding = vec![0u8; (target - position) as usize];
        self.inner.write_all(&padding)?;
        Ok(target)
    }
}
