//! Types for reading AFS archives
//!

use std::{
    fmt::{self, Debug},
    io::{self, Read, Seek, SeekFrom},
    sync::Arc,
};

use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use tracing::instrument;

use crate::{
    error::{Error, FileNotFoundError, Result},
    types::{AfsHeader, AfsMetadataEntry, AfsTableEntry},
};

/// Metadata of a single archive entry.
#[derive(Debug, Clone)]
pub struct AfsEntryData {
    /// Entry name from the metadata block; empty when the archive carries no
    /// metadata
    pub name: Box<str>,

    /// Offset of the entry data, relative to the start of the archive
    pub offset: u64,

    /// Entry length in bytes, before block padding
    pub length: u64,

    /// Timestamp from the metadata block, `None` when zeroed or absent
    pub timestamp: Option<NaiveDateTime>,

    /// The 4-byte word trailing each metadata record, reproduced verbatim
    pub tag: u32,
}

/// A struct for reading an entry from an AFS file
pub struct AfsFile<'a, R: Read + Seek> {
    data: &'a AfsEntryData,
    reader: io::Take<&'a mut R>,
}

impl<R: Read + Seek> Debug for AfsFile<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AfsFile({:#?})", self.data)
    }
}

impl<R: Read + Seek> AfsFile<'_, R> {
    /// Get the name of the entry
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`). Carelessly writing to these paths
    /// allows an attacker to craft an AFS archive that will overwrite
    /// critical files.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Get the size of the entry, in bytes, before block padding
    pub fn size(&self) -> u64 {
        self.data.length
    }

    /// Get the offset of the entry data relative to the start of the archive
    pub fn data_start(&self) -> u64 {
        self.data.offset
    }

    /// Get the entry's timestamp, if one was recorded
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.data.timestamp
    }

    /// Get the unknown trailing word of the entry's metadata record
    pub fn tag(&self) -> u32 {
        self.data.tag
    }
}

impl<R: Read + Seek> Read for AfsFile<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

#[derive(Debug)]
struct Shared {
    entries: Vec<AfsEntryData>,
    by_name: IndexMap<Box<str>, usize>,
}

/// AFS archive reader
///
/// All offsets are interpreted relative to the stream position at open time,
/// so an AFS region embedded inside a larger container parses unchanged.
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_afs_contents(reader: impl Read + Seek) -> sega_afs::error::Result<()> {
///     let mut afs = sega_afs::AfsArchive::new(reader)?;
///
///     for i in 0..afs.len() {
///         let mut file = afs.by_index(i)?;
///         println!("{}: {} bytes", file.name(), file.size());
///         std::io::copy(&mut file, &mut std::io::sink())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct AfsArchive<R> {
    reader: R,
    base: u64,
    shared: Arc<Shared>,
}

impl<R: Read + Seek> AfsArchive<R> {
    /// Read an AFS archive, collecting the entries it contains.
    #[instrument(skip(reader), err)]
    pub fn new(mut reader: R) -> Result<AfsArchive<R>> {
        let base = reader.stream_position()?;

        if !sega_io::contains_at(&mut reader, base, b"AFS\0")? {
            return Err(Error::BadMagic);
        }

        let shared = Self::get_metadata(&mut reader, base)?;
        Ok(AfsArchive {
            reader,
            base,
            shared: shared.into(),
        })
    }

    /// Number of entries contained in this archive.
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    /// Whether this archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over the entry names, in table order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.shared.entries.iter().map(|e| e.name.as_ref())
    }

    /// Total size of the entry data, not counting padding or metadata.
    pub fn data_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for entry in &self.shared.entries {
            total = total.checked_add(entry.length as u128)?;
        }
        Some(total)
    }

    /// Get the index of an entry by name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.shared.by_name.get(name).copied()
    }

    /// Get the name of an entry, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.shared.entries.get(index).map(|e| e.name.as_ref())
    }

    /// Search for an entry by name
    pub fn by_name(&mut self, name: &str) -> Result<AfsFile<'_, R>> {
        let Some(index) = self.index_for_name(name) else {
            return Err(Error::FileNotFound(FileNotFoundError::Name(
                name.to_owned(),
            )));
        };
        self.by_index(index)
    }

    /// Get a contained entry by index
    pub fn by_index(&mut self, index: usize) -> Result<AfsFile<'_, R>> {
        let data = self
            .shared
            .entries
            .get(index)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(index)))?;

        self.reader.seek(SeekFrom::Start(self.base + data.offset))?;

        Ok(AfsFile {
            data,
            reader: self.reader.by_ref().take(data.length),
        })
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn get_metadata(reader: &mut R, base: u64) -> Result<Shared> {
        reader.seek(SeekFrom::Start(base))?;
        let header = AfsHeader::read(reader).map_err(truncated)?;

        let table = (0..header.entries)
            .map(|_| AfsTableEntry::read(reader).map_err(truncated))
            .collect::<Result<Vec<_>>>()?;

        let metadata = Self::get_metadata_records(reader, base, &table)?;

        let mut entries = Vec::with_capacity(table.len());
        let mut by_name = IndexMap::with_capacity(table.len());
        for (index, record) in table.iter().enumerate() {
            let (name, timestamp, tag) = match metadata.as_ref() {
                Some(records) => {
                    let record = &records[index];
                    (
                        sega_io::read_cstr(&mut &record.name[..], 32)?,
                        record.timestamp.to_datetime(),
                        record.tag,
                    )
                }
                None => (String::new(), None, 0),
            };

            let name: Box<str> = name.into();
            by_name.entry(name.clone()).or_insert(index);
            entries.push(AfsEntryData {
                name,
                offset: record.offset as u64,
                length: record.length as u64,
                timestamp,
                tag,
            });
        }

        Ok(Shared { entries, by_name })
    }

    /// Locate and read the metadata block, trying the V2 position first and
    /// falling back to the V1 position before the first entry.
    fn get_metadata_records(
        reader: &mut R,
        base: u64,
        table: &[AfsTableEntry],
    ) -> Result<Option<Vec<AfsMetadataEntry>>> {
        if table.is_empty() {
            return Ok(None);
        }

        let mut metadata_offset = reader.read_u32::<LittleEndian>().map_err(eof)? as u64;
        if metadata_offset == 0 && table[0].offset >= 8 {
            reader.seek(SeekFrom::Start(base + table[0].offset as u64 - 8))?;
            metadata_offset = reader.read_u32::<LittleEndian>().map_err(eof)? as u64;
        }

        if metadata_offset == 0 {
            return Ok(None);
        }

        reader.seek(SeekFrom::Start(base + metadata_offset))?;
        let records = (0..table.len())
            .map(|_| AfsMetadataEntry::read(reader).map_err(truncated))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(records))
    }
}

fn truncated(e: binrw::Error) -> Error {
    fn is_eof(e: &binrw::Error) -> bool {
        match e {
            binrw::Error::Io(io) => io.kind() == io::ErrorKind::UnexpectedEof,
            binrw::Error::Backtrace(backtrace) => is_eof(&backtrace.error),
            _ => false,
        }
    }

    if is_eof(&e) {
        Error::Truncated
    } else {
        Error::BinRWError(e)
    }
}

fn eof(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated
    } else {
        Error::IOError(e)
    }
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Read, Seek, SeekFrom, Write};

    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::AfsArchive;
    use crate::error::Error;

    /// A one-entry archive laid out by hand with the metadata pointer in the
    /// V2 position (directly after the table).
    fn one_entry_v2() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(b"AFS\0");
        bytes.extend(1u32.to_le_bytes());
        bytes.extend(0x20u32.to_le_bytes()); // entry offset
        bytes.extend(5u32.to_le_bytes()); // entry length
        bytes.extend(0x28u32.to_le_bytes()); // metadata offset
        bytes.extend(48u32.to_le_bytes()); // metadata length
        bytes.resize(0x20, 0);
        bytes.extend(b"hello");
        bytes.resize(0x28, 0);

        bytes.extend(b"hi.dat");
        bytes.resize(0x28 + 32, 0);
        for field in [2004i16, 3, 15, 10, 30, 45] {
            bytes.extend(field.to_le_bytes());
        }
        bytes.extend(0x20u32.to_le_bytes()); // tag
        bytes
    }

    #[test]
    fn read_v2_archive() {
        let mut archive = AfsArchive::new(Cursor::new(one_entry_v2())).unwrap();
        assert_eq!(archive.len(), 1);

        let mut file = archive.by_index(0).unwrap();
        assert_eq!(file.name(), "hi.dat");
        assert_eq!(file.size(), 5);
        assert_eq!(file.data_start(), 0x20);
        assert_eq!(file.tag(), 0x20);
        assert_eq!(
            file.timestamp(),
            Some(
                NaiveDate::from_ymd_opt(2004, 3, 15)
                    .unwrap()
                    .and_hms_opt(10, 30, 45)
                    .unwrap()
            )
        );

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"hello");
    }

    #[test]
    fn read_v1_archive_uses_the_fallback_pointer() {
        let mut bytes = one_entry_v2();
        // Zero the V2 pointer and move the pair to the 8 bytes before the
        // first entry.
        bytes[16..24].fill(0);
        bytes[0x18..0x1C].copy_from_slice(&0x28u32.to_le_bytes());
        bytes[0x1C..0x20].copy_from_slice(&48u32.to_le_bytes());

        let mut archive = AfsArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_index(0).unwrap();
        assert_eq!(file.name(), "hi.dat");

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"hello");
    }

    #[test]
    fn read_by_name() {
        let mut archive = AfsArchive::new(Cursor::new(one_entry_v2())).unwrap();
        assert!(archive.by_name("hi.dat").is_ok());
        assert!(matches!(
            archive.by_name("missing.dat"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn read_bad_magic() {
        let archive = AfsArchive::new(Cursor::new(b"TREE0005".to_vec()));
        assert!(matches!(archive, Err(Error::BadMagic)));
    }

    #[test]
    fn read_truncated_table() {
        let mut bytes = Vec::new();
        bytes.extend(b"AFS\0");
        bytes.extend(4u32.to_le_bytes());
        bytes.extend(0x20u32.to_le_bytes());

        let archive = AfsArchive::new(Cursor::new(bytes));
        assert!(matches!(archive, Err(Error::Truncated)));
    }

    #[test]
    fn read_embedded_archive() {
        // The same archive shifted into a larger stream; offsets stay
        // relative to the open position.
        let mut stream = Cursor::new(Vec::new());
        stream.write_all(&[0xEE; 512]).unwrap();
        stream.write_all(&one_entry_v2()).unwrap();
        stream.seek(SeekFrom::Start(512)).unwrap();

        let mut archive = AfsArchive::new(stream).unwrap();
        let mut file = archive.by_index(0).unwrap();

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"hello");
    }

    #[test]
    fn entry_names_in_table_order() {
        let archive = AfsArchive::new(Cursor::new(one_entry_v2())).unwrap();
        assert_eq!(archive.entry_names().collect::<Vec<_>>(), vec!["hi.dat"]);
        assert_eq!(archive.data_size(), Some(5));
    }
}
