//! This library handles reading from and creating **AFS** files used by
//! Dreamcast, GameCube, PlayStation 2 and Xbox era console games.
//!
//! # AFS Archive Format Documentation
//!
//! The AFS format is a block-aligned container that stores game assets as a
//! flat list of entries. AFS files are typically identified with the `.afs`
//! extension.
//!
//! ## File Structure
//!
//! An AFS file consists of a header with an entry table, the block-aligned
//! entry data, and a metadata block carrying names and timestamps.
//!
//! | Offset (bytes) | Field             | Description                                       |
//! |----------------|-------------------|---------------------------------------------------|
//! | 0x0000         | Magic number      | 4 bytes: 0x00534641 ("AFS\0")                     |
//! | 0x0004         | Entry count       | 4 bytes: Number of entries in the archive         |
//! | 0x0008         | Entry table       | 8 bytes per entry: data offset and length         |
//! | after table    | Metadata pointer  | 8 bytes: metadata offset and length (V2 position) |
//!
//! ### Header
//!
//! Every multi-byte integer is little-endian. The entry table lists an
//! absolute `(offset, length)` pair per entry; offsets are multiples of the
//! archive's block size (2048 bytes in every file seen in the wild).
//!
//! The metadata pointer exists in two layout variants. **V2** archives store
//! the pair directly after the entry table. **V1** archives leave that word
//! zero and store the pair in the 8 bytes immediately before the first
//! entry's data; readers fall back to that position when the word after the
//! table is zero.
//!
//! ### Entry Data
//!
//! Each entry's bytes are stored at its table offset and padded with zeros up
//! to the next block boundary, so `offset[i+1] = offset[i] +
//! round_up(length[i], block_size)`.
//!
//! ### Metadata Block
//!
//! The metadata block starts right after the last entry's padding and holds
//! one 48-byte record per entry:
//!
//! | Offset (bytes) | Field     | Description                                      |
//! |----------------|-----------|--------------------------------------------------|
//! | 0x0000         | Name      | 32 bytes: zero-terminated entry name             |
//! | 0x0020         | Timestamp | six i16 fields: year, month, day, hour, min, sec |
//! | 0x002C         | Tag       | 4 bytes copied from inside the header region     |
//!
//! The trailing tag duplicates a word from the file's own header area (at
//! `8 + 8i` for V1 archives, `4 + 4i` for V2); its in-game purpose is
//! unknown and it is reproduced bit-for-bit when writing.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.afs`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Block size**: 2048 unless a writer chooses otherwise; not recorded in
//!   the file itself

pub mod error;
pub mod read;
pub mod types;
pub mod write;

pub use read::AfsArchive;
pub use types::{AfsTimestamp, AfsVersion};
pub use write::{AfsWriter, AfsWriterOptions};
