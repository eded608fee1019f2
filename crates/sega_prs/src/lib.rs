//! This library compresses and decompresses the **PRS** stream format used
//! throughout the asset pipelines of Dreamcast, GameCube, PlayStation 2 and
//! Xbox era console games.
//!
//! # PRS Stream Documentation
//!
//! PRS is a Lempel-Ziv style format with no header or framing: a PRS file is
//! a bare command stream, conventionally identified by the `.prs` extension.
//! Commands are selected by flag bits taken MSB-first from control bytes
//! embedded in the stream. A control byte supplies eight flag bits; the data
//! bytes of the commands it describes follow it, and the next control byte is
//! emitted when another flag is needed after those eight are spent. A command
//! whose flag bits straddle two control bytes places its data bytes after the
//! second one.
//!
//! ## Commands
//!
//! | Flags   | Command    | Encoding                                                       |
//! |---------|------------|----------------------------------------------------------------|
//! | `1`     | Literal    | copy the next data byte to the output                          |
//! | `0 0`   | Short copy | 2 more flag bits give `L`; copy `L + 2` bytes from `offset` given by the next data byte − 256 |
//! | `0 1`   | Long copy  | next two data bytes form `W` (little-endian); see below        |
//!
//! For a long copy, `offset = (W >> 3) − 8192` (always in `[−8192, −1]`) and
//! the low three bits of `W` select the length: a non-zero value `n` copies
//! `n + 2` bytes, while zero pulls one extra byte `B`, the end-of-stream
//! marker when `B` is zero and a copy of `B + 1` bytes otherwise. Copies read
//! from already-produced output at `position + offset` and may overlap the
//! write cursor, which repeats recent bytes.
//!
//! Every stream terminates with the long-copy end marker; a stream that ends
//! without one is [truncated](error::Error::Truncated).
//!
//! ## Additional Information
//!
//! - **File Extension**: `.prs`
//! - **Window**: back-references reach at most 8192 bytes; copies are at most
//!   256 bytes long
//! - **Identification**: there is no magic number; consumers go by extension

pub mod compress;
pub mod decompress;
pub mod error;

pub use compress::compress;
pub use decompress::decompress;
