//! This library encodes and decodes the texture containers used by
//! Dreamcast, GameCube and PlayStation 2 era console games.
//!
//! # Texture Format Documentation
//!
//! Every texture file is a pair of chunks: an optional 16-byte global-index
//! chunk ("GBIX" or "GCIX") carrying a 32-bit engine-level texture id, and a
//! data chunk holding the dimensions, format codes, optional palette and the
//! pixel words. Three families share this shape:
//!
//! | Family | Console       | Data chunk | Dimensions    | Palette          |
//! |--------|---------------|------------|---------------|------------------|
//! | PVR    | Dreamcast     | `PVRT`     | little-endian | external (`.pvp`) |
//! | GVR    | GameCube      | `GVRT`     | big-endian    | internal or external (`.gvp`) |
//! | SVR    | PlayStation 2 | `PVRT`     | little-endian | internal or external (`.svp`) |
//!
//! Two axes describe every texture. The **pixel format** fixes the bit
//! layout of a single color word (RGB565, RGB5A3, ARGB8888, ...) and applies
//! to direct pixels and palette entries alike. The **data format** fixes the
//! storage arrangement: row-major rectangles, square-block tilings, and the
//! palette mode (none, 4-bit indices, 8-bit indices). The two families
//! sharing the `PVRT` magic are told apart by their format code ranges (SVR
//! codes start at 0x08 / 0x60).
//!
//! Decoding an externally-paletted texture is a two-step conversation: the
//! first `decode` fails with
//! [`NeedsExternalPalette`](error::Error::NeedsExternalPalette), the caller
//! locates the companion file and hands it to `set_palette`, and the retry
//! succeeds. Encoders for those formats return the companion file to be
//! saved next to the texture.
//!
//! ## Additional Information
//!
//! - **File Extensions**: `.pvr`, `.gvr`, `.svr` plus the `.pvp`/`.gvp`/`.svp`
//!   palette companions
//! - **Round-trip**: decode ∘ encode is the identity for bitmaps already in
//!   a format's gamut; reduced channels widen by bit replication so the
//!   reduction is idempotent

pub mod bitmap;
pub mod error;
pub mod gvr;
pub mod pvr;
pub mod svr;

mod block;
mod chunk;
mod color;

pub use bitmap::{Bitmap, Rgba};
pub use gvr::{GvpPalette, GvrTexture, GvrWriter, GvrWriterOptions};
pub use pvr::{PvpPalette, PvrTexture, PvrWriter, PvrWriterOptions};
pub use svr::{SvpPalette, SvrTexture, SvrWriter, SvrWriterOptions};

use error::{Error, Result};

pub(crate) fn truncated(e: binrw::Error) -> Error {
    fn is_eof(e: &binrw::Error) -> bool {
        match e {
            binrw::Error::Io(io) => io.kind() == std::io::ErrorKind::UnexpectedEof,
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

pub(crate) fn eof(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::Truncated
    } else {
        Error::IOError(e)
    }
}

pub(crate) fn dimension(value: u32) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| Error::InvalidArgument(format!("dimension {value} exceeds 65535")))
}
