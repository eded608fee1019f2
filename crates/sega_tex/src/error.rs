//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file does not carry a recognized texture signature
    #[error("file does not carry a recognized texture signature")]
    BadMagic,

    /// texture ended before a required field
    #[error("texture ended before a required field")]
    Truncated,

    /// pixel format code {0:#04x} is not supported
    #[error("pixel format code {0:#04x} is not supported")]
    UnsupportedPixelFormat(u8),

    /// data format code {0:#04x} is not supported
    #[error("data format code {0:#04x} is not supported")]
    UnsupportedDataFormat(u8),

    /// an external palette must be supplied before decoding
    #[error("an external palette must be supplied before decoding")]
    #[diagnostic(help("load the companion palette file and call set_palette"))]
    NeedsExternalPalette,

    /// source bitmap has more distinct colors than the palette holds
    #[error("source bitmap has more than {capacity} distinct colors")]
    PaletteOverflow {
        /// Number of entries the palette can hold
        capacity: usize,
    },

    /// no texture has been written yet
    #[error("no texture has been written yet")]
    NotInitialized,

    /// {0}
    #[error("{0}")]
    InvalidArgument(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
