//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// stream ended before the end-of-stream marker
    #[error("stream ended before the end-of-stream marker")]
    Truncated,

    /// back-reference points before the start of the output
    #[error("back-reference to offset {offset} at output position {position}")]
    InvalidBackref {
        /// The relative offset of the copy command
        offset: i32,
        /// The output length when the command was decoded
        position: usize,
    },
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
