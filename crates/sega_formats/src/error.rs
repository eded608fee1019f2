//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`sega_prs::error::Error`]
    #[error(transparent)]
    #[diagnostic(transparent)]
    Prs(#[from] sega_prs::error::Error),

    /// Transparent wrapper for [`sega_tex::error::Error`]
    #[error(transparent)]
    #[diagnostic(transparent)]
    Texture(#[from] sega_tex::error::Error),

    /// Transparent wrapper for [`sega_afs::error::Error`]
    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] sega_afs::error::Error),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
