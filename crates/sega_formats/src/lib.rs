//! Format registry for the sega-rs toolkit.
//!
//! Every supported file format registers one [`FormatDescriptor`] in a
//! compile-time table: a human name, its canonical extension, capability
//! flags, and a signature probe over the first 32 bytes of a stream.
//! [`identify`] walks the table with the stricter signatures first; formats
//! without any magic (PRS streams, the bare palette companions) are claimed
//! by extension alone, so for those the filename is required while for the
//! rest the magic is.
//!
//! The registry never consumes the stream it probes: callers hand the same
//! reader straight to the matched handler afterwards.

use std::io::{Read, Seek};
use std::path::Path;

use tracing::instrument;

pub mod error;

use error::Result;
use sega_tex::bitmap::Bitmap;

/// The formats the toolkit understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Afs,
    Gvr,
    Svr,
    Pvr,
    Gvp,
    Svp,
    Pvp,
    Prs,
}

/// One registry entry.
pub struct FormatDescriptor {
    pub format: Format,
    /// Human-readable format name
    pub name: &'static str,
    /// Canonical file extension, lowercase, without the dot
    pub extension: &'static str,
    pub can_read: bool,
    pub can_write: bool,
    /// Whether identification needs the extension because the format has no
    /// magic
    pub requires_extension: bool,
    /// Signature probe over the first 32 bytes
    pub probe: fn(&[u8]) -> bool,
}

fn probe_afs(lead: &[u8]) -> bool {
    lead.len() >= 4 && &lead[..4] == b"AFS\0"
}

fn probe_extension_only(_: &[u8]) -> bool {
    true
}

/// The registry, stricter signatures first. The two `PVRT` families are
/// disambiguated inside their probes by format code ranges, and the
/// extension-only formats come last so a real magic always wins.
pub const FORMATS: &[FormatDescriptor] = &[
    FormatDescriptor {
        format: Format::Afs,
        name: "AFS archive",
        extension: "afs",
        can_read: true,
        can_write: true,
        requires_extension: false,
        probe: probe_afs,
    },
    FormatDescriptor {
        format: Format::Gvr,
        name: "GVR texture",
        extension: "gvr",
        can_read: true,
        can_write: true,
        requires_extension: false,
        probe: sega_tex::gvr::is_gvr,
    },
    FormatDescriptor {
        format: Format::Svr,
        name: "SVR texture",
        extension: "svr",
        can_read: true,
        can_write: true,
        requires_extension: false,
        probe: sega_tex::svr::is_svr,
    },
    FormatDescriptor {
        format: Format::Pvr,
        name: "PVR texture",
        extension: "pvr",
        can_read: true,
        can_write: true,
        requires_extension: false,
        probe: sega_tex::pvr::is_pvr,
    },
    FormatDescriptor {
        format: Format::Gvp,
        name: "GVP palette",
        extension: "gvp",
        can_read: true,
        can_write: true,
        requires_extension: true,
        probe: probe_extension_only,
    },
    FormatDescriptor {
        format: Format::Svp,
        name: "SVP palette",
        extension: "svp",
        can_read: true,
        can_write: true,
        requires_extension: true,
        probe: probe_extension_only,
    },
    FormatDescriptor {
        format: Format::Pvp,
        name: "PVP palette",
        extension: "pvp",
        can_read: true,
        can_write: true,
        requires_extension: true,
        probe: probe_extension_only,
    },
    FormatDescriptor {
        format: Format::Prs,
        name: "PRS compressed stream",
        extension: "prs",
        can_read: true,
        can_write: true,
        requires_extension: true,
        probe: probe_extension_only,
    },
];

/// Identify the format of a stream from its leading bytes and filename.
///
/// The stream's cursor is restored after probing. Returns `None` when no
/// descriptor claims the input.
#[instrument(skip(reader), err)]
pub fn identify<R: Read + Seek + ?Sized>(
    reader: &mut R,
    filename: &str,
) -> Result<Option<&'static FormatDescriptor>> {
    let extension = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    let lead = sega_io::peek(reader, 32)?;

    for descriptor in FORMATS {
        if descriptor.requires_extension && extension.as_deref() != Some(descriptor.extension) {
            continue;
        }
        if (descriptor.probe)(&lead) {
            return Ok(Some(descriptor));
        }
    }

    Ok(None)
}

/// Direct lookup by format name (case-insensitive).
pub fn get(name: &str) -> Option<&'static FormatDescriptor> {
    FORMATS
        .iter()
        .find(|descriptor| descriptor.name.eq_ignore_ascii_case(name))
}

/// An archive entry materialized by [`read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// The decoded product of a [`read`] dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// Decompressed or raw bytes
    Bytes(Vec<u8>),
    /// A decoded texture
    Bitmap(Bitmap),
    /// Materialized archive entries, in table order
    Entries(Vec<ArchiveEntry>),
}

/// Read a stream through the handler for `format`.
///
/// Texture formats that need an external palette surface
/// [`sega_tex::error::Error::NeedsExternalPalette`]; callers that can locate
/// the companion file should use the texture types directly to retry.
#[instrument(skip(reader), err)]
pub fn read<R: Read + Seek>(format: Format, reader: &mut R) -> Result<ReadOutcome> {
    match format {
        Format::Prs => Ok(ReadOutcome::Bytes(sega_prs::decompress(reader)?)),
        Format::Pvr => {
            let mut texture = sega_tex::PvrTexture::new(reader)?;
            Ok(ReadOutcome::Bitmap(texture.decode()?))
        }
        Format::Gvr => {
            let mut texture = sega_tex::GvrTexture::new(reader)?;
            Ok(ReadOutcome::Bitmap(texture.decode()?))
        }
        Format::Svr => {
            let mut texture = sega_tex::SvrTexture::new(reader)?;
            Ok(ReadOutcome::Bitmap(texture.decode()?))
        }
        Format::Afs => {
            let mut archive = sega_afs::AfsArchive::new(reader)?;
            let mut entries = Vec::with_capacity(archive.len());
            for index in 0..archive.len() {
                let mut entry = archive.by_index(index)?;
                let name = entry.name().to_owned();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).map_err(sega_afs::error::Error::from)?;
                entries.push(ArchiveEntry { name, data });
            }
            Ok(ReadOutcome::Entries(entries))
        }
        Format::Pvp | Format::Svp | Format::Gvp => {
            // Palette companions carry no pixel format of their own; hand
            // back the raw bytes for the texture layer to interpret.
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            Ok(ReadOutcome::Bytes(data))
        }
    }
}
