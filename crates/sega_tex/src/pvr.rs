//! Dreamcast texture family: PVR containers and the PVP palette companion.
//!
//! PVR files use the little-endian "PVRT" data chunk behind an optional
//! "GBIX" chunk, with format codes below the SVR ranges. The indexed data
//! formats never embed a palette; the entries always live in a companion
//! `.pvp` file.

use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite};
use bon::Builder;
use byteorder::{ByteOrder, LittleEndian};
use tracing::instrument;

use crate::bitmap::{index_colors, Bitmap, Rgba};
use crate::block::{check_tiled, linear_positions, tiled_positions};
use crate::chunk::{GbixChunk, PvrtHeader};
use crate::color;
use crate::error::{Error, Result};
use crate::{dimension, eof, truncated};

/// Color format of direct pixels and palette entries (16-bit little-endian
/// words).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvrPixelFormat {
    Argb1555,
    Rgb565,
    Argb4444,
}

impl PvrPixelFormat {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(PvrPixelFormat::Argb1555),
            0x01 => Ok(PvrPixelFormat::Rgb565),
            0x02 => Ok(PvrPixelFormat::Argb4444),
            other => Err(Error::UnsupportedPixelFormat(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PvrPixelFormat::Argb1555 => 0x00,
            PvrPixelFormat::Rgb565 => 0x01,
            PvrPixelFormat::Argb4444 => 0x02,
        }
    }

    pub fn bits_per_pixel(self) -> usize {
        16
    }

    pub fn decode_pixel(self, source: &[u8], index: usize) -> Rgba {
        let word = LittleEndian::read_u16(&source[index * 2..]);
        match self {
            PvrPixelFormat::Argb1555 => color::decode_argb1555(word),
            PvrPixelFormat::Rgb565 => color::decode_rgb565(word),
            PvrPixelFormat::Argb4444 => color::decode_argb4444(word),
        }
    }

    pub fn encode_pixel(self, pixel: Rgba, dest: &mut Vec<u8>) {
        let word = match self {
            PvrPixelFormat::Argb1555 => color::encode_argb1555(pixel),
            PvrPixelFormat::Rgb565 => color::encode_rgb565(pixel),
            PvrPixelFormat::Argb4444 => color::encode_argb4444(pixel),
        };
        dest.extend(word.to_le_bytes());
    }

    pub fn decode_palette(self, source: &[u8], count: usize) -> Result<Vec<Rgba>> {
        if source.len() < count * 2 {
            return Err(Error::Truncated);
        }
        Ok((0..count).map(|i| self.decode_pixel(source, i)).collect())
    }

    pub fn encode_palette(self, palette: &[Rgba]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(palette.len() * 2);
        for &entry in palette {
            self.encode_pixel(entry, &mut bytes);
        }
        bytes
    }
}

/// On-disk arrangement of the pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvrDataFormat {
    /// Square image stored as 4x4 blocks
    Square,
    /// 4-bit palette indices in 8x8 blocks, palette in a `.pvp` file
    Index4,
    /// 8-bit palette indices in 8x8 blocks, palette in a `.pvp` file
    Index8,
    /// Row-major direct pixels
    Rectangle,
}

impl PvrDataFormat {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(PvrDataFormat::Square),
            0x05 => Ok(PvrDataFormat::Index4),
            0x07 => Ok(PvrDataFormat::Index8),
            0x09 => Ok(PvrDataFormat::Rectangle),
            other => Err(Error::UnsupportedDataFormat(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PvrDataFormat::Square => 0x01,
            PvrDataFormat::Index4 => 0x05,
            PvrDataFormat::Index8 => 0x07,
            PvrDataFormat::Rectangle => 0x09,
        }
    }

    pub fn bits_per_pixel(self) -> usize {
        match self {
            PvrDataFormat::Index4 => 4,
            PvrDataFormat::Index8 => 8,
            _ => 16,
        }
    }

    pub fn palette_entries(self) -> usize {
        match self {
            PvrDataFormat::Index4 => 16,
            PvrDataFormat::Index8 => 256,
            _ => 0,
        }
    }

    /// Every indexed PVR format keeps its palette in a companion file.
    pub fn needs_external_palette(self) -> bool {
        self.palette_entries() > 0
    }

    fn tile(self) -> Option<(u32, u32)> {
        match self {
            PvrDataFormat::Square => Some((4, 4)),
            PvrDataFormat::Index4 | PvrDataFormat::Index8 => Some((8, 8)),
            PvrDataFormat::Rectangle => None,
        }
    }

    pub fn data_length(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bits_per_pixel() / 8
    }

    fn check(self, width: u32, height: u32) -> Result<()> {
        match self.tile() {
            Some((tile_w, tile_h)) => check_tiled(width, height, tile_w, tile_h, true),
            None => check_tiled(width, height, 1, 1, false),
        }
    }

    fn positions(self, width: u32, height: u32) -> Box<dyn Iterator<Item = (u32, u32)>> {
        match self.tile() {
            Some((tile_w, tile_h)) => Box::new(tiled_positions(width, height, tile_w, tile_h)),
            None => Box::new(linear_positions(width, height)),
        }
    }

    /// Decode stored bytes to a bitmap.
    pub fn decode(
        self,
        source: &[u8],
        width: u32,
        height: u32,
        pixel_format: PvrPixelFormat,
        palette: Option<&[Rgba]>,
    ) -> Result<Bitmap> {
        self.check(width, height)?;
        if source.len() < self.data_length(width, height) {
            return Err(Error::Truncated);
        }

        let mut bitmap = Bitmap::new(width, height);
        match self {
            PvrDataFormat::Square | PvrDataFormat::Rectangle => {
                for (stored, (x, y)) in self.positions(width, height).enumerate() {
                    bitmap.set_pixel(x, y, pixel_format.decode_pixel(source, stored));
                }
            }
            PvrDataFormat::Index4 | PvrDataFormat::Index8 => {
                let palette = palette.ok_or(Error::NeedsExternalPalette)?;
                for (stored, (x, y)) in self.positions(width, height).enumerate() {
                    let index = if self == PvrDataFormat::Index4 {
                        // Low nibble first.
                        let byte = source[stored / 2];
                        if stored % 2 == 0 {
                            byte & 0xF
                        } else {
                            byte >> 4
                        }
                    } else {
                        source[stored]
                    } as usize;

                    let entry = *palette.get(index).ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "palette index {index} out of range ({} entries)",
                            palette.len()
                        ))
                    })?;
                    bitmap.set_pixel(x, y, entry);
                }
            }
        }

        Ok(bitmap)
    }

    /// Encode a bitmap into stored bytes, plus the palette for indexed
    /// formats (padded to the full entry count).
    pub fn encode(
        self,
        bitmap: &Bitmap,
        pixel_format: PvrPixelFormat,
    ) -> Result<(Vec<u8>, Option<Vec<Rgba>>)> {
        let (width, height) = (bitmap.width(), bitmap.height());
        self.check(width, height)?;

        let mut data = Vec::with_capacity(self.data_length(width, height));
        match self {
            PvrDataFormat::Square | PvrDataFormat::Rectangle => {
                for (x, y) in self.positions(width, height) {
                    pixel_format.encode_pixel(bitmap.pixel(x, y), &mut data);
                }
                Ok((data, None))
            }
            PvrDataFormat::Index4 | PvrDataFormat::Index8 => {
                let capacity = self.palette_entries();
                let (indices, mut palette) = index_colors(bitmap, capacity)?;
                palette.resize(capacity, [0, 0, 0, 0]);

                if self == PvrDataFormat::Index4 {
                    let mut pending = 0u8;
                    for (stored, (x, y)) in self.positions(width, height).enumerate() {
                        let index = indices[(y * width + x) as usize];
                        if stored % 2 == 0 {
                            pending = index;
                        } else {
                            data.push(index << 4 | pending);
                        }
                    }
                } else {
                    for (x, y) in self.positions(width, height) {
                        data.push(indices[(y * width + x) as usize]);
                    }
                }

                let palette = pixel_format
                    .decode_palette(&pixel_format.encode_palette(&palette), capacity)?;
                Ok((data, Some(palette)))
            }
        }
    }
}

/// Signature probe over the first bytes of a stream (32 are enough).
pub fn is_pvr(lead: &[u8]) -> bool {
    let header = if lead.len() >= 4 && &lead[..4] == b"GBIX" {
        if lead.len() >= 20 && &lead[16..20] == b"PVRT" {
            &lead[16..]
        } else {
            return false;
        }
    } else if lead.len() >= 4 && &lead[..4] == b"PVRT" {
        lead
    } else {
        return false;
    };

    // Dreamcast code ranges; the SVR family starts at 0x08 / 0x60.
    header.len() >= 10 && header[8] <= 0x02 && header[9] < 0x60
}

/// PVR texture reader
///
/// Indexed textures refuse to decode until [`PvrTexture::set_palette`] has
/// consumed a `.pvp` companion stream; PVR chunks never embed a palette.
pub struct PvrTexture<R> {
    reader: R,
    base: u64,
    global_index: Option<u32>,
    width: u16,
    height: u16,
    pixel_format: PvrPixelFormat,
    data_format: PvrDataFormat,
    palette: Option<Vec<Rgba>>,
    data_offset: u64,
}

impl<R: Read + Seek> PvrTexture<R> {
    /// Parse the texture headers at the reader's current position.
    #[instrument(skip(reader), err)]
    pub fn new(mut reader: R) -> Result<PvrTexture<R>> {
        let base = reader.stream_position()?;
        let lead = sega_io::peek(&mut reader, 32)?;
        if !is_pvr(&lead) {
            return Err(Error::BadMagic);
        }

        reader.seek(SeekFrom::Start(base))?;
        let global_index = if &lead[..4] == b"GBIX" {
            Some(GbixChunk::read(&mut reader).map_err(truncated)?.global_index)
        } else {
            None
        };

        let header = PvrtHeader::read(&mut reader).map_err(truncated)?;
        let pixel_format = PvrPixelFormat::from_code(header.pixel_format)?;
        let data_format = PvrDataFormat::from_code(header.data_format)?;

        let data_offset = reader.stream_position()? - base;
        Ok(PvrTexture {
            reader,
            base,
            global_index,
            width: header.width,
            height: header.height,
            pixel_format,
            data_format,
            palette: None,
            data_offset,
        })
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    pub fn global_index(&self) -> Option<u32> {
        self.global_index
    }

    pub fn pixel_format(&self) -> PvrPixelFormat {
        self.pixel_format
    }

    pub fn data_format(&self) -> PvrDataFormat {
        self.data_format
    }

    /// Whether decoding currently requires [`PvrTexture::set_palette`].
    pub fn needs_external_palette(&self) -> bool {
        self.data_format.needs_external_palette() && self.palette.is_none()
    }

    /// Consume a `.pvp` palette stream for this texture.
    #[instrument(skip_all, err)]
    pub fn set_palette<P: Read + ?Sized>(&mut self, source: &mut P) -> Result<()> {
        if self.data_format.palette_entries() == 0 {
            return Err(Error::InvalidArgument(
                "texture's data format carries no palette".into(),
            ));
        }

        let file = PvpPalette::new(source)?;
        self.palette = Some(file.decode(self.pixel_format)?);
        Ok(())
    }

    /// Decode the pixel data to a bitmap.
    #[instrument(skip(self), err)]
    pub fn decode(&mut self) -> Result<Bitmap> {
        let palette = if self.data_format.palette_entries() > 0 {
            Some(
                self.palette
                    .as_deref()
                    .ok_or(Error::NeedsExternalPalette)?,
            )
        } else {
            None
        };

        let length = self.data_format.data_length(self.width(), self.height());
        self.reader
            .seek(SeekFrom::Start(self.base + self.data_offset))?;
        let mut data = vec![0u8; length];
        self.reader.read_exact(&mut data).map_err(eof)?;

        self.data_format.decode(
            &data,
            self.width(),
            self.height(),
            self.pixel_format,
            palette,
        )
    }

    /// Unwrap and return the inner reader object
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// A standalone `.pvp` palette file: a little-endian entry count followed by
/// the encoded entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvpPalette {
    count: u16,
    raw: Vec<u8>,
}

impl PvpPalette {
    /// Read a palette file from a stream.
    pub fn new<R: Read + ?Sized>(source: &mut R) -> Result<Self> {
        let mut header = [0u8; 2];
        source.read_exact(&mut header).map_err(eof)?;

        let mut raw = Vec::new();
        source.read_to_end(&mut raw)?;
        Ok(PvpPalette {
            count: u16::from_le_bytes(header),
            raw,
        })
    }

    pub fn from_entries(pixel: PvrPixelFormat, entries: &[Rgba]) -> Self {
        PvpPalette {
            count: entries.len() as u16,
            raw: pixel.encode_palette(entries),
        }
    }

    pub fn count(&self) -> usize {
        self.count as usize
    }

    pub fn decode(&self, pixel: PvrPixelFormat) -> Result<Vec<Rgba>> {
        pixel.decode_palette(&self.raw, self.count as usize)
    }

    pub fn write<W: Write + ?Sized>(&self, dest: &mut W) -> Result<()> {
        dest.write_all(&self.count.to_le_bytes())?;
        dest.write_all(&self.raw)?;
        Ok(())
    }
}

/// Options for how the PVR file should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct PvrWriterOptions {
    pub pixel_format: PvrPixelFormat,
    pub data_format: PvrDataFormat,

    /// Emit a GBIX chunk carrying this index
    pub global_index: Option<u32>,
}

/// PVR texture generator
pub struct PvrWriter<W: Write + Seek> {
    inner: W,
    options: PvrWriterOptions,
    written: bool,
}

impl<W: Write + Seek> PvrWriter<W> {
    pub fn new(inner: W, options: PvrWriterOptions) -> PvrWriter<W> {
        PvrWriter {
            inner,
            options,
            written: false,
        }
    }

    /// Encode and write one texture; returns the companion palette file for
    /// the indexed data formats.
    #[instrument(skip_all, err)]
    pub fn write(&mut self, bitmap: &Bitmap) -> Result<Option<PvpPalette>> {
        let width = dimension(bitmap.width())?;
        let height = dimension(bitmap.height())?;
        let pixel_format = self.options.pixel_format;
        let data_format = self.options.data_format;

        let (data, palette) = data_format.encode(bitmap, pixel_format)?;
        let companion =
            palette.map(|entries| PvpPalette::from_entries(pixel_format, &entries));

        if let Some(global_index) = self.options.global_index {
            GbixChunk::new(*b"GBIX", global_index).write(&mut self.inner)?;
        }

        PvrtHeader {
            length: (8 + data.len()) as u32,
            pixel_format: pixel_format.code(),
            data_format: data_format.code(),
            reserved: 0,
            width,
            height,
        }
        .write(&mut self.inner)?;

        self.inner.write_all(&data)?;
        self.written = true;
        Ok(companion)
    }

    /// Return the inner writer; fails when nothing has been written.
    pub fn finish(self) -> Result<W> {
        if !self.written {
            return Err(Error::NotInitialized);
        }
        Ok(self.inner)
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    fn pattern(width: u32, height: u32) -> Bitmap {
        // Channels restricted to 0/255 survive every reduced format; the
        // position-dependent pattern still catches ordering mistakes.
        let mut bitmap = Bitmap::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let r = if (x + y) % 2 == 0 { 255 } else { 0 };
                let g = if x % 3 == 0 { 255 } else { 0 };
                let b = if y % 2 == 0 { 255 } else { 0 };
                bitmap.set_pixel(x, y, [r, g, b, 255]);
            }
        }
        bitmap
    }

    #[test]
    fn square_roundtrip_all_pixel_formats() {
        let bitmap = pattern(8, 8);
        for pixel_format in [
            PvrPixelFormat::Argb1555,
            PvrPixelFormat::Rgb565,
            PvrPixelFormat::Argb4444,
        ] {
            let mut writer = PvrWriter::new(
                Cursor::new(Vec::new()),
                PvrWriterOptions::builder()
                    .pixel_format(pixel_format)
                    .data_format(PvrDataFormat::Square)
                    .global_index(9)
                    .build(),
            );
            writer.write(&bitmap).unwrap();
            let bytes = writer.finish().unwrap().into_inner();

            let mut texture = PvrTexture::new(Cursor::new(bytes)).unwrap();
            assert_eq!(texture.pixel_format(), pixel_format);
            assert_eq!(texture.global_index(), Some(9));
            assert_eq!(texture.decode().unwrap(), bitmap, "{pixel_format:?}");
        }
    }

    #[test]
    fn rectangle_needs_no_square_shape() {
        let bitmap = pattern(6, 2);
        let mut writer = PvrWriter::new(
            Cursor::new(Vec::new()),
            PvrWriterOptions::builder()
                .pixel_format(PvrPixelFormat::Rgb565)
                .data_format(PvrDataFormat::Rectangle)
                .build(),
        );
        writer.write(&bitmap).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut texture = PvrTexture::new(Cursor::new(bytes)).unwrap();
        assert_eq!(texture.decode().unwrap(), bitmap);
    }

    #[test]
    fn square_format_rejects_rectangles() {
        let bitmap = pattern(8, 4);
        let mut writer = PvrWriter::new(
            Cursor::new(Vec::new()),
            PvrWriterOptions::builder()
                .pixel_format(PvrPixelFormat::Rgb565)
                .data_format(PvrDataFormat::Square)
                .build(),
        );
        assert!(matches!(
            writer.write(&bitmap),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn indexed_palette_is_always_external() {
        let mut bitmap = Bitmap::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                let color = if x < 4 { [255, 0, 0, 255] } else { [0, 0, 0, 255] };
                bitmap.set_pixel(x, y, color);
            }
        }

        let mut writer = PvrWriter::new(
            Cursor::new(Vec::new()),
            PvrWriterOptions::builder()
                .pixel_format(PvrPixelFormat::Argb1555)
                .data_format(PvrDataFormat::Index4)
                .build(),
        );
        let companion = writer.write(&bitmap).unwrap().unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        // The chunk holds the header and indices only.
        assert_eq!(bytes.len(), 16 + 8 * 8 / 2);

        let mut texture = PvrTexture::new(Cursor::new(bytes)).unwrap();
        assert!(texture.needs_external_palette());
        assert!(matches!(texture.decode(), Err(Error::NeedsExternalPalette)));

        let mut palette_stream = Cursor::new(Vec::new());
        companion.write(&mut palette_stream).unwrap();
        texture
            .set_palette(&mut Cursor::new(palette_stream.into_inner()))
            .unwrap();
        assert_eq!(texture.decode().unwrap(), bitmap);
    }

    #[test]
    fn probe_accepts_only_dreamcast_codes() {
        let mut lead = Vec::new();
        lead.extend(b"PVRT");
        lead.extend(0u32.to_le_bytes());
        lead.push(0x01);
        lead.push(0x09);
        lead.extend([0, 0, 8, 0, 8, 0]);
        assert!(is_pvr(&lead));

        lead[8] = 0x08;
        lead[9] = 0x60;
        assert!(!is_pvr(&lead));
    }
}
