//! GameCube texture family: GVR containers and the GVP palette companion.
//!
//! GVR files wrap a big-endian data chunk ("GVRT") behind an optional
//! global-index chunk ("GCIX", or "GBIX" in a handful of games). Pixels are
//! stored in 4x4 or 8x8 blocks; indexed formats keep their palette either
//! inside the chunk or in a companion `.gvp` file.

use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite};
use bon::Builder;
use byteorder::{BigEndian, ByteOrder};
use tracing::instrument;

use crate::bitmap::{index_colors, Bitmap, Rgba};
use crate::block::{check_tiled, tiled_positions};
use crate::color;
use crate::error::{Error, Result};
use crate::{dimension, eof, truncated};

/// Color format of palette entries (and of the Rgb565/Rgb5a3 texel formats).
///
/// Every GVR color word is 16 bits, big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GvrPixelFormat {
    /// 8-bit alpha and 8-bit intensity
    IntensityA8,
    Rgb565,
    Rgb5a3,
}

impl GvrPixelFormat {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(GvrPixelFormat::IntensityA8),
            0x01 => Ok(GvrPixelFormat::Rgb565),
            0x02 => Ok(GvrPixelFormat::Rgb5a3),
            other => Err(Error::UnsupportedPixelFormat(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            GvrPixelFormat::IntensityA8 => 0x00,
            GvrPixelFormat::Rgb565 => 0x01,
            GvrPixelFormat::Rgb5a3 => 0x02,
        }
    }

    pub fn bits_per_pixel(self) -> usize {
        16
    }

    pub fn decode_pixel(self, source: &[u8], index: usize) -> Rgba {
        let word = BigEndian::read_u16(&source[index * 2..]);
        match self {
            GvrPixelFormat::IntensityA8 => {
                let intensity = word as u8;
                [intensity, intensity, intensity, (word >> 8) as u8]
            }
            GvrPixelFormat::Rgb565 => color::decode_rgb565(word),
            GvrPixelFormat::Rgb5a3 => color::decode_rgb5a3(word),
        }
    }

    pub fn encode_pixel(self, pixel: Rgba, dest: &mut Vec<u8>) {
        let word = match self {
            GvrPixelFormat::IntensityA8 => {
                (pixel[3] as u16) << 8 | color::luminance(pixel) as u16
            }
            GvrPixelFormat::Rgb565 => color::encode_rgb565(pixel),
            GvrPixelFormat::Rgb5a3 => color::encode_rgb5a3(pixel),
        };
        dest.extend(word.to_be_bytes());
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

/// Flag nibble of the GVRT header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GvrDataFlags(u8);

impl GvrDataFlags {
    pub const MIPMAPS: u8 = 0x1;
    pub const EXTERNAL_PALETTE: u8 = 0x2;
    pub const INTERNAL_PALETTE: u8 = 0x8;

    pub fn from_bits(bits: u8) -> Self {
        GvrDataFlags(bits & 0xF)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn has_mipmaps(self) -> bool {
        self.0 & Self::MIPMAPS != 0
    }

    pub fn has_external_palette(self) -> bool {
        self.0 & Self::EXTERNAL_PALETTE != 0
    }

    pub fn has_internal_palette(self) -> bool {
        self.0 & Self::INTERNAL_PALETTE != 0
    }
}

/// On-disk arrangement of the pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GvrDataFormat {
    Rgb565,
    Rgb5a3,
    Argb8888,
    Index4,
    Index8,
}

impl GvrDataFormat {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x04 => Ok(GvrDataFormat::Rgb565),
            0x05 => Ok(GvrDataFormat::Rgb5a3),
            0x06 => Ok(GvrDataFormat::Argb8888),
            0x08 => Ok(GvrDataFormat::Index4),
            0x09 => Ok(GvrDataFormat::Index8),
            other => Err(Error::UnsupportedDataFormat(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            GvrDataFormat::Rgb565 => 0x04,
            GvrDataFormat::Rgb5a3 => 0x05,
            GvrDataFormat::Argb8888 => 0x06,
            GvrDataFormat::Index4 => 0x08,
            GvrDataFormat::Index8 => 0x09,
        }
    }

    /// Bits per pixel as stored.
    pub fn bits_per_pixel(self) -> usize {
        match self {
            GvrDataFormat::Argb8888 => 32,
            GvrDataFormat::Index4 => 4,
            GvrDataFormat::Index8 => 8,
            _ => 16,
        }
    }

    pub fn palette_entries(self) -> usize {
        match self {
            GvrDataFormat::Index4 => 16,
            GvrDataFormat::Index8 => 256,
            _ => 0,
        }
    }

    /// Block dimensions of the tiled layout.
    pub fn tile(self) -> (u32, u32) {
        match self {
            GvrDataFormat::Index4 => (8, 8),
            GvrDataFormat::Index8 => (8, 4),
            _ => (4, 4),
        }
    }

    pub fn data_length(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bits_per_pixel() / 8
    }

    /// Decode stored bytes to a bitmap. Indexed formats need the resolved
    /// palette; truecolor formats ignore it.
    pub fn decode(
        self,
        source: &[u8],
        width: u32,
        height: u32,
        palette: Option<&[Rgba]>,
    ) -> Result<Bitmap> {
        let (tile_w, tile_h) = self.tile();
        check_tiled(width, height, tile_w, tile_h, false)?;
        if source.len() < self.data_length(width, height) {
            return Err(Error::Truncated);
        }

        let mut bitmap = Bitmap::new(width, height);
        match self {
            GvrDataFormat::Rgb565 | GvrDataFormat::Rgb5a3 => {
                let word = if self == GvrDataFormat::Rgb565 {
                    GvrPixelFormat::Rgb565
                } else {
                    GvrPixelFormat::Rgb5a3
                };
                for (stored, (x, y)) in tiled_positions(width, height, tile_w, tile_h).enumerate()
                {
                    bitmap.set_pixel(x, y, word.decode_pixel(source, stored));
                }
            }
            GvrDataFormat::Argb8888 => {
                for (stored, (x, y)) in tiled_positions(width, height, tile_w, tile_h).enumerate()
                {
                    let at = stored * 4;
                    let [a, r, g, b] = [
                        source[at],
                        source[at + 1],
                        source[at + 2],
                        source[at + 3],
                    ];
                    bitmap.set_pixel(x, y, [r, g, b, a]);
                }
            }
            GvrDataFormat::Index4 | GvrDataFormat::Index8 => {
                let palette = palette.ok_or(Error::NeedsExternalPalette)?;
                for (stored, (x, y)) in tiled_positions(width, height, tile_w, tile_h).enumerate()
                {
                    let index = if self == GvrDataFormat::Index4 {
                        // High nibble first.
                        let byte = source[stored / 2];
                        if stored % 2 == 0 {
                            byte >> 4
                        } else {
                            byte & 0xF
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
        pixel_format: Option<GvrPixelFormat>,
    ) -> Result<(Vec<u8>, Option<Vec<Rgba>>)> {
        let (width, height) = (bitmap.width(), bitmap.height());
        let (tile_w, tile_h) = self.tile();
        check_tiled(width, height, tile_w, tile_h, false)?;

        let mut data = Vec::with_capacity(self.data_length(width, height));
        match self {
            GvrDataFormat::Rgb565 | GvrDataFormat::Rgb5a3 => {
                let word = if self == GvrDataFormat::Rgb565 {
                    GvrPixelFormat::Rgb565
                } else {
                    GvrPixelFormat::Rgb5a3
                };
                for (x, y) in tiled_positions(width, height, tile_w, tile_h) {
                    word.encode_pixel(bitmap.pixel(x, y), &mut data);
                }
                Ok((data, None))
            }
            GvrDataFormat::Argb8888 => {
                for (x, y) in tiled_positions(width, height, tile_w, tile_h) {
                    let [r, g, b, a] = bitmap.pixel(x, y);
                    data.extend([a, r, g, b]);
                }
                Ok((data, None))
            }
            GvrDataFormat::Index4 | GvrDataFormat::Index8 => {
                let pixel_format = pixel_format.ok_or_else(|| {
                    Error::InvalidArgument(
                        "indexed data formats need a palette pixel format".into(),
                    )
                })?;

                let capacity = self.palette_entries();
                let (indices, mut palette) = index_colors(bitmap, capacity)?;
                palette.resize(capacity, [0, 0, 0, 0]);

                if self == GvrDataFormat::Index4 {
                    let mut pending = 0u8;
                    for (stored, (x, y)) in
                        tiled_positions(width, height, tile_w, tile_h).enumerate()
                    {
                        let index = indices[(y * width + x) as usize];
                        if stored % 2 == 0 {
                            pending = index << 4;
                        } else {
                            data.push(pending | index);
                        }
                    }
                } else {
                    for (x, y) in tiled_positions(width, height, tile_w, tile_h) {
                        data.push(indices[(y * width + x) as usize]);
                    }
                }

                // Reduce the palette through its own codec so a decode of
                // what we wrote reproduces the input bitmap exactly when the
                // input already fit the reduced gamut.
                let palette = pixel_format.decode_palette(
                    &pixel_format.encode_palette(&palette),
                    capacity,
                )?;
                Ok((data, Some(palette)))
            }
        }
    }
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
struct GcixChunk {
    magic: [u8; 4],
    length: u32,
    #[brw(big)]
    global_index: u32,
    reserved: u32,
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little, magic = b"GVRT")]
struct GvrtHeader {
    length: u32,
    reserved: u16,
    /// Palette pixel format in the high nibble, data flags in the low.
    format: u8,
    data_format: u8,
    #[brw(big)]
    width: u16,
    #[brw(big)]
    height: u16,
}

/// Signature probe over the first bytes of a stream (32 are enough).
pub fn is_gvr(lead: &[u8]) -> bool {
    let global = lead.len() >= 4 && (&lead[..4] == b"GCIX" || &lead[..4] == b"GBIX");
    if global {
        lead.len() >= 20 && &lead[16..20] == b"GVRT"
    } else {
        lead.len() >= 4 && &lead[..4] == b"GVRT"
    }
}

/// GVR texture reader
///
/// Parses the chunk headers up front; [`GvrTexture::decode`] produces the
/// bitmap. Indexed textures flagged for an external palette refuse to decode
/// until [`GvrTexture::set_palette`] has consumed a `.gvp` companion stream.
pub struct GvrTexture<R> {
    reader: R,
    base: u64,
    global_index: Option<u32>,
    width: u16,
    height: u16,
    pixel_format: Option<GvrPixelFormat>,
    data_format: GvrDataFormat,
    flags: GvrDataFlags,
    palette: Option<Vec<Rgba>>,
    data_offset: u64,
}

impl<R: Read + Seek> GvrTexture<R> {
    /// Parse the texture headers at the reader's current position.
    #[instrument(skip(reader), err)]
    pub fn new(mut reader: R) -> Result<GvrTexture<R>> {
        let base = reader.stream_position()?;
        let lead = sega_io::peek(&mut reader, 32)?;
        if !is_gvr(&lead) {
            return Err(Error::BadMagic);
        }

        reader.seek(SeekFrom::Start(base))?;
        let global_index = if &lead[..4] != b"GVRT" {
            Some(GcixChunk::read(&mut reader).map_err(truncated)?.global_index)
        } else {
            None
        };

        let header = GvrtHeader::read(&mut reader).map_err(truncated)?;
        let data_format = GvrDataFormat::from_code(header.data_format)?;
        let flags = GvrDataFlags::from_bits(header.format & 0xF);
        let pixel_format = if data_format.palette_entries() > 0 {
            Some(GvrPixelFormat::from_code(header.format >> 4)?)
        } else {
            None
        };

        let palette = match pixel_format {
            Some(pixel) if flags.has_internal_palette() => {
                let count = data_format.palette_entries();
                let mut bytes = vec![0u8; count * pixel.bits_per_pixel() / 8];
                reader.read_exact(&mut bytes).map_err(eof)?;
                Some(pixel.decode_palette(&bytes, count)?)
            }
            _ => None,
        };

        let data_offset = reader.stream_position()? - base;
        Ok(GvrTexture {
            reader,
            base,
            global_index,
            width: header.width,
            height: header.height,
            pixel_format,
            data_format,
            flags,
            palette,
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

    pub fn pixel_format(&self) -> Option<GvrPixelFormat> {
        self.pixel_format
    }

    pub fn data_format(&self) -> GvrDataFormat {
        self.data_format
    }

    pub fn flags(&self) -> GvrDataFlags {
        self.flags
    }

    /// Whether decoding currently requires [`GvrTexture::set_palette`].
    pub fn needs_external_palette(&self) -> bool {
        self.data_format.palette_entries() > 0 && self.palette.is_none()
    }

    /// Consume a `.gvp` palette stream for this texture.
    ///
    /// The stream is read once and released; the decoded entries stay with
    /// the texture.
    #[instrument(skip_all, err)]
    pub fn set_palette<P: Read + ?Sized>(&mut self, source: &mut P) -> Result<()> {
        let pixel = self.pixel_format.ok_or_else(|| {
            Error::InvalidArgument("texture's data format carries no palette".into())
        })?;

        let file = GvpPalette::new(source)?;
        self.palette = Some(file.decode(pixel)?);
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

        self.data_format
            .decode(&data, self.width(), self.height(), palette)
    }

    /// Unwrap and return the inner reader object
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// A standalone `.gvp` palette file: a big-endian entry count followed by
/// the encoded entries.
///
/// The file does not record its pixel format; decoding borrows the format of
/// the texture the palette belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GvpPalette {
    count: u16,
    raw: Vec<u8>,
}

impl GvpPalette {
    /// Read a palette file from a stream.
    pub fn new<R: Read + ?Sized>(source: &mut R) -> Result<Self> {
        let mut header = [0u8; 2];
        source.read_exact(&mut header).map_err(eof)?;

        let mut raw = Vec::new();
        source.read_to_end(&mut raw)?;
        Ok(GvpPalette {
            count: u16::from_be_bytes(header),
            raw,
        })
    }

    pub fn from_entries(pixel: GvrPixelFormat, entries: &[Rgba]) -> Self {
        GvpPalette {
            count: entries.len() as u16,
            raw: pixel.encode_palette(entries),
        }
    }

    pub fn count(&self) -> usize {
        self.count as usize
    }

    pub fn decode(&self, pixel: GvrPixelFormat) -> Result<Vec<Rgba>> {
        pixel.decode_palette(&self.raw, self.count as usize)
    }

    pub fn write<W: Write + ?Sized>(&self, dest: &mut W) -> Result<()> {
        dest.write_all(&self.count.to_be_bytes())?;
        dest.write_all(&self.raw)?;
        Ok(())
    }
}

/// Options for how the GVR file should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct GvrWriterOptions {
    pub data_format: GvrDataFormat,

    /// Palette color format; required for the indexed data formats
    pub pixel_format: Option<GvrPixelFormat>,

    /// Emit a GCIX chunk carrying this index
    pub global_index: Option<u32>,

    /// Keep the palette in a companion `.gvp` file instead of the chunk
    #[builder(default)]
    pub external_palette: bool,
}

/// GVR texture generator
pub struct GvrWriter<W: Write + Seek> {
    inner: W,
    options: GvrWriterOptions,
    written: bool,
}

impl<W: Write + Seek> GvrWriter<W> {
    pub fn new(inner: W, options: GvrWriterOptions) -> GvrWriter<W> {
        GvrWriter {
            inner,
            options,
            written: false,
        }
    }

    /// Encode and write one texture; returns the companion palette file when
    /// the options keep the palette external.
    #[instrument(skip_all, err)]
    pub fn write(&mut self, bitmap: &Bitmap) -> Result<Option<GvpPalette>> {
        let width = dimension(bitmap.width())?;
        let height = dimension(bitmap.height())?;
        let data_format = self.options.data_format;

        let (data, palette) = data_format.encode(bitmap, self.options.pixel_format)?;

        let mut flags = 0u8;
        let mut palette_bytes = Vec::new();
        let mut companion = None;
        if let (Some(entries), Some(pixel)) = (palette, self.options.pixel_format) {
            if self.options.external_palette {
                flags |= GvrDataFlags::EXTERNAL_PALETTE;
                companion = Some(GvpPalette::from_entries(pixel, &entries));
            } else {
                flags |= GvrDataFlags::INTERNAL_PALETTE;
                palette_bytes = pixel.encode_palette(&entries);
            }
        }

        if let Some(global_index) = self.options.global_index {
            GcixChunk {
                magic: *b"GCIX",
                length: 8,
                global_index,
                reserved: 0,
            }
            .write(&mut self.inner)?;
        }

        let pixel_nibble = self.options.pixel_format.map_or(0, GvrPixelFormat::code);
        GvrtHeader {
            length: (8 + palette_bytes.len() + data.len()) as u32,
            reserved: 0,
            format: pixel_nibble << 4 | flags,
            data_format: data_format.code(),
            width,
            height,
        }
        .write(&mut self.inner)?;

        self.inner.write_all(&palette_bytes)?;
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

    fn gradient(width: u32, height: u32) -> Bitmap {
        // Channel values are fixed points of the 5-bit reduction, so the
        // same bitmap survives every 16-bit format exactly.
        let mut bitmap = Bitmap::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let r = crate::color::expand((x % 32) as u16, 5);
                let b = crate::color::expand((y % 32) as u16, 5);
                bitmap.set_pixel(x, y, [r, 0, b, 255]);
            }
        }
        bitmap
    }

    #[test]
    fn rgb565_solid_red_layout() {
        let mut bitmap = Bitmap::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                bitmap.set_pixel(x, y, [255, 0, 0, 255]);
            }
        }

        let mut writer = GvrWriter::new(
            Cursor::new(Vec::new()),
            GvrWriterOptions::builder()
                .data_format(GvrDataFormat::Rgb565)
                .build(),
        );
        writer.write(&bitmap).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        // 16-byte header then 16 big-endian 0xF800 words.
        assert_eq!(bytes.len(), 16 + 32);
        assert_eq!(&bytes[..4], b"GVRT");
        assert_eq!(&bytes[4..8], &40u32.to_le_bytes());
        assert_eq!(bytes[11], 0x04);
        assert_eq!(&bytes[12..14], &[0x00, 0x04]);
        assert_eq!(&bytes[14..16], &[0x00, 0x04]);
        assert_eq!(&bytes[16..18], &[0xF8, 0x00]);

        let mut texture = GvrTexture::new(Cursor::new(bytes)).unwrap();
        assert_eq!(texture.decode().unwrap(), bitmap);
    }

    #[test]
    fn truecolor_roundtrip_all_formats() {
        let bitmap = gradient(16, 8);
        for data_format in [
            GvrDataFormat::Rgb565,
            GvrDataFormat::Rgb5a3,
            GvrDataFormat::Argb8888,
        ] {
            let mut writer = GvrWriter::new(
                Cursor::new(Vec::new()),
                GvrWriterOptions::builder()
                    .data_format(data_format)
                    .global_index(42)
                    .build(),
            );
            writer.write(&bitmap).unwrap();
            let bytes = writer.finish().unwrap().into_inner();

            let mut texture = GvrTexture::new(Cursor::new(bytes)).unwrap();
            assert_eq!(texture.global_index(), Some(42));
            assert_eq!(texture.data_format(), data_format);
            assert_eq!(texture.decode().unwrap(), bitmap, "{data_format:?}");
        }
    }

    #[test]
    fn gcix_global_index_is_big_endian() {
        let mut writer = GvrWriter::new(
            Cursor::new(Vec::new()),
            GvrWriterOptions::builder()
                .data_format(GvrDataFormat::Rgb565)
                .global_index(0x0102_0304)
                .build(),
        );
        writer.write(&gradient(4, 4)).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert_eq!(&bytes[..4], b"GCIX");
        assert_eq!(&bytes[8..12], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[16..20], b"GVRT");
    }

    #[test]
    fn internal_palette_roundtrip() {
        let mut bitmap = Bitmap::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                // Two colors that survive Rgb5a3 reduction.
                let color = if (x + y) % 2 == 0 {
                    [255, 255, 255, 255]
                } else {
                    [0, 0, 0, 255]
                };
                bitmap.set_pixel(x, y, color);
            }
        }

        let mut writer = GvrWriter::new(
            Cursor::new(Vec::new()),
            GvrWriterOptions::builder()
                .data_format(GvrDataFormat::Index4)
                .pixel_format(GvrPixelFormat::Rgb5a3)
                .build(),
        );
        let companion = writer.write(&bitmap).unwrap();
        assert!(companion.is_none());
        let bytes = writer.finish().unwrap().into_inner();

        // Header, then a full 16-entry palette, then 4bpp indices.
        assert_eq!(bytes.len(), 16 + 32 + 32);
        assert_eq!(bytes[10] & 0xF, GvrDataFlags::INTERNAL_PALETTE);
        assert_eq!(bytes[10] >> 4, GvrPixelFormat::Rgb5a3.code());

        let mut texture = GvrTexture::new(Cursor::new(bytes)).unwrap();
        assert!(!texture.needs_external_palette());
        assert_eq!(texture.decode().unwrap(), bitmap);
    }

    #[test]
    fn external_palette_recovery() {
        let mut bitmap = Bitmap::new(8, 4);
        for y in 0..4 {
            for x in 0..8 {
                bitmap.set_pixel(x, y, [crate::color::expand((x * 4) as u16, 5), 0, 0, 255]);
            }
        }

        let mut writer = GvrWriter::new(
            Cursor::new(Vec::new()),
            GvrWriterOptions::builder()
                .data_format(GvrDataFormat::Index8)
                .pixel_format(GvrPixelFormat::Rgb565)
                .external_palette(true)
                .build(),
        );
        let companion = writer.write(&bitmap).unwrap().unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut texture = GvrTexture::new(Cursor::new(bytes)).unwrap();
        assert!(texture.needs_external_palette());
        assert!(matches!(texture.decode(), Err(Error::NeedsExternalPalette)));

        let mut palette_stream = Cursor::new(Vec::new());
        companion.write(&mut palette_stream).unwrap();
        texture
            .set_palette(&mut Cursor::new(palette_stream.into_inner()))
            .unwrap();

        assert!(!texture.needs_external_palette());
        assert_eq!(texture.decode().unwrap(), bitmap);
    }

    #[test]
    fn indexed_without_pixel_format_is_rejected() {
        let mut writer = GvrWriter::new(
            Cursor::new(Vec::new()),
            GvrWriterOptions::builder()
                .data_format(GvrDataFormat::Index8)
                .build(),
        );
        assert!(matches!(
            writer.write(&gradient(8, 4)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn finish_before_write_is_rejected() {
        let writer = GvrWriter::new(
            Cursor::new(Vec::new()),
            GvrWriterOptions::builder()
                .data_format(GvrDataFormat::Rgb565)
                .build(),
        );
        assert!(matches!(writer.finish(), Err(Error::NotInitialized)));
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert!(matches!(
            GvrDataFormat::from_code(0x0E),
            Err(Error::UnsupportedDataFormat(0x0E))
        ));
        assert!(matches!(
            GvrPixelFormat::from_code(0x07),
            Err(Error::UnsupportedPixelFormat(0x07))
        ));
    }
}
