//! PlayStation 2 texture family: SVR containers and the SVP palette
//! companion.
//!
//! SVR files reuse the little-endian "PVRT" data chunk behind an optional
//! "GBIX" chunk; they are told apart from Dreamcast textures by their format
//! code ranges (pixel formats from 0x08, data formats from 0x60). Indexed
//! textures either embed their palette after the header or defer to an
//! external `.svp` file.

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

/// Side of the square block used by the square data formats.
const TILE: u32 = 8;

/// Color format of direct pixels and palette entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvrPixelFormat {
    /// 16-bit word, RGB555 or A3-RGB444 selected by the top bit
    Rgb5a3,
    /// 32-bit r, g, b, a bytes
    Argb8,
}

impl SvrPixelFormat {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x08 => Ok(SvrPixelFormat::Rgb5a3),
            0x09 => Ok(SvrPixelFormat::Argb8),
            other => Err(Error::UnsupportedPixelFormat(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SvrPixelFormat::Rgb5a3 => 0x08,
            SvrPixelFormat::Argb8 => 0x09,
        }
    }

    pub fn bits_per_pixel(self) -> usize {
        match self {
            SvrPixelFormat::Rgb5a3 => 16,
            SvrPixelFormat::Argb8 => 32,
        }
    }

    pub fn decode_pixel(self, source: &[u8], index: usize) -> Rgba {
        match self {
            SvrPixelFormat::Rgb5a3 => {
                color::decode_rgb5a3(LittleEndian::read_u16(&source[index * 2..]))
            }
            SvrPixelFormat::Argb8 => {
                let at = index * 4;
                [source[at], source[at + 1], source[at + 2], source[at + 3]]
            }
        }
    }

    pub fn encode_pixel(self, pixel: Rgba, dest: &mut Vec<u8>) {
        match self {
            SvrPixelFormat::Rgb5a3 => {
                dest.extend(color::encode_rgb5a3(pixel).to_le_bytes());
            }
            SvrPixelFormat::Argb8 => dest.extend(pixel),
        }
    }

    pub fn decode_palette(self, source: &[u8], count: usize) -> Result<Vec<Rgba>> {
        if source.len() < count * self.bits_per_pixel() / 8 {
            return Err(Error::Truncated);
        }
        Ok((0..count).map(|i| self.decode_pixel(source, i)).collect())
    }

    pub fn encode_palette(self, palette: &[Rgba]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(palette.len() * self.bits_per_pixel() / 8);
        for &entry in palette {
            self.encode_pixel(entry, &mut bytes);
        }
        bytes
    }
}

/// On-disk arrangement of the pixel data.
///
/// The indexed variants spell out palette width, layout and palette pixel
/// format; the `ExtClut` pair leaves the palette in a companion `.svp` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvrDataFormat {
    Rectangle,
    Index4ExtClut,
    Index8ExtClut,
    Index4Rgb5a3Rect,
    Index4Rgb5a3Square,
    Index4Argb8Rect,
    Index4Argb8Square,
    Index8Rgb5a3Rect,
    Index8Rgb5a3Square,
    Index8Argb8Rect,
    Index8Argb8Square,
}

impl SvrDataFormat {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x60 => Ok(SvrDataFormat::Rectangle),
            0x62 => Ok(SvrDataFormat::Index4ExtClut),
            0x64 => Ok(SvrDataFormat::Index8ExtClut),
            0x66 => Ok(SvrDataFormat::Index4Rgb5a3Rect),
            0x67 => Ok(SvrDataFormat::Index4Rgb5a3Square),
            0x68 => Ok(SvrDataFormat::Index4Argb8Rect),
            0x69 => Ok(SvrDataFormat::Index4Argb8Square),
            0x6A => Ok(SvrDataFormat::Index8Rgb5a3Rect),
            0x6B => Ok(SvrDataFormat::Index8Rgb5a3Square),
            0x6C => Ok(SvrDataFormat::Index8Argb8Rect),
            0x6D => Ok(SvrDataFormat::Index8Argb8Square),
            other => Err(Error::UnsupportedDataFormat(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SvrDataFormat::Rectangle => 0x60,
            SvrDataFormat::Index4ExtClut => 0x62,
            SvrDataFormat::Index8ExtClut => 0x64,
            SvrDataFormat::Index4Rgb5a3Rect => 0x66,
            SvrDataFormat::Index4Rgb5a3Square => 0x67,
            SvrDataFormat::Index4Argb8Rect => 0x68,
            SvrDataFormat::Index4Argb8Square => 0x69,
            SvrDataFormat::Index8Rgb5a3Rect => 0x6A,
            SvrDataFormat::Index8Rgb5a3Square => 0x6B,
            SvrDataFormat::Index8Argb8Rect => 0x6C,
            SvrDataFormat::Index8Argb8Square => 0x6D,
        }
    }

    /// Palette width: 0 for truecolor, 4 or 8 bits of index otherwise.
    pub fn index_bits(self) -> usize {
        use SvrDataFormat::*;
        match self {
            Rectangle => 0,
            Index4ExtClut | Index4Rgb5a3Rect | Index4Rgb5a3Square | Index4Argb8Rect
            | Index4Argb8Square => 4,
            _ => 8,
        }
    }

    pub fn palette_entries(self) -> usize {
        match self.index_bits() {
            4 => 16,
            8 => 256,
            _ => 0,
        }
    }

    /// Whether the palette lives in a companion `.svp` file.
    pub fn needs_external_palette(self) -> bool {
        matches!(
            self,
            SvrDataFormat::Index4ExtClut | SvrDataFormat::Index8ExtClut
        )
    }

    /// Whether pixels are stored in square blocks rather than rows.
    pub fn is_square(self) -> bool {
        use SvrDataFormat::*;
        matches!(
            self,
            Index4Rgb5a3Square | Index4Argb8Square | Index8Rgb5a3Square | Index8Argb8Square
        )
    }

    pub fn bits_per_pixel(self, pixel_format: SvrPixelFormat) -> usize {
        match self.index_bits() {
            0 => pixel_format.bits_per_pixel(),
            bits => bits,
        }
    }

    pub fn data_length(self, width: u32, height: u32, pixel_format: SvrPixelFormat) -> usize {
        width as usize * height as usize * self.bits_per_pixel(pixel_format) / 8
    }

    /// The format actually written to disk for a requested one: indexed
    /// formats with an embedded palette are renormalized to the variant
    /// matching the palette pixel format and the image shape.
    pub fn refine(self, pixel_format: SvrPixelFormat, width: u32, height: u32) -> SvrDataFormat {
        use SvrDataFormat::*;
        if self.index_bits() == 0 || self.needs_external_palette() {
            return self;
        }

        let square = width == height;
        match (self.index_bits(), pixel_format, square) {
            (4, SvrPixelFormat::Rgb5a3, false) => Index4Rgb5a3Rect,
            (4, SvrPixelFormat::Rgb5a3, true) => Index4Rgb5a3Square,
            (4, SvrPixelFormat::Argb8, false) => Index4Argb8Rect,
            (4, SvrPixelFormat::Argb8, true) => Index4Argb8Square,
            (_, SvrPixelFormat::Rgb5a3, false) => Index8Rgb5a3Rect,
            (_, SvrPixelFormat::Rgb5a3, true) => Index8Rgb5a3Square,
            (_, SvrPixelFormat::Argb8, false) => Index8Argb8Rect,
            (_, SvrPixelFormat::Argb8, true) => Index8Argb8Square,
        }
    }

    fn check(self, width: u32, height: u32) -> Result<()> {
        if self.is_square() {
            check_tiled(width, height, TILE, TILE, true)
        } else if self.index_bits() == 4 {
            // Row-major nibble packing needs an even number of pixels per row.
            if width % 2 != 0 {
                return Err(Error::InvalidArgument(format!(
                    "width {width} is not even"
                )));
            }
            check_tiled(width, height, 1, 1, false)
        } else {
            check_tiled(width, height, 1, 1, false)
        }
    }

    fn positions(self, width: u32, height: u32) -> Box<dyn Iterator<Item = (u32, u32)>> {
        if self.is_square() {
            Box::new(tiled_positions(width, height, TILE, TILE))
        } else {
            Box::new(linear_positions(width, height))
        }
    }

    /// Decode stored bytes to a bitmap.
    pub fn decode(
        self,
        source: &[u8],
        width: u32,
        height: u32,
        pixel_format: SvrPixelFormat,
        palette: Option<&[Rgba]>,
    ) -> Result<Bitmap> {
        self.check(width, height)?;
        if source.len() < self.data_length(width, height, pixel_format) {
            return Err(Error::Truncated);
        }

        let mut bitmap = Bitmap::new(width, height);
        match self.index_bits() {
            0 => {
                for (stored, (x, y)) in linear_positions(width, height).enumerate() {
                    bitmap.set_pixel(x, y, pixel_format.decode_pixel(source, stored));
                }
            }
            bits => {
                let palette = palette.ok_or(Error::NeedsExternalPalette)?;
                for (stored, (x, y)) in self.positions(width, height).enumerate() {
                    let index = if bits == 4 {
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
        pixel_format: SvrPixelFormat,
    ) -> Result<(Vec<u8>, Option<Vec<Rgba>>)> {
        let (width, height) = (bitmap.width(), bitmap.height());
        self.check(width, height)?;

        let mut data = Vec::with_capacity(self.data_length(width, height, pixel_format));
        match self.index_bits() {
            0 => {
                for (x, y) in linear_positions(width, height) {
                    pixel_format.encode_pixel(bitmap.pixel(x, y), &mut data);
                }
                Ok((data, None))
            }
            bits => {
                let capacity = self.palette_entries();
                let (indices, mut palette) = index_colors(bitmap, capacity)?;
                palette.resize(capacity, [0, 0, 0, 0]);

                if bits == 4 {
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
pub fn is_svr(lead: &[u8]) -> bool {
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

    // SVR format code ranges; anything below belongs to the Dreamcast family.
    header.len() >= 10 && (0x08..=0x09).contains(&header[8]) && header[9] >= 0x60
}

/// SVR texture reader
///
/// Parses the chunk headers up front; [`SvrTexture::decode`] produces the
/// bitmap. The external-palette data formats refuse to decode until
/// [`SvrTexture::set_palette`] has consumed a `.svp` companion stream.
pub struct SvrTexture<R> {
    reader: R,
    base: u64,
    global_index: Option<u32>,
    width: u16,
    height: u16,
    pixel_format: SvrPixelFormat,
    data_format: SvrDataFormat,
    palette: Option<Vec<Rgba>>,
    data_offset: u64,
}

impl<R: Read + Seek> SvrTexture<R> {
    /// Parse the texture headers at the reader's current position.
    #[instrument(skip(reader), err)]
    pub fn new(mut reader: R) -> Result<SvrTexture<R>> {
        let base = reader.stream_position()?;
        let lead = sega_io::peek(&mut reader, 32)?;
        if !is_svr(&lead) {
            return Err(Error::BadMagic);
        }

        reader.seek(SeekFrom::Start(base))?;
        let global_index = if &lead[..4] == b"GBIX" {
            Some(GbixChunk::read(&mut reader).map_err(truncated)?.global_index)
        } else {
            None
        };

        let header = PvrtHeader::read(&mut reader).map_err(truncated)?;
        let pixel_format = SvrPixelFormat::from_code(header.pixel_format)?;
        let data_format = SvrDataFormat::from_code(header.data_format)?;

        let palette = if data_format.palette_entries() > 0 && !data_format.needs_external_palette()
        {
            let count = data_format.palette_entries();
            let mut bytes = vec![0u8; count * pixel_format.bits_per_pixel() / 8];
            reader.read_exact(&mut bytes).map_err(eof)?;
            Some(pixel_format.decode_palette(&bytes, count)?)
        } else {
            None
        };

        let data_offset = reader.stream_position()? - base;
        Ok(SvrTexture {
            reader,
            base,
            global_index,
            width: header.width,
            height: header.height,
            pixel_format,
            data_format,
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

    pub fn pixel_format(&self) -> SvrPixelFormat {
        self.pixel_format
    }

    pub fn data_format(&self) -> SvrDataFormat {
        self.data_format
    }

    /// Whether decoding currently requires [`SvrTexture::set_palette`].
    pub fn needs_external_palette(&self) -> bool {
        self.data_format.palette_entries() > 0 && self.palette.is_none()
    }

    /// Consume a `.svp` palette stream for this texture.
    #[instrument(skip_all, err)]
    pub fn set_palette<P: Read + ?Sized>(&mut self, source: &mut P) -> Result<()> {
        if self.data_format.palette_entries() == 0 {
            return Err(Error::InvalidArgument(
                "texture's data format carries no palette".into(),
            ));
        }

        let file = SvpPalette::new(source)?;
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

        let length = self
            .data_format
            .data_length(self.width(), self.height(), self.pixel_format);
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

/// A standalone `.svp` palette file: a little-endian entry count followed by
/// the encoded entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvpPalette {
    count: u16,
    raw: Vec<u8>,
}

impl SvpPalette {
    /// Read a palette file from a stream.
    pub fn new<R: Read + ?Sized>(source: &mut R) -> Result<Self> {
        let mut header = [0u8; 2];
        source.read_exact(&mut header).map_err(eof)?;

        let mut raw = Vec::new();
        source.read_to_end(&mut raw)?;
        Ok(SvpPalette {
            count: u16::from_le_bytes(header),
            raw,
        })
    }

    pub fn from_entries(pixel: SvrPixelFormat, entries: &[Rgba]) -> Self {
        SvpPalette {
            count: entries.len() as u16,
            raw: pixel.encode_palette(entries),
        }
    }

    pub fn count(&self) -> usize {
        self.count as usize
    }

    pub fn decode(&self, pixel: SvrPixelFormat) -> Result<Vec<Rgba>> {
        pixel.decode_palette(&self.raw, self.count as usize)
    }

    pub fn write<W: Write + ?Sized>(&self, dest: &mut W) -> Result<()> {
        dest.write_all(&self.count.to_le_bytes())?;
        dest.write_all(&self.raw)?;
        Ok(())
    }
}

/// Options for how the SVR file should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct SvrWriterOptions {
    pub pixel_format: SvrPixelFormat,

    /// Requested data format; the variant actually written is refined by
    /// [`SvrDataFormat::refine`]
    pub data_format: SvrDataFormat,

    /// Emit a GBIX chunk carrying this index
    pub global_index: Option<u32>,
}

/// SVR texture generator
pub struct SvrWriter<W: Write + Seek> {
    inner: W,
    options: SvrWriterOptions,
    written: bool,
}

impl<W: Write + Seek> SvrWriter<W> {
    pub fn new(inner: W, options: SvrWriterOptions) -> SvrWriter<W> {
        SvrWriter {
            inner,
            options,
            written: false,
        }
    }

    /// Encode and write one texture; returns the companion palette file for
    /// the external-palette data formats.
    #[instrument(skip_all, err)]
    pub fn write(&mut self, bitmap: &Bitmap) -> Result<Option<SvpPalette>> {
        let width = dimension(bitmap.width())?;
        let height = dimension(bitmap.height())?;
        let pixel_format = self.options.pixel_format;
        let data_format =
            self.options
                .data_format
                .refine(pixel_format, bitmap.width(), bitmap.height());

        let (data, palette) = data_format.encode(bitmap, pixel_format)?;

        let mut palette_bytes = Vec::new();
        let mut companion = None;
        if let Some(entries) = palette {
            if data_format.needs_external_palette() {
                companion = Some(SvpPalette::from_entries(pixel_format, &entries));
            } else {
                palette_bytes = pixel_format.encode_palette(&entries);
            }
        }

        if let Some(global_index) = self.options.global_index {
            GbixChunk::new(*b"GBIX", global_index).write(&mut self.inner)?;
        }

        PvrtHeader {
            length: (8 + palette_bytes.len() + data.len()) as u32,
            pixel_format: pixel_format.code(),
            data_format: data_format.code(),
            reserved: 0,
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

    fn four_color_bitmap(width: u32, height: u32) -> Bitmap {
        let colors = [
            [255, 255, 255, 255],
            [0, 0, 0, 255],
            [255, 0, 0, 255],
            [0, 0, 255, 255],
        ];
        let mut bitmap = Bitmap::new(width, height);
        for y in 0..height {
            for x in 0..width {
                bitmap.set_pixel(x, y, colors[((x + y) % 4) as usize]);
            }
        }
        bitmap
    }

    #[test]
    fn rectangle_argb8_roundtrip_is_exact() {
        let mut bitmap = Bitmap::new(6, 3);
        for y in 0..3 {
            for x in 0..6 {
                bitmap.set_pixel(x, y, [x as u8 * 40, y as u8 * 80, 7, 13]);
            }
        }

        let mut writer = SvrWriter::new(
            Cursor::new(Vec::new()),
            SvrWriterOptions::builder()
                .pixel_format(SvrPixelFormat::Argb8)
                .data_format(SvrDataFormat::Rectangle)
                .global_index(7)
                .build(),
        );
        writer.write(&bitmap).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        // GBIX chunk, PVRT header, then 32bpp pixels.
        assert_eq!(bytes.len(), 16 + 16 + 6 * 3 * 4);
        assert_eq!(&bytes[..4], b"GBIX");
        assert_eq!(&bytes[16..20], b"PVRT");
        assert_eq!(bytes[24], 0x09);
        assert_eq!(bytes[25], 0x60);
        // Little-endian dimensions.
        assert_eq!(&bytes[28..30], &[0x06, 0x00]);
        assert_eq!(&bytes[30..32], &[0x03, 0x00]);

        let mut texture = SvrTexture::new(Cursor::new(bytes)).unwrap();
        assert_eq!(texture.global_index(), Some(7));
        assert_eq!(texture.decode().unwrap(), bitmap);
    }

    #[test]
    fn square_bitmap_refines_the_data_format() {
        let bitmap = four_color_bitmap(64, 64);

        let mut writer = SvrWriter::new(
            Cursor::new(Vec::new()),
            SvrWriterOptions::builder()
                .pixel_format(SvrPixelFormat::Rgb5a3)
                .data_format(SvrDataFormat::Index8Rgb5a3Rect)
                .build(),
        );
        writer.write(&bitmap).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert_eq!(bytes[9], SvrDataFormat::Index8Rgb5a3Square.code());

        let mut texture = SvrTexture::new(Cursor::new(bytes)).unwrap();
        assert_eq!(texture.data_format(), SvrDataFormat::Index8Rgb5a3Square);
        assert_eq!(texture.decode().unwrap(), bitmap);
    }

    #[test]
    fn rectangular_bitmap_refines_the_other_way() {
        let bitmap = four_color_bitmap(16, 8);

        let mut writer = SvrWriter::new(
            Cursor::new(Vec::new()),
            SvrWriterOptions::builder()
                .pixel_format(SvrPixelFormat::Argb8)
                .data_format(SvrDataFormat::Index4Argb8Square)
                .build(),
        );
        writer.write(&bitmap).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert_eq!(bytes[9], SvrDataFormat::Index4Argb8Rect.code());

        let mut texture = SvrTexture::new(Cursor::new(bytes)).unwrap();
        assert_eq!(texture.decode().unwrap(), bitmap);
    }

    #[test]
    fn indexed_roundtrip_preserves_palette_order() {
        let bitmap = four_color_bitmap(8, 8);

        let (_, palette) = SvrDataFormat::Index8Argb8Square
            .encode(&bitmap, SvrPixelFormat::Argb8)
            .map(|(data, palette)| (data, palette.unwrap()))
            .unwrap();

        // First appearance order: the diagonal pattern starts with white.
        assert_eq!(&palette[..4], &[
            [255, 255, 255, 255],
            [0, 0, 0, 255],
            [255, 0, 0, 255],
            [0, 0, 255, 255],
        ]);
    }

    #[test]
    fn external_palette_recovery() {
        let bitmap = four_color_bitmap(8, 8);

        let mut writer = SvrWriter::new(
            Cursor::new(Vec::new()),
            SvrWriterOptions::builder()
                .pixel_format(SvrPixelFormat::Argb8)
                .data_format(SvrDataFormat::Index8ExtClut)
                .build(),
        );
        let companion = writer.write(&bitmap).unwrap().unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        // ExtClut formats pass through refinement untouched.
        assert_eq!(bytes[9], SvrDataFormat::Index8ExtClut.code());

        let mut texture = SvrTexture::new(Cursor::new(bytes)).unwrap();
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
    fn palette_overflow_is_reported() {
        let mut bitmap = Bitmap::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                bitmap.set_pixel(x, y, [x as u8, y as u8, 0, 255]);
            }
        }

        let result = SvrDataFormat::Index4Argb8Square.encode(&bitmap, SvrPixelFormat::Argb8);
        assert!(matches!(
            result,
            Err(Error::PaletteOverflow { capacity: 16 })
        ));
    }

    #[test]
    fn probe_rejects_dreamcast_codes() {
        // A PVRT header whose format codes belong to the Dreamcast family.
        let mut lead = Vec::new();
        lead.extend(b"PVRT");
        lead.extend(0u32.to_le_bytes());
        lead.push(0x01);
        lead.push(0x09);
        lead.extend([0, 0, 8, 0, 8, 0]);

        assert!(!is_svr(&lead));
        lead[8] = 0x08;
        lead[9] = 0x60;
        assert!(is_svr(&lead));
    }
}
