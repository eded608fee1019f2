//! In-memory RGBA bitmaps, the decoded side of every codec.

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// One pixel, 8 bits per channel in `[r, g, b, a]` order.
pub type Rgba = [u8; 4];

/// A width × height RGBA8 image stored in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// An all-transparent bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        Bitmap {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Wrap an existing RGBA buffer.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "{}x{} bitmap needs {expected} bytes, got {}",
                width,
                height,
                data.len()
            )));
        }

        Ok(Bitmap {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The raw RGBA bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the bitmap, returning the raw RGBA bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let at = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, value: Rgba) {
        let at = (y as usize * self.width as usize + x as usize) * 4;
        self.data[at..at + 4].copy_from_slice(&value);
    }
}

/// Convert a bitmap to palette indices by exact color match.
///
/// The palette is built in order of first appearance scanning rows top to
/// bottom, which keeps palette order stable across an encode/decode cycle.
/// Indices come back in row-major order; data codecs reorder them into their
/// storage layout.
pub(crate) fn index_colors(bitmap: &Bitmap, capacity: usize) -> Result<(Vec<u8>, Vec<Rgba>)> {
    let mut palette: IndexMap<Rgba, u8> = IndexMap::with_capacity(capacity);
    let mut indices = Vec::with_capacity(bitmap.width() as usize * bitmap.height() as usize);

    for y in 0..bitmap.height() {
        for x in 0..bitmap.width() {
            let color = bitmap.pixel(x, y);
            let index = match palette.get(&color) {
                Some(&index) => index,
                None => {
                    if palette.len() >= capacity {
                        return Err(Error::PaletteOverflow { capacity });
                    }
                    let index = palette.len() as u8;
                    palette.insert(color, index);
                    index
                }
            };
            indices.push(index);
        }
    }

    Ok((indices, palette.into_keys().collect()))
}
