//! Chunk headers shared by the PVRT-based families.

use binrw::{BinRead, BinWrite};

/// The optional 16-byte global-index chunk ("GBIX" or "GCIX").
///
/// The index itself is little-endian here; the GVR family overrides that
/// with its own big-endian variant.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub(crate) struct GbixChunk {
    pub magic: [u8; 4],
    pub length: u32,
    pub global_index: u32,
    pub reserved: u32,
}

impl GbixChunk {
    pub fn new(magic: [u8; 4], global_index: u32) -> Self {
        GbixChunk {
            magic,
            length: 8,
            global_index,
            reserved: 0,
        }
    }
}

/// The 16-byte PVRT data-chunk header used by the PVR and SVR families.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little, magic = b"PVRT")]
pub(crate) struct PvrtHeader {
    /// Bytes following this field: 8 header bytes plus palette and pixels
    pub length: u32,
    pub pixel_format: u8,
    pub data_format: u8,
    pub reserved: u16,
    pub width: u16,
    pub height: u16,
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::{BinRead, BinWrite};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn gbix_chunk_is_16_bytes() {
        let chunk = GbixChunk::new(*b"GBIX", 0x1234);
        let mut out = Cursor::new(Vec::new());
        chunk.write(&mut out).unwrap();

        let bytes = out.into_inner();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..4], b"GBIX");
        assert_eq!(&bytes[4..8], &8u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &0x1234u32.to_le_bytes());

        assert_eq!(GbixChunk::read(&mut Cursor::new(bytes)).unwrap(), chunk);
    }

    #[test]
    fn pvrt_header_layout() {
        #[rustfmt::skip]
        let bytes = vec![
            b'P', b'V', b'R', b'T',
            0x28, 0x00, 0x00, 0x00,
            0x01,
            0x09,
            0x00, 0x00,
            0x08, 0x00,
            0x04, 0x00,
        ];

        let header = PvrtHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(header.length, 0x28);
        assert_eq!(header.pixel_format, 0x01);
        assert_eq!(header.data_format, 0x09);
        assert_eq!(header.width, 8);
        assert_eq!(header.height, 4);

        let mut out = Cursor::new(Vec::new());
        header.write(&mut out).unwrap();
        assert_eq!(out.into_inner(), bytes);
    }
}
