//! Streaming PRS decoder.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::instrument;

use crate::error::{Error, Result};

/// Flag bits taken MSB-first from control bytes interleaved with the data.
struct FlagReader<'a, R: Read> {
    source: &'a mut R,
    control: u8,
    remaining: u8,
}

impl<'a, R: Read> FlagReader<'a, R> {
    fn new(source: &'a mut R) -> Self {
        FlagReader {
            source,
            control: 0,
            remaining: 0,
        }
    }

    fn flag(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            self.control = read_u8(self.source)?;
            self.remaining = 8;
        }

        let flag = self.control & 0x80 != 0;
        self.control <<= 1;
        self.remaining -= 1;
        Ok(flag)
    }
}

fn read_u8<R: Read>(source: &mut R) -> Result<u8> {
    source.read_u8().map_err(map_eof)
}

fn read_u16<R: Read>(source: &mut R) -> Result<u16> {
    source.read_u16::<LittleEndian>().map_err(map_eof)
}

fn map_eof(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated
    } else {
        Error::IOError(e)
    }
}

/// Decompress a PRS stream.
///
/// The source is consumed up to and including the end-of-stream marker; the
/// total input length never needs to be known up front. Trailing bytes after
/// the marker are left unread.
///
/// # Errors
///
/// [`Error::Truncated`] when the source ends mid-command,
/// [`Error::InvalidBackref`] when a copy reaches before the start of the
/// output.
#[instrument(skip(source), err)]
pub fn decompress<R: Read>(source: &mut R) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut flags = FlagReader::new(source);

    loop {
        if flags.flag()? {
            let literal = read_u8(flags.source)?;
            output.push(literal);
            continue;
        }

        let (offset, length) = if flags.flag()? {
            // Long copy: 13-bit offset and 3-bit length packed into a word.
            let word = read_u16(flags.source)?;
            let offset = ((word >> 3) as i32) - 8192;
            let length_field = (word & 7) as usize;

            if length_field == 0 {
                let extend = read_u8(flags.source)?;
                if extend == 0 {
                    break;
                }
                (offset, extend as usize + 1)
            } else {
                (offset, length_field + 2)
            }
        } else {
            let high = flags.flag()? as usize;
            let low = flags.flag()? as usize;
            let offset = read_u8(flags.source)? as i32 - 256;
            (offset, (high << 1 | low) + 2)
        };

        copy_backref(&mut output, offset, length)?;
    }

    Ok(output)
}

/// Byte-at-a-time so overlapping copies repeat freshly written output.
fn copy_backref(output: &mut Vec<u8>, offset: i32, length: usize) -> Result<()> {
    let start = output.len() as i64 + offset as i64;
    if start < 0 {
        return Err(Error::InvalidBackref {
            offset,
            position: output.len(),
        });
    }

    let start = start as usize;
    for i in 0..length {
        let byte = output[start + i];
        output.push(byte);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::decompress;
    use crate::error::Error;

    #[test]
    fn decode_single_literal() {
        // Flags 1 (literal), 0, 1 (long copy end marker).
        let mut input = Cursor::new(vec![0b1010_0000, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(decompress(&mut input).unwrap(), vec![0x00]);
    }

    #[test]
    fn decode_empty_stream() {
        let mut input = Cursor::new(vec![0b0100_0000, 0x00, 0x00, 0x00]);
        assert_eq!(decompress(&mut input).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn decode_short_copy() {
        // "AB" as literals, then a short copy of length 4 at offset -2.
        let mut input = Cursor::new(vec![
            0b1100_1001, // literal, literal, short copy, L = 0b10, then 0, 1 of the end marker
            b'A',
            b'B',
            0xFE, // offset -2
            0x00,
            0x00,
            0x00,
        ]);
        assert_eq!(decompress(&mut input).unwrap(), b"ABABAB");
    }

    #[test]
    fn decode_long_copy_inline_length() {
        // 5 literals then a long copy: W = (offset + 8192) << 3 | (5 - 2).
        let word: u16 = ((-5i32 + 8192) as u16) << 3 | 3;
        let mut input = Cursor::new(vec![
            0b1111_1010,
            b'a',
            b'b',
            b'c',
            b'd',
            b'e',
            word as u8,
            (word >> 8) as u8,
            0b1000_0000, // second flag of the end marker, then padding
            0x00,
            0x00,
            0x00,
        ]);
        assert_eq!(decompress(&mut input).unwrap(), b"abcdeabcde");
    }

    #[test]
    fn decode_long_copy_extended_length() {
        // One literal, then an overlapping copy of 12 bytes via the extension byte.
        let word: u16 = ((-1i32 + 8192) as u16) << 3;
        let mut input = Cursor::new(vec![
            0b1010_1000,
            b'x',
            word as u8,
            (word >> 8) as u8,
            11, // B: copy B + 1 = 12 bytes
            0x00,
            0x00,
            0x00,
        ]);
        assert_eq!(decompress(&mut input).unwrap(), vec![b'x'; 13]);
    }

    #[test]
    fn truncated_before_end_marker() {
        let mut input = Cursor::new(vec![0b1000_0000, 0x41]);
        assert!(matches!(
            decompress(&mut input),
            Err(Error::Truncated)
        ));
    }

    #[test]
    fn truncated_empty_input() {
        let mut input = Cursor::new(Vec::new());
        assert!(matches!(decompress(&mut input), Err(Error::Truncated)));
    }

    #[test]
    fn backref_before_output_start() {
        // Short copy at offset -2 with only one byte of output.
        let mut input = Cursor::new(vec![0b1000_0000, 0x41, 0xFE]);
        assert!(matches!(
            decompress(&mut input),
            Err(Error::InvalidBackref {
                offset: -2,
                position: 1
            })
        ));
    }

    #[test]
    fn trailing_bytes_left_unread() {
        let mut input = Cursor::new(vec![0b0100_0000, 0x00, 0x00, 0x00, 0xAA, 0xBB]);
        decompress(&mut input).unwrap();
        assert_eq!(input.position(), 4);
    }
}
