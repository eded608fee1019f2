//! Offset-oriented stream helpers shared by the sega-rs format crates.
//!
//! The container formats handled by this workspace are all parsed relative to
//! a base offset captured when the stream is opened, so the same parser works
//! on a standalone file and on a region embedded in a larger container. The
//! helpers in this crate cover the pieces of that style that `byteorder`
//! does not: fixed-width C-string fields, block-padded copies, and
//! cursor-preserving probes.
//!
//! Every helper restores the caller's cursor unless its name implies
//! advancement ([`read_cstr`], [`write_cstr`] and [`copy_padded`] advance;
//! [`peek`] and [`contains_at`] do not).

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Round `value` up to the next multiple of `block`.
///
/// A `block` of zero is returned unchanged; callers validate block sizes
/// before layout math reaches this point.
pub const fn round_up(value: u64, block: u64) -> u64 {
    if block == 0 {
        return value;
    }
    value.div_ceil(block) * block
}

/// Read a fixed-width, zero-terminated string field.
///
/// Exactly `field_len` bytes are consumed; the returned string is the part
/// before the first NUL. Bytes after the terminator are discarded without
/// being interpreted. Non-UTF-8 names are replaced lossily, matching how the
/// original tools treated them.
pub fn read_cstr<R: Read + ?Sized>(reader: &mut R, field_len: usize) -> io::Result<String> {
    let mut field = vec![0u8; field_len];
    reader.read_exact(&mut field)?;

    let end = field.iter().position(|&b| b == 0).unwrap_or(field_len);
    Ok(String::from_utf8_lossy(&field[..end]).into_owned())
}

/// Write a string into a fixed-width field, padding the remainder with NULs.
///
/// A value of exactly `field_len` bytes is written without a terminator;
/// anything longer is rejected with [`io::ErrorKind::InvalidInput`].
pub fn write_cstr<W: Write + ?Sized>(
    writer: &mut W,
    value: &str,
    field_len: usize,
) -> io::Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() > field_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{value:?} does not fit in a {field_len}-byte field"),
        ));
    }

    writer.write_all(bytes)?;
    let padding = vec![0u8; field_len - bytes.len()];
    writer.write_all(&padding)
}

/// Copy all of `src` into `dst`, then pad with `pad_byte` up to the next
/// multiple of `block`.
///
/// Returns the number of bytes copied, not counting padding. A `block` of
/// zero or one copies without padding.
pub fn copy_padded<R, W>(src: &mut R, dst: &mut W, block: u64, pad_byte: u8) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let copied = io::copy(src, dst)?;

    if block > 1 {
        let remainder = (copied % block) as usize;
        if remainder != 0 {
            let padding = vec![pad_byte; block as usize - remainder];
            dst.write_all(&padding)?;
        }
    }

    Ok(copied)
}

/// Test whether `pattern` appears at absolute `offset` without disturbing the
/// caller's cursor.
///
/// A stream that ends before `offset + pattern.len()` compares unequal rather
/// than erroring.
pub fn contains_at<R: Read + Seek + ?Sized>(
    reader: &mut R,
    offset: u64,
    pattern: &[u8],
) -> io::Result<bool> {
    let saved = reader.stream_position()?;
    reader.seek(SeekFrom::Start(offset))?;

    let mut field = vec![0u8; pattern.len()];
    let result = match reader.read_exact(&mut field) {
        Ok(()) => field == pattern,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => {
            reader.seek(SeekFrom::Start(saved))?;
            return Err(e);
        }
    };

    reader.seek(SeekFrom::Start(saved))?;
    Ok(result)
}

/// Read up to `len` bytes from the current position, restoring the cursor.
///
/// Used for signature probes; a short stream yields a short buffer.
pub fn peek<R: Read + Seek + ?Sized>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let saved = reader.stream_position()?;

    let mut buffer = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buffer.truncate(filled);

    reader.seek(SeekFrom::Start(saved))?;
    Ok(buffer)
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Seek, SeekFrom};

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn round_up_multiples() {
        assert_eq!(round_up(0, 2048), 0);
        assert_eq!(round_up(1, 2048), 2048);
        assert_eq!(round_up(2048, 2048), 2048);
        assert_eq!(round_up(2049, 2048), 4096);
        assert_eq!(round_up(5, 0), 5);
    }

    #[test]
    fn read_cstr_stops_at_nul() {
        let mut input = Cursor::new(b"hi.dat\0\0garbage".to_vec());
        assert_eq!(read_cstr(&mut input, 8).unwrap(), "hi.dat");
        assert_eq!(input.position(), 8);
    }

    #[test]
    fn read_cstr_full_field() {
        let mut input = Cursor::new(b"abcd".to_vec());
        assert_eq!(read_cstr(&mut input, 4).unwrap(), "abcd");
    }

    #[test]
    fn write_cstr_pads() {
        let mut out = Vec::new();
        write_cstr(&mut out, "hi", 4).unwrap();
        assert_eq!(out, b"hi\0\0");
    }

    #[test]
    fn write_cstr_rejects_long_values() {
        let mut out = Vec::new();
        assert!(write_cstr(&mut out, "too long", 4).is_err());
    }

    #[test]
    fn copy_padded_pads_to_block() {
        let mut src = Cursor::new(b"hello".to_vec());
        let mut dst = Vec::new();
        let copied = copy_padded(&mut src, &mut dst, 8, 0).unwrap();
        assert_eq!(copied, 5);
        assert_eq!(dst, b"hello\0\0\0");
    }

    #[test]
    fn copy_padded_exact_block_is_unpadded() {
        let mut src = Cursor::new(b"12345678".to_vec());
        let mut dst = Vec::new();
        copy_padded(&mut src, &mut dst, 8, 0).unwrap();
        assert_eq!(dst, b"12345678");
    }

    #[test]
    fn contains_at_restores_cursor() {
        let mut input = Cursor::new(b"AFS\0rest".to_vec());
        input.seek(SeekFrom::Start(2)).unwrap();

        assert!(contains_at(&mut input, 0, b"AFS\0").unwrap());
        assert!(!contains_at(&mut input, 0, b"GVRT").unwrap());
        assert!(!contains_at(&mut input, 100, b"A").unwrap());
        assert_eq!(input.position(), 2);
    }

    #[test]
    fn peek_short_stream() {
        let mut input = Cursor::new(b"abc".to_vec());
        assert_eq!(peek(&mut input, 32).unwrap(), b"abc");
        assert_eq!(input.position(), 0);
    }
}
