//! The three variable length integer encodings found in packfiles.
//!
//! * the entry header: type in bits 4-6 of the first byte, the low four bits of the
//!   inflated size beneath it, then seven more bits per continuation byte.
//! * the offset-delta base distance: big-endian groups of seven bits where every
//!   continuation adds one before shifting (so no two encodings share a value).
//! * the delta stream sizes: plain little-endian base 128.
use std::io::Read;

use crate::errors::{ ErrorKind, Result };

// shift applied to the low seven bits of the nth header byte
const HEADER_SHIFTS: [u32; 10] = [0, 4, 11, 18, 25, 32, 39, 46, 53, 60];

/// A bounds-checked view over a byte buffer. Every read either yields a byte or an error,
/// never an out of range index.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteCursor { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = *self.buf.get(self.pos).ok_or_else(|| {
            ErrorKind::CorruptedPackfile(format!("truncated at byte {}", self.pos))
        })?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ErrorKind::CorruptedPackfile(
                format!("wanted {} bytes at {}, have {}", len, self.pos, self.remaining())
            ).into())
        }

        let out = &self.buf[self.pos .. self.pos + len];
        self.pos += len;
        Ok(out)
    }
}

/// Decode a packfile entry header. Returns the raw type bits (`first & 0x70`), the declared
/// inflated size and the number of bytes the header occupies.
pub fn read_entry_header(cursor: &mut ByteCursor) -> Result<(u8, u64, usize)> {
    let start = cursor.position();
    let mut byte = cursor.read_u8()?;
    let tag = byte & 0x70;
    let mut size = u64::from(byte & 0x0f);
    let mut count = 0;

    while byte & 0x80 != 0 {
        count += 1;
        let shift = match HEADER_SHIFTS.get(count) {
            Some(xs) => *xs,
            None => return Err(ErrorKind::MalformedLength("entry header longer than 64 bits".into()).into())
        };

        byte = cursor.read_u8()?;
        // only the low four bits of the tenth byte fit
        if shift == 60 && byte & 0x70 != 0 {
            return Err(ErrorKind::MalformedLength("entry header size overflows 64 bits".into()).into())
        }
        size |= u64::from(byte & 0x7f) << shift;
    }

    Ok((tag, size, cursor.position() - start))
}

/// Decode the distance between an offset-delta entry and its base.
pub fn read_negative_offset(cursor: &mut ByteCursor) -> Result<u64> {
    let mut byte = cursor.read_u8()?;
    let mut value = u64::from(byte & 0x7f);

    while byte & 0x80 != 0 {
        if value >= (u64::MAX >> 7) {
            return Err(ErrorKind::CorruptedPackfile("base offset overflows 64 bits".into()).into())
        }

        byte = cursor.read_u8()?;
        value = ((value + 1) << 7) | u64::from(byte & 0x7f);
    }

    Ok(value)
}

/// Read one little-endian base 128 number from a stream, returning it with the number of
/// bytes consumed. Running out of input mid-number is a truncated delta.
pub fn read_base128<R: Read>(input: &mut R) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    let mut count = 0;
    let mut byte = [0u8; 1];

    loop {
        if input.read(&mut byte)? == 0 {
            return Err(ErrorKind::TruncatedDelta.into())
        }
        count += 1;

        if shift > 63 {
            return Err(ErrorKind::MalformedLength("delta size longer than 64 bits".into()).into())
        }
        value |= u64::from(byte[0] & 0x7f) << shift;
        shift += 7;

        if byte[0] & 0x80 == 0 {
            return Ok((value, count))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ ByteCursor, read_entry_header, read_negative_offset, read_base128 };
    use crate::fixtures::entry_header as header;
    use crate::errors::ErrorKind;

    #[test]
    fn entry_header_boundaries() {
        for &(tag, size, width) in &[
            (3u8, 0u64, 1usize),
            (1, 15, 1),
            (2, 16, 2),
            (4, (1u64 << 32) - 1, 5)
        ] {
            let bytes = header(tag, size);
            assert_eq!(bytes.len(), width);

            let mut cursor = ByteCursor::new(&bytes);
            let (raw_tag, decoded, consumed) = read_entry_header(&mut cursor).expect("valid header");
            assert_eq!(raw_tag, tag << 4);
            assert_eq!(decoded, size);
            assert_eq!(consumed, width);
        }
    }

    #[test]
    fn entry_header_stops_at_clear_continuation_bit() {
        // size 16 blob followed by unrelated payload bytes
        let bytes = [0xb0, 0x01, 0xff, 0xff];
        let mut cursor = ByteCursor::new(&bytes);
        let (tag, size, consumed) = read_entry_header(&mut cursor).unwrap();
        assert_eq!(tag, 0x30);
        assert_eq!(size, 16);
        assert_eq!(consumed, 2);
        assert_eq!(cursor.remaining(), 2);
    }

    #[test]
    fn entry_header_truncated() {
        let bytes = [0x95, 0x80];
        let mut cursor = ByteCursor::new(&bytes);
        let err = read_entry_header(&mut cursor).expect_err("runs off the end");
        assert!(matches!(err.kind(), ErrorKind::CorruptedPackfile(_)));
    }

    #[test]
    fn entry_header_too_long() {
        let bytes = [0xff; 12];
        let mut cursor = ByteCursor::new(&bytes);
        let err = read_entry_header(&mut cursor).expect_err("too many continuation bytes");
        assert!(matches!(err.kind(), ErrorKind::MalformedLength(_)));
    }

    #[test]
    fn entry_header_rejects_bits_past_64() {
        // 4 + 8 * 7 = 60 bits so far, then a byte carrying seven more
        let mut bytes = vec![0xbf];
        bytes.extend_from_slice(&[0xff; 8]);
        bytes.push(0x7f);
        let mut cursor = ByteCursor::new(&bytes);
        let err = read_entry_header(&mut cursor).expect_err("size overflows");
        assert!(matches!(err.kind(), ErrorKind::MalformedLength(_)));

        // the largest size that still fits
        bytes[9] = 0x0f;
        let mut cursor = ByteCursor::new(&bytes);
        let (_, size, consumed) = read_entry_header(&mut cursor).unwrap();
        assert_eq!(size, u64::MAX);
        assert_eq!(consumed, 10);
    }

    #[test]
    fn negative_offset_single_byte() {
        let mut cursor = ByteCursor::new(&[0x7f]);
        assert_eq!(read_negative_offset(&mut cursor).unwrap(), 127);
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn negative_offset_applies_bias() {
        // ((0x01 + 1) << 7) | 0x00
        let mut cursor = ByteCursor::new(&[0x81, 0x00]);
        assert_eq!(read_negative_offset(&mut cursor).unwrap(), 256);

        // 128 is the smallest two byte value: ((0 + 1) << 7) | 0
        let mut cursor = ByteCursor::new(&[0x80, 0x00]);
        assert_eq!(read_negative_offset(&mut cursor).unwrap(), 128);

        // three bytes: (((0x02 + 1) << 7 | 0x05) + 1) << 7 | 0x11
        let mut cursor = ByteCursor::new(&[0x82, 0x85, 0x11]);
        let expected = (((((2u64 + 1) << 7) | 5) + 1) << 7) | 0x11;
        assert_eq!(read_negative_offset(&mut cursor).unwrap(), expected);
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn base128_sizes() {
        let mut input: &[u8] = &[0x05];
        assert_eq!(read_base128(&mut input).unwrap(), (5, 1));

        let mut input: &[u8] = &[0x80, 0x01];
        assert_eq!(read_base128(&mut input).unwrap(), (128, 2));

        let mut input: &[u8] = &[0xe5, 0x8e, 0x26, 0xaa];
        assert_eq!(read_base128(&mut input).unwrap(), (624_485, 3));
        assert_eq!(input, &[0xaau8][..]);
    }

    #[test]
    fn base128_truncated() {
        let mut input: &[u8] = &[0x80];
        let err = read_base128(&mut input).expect_err("no terminator");
        assert!(matches!(err.kind(), ErrorKind::TruncatedDelta));
    }
}
