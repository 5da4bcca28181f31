//! Big-endian cursor helpers shared by the class and attribute codecs.

use crate::error::{ClassError, ClassResult};

/// Forward-only reader over a big-endian byte slice.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn bytes(&mut self, len: usize) -> ClassResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(ClassError::Truncated {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> ClassResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> ClassResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> ClassResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> ClassResult<u64> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }
}

pub(crate) fn put_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub(crate) fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Checked conversion for counts that the class format stores as `u16`.
pub(crate) fn count_u16(len: usize, what: &str) -> ClassResult<u16> {
    u16::try_from(len).map_err(|_| ClassError::MalformedAttribute {
        attribute: what.to_string(),
        reason: format!("{len} entries exceed the u16 limit"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_values() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.u8().unwrap(), 0x01);
        assert_eq!(r.u16().unwrap(), 0x0203);
        assert_eq!(r.u32().unwrap(), 0x0405_0607);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated_read_reports_offset() {
        let mut r = ByteReader::new(&[0xAA]);
        let err = r.u16().unwrap_err();
        assert!(matches!(err, ClassError::Truncated { offset: 0, needed: 1 }));
    }

    #[test]
    fn u64_combines_halves() {
        let mut buf = Vec::new();
        put_u64(&mut buf, 0x0102_0304_0506_0708);
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.u64().unwrap(), 0x0102_0304_0506_0708);
    }
}
