//! Bounds-checked little-endian cursor over a snapshot buffer.

use super::error::DecodeError;

/// Read position into a borrowed buffer.
///
/// Every read either consumes exactly the requested bytes or fails with
/// [`DecodeError::Truncated`] without moving the cursor.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current absolute offset.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> &'a [u8] {
        &self.buf[..self.pos]
    }

    /// Fails unless `n` bytes are available at `start`, reporting `start`
    /// as the offset of the failed read.
    pub fn require_from(&self, start: usize, n: usize) -> Result<(), DecodeError> {
        let available = self.buf.len().saturating_sub(start);
        if available < n {
            return Err(DecodeError::Truncated {
                offset: start,
                expected: n,
                available,
            });
        }
        Ok(())
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.require_from(self.pos, n)?;
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut r = Reader::new(&buf);
        assert_eq!(r.u8().unwrap(), 0x01);
        assert_eq!(r.u16().unwrap(), 0x0302);
        assert_eq!(r.u32().unwrap(), 0x0706_0504);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_short_read_does_not_advance() {
        let buf = [0xAA, 0xBB, 0xCC];
        let mut r = Reader::new(&buf);
        r.u8().unwrap();
        let err = r.u64().unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                offset: 1,
                expected: 8,
                available: 2
            }
        );
        assert_eq!(r.offset(), 1);
    }
}
