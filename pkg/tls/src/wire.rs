// TLS specific helpers for reading and building binary messages.

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

use crate::errors::{Error, Result};

pub const U8_LIMIT: usize = u8::MAX as usize;
pub const U16_LIMIT: usize = u16::MAX as usize;
pub const U24_LIMIT: usize = 1 << 24;

pub fn exp2(v: usize) -> usize {
    1 << v
}

/// Number of length-prefix bytes used for a vector whose maximum size is
/// `max_bytes`. TLS always uses the minimum number of bytes able to encode
/// the maximum length.
fn len_width(max_bytes: usize) -> usize {
    if max_bytes <= U8_LIMIT {
        1
    } else if max_bytes <= U16_LIMIT {
        2
    } else if max_bytes <= U24_LIMIT {
        3
    } else {
        panic!("Maximum length not supported");
    }
}

/// Bounds-checked big-endian cursor over an owned message payload.
///
/// Every read is validated against the remaining length before any byte is
/// touched; a short read yields the error the reader was constructed with,
/// so each message parser reports its own taxonomy code. All length
/// arithmetic happens in `usize` on values bounded by the record size and
/// cannot wrap.
pub struct Reader {
    buf: Bytes,
    pos: usize,
    err: Error,
}

impl Reader {
    pub fn new(buf: Bytes, err: Error) -> Self {
        Self { buf, pos: 0, err }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(self.err.clone())
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, n: usize) -> Result<Bytes> {
        if n > self.remaining() {
            return self.fail();
        }

        let out = self.buf.slice(self.pos..(self.pos + n));
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let b = self.take(1)?;
        Ok(b[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(BigEndian::read_u16(&b))
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(BigEndian::read_u24(&b))
    }

    /// Reads a variable length vector of bytes. The width of the length
    /// prefix is derived from `max_bytes`; a declared length outside of
    /// `[min_bytes, max_bytes]` or past the end of the buffer fails.
    pub fn varlen_vector(&mut self, min_bytes: usize, max_bytes: usize) -> Result<Bytes> {
        let len = match len_width(max_bytes) {
            1 => self.read_u8()? as usize,
            2 => self.read_u16()? as usize,
            3 => self.read_u24()? as usize,
            _ => unreachable!(),
        };

        if len < min_bytes || len > max_bytes {
            return self.fail();
        }

        self.take(len)
    }

    /// Fails unless the cursor consumed the buffer exactly.
    pub fn expect_end(&self) -> Result<()> {
        if !self.is_empty() {
            return self.fail();
        }

        Ok(())
    }
}

/// Owned byte builder for outbound handshake messages.
///
/// Length prefixes are back-patched once the enclosed content is known, so
/// serializers never track a raw write cursor.
#[derive(Default)]
pub struct Writer {
    out: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { out: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.out
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.out
    }

    pub fn push_u8(&mut self, v: u8) {
        self.out.push(v);
    }

    pub fn push_u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    pub fn push_u24(&mut self, v: u32) {
        assert!(v < U24_LIMIT as u32);
        self.out.extend_from_slice(&v.to_be_bytes()[1..]);
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.out.extend_from_slice(data);
    }

    /// Writes a length-prefixed vector in the TLS wire format. The prefix
    /// width is the minimum able to encode `max_bytes`, as on the read side.
    pub fn varlen_vector<F>(&mut self, min_bytes: usize, max_bytes: usize, f: F) -> Result<()>
    where
        F: FnOnce(&mut Writer) -> Result<()>,
    {
        let n = len_width(max_bytes);

        let i = self.out.len();
        self.out.resize(i + n, 0);
        let start = self.out.len();

        f(self)?;

        let size = self.out.len() - start;
        if size < min_bytes || size > max_bytes {
            return Err(Error::BadInputData);
        }

        match n {
            1 => self.out[i] = size as u8,
            2 => BigEndian::write_u16(&mut self.out[i..i + 2], size as u16),
            3 => BigEndian::write_u24(&mut self.out[i..i + 3], size as u32),
            _ => unreachable!(),
        }

        Ok(())
    }
}
