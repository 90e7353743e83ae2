//! Little-endian byte stream codec used by the transaction wire format.
//!
//! [`ByteReader`] walks a borrowed slice with a cursor and fails with
//! [`ChainError::Malformed`] instead of reading past the end. [`ByteWriter`]
//! appends to an owned buffer. Compact sizes follow the Bitcoin varint
//! layout: one byte below `0xFD`, otherwise a marker byte followed by a
//! 2, 4 or 8 byte little-endian integer.

use crate::error::ChainError;

// ==============================================================================
// Reader
// ==============================================================================

pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current cursor position, counted from the start of the slice.
    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The bytes between `start` and the cursor.
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.data[start.min(self.pos)..self.pos]
    }

    pub fn read(&mut self, n: usize) -> Result<&'a [u8], ChainError> {
        if n > self.remaining() {
            return Err(ChainError::Malformed(format!(
                "attempted to read {n} bytes at offset {} with only {} remaining",
                self.pos,
                self.remaining()
            )));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ChainError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ChainError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ChainError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ChainError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ChainError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_compact_size(&mut self) -> Result<u64, ChainError> {
        match self.read_u8()? {
            0xFD => Ok(u64::from(self.read_u16()?)),
            0xFE => Ok(u64::from(self.read_u32()?)),
            0xFF => self.read_u64(),
            small => Ok(u64::from(small)),
        }
    }

    /// Compact-size length followed by that many raw bytes.
    pub fn read_string(&mut self) -> Result<&'a [u8], ChainError> {
        let len = self.read_compact_size()?;
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= self.remaining())
            .ok_or_else(|| {
                ChainError::Malformed(format!(
                    "length prefix {len} exceeds the {} remaining bytes",
                    self.remaining()
                ))
            })?;
        self.read(len)
    }
}

// ==============================================================================
// Writer
// ==============================================================================

#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    pub fn write_u16(&mut self, val: u16) {
        self.write(&val.to_le_bytes());
    }

    pub fn write_u32(&mut self, val: u32) {
        self.write(&val.to_le_bytes());
    }

    pub fn write_u64(&mut self, val: u64) {
        self.write(&val.to_le_bytes());
    }

    pub fn write_compact_size(&mut self, val: u64) {
        if val < 0xFD {
            self.write_u8(val as u8);
        } else if val <= 0xFFFF {
            self.write_u8(0xFD);
            self.write_u16(val as u16);
        } else if val <= 0xFFFF_FFFF {
            self.write_u8(0xFE);
            self.write_u32(val as u32);
        } else {
            self.write_u8(0xFF);
            self.write_u64(val);
        }
    }

    pub fn write_string(&mut self, bytes: &[u8]) {
        self.write_compact_size(bytes.len() as u64);
        self.write(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Number of bytes `write_compact_size(val)` would emit.
pub fn compact_size_len(val: u64) -> usize {
    match val {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}
