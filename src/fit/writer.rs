// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Growable append-only byte buffer.
//!
//! Format-agnostic: the writer knows how to grow and how to lay out little-endian
//! primitives, nothing else. Readers only ever see the written prefix.

/// Initial capacity used by [`ByteWriter::new`].
pub const DEFAULT_CAPACITY: usize = 16 * 1024;

/// Append-only byte buffer with geometric growth.
#[derive(Debug, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
    len: usize,
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a writer with the given initial capacity (at least one byte).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)],
            len: 0,
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Currently allocated capacity, including the unwritten tail.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// The written prefix.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Consume the writer, returning only the written prefix.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.buf.truncate(self.len);
        self.buf
    }

    /// Make room for `additional` bytes: double, or jump straight to the
    /// required size when doubling is not enough.
    fn reserve(&mut self, additional: usize) {
        let needed = self.len + additional;
        if needed <= self.buf.len() {
            return;
        }
        let new_capacity = (self.buf.len() * 2).max(needed);
        self.buf.resize(new_capacity, 0);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i32_le(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Overwrite already-written bytes at `offset`.
    ///
    /// Panics if the range extends past the written prefix; patching is only
    /// valid for placeholders the caller wrote earlier.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) {
        assert!(
            offset + bytes.len() <= self.len,
            "patch range {}..{} beyond written length {}",
            offset,
            offset + bytes.len(),
            self.len
        );
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn patch_u16_le(&mut self, offset: usize, value: u16) {
        self.patch(offset, &value.to_le_bytes());
    }

    pub fn patch_u32_le(&mut self, offset: usize, value: u32) {
        self.patch(offset, &value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_writer_is_empty() {
        let writer = ByteWriter::new();
        assert!(writer.is_empty());
        assert_eq!(writer.capacity(), DEFAULT_CAPACITY);
        assert!(writer.as_slice().is_empty());
    }

    #[test]
    fn test_doubles_on_overflow() {
        let mut writer = ByteWriter::with_capacity(4);
        writer.write_u32_le(1);
        assert_eq!(writer.capacity(), 4);
        writer.write_u8(2);
        assert_eq!(writer.capacity(), 8);
    }

    #[test]
    fn test_grows_exactly_when_doubling_is_not_enough() {
        let mut writer = ByteWriter::with_capacity(4);
        writer.write_bytes(&[7u8; 20]);
        assert_eq!(writer.capacity(), 20);
        assert_eq!(writer.len(), 20);
    }

    #[test]
    fn test_exposes_only_written_prefix() {
        let mut writer = ByteWriter::with_capacity(64);
        writer.write_u16_le(0xBEEF);
        assert_eq!(writer.as_slice(), &[0xEF, 0xBE]);
        assert_eq!(writer.into_bytes(), vec![0xEF, 0xBE]);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut writer = ByteWriter::with_capacity(1);
        writer.write_i32_le(-2);
        writer.write_i8(-1);
        assert_eq!(writer.as_slice(), &[0xFE, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_patch_overwrites_placeholder() {
        let mut writer = ByteWriter::new();
        writer.write_u32_le(0);
        writer.write_u8(9);
        writer.patch_u32_le(0, 0x0102_0304);
        assert_eq!(writer.as_slice(), &[0x04, 0x03, 0x02, 0x01, 9]);
    }

    #[test]
    #[should_panic(expected = "beyond written length")]
    fn test_patch_past_prefix_panics() {
        let mut writer = ByteWriter::new();
        writer.write_u8(1);
        writer.patch_u16_le(0, 7);
    }
}
