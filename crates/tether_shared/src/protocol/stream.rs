//! # Symmetric Streams
//!
//! One `serialize` routine per message, two stream implementations.
//!
//! ## Design
//!
//! - `WriteStream` copies values out into a pre-allocated, MTU-sized buffer
//! - `ReadStream` fills values in from a borrowed byte slice

use super::error::{CodecError, CodecResult};
use crate::math::{Quaternion, Transform, Vec3};
use crate::MAX_PACKET_SIZE;

/// A direction-agnostic serialization stream.
///
/// When writing, every `serialize_*` reads from `value`. When reading, every
/// `serialize_*` overwrites `value`.
pub trait Stream {
    /// Serializes a single byte.
    fn serialize_u8(&mut self, value: &mut u8) -> CodecResult<()>;

    /// Serializes a little-endian u16.
    fn serialize_u16(&mut self, value: &mut u16) -> CodecResult<()>;

    /// Serializes a little-endian u32.
    fn serialize_u32(&mut self, value: &mut u32) -> CodecResult<()>;

    /// Serializes a little-endian u64.
    fn serialize_u64(&mut self, value: &mut u64) -> CodecResult<()>;

    /// Serializes a UTF-8 string bounded by `max_len` bytes.
    fn serialize_string(&mut self, value: &mut String, max_len: usize) -> CodecResult<()>;

    /// Serializes an IEEE-754 f32 by its bit pattern.
    fn serialize_f32(&mut self, value: &mut f32) -> CodecResult<()> {
        let mut bits = value.to_bits();
        self.serialize_u32(&mut bits)?;
        *value = f32::from_bits(bits);
        Ok(())
    }

    /// Serializes a vector as three floats.
    fn serialize_vec3(&mut self, value: &mut Vec3) -> CodecResult<()> {
        self.serialize_f32(&mut value.x)?;
        self.serialize_f32(&mut value.y)?;
        self.serialize_f32(&mut value.z)
    }

    /// Serializes a quaternion as four floats (x, y, z, w).
    fn serialize_quaternion(&mut self, value: &mut Quaternion) -> CodecResult<()> {
        self.serialize_f32(&mut value.x)?;
        self.serialize_f32(&mut value.y)?;
        self.serialize_f32(&mut value.z)?;
        self.serialize_f32(&mut value.w)
    }

    /// Serializes a transform: position then rotation.
    fn serialize_transform(&mut self, value: &mut Transform) -> CodecResult<()> {
        self.serialize_vec3(&mut value.position)?;
        self.serialize_quaternion(&mut value.rotation)
    }
}

/// Encode stream - writes into a pre-allocated buffer.
///
/// Designed to be reused across messages to avoid allocations.
pub struct WriteStream {
    buffer: [u8; MAX_PACKET_SIZE],
    position: usize,
}

impl WriteStream {
    /// Creates a new stream with a fresh buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0u8; MAX_PACKET_SIZE],
            position: 0,
        }
    }

    /// Resets the stream for reuse.
    #[inline]
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.position
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Returns a slice of the written data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> CodecResult<()> {
        let end = self.position + bytes.len();
        if end > MAX_PACKET_SIZE {
            return Err(CodecError::BufferFull {
                needed: end,
                capacity: MAX_PACKET_SIZE,
            });
        }
        self.buffer[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }
}

impl Default for WriteStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for WriteStream {
    #[inline]
    fn serialize_u8(&mut self, value: &mut u8) -> CodecResult<()> {
        self.write_bytes(&[*value])
    }

    #[inline]
    fn serialize_u16(&mut self, value: &mut u16) -> CodecResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    #[inline]
    fn serialize_u32(&mut self, value: &mut u32) -> CodecResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    #[inline]
    fn serialize_u64(&mut self, value: &mut u64) -> CodecResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn serialize_string(&mut self, value: &mut String, max_len: usize) -> CodecResult<()> {
        let len = value.len();
        if len > max_len || len > usize::from(u16::MAX) {
            return Err(CodecError::StringTooLong { len, max: max_len });
        }
        #[allow(clippy::cast_possible_truncation)]
        let mut prefix = len as u16;
        self.serialize_u16(&mut prefix)?;
        self.write_bytes(value.as_bytes())
    }
}

/// Decode stream - reads from a borrowed buffer.
pub struct ReadStream<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ReadStream<'a> {
    /// Creates a new stream over `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    fn read_bytes(&mut self, count: usize) -> CodecResult<&'a [u8]> {
        if count > self.remaining() {
            return Err(CodecError::Truncated {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buffer[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let remaining = self.remaining();
        let slice = self.read_bytes(N)?;
        slice.try_into().map_err(|_| CodecError::Truncated { needed: N, remaining })
    }
}

impl Stream for ReadStream<'_> {
    #[inline]
    fn serialize_u8(&mut self, value: &mut u8) -> CodecResult<()> {
        *value = self.read_array::<1>()?[0];
        Ok(())
    }

    #[inline]
    fn serialize_u16(&mut self, value: &mut u16) -> CodecResult<()> {
        *value = u16::from_le_bytes(self.read_array()?);
        Ok(())
    }

    #[inline]
    fn serialize_u32(&mut self, value: &mut u32) -> CodecResult<()> {
        *value = u32::from_le_bytes(self.read_array()?);
        Ok(())
    }

    #[inline]
    fn serialize_u64(&mut self, value: &mut u64) -> CodecResult<()> {
        *value = u64::from_le_bytes(self.read_array()?);
        Ok(())
    }

    fn serialize_string(&mut self, value: &mut String, max_len: usize) -> CodecResult<()> {
        let mut prefix = 0u16;
        self.serialize_u16(&mut prefix)?;
        let len = usize::from(prefix);
        if len > max_len {
            return Err(CodecError::StringTooLong { len, max: max_len });
        }
        let bytes = self.read_bytes(len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        value.clear();
        value.push_str(text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_little_endian() {
        let mut stream = WriteStream::new();
        stream.serialize_u16(&mut 0x0102).unwrap();
        stream.serialize_u64(&mut 42).unwrap();
        assert_eq!(&stream.as_slice()[..2], &[0x02, 0x01]);
        assert_eq!(&stream.as_slice()[2..10], &42u64.to_le_bytes());
    }

    #[test]
    fn test_same_routine_reads_back() {
        fn body<S: Stream>(stream: &mut S, id: &mut u64, t: &mut Transform) -> CodecResult<()> {
            stream.serialize_u64(id)?;
            stream.serialize_transform(t)
        }

        let mut id = 77u64;
        let mut transform = Transform::at(1.5, -2.0, 3.25);
        let mut writer = WriteStream::new();
        body(&mut writer, &mut id, &mut transform).unwrap();
        assert_eq!(writer.len(), 8 + 28);

        let mut read_id = 0u64;
        let mut read_transform = Transform::default();
        let mut reader = ReadStream::new(writer.as_slice());
        body(&mut reader, &mut read_id, &mut read_transform).unwrap();
        assert_eq!(read_id, 77);
        assert_eq!(read_transform, transform);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_truncated_read_fails() {
        let mut reader = ReadStream::new(&[1, 2, 3]);
        let mut value = 0u32;
        assert_eq!(
            reader.serialize_u32(&mut value),
            Err(CodecError::Truncated { needed: 4, remaining: 3 })
        );
    }

    #[test]
    fn test_string_bounds() {
        let mut writer = WriteStream::new();
        let mut long = "x".repeat(10);
        assert!(matches!(
            writer.serialize_string(&mut long, 4),
            Err(CodecError::StringTooLong { len: 10, max: 4 })
        ));

        let mut ok = "hey".to_string();
        writer.serialize_string(&mut ok, 4).unwrap();
        let mut reader = ReadStream::new(writer.as_slice());
        let mut out = String::new();
        // Reader enforces its own bound independently of the writer
        assert!(reader.serialize_string(&mut out, 2).is_err());
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let bytes = [2u8, 0, 0xff, 0xfe];
        let mut reader = ReadStream::new(&bytes);
        let mut out = String::new();
        assert_eq!(reader.serialize_string(&mut out, 8), Err(CodecError::InvalidUtf8));
    }

    #[test]
    fn test_buffer_full() {
        let mut writer = WriteStream::new();
        for _ in 0..MAX_PACKET_SIZE {
            writer.serialize_u8(&mut 0).unwrap();
        }
        assert!(matches!(writer.serialize_u8(&mut 0), Err(CodecError::BufferFull { .. })));
    }
}
