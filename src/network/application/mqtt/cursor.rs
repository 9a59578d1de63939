//! Bounds-checked byte cursors used by the packet codec.
//!
//! [`Reader`] walks an untrusted input slice and refuses every read that would
//! cross its end. [`Writer`] appends big-endian fields to a fixed-capacity
//! packet buffer and finally prepends the fixed header in place.

use heapless::{String, Vec};

use super::error::Error;
use super::packet::PacketBuffer;
use super::varint::encode_remaining_length;

/// Sequential reader over a borrowed byte slice.
///
/// Any read that needs more bytes than remain fails with
/// [`Error::OutOfBounds`]; the position is then unspecified and the decode
/// must be abandoned.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader positioned at the start of `buf`.
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes consumed so far.
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left before the end of the buffer.
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Reads exactly `n` bytes and returns them as a sub-slice.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self.pos.checked_add(n).ok_or(Error::OutOfBounds)?;
        let bytes = self.buf.get(self.pos..end).ok_or(Error::OutOfBounds)?;
        self.pos = end;
        Ok(bytes)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    /// Reads a big-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, Error> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a `u16` length prefix followed by that many bytes.
    pub fn read_prefixed(&mut self) -> Result<&'a [u8], Error> {
        let len = self.read_u16()?;
        self.read_bytes(usize::from(len))
    }

    /// Reads a length-prefixed UTF-8 string into an owned `String<N>`.
    ///
    /// Invalid UTF-8 is [`Error::MalformedPacket`]; a string longer than `N`
    /// is [`Error::FailedAlloc`].
    pub fn read_str<const N: usize>(&mut self) -> Result<String<N>, Error> {
        let bytes = self.read_prefixed()?;
        let s = core::str::from_utf8(bytes).map_err(|_| Error::MalformedPacket)?;
        String::try_from(s).map_err(|_| Error::FailedAlloc)
    }

    /// Reads length-prefixed binary data into an owned `Vec<u8, N>`.
    pub fn read_binary<const N: usize>(&mut self) -> Result<Vec<u8, N>, Error> {
        let bytes = self.read_prefixed()?;
        Vec::from_slice(bytes).map_err(|_| Error::FailedAlloc)
    }
}

/// Append-only packet builder.
///
/// The variable header and payload are written first; [`Writer::finish`]
/// then shifts them right and writes the fixed header in front, so a packet
/// is assembled in a single buffer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: PacketBuffer,
}

impl Writer {
    /// Creates an empty writer.
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends raw bytes. On overflow nothing is appended.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.buf
            .extend_from_slice(bytes)
            .map_err(|_| Error::FailedAlloc)
    }

    /// Appends one byte.
    pub fn write_u8(&mut self, value: u8) -> Result<(), Error> {
        self.buf.push(value).map_err(|_| Error::FailedAlloc)
    }

    /// Appends a big-endian `u16`.
    pub fn write_u16(&mut self, value: u16) -> Result<(), Error> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Appends a big-endian `u32`.
    pub fn write_u32(&mut self, value: u32) -> Result<(), Error> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Appends a `u16` length prefix followed by `bytes`.
    pub fn write_prefixed(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let len = u16::try_from(bytes.len()).map_err(|_| Error::MalformedPacket)?;
        if self.buf.capacity() - self.buf.len() < 2 + bytes.len() {
            return Err(Error::FailedAlloc);
        }
        self.write_u16(len)?;
        self.write_bytes(bytes)
    }

    /// Appends a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, s: &str) -> Result<(), Error> {
        self.write_prefixed(s.as_bytes())
    }

    /// Prepends the fixed header and returns the finished packet.
    ///
    /// `header` is the first byte (type nibble and flags); the remaining
    /// length is the number of bytes written so far.
    pub fn finish(mut self, header: u8) -> Result<PacketBuffer, Error> {
        let body_len = self.buf.len();
        let remaining = u32::try_from(body_len).map_err(|_| Error::EncodingOverflow)?;
        let mut len_bytes = [0u8; 4];
        let len_size = encode_remaining_length(remaining, &mut len_bytes)?;
        let header_len = 1 + len_size;

        self.buf
            .resize(body_len + header_len, 0)
            .map_err(|_| Error::FailedAlloc)?;
        self.buf.copy_within(0..body_len, header_len);
        self.buf[0] = header;
        self.buf[1..header_len].copy_from_slice(&len_bytes[..len_size]);
        Ok(self.buf)
    }
}
