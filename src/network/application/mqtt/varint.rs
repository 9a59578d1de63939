//! The MQTT "Remaining Length" variable-length integer.
//!
//! Seven value bits per byte, least significant group first, with bit 7 as a
//! continuation flag. At most four bytes are allowed, which caps the value at
//! 268,435,455.

use super::cursor::Reader;
use super::error::Error;

/// Largest value a four-byte remaining length can carry.
pub const MAX_REMAINING_LENGTH: u32 = 268_435_455;

/// Encodes `value` into `out` and returns the number of bytes used (1 to 4).
///
/// Values above [`MAX_REMAINING_LENGTH`] are rejected with
/// [`Error::EncodingOverflow`] instead of being truncated.
///
/// ```rust
/// use smartled_mqtt::network::application::mqtt::encode_remaining_length;
///
/// let mut out = [0u8; 4];
/// assert_eq!(encode_remaining_length(321, &mut out), Ok(2));
/// assert_eq!(&out[..2], &[0xC1, 0x02]);
/// ```
pub fn encode_remaining_length(mut value: u32, out: &mut [u8; 4]) -> Result<usize, Error> {
    if value > MAX_REMAINING_LENGTH {
        return Err(Error::EncodingOverflow);
    }
    let mut len = 0;
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        out[len] = byte;
        len += 1;
        if value == 0 {
            return Ok(len);
        }
    }
}

/// Decodes a remaining length at the reader's position.
///
/// A fourth byte that still has its continuation bit set makes the encoding
/// [`Error::MalformedPacket`]; running out of input is [`Error::OutOfBounds`].
pub fn decode_remaining_length(reader: &mut Reader<'_>) -> Result<u32, Error> {
    let mut value: u32 = 0;
    let mut multiplier: u32 = 1;
    for _ in 0..4 {
        let byte = reader.read_u8()?;
        value += u32::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        multiplier *= 128;
    }
    Err(Error::MalformedPacket)
}

/// Number of bytes [`encode_remaining_length`] emits for `value`.
pub const fn encoded_len(value: u32) -> usize {
    match value {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    }
}
