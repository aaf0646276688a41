//! Payload bit streams.
//!
//! Bytes expand MSB-first into one `u8` (0 or 1) per bit. Two framings sit on
//! top of the raw stream:
//!
//! - length-prefixed: a 16-bit big-endian byte count, then the payload bits
//!   (frequency and wavelet embedders)
//! - sentinel-terminated: the payload bits, then `0b11111110` (spatial embedder)
//!
//! Every embedder and extractor must walk the stream in exactly this order.

use byteorder::{BigEndian, ByteOrder};

use crate::config;
use crate::error::{Result, StegoError};

/// An ordered sequence of bits, one per element, each `0` or `1`.
pub type BitStream = Vec<u8>;

/// Expand bytes into bits, MSB first.
pub fn to_bits(bytes: &[u8]) -> BitStream {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for bit_pos in (0..8).rev() {
            bits.push((byte >> bit_pos) & 1);
        }
    }
    bits
}

/// Pack bits back into bytes, MSB first. A trailing partial byte is zero-padded.
pub fn from_bits(bits: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        bytes[i / 8] |= (bit & 1) << (7 - (i % 8));
    }
    bytes
}

/// Prepend the 16-bit big-endian length header to `payload` and expand to bits.
pub fn with_length_header(payload: &[u8]) -> Result<BitStream> {
    if payload.len() > config::MAX_PAYLOAD_BYTES {
        return Err(StegoError::PayloadTooLarge {
            required_bits: payload.len() * 8,
            capacity_bits: config::MAX_PAYLOAD_BYTES * 8,
        });
    }

    let mut header = [0u8; 2];
    BigEndian::write_u16(&mut header, payload.len() as u16);

    let mut bits = to_bits(&header);
    bits.extend(to_bits(payload));
    Ok(bits)
}

/// Expand `payload` to bits and append the 8-bit sentinel terminator.
pub fn with_sentinel(payload: &[u8]) -> BitStream {
    let mut bits = to_bits(payload);
    bits.extend(to_bits(&[config::SENTINEL]));
    bits
}

/// Read the 16-bit length header from the front of a bit stream.
pub fn read_length_header(bits: &[u8]) -> Option<usize> {
    if bits.len() < config::LENGTH_HEADER_BITS {
        return None;
    }
    let header = from_bits(&bits[..config::LENGTH_HEADER_BITS]);
    Some(BigEndian::read_u16(&header) as usize)
}

/// Collect bytes from a bit stream until the sentinel byte.
///
/// Returns `None` when the sentinel never appears on a byte boundary.
pub fn take_until_sentinel(bits: impl IntoIterator<Item = u8>) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut byte = 0u8;
    let mut filled = 0;

    for bit in bits {
        byte = (byte << 1) | (bit & 1);
        filled += 1;
        if filled == 8 {
            if byte == config::SENTINEL {
                return Some(out);
            }
            out.push(byte);
            byte = 0;
            filled = 0;
        }
    }

    None
}

/// True for printable ASCII (32..=126) and TAB, LF, CR.
pub fn is_printable(byte: u8) -> bool {
    (32..=126).contains(&byte) || matches!(byte, b'\t' | b'\n' | b'\r')
}

/// Interpret `bytes` as text, rejecting anything outside the printable set.
pub fn printable_text(bytes: &[u8]) -> Option<String> {
    if bytes.iter().all(|&b| is_printable(b)) {
        // Printable ASCII is always valid UTF-8.
        String::from_utf8(bytes.to_vec()).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bits_msb_first() {
        assert_eq!(to_bits(&[0b1010_0001]), vec![1, 0, 1, 0, 0, 0, 0, 1]);
        assert_eq!(from_bits(&to_bits(b"Hi")), b"Hi".to_vec());
    }

    #[test]
    fn test_from_bits_pads_trailing() {
        assert_eq!(from_bits(&[1, 1, 1]), vec![0b1110_0000]);
        assert!(from_bits(&[]).is_empty());
    }

    #[test]
    fn test_length_header_big_endian() {
        let payload = vec![0x41u8; 258];
        let bits = with_length_header(&payload).unwrap();
        assert_eq!(bits.len(), 16 + 258 * 8);
        // 258 = 0x0102
        assert_eq!(from_bits(&bits[..16]), vec![0x01, 0x02]);
        assert_eq!(read_length_header(&bits), Some(258));
    }

    #[test]
    fn test_length_header_rejects_oversized() {
        let payload = vec![0u8; config::MAX_PAYLOAD_BYTES + 1];
        assert!(matches!(
            with_length_header(&payload),
            Err(StegoError::PayloadTooLarge { .. })
        ));
        assert!(with_length_header(&payload[1..]).is_ok());
    }

    #[test]
    fn test_sentinel_framing() {
        let bits = with_sentinel(b"Hi");
        assert_eq!(&bits[16..], &[1, 1, 1, 1, 1, 1, 1, 0]);
        assert_eq!(take_until_sentinel(bits), Some(b"Hi".to_vec()));
    }

    #[test]
    fn test_missing_sentinel() {
        assert_eq!(take_until_sentinel(to_bits(b"abc")), None);
    }

    #[test]
    fn test_embedded_sentinel_truncates() {
        // A 0xFE inside the message ends the frame early.
        let bits = with_sentinel(&[b'a', config::SENTINEL, b'b']);
        assert_eq!(take_until_sentinel(bits), Some(b"a".to_vec()));
    }

    #[test]
    fn test_printable_text() {
        assert_eq!(printable_text(b"Hello\tWorld\r\n").as_deref(), Some("Hello\tWorld\r\n"));
        assert_eq!(printable_text(&[b'o', b'k', 0x07]), None);
        assert_eq!(printable_text(&[0xC3, 0xA9]), None);
    }
}
