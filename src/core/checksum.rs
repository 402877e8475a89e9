//! 16-bit one's-complement checksum over raw buffers.
//!
//! Words are read big-endian. Carries out of bit 15 are folded back into the
//! low bits (end-around carry) and the final sum is complemented. A trailing
//! odd byte is not part of any word and does not contribute.
//!
//! Appending the checksum of an even-length buffer to that buffer yields a
//! buffer whose checksum is zero.

use crate::core::error::{CalvinError, Result};

/// Compute the one's-complement checksum of `data`.
pub fn ones_complement(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for word in data.chunks_exact(2) {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
        // Fold eagerly so the accumulator never overflows
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Append the big-endian checksum word of `buffer` to it.
pub fn append_checksum(buffer: &mut Vec<u8>) -> u16 {
    let checksum = ones_complement(buffer);
    buffer.extend_from_slice(&checksum.to_be_bytes());
    checksum
}

/// True when `data` (which already carries its checksum word) sums to zero.
pub fn verify(data: &[u8]) -> bool {
    ones_complement(data) == 0
}

/// Compare the checksum of `data` against a stored value.
pub fn verify_expected(data: &[u8], expected: u16) -> Result<()> {
    let actual = ones_complement(data);
    if actual != expected {
        return Err(CalvinError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer() {
        assert_eq!(ones_complement(&[]), 0xFFFF);
    }

    #[test]
    fn test_known_value() {
        // RFC 1071 sample words
        let data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7];
        assert_eq!(ones_complement(&data), 0x220D);
    }

    #[test]
    fn test_append_then_verify() {
        let mut buffer = b"calvin container".to_vec();
        append_checksum(&mut buffer);
        assert!(verify(&buffer));
        assert_eq!(ones_complement(&buffer), 0);
    }

    #[test]
    fn test_trailing_odd_byte_ignored() {
        let even = [0x12, 0x34, 0x56, 0x78];
        let odd = [0x12, 0x34, 0x56, 0x78, 0x9A];
        assert_eq!(ones_complement(&even), ones_complement(&odd));
    }

    #[test]
    fn test_carry_wraparound() {
        let data = [0xFF; 64];
        let mut buffer = data.to_vec();
        append_checksum(&mut buffer);
        assert!(verify(&buffer));
    }

    #[test]
    fn test_verify_expected_mismatch() {
        let data = [1, 2, 3, 4];
        let good = ones_complement(&data);
        assert!(verify_expected(&data, good).is_ok());
        assert!(matches!(
            verify_expected(&data, good ^ 1),
            Err(CalvinError::ChecksumMismatch { .. })
        ));
    }
}
