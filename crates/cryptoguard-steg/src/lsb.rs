//! Bit-level access to the low bit of a channel-byte buffer.

/// Write `data` MSB-first into the low bits of `channels`, starting at
/// channel byte `offset`. The caller has checked capacity.
pub(crate) fn write_bits(channels: &mut [u8], offset: usize, data: &[u8]) {
    let bits = data
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1));
    for (slot, bit) in channels[offset..].iter_mut().zip(bits) {
        *slot = (*slot & 0xFE) | bit;
    }
}

/// Read `len` bytes from the low bits of `channels`, starting at channel
/// byte `offset`. The caller has checked that enough channel bytes exist.
pub(crate) fn read_bytes(channels: &[u8], offset: usize, len: usize) -> Vec<u8> {
    channels[offset..offset + len * 8]
        .chunks_exact(8)
        .map(|group| group.iter().fold(0u8, |acc, c| (acc << 1) | (c & 1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_first() {
        let mut channels = [0u8; 8];
        write_bits(&mut channels, 0, &[0b1010_0001]);
        assert_eq!(channels, [1, 0, 1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_only_low_bit_changes() {
        let mut channels = [0xFFu8; 16];
        write_bits(&mut channels, 0, &[0x00, 0xFF]);
        assert!(channels[..8].iter().all(|&c| c == 0xFE));
        assert!(channels[8..].iter().all(|&c| c == 0xFF));
    }

    #[test]
    fn test_write_read_at_offset() {
        let mut channels = vec![0x80u8; 40];
        write_bits(&mut channels, 8, b"hi");
        assert_eq!(read_bytes(&channels, 8, 2), b"hi");
        // Untouched before the offset
        assert!(channels[..8].iter().all(|&c| c == 0x80));
    }
}
