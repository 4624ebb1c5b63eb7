//! FITS 2880-byte block constants and padding arithmetic.
//!
//! Every header and data area in a FITS stream occupies a whole number of
//! 2880-byte blocks; headers are padded with ASCII spaces, data areas with
//! zero bytes.

/// FITS block size in bytes.
pub const BLOCK_SIZE: usize = 2880;

/// FITS header card size in bytes.
pub const CARD_SIZE: usize = 80;

/// Number of cards in a single block.
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Padding byte for header blocks (ASCII space).
pub const HEADER_PAD_BYTE: u8 = b' ';

/// Padding byte for data blocks.
pub const DATA_PAD_BYTE: u8 = 0x00;

/// Number of whole blocks required to hold `num_bytes` bytes.
pub const fn blocks_needed(num_bytes: u64) -> u64 {
    num_bytes.div_ceil(BLOCK_SIZE as u64)
}

/// Total byte length, rounded up to a whole number of blocks.
pub const fn padded_byte_len(num_bytes: u64) -> u64 {
    blocks_needed(num_bytes) * BLOCK_SIZE as u64
}

/// Number of padding bytes needed to reach the next block boundary.
///
/// Zero when `num_bytes` is already block-aligned.
pub const fn padding_len(num_bytes: u64) -> usize {
    (padded_byte_len(num_bytes) - num_bytes) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_relationships() {
        assert_eq!(BLOCK_SIZE, 2880);
        assert_eq!(CARD_SIZE, 80);
        assert_eq!(CARDS_PER_BLOCK, 36);
        assert_eq!(CARDS_PER_BLOCK * CARD_SIZE, BLOCK_SIZE);
    }

    #[test]
    fn blocks_needed_boundaries() {
        assert_eq!(blocks_needed(0), 0);
        assert_eq!(blocks_needed(1), 1);
        assert_eq!(blocks_needed(2879), 1);
        assert_eq!(blocks_needed(2880), 1);
        assert_eq!(blocks_needed(2881), 2);
        assert_eq!(blocks_needed(5760), 2);
    }

    #[test]
    fn padded_byte_len_boundaries() {
        assert_eq!(padded_byte_len(0), 0);
        assert_eq!(padded_byte_len(100), 2880);
        assert_eq!(padded_byte_len(2880), 2880);
        assert_eq!(padded_byte_len(2881), 5760);
    }

    #[test]
    fn padding_len_boundaries() {
        assert_eq!(padding_len(0), 0);
        assert_eq!(padding_len(2880), 0);
        assert_eq!(padding_len(2879), 1);
        assert_eq!(padding_len(1), 2879);
        assert_eq!(padding_len(2881), 2879);
    }
}
