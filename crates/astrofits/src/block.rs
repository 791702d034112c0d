use alloc::vec::Vec;

/// Size of a FITS logical record in bytes.
pub const BLOCK_SIZE: usize = 2880;

/// Size of one header card in bytes.
pub const CARD_SIZE: usize = 80;

/// Number of cards in one header record.
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Fill byte for header records and ASCII table data.
pub const SPACE_FILL: u8 = b' ';

/// Fill byte for image and binary table data.
pub const ZERO_FILL: u8 = 0x00;

/// Number of logical records needed to hold `num_bytes` bytes.
///
/// Zero bytes need zero records; 1..=2880 bytes need one.
pub const fn blocks_needed(num_bytes: usize) -> usize {
    if num_bytes == 0 {
        return 0;
    }
    num_bytes.div_ceil(BLOCK_SIZE)
}

/// Length of `num_bytes` rounded up to whole logical records.
pub const fn padded_byte_len(num_bytes: usize) -> usize {
    blocks_needed(num_bytes) * BLOCK_SIZE
}

/// Pad `out` with `fill` until its length is a multiple of [`BLOCK_SIZE`].
///
/// Returns the number of fill bytes appended.
pub fn pad_to_block(out: &mut Vec<u8>, fill: u8) -> usize {
    let target = padded_byte_len(out.len());
    let added = target - out.len();
    out.resize(target, fill);
    added
}
