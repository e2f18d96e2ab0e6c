//! Synthetic RomFS images for tests.

use zerocopy::{
    little_endian::{U32, U64},
    FromZeros, IntoBytes,
};

use crate::{
    hash::DIGEST_SIZE,
    ivfc::{IvfcHeader, IVFC_MAGIC},
    layout::MASTER_HASH_OFFSET,
    util::align_up,
};

/// Builds an IVFC header from `(logical_offset, hash_data_size, block_size_log2)` per level.
pub fn synthetic_header(master_hash_size: u32, levels: [(u64, u64, u32); 3]) -> IvfcHeader {
    let mut header = IvfcHeader::new_zeroed();
    header.magic = IVFC_MAGIC;
    header.version = U32::new(0x10000);
    header.master_hash_size = U32::new(master_hash_size);
    for (level, (logical_offset, hash_data_size, block_size)) in header.levels.iter_mut().zip(levels)
    {
        level.logical_offset = U64::new(logical_offset);
        level.hash_data_size = U64::new(hash_data_size);
        level.block_size = U32::new(block_size);
    }
    header
}

/// A self-consistent image: every level's hash table exactly fits the data
/// region of the level below it, like a real RomFS.
pub struct SyntheticImage {
    pub header: IvfcHeader,
    pub body_offset: u64,
    pub data: Vec<u8>,
}

impl SyntheticImage {
    /// Builds an image around `body` with every level using `2^block_size_log2` blocks.
    /// All hash regions are left zeroed.
    pub fn new(body: &[u8], block_size_log2: u32) -> Self {
        let block_size = 1u64 << block_size_log2;
        let hash_table_size = |data_size: u64| data_size / block_size * DIGEST_SIZE as u64;

        let body_size = body.len() as u64;
        let level2_data = align_up(body_size, block_size);
        let level1_hash_data = hash_table_size(level2_data);
        let level1_data = align_up(level1_hash_data, block_size);
        let level0_hash_data = hash_table_size(level1_data);
        let level0_data = align_up(level0_hash_data, block_size);
        let master_hash_size = hash_table_size(level0_data);

        let header = synthetic_header(master_hash_size as u32, [
            (0, level0_hash_data, block_size_log2),
            (level0_data, level1_hash_data, block_size_log2),
            (level0_data + level1_data, body_size, block_size_log2),
        ]);

        let body_offset = align_up(MASTER_HASH_OFFSET + master_hash_size, block_size);
        let level1_hash_offset = align_up(body_offset + body_size, block_size);
        let total = level1_hash_offset + level0_data + level1_data;

        let mut data = vec![0u8; total as usize];
        data[..header.as_bytes().len()].copy_from_slice(header.as_bytes());
        data[body_offset as usize..(body_offset + body_size) as usize].copy_from_slice(body);
        Self { header, body_offset, data }
    }
}

/// Deterministic, non-repeating body bytes.
pub fn patterned_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u32).wrapping_mul(2654435761).to_le_bytes()[1]).collect()
}
