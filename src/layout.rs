use std::fmt::{Display, Formatter};

use crate::{
    hash::{DIGEST_SIZE, MASTER_REGION_ALIGN},
    ivfc::{FormatError, IvfcHeader, IVFC_LEVEL_COUNT},
    util::{align_up, checked_align_up},
};

/// Offset of the master hash region (level 0's hash table).
pub const MASTER_HASH_OFFSET: u64 = 0x60;

/// Physical placement of one IVFC level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LevelGeometry {
    pub data_offset: u64,
    pub data_size: u64,
    pub hash_offset: u64,
    pub hash_block_size: u32,
}

impl LevelGeometry {
    /// Number of blocks hashed, and therefore digests written.
    #[inline]
    pub fn block_count(&self) -> u64 { self.data_size.div_ceil(self.hash_block_size as u64) }

    /// Size of the hash table this level writes, or `None` if it doesn't fit a `u64`.
    #[inline]
    pub fn hash_size(&self) -> Option<u64> { self.block_count().checked_mul(DIGEST_SIZE as u64) }
}

impl Display for LevelGeometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "data offset {:#018x}, data size {:#018x}, hash offset {:#018x}, block size {:#010x}",
            self.data_offset, self.data_size, self.hash_offset, self.hash_block_size
        )
    }
}

/// Physical layout of the whole hash tree, derived from the IVFC header.
///
/// Level 2 covers the RomFS body. Each lower level hashes the hash table
/// written by the level above it, so `levels[1].data_offset` is
/// `levels[2].hash_offset` and `levels[0].data_offset` is
/// `levels[1].hash_offset`. Level 0's hash table is the master hash region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IvfcLayout {
    pub master_hash_size: u32,
    pub levels: [LevelGeometry; IVFC_LEVEL_COUNT],
}

impl IvfcLayout {
    pub fn from_header(header: &IvfcHeader) -> Result<Self, FormatError> {
        let desc = &header.levels;
        let master_hash_size = header.master_hash_size.get();
        let block_size =
            [desc[0].block_size(0)?, desc[1].block_size(1)?, desc[2].block_size(2)?];
        let align = |value: u64, level: usize, what: &'static str| {
            checked_align_up(value, block_size[level] as u64)
                .ok_or(FormatError::LayoutOverflow { what })
        };
        let overflow = |what: &'static str| FormatError::LayoutOverflow { what };

        let body_offset = align(MASTER_HASH_OFFSET + master_hash_size as u64, 2, "body offset")?;
        let body_size = desc[2].hash_data_size.get();
        let body_end = body_offset.checked_add(body_size).ok_or(overflow("body end"))?;

        let level1_hash_offset = align(body_end, 2, "level 1 hash offset")?;
        // The logical offsets carry the padding between the level 0 and level 1
        // data regions; subtraction last so only the final result must fit.
        let level2_hash_offset = level1_hash_offset
            .checked_add(desc[1].logical_offset.get())
            .and_then(|v| v.checked_sub(desc[0].logical_offset.get()))
            .ok_or(overflow("level 2 hash offset"))?;

        let levels = [
            LevelGeometry {
                data_offset: level1_hash_offset,
                data_size: align(desc[0].hash_data_size.get(), 0, "level 0 data size")?,
                hash_offset: MASTER_HASH_OFFSET,
                hash_block_size: block_size[0],
            },
            LevelGeometry {
                data_offset: level2_hash_offset,
                data_size: align(desc[1].hash_data_size.get(), 1, "level 1 data size")?,
                hash_offset: level1_hash_offset,
                hash_block_size: block_size[1],
            },
            LevelGeometry {
                data_offset: body_offset,
                data_size: align(body_size, 2, "level 2 data size")?,
                hash_offset: level2_hash_offset,
                hash_block_size: block_size[2],
            },
        ];
        for (level, what) in
            levels.iter().zip(["level 0 extent", "level 1 extent", "level 2 extent"])
        {
            level.data_offset.checked_add(level.data_size).ok_or(overflow(what))?;
            level
                .hash_size()
                .and_then(|size| level.hash_offset.checked_add(size))
                .ok_or(overflow(what))?;
        }
        Ok(Self { master_hash_size, levels })
    }

    /// Size of the region hashed into the root digest, starting at offset 0.
    #[inline]
    pub fn master_region_size(&self) -> u64 {
        align_up(self.master_hash_size as u64, MASTER_REGION_ALIGN)
    }

    /// Checks that no region this layout reads ends more than one block past
    /// the end of a stream of `stream_len` bytes. Levels are checked body first.
    pub fn check_within(&self, stream_len: u64) -> Result<(), FormatError> {
        let master_end = self.master_region_size();
        if master_end > stream_len.saturating_add(MASTER_REGION_ALIGN) {
            return Err(FormatError::RegionPastEnd {
                what: "master hash region",
                end: master_end,
                stream_len,
            });
        }
        for (level, what) in
            self.levels.iter().zip(["level 0 data", "level 1 data", "level 2 data"]).rev()
        {
            // Extents were checked in `from_header`.
            let end = level.data_offset + level.data_size;
            if end > stream_len.saturating_add(level.hash_block_size as u64) {
                return Err(FormatError::RegionPastEnd { what, end, stream_len });
            }
        }
        Ok(())
    }
}
