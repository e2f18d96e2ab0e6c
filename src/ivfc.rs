use std::io::{Read, Seek};

use anyhow::{ensure, Context, Result};
use log::debug;
use thiserror::Error;
use zerocopy::{
    little_endian::{U32, U64},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

use crate::{read::read_at, static_assert};

pub const IVFC_MAGIC: [u8; 4] = *b"IVFC";

/// Number of hash levels in a RomFS IVFC tree.
pub const IVFC_LEVEL_COUNT: usize = 3;

pub const IVFC_HEADER_SIZE: usize = 0x60;

/// Largest block size exponent that still fits a `u32` block size.
pub const MAX_BLOCK_SIZE_LOG2: u32 = 31;

/// Reasons an image is rejected before anything is written to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error(
        "Expected IVFC header, found {0:x?}. Not a valid (possibly encrypted?) RomFS file."
    )]
    BadMagic([u8; 4]),
    #[error("Level {level} block size 2^{log2} is out of range")]
    BlockSizeOutOfRange { level: usize, log2: u32 },
    #[error("IVFC layout overflows while computing {what}")]
    LayoutOverflow { what: &'static str },
    #[error("IVFC {what} ends at {end:#x}, past the end of the {stream_len:#x}-byte image")]
    RegionPastEnd { what: &'static str, end: u64, stream_len: u64 },
}

/// IVFC level header.
#[derive(Clone, Debug, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct IvfcLevelHeader {
    pub logical_offset: U64,
    pub hash_data_size: U64,
    /// Block size as a power of two.
    pub block_size: U32,
    pub _reserved: U32,
}

static_assert!(size_of::<IvfcLevelHeader>() == 0x18);

impl IvfcLevelHeader {
    /// Returns the block size in bytes. `level` is only used for the error.
    pub fn block_size(&self, level: usize) -> Result<u32, FormatError> {
        let log2 = self.block_size.get();
        if log2 > MAX_BLOCK_SIZE_LOG2 {
            return Err(FormatError::BlockSizeOutOfRange { level, log2 });
        }
        Ok(1 << log2)
    }
}

/// RomFS IVFC header, located at the start of a decrypted RomFS image.
#[derive(Clone, Debug, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct IvfcHeader {
    pub magic: [u8; 4],
    pub version: U32,
    pub master_hash_size: U32,
    pub levels: [IvfcLevelHeader; IVFC_LEVEL_COUNT],
    pub _reserved: U32,
    pub optional_info_size: U32,
    pub _padding: U32,
}

static_assert!(size_of::<IvfcHeader>() == IVFC_HEADER_SIZE);

/// Reads and checks the IVFC header at the start of `reader`.
///
/// The magic is checked on its own first, so a foreign or encrypted image is
/// reported as a [`FormatError`] even when it is shorter than a full header.
pub fn read_ivfc_header<R>(reader: &mut R) -> Result<IvfcHeader>
where R: Read + Seek + ?Sized {
    let magic: [u8; 4] = read_at(reader, 0).context("Failed to read IVFC magic")?;
    ensure!(magic == IVFC_MAGIC, FormatError::BadMagic(magic));

    let header: IvfcHeader = read_at(reader, 0).context("Failed to read IVFC header")?;
    debug!(
        "IVFC header: version {:#x}, master hash size {:#x}",
        header.version.get(),
        header.master_hash_size.get()
    );
    for (idx, level) in header.levels.iter().enumerate() {
        debug!(
            "IVFC level header #{idx}: logical offset {:#018x}, hash data size {:#018x}, \
             block size 2^{}",
            level.logical_offset.get(),
            level.hash_data_size.get(),
            level.block_size.get()
        );
    }
    Ok(header)
}
