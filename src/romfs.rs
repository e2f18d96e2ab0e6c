use std::io::{self, Read, Seek};

use anyhow::{ensure, Context, Result};
use zerocopy::{little_endian::U32, FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{read::read_at, static_assert};

/// RomFS level 3 header.
#[derive(Clone, Debug, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct RomFsHeader {
    pub header_size: U32,
    pub dir_hash_table_offset: U32,
    pub dir_hash_table_size: U32,
    pub dir_meta_table_offset: U32,
    pub dir_meta_table_size: U32,
    pub file_hash_table_offset: U32,
    pub file_hash_table_size: U32,
    pub file_meta_table_offset: U32,
    pub file_meta_table_size: U32,
    pub file_data_offset: U32,
}

static_assert!(size_of::<RomFsHeader>() == 0x28);

impl RomFsHeader {
    pub fn verify(&self) -> Result<()> {
        ensure!(
            self.header_size.get() == size_of::<RomFsHeader>() as u32,
            "Invalid RomFS header size: {:#x}",
            self.header_size.get()
        );
        Ok(())
    }
}

/// Reads the RomFS header at `offset`, the start of the IVFC body (0x1000 in
/// images with 0x1000-byte blocks), or `None` if the image ends before it.
///
/// Only used as a sanity check; the hash tree layout never depends on it.
pub fn read_romfs_header<R>(reader: &mut R, offset: u64) -> Result<Option<RomFsHeader>>
where R: Read + Seek + ?Sized {
    match read_at::<RomFsHeader, _>(reader, offset) {
        Ok(header) => Ok(Some(header)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e).context("Failed to read RomFS header"),
    }
}
