use std::{
    io,
    io::{Read, Seek, SeekFrom, Write},
};

use sha2::{Digest as _, Sha256};
use zerocopy::{FromZeros, IntoBytes};

use crate::{
    layout::LevelGeometry,
    util::{align_up, RegionReader},
};

pub const DIGEST_SIZE: usize = 0x20;

/// The root digest covers offset 0 up to the master hash size rounded to this.
pub const MASTER_REGION_ALIGN: u64 = 0x200;

pub type Digest = [u8; DIGEST_SIZE];

/// SHA-256 of a single block. Every call starts from a fresh hasher.
#[inline]
pub fn sha256(data: &[u8]) -> Digest { Sha256::digest(data).into() }

/// Largest read made at once while hashing; blocks bigger than this are
/// hashed in pieces.
const READ_CHUNK_SIZE: u64 = 0x10000;

/// Cap on digests reserved up front. The count comes from the image header.
const MAX_PREALLOCATED_DIGESTS: u64 = 0x10000;

fn new_buffer(size: u64) -> io::Result<Box<[u8]>> {
    let size = usize::try_from(size).map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
    <[u8]>::new_box_zeroed_with_elems(size).map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))
}

/// Hashes the next `size` bytes of `region` with a fresh hasher, reading at
/// most `buf.len()` bytes at a time.
fn hash_next<T>(region: &mut RegionReader<T>, size: u64, buf: &mut [u8]) -> io::Result<Digest>
where T: Read + Seek {
    let mut hasher = Sha256::new();
    let mut left = size;
    while left > 0 {
        let len = left.min(buf.len() as u64) as usize;
        region.read_block(&mut buf[..len])?;
        hasher.update(&buf[..len]);
        left -= len as u64;
    }
    Ok(hasher.finalize().into())
}

/// Hashes the data region of `level` one block at a time.
///
/// Always hashes whole blocks. Bytes past the end of the stream count as zero.
pub fn hash_blocks<R>(reader: &mut R, level: &LevelGeometry) -> io::Result<Vec<Digest>>
where R: Read + Seek + ?Sized {
    let block_size = level.hash_block_size as u64;
    let block_count = level.block_count();
    let region_size = block_count.checked_mul(block_size).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "Level data region overflows u64")
    })?;
    let mut region = RegionReader::new(&mut *reader, level.data_offset, region_size)?;
    let mut buf = new_buffer(block_size.min(READ_CHUNK_SIZE))?;
    let mut digests = Vec::with_capacity(block_count.min(MAX_PREALLOCATED_DIGESTS) as usize);
    for _ in 0..block_count {
        digests.push(hash_next(&mut region, block_size, &mut buf)?);
    }
    Ok(digests)
}

/// Writes `digests` back to back starting at `offset`.
pub fn write_digests<W>(writer: &mut W, offset: u64, digests: &[Digest]) -> io::Result<()>
where W: Write + Seek + ?Sized {
    writer.seek(SeekFrom::Start(offset))?;
    writer.write_all(digests.as_bytes())
}

/// Recomputes one level's hash table and overwrites it in place.
///
/// Lower levels read the table written here, so levels must be rebuilt from
/// 2 down to 0.
pub fn rehash_level<S>(stream: &mut S, level: &LevelGeometry) -> io::Result<Vec<Digest>>
where S: Read + Write + Seek + ?Sized {
    let digests = hash_blocks(stream, level)?;
    write_digests(stream, level.hash_offset, &digests)?;
    Ok(digests)
}

/// Hashes the IVFC header and master hash region into the root digest.
pub fn root_digest<R>(reader: &mut R, master_hash_size: u32) -> io::Result<Digest>
where R: Read + Seek + ?Sized {
    let size = align_up(master_hash_size as u64, MASTER_REGION_ALIGN);
    let mut region = RegionReader::new(&mut *reader, 0, size)?;
    let mut buf = new_buffer(size.min(READ_CHUNK_SIZE))?;
    hash_next(&mut region, size, &mut buf)
}

/// Formats a digest as uppercase hex byte pairs separated by spaces.
pub fn format_digest(digest: &Digest) -> String {
    let encoded = hex::encode_upper(digest);
    let mut out = String::with_capacity(DIGEST_SIZE * 3);
    for (idx, c) in encoded.chars().enumerate() {
        if idx > 0 && idx % 2 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}
