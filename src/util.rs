use std::{io, io::{Read, Seek, SeekFrom}};

/// Compile-time assertion.
#[macro_export]
macro_rules! static_assert {
    ($condition:expr) => {
        const _: () = core::assert!($condition);
    };
}

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two.
#[inline]
pub const fn align_up(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}

/// Like [`align_up`], but returns `None` instead of overflowing.
#[inline]
pub const fn checked_align_up(value: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// A read stream confined to one region of an underlying stream.
pub struct RegionReader<T>
where T: Read + Seek
{
    base: T,
    pos: u64,
    end: u64,
}

impl<T> RegionReader<T>
where T: Read + Seek
{
    /// Creates a new region reader with offset and size.
    ///
    /// Seeks underlying stream immediately.
    pub fn new(mut base: T, offset: u64, size: u64) -> io::Result<Self> {
        let end = offset.checked_add(size).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Region extends past the end of u64")
        })?;
        base.seek(SeekFrom::Start(offset))?;
        Ok(Self { base, pos: offset, end })
    }

    /// Returns the number of bytes left in the region.
    #[inline]
    pub fn remaining(&self) -> u64 { self.end - self.pos }

    /// Fills `block` from the region. Whatever the underlying stream can't
    /// supply is zeroed. Returns the number of bytes actually read.
    pub fn read_block(&mut self, block: &mut [u8]) -> io::Result<usize> {
        let mut read = 0;
        while read < block.len() {
            let len = self.read(&mut block[read..])?;
            if len == 0 {
                break;
            }
            read += len;
        }
        block[read..].fill(0);
        Ok(read)
    }
}

impl<T> Read for RegionReader<T>
where T: Read + Seek
{
    #[inline]
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let len = (out.len() as u64).min(self.remaining()) as usize;
        if len == 0 {
            return Ok(0);
        }
        let len = self.base.read(&mut out[..len])?;
        self.pos += len as u64;
        Ok(len)
    }
}
