use std::{io, io::{Read, Seek, SeekFrom}};

use zerocopy::{FromBytes, IntoBytes};

/// Reads a plain-old-data structure from the current stream position.
pub fn read_from<T, R>(reader: &mut R) -> io::Result<T>
where
    T: FromBytes + IntoBytes,
    R: Read + ?Sized,
{
    let mut value = T::new_zeroed();
    reader.read_exact(value.as_mut_bytes())?;
    Ok(value)
}

/// Seeks to `offset` and reads a plain-old-data structure there.
pub fn read_at<T, R>(reader: &mut R, offset: u64) -> io::Result<T>
where
    T: FromBytes + IntoBytes,
    R: Read + Seek + ?Sized,
{
    reader.seek(SeekFrom::Start(offset))?;
    read_from(reader)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use zerocopy::little_endian::U32;

    use super::*;

    #[test]
    fn read_at_decodes_little_endian() {
        let data = [0u8, 0, 0, 0, 0x49, 0x56, 0x46, 0x43];
        let value: U32 = read_at(&mut Cursor::new(&data), 4).unwrap();
        assert_eq!(value.get(), 0x43465649);
        let magic: [u8; 4] = read_at(&mut Cursor::new(&data), 4).unwrap();
        assert_eq!(&magic, b"IVFC");
    }

    #[test]
    fn read_from_short_stream_is_eof() {
        let err = read_from::<[u8; 8], _>(&mut Cursor::new([1u8, 2, 3])).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
