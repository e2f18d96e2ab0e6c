use std::{
    io,
    io::{Read, Seek, SeekFrom, Write},
};

/// Buffers writes in memory on top of a read-only view of a stream.
///
/// Reads see the underlying stream with every staged write applied, in the
/// order the writes were made. Nothing reaches the underlying stream until
/// [`OverlayStream::commit`]; dropping the overlay discards all staged writes.
pub struct OverlayStream<T> {
    inner: T,
    writes: Vec<(u64, Vec<u8>)>,
    position: u64,
}

impl<T> OverlayStream<T>
where T: Read + Seek
{
    pub fn new(inner: T) -> Self { Self { inner, writes: Vec::new(), position: 0 } }

    /// Total number of bytes staged so far.
    pub fn staged_len(&self) -> usize { self.writes.iter().map(|(_, data)| data.len()).sum() }

    fn staged_end(&self) -> u64 {
        self.writes.iter().map(|(offset, data)| offset + data.len() as u64).max().unwrap_or(0)
    }
}

impl<T> OverlayStream<T>
where T: Read + Write + Seek
{
    /// Applies all staged writes to the underlying stream, in order, and flushes it.
    pub fn commit(mut self) -> io::Result<T> {
        for (offset, data) in &self.writes {
            self.inner.seek(SeekFrom::Start(*offset))?;
            self.inner.write_all(data)?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<T> Read for OverlayStream<T>
where T: Read + Seek
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.position;
        let end = start.saturating_add(buf.len() as u64);

        self.inner.seek(SeekFrom::Start(start))?;
        let mut len = 0;
        while len < buf.len() {
            let read = self.inner.read(&mut buf[len..])?;
            if read == 0 {
                break;
            }
            len += read;
        }
        // Staged writes may reach past the end of the underlying stream;
        // any gap before them reads as zeros.
        buf[len..].fill(0);
        let staged_end = self.staged_end();
        if staged_end > start {
            len = len.max((staged_end.min(end) - start) as usize);
        }

        for (offset, data) in &self.writes {
            let write_end = offset + data.len() as u64;
            if *offset >= end || write_end <= start {
                continue;
            }
            let from = (*offset).max(start);
            let to = write_end.min(end);
            buf[(from - start) as usize..(to - start) as usize]
                .copy_from_slice(&data[(from - offset) as usize..(to - offset) as usize]);
        }

        self.position += len as u64;
        Ok(len)
    }
}

impl<T> Write for OverlayStream<T>
where T: Read + Seek
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.writes.push((self.position, buf.to_vec()));
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl<T> Seek for OverlayStream<T>
where T: Read + Seek
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let position = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(p) => {
                let base_end = self.inner.seek(SeekFrom::End(0))?;
                base_end.max(self.staged_end()).checked_add_signed(p)
            }
            SeekFrom::Current(p) => self.position.checked_add_signed(p),
        };
        self.position = position.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Invalid seek to a negative position")
        })?;
        Ok(self.position)
    }

    fn stream_position(&mut self) -> io::Result<u64> { Ok(self.position) }
}
