//! Bounded window over another stream

use std::io::{self, Read, Seek, SeekFrom};

/// `Read + Seek` adapter exposing the byte range `[start, start + len)` of
/// an underlying stream as a stream of its own.
///
/// The shuttle hands these to its payload copier so a class's sound bytes
/// can be streamed without the copier being able to wander outside the
/// region.
pub struct StreamView<R> {
    inner: R,
    start: u64,
    len: u64,
    pos: u64,
}

impl<R: Read + Seek> StreamView<R> {
    /// Create a view and position the underlying stream at its start.
    pub fn new(mut inner: R, start: u64, len: u64) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(start))?;
        Ok(Self {
            inner,
            start,
            len,
            pos: 0,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<R: Read + Seek> Read for StreamView<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = remaining.min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for StreamView<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the start of the view",
            )
        })?;
        self.inner.seek(SeekFrom::Start(self.start + target))?;
        self.pos = target;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn backing() -> Cursor<Vec<u8>> {
        Cursor::new((0u8..20).collect())
    }

    #[test]
    fn reads_only_the_window() {
        let mut view = StreamView::new(backing(), 3, 4).unwrap();
        let mut data = Vec::new();
        view.read_to_end(&mut data).unwrap();
        assert_eq!(data, vec![3, 4, 5, 6]);
    }

    #[test]
    fn seeks_are_view_relative() {
        let mut view = StreamView::new(backing(), 5, 10).unwrap();
        view.seek(SeekFrom::Start(2)).unwrap();
        let mut byte = [0u8; 1];
        view.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], 7);

        view.seek(SeekFrom::End(-1)).unwrap();
        view.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], 14);

        let pos = view.seek(SeekFrom::Current(-2)).unwrap();
        assert_eq!(pos, 8);
    }

    #[test]
    fn seek_before_start_fails() {
        let mut view = StreamView::new(backing(), 5, 10).unwrap();
        assert!(view.seek(SeekFrom::Current(-1)).is_err());
    }

    #[test]
    fn reads_past_the_end_return_nothing() {
        let mut view = StreamView::new(backing(), 5, 10).unwrap();
        view.seek(SeekFrom::Start(10)).unwrap();
        let mut data = Vec::new();
        assert_eq!(view.read_to_end(&mut data).unwrap(), 0);
    }

    #[test]
    fn empty_view() {
        let mut view = StreamView::new(backing(), 7, 0).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.len(), 0);
        let mut data = Vec::new();
        assert_eq!(view.read_to_end(&mut data).unwrap(), 0);
    }
}
