//! Read handles over backend-owned paste content.

use super::header::Header;
use crate::store::readers::ReadGuard;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// A short-lived view over a stored paste.
///
/// Handles never own the durable bytes. Dropping a handle closes it and
/// releases its reader reservation, which is what a pending delete waits for.
pub trait Paste: Read + Seek + Send {
    /// Metadata of the paste behind this handle.
    fn header(&self) -> &Header;

    /// Read into `buf` starting at `offset` without moving the cursor.
    ///
    /// # Returns
    /// Number of bytes read; `0` at or past the end of the content.
    ///
    /// # Errors
    /// Propagates I/O errors from file-backed handles.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Content length in bytes.
    fn size(&self) -> u64 {
        self.header().size
    }

    /// Creation time of the paste.
    fn mod_time(&self) -> DateTime<Utc> {
        self.header().mod_time
    }

    /// Close the handle. Equivalent to dropping it.
    fn close(self: Box<Self>) {}
}

/// Handle over an in-memory buffer or a memory mapping.
pub(crate) struct BufferPaste<B> {
    cursor: Cursor<B>,
    header: Header,
    _reading: ReadGuard,
}

impl<B: AsRef<[u8]>> BufferPaste<B> {
    pub(crate) fn new(bytes: B, header: Header, reading: ReadGuard) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            header,
            _reading: reading,
        }
    }
}

impl<B: AsRef<[u8]>> Read for BufferPaste<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl<B: AsRef<[u8]>> Seek for BufferPaste<B> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl<B: AsRef<[u8]> + Send> Paste for BufferPaste<B> {
    fn header(&self) -> &Header {
        &self.header
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let data = self.cursor.get_ref().as_ref();
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }
}

/// Handle over an open paste file.
pub(crate) struct FilePaste {
    file: File,
    header: Header,
    _reading: ReadGuard,
}

impl FilePaste {
    pub(crate) fn new(file: File, header: Header, reading: ReadGuard) -> Self {
        Self {
            file,
            header,
            _reading: reading,
        }
    }
}

impl Read for FilePaste {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for FilePaste {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Paste for FilePaste {
    fn header(&self) -> &Header {
        &self.header
    }

    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        // seek_read moves the OS cursor; restore it for sequential readers.
        let mut file = &self.file;
        let position = file.stream_position()?;
        let n = self.file.seek_read(buf, offset)?;
        file.seek(SeekFrom::Start(position))?;
        Ok(n)
    }
}
