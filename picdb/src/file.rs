//! Positioned I/O over the database file.
//!
//! The engine is single-threaded and non-reentrant per database: every
//! call seeks immediately before reading or writing, so there is no need
//! for platform-specific `pread`/`pwrite`.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Open mode for [`FileHandle::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only.
    Read,
    /// Read and write.
    ReadWrite,
}

/// A positioned file handle over one database file.
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    path: PathBuf,
}

impl FileHandle {
    /// Creates (truncating any existing file) and opens for read-write.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self { file, path })
    }

    /// Opens an existing file in the given mode.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(&path)?;
        Ok(Self { file, path })
    }

    /// The path this handle was opened against.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads exactly `len` bytes starting at `offset`.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Writes `bytes` starting at `offset`.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Appends `bytes` to the end of the file, returning the offset the
    /// write started at (i.e. the pre-write file length).
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(bytes)?;
        Ok(offset)
    }

    /// Current length of the file.
    pub fn size(&mut self) -> Result<u64> {
        Ok(self.file.seek(SeekFrom::End(0))?)
    }

    /// Flushes buffered writes to the OS.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// Removes a database file.
pub fn remove(path: impl AsRef<Path>) -> Result<()> {
    fs::remove_file(path)?;
    Ok(())
}

/// Renames (moves) a database file. Not atomic with any prior `remove`
/// call the caller may have issued — compaction relies on that ordering.
pub fn rename(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    fs::rename(src, dst)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_pre_write_offset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("db.bin");
        let mut f = FileHandle::create(&path).expect("create");

        let off1 = f.append(b"hello").expect("append");
        let off2 = f.append(b"world!").expect("append");
        assert_eq!(off1, 0);
        assert_eq!(off2, 5);
        assert_eq!(f.size().expect("size"), 11);
    }

    #[test]
    fn read_at_matches_written_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("db.bin");
        let mut f = FileHandle::create(&path).expect("create");
        f.write_at(10, b"abcdef").expect("write");
        let back = f.read_at(10, 6).expect("read");
        assert_eq!(back, b"abcdef");
    }

    #[test]
    fn read_only_handle_rejects_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("db.bin");
        FileHandle::create(&path).expect("create");
        let mut f = FileHandle::open(&path, OpenMode::Read).expect("open");
        assert!(f.write_at(0, b"x").is_err());
    }
}
