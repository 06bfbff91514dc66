//! The page-file collaborator: a flat, zero-padded, fixed-page-size file.
//! Treated by the rest of this crate as a given block device — the buffer
//! pool is the only thing that talks to it directly.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::common::config::{PageId, PAGE_SIZE};
use crate::error::{StorageError, StorageResult};

/// Pages never implicitly grow the file; callers (the buffer pool) must
/// `ensure_capacity` before writing past the current end.
pub struct PageFile {
    io: Mutex<std::fs::File>,
    path: PathBuf,
    total_pages: Mutex<usize>,
}

impl PageFile {
    /// Opens an existing page file. Fails with `FileNotFound` if the path
    /// does not exist, matching the precondition `init_pool` relies on: the
    /// page-file path must exist before a pool can be created over it.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StorageError::FileNotFound(path.display().to_string()));
        }
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len() as usize;
        Ok(Self {
            io: Mutex::new(file),
            path: path.to_path_buf(),
            total_pages: Mutex::new(len / PAGE_SIZE),
        })
    }

    /// Creates a fresh page file containing a single zeroed page (page 0).
    pub fn create<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.write_all(&[0u8; PAGE_SIZE])?;
        file.flush()?;
        Ok(Self {
            io: Mutex::new(file),
            path: path.to_path_buf(),
            total_pages: Mutex::new(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_pages(&self) -> usize {
        *self.total_pages.lock().unwrap()
    }

    /// Grows the file with zeroed pages, if needed, until it holds at
    /// least `n` pages.
    pub fn ensure_capacity(&self, n: usize) -> StorageResult<()> {
        let mut total = self.total_pages.lock().unwrap();
        if *total >= n {
            return Ok(());
        }
        let mut io = self.io.lock().unwrap();
        io.seek(SeekFrom::End(0))?;
        let zero = [0u8; PAGE_SIZE];
        for _ in *total..n {
            io.write_all(&zero)?;
        }
        io.flush()?;
        *total = n;
        Ok(())
    }

    /// Appends a single zeroed page and returns its id.
    pub fn append_empty(&self) -> StorageResult<PageId> {
        let mut total = self.total_pages.lock().unwrap();
        let mut io = self.io.lock().unwrap();
        io.seek(SeekFrom::End(0))?;
        io.write_all(&[0u8; PAGE_SIZE])?;
        io.flush()?;
        let new_id = *total as PageId;
        *total += 1;
        Ok(new_id)
    }

    /// Reads page `page_id` into `buf`. Out-of-range reads fail with
    /// `PageOutOfRange` rather than silently zero-filling.
    pub fn read_block(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> StorageResult<()> {
        if page_id < 0 || page_id as usize >= self.total_pages() {
            return Err(StorageError::PageOutOfRange(page_id));
        }
        let mut io = self.io.lock().unwrap();
        io.seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        io.read_exact(buf)?;
        Ok(())
    }

    /// Writes `buf` to page `page_id`. The file must already have capacity
    /// for this page; this never grows the file implicitly.
    pub fn write_block(&self, page_id: PageId, buf: &[u8; PAGE_SIZE]) -> StorageResult<()> {
        if page_id < 0 || page_id as usize >= self.total_pages() {
            return Err(StorageError::PageOutOfRange(page_id));
        }
        let mut io = self.io.lock().unwrap();
        io.seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        io.write_all(buf)?;
        io.flush()?;
        Ok(())
    }

    /// Removes the underlying file from disk.
    pub fn destroy(self) -> StorageResult<()> {
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn open_fails_when_file_missing() {
        let dir = TempDir::new("test").unwrap();
        let path = dir.path().join("nope.db");
        assert!(matches!(
            PageFile::open(&path),
            Err(StorageError::FileNotFound(_))
        ));
    }

    #[test]
    fn create_open_read_write_round_trip() {
        let dir = TempDir::new("test").unwrap();
        let path = dir.path().join("test.db");

        let pf = PageFile::create(&path).unwrap();
        assert_eq!(pf.total_pages(), 1);

        pf.ensure_capacity(4).unwrap();
        assert_eq!(pf.total_pages(), 4);

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 42;
        pf.write_block(2, &data).unwrap();

        let mut buf = [0u8; PAGE_SIZE];
        pf.read_block(2, &mut buf).unwrap();
        assert_eq!(buf, data);

        assert!(matches!(
            pf.read_block(9, &mut buf),
            Err(StorageError::PageOutOfRange(9))
        ));

        let id = pf.append_empty().unwrap();
        assert_eq!(id, 4);
        assert_eq!(pf.total_pages(), 5);

        drop(pf);
        let reopened = PageFile::open(&path).unwrap();
        assert_eq!(reopened.total_pages(), 5);
    }

    #[test]
    fn ensure_capacity_is_a_no_op_when_already_large_enough() {
        let dir = TempDir::new("test").unwrap();
        let path = dir.path().join("test.db");
        let pf = PageFile::create(&path).unwrap();
        pf.ensure_capacity(1).unwrap();
        assert_eq!(pf.total_pages(), 1);
    }
}
