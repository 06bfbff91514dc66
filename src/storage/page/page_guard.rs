//! Client-facing handles onto a pinned frame.

use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};
use tracing::warn;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::PageId;
use crate::storage::page::frame::{Frame, PageBuf};

/// The client-facing reference to a pinned frame — `{page_num, data
/// pointer}`. Valid only between its `pin_page` and the matching
/// `unpin_page`; holding one keeps the bound frame from being evicted.
#[derive(Clone)]
pub struct PageHandle {
    page_num: PageId,
    frame: Frame,
}

impl PageHandle {
    pub(crate) fn new(page_num: PageId, frame: Frame) -> Self {
        Self { page_num, frame }
    }

    pub fn page_num(&self) -> PageId {
        self.page_num
    }

    pub fn get_data(&self) -> MappedRwLockReadGuard<'_, PageBuf> {
        self.frame.get_data()
    }

    pub fn get_data_mut(&self) -> MappedRwLockWriteGuard<'_, PageBuf> {
        self.frame.get_data_mut()
    }
}

/// RAII convenience wrapper around `pin_page`/`unpin_page`: releases the
/// pin when dropped, marking the page dirty if the caller ever took a
/// mutable borrow of its data. The record manager uses this exclusively so
/// that no code path — including an early return on error — can forget to
/// unpin a page it fetched.
pub struct PooledPage {
    bpm: Arc<BufferPoolManager>,
    handle: PageHandle,
    dirtied: bool,
}

impl PooledPage {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, handle: PageHandle) -> Self {
        Self {
            bpm,
            handle,
            dirtied: false,
        }
    }

    pub fn page_num(&self) -> PageId {
        self.handle.page_num()
    }

    pub fn get_data(&self) -> MappedRwLockReadGuard<'_, PageBuf> {
        self.handle.get_data()
    }

    pub fn get_data_mut(&mut self) -> MappedRwLockWriteGuard<'_, PageBuf> {
        self.dirtied = true;
        self.handle.get_data_mut()
    }
}

impl Drop for PooledPage {
    fn drop(&mut self) {
        if let Err(e) = self.bpm.unpin_page(self.handle.page_num(), self.dirtied) {
            warn!(error = %e, page_num = self.handle.page_num(), "failed to unpin page on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::buffer::replacer::ReplacementStrategy;
    use crate::storage::page_file::PageFile;

    #[test]
    fn pooled_page_unpins_and_marks_dirty_on_drop() {
        let dir = TempDir::new("test").unwrap();
        let path = dir.path().join("test.db");
        PageFile::create(&path).unwrap();

        let bpm =
            Arc::new(BufferPoolManager::init_pool(&path, 2, ReplacementStrategy::Fifo).unwrap());
        {
            let mut page = bpm.fetch_pooled(0).unwrap();
            page.get_data_mut()[0] = 7;
        }
        assert_eq!(bpm.get_fix_counts()[0], 0);
        assert!(bpm.get_dirty_flags()[0]);
    }

    #[test]
    fn read_only_access_does_not_dirty_the_page() {
        let dir = TempDir::new("test").unwrap();
        let path = dir.path().join("test.db");
        PageFile::create(&path).unwrap();

        let bpm =
            Arc::new(BufferPoolManager::init_pool(&path, 2, ReplacementStrategy::Fifo).unwrap());
        {
            let page = bpm.fetch_pooled(0).unwrap();
            let _ = page.get_data()[0];
        }
        assert!(!bpm.get_dirty_flags()[0]);
    }
}
