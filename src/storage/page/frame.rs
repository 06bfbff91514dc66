//! A single buffer-pool frame: the in-memory slot that may hold a page.

use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::common::config::{PageId, NO_PAGE, PAGE_SIZE};

pub type PageBuf = [u8; PAGE_SIZE];

/// One entry of the buffer pool. Owns its own read/write latch, guarding
/// `data` independently of every other frame, so disk I/O on one frame
/// never blocks access to another.
#[derive(Clone)]
pub struct Frame(Arc<RwLock<FrameInner>>);

struct FrameInner {
    page_id: PageId,
    data: PageBuf,
    dirty: bool,
    fix_count: i32,
    lru_order: u64,
}

impl Frame {
    pub fn new() -> Self {
        Frame(Arc::new(RwLock::new(FrameInner {
            page_id: NO_PAGE,
            data: [0; PAGE_SIZE],
            dirty: false,
            fix_count: 0,
            lru_order: 0,
        })))
    }

    pub fn reset(&self) {
        let mut inner = self.0.write();
        inner.page_id = NO_PAGE;
        inner.data = [0; PAGE_SIZE];
        inner.dirty = false;
        inner.fix_count = 0;
        inner.lru_order = 0;
    }

    pub fn page_id(&self) -> PageId {
        self.0.read().page_id
    }

    pub fn fix_count(&self) -> i32 {
        self.0.read().fix_count
    }

    pub fn lru_order(&self) -> u64 {
        self.0.read().lru_order
    }

    pub fn is_dirty(&self) -> bool {
        self.0.read().dirty
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.0.write().dirty = dirty;
    }

    pub fn get_data(&self) -> MappedRwLockReadGuard<'_, PageBuf> {
        RwLockReadGuard::map(self.0.read(), |i| &i.data)
    }

    pub fn get_data_mut(&self) -> MappedRwLockWriteGuard<'_, PageBuf> {
        RwLockWriteGuard::map(self.0.write(), |i| &mut i.data)
    }

    /// Binds the frame to `page_id` with freshly-read bytes, pinned once,
    /// stamped with `lru_order`. Used whenever the buffer pool loads a page
    /// into a free or just-evicted frame.
    pub(crate) fn bind(&self, page_id: PageId, data: PageBuf, lru_order: u64) {
        let mut inner = self.0.write();
        inner.page_id = page_id;
        inner.data = data;
        inner.dirty = false;
        inner.fix_count = 1;
        inner.lru_order = lru_order;
    }

    pub(crate) fn pin(&self, lru_order: u64) {
        let mut inner = self.0.write();
        inner.fix_count += 1;
        inner.lru_order = lru_order;
    }

    /// Decrements the fix count, marking the frame dirty if requested.
    /// Returns `false` (without effect) if the frame was already unpinned.
    pub(crate) fn unpin(&self, is_dirty: bool) -> bool {
        let mut inner = self.0.write();
        if inner.fix_count <= 0 {
            return false;
        }
        inner.fix_count -= 1;
        if is_dirty {
            inner.dirty = true;
        }
        true
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
