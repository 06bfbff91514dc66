//! Compile-time knobs and the handful of identifier types shared by the
//! buffer pool and the record manager.

/// Size in bytes of a single page, and the unit of all buffer-pool and
/// page-file I/O. The reference source defaults to 128; every slotted-page
/// layout computation in `record` is defined in terms of this constant, so
/// it is fixed at compile time rather than threaded through as a runtime
/// parameter.
pub const PAGE_SIZE: usize = 128;

/// Sentinel page id meaning "this frame holds no page".
pub const NO_PAGE: PageId = -1;

/// Default lookback used by the LRU-K replacement strategy when a caller
/// does not supply one explicitly.
pub const DEFAULT_REPLACER_K: usize = 2;

pub type PageId = i32;
pub type FrameId = usize;

/// Identifies a single record: the data page it lives on and its slot
/// within that page's slot directory. Both components are non-negative for
/// a record that has actually been inserted; `Rid::INVALID` is used for
/// records that have been created but not yet assigned a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page: PageId,
    pub slot: i32,
}

impl Rid {
    pub const INVALID: Rid = Rid { page: -1, slot: -1 };

    pub fn is_valid(&self) -> bool {
        self.page >= 0 && self.slot >= 0
    }
}

impl Default for Rid {
    fn default() -> Self {
        Rid::INVALID
    }
}
