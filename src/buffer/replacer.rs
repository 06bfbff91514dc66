//! Pluggable eviction strategies used by the buffer pool manager when every
//! frame is occupied and a victim with `fix_count == 0` must be chosen.

use crate::common::config::{FrameId, DEFAULT_REPLACER_K};

/// A read-only snapshot of one frame's replacement-relevant state, taken
/// under the pool's page-table lock immediately before a strategy is
/// consulted.
#[derive(Debug, Clone, Copy)]
pub struct FrameSnapshot {
    pub frame_id: FrameId,
    pub fix_count: i32,
    pub lru_order: u64,
}

/// Which page-replacement policy a buffer pool uses. Selected once, at
/// `init_pool` time, and fixed for the pool's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementStrategy {
    /// Scan forward from `reads_from_disk mod n`, evicting the first
    /// unpinned frame encountered.
    Fifo,
    /// Evict the unpinned frame with the smallest `lru_order`.
    Lru,
    /// Evict the frame whose `lru_order` is the k-th smallest among
    /// unpinned frames (the smallest available if fewer than k are
    /// unpinned).
    LruK { k: usize },
}

impl Default for ReplacementStrategy {
    /// `LruK` seeded with `DEFAULT_REPLACER_K`, matching the reference
    /// source's `LRUKReplacer::new(replacer_k, LRUK_REPLACER_K)` call site —
    /// the constant a caller gets when it doesn't pick a `k` of its own.
    fn default() -> Self {
        ReplacementStrategy::LruK { k: DEFAULT_REPLACER_K }
    }
}

impl ReplacementStrategy {
    /// Picks a victim frame among `frames` — one entry per frame, indexed
    /// by position so that `frames[i]` describes frame `i` — or `None` if
    /// every frame is pinned. `reads_from_disk` is the pool's running
    /// count of pages loaded from disk, used as the FIFO cursor.
    pub fn select_victim(&self, frames: &[FrameSnapshot], reads_from_disk: u64) -> Option<FrameId> {
        match self {
            ReplacementStrategy::Fifo => Self::select_fifo(frames, reads_from_disk),
            ReplacementStrategy::Lru => Self::select_lru(frames),
            ReplacementStrategy::LruK { k } => Self::select_lru_k(frames, *k),
        }
    }

    fn select_fifo(frames: &[FrameSnapshot], reads_from_disk: u64) -> Option<FrameId> {
        if frames.is_empty() {
            return None;
        }
        let n = frames.len();
        let cursor = (reads_from_disk as usize) % n;
        (0..n)
            .map(|i| &frames[(cursor + i) % n])
            .find(|f| f.fix_count == 0)
            .map(|f| f.frame_id)
    }

    fn select_lru(frames: &[FrameSnapshot]) -> Option<FrameId> {
        frames
            .iter()
            .filter(|f| f.fix_count == 0)
            .min_by_key(|f| f.lru_order)
            .map(|f| f.frame_id)
    }

    fn select_lru_k(frames: &[FrameSnapshot], k: usize) -> Option<FrameId> {
        let mut evictable: Vec<&FrameSnapshot> =
            frames.iter().filter(|f| f.fix_count == 0).collect();
        if evictable.is_empty() {
            return None;
        }
        evictable.sort_by_key(|f| f.lru_order);
        let index = k.min(evictable.len()) - 1;
        Some(evictable[index].frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(frame_id: FrameId, fix_count: i32, lru_order: u64) -> FrameSnapshot {
        FrameSnapshot {
            frame_id,
            fix_count,
            lru_order,
        }
    }

    #[test]
    fn fifo_scans_forward_from_cursor_skipping_pinned() {
        let frames = vec![snap(0, 1, 0), snap(1, 0, 0), snap(2, 0, 0)];
        // reads_from_disk = 3, n = 3 -> cursor = 0, frame 0 pinned, next free is 1.
        assert_eq!(ReplacementStrategy::Fifo.select_victim(&frames, 3), Some(1));
    }

    #[test]
    fn fifo_wraps_around() {
        let frames = vec![snap(0, 0, 0), snap(1, 1, 0), snap(2, 1, 0)];
        // cursor = 1 mod 3 = 1, frame 1 pinned, frame 2 pinned, wraps to frame 0.
        assert_eq!(ReplacementStrategy::Fifo.select_victim(&frames, 1), Some(0));
    }

    #[test]
    fn lru_picks_smallest_order_among_unpinned() {
        let frames = vec![snap(0, 0, 5), snap(1, 1, 1), snap(2, 0, 2)];
        assert_eq!(ReplacementStrategy::Lru.select_victim(&frames, 0), Some(2));
    }

    #[test]
    fn lru_k_picks_kth_smallest_among_unpinned() {
        let frames = vec![snap(0, 0, 1), snap(1, 0, 2), snap(2, 0, 3), snap(3, 1, 0)];
        assert_eq!(
            ReplacementStrategy::LruK { k: 2 }.select_victim(&frames, 0),
            Some(1)
        );
    }

    #[test]
    fn lru_k_falls_back_to_smallest_available_when_fewer_than_k_evictable() {
        let frames = vec![snap(0, 1, 0), snap(1, 0, 9)];
        assert_eq!(
            ReplacementStrategy::LruK { k: 3 }.select_victim(&frames, 0),
            Some(1)
        );
    }

    #[test]
    fn default_strategy_is_lru_k_with_the_default_k() {
        assert_eq!(
            ReplacementStrategy::default(),
            ReplacementStrategy::LruK { k: DEFAULT_REPLACER_K }
        );
    }

    #[test]
    fn all_pinned_returns_none() {
        let frames = vec![snap(0, 1, 0), snap(1, 2, 0)];
        assert_eq!(ReplacementStrategy::Fifo.select_victim(&frames, 0), None);
        assert_eq!(ReplacementStrategy::Lru.select_victim(&frames, 0), None);
        assert_eq!(
            ReplacementStrategy::LruK { k: 2 }.select_victim(&frames, 0),
            None
        );
    }
}
