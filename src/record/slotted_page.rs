//! Byte layout of a data page (§4.4): a slot directory growing up from
//! offset 0, and record payloads packed down from `PAGE_SIZE`.

use crate::common::config::PAGE_SIZE;

const OFFSET_SIZE: usize = std::mem::size_of::<i32>();
pub const SLOT_ENTRY_SIZE: usize = OFFSET_SIZE + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDirectoryEntry {
    pub offset: i32,
    pub is_free: bool,
}

impl SlotDirectoryEntry {
    pub(crate) fn slot_offset(slot: usize) -> usize {
        slot * SLOT_ENTRY_SIZE
    }

    pub(crate) fn read(page: &[u8; PAGE_SIZE], slot: usize) -> SlotDirectoryEntry {
        let at = Self::slot_offset(slot);
        let offset = i32::from_ne_bytes(page[at..at + OFFSET_SIZE].try_into().unwrap());
        let is_free = page[at + OFFSET_SIZE] != 0;
        SlotDirectoryEntry { offset, is_free }
    }

    pub(crate) fn write(page: &mut [u8; PAGE_SIZE], slot: usize, entry: SlotDirectoryEntry) {
        let at = Self::slot_offset(slot);
        page[at..at + OFFSET_SIZE].copy_from_slice(&entry.offset.to_ne_bytes());
        page[at + OFFSET_SIZE] = entry.is_free as u8;
    }
}

/// The byte offset at which the `record_index`-th record (1-indexed by
/// `record_count` at the time it was appended) is stored.
pub(crate) fn payload_offset(record_index: usize, record_size: usize) -> usize {
    PAGE_SIZE - record_index * record_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_entry_round_trips() {
        let mut page = [0u8; PAGE_SIZE];
        let entry = SlotDirectoryEntry {
            offset: 100,
            is_free: false,
        };
        SlotDirectoryEntry::write(&mut page, 2, entry);
        assert_eq!(SlotDirectoryEntry::read(&page, 2), entry);
    }

    #[test]
    fn payload_offset_packs_from_the_high_end() {
        assert_eq!(payload_offset(1, 10), PAGE_SIZE - 10);
        assert_eq!(payload_offset(2, 10), PAGE_SIZE - 20);
    }
}
