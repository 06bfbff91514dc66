//! The page directory: one `PageDirectoryEntry` per data page, tracking
//! free space for insertion, persisted across one or more directory pages
//! at the head of a table's file (§4.3, §4.5).

use crate::common::config::PAGE_SIZE;
use crate::error::{StorageError, StorageResult};

const INT_SIZE: usize = std::mem::size_of::<i32>();
const ENTRY_SIZE: usize = INT_SIZE + 1 + INT_SIZE + INT_SIZE; // page_id, has_free_slot, free_space, record_count
const HEADER_SIZE: usize = 3 * INT_SIZE; // num_pages, num_page_dp, tuple_count

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDirectoryEntry {
    pub page_id: i32,
    pub has_free_slot: bool,
    pub free_space: i32,
    pub record_count: i32,
}

/// How many `PageDirectoryEntry` records fit in a single directory page
/// alongside its three-int header.
pub fn max_entries_per_dp() -> usize {
    (PAGE_SIZE - HEADER_SIZE) / ENTRY_SIZE
}

/// The physical page index (within the table's file) holding data page
/// `current_page`, accounting for the directory pages interleaved ahead of
/// it. Unifies the two inconsistent formulas in the reference source (§9)
/// on `ceil((current_page+1)/max_entries_per_dp) + 1 + current_page`.
pub fn physical_page_index(current_page: usize) -> usize {
    let max = max_entries_per_dp();
    let dirs_before = (current_page + max) / max; // ceil((current_page + 1) / max)
    dirs_before + 1 + current_page
}

/// Encodes one directory page: `num_pages`, `num_page_dp`, `tuple_count`,
/// then as many entries from `entries` as fit (`max_entries_per_dp`),
/// zero-padded beyond that. `tuple_count` is the table's live record count
/// (successful inserts minus successful deletes) — every directory page
/// carries the same table-wide header, the same redundancy already used for
/// `num_pages`/`num_page_dp`, so that reopening the table can recover it
/// without re-summing `record_count` (which never decreases on delete).
pub fn encode_directory_page(
    num_pages: i32,
    num_page_dp: i32,
    tuple_count: i32,
    entries: &[PageDirectoryEntry],
) -> [u8; PAGE_SIZE] {
    let mut buf = [0u8; PAGE_SIZE];
    buf[0..INT_SIZE].copy_from_slice(&num_pages.to_ne_bytes());
    buf[INT_SIZE..2 * INT_SIZE].copy_from_slice(&num_page_dp.to_ne_bytes());
    buf[2 * INT_SIZE..HEADER_SIZE].copy_from_slice(&tuple_count.to_ne_bytes());

    for (i, entry) in entries.iter().enumerate().take(max_entries_per_dp()) {
        let at = HEADER_SIZE + i * ENTRY_SIZE;
        buf[at..at + INT_SIZE].copy_from_slice(&entry.page_id.to_ne_bytes());
        buf[at + INT_SIZE] = entry.has_free_slot as u8;
        let fs_at = at + INT_SIZE + 1;
        buf[fs_at..fs_at + INT_SIZE].copy_from_slice(&entry.free_space.to_ne_bytes());
        let rc_at = fs_at + INT_SIZE;
        buf[rc_at..rc_at + INT_SIZE].copy_from_slice(&entry.record_count.to_ne_bytes());
    }
    buf
}

/// Reads just the three-int header (`num_pages`, `num_page_dp`,
/// `tuple_count`) without touching the entry array. Used by `open_table` to
/// learn how many directory pages to read, and the table's live tuple
/// count, before it knows how many entries each directory page holds.
pub fn read_header(buf: &[u8; PAGE_SIZE]) -> (i32, i32, i32) {
    let num_pages = i32::from_ne_bytes(buf[0..INT_SIZE].try_into().unwrap());
    let num_page_dp = i32::from_ne_bytes(buf[INT_SIZE..2 * INT_SIZE].try_into().unwrap());
    let tuple_count = i32::from_ne_bytes(buf[2 * INT_SIZE..HEADER_SIZE].try_into().unwrap());
    (num_pages, num_page_dp, tuple_count)
}

/// Decodes a directory page's header and up to `count` entries from it.
pub fn decode_directory_page(
    buf: &[u8; PAGE_SIZE],
    count: usize,
) -> StorageResult<(i32, i32, i32, Vec<PageDirectoryEntry>)> {
    let (num_pages, num_page_dp, tuple_count) = read_header(buf);

    let max = max_entries_per_dp();
    if count > max {
        return Err(StorageError::AllocationFailed(format!(
            "requested {count} directory entries but a page holds at most {max}"
        )));
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let at = HEADER_SIZE + i * ENTRY_SIZE;
        let page_id = i32::from_ne_bytes(buf[at..at + INT_SIZE].try_into().unwrap());
        let has_free_slot = buf[at + INT_SIZE] != 0;
        let fs_at = at + INT_SIZE + 1;
        let free_space = i32::from_ne_bytes(buf[fs_at..fs_at + INT_SIZE].try_into().unwrap());
        let rc_at = fs_at + INT_SIZE;
        let record_count = i32::from_ne_bytes(buf[rc_at..rc_at + INT_SIZE].try_into().unwrap());
        entries.push(PageDirectoryEntry {
            page_id,
            has_free_slot,
            free_space,
            record_count,
        });
    }
    Ok((num_pages, num_page_dp, tuple_count, entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_page_round_trips() {
        let entries = vec![
            PageDirectoryEntry {
                page_id: 0,
                has_free_slot: true,
                free_space: 100,
                record_count: 2,
            },
            PageDirectoryEntry {
                page_id: 1,
                has_free_slot: false,
                free_space: 0,
                record_count: 5,
            },
        ];
        let buf = encode_directory_page(2, 1, 7, &entries);
        let (num_pages, num_page_dp, tuple_count, decoded) =
            decode_directory_page(&buf, entries.len()).unwrap();
        assert_eq!(num_pages, 2);
        assert_eq!(num_page_dp, 1);
        assert_eq!(tuple_count, 7);
        assert_eq!(decoded, entries);
    }

    #[test]
    fn read_header_matches_decode_directory_page() {
        let buf = encode_directory_page(3, 1, 9, &[]);
        assert_eq!(read_header(&buf), (3, 1, 9));
    }

    #[test]
    fn physical_page_index_interleaves_directory_pages() {
        let max = max_entries_per_dp();
        // The first `max` data pages sit right after the single directory page.
        assert_eq!(physical_page_index(0), 2);
        if max > 1 {
            assert_eq!(physical_page_index(1), 3);
        }
    }

    #[test]
    fn decode_rejects_counts_larger_than_a_page_can_hold() {
        let buf = [0u8; PAGE_SIZE];
        assert!(decode_directory_page(&buf, max_entries_per_dp() + 1).is_err());
    }
}
