//! Sequential table scans with predicate filtering (§4.6).

use std::sync::Arc;

use crate::common::config::Rid;
use crate::error::{StorageError, StorageResult};
use crate::record::expr::Predicate;
use crate::record::page_directory::physical_page_index;
use crate::record::record::Record;
use crate::record::slotted_page::SlotDirectoryEntry;
use crate::record::table::Table;

/// Scan state: the current data page and slot, plus the optional predicate
/// every record is filtered through. A scan does not hold a page pinned
/// between calls to `next` — each call pins only the page it is currently
/// visiting, via the same `PooledPage` RAII guard every other record-layer
/// operation uses, so an interrupted iteration can never leak a pin.
pub struct Scan {
    table: Arc<Table>,
    predicate: Option<Box<dyn Predicate + Send + Sync>>,
    current_page: usize,
    current_slot: usize,
    done: bool,
}

impl Scan {
    pub(crate) fn new(table: Arc<Table>, predicate: Option<Box<dyn Predicate + Send + Sync>>) -> Self {
        Self {
            table,
            predicate,
            current_page: 0,
            current_slot: 0,
            done: false,
        }
    }

    /// Returns the next record matching the predicate, or
    /// `StorageError::NoMoreTuples` once the table is exhausted. Further
    /// calls after exhaustion keep returning `NoMoreTuples`.
    pub fn next(&mut self) -> StorageResult<Record> {
        if self.done {
            return Err(StorageError::NoMoreTuples);
        }
        let record_size = self.table.schema().record_size();
        let num_pages = self.table.num_pages();

        while self.current_page < num_pages {
            let record_count = self.table.record_count_for_scan(self.current_page)? as usize;
            let physical = physical_page_index(self.current_page) as crate::common::config::PageId;
            let page = self.table.bpm().fetch_pooled(physical)?;

            while self.current_slot < record_count {
                let slot = self.current_slot;
                self.current_slot += 1;

                let slot_entry = SlotDirectoryEntry::read(&page.get_data(), slot);
                if slot_entry.is_free {
                    continue;
                }
                let offset = slot_entry.offset as usize;
                let data = page.get_data()[offset..offset + record_size].to_vec();
                let record = Record {
                    id: Rid {
                        page: self.current_page as i32,
                        slot: slot as i32,
                    },
                    data,
                };

                let matches = match &self.predicate {
                    Some(p) => p.eval(&record, self.table.schema())?,
                    None => true,
                };
                if matches {
                    return Ok(record);
                }
            }

            self.current_slot = 0;
            self.current_page += 1;
        }

        self.done = true;
        Err(StorageError::NoMoreTuples)
    }

    /// Ends the scan. Idempotent — there is no pinned page to release
    /// since `next` only ever holds one for the duration of a single call.
    pub fn close(self) {}
}
