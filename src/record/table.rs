//! The record manager: table create/open/close/delete, record
//! insert/delete/update/get by `Rid`, and tuple counting (§4.5). Sits on top
//! of the buffer pool — every byte this module reads or writes crosses
//! through `BufferPoolManager::fetch_pooled`, never the page file directly.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use itertools::Itertools;
use tracing::debug;

use crate::buffer::{BufferPoolManager, ReplacementStrategy};
use crate::common::config::{Rid, PAGE_SIZE};
use crate::error::{StorageError, StorageResult};
use crate::record::page_directory::{
    decode_directory_page, encode_directory_page, max_entries_per_dp, physical_page_index,
    PageDirectoryEntry,
};
use crate::record::record::Record;
use crate::record::scan::Scan;
use crate::record::schema::Schema;
use crate::record::slotted_page::{payload_offset, SlotDirectoryEntry, SLOT_ENTRY_SIZE};
use crate::storage::page_file::PageFile;

/// The physical page holding a table's schema (§4.3).
const SCHEMA_PAGE: i32 = 0;

/// The physical page index of directory page `dir_index` (0-indexed): one
/// directory page precedes every block of `max_entries_per_dp()` data
/// pages, so `dir_index`'s own physical slot is `1 + dir_index * (max + 1)`
/// — the same interleaving `physical_page_index` assumes for data pages.
fn directory_page_physical_index(dir_index: usize) -> i32 {
    (1 + dir_index * (max_entries_per_dp() + 1)) as i32
}

struct TableState {
    directory: Vec<PageDirectoryEntry>,
    num_page_dp: usize,
}

/// An open table: schema plus the buffer pool and in-memory page directory
/// backing it (`RM_TableData` in the source). Clone is cheap — it shares
/// the same underlying pool and directory state.
pub struct Table {
    name: String,
    schema: Schema,
    bpm: Arc<BufferPoolManager>,
    state: Mutex<TableState>,
    tuple_count: AtomicI64,
}

impl Table {
    /// Creates a fresh table file at `path`: writes the schema to page 0
    /// and a single empty page-directory page to page 1, then opens a
    /// buffer pool over it.
    pub fn create<P: AsRef<Path>>(
        path: P,
        name: impl Into<String>,
        schema: Schema,
        pool_size: usize,
        strategy: ReplacementStrategy,
    ) -> StorageResult<Arc<Table>> {
        let path = path.as_ref();
        {
            let seed = PageFile::create(path)?;
            seed.ensure_capacity(2)?;
            seed.write_block(SCHEMA_PAGE, &schema.encode()?)?;
            seed.write_block(1, &encode_directory_page(0, 1, 0, &[]))?;
        }

        let bpm = Arc::new(BufferPoolManager::init_pool(path, pool_size, strategy)?);
        let name = name.into();
        debug!(table = %name, "created table");
        Ok(Arc::new(Table {
            name,
            schema,
            bpm,
            state: Mutex::new(TableState {
                directory: Vec::new(),
                num_page_dp: 1,
            }),
            tuple_count: AtomicI64::new(0),
        }))
    }

    /// Opens an existing table file, reconstructing the schema and the
    /// in-memory page directory from what was persisted by `create`/prior
    /// mutations.
    pub fn open<P: AsRef<Path>>(
        path: P,
        name: impl Into<String>,
        pool_size: usize,
        strategy: ReplacementStrategy,
    ) -> StorageResult<Arc<Table>> {
        let bpm = Arc::new(BufferPoolManager::init_pool(path, pool_size, strategy)?);

        let schema = {
            let page = bpm.fetch_pooled(SCHEMA_PAGE)?;
            Schema::decode(&page.get_data())?
        };

        let (num_pages, num_page_dp, tuple_count) = {
            let page = bpm.fetch_pooled(1)?;
            crate::record::page_directory::read_header(&page.get_data())
        };
        let num_pages = num_pages as usize;
        let num_page_dp = num_page_dp.max(1) as usize;

        let max = max_entries_per_dp();
        let mut directory = Vec::with_capacity(num_pages);
        for dir_index in 0..num_page_dp {
            let physical = directory_page_physical_index(dir_index);
            let page = bpm.fetch_pooled(physical)?;
            let start = dir_index * max;
            let count = num_pages.saturating_sub(start).min(max);
            let (_, _, _, entries) = decode_directory_page(&page.get_data(), count)?;
            directory.extend(entries);
        }

        let tuple_count = tuple_count as i64;
        let name = name.into();
        debug!(table = %name, num_pages, num_page_dp, "opened table");
        Ok(Arc::new(Table {
            name,
            schema,
            bpm,
            state: Mutex::new(TableState {
                directory,
                num_page_dp,
            }),
            tuple_count: AtomicI64::new(tuple_count),
        }))
    }

    /// Flushes every dirty page back to disk. The directory and schema
    /// pages are already written through the pool by every mutating
    /// operation, so there is nothing further to persist here.
    pub fn close(&self) -> StorageResult<()> {
        debug!(table = %self.name, "closing table");
        self.bpm.force_flush_pool()
    }

    /// Removes a table's file from disk. Takes a path rather than an open
    /// `Table` since deleting a table you still hold open is a caller
    /// error outside this module's concern (close it first).
    pub fn delete<P: AsRef<Path>>(path: P) -> StorageResult<()> {
        PageFile::open(path)?.destroy()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_pages(&self) -> usize {
        self.state.lock().unwrap().directory.len()
    }

    pub fn get_num_tuples(&self) -> i64 {
        self.tuple_count.load(Ordering::SeqCst)
    }

    fn record_count(&self, page: usize) -> StorageResult<i32> {
        let state = self.state.lock().unwrap();
        state
            .directory
            .get(page)
            .map(|e| e.record_count)
            .ok_or(StorageError::InvalidRid(Rid {
                page: page as i32,
                slot: 0,
            }))
    }

    /// Persists directory page `dir_index` from the current in-memory
    /// state. Called after every mutation that touches the directory entry
    /// covering the page it affected (§4.5: "the affected directory page is
    /// written back through the pool"), and after `self.tuple_count` has
    /// already been updated to reflect that mutation — every directory page
    /// carries the table-wide tuple count in its header, so that `open` can
    /// recover it without re-summing `record_count` (which never decreases
    /// on delete, per §9).
    fn persist_directory_page(&self, state: &TableState, dir_index: usize) -> StorageResult<()> {
        let max = max_entries_per_dp();
        let start = dir_index * max;
        let end = (start + max).min(state.directory.len());
        let entries = if start < end {
            &state.directory[start..end]
        } else {
            &[][..]
        };
        let buf = encode_directory_page(
            state.directory.len() as i32,
            state.num_page_dp as i32,
            self.tuple_count.load(Ordering::SeqCst) as i32,
            entries,
        );
        let physical = directory_page_physical_index(dir_index);
        let mut page = self.bpm.fetch_pooled(physical)?;
        page.get_data_mut().copy_from_slice(&buf);
        Ok(())
    }

    fn recompute_has_free_slot(entry: &mut PageDirectoryEntry, record_size: usize) {
        entry.has_free_slot = entry.free_space >= (record_size + SLOT_ENTRY_SIZE) as i32;
    }

    /// Persists directory page `dir_index`, and — since `open` only ever
    /// reads `num_pages`/`num_page_dp`/`tuple_count` back from dir_index 0's
    /// physical page — also re-persists dir_index 0 whenever `dir_index`
    /// isn't already 0, so its header never goes stale relative to a
    /// mutation that only touched a later directory block.
    fn persist_directory_and_header(&self, state: &TableState, dir_index: usize) -> StorageResult<()> {
        self.persist_directory_page(state, dir_index)?;
        if dir_index != 0 {
            self.persist_directory_page(state, 0)?;
        }
        Ok(())
    }

    /// Inserts `record`'s current payload into the table and assigns it a
    /// fresh `Rid`, stamped onto `record.id`.
    pub fn insert_record(&self, record: &mut Record) -> StorageResult<()> {
        let record_size = self.schema.record_size();
        let max = max_entries_per_dp();
        let mut state = self.state.lock().unwrap();

        let target_page = state
            .directory
            .iter()
            .find_position(|e| e.has_free_slot)
            .map(|(i, _)| i);

        let current_page = match target_page {
            Some(page) => page,
            None => {
                let page = state.directory.len();
                state.directory.push(PageDirectoryEntry {
                    page_id: page as i32,
                    has_free_slot: true,
                    free_space: PAGE_SIZE as i32,
                    record_count: 0,
                });
                // A freshly pushed page may be the first one to fall into a
                // directory block `num_page_dp` hasn't accounted for yet.
                // Bump it immediately — not on a later insert — so that the
                // header persisted below already reflects this page's
                // existence, even if the table closes right after this call.
                let dir_index = page / max;
                if dir_index >= state.num_page_dp {
                    state.num_page_dp = dir_index + 1;
                }
                page
            }
        };

        let physical = physical_page_index(current_page) as crate::common::config::PageId;
        let mut page = self.bpm.fetch_pooled(physical)?;

        let entry = &mut state.directory[current_page];
        let slot = {
            let data = page.get_data();
            (0..entry.record_count as usize).find(|&s| SlotDirectoryEntry::read(&data, s).is_free)
        };
        let slot = match slot {
            Some(s) => s,
            None => {
                let s = entry.record_count as usize;
                entry.record_count += 1;
                s
            }
        };

        let offset = payload_offset(slot + 1, record_size);
        {
            let mut data = page.get_data_mut();
            SlotDirectoryEntry::write(
                &mut data,
                slot,
                SlotDirectoryEntry {
                    offset: offset as i32,
                    is_free: false,
                },
            );
            data[offset..offset + record_size].copy_from_slice(&record.data);
        }

        entry.free_space -= (record_size + SLOT_ENTRY_SIZE) as i32;
        Self::recompute_has_free_slot(entry, record_size);
        let dir_index = current_page / max;
        drop(page);
        // Bump the live tuple count before persisting so the directory
        // page's header reflects the post-insert count.
        self.tuple_count.fetch_add(1, Ordering::SeqCst);
        self.persist_directory_and_header(&state, dir_index)?;

        record.id = Rid {
            page: current_page as i32,
            slot: slot as i32,
        };
        debug!(table = %self.name, rid = ?record.id, "inserted record");
        Ok(())
    }

    /// Marks `rid`'s slot free and returns its space to the owning page's
    /// directory entry.
    pub fn delete_record(&self, rid: Rid) -> StorageResult<()> {
        if !rid.is_valid() {
            return Err(StorageError::InvalidRid(rid));
        }
        let mut state = self.state.lock().unwrap();
        let page_idx = rid.page as usize;
        if page_idx >= state.directory.len() {
            return Err(StorageError::InvalidRid(rid));
        }

        let physical = physical_page_index(page_idx) as crate::common::config::PageId;
        let mut page = self.bpm.fetch_pooled(physical)?;

        let slot = rid.slot as usize;
        let entry = &mut state.directory[page_idx];
        if slot >= entry.record_count as usize {
            return Err(StorageError::InvalidRid(rid));
        }
        let slot_entry = {
            let data = page.get_data();
            SlotDirectoryEntry::read(&data, slot)
        };
        if slot_entry.is_free {
            return Err(StorageError::RecordNotFound(rid));
        }

        {
            let mut data = page.get_data_mut();
            SlotDirectoryEntry::write(
                &mut data,
                slot,
                SlotDirectoryEntry {
                    offset: slot_entry.offset,
                    is_free: true,
                },
            );
        }

        entry.free_space += slot_entry.offset - (slot as i32) * (SLOT_ENTRY_SIZE as i32);
        entry.has_free_slot = true;
        let dir_index = page_idx / max_entries_per_dp();
        drop(page);
        // Bump the live tuple count before persisting so the directory
        // page's header reflects the post-delete count.
        self.tuple_count.fetch_sub(1, Ordering::SeqCst);
        self.persist_directory_and_header(&state, dir_index)?;

        debug!(table = %self.name, ?rid, "deleted record");
        Ok(())
    }

    /// Overwrites the record at `record.id` with `record`'s current
    /// payload. Falls back to delete-then-insert (which changes `record.id`
    /// in place) if the new payload no longer fits in the space the slot
    /// currently holds — in practice unreachable for this schema model,
    /// since every record of a given schema is always exactly
    /// `schema.record_size()` bytes, but kept for fidelity to the source
    /// algorithm (§4.5).
    pub fn update_record(&self, record: &mut Record) -> StorageResult<()> {
        let rid = record.id;
        if !rid.is_valid() {
            return Err(StorageError::InvalidRid(rid));
        }
        let record_size = self.schema.record_size();
        let page_idx = rid.page as usize;
        let slot = rid.slot as usize;

        let (offset, available) = {
            let state = self.state.lock().unwrap();
            let entry = state
                .directory
                .get(page_idx)
                .ok_or(StorageError::InvalidRid(rid))?;
            if slot >= entry.record_count as usize {
                return Err(StorageError::InvalidRid(rid));
            }
            let physical = physical_page_index(page_idx) as crate::common::config::PageId;
            let page = self.bpm.fetch_pooled(physical)?;
            let slot_entry = SlotDirectoryEntry::read(&page.get_data(), slot);
            if slot_entry.is_free {
                return Err(StorageError::RecordNotFound(rid));
            }
            let footprint = slot_entry.offset - (slot as i32) * (SLOT_ENTRY_SIZE as i32);
            (slot_entry.offset, entry.free_space + footprint)
        };

        if (record_size as i32) > available {
            self.delete_record(rid)?;
            return self.insert_record(record);
        }

        let physical = physical_page_index(page_idx) as crate::common::config::PageId;
        let mut page = self.bpm.fetch_pooled(physical)?;
        {
            let mut data = page.get_data_mut();
            data[offset as usize..offset as usize + record_size].copy_from_slice(&record.data);
        }
        debug!(table = %self.name, ?rid, "updated record in place");
        Ok(())
    }

    /// Reads the record at `rid` into a fresh `Record`.
    pub fn get_record(&self, rid: Rid) -> StorageResult<Record> {
        if !rid.is_valid() {
            return Err(StorageError::InvalidRid(rid));
        }
        let page_idx = rid.page as usize;
        let slot = rid.slot as usize;
        let record_count = {
            let state = self.state.lock().unwrap();
            state
                .directory
                .get(page_idx)
                .map(|e| e.record_count)
                .ok_or(StorageError::InvalidRid(rid))?
        };
        if slot >= record_count as usize {
            return Err(StorageError::InvalidRid(rid));
        }

        let physical = physical_page_index(page_idx) as crate::common::config::PageId;
        let page = self.bpm.fetch_pooled(physical)?;
        let slot_entry = SlotDirectoryEntry::read(&page.get_data(), slot);
        if slot_entry.is_free {
            return Err(StorageError::RecordNotFound(rid));
        }

        let record_size = self.schema.record_size();
        let offset = slot_entry.offset as usize;
        let data = page.get_data()[offset..offset + record_size].to_vec();
        Ok(Record { id: rid, data })
    }

    /// Starts a sequential scan over every live record in the table,
    /// filtered by `predicate` (`None` accepts every record).
    pub fn start_scan(self: &Arc<Self>, predicate: Option<Box<dyn crate::record::expr::Predicate + Send + Sync>>) -> Scan {
        Scan::new(Arc::clone(self), predicate)
    }

    pub(crate) fn bpm(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    pub(crate) fn record_count_for_scan(&self, page: usize) -> StorageResult<i32> {
        self.record_count(page)
    }
}
