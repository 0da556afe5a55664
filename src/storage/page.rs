use std::io::Cursor;

use bit_vec::BitVec;
use log::debug;

use crate::{
    error::DbError,
    io::DbWriter,
    storage::{
        page_cache::PageCache,
        page_id::HeapPageID,
        schema::Schema,
        tuple::{RecordID, Tuple},
    },
    transaction::TransactionID,
    types::{DbResult, Pod},
    utils::{ceil_div, HandyRwLock},
};

/// A fixed-size slotted page of a heap table.
///
/// On disk the page is a slot-occupancy bitmap (one bit per slot,
/// MSB-first within each byte, 1 = occupied) followed by `slot_count`
/// fixed-size tuple records. Trailing bytes beyond the last record are
/// zero.
#[derive(Debug)]
pub struct HeapPage {
    pid: HeapPageID,
    schema: Schema,

    slot_count: usize,

    // indicate slots' status: true means occupied, false means empty
    header: BitVec,

    // one entry per slot, None for empty slots
    tuples: Vec<Option<Tuple>>,

    // the transaction that made this page differ from its on-disk
    // bytes, if any
    dirty_tx: Option<TransactionID>,

    // byte image at the last commit, attached to UPDATE log records
    before_image: Vec<u8>,
}

impl HeapPage {
    pub fn new(pid: &HeapPageID, bytes: &[u8], schema: &Schema) -> Result<Self, DbError> {
        let page_size = PageCache::get_page_size();
        if bytes.len() != page_size {
            return Err(DbError::new(&format!(
                "page {} has {} bytes, expect {}",
                pid,
                bytes.len(),
                page_size
            )));
        }

        let slot_count = Self::calculate_slots_count(schema);
        let header_size = Self::calculate_header_size(slot_count);
        let header = BitVec::from_bytes(&bytes[..header_size]);

        let tuple_size = schema.get_size();
        let mut tuples = Vec::with_capacity(slot_count);
        for i in 0..slot_count {
            if !header[i] {
                tuples.push(None);
                continue;
            }

            let start = header_size + i * tuple_size;
            let mut reader = Cursor::new(&bytes[start..start + tuple_size]);
            let mut tuple = Tuple::read_from(&mut reader, schema)?;
            tuple.set_rid(Some(RecordID::new(*pid, i)));
            tuples.push(Some(tuple));
        }

        Ok(Self {
            pid: *pid,
            schema: schema.clone(),
            slot_count,
            header,
            tuples,
            dirty_tx: None,
            before_image: bytes.to_vec(),
        })
    }

    pub fn new_empty(pid: &HeapPageID, schema: &Schema) -> Self {
        let slot_count = Self::calculate_slots_count(schema);
        let header_size = Self::calculate_header_size(slot_count);

        let mut page = Self {
            pid: *pid,
            schema: schema.clone(),
            slot_count,
            header: BitVec::from_elem(header_size * 8, false),
            tuples: vec![None; slot_count],
            dirty_tx: None,
            before_image: Vec::new(),
        };
        page.before_image = page.get_page_data();
        page
    }

    pub fn empty_page_data() -> Vec<u8> {
        vec![0; PageCache::get_page_size()]
    }

    /// How many records fit on one page: each record costs its own
    /// bytes plus one header bit.
    pub fn calculate_slots_count(schema: &Schema) -> usize {
        let bits_per_tuple_including_header = schema.get_size() * 8 + 1;
        PageCache::get_page_size() * 8 / bits_per_tuple_including_header
    }

    pub fn calculate_header_size(slot_count: usize) -> usize {
        ceil_div(slot_count, 8)
    }

    pub fn get_pid(&self) -> HeapPageID {
        self.pid
    }

    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get_slots_count(&self) -> usize {
        self.slot_count
    }

    pub fn is_slot_used(&self, slot_index: usize) -> bool {
        self.header[slot_index]
    }

    pub fn mark_slot_status(&mut self, slot_index: usize, used: bool) {
        self.header.set(slot_index, used);
    }

    pub fn empty_slots_count(&self) -> usize {
        (0..self.slot_count)
            .filter(|i| !self.is_slot_used(*i))
            .count()
    }

    /// Returns the number of tuples currently stored on this page.
    pub fn tuples_count(&self) -> usize {
        self.slot_count - self.empty_slots_count()
    }

    /// Place `tuple` into the lowest-indexed free slot and return the
    /// placed copy, its record id pointing at this page.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<Tuple, DbError> {
        if let Some(rid) = tuple.get_rid() {
            return Err(DbError::new(&format!(
                "tuple is already placed at {:?}",
                rid
            )));
        }

        if !self.tuple_matches_schema(tuple) {
            return Err(DbError::new(&format!(
                "tuple {} does not match schema {}",
                tuple, self.schema
            )));
        }

        let slot = (0..self.slot_count)
            .find(|i| !self.is_slot_used(*i))
            .ok_or_else(|| DbError::new(&format!("page {} is full", self.pid)))?;

        let mut placed = tuple.clone();
        placed.set_rid(Some(RecordID::new(self.pid, slot)));

        self.tuples[slot] = Some(placed.clone());
        self.mark_slot_status(slot, true);

        debug!("tuple {} placed into slot {} of {}", placed, slot, self.pid);
        Ok(placed)
    }

    /// Clear the slot the tuple's record id points at.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> DbResult {
        let rid = tuple
            .get_rid()
            .ok_or_else(|| DbError::new("tuple has no record id"))?;

        if rid.pid != self.pid {
            return Err(DbError::new(&format!(
                "record id {:?} does not reference page {}",
                rid, self.pid
            )));
        }

        if rid.slot >= self.slot_count || !self.is_slot_used(rid.slot) {
            return Err(DbError::new(&format!(
                "slot {} of page {} is not in use",
                rid.slot, self.pid
            )));
        }

        self.tuples[rid.slot] = None;
        self.mark_slot_status(rid.slot, false);
        Ok(())
    }

    fn tuple_matches_schema(&self, tuple: &Tuple) -> bool {
        if tuple.cells_count() != self.schema.fields_count() {
            return false;
        }

        tuple.get_cells().iter().enumerate().all(|(i, cell)| {
            matches!(
                (cell, self.schema.get_field_type(i)),
                (crate::storage::tuple::Cell::Int32(_), crate::storage::schema::Type::Int)
                    | (crate::storage::tuple::Cell::Str(_), crate::storage::schema::Type::Str(_))
            )
        })
    }

    /// Serialize header and slot bodies back to exactly one page worth
    /// of bytes. Empty slots and the trailing remainder are zero.
    pub fn get_page_data(&self) -> Vec<u8> {
        let tuple_size = self.schema.get_size();

        let mut writer = DbWriter::new();
        writer.write_bytes(&self.header.to_bytes());
        for slot in &self.tuples {
            match slot {
                Some(tuple) => writer.write_bytes(&tuple.to_bytes(&self.schema)),
                None => writer.write_bytes(&vec![0; tuple_size]),
            }
        }

        writer.to_padded_bytes(PageCache::get_page_size())
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionID) {
        if dirty {
            self.dirty_tx = Some(tid);
        } else {
            self.dirty_tx = None;
        }
    }

    /// The transaction that dirtied this page, or None if the page
    /// matches its on-disk bytes.
    pub fn is_dirty(&self) -> Option<TransactionID> {
        self.dirty_tx
    }

    /// Snapshot the current bytes as the committed image. Called after
    /// a successful flush at commit.
    pub fn set_before_image(&mut self) {
        self.before_image = self.get_page_data();
    }

    pub fn get_before_image(&self) -> Vec<u8> {
        self.before_image.clone()
    }

    pub fn iterator(&self) -> HeapPageIterator<'_> {
        HeapPageIterator::new(self)
    }

    /// Hex dump of the first bytes of the page, for log lines.
    pub fn short_hex_repr(&self) -> String {
        let data = self.get_page_data();
        let end = data.len().min(16);
        hex::encode(&data[..end])
    }
}

/// Yields occupied slots in ascending slot order.
pub struct HeapPageIterator<'page> {
    page: &'page HeapPage,
    cursor: usize,
}

impl<'page> HeapPageIterator<'page> {
    pub fn new(page: &'page HeapPage) -> Self {
        Self { page, cursor: 0 }
    }
}

impl Iterator for HeapPageIterator<'_> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.page.slot_count {
            let cursor = self.cursor;
            self.cursor += 1;

            if self.page.is_slot_used(cursor) {
                return self.page.tuples[cursor].clone();
            }
        }
        None
    }
}

/// Same as [`HeapPageIterator`], but over a shared page handle. Takes
/// the read lock once per step, so writers are not starved during long
/// scans.
pub struct HeapPageIteratorRc {
    page: Pod<HeapPage>,
    cursor: usize,
    slot_count: usize,
}

impl HeapPageIteratorRc {
    pub fn new(page: Pod<HeapPage>) -> Self {
        let slot_count = page.rl().get_slots_count();
        Self {
            page,
            cursor: 0,
            slot_count,
        }
    }
}

impl Iterator for HeapPageIteratorRc {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        let page = self.page.rl();
        while self.cursor < self.slot_count {
            let cursor = self.cursor;
            self.cursor += 1;

            if page.is_slot_used(cursor) {
                return page.tuples[cursor].clone();
            }
        }
        None
    }
}
