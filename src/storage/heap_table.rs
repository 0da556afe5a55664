use std::{
    collections::hash_map::DefaultHasher,
    collections::HashMap,
    fs::{File, OpenOptions},
    hash::{Hash, Hasher},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use log::debug;

use crate::{
    database::Database,
    error::DbError,
    storage::{
        page::{HeapPage, HeapPageIteratorRc},
        page_cache::PageCache,
        page_id::HeapPageID,
        schema::Schema,
        tuple::Tuple,
    },
    transaction::{Permission, Transaction},
    types::ResultPod,
    utils::HandyRwLock,
};

/// One table, stored as a file of heap pages. Page `n` occupies bytes
/// `[n * page_size, (n + 1) * page_size)`.
///
/// Pages appended past the end of the file live in the overflow map
/// until they are flushed; the on-disk length stays authoritative for
/// everything below it.
pub struct HeapTable {
    pub name: String,

    path: PathBuf,
    file: Mutex<File>,

    table_id: u32,

    pub schema: Schema,

    // fresh pages beyond EOF, keyed by page index
    overflow: Mutex<HashMap<usize, Vec<u8>>>,
}

impl HeapTable {
    pub fn new<P: AsRef<Path>>(file_path: P, schema: &Schema) -> Result<Self, DbError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&file_path)?;

        let path = file_path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| file_path.as_ref().to_path_buf());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed".to_string());

        Ok(Self {
            name,
            table_id: stable_table_id(&path),
            path,
            file: Mutex::new(file),
            schema: schema.clone(),
            overflow: Mutex::new(HashMap::new()),
        })
    }

    pub fn get_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    fn disk_pages_count(&self) -> Result<usize, DbError> {
        let file = self.file.lock().unwrap();
        let len = file.metadata()?.len() as usize;
        Ok(len / PageCache::get_page_size())
    }

    /// Total pages addressable right now: what is on disk plus the
    /// appended-but-unflushed tail.
    pub fn pages_count(&self) -> usize {
        let disk = self.disk_pages_count().unwrap_or(0);
        let overflow = self.overflow.lock().unwrap();
        match overflow.keys().max() {
            Some(max_index) => disk.max(max_index + 1),
            None => disk,
        }
    }

    /// Number of tuples stored across all pages. Walks the table under
    /// the given transaction; test and diagnostics helper.
    pub fn tuples_count(&self, tx: &Transaction) -> usize {
        self.iter(tx).count()
    }

    /// Read the page's bytes and parse them. Pages in the overflow map
    /// are served from memory; anything else must be inside the file.
    pub fn read_page(&self, pid: &HeapPageID) -> Result<HeapPage, DbError> {
        {
            let overflow = self.overflow.lock().unwrap();
            if let Some(bytes) = overflow.get(&pid.page_index) {
                return HeapPage::new(pid, bytes, &self.schema);
            }
        }

        let page_size = PageCache::get_page_size();
        let mut file = self.file.lock().unwrap();

        let disk_pages = file.metadata()?.len() as usize / page_size;
        if pid.page_index >= disk_pages {
            return Err(DbError::new(&format!(
                "page {} is out of range, table {} has {} pages on disk",
                pid, self.table_id, disk_pages
            )));
        }

        file.seek(SeekFrom::Start((pid.page_index * page_size) as u64))?;
        let mut bytes = vec![0u8; page_size];
        file.read_exact(&mut bytes)?;

        HeapPage::new(pid, &bytes, &self.schema)
    }

    /// Write one page's bytes at its offset and drop it from the
    /// overflow map; from here on the disk owns it.
    pub fn write_page_to_disk(&self, pid: &HeapPageID, bytes: &[u8]) -> Result<(), DbError> {
        let page_size = PageCache::get_page_size();
        if bytes.len() != page_size {
            return Err(DbError::new(&format!(
                "refusing to write {} bytes as page {}, expect {}",
                bytes.len(),
                pid,
                page_size
            )));
        }

        {
            let mut file = self.file.lock().unwrap();
            file.seek(SeekFrom::Start((pid.page_index * page_size) as u64))?;
            file.write_all(bytes)?;
            file.flush()?;
        }

        self.overflow.lock().unwrap().remove(&pid.page_index);
        debug!("page {} written to {}", pid, self.name);
        Ok(())
    }

    /// Register a fresh empty page past the current tail and hand back
    /// its id. The file itself grows only when the page is flushed.
    fn append_empty_page(&self) -> Result<HeapPageID, DbError> {
        let mut overflow = self.overflow.lock().unwrap();

        let disk_pages = {
            let file = self.file.lock().unwrap();
            file.metadata()?.len() as usize / PageCache::get_page_size()
        };
        let page_index = overflow
            .keys()
            .max()
            .map(|m| m + 1)
            .unwrap_or(0)
            .max(disk_pages);

        overflow.insert(page_index, HeapPage::empty_page_data());
        debug!("table {} grows to page {}", self.name, page_index);
        Ok(HeapPageID::new(self.table_id, page_index))
    }

    /// Place the tuple on the first page with room, requesting each
    /// candidate read-write; append a new page when every existing one
    /// is full. Returns the dirtied page.
    pub fn insert_tuple(&self, tx: &Transaction, tuple: &Tuple) -> ResultPod<HeapPage> {
        for page_index in 0..self.pages_count() {
            let pid = HeapPageID::new(self.table_id, page_index);
            let page_rc = Database::page_cache().get_page(tx, Permission::ReadWrite, &pid)?;

            let has_room = page_rc.rl().empty_slots_count() > 0;
            if has_room {
                let mut page = page_rc.wl();
                page.insert_tuple(tuple)?;
                page.mark_dirty(true, tx.get_id());
                drop(page);
                return Ok(page_rc);
            }
        }

        let pid = self.append_empty_page()?;
        let page_rc = Database::page_cache().get_page(tx, Permission::ReadWrite, &pid)?;
        {
            let mut page = page_rc.wl();
            page.insert_tuple(tuple)?;
            page.mark_dirty(true, tx.get_id());
        }
        Ok(page_rc)
    }

    /// Clear the slot the tuple's record id points at. Returns the
    /// dirtied page.
    pub fn delete_tuple(&self, tx: &Transaction, tuple: &Tuple) -> ResultPod<HeapPage> {
        let rid = tuple
            .get_rid()
            .ok_or_else(|| DbError::new("cannot delete a tuple that has no record id"))?;

        if rid.pid.get_table_id() != self.table_id {
            return Err(DbError::new(&format!(
                "record id {:?} does not belong to table {}",
                rid, self.table_id
            )));
        }

        let page_rc = Database::page_cache().get_page(tx, Permission::ReadWrite, &rid.pid)?;
        {
            let mut page = page_rc.wl();
            page.delete_tuple(tuple)?;
            page.mark_dirty(true, tx.get_id());
        }
        Ok(page_rc)
    }

    pub fn iter<'table, 'tx: 'table>(&'table self, tx: &'tx Transaction) -> HeapTableIterator<'tx, 'table> {
        HeapTableIterator::new(tx, self)
    }
}

/// Derive the table id from the absolute file path, stable for the
/// process lifetime.
fn stable_table_id(path: &Path) -> u32 {
    let mut hasher = DefaultHasher::new();
    path.to_string_lossy().hash(&mut hasher);
    hasher.finish() as u32
}

/// Walks all tuples of a table in page order, then slot order. Each
/// page is requested with read intent as the walk reaches it; pages
/// already consumed stay locked until the transaction completes, per
/// strict two-phase locking.
pub struct HeapTableIterator<'tx, 'table> {
    tx: &'tx Transaction,
    table: &'table HeapTable,

    page_index: usize,
    page_iter: Option<HeapPageIteratorRc>,
    last_error: Option<DbError>,
}

impl<'tx, 'table> HeapTableIterator<'tx, 'table> {
    pub fn new(tx: &'tx Transaction, table: &'table HeapTable) -> Self {
        Self {
            tx,
            table,
            page_index: 0,
            page_iter: None,
            last_error: None,
        }
    }

    /// Restart from page 0.
    pub fn rewind(&mut self) {
        self.page_index = 0;
        self.page_iter = None;
        self.last_error = None;
    }

    /// The error (typically a deadlock abort) that cut the walk short,
    /// if any. The walk simply ends on error; callers that care check
    /// here afterwards.
    pub fn take_error(&mut self) -> Option<DbError> {
        self.last_error.take()
    }

    fn open_page(&mut self, page_index: usize) -> bool {
        let pid = HeapPageID::new(self.table.get_id(), page_index);
        match Database::page_cache()
            .get_page(self.tx, Permission::ReadOnly, &pid)
        {
            Ok(page_rc) => {
                self.page_index = page_index;
                self.page_iter = Some(HeapPageIteratorRc::new(page_rc));
                true
            }
            Err(e) => {
                self.last_error = Some(e);
                self.page_iter = None;
                false
            }
        }
    }
}

impl Iterator for HeapTableIterator<'_, '_> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        if self.last_error.is_some() {
            return None;
        }

        loop {
            if let Some(iter) = &mut self.page_iter {
                if let Some(tuple) = iter.next() {
                    return Some(tuple);
                }
            }

            let next_index = match self.page_iter {
                None => self.page_index,
                Some(_) => self.page_index + 1,
            };
            if next_index >= self.table.pages_count() {
                return None;
            }

            if !self.open_page(next_index) {
                return None;
            }
        }
    }
}
