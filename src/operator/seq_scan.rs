use crate::{
    database::Database,
    error::DbError,
    operator::OpIterator,
    storage::{
        heap_table::HeapTable,
        page::HeapPageIteratorRc,
        page_id::HeapPageID,
        schema::Schema,
        tuple::Tuple,
    },
    transaction::{Permission, Transaction},
    types::Pod,
    utils::HandyRwLock,
};

/// Scans one table front to back on behalf of a transaction. Emitted
/// tuples keep their record ids; field names are presented as
/// "alias.name".
pub struct SeqScan {
    tx: Transaction,
    table_rc: Pod<HeapTable>,
    table_id: u32,
    schema: Schema,

    page_index: usize,
    page_iter: Option<HeapPageIteratorRc>,
    last_error: Option<DbError>,
}

impl SeqScan {
    pub fn new(tx: &Transaction, table_id: u32, table_alias: &str) -> Result<Self, DbError> {
        let table_rc = Database::catalog()
            .get_table(&table_id)
            .ok_or_else(|| DbError::new(&format!("table {} not found", table_id)))?;

        let schema = table_rc.rl().get_schema().alias_prefixed(table_alias);

        Ok(Self {
            tx: *tx,
            table_rc,
            table_id,
            schema,
            page_index: 0,
            page_iter: None,
            last_error: None,
        })
    }

    fn open_page(&mut self, page_index: usize) -> bool {
        let pid = HeapPageID::new(self.table_id, page_index);
        match Database::page_cache().get_page(&self.tx, Permission::ReadOnly, &pid) {
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

impl Iterator for SeqScan {
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
            if next_index >= self.table_rc.rl().pages_count() {
                return None;
            }

            if !self.open_page(next_index) {
                return None;
            }
        }
    }
}

impl OpIterator for SeqScan {
    fn rewind(&mut self) {
        self.page_index = 0;
        self.page_iter = None;
        self.last_error = None;
    }

    fn get_schema(&self) -> Schema {
        self.schema.clone()
    }

    fn take_error(&mut self) -> Option<DbError> {
        self.last_error.take()
    }
}
