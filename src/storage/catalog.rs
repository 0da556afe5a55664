use std::collections::HashMap;

use crate::{
    storage::{heap_table::HeapTable, schema::Schema},
    types::Pod,
    utils::HandyRwLock,
};

type TableID = u32;
type TableRC = Pod<HeapTable>;

/// In-memory map from table id to the table, its schema and its name.
/// Stable for the process lifetime; persistence is someone else's
/// problem.
pub struct Catalog {
    tables: HashMap<TableID, TableRC>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn add_table(&mut self, table_rc: TableRC) {
        let id = table_rc.rl().get_id();
        self.tables.insert(id, table_rc);
    }

    pub fn get_table(&self, table_id: &TableID) -> Option<TableRC> {
        self.tables.get(table_id).cloned()
    }

    pub fn get_schema(&self, table_id: &TableID) -> Option<Schema> {
        self.tables
            .get(table_id)
            .map(|table| table.rl().get_schema().clone())
    }

    pub fn get_table_name(&self, table_id: &TableID) -> Option<String> {
        self.tables
            .get(table_id)
            .map(|table| table.rl().get_name().to_string())
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}
