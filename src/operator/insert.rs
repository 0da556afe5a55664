use crate::{
    database::Database,
    error::DbError,
    operator::OpIterator,
    storage::schema::{FieldItem, Schema, Type},
    storage::tuple::{Cell, Tuple},
    transaction::Transaction,
};

/// Drains its child and inserts every tuple into the named table.
/// Emits a single one-field tuple holding the insert count, then is
/// exhausted.
pub struct Insert<C: OpIterator> {
    tx: Transaction,
    table_id: u32,
    child: C,

    done: bool,
    last_error: Option<DbError>,
}

impl<C: OpIterator> Insert<C> {
    pub fn new(tx: &Transaction, table_id: u32, child: C) -> Self {
        Self {
            tx: *tx,
            table_id,
            child,
            done: false,
            last_error: None,
        }
    }
}

impl<C: OpIterator> Iterator for Insert<C> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.last_error.is_some() {
            return None;
        }
        self.done = true;

        let mut count = 0;
        while let Some(mut tuple) = self.child.next() {
            // the copy gets a fresh slot, wherever it came from
            tuple.set_rid(None);

            if let Err(e) = Database::page_cache().insert_tuple(&self.tx, self.table_id, &tuple) {
                self.last_error = Some(e);
                return None;
            }
            count += 1;
        }

        if let Some(e) = self.child.take_error() {
            self.last_error = Some(e);
            return None;
        }

        Some(Tuple::new(vec![Cell::Int32(count)]))
    }
}

impl<C: OpIterator> OpIterator for Insert<C> {
    fn rewind(&mut self) {
        self.child.rewind();
        self.done = false;
        self.last_error = None;
    }

    fn get_schema(&self) -> Schema {
        Schema::new(vec![FieldItem::new(Type::Int, "count")])
    }

    fn take_error(&mut self) -> Option<DbError> {
        self.last_error.take()
    }
}
