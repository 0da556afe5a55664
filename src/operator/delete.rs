use crate::{
    database::Database,
    error::DbError,
    operator::OpIterator,
    storage::schema::{FieldItem, Schema, Type},
    storage::tuple::{Cell, Tuple},
    transaction::Transaction,
};

/// Drains its child and deletes every tuple by record id. Emits a
/// single one-field tuple holding the delete count, then is exhausted.
pub struct Delete<C: OpIterator> {
    tx: Transaction,
    child: C,

    done: bool,
    last_error: Option<DbError>,
}

impl<C: OpIterator> Delete<C> {
    pub fn new(tx: &Transaction, child: C) -> Self {
        Self {
            tx: *tx,
            child,
            done: false,
            last_error: None,
        }
    }
}

impl<C: OpIterator> Iterator for Delete<C> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.last_error.is_some() {
            return None;
        }
        self.done = true;

        let mut count = 0;
        while let Some(tuple) = self.child.next() {
            if let Err(e) = Database::page_cache().delete_tuple(&self.tx, &tuple) {
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

impl<C: OpIterator> OpIterator for Delete<C> {
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
