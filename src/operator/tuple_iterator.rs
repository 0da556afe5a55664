use crate::{
    error::DbError,
    operator::OpIterator,
    storage::{schema::Schema, tuple::Tuple},
};

/// An operator over an in-memory list of tuples. The leaf for INSERT
/// statements with literal rows, and handy as a fixture.
#[derive(Debug)]
pub struct TupleIterator {
    schema: Schema,
    tuples: Vec<Tuple>,
    cursor: usize,
}

impl TupleIterator {
    pub fn new(schema: Schema, tuples: Vec<Tuple>) -> Self {
        Self {
            schema,
            tuples,
            cursor: 0,
        }
    }
}

impl Iterator for TupleIterator {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        let tuple = self.tuples.get(self.cursor).cloned();
        if tuple.is_some() {
            self.cursor += 1;
        }
        tuple
    }
}

impl OpIterator for TupleIterator {
    fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn get_schema(&self) -> Schema {
        self.schema.clone()
    }

    fn take_error(&mut self) -> Option<DbError> {
        None
    }
}
