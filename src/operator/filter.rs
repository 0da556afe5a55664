use crate::{
    error::DbError,
    operator::OpIterator,
    predicate::Predicate,
    storage::{schema::Schema, tuple::Tuple},
};

/// Passes through the child tuples that satisfy the predicate.
pub struct Filter<C: OpIterator> {
    predicate: Predicate,
    child: C,
    last_error: Option<DbError>,
}

impl<C: OpIterator> Filter<C> {
    pub fn new(predicate: Predicate, child: C) -> Self {
        Self {
            predicate,
            child,
            last_error: None,
        }
    }
}

impl<C: OpIterator> Iterator for Filter<C> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        if self.last_error.is_some() {
            return None;
        }

        while let Some(tuple) = self.child.next() {
            let cell = tuple.get_cell(self.predicate.field_index);
            match self.predicate.matches(&cell) {
                Ok(true) => return Some(tuple),
                Ok(false) => continue,
                Err(e) => {
                    // a type mismatch aborts the statement, not the
                    // whole transaction
                    self.last_error = Some(e);
                    return None;
                }
            }
        }
        None
    }
}

impl<C: OpIterator> OpIterator for Filter<C> {
    fn rewind(&mut self) {
        self.child.rewind();
        self.last_error = None;
    }

    fn get_schema(&self) -> Schema {
        self.child.get_schema()
    }

    fn take_error(&mut self) -> Option<DbError> {
        self.last_error.take().or_else(|| self.child.take_error())
    }
}
