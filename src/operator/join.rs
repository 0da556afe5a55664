use crate::{
    error::DbError,
    operator::OpIterator,
    predicate::JoinPredicate,
    storage::{schema::Schema, tuple::Tuple},
};

/// Nested-loop join: for every outer tuple the inner child is rewound
/// and scanned in full; matching pairs are emitted as the
/// concatenation outer + inner.
pub struct Join<O: OpIterator, I: OpIterator> {
    predicate: JoinPredicate,
    outer: O,
    inner: I,

    schema: Schema,
    current_outer: Option<Tuple>,
    last_error: Option<DbError>,
}

impl<O: OpIterator, I: OpIterator> Join<O, I> {
    pub fn new(predicate: JoinPredicate, outer: O, inner: I) -> Self {
        let schema = Schema::merge(&outer.get_schema(), &inner.get_schema());
        Self {
            predicate,
            outer,
            inner,
            schema,
            current_outer: None,
            last_error: None,
        }
    }
}

impl<O: OpIterator, I: OpIterator> Iterator for Join<O, I> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        if self.last_error.is_some() {
            return None;
        }

        loop {
            if self.current_outer.is_none() {
                match self.outer.next() {
                    Some(tuple) => {
                        self.current_outer = Some(tuple);
                        self.inner.rewind();
                    }
                    None => return None,
                }
            }

            let outer_tuple = self.current_outer.clone().unwrap();
            let left = outer_tuple.get_cell(self.predicate.left_index);

            while let Some(inner_tuple) = self.inner.next() {
                let right = inner_tuple.get_cell(self.predicate.right_index);
                match self.predicate.matches(&left, &right) {
                    Ok(true) => return Some(Tuple::merge(&outer_tuple, &inner_tuple)),
                    Ok(false) => continue,
                    Err(e) => {
                        self.last_error = Some(e);
                        return None;
                    }
                }
            }

            self.current_outer = None;
        }
    }
}

impl<O: OpIterator, I: OpIterator> OpIterator for Join<O, I> {
    fn rewind(&mut self) {
        self.outer.rewind();
        self.inner.rewind();
        self.current_outer = None;
        self.last_error = None;
    }

    fn get_schema(&self) -> Schema {
        self.schema.clone()
    }

    fn take_error(&mut self) -> Option<DbError> {
        self.last_error
            .take()
            .or_else(|| self.outer.take_error())
            .or_else(|| self.inner.take_error())
    }
}
