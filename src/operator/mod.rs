mod aggregate;
mod delete;
mod filter;
mod join;
mod seq_scan;

mod insert;
mod tuple_iterator;

pub use aggregate::{Aggregate, AggregateOp};
pub use delete::Delete;
pub use filter::Filter;
pub use insert::Insert;
pub use join::Join;
pub use seq_scan::SeqScan;
pub use tuple_iterator::TupleIterator;

use crate::{error::DbError, storage::schema::Schema, storage::tuple::Tuple};

/// A node of the pull-based operator tree.
///
/// Construction opens the operator; `next` both tests for and fetches
/// the next tuple (the usual Rust iterator contract); `rewind` resets
/// to the freshly opened state; dropping the operator closes it. An
/// operator that stops early because of an error parks that error for
/// the caller to collect via `take_error`.
pub trait OpIterator: Iterator<Item = Tuple> {
    /// Reset to the post-open state.
    fn rewind(&mut self);

    /// Schema of the tuples this operator emits.
    fn get_schema(&self) -> Schema;

    /// The error that ended iteration prematurely, if any. Draining it
    /// clears the state.
    fn take_error(&mut self) -> Option<DbError>;
}
