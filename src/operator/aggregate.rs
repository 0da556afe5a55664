use std::{
    collections::{hash_map::Entry, HashMap},
    fmt,
};

use crate::{
    error::DbError,
    operator::OpIterator,
    storage::schema::{FieldItem, Schema, Type},
    storage::tuple::{Cell, Tuple},
    types::DbResult,
};

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Count,
    Avg,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Sum => "SUM",
            AggregateOp::Count => "COUNT",
            AggregateOp::Avg => "AVG",
        };
        write!(f, "{}", repr)
    }
}

/// The running state of one group. COUNT never looks at the value, so
/// it works for any column type; the arithmetic ops demand ints.
enum Accumulator {
    Min(i32),
    Max(i32),
    Sum(i32),
    Count(usize),
    Avg { sum: i32, count: usize },
}

impl Accumulator {
    /// Initialize from the first value of the group.
    fn new(op: AggregateOp, cell: &Cell) -> Result<Self, DbError> {
        match op {
            AggregateOp::Count => Ok(Accumulator::Count(1)),
            AggregateOp::Min => Ok(Accumulator::Min(cell.get_int32()?)),
            AggregateOp::Max => Ok(Accumulator::Max(cell.get_int32()?)),
            AggregateOp::Sum => Ok(Accumulator::Sum(cell.get_int32()?)),
            AggregateOp::Avg => Ok(Accumulator::Avg {
                sum: cell.get_int32()?,
                count: 1,
            }),
        }
    }

    fn merge(&mut self, cell: &Cell) -> DbResult {
        match self {
            Accumulator::Count(count) => *count += 1,
            Accumulator::Min(min) => *min = (*min).min(cell.get_int32()?),
            Accumulator::Max(max) => *max = (*max).max(cell.get_int32()?),
            Accumulator::Sum(sum) => *sum += cell.get_int32()?,
            Accumulator::Avg { sum, count } => {
                *sum += cell.get_int32()?;
                *count += 1;
            }
        }
        Ok(())
    }

    fn emit(&self) -> i32 {
        match self {
            Accumulator::Count(count) => *count as i32,
            Accumulator::Min(min) => *min,
            Accumulator::Max(max) => *max,
            Accumulator::Sum(sum) => *sum,
            // integer average, computed at emission time
            Accumulator::Avg { sum, count } => sum / (*count as i32),
        }
    }
}

/// Grouped aggregation over one column of the child.
///
/// With a group-by column the output is one `(group value, aggregate)`
/// tuple per distinct group, in no particular order; without one it is
/// a single one-field tuple. The aggregate column may be a string only
/// for COUNT.
#[derive(Debug)]
pub struct Aggregate<C: OpIterator> {
    child: C,
    agg_field: usize,
    group_field: Option<usize>,
    op: AggregateOp,

    schema: Schema,
    results: Option<std::vec::IntoIter<Tuple>>,
    last_error: Option<DbError>,
}

impl<C: OpIterator> Aggregate<C> {
    pub fn new(
        child: C,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self, DbError> {
        let child_schema = child.get_schema();

        if let Type::Str(_) = child_schema.get_field_type(agg_field) {
            if op != AggregateOp::Count {
                return Err(DbError::unsupported(&format!(
                    "{} is not defined on string column {}",
                    op,
                    child_schema.get_field_name(agg_field)
                )));
            }
        }

        let agg_item = FieldItem::new(
            Type::Int,
            &format!("{}({})", op, child_schema.get_field_name(agg_field)),
        );
        let schema = match group_field {
            Some(g) => Schema::new(vec![child_schema.get_field(g).clone(), agg_item]),
            None => Schema::new(vec![agg_item]),
        };

        Ok(Self {
            child,
            agg_field,
            group_field,
            op,
            schema,
            results: None,
            last_error: None,
        })
    }

    /// Drain the child and fold every tuple into its group's
    /// accumulator.
    fn compute(&mut self) -> Result<Vec<Tuple>, DbError> {
        let mut groups: HashMap<Option<Cell>, Accumulator> = HashMap::new();

        while let Some(tuple) = self.child.next() {
            let key = self.group_field.map(|g| tuple.get_cell(g));
            let value = tuple.get_cell(self.agg_field);

            match groups.entry(key) {
                Entry::Occupied(mut entry) => entry.get_mut().merge(&value)?,
                Entry::Vacant(entry) => {
                    entry.insert(Accumulator::new(self.op, &value)?);
                }
            }
        }

        if let Some(e) = self.child.take_error() {
            return Err(e);
        }

        let results = groups
            .into_iter()
            .map(|(key, acc)| {
                let agg = Cell::Int32(acc.emit());
                match key {
                    Some(group) => Tuple::new(vec![group, agg]),
                    None => Tuple::new(vec![agg]),
                }
            })
            .collect();
        Ok(results)
    }
}

impl<C: OpIterator> Iterator for Aggregate<C> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        if self.last_error.is_some() {
            return None;
        }

        if self.results.is_none() {
            match self.compute() {
                Ok(results) => self.results = Some(results.into_iter()),
                Err(e) => {
                    self.last_error = Some(e);
                    return None;
                }
            }
        }

        self.results.as_mut().unwrap().next()
    }
}

impl<C: OpIterator> OpIterator for Aggregate<C> {
    fn rewind(&mut self) {
        self.child.rewind();
        self.results = None;
        self.last_error = None;
    }

    fn get_schema(&self) -> Schema {
        self.schema.clone()
    }

    fn take_error(&mut self) -> Option<DbError> {
        self.last_error.take()
    }
}
