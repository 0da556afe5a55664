use std::fmt;

use crate::{error::DbError, storage::tuple::Cell};

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Op {
    Equals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    Like,
    NotEquals,
}

impl Op {
    /// Evaluate `left op right`.
    ///
    /// `Like` is substring containment and is only defined on strings;
    /// comparing cells of different types is a storage error.
    pub fn eval(&self, left: &Cell, right: &Cell) -> Result<bool, DbError> {
        if let Op::Like = self {
            return match (left, right) {
                (Cell::Str(l), Cell::Str(r)) => Ok(l.contains(r.as_str())),
                _ => Err(DbError::unsupported("LIKE is only defined on strings")),
            };
        }

        let ordering = left
            .partial_cmp(right)
            .ok_or_else(|| DbError::new("cannot compare cells of different types"))?;

        let result = match self {
            Op::Equals => ordering == std::cmp::Ordering::Equal,
            Op::GreaterThan => ordering == std::cmp::Ordering::Greater,
            Op::GreaterThanOrEq => ordering != std::cmp::Ordering::Less,
            Op::LessThan => ordering == std::cmp::Ordering::Less,
            Op::LessThanOrEq => ordering != std::cmp::Ordering::Greater,
            Op::NotEquals => ordering != std::cmp::Ordering::Equal,
            Op::Like => unreachable!(),
        };
        Ok(result)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Op::Equals => "=",
            Op::GreaterThan => ">",
            Op::GreaterThanOrEq => ">=",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::Like => "LIKE",
            Op::NotEquals => "<>",
        };
        write!(f, "{}", repr)
    }
}

/// Compares one field of a tuple against a literal.
#[derive(Clone)]
pub struct Predicate {
    pub field_index: usize,
    pub op: Op,
    pub cell: Cell,
}

impl Predicate {
    pub fn new(field_index: usize, op: Op, cell: &Cell) -> Self {
        Self {
            field_index,
            op,
            cell: cell.clone(),
        }
    }

    pub fn matches(&self, cell: &Cell) -> Result<bool, DbError> {
        self.op.eval(cell, &self.cell)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "f[{}] {} {}", self.field_index, self.op, self.cell)
    }
}

/// Compares a field of the outer tuple against a field of the inner
/// tuple.
#[derive(Clone)]
pub struct JoinPredicate {
    pub left_index: usize,
    pub op: Op,
    pub right_index: usize,
}

impl JoinPredicate {
    pub fn new(left_index: usize, op: Op, right_index: usize) -> Self {
        Self {
            left_index,
            op,
            right_index,
        }
    }

    pub fn matches(&self, left: &Cell, right: &Cell) -> Result<bool, DbError> {
        self.op.eval(left, right)
    }
}

impl fmt::Display for JoinPredicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "outer[{}] {} inner[{}]",
            self.left_index, self.op, self.right_index
        )
    }
}
