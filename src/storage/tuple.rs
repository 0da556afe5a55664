use std::{
    cmp::Ordering,
    convert::TryInto,
    fmt,
    hash::{Hash, Hasher},
};

use itertools::Itertools;

use crate::{
    error::DbError,
    io::read_exact,
    storage::{
        page_id::HeapPageID,
        schema::{Schema, Type},
    },
};

/// A single field value.
#[derive(Clone, Debug)]
pub enum Cell {
    Int32(i32),
    Str(String),
}

impl Cell {
    pub fn get_int32(&self) -> Result<i32, DbError> {
        match self {
            Cell::Int32(v) => Ok(*v),
            _ => Err(DbError::new("cell is not an int")),
        }
    }

    pub fn get_string(&self) -> Result<String, DbError> {
        match self {
            Cell::Str(v) => Ok(v.clone()),
            _ => Err(DbError::new("cell is not a string")),
        }
    }

    /// Serialize under the given declared type.
    ///
    /// Ints are 4 big-endian bytes. A string of declared width `n` is a
    /// 4-byte big-endian length `L`, the characters, then `n - 4 - L`
    /// zero bytes; oversized strings are truncated to the declared
    /// width.
    pub fn to_bytes(&self, t: &Type) -> Vec<u8> {
        match (self, t) {
            (Cell::Int32(v), Type::Int) => v.to_be_bytes().to_vec(),
            (Cell::Str(v), Type::Str(width)) => {
                let capacity = width - 4;
                let mut payload = v.as_bytes().to_vec();
                payload.truncate(capacity);

                let mut buf = Vec::with_capacity(*width);
                buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                buf.extend_from_slice(&payload);
                buf.resize(*width, 0);
                buf
            }
            _ => panic!("cell {:?} does not match type {:?}", self, t),
        }
    }

    pub fn read_from<R: std::io::Read>(reader: &mut R, t: &Type) -> Result<Cell, DbError> {
        match t {
            Type::Int => {
                let bytes = read_exact(reader, 4);
                Ok(Cell::Int32(i32::from_be_bytes(bytes.try_into().unwrap())))
            }
            Type::Str(width) => {
                let len_bytes = read_exact(reader, 4);
                let len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
                if len > width - 4 {
                    return Err(DbError::new(&format!(
                        "string length {} exceeds declared width {}",
                        len, width
                    )));
                }

                let body = read_exact(reader, width - 4);
                let payload = body[..len].to_vec();
                let s = String::from_utf8(payload)
                    .map_err(|_| DbError::new("string cell is not valid utf-8"))?;
                Ok(Cell::Str(s))
            }
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Int32(a), Cell::Int32(b)) => a == b,
            (Cell::Str(a), Cell::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Cell::Int32(a), Cell::Int32(b)) => a.partial_cmp(b),
            (Cell::Str(a), Cell::Str(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Cell::Int32(v) => v.hash(state),
            Cell::Str(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cell::Int32(v) => write!(f, "{}", v),
            Cell::Str(v) => write!(f, "{:?}", v),
        }
    }
}

/// Where a placed tuple lives: the page plus the slot within it.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RecordID {
    pub pid: HeapPageID,
    pub slot: usize,
}

impl RecordID {
    pub fn new(pid: HeapPageID, slot: usize) -> Self {
        Self { pid, slot }
    }
}

/// An ordered list of cells, optionally carrying the record id of the
/// slot it occupies. Tuples produced by scans have a record id; tuples
/// assembled by operators (join output, fresh inserts) do not until
/// they are placed on a page.
#[derive(Clone)]
pub struct Tuple {
    cells: Vec<Cell>,
    rid: Option<RecordID>,
}

impl Tuple {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells, rid: None }
    }

    pub fn read_from<R: std::io::Read>(reader: &mut R, schema: &Schema) -> Result<Self, DbError> {
        let mut cells = Vec::with_capacity(schema.fields_count());
        for field in schema.get_fields() {
            cells.push(Cell::read_from(reader, &field.field_type)?);
        }
        Ok(Tuple { cells, rid: None })
    }

    /// A tuple of `width` int cells, all holding `value`. Test helper.
    pub fn new_int_tuple(value: i32, width: usize) -> Self {
        Tuple::new(vec![Cell::Int32(value); width])
    }

    pub fn get_cell(&self, i: usize) -> Cell {
        self.cells[i].clone()
    }

    pub fn get_cells(&self) -> Vec<Cell> {
        self.cells.clone()
    }

    pub fn cells_count(&self) -> usize {
        self.cells.len()
    }

    pub fn get_rid(&self) -> Option<RecordID> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Option<RecordID>) {
        self.rid = rid;
    }

    /// Serialize all cells under `schema`, back to back.
    pub fn to_bytes(&self, schema: &Schema) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(schema.get_size());
        for (cell, field) in self.cells.iter().zip(schema.get_fields()) {
            bytes.extend_from_slice(&cell.to_bytes(&field.field_type));
        }
        bytes
    }

    /// Concatenate two tuples, left cells first. The result is unplaced.
    pub fn merge(left: &Tuple, right: &Tuple) -> Tuple {
        let mut cells = left.cells.clone();
        cells.extend(right.cells.iter().cloned());
        Tuple::new(cells)
    }

    /// Test helper: compare against a plain row of ints.
    pub fn equal_cells(&self, expect: &[i32]) -> bool {
        if self.cells.len() != expect.len() {
            return false;
        }

        self.cells
            .iter()
            .zip(expect.iter())
            .all(|(c, e)| matches!(c, Cell::Int32(v) if v == e))
    }
}

/// Equality ignores placement, only the cells are compared.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let content = self.cells.iter().map(|c| format!("{}", c)).join(", ");
        write!(f, "{{{}}}", content)
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
