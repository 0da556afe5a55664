use std::fmt;

use itertools::Itertools;

/// Field type of a column. Both variants are fixed width: ints are 4
/// bytes, strings occupy their declared width on disk (4-byte length
/// prefix + characters + zero padding).
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Type {
    Int,
    Str(usize),
}

/// Declared width for string columns when the caller does not care.
pub const DEFAULT_STRING_WIDTH: usize = 32;

impl Type {
    /// On-disk width of a field of this type, in bytes.
    pub fn get_size(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::Str(width) => *width,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldItem {
    pub field_type: Type,
    pub field_name: String,
}

impl FieldItem {
    pub fn new(field_type: Type, field_name: &str) -> Self {
        Self {
            field_type,
            field_name: field_name.to_string(),
        }
    }
}

/// An ordered list of column types with optional names. Two schemas are
/// interchangeable whenever their type sequences agree, regardless of
/// how the columns are named.
#[derive(Clone, Debug)]
pub struct Schema {
    fields: Vec<FieldItem>,
}

impl Schema {
    pub fn new(fields: Vec<FieldItem>) -> Self {
        Self { fields }
    }

    pub fn get_fields(&self) -> &Vec<FieldItem> {
        &self.fields
    }

    pub fn get_field(&self, i: usize) -> &FieldItem {
        &self.fields[i]
    }

    pub fn get_field_type(&self, i: usize) -> Type {
        self.fields[i].field_type
    }

    pub fn get_field_name(&self, i: usize) -> &str {
        &self.fields[i].field_name
    }

    pub fn fields_count(&self) -> usize {
        self.fields.len()
    }

    /// Size in bytes of a tuple with this schema.
    pub fn get_size(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.get_size()).sum()
    }

    /// Concatenate two schemas, left fields first.
    pub fn merge(left: &Schema, right: &Schema) -> Schema {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        Schema { fields }
    }

    /// A copy of this schema with every field name prefixed
    /// "alias.name", the shape a scan presents to the operators above
    /// it.
    pub fn alias_prefixed(&self, alias: &str) -> Schema {
        let fields = self
            .fields
            .iter()
            .map(|f| FieldItem::new(f.field_type, &format!("{}.{}", alias, f.field_name)))
            .collect();
        Schema { fields }
    }
}

impl PartialEq for Schema {
    /// Names are irrelevant, only the type sequences are compared.
    fn eq(&self, other: &Self) -> bool {
        if self.fields.len() != other.fields.len() {
            return false;
        }

        self.fields
            .iter()
            .zip(other.fields.iter())
            .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let content = self
            .fields
            .iter()
            .map(|field| format!("{}({:?})", field.field_name, field.field_type))
            .join(", ");
        write!(f, "[{}]", content)
    }
}

/// A schema of `columns` int fields, named `<prefix>0`, `<prefix>1`, ...
pub fn small_int_schema(columns: usize, prefix: &str) -> Schema {
    let mut fields = Vec::new();
    for i in 0..columns {
        fields.push(FieldItem::new(Type::Int, &format!("{}{}", prefix, i)));
    }
    Schema::new(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_equality_ignores_names() {
        let a = small_int_schema(3, "a");
        let b = small_int_schema(3, "b");
        assert_eq!(a, b);

        let c = small_int_schema(2, "a");
        assert_ne!(a, c);

        let d = Schema::new(vec![
            FieldItem::new(Type::Int, "x"),
            FieldItem::new(Type::Str(DEFAULT_STRING_WIDTH), "y"),
        ]);
        assert_ne!(a, d);
    }

    #[test]
    fn test_merge() {
        let a = small_int_schema(2, "a");
        let b = Schema::new(vec![FieldItem::new(Type::Str(16), "s")]);
        let merged = Schema::merge(&a, &b);

        assert_eq!(merged.fields_count(), 3);
        assert_eq!(merged.get_size(), 4 + 4 + 16);
        assert_eq!(merged.get_field_name(2), "s");
    }
}
