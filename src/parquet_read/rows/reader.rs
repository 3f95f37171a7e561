//! Callbacks that turn assembled fields into caller types.
//!
//! A [`Reader`] is handed the schema top-down: it is asked for the reader of
//! each child, for builders of groups and lists, and for the conversion of
//! leaf values.

use crate::parquet::error::ParquetResult;
use crate::parquet::value::Value;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

pub trait Reader<T>: Send + Sync {
    /// The reader of the field `name` of a group read by this reader.
    fn child_reader(&self, name: &str) -> Arc<dyn Reader<T>>;

    fn branch_builder(&self) -> Box<dyn BranchBuilder<T>>;

    fn collection_builder(&self) -> Box<dyn CollectionBuilder<T>>;

    fn leaf(&self, value: Value) -> ParquetResult<T>;
}

/// Collects the fields of one group. Absent or null fields are put as `None`.
pub trait BranchBuilder<T> {
    fn put(&mut self, name: &str, value: Option<T>);

    fn build(self: Box<Self>) -> T;
}

/// Collects the elements of one repeated field, in order.
pub trait CollectionBuilder<T> {
    fn add(&mut self, value: T);

    fn build(self: Box<Self>) -> T;
}

/// Discards everything, yielding `T::default()`.
///
/// Typed readers return it for fields they do not know.
pub struct NoOpReader<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> NoOpReader<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for NoOpReader<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct NoOpBuilder<T>(PhantomData<fn() -> T>);

impl<T: Default> BranchBuilder<T> for NoOpBuilder<T> {
    fn put(&mut self, _name: &str, _value: Option<T>) {}

    fn build(self: Box<Self>) -> T {
        T::default()
    }
}

impl<T: Default> CollectionBuilder<T> for NoOpBuilder<T> {
    fn add(&mut self, _value: T) {}

    fn build(self: Box<Self>) -> T {
        T::default()
    }
}

impl<T: Default + 'static> Reader<T> for NoOpReader<T> {
    fn child_reader(&self, _name: &str) -> Arc<dyn Reader<T>> {
        Arc::new(NoOpReader::<T>::new())
    }

    fn branch_builder(&self) -> Box<dyn BranchBuilder<T>> {
        Box::new(NoOpBuilder(PhantomData))
    }

    fn collection_builder(&self) -> Box<dyn CollectionBuilder<T>> {
        Box::new(NoOpBuilder(PhantomData))
    }

    fn leaf(&self, _value: Value) -> ParquetResult<T> {
        Ok(T::default())
    }
}

/// A dynamically typed field of a row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Field {
    #[default]
    Null,
    Value(Value),
    /// Fields of a group, in schema order.
    Group(Vec<(String, Field)>),
    List(Vec<Field>),
}

impl Field {
    /// The field `name` of a group.
    pub fn get(&self, name: &str) -> Option<&Field> {
        match self {
            Field::Group(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, f)| f),
            _ => None,
        }
    }

    /// Follows `path` through nested groups.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Field> {
        path.iter().try_fold(self, |field, name| field.get(name.as_ref()))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Field]> {
        match self {
            Field::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Null => write!(f, "null"),
            Field::Value(Value::String(s)) => write!(f, "{:?}", s),
            Field::Value(v) => write!(f, "{}", v),
            Field::Group(fields) => {
                write!(f, "{{")?;
                for (i, (name, field)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, field)?;
                }
                write!(f, "}}")
            }
            Field::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Reads rows into [`Field`] trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldReader;

struct GroupBuilder(Vec<(String, Field)>);

impl BranchBuilder<Field> for GroupBuilder {
    fn put(&mut self, name: &str, value: Option<Field>) {
        self.0.push((name.to_string(), value.unwrap_or(Field::Null)));
    }

    fn build(self: Box<Self>) -> Field {
        Field::Group(self.0)
    }
}

struct ListBuilder(Vec<Field>);

impl CollectionBuilder<Field> for ListBuilder {
    fn add(&mut self, value: Field) {
        self.0.push(value);
    }

    fn build(self: Box<Self>) -> Field {
        Field::List(self.0)
    }
}

impl Reader<Field> for FieldReader {
    fn child_reader(&self, _name: &str) -> Arc<dyn Reader<Field>> {
        Arc::new(FieldReader)
    }

    fn branch_builder(&self) -> Box<dyn BranchBuilder<Field>> {
        Box::new(GroupBuilder(Vec::new()))
    }

    fn collection_builder(&self) -> Box<dyn CollectionBuilder<Field>> {
        Box::new(ListBuilder(Vec::new()))
    }

    fn leaf(&self, value: Value) -> ParquetResult<Field> {
        Ok(Field::Value(value))
    }
}
