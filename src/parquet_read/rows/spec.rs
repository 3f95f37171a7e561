use crate::parquet_read::column_spec::ColumnSpec;
use crate::parquet_read::predicate::Predicate;
use crate::parquet_read::rows::reader::Reader;
use std::sync::Arc;

/// What to read: the reader building rows, the predicate selecting them and
/// the columns to materialize.
///
/// Every field that either the predicate or the column selection reaches is
/// decoded.
pub struct RowReadSpec<T> {
    pub reader: Arc<dyn Reader<T>>,
    pub predicate: Predicate,
    pub columns: ColumnSpec,
}

impl<T> Clone for RowReadSpec<T> {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
            predicate: self.predicate.clone(),
            columns: self.columns.clone(),
        }
    }
}

impl<T> RowReadSpec<T> {
    pub fn new(reader: Arc<dyn Reader<T>>) -> Self {
        Self {
            reader,
            predicate: Predicate::All,
            columns: ColumnSpec::All,
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_columns(mut self, columns: ColumnSpec) -> Self {
        self.columns = columns;
        self
    }

    pub fn includes_child(&self, name: &str) -> bool {
        self.predicate.includes_child(name) || self.columns.includes_child(name)
    }

    pub fn for_child(&self, name: &str) -> RowReadSpec<T> {
        RowReadSpec {
            reader: self.reader.child_reader(name),
            predicate: self.predicate.for_child(name),
            columns: self.columns.for_child(name),
        }
    }

    pub fn predicate_includes_path<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.predicate.includes_path(path)
    }

    pub fn columns_include_path<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.columns.includes_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parquet_read::rows::reader::FieldReader;

    #[test]
    fn test_children_of_predicate_and_columns() {
        let spec = RowReadSpec::new(Arc::new(FieldReader))
            .with_columns(ColumnSpec::column(["name"]))
            .with_predicate(Predicate::gt(["address", "zip"], 10000));
        assert!(spec.includes_child("name"));
        assert!(spec.includes_child("address"));
        assert!(!spec.includes_child("phone"));
        assert!(spec.predicate_includes_path(&["address", "zip"]));
        assert!(!spec.columns_include_path(&["address"]));

        let address = spec.for_child("address");
        assert!(address.includes_child("zip"));
        assert!(!address.includes_child("street"));
        assert_eq!(address.columns, ColumnSpec::None);
    }

    #[test]
    fn test_default_reads_everything() {
        let spec = RowReadSpec::new(Arc::new(FieldReader));
        assert!(spec.includes_child("anything"));
        assert!(spec.for_child("a").for_child("b").includes_child("c"));
    }
}
