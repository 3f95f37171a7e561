use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet_read::predicate::Predicate;
use crate::parquet_read::rows::cursor::LeafCursor;
use crate::parquet_read::rows::reader::Reader;
use crate::parquet_read::rows::FieldIterator;
use std::sync::Arc;

/// A required or optional leaf: one slot per occurrence.
pub struct OptionalValueIterator<T> {
    cursor: LeafCursor,
    reader: Arc<dyn Reader<T>>,
}

impl<T> Clone for OptionalValueIterator<T> {
    fn clone(&self) -> Self {
        Self {
            cursor: self.cursor.clone(),
            reader: self.reader.clone(),
        }
    }
}

impl<T> OptionalValueIterator<T> {
    pub fn new(cursor: LeafCursor, reader: Arc<dyn Reader<T>>) -> Self {
        Self { cursor, reader }
    }
}

impl<T: 'static> FieldIterator<T> for OptionalValueIterator<T> {
    fn has_next(&self) -> bool {
        self.cursor.has_next()
    }

    fn peek_definition_level(&self) -> u16 {
        self.cursor.definition_level()
    }

    fn peek_repetition_level(&self) -> u16 {
        self.cursor.repetition_level()
    }

    fn next_row_matches(&self, predicate: &Predicate) -> ParquetResult<bool> {
        self.cursor.value_matches(predicate)
    }

    fn skip_next_row(&mut self) -> ParquetResult<()> {
        self.cursor.advance()
    }

    fn next_field(&mut self) -> ParquetResult<Option<T>> {
        if !self.cursor.has_next() {
            return Err(fmt_err!(DecodeInvariant, "column ended before its parent"));
        }
        let value = self.cursor.value()?.cloned();
        self.cursor.advance()?;
        value.map(|v| self.reader.leaf(v)).transpose()
    }

    fn boxed_clone(&self) -> Box<dyn FieldIterator<T>> {
        Box::new(self.clone())
    }
}
