use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet_read::predicate::Predicate;
use crate::parquet_read::rows::cursor::LeafCursor;
use crate::parquet_read::rows::reader::Reader;
use crate::parquet_read::rows::FieldIterator;
use std::sync::Arc;

/// A repeated leaf. Each occurrence is a list spanning the first slot and
/// every following slot repeated at the leaf's own level.
pub struct RepeatedValueIterator<T> {
    cursor: LeafCursor,
    reader: Arc<dyn Reader<T>>,
}

impl<T> Clone for RepeatedValueIterator<T> {
    fn clone(&self) -> Self {
        Self {
            cursor: self.cursor.clone(),
            reader: self.reader.clone(),
        }
    }
}

impl<T> RepeatedValueIterator<T> {
    pub fn new(cursor: LeafCursor, reader: Arc<dyn Reader<T>>) -> Self {
        Self { cursor, reader }
    }

    /// Whether the cursor still rests within the current list.
    fn continues(cursor: &LeafCursor) -> bool {
        cursor.has_next() && cursor.repetition_level() >= cursor.max_repetition_level()
    }

    fn check_has_next(&self) -> ParquetResult<()> {
        if self.cursor.has_next() {
            Ok(())
        } else {
            Err(fmt_err!(DecodeInvariant, "column ended before its parent"))
        }
    }
}

impl<T: 'static> FieldIterator<T> for RepeatedValueIterator<T> {
    fn has_next(&self) -> bool {
        self.cursor.has_next()
    }

    fn peek_definition_level(&self) -> u16 {
        self.cursor.definition_level()
    }

    fn peek_repetition_level(&self) -> u16 {
        self.cursor.repetition_level()
    }

    /// Matches when any element of the next list does.
    fn next_row_matches(&self, predicate: &Predicate) -> ParquetResult<bool> {
        if predicate.is_all() {
            return Ok(true);
        }
        self.check_has_next()?;
        let mut cursor = self.cursor.clone();
        loop {
            if !cursor.is_null() && cursor.value_matches(predicate)? {
                return Ok(true);
            }
            cursor.advance()?;
            if !Self::continues(&cursor) {
                return Ok(false);
            }
        }
    }

    fn skip_next_row(&mut self) -> ParquetResult<()> {
        self.check_has_next()?;
        loop {
            self.cursor.advance()?;
            if !Self::continues(&self.cursor) {
                return Ok(());
            }
        }
    }

    /// Always a collection: slots below the leaf's definition level stand
    /// for an empty list and add no element.
    fn next_field(&mut self) -> ParquetResult<Option<T>> {
        self.check_has_next()?;
        let mut list = self.reader.collection_builder();
        loop {
            if let Some(value) = self.cursor.value()? {
                list.add(self.reader.leaf(value.clone())?);
            }
            self.cursor.advance()?;
            if !Self::continues(&self.cursor) {
                break;
            }
        }
        Ok(Some(list.build()))
    }

    fn boxed_clone(&self) -> Box<dyn FieldIterator<T>> {
        Box::new(self.clone())
    }
}
