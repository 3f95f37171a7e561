use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet_read::predicate::Predicate;
use crate::parquet_read::rows::optional_branch::OptionalBranchIterator;
use crate::parquet_read::rows::reader::Reader;
use crate::parquet_read::rows::FieldIterator;
use std::sync::Arc;

/// A repeated group: a list whose elements are read by an inner group
/// iterator.
pub struct RepeatedBranchIterator<T> {
    element: OptionalBranchIterator<T>,
    reader: Arc<dyn Reader<T>>,
    max_rep_level: u16,
}

impl<T> Clone for RepeatedBranchIterator<T> {
    fn clone(&self) -> Self {
        Self {
            element: self.element.clone(),
            reader: self.reader.clone(),
            max_rep_level: self.max_rep_level,
        }
    }
}

impl<T: 'static> RepeatedBranchIterator<T> {
    pub fn new(
        element: OptionalBranchIterator<T>,
        reader: Arc<dyn Reader<T>>,
        max_rep_level: u16,
    ) -> Self {
        Self {
            element,
            reader,
            max_rep_level,
        }
    }

    fn is_empty_list(element: &OptionalBranchIterator<T>) -> bool {
        element.peek_definition_level() < element.max_definition_level()
    }

    fn continues(&self, element: &OptionalBranchIterator<T>) -> bool {
        element.has_next() && element.peek_repetition_level() >= self.max_rep_level
    }

    fn check_has_next(&self) -> ParquetResult<()> {
        if self.element.has_next() {
            Ok(())
        } else {
            Err(fmt_err!(DecodeInvariant, "repeated group ended before its parent"))
        }
    }
}

impl<T: 'static> FieldIterator<T> for RepeatedBranchIterator<T> {
    fn has_next(&self) -> bool {
        self.element.has_next()
    }

    fn peek_definition_level(&self) -> u16 {
        self.element.peek_definition_level()
    }

    fn peek_repetition_level(&self) -> u16 {
        self.element.peek_repetition_level()
    }

    /// Matches when any element of the next list does.
    fn next_row_matches(&self, predicate: &Predicate) -> ParquetResult<bool> {
        if predicate.is_all() {
            return Ok(true);
        }
        self.check_has_next()?;
        if Self::is_empty_list(&self.element) {
            return Ok(false);
        }
        let mut element = self.element.clone();
        loop {
            if element.next_row_matches(predicate)? {
                return Ok(true);
            }
            element.skip_next_row()?;
            if !self.continues(&element) {
                return Ok(false);
            }
        }
    }

    fn skip_next_row(&mut self) -> ParquetResult<()> {
        self.check_has_next()?;
        loop {
            self.element.skip_next_row()?;
            if !self.continues(&self.element) {
                return Ok(());
            }
        }
    }

    /// Always a collection, possibly empty.
    fn next_field(&mut self) -> ParquetResult<Option<T>> {
        self.check_has_next()?;
        let mut list = self.reader.collection_builder();
        if Self::is_empty_list(&self.element) {
            self.element.skip_next_row()?;
            return Ok(Some(list.build()));
        }
        loop {
            match self.element.next_field()? {
                Some(element) => list.add(element),
                None => {
                    return Err(fmt_err!(
                        DecodeInvariant,
                        "null element in a repeated group"
                    ))
                }
            }
            if !self.continues(&self.element) {
                break;
            }
        }
        Ok(Some(list.build()))
    }

    fn boxed_clone(&self) -> Box<dyn FieldIterator<T>> {
        Box::new(self.clone())
    }
}
