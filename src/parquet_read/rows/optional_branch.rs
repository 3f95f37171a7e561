use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet_read::predicate::Predicate;
use crate::parquet_read::rows::reader::Reader;
use crate::parquet_read::rows::FieldIterator;
use std::sync::Arc;

/// A required or optional group. Its children advance in lockstep, one
/// occurrence each per occurrence of the group. A child running out before
/// its siblings is a malformed file.
pub struct OptionalBranchIterator<T> {
    /// Decoded children, in schema order.
    children: Vec<(Arc<str>, Box<dyn FieldIterator<T>>)>,
    reader: Arc<dyn Reader<T>>,
    max_def_level: u16,
}

impl<T> Clone for OptionalBranchIterator<T> {
    fn clone(&self) -> Self {
        Self {
            children: self
                .children
                .iter()
                .map(|(name, child)| (name.clone(), child.boxed_clone()))
                .collect(),
            reader: self.reader.clone(),
            max_def_level: self.max_def_level,
        }
    }
}

impl<T> OptionalBranchIterator<T> {
    /// `children` must not be empty: a group is only read through a column
    /// below it.
    pub fn new(
        children: Vec<(Arc<str>, Box<dyn FieldIterator<T>>)>,
        reader: Arc<dyn Reader<T>>,
        max_def_level: u16,
    ) -> Self {
        debug_assert!(!children.is_empty());
        Self {
            children,
            reader,
            max_def_level,
        }
    }

    pub fn max_definition_level(&self) -> u16 {
        self.max_def_level
    }

    fn child(&self, name: &str) -> Option<&dyn FieldIterator<T>> {
        self.children
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, c)| c.as_ref())
    }

    fn check_aligned(&self) -> ParquetResult<()> {
        if let Some((name, _)) = self.children.iter().find(|(_, c)| !c.has_next()) {
            if self.children.iter().any(|(_, c)| c.has_next()) {
                return Err(fmt_err!(
                    MalformedFile,
                    "column {:?} ran out of values before its siblings",
                    name
                ));
            }
        }
        Ok(())
    }
}

impl<T: 'static> FieldIterator<T> for OptionalBranchIterator<T> {
    fn has_next(&self) -> bool {
        self.children.iter().any(|(_, c)| c.has_next())
    }

    fn peek_definition_level(&self) -> u16 {
        self.children
            .iter()
            .map(|(_, c)| c.peek_definition_level())
            .max()
            .unwrap_or(0)
    }

    fn peek_repetition_level(&self) -> u16 {
        self.children
            .iter()
            .map(|(_, c)| c.peek_repetition_level())
            .max()
            .unwrap_or(0)
    }

    fn next_row_matches(&self, predicate: &Predicate) -> ParquetResult<bool> {
        self.check_aligned()?;
        predicate.branch_matches(&mut |name, sub| match self.child(name) {
            Some(child) => child.next_row_matches(sub),
            // not in the schema
            None => Ok(true),
        })
    }

    fn skip_next_row(&mut self) -> ParquetResult<()> {
        self.check_aligned()?;
        for (_, child) in self.children.iter_mut() {
            child.skip_next_row()?;
        }
        Ok(())
    }

    fn next_field(&mut self) -> ParquetResult<Option<T>> {
        if !self.has_next() {
            return Err(fmt_err!(DecodeInvariant, "group ended before its parent"));
        }
        self.check_aligned()?;
        if self.peek_definition_level() < self.max_def_level {
            self.skip_next_row()?;
            return Ok(None);
        }
        let mut builder = self.reader.branch_builder();
        for (name, child) in self.children.iter_mut() {
            let value = child.next_field()?;
            builder.put(name, value);
        }
        Ok(Some(builder.build()))
    }

    fn boxed_clone(&self) -> Box<dyn FieldIterator<T>> {
        Box::new(self.clone())
    }
}
