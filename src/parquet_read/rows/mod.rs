//! Row assembly: rebuilds nested records from the repetition and definition
//! levels of the leaf columns.
//!
//! The schema is mirrored by a tree of [`FieldIterator`]s. Leaves walk the
//! slots of one column chunk; groups advance their children in lockstep and
//! use the peeked levels to tell null groups and empty lists apart from
//! present ones. Rows rejected by the predicate are skipped without being
//! built.

pub mod cursor;
pub mod json;
pub mod optional_branch;
pub mod optional_value;
pub mod reader;
pub mod repeated_branch;
pub mod repeated_value;
pub mod spec;

use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet_read::predicate::Predicate;
use crate::parquet_read::rows::cursor::LeafCursor;
use crate::parquet_read::rows::optional_branch::OptionalBranchIterator;
use crate::parquet_read::rows::optional_value::OptionalValueIterator;
use crate::parquet_read::rows::reader::Reader;
use crate::parquet_read::rows::repeated_branch::RepeatedBranchIterator;
use crate::parquet_read::rows::repeated_value::RepeatedValueIterator;
use crate::parquet_read::rows::spec::RowReadSpec;
use crate::parquet_read::schema::{NodeId, Repetition, SchemaTree};
use std::collections::HashMap;
use std::sync::Arc;

/// One node of the assembly tree.
///
/// An occurrence of a field spans one slot per leaf below it, plus the
/// slots of any repeated elements after the first. Every method works in
/// whole occurrences.
pub trait FieldIterator<T>: Send {
    fn has_next(&self) -> bool;

    /// Definition level of the next slot.
    fn peek_definition_level(&self) -> u16;

    /// Repetition level of the next slot.
    fn peek_repetition_level(&self) -> u16;

    /// Evaluates `predicate`, already narrowed to this field, against the
    /// next occurrence without consuming it.
    fn next_row_matches(&self, predicate: &Predicate) -> ParquetResult<bool>;

    fn skip_next_row(&mut self) -> ParquetResult<()>;

    /// Consumes and builds the next occurrence, `None` when it is null.
    fn next_field(&mut self) -> ParquetResult<Option<T>>;

    fn boxed_clone(&self) -> Box<dyn FieldIterator<T>>;
}

/// Leaf columns to decode for `spec`: every leaf reached by its predicate or
/// column selection.
pub fn included_leaves<T>(schema: &SchemaTree, spec: &RowReadSpec<T>) -> Vec<NodeId> {
    fn visit(
        schema: &SchemaTree,
        id: NodeId,
        predicate: &Predicate,
        columns: &crate::parquet_read::column_spec::ColumnSpec,
        out: &mut Vec<NodeId>,
    ) {
        for child in schema.children(id) {
            let name = child.name();
            if !(predicate.includes_child(name) || columns.includes_child(name)) {
                continue;
            }
            if child.is_leaf() {
                out.push(child.id);
            } else {
                visit(
                    schema,
                    child.id,
                    &predicate.for_child(name),
                    &columns.for_child(name),
                    out,
                );
            }
        }
    }
    let mut out = Vec::new();
    visit(
        schema,
        SchemaTree::ROOT,
        &spec.predicate,
        &spec.columns,
        &mut out,
    );
    out
}

/// Builds the iterator of the group `id`. `None` when no leaf below it is
/// decoded.
fn build_group<T: 'static>(
    schema: &SchemaTree,
    id: NodeId,
    spec: &RowReadSpec<T>,
    cursors: &mut HashMap<NodeId, LeafCursor>,
) -> ParquetResult<Option<OptionalBranchIterator<T>>> {
    let mut children: Vec<(Arc<str>, Box<dyn FieldIterator<T>>)> = Vec::new();
    for child in schema.children(id) {
        let name = child.name();
        if !spec.includes_child(name) {
            continue;
        }
        let child_spec = spec.for_child(name);
        let iterator: Box<dyn FieldIterator<T>> = if child.is_leaf() {
            let cursor = cursors.remove(&child.id).ok_or_else(|| {
                fmt_err!(MalformedFile, "no column chunk for field {:?}", name)
            })?;
            match child.repetition() {
                Repetition::Repeated => {
                    Box::new(RepeatedValueIterator::new(cursor, child_spec.reader))
                }
                _ => Box::new(OptionalValueIterator::new(cursor, child_spec.reader)),
            }
        } else {
            let Some(group) = build_group(schema, child.id, &child_spec, cursors)? else {
                continue;
            };
            match child.repetition() {
                Repetition::Repeated => Box::new(RepeatedBranchIterator::new(
                    group,
                    child_spec.reader,
                    child.max_rep_level,
                )),
                _ => Box::new(group),
            }
        };
        children.push((Arc::from(name), iterator));
    }
    if children.is_empty() {
        return Ok(None);
    }
    let node = schema.node(id);
    Ok(Some(OptionalBranchIterator::new(
        children,
        spec.reader.clone(),
        node.max_def_level,
    )))
}

/// Iterates the rows of one row group that match a predicate.
///
/// Fused after the first error.
pub struct RowIterator<T> {
    root: Option<OptionalBranchIterator<T>>,
    predicate: Predicate,
    reader: Arc<dyn Reader<T>>,
    /// Rows of the row group not yet consumed, matching or not.
    remaining_rows: u64,
    failed: bool,
}

impl<T: 'static> RowIterator<T> {
    /// Assembles rows from `cursors`, which must hold a cursor for every leaf
    /// [`included_leaves`] returns for `spec`. The columns must hold exactly
    /// `num_rows` records; when `spec` selects no column at all, `num_rows`
    /// empty groups are yielded.
    pub fn try_new(
        schema: &SchemaTree,
        spec: &RowReadSpec<T>,
        mut cursors: HashMap<NodeId, LeafCursor>,
        num_rows: u64,
    ) -> ParquetResult<Self> {
        let root = build_group(schema, SchemaTree::ROOT, spec, &mut cursors)?;
        Ok(Self {
            root,
            predicate: spec.predicate.clone(),
            reader: spec.reader.clone(),
            remaining_rows: num_rows,
            failed: false,
        })
    }

    fn read_next(&mut self) -> ParquetResult<Option<T>> {
        let Some(root) = self.root.as_mut() else {
            if self.remaining_rows == 0 {
                return Ok(None);
            }
            self.remaining_rows -= 1;
            return Ok(Some(self.reader.branch_builder().build()));
        };
        loop {
            if !root.has_next() {
                if self.remaining_rows != 0 {
                    return Err(fmt_err!(
                        MalformedFile,
                        "columns ended {} rows short of the row group",
                        self.remaining_rows
                    ));
                }
                return Ok(None);
            }
            if self.remaining_rows == 0 {
                return Err(fmt_err!(
                    MalformedFile,
                    "columns hold more rows than the row group declares"
                ));
            }
            self.remaining_rows -= 1;
            if root.next_row_matches(&self.predicate)? {
                break;
            }
            root.skip_next_row()?;
        }
        match root.next_field()? {
            Some(row) => Ok(Some(row)),
            None => Err(fmt_err!(DecodeInvariant, "row root decoded as null")),
        }
    }
}

impl<T: 'static> Iterator for RowIterator<T> {
    type Item = ParquetResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_next() {
            Ok(row) => row.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
