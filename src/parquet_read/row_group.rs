/*******************************************************************************
 *     ___                  _   ____  ____
 *    / _ \ _   _  ___  ___| |_|  _ \| __ )
 *   | | | | | | |/ _ \/ __| __| | | |  _ \
 *   | |_| | |_| |  __/\__ \ |_| |_| | |_) |
 *    \__\_\\__,_|\___||___/\__|____/|____/
 *
 *  Copyright (c) 2014-2019 Appsicle
 *  Copyright (c) 2019-2024 QuestDB
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *  http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 *
 ******************************************************************************/
use crate::parquet::col_type::ColumnType;
use crate::parquet::error::{fmt_err, ParquetErrorExt, ParquetResult};
use crate::parquet::io::ByteRangeReader;
use crate::parquet::value::Value;
use crate::parquet_read::column_chunk::ColumnChunkReader;
use crate::parquet_read::meta::RowGroupMetaData;
use crate::parquet_read::rows::cursor::LeafCursor;
use crate::parquet_read::rows::spec::RowReadSpec;
use crate::parquet_read::rows::{included_leaves, RowIterator};
use crate::parquet_read::schema::{NodeId, SchemaTree};
use crate::parquet_read::ReadOptions;
use dashmap::DashMap;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// Reads one row group. Column chunk readers are created on first use and
/// cached, so their dictionaries and bloom filters are fetched once.
pub struct RowGroupReader {
    reader: Arc<dyn ByteRangeReader>,
    schema: Arc<SchemaTree>,
    meta: Arc<RowGroupMetaData>,
    index: usize,
    options: ReadOptions,
    /// Leaf node ids in column chunk order.
    leaves: Arc<[NodeId]>,
    chunks: DashMap<usize, Arc<ColumnChunkReader>>,
}

impl RowGroupReader {
    pub(crate) fn new(
        reader: Arc<dyn ByteRangeReader>,
        schema: Arc<SchemaTree>,
        leaves: Arc<[NodeId]>,
        meta: Arc<RowGroupMetaData>,
        index: usize,
        options: ReadOptions,
    ) -> Self {
        Self {
            reader,
            schema,
            meta,
            index,
            options,
            leaves,
            chunks: DashMap::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn num_rows(&self) -> u64 {
        self.meta.num_rows
    }

    pub fn metadata(&self) -> &RowGroupMetaData {
        &self.meta
    }

    /// Position of the column chunk of the leaf at `path`.
    pub fn column_index<S: AsRef<str>>(&self, path: &[S]) -> Option<usize> {
        let node = self.schema.get(path)?;
        self.leaves.iter().position(|id| *id == node.id)
    }

    pub fn column_type<S: AsRef<str>>(&self, path: &[S]) -> ParquetResult<Option<ColumnType>> {
        match self.schema.get(path) {
            Some(node) if node.is_leaf() => node.column_type().map(Some),
            _ => Ok(None),
        }
    }

    /// The reader of the column chunk at `path`, `None` when the schema has
    /// no leaf there.
    pub fn column_chunk<S: AsRef<str>>(
        &self,
        path: &[S],
    ) -> ParquetResult<Option<Arc<ColumnChunkReader>>> {
        match self.column_index(path) {
            Some(idx) => self.column_chunk_at(idx).map(Some),
            None => Ok(None),
        }
    }

    fn column_chunk_at(&self, idx: usize) -> ParquetResult<Arc<ColumnChunkReader>> {
        if let Some(chunk) = self.chunks.get(&idx) {
            return Ok(chunk.clone());
        }
        let node = self.schema.node(self.leaves[idx]);
        let meta = self.meta.columns.get(idx).ok_or_else(|| {
            fmt_err!(
                MalformedFile,
                "row group {} has no column chunk {}",
                self.index,
                idx
            )
        })?;
        let col_type = node
            .column_type()
            .with_context(|_| format!("column {}", meta.path_in_schema.join(".")))?;
        let chunk = Arc::new(ColumnChunkReader::new(
            self.reader.clone(),
            Arc::new(meta.clone()),
            col_type,
            node.max_def_level,
            node.max_rep_level,
            self.options,
        ));
        Ok(self.chunks.entry(idx).or_insert(chunk).clone())
    }

    /// Whether the column at `path` may hold `value` in this row group.
    /// Unknown columns are never ruled out.
    pub async fn might_contain<S: AsRef<str>>(
        &self,
        path: &[S],
        value: &Value,
    ) -> ParquetResult<bool> {
        match self.column_chunk(path)? {
            Some(chunk) => chunk.might_contain(value).await,
            None => Ok(true),
        }
    }

    /// Fetches the pages of every column `spec` reaches, concurrently, and
    /// returns an iterator over the matching rows.
    pub async fn rows<T: 'static>(&self, spec: &RowReadSpec<T>) -> ParquetResult<RowIterator<T>> {
        let leaves = included_leaves(&self.schema, spec);
        let fetches = leaves.iter().map(|id| async move {
            let idx = self
                .leaves
                .iter()
                .position(|leaf| leaf == id)
                .ok_or_else(|| fmt_err!(MalformedFile, "schema leaf {} has no column", id))?;
            let pages = self.column_chunk_at(idx)?.read_pages().await?;
            Ok::<_, crate::parquet::error::ParquetError>((*id, LeafCursor::try_new(pages)?))
        });
        let cursors = try_join_all(fetches)
            .await
            .with_context(|_| format!("could not read row group {}", self.index))?
            .into_iter()
            .collect::<HashMap<_, _>>();
        log::debug!(
            "reading row group {} with {} of {} columns",
            self.index,
            cursors.len(),
            self.leaves.len()
        );
        RowIterator::try_new(&self.schema, spec, cursors, self.meta.num_rows)
    }
}
