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
use crate::parquet::error::{fmt_err, ParquetErrorExt, ParquetResult};
use crate::parquet::io::ByteRangeReader;
use crate::parquet_read::meta::{read_footer, FileMetaData};
use crate::parquet_read::rows::spec::RowReadSpec;
use crate::parquet_read::row_group::RowGroupReader;
use crate::parquet_read::schema::{NodeId, SchemaTree};
use crate::parquet_read::ReadOptions;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use std::sync::Arc;

/// Entry point for reading a parquet file.
pub struct ParquetFileReader {
    reader: Arc<dyn ByteRangeReader>,
    metadata: Arc<FileMetaData>,
    schema: Arc<SchemaTree>,
    leaves: Arc<[NodeId]>,
    options: ReadOptions,
}

impl ParquetFileReader {
    /// Reads the footer and checks that every row group has one column chunk
    /// per schema leaf, in schema order.
    pub async fn open(reader: Arc<dyn ByteRangeReader>, options: ReadOptions) -> ParquetResult<Self> {
        let metadata = read_footer(reader.as_ref(), &options).await?;
        let schema = SchemaTree::from_elements(metadata.schema.clone())
            .context("could not read schema")?;
        let leaves: Arc<[NodeId]> = schema.leaves().map(|n| n.id).collect();
        for (i, row_group) in metadata.row_groups.iter().enumerate() {
            if row_group.columns.len() != leaves.len() {
                return Err(fmt_err!(
                    MalformedFile,
                    "row group {} has {} column chunks, the schema has {} columns",
                    i,
                    row_group.columns.len(),
                    leaves.len()
                ));
            }
            for (chunk, leaf) in row_group.columns.iter().zip(leaves.iter()) {
                if chunk.path_in_schema != schema.path(*leaf) {
                    return Err(fmt_err!(
                        MalformedFile,
                        "column chunk {} of row group {} does not match schema column {}",
                        chunk.path_in_schema.join("."),
                        i,
                        schema.path(*leaf).join(".")
                    ));
                }
            }
        }
        log::debug!(
            "opened parquet file with {} rows in {} row groups, {} columns",
            metadata.num_rows,
            metadata.row_groups.len(),
            leaves.len()
        );
        Ok(Self {
            reader,
            metadata: Arc::new(metadata),
            schema: Arc::new(schema),
            leaves,
            options,
        })
    }

    pub fn metadata(&self) -> &FileMetaData {
        &self.metadata
    }

    pub fn schema(&self) -> &SchemaTree {
        &self.schema
    }

    pub fn num_rows(&self) -> u64 {
        self.metadata.num_rows
    }

    pub fn num_row_groups(&self) -> usize {
        self.metadata.row_groups.len()
    }

    pub fn key_value_metadata(&self) -> &[(String, Option<String>)] {
        &self.metadata.key_value_metadata
    }

    pub fn created_by(&self) -> Option<&str> {
        self.metadata.created_by.as_deref()
    }

    pub fn row_group(&self, index: usize) -> Option<RowGroupReader> {
        let meta = self.metadata.row_groups.get(index)?;
        Some(RowGroupReader::new(
            self.reader.clone(),
            self.schema.clone(),
            self.leaves.clone(),
            Arc::new(meta.clone()),
            index,
            self.options,
        ))
    }

    pub fn row_groups(&self) -> impl Iterator<Item = RowGroupReader> + '_ {
        (0..self.num_row_groups()).filter_map(|i| self.row_group(i))
    }

    /// The matching rows of every row group, in file order. Row groups are
    /// fetched one after the other as the stream is polled.
    pub fn rows<T: 'static>(
        &self,
        spec: RowReadSpec<T>,
    ) -> impl Stream<Item = ParquetResult<T>> + '_ {
        let spec = Arc::new(spec);
        stream::iter(self.row_groups())
            .then(move |row_group| {
                let spec = spec.clone();
                async move { row_group.rows(&spec).await }
            })
            .map_ok(stream::iter)
            .try_flatten()
    }
}
