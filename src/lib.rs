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
//! Row-oriented reading of Apache Parquet files.
//!
//! A [`ParquetFileReader`] decodes the footer once and hands out
//! [`RowGroupReader`]s. Rows are reassembled from the column chunks a
//! [`RowReadSpec`] selects, in whatever shape its [`Reader`] builds, and rows
//! its [`Predicate`] rejects are skipped without being assembled.
//!
//! Column chunks can also be pruned without decoding any data page:
//! [`ColumnChunkReader::might_contain`] checks statistics first and only then
//! falls back to the bloom filter and the dictionary.

pub mod parquet;
pub mod parquet_read;

pub use parquet::col_type::{ColumnType, LogicalType, PhysicalType, TimeUnit};
pub use parquet::compression::{Compression, Decompressor};
pub use parquet::error::{ParquetError, ParquetErrorCause, ParquetErrorExt, ParquetResult};
pub use parquet::io::{ByteRangeReader, FileReader, InMemoryReader};
pub use parquet::value::Value;
pub use parquet_read::column_chunk::ColumnChunkReader;
pub use parquet_read::file::ParquetFileReader;
pub use parquet_read::column_spec::ColumnSpec;
pub use parquet_read::predicate::{CompareOp, Predicate};
pub use parquet_read::row_group::RowGroupReader;
pub use parquet_read::rows::json::JsonReader;
pub use parquet_read::rows::reader::{
    BranchBuilder, CollectionBuilder, Field, FieldReader, NoOpReader, Reader,
};
pub use parquet_read::rows::spec::RowReadSpec;
pub use parquet_read::rows::RowIterator;
pub use parquet_read::ReadOptions;
