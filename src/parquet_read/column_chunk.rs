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
use crate::parquet_read::bloom_filter::{read_header, BloomFilter};
use crate::parquet_read::decoders::Dictionary;
use crate::parquet_read::meta::{ColumnChunkMetaData, PageType};
use crate::parquet_read::page::{decode_dictionary_page, split_page, PageContext, PageIterator};
use crate::parquet_read::ReadOptions;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::cmp::Ordering;
use std::sync::Arc;

type Memoized<T> = Shared<BoxFuture<'static, ParquetResult<Option<Arc<T>>>>>;

/// Reads one column chunk of a row group.
///
/// The dictionary and the bloom filter are fetched at most once, on first
/// use, and shared by every caller that awaits them concurrently.
pub struct ColumnChunkReader {
    meta: Arc<ColumnChunkMetaData>,
    context: Arc<PageContext>,
    reader: Arc<dyn ByteRangeReader>,
    dictionary: Memoized<Dictionary>,
    bloom_filter: Memoized<BloomFilter>,
}

impl ColumnChunkReader {
    pub fn new(
        reader: Arc<dyn ByteRangeReader>,
        meta: Arc<ColumnChunkMetaData>,
        col_type: ColumnType,
        max_def_level: u16,
        max_rep_level: u16,
        options: ReadOptions,
    ) -> Self {
        let context = Arc::new(PageContext {
            col_type,
            compression: meta.compression,
            max_def_level,
            max_rep_level,
            max_page_size: options.max_page_size,
            path: meta.path_in_schema.join("."),
        });
        let dictionary = {
            let reader = reader.clone();
            let meta = meta.clone();
            let context = context.clone();
            async move { load_dictionary(reader.as_ref(), &meta, &context).await }
                .boxed()
                .shared()
        };
        let bloom_filter = {
            let reader = reader.clone();
            let meta = meta.clone();
            async move { load_bloom_filter(reader.as_ref(), &meta, &options).await }
                .boxed()
                .shared()
        };
        Self {
            meta,
            context,
            reader,
            dictionary,
            bloom_filter,
        }
    }

    pub fn metadata(&self) -> &ColumnChunkMetaData {
        &self.meta
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.context.col_type
    }

    pub fn path(&self) -> &[String] {
        &self.meta.path_in_schema
    }

    /// The chunk's separate dictionary page, decoded.
    pub async fn dictionary(&self) -> ParquetResult<Option<Arc<Dictionary>>> {
        self.dictionary.clone().await
    }

    pub async fn bloom_filter(&self) -> ParquetResult<Option<Arc<BloomFilter>>> {
        self.bloom_filter.clone().await
    }

    /// The distinct values of the chunk, when every data page is dictionary
    /// encoded.
    pub async fn values_in_dictionary(&self) -> ParquetResult<Option<Vec<Value>>> {
        if !self.meta.all_data_pages_dictionary_encoded() {
            return Ok(None);
        }
        Ok(self.dictionary().await?.map(|d| d.values().to_vec()))
    }

    fn statistics_value(&self, max: bool) -> ParquetResult<Option<Value>> {
        let Some(stats) = &self.meta.statistics else {
            return Ok(None);
        };
        let col_type = &self.context.col_type;
        let bytes = if max {
            stats.max_bytes(col_type)
        } else {
            stats.min_bytes(col_type)
        };
        bytes
            .map(|b| col_type.read_stats_value(b))
            .transpose()
            .with_context(|_| {
                format!(
                    "could not decode {} statistic of column {}",
                    if max { "max" } else { "min" },
                    self.context.path
                )
            })
    }

    pub fn statistics_min(&self) -> ParquetResult<Option<Value>> {
        self.statistics_value(false)
    }

    pub fn statistics_max(&self) -> ParquetResult<Option<Value>> {
        self.statistics_value(true)
    }

    pub fn has_range_stats(&self) -> bool {
        let col_type = &self.context.col_type;
        self.meta
            .statistics
            .as_ref()
            .map(|s| s.min_bytes(col_type).is_some() && s.max_bytes(col_type).is_some())
            .unwrap_or(false)
    }

    /// `false` only when statistics show every value of the chunk is null.
    pub fn contains_non_nulls(&self) -> bool {
        match self.meta.null_count() {
            Some(nulls) => nulls < self.meta.num_values,
            None => true,
        }
    }

    /// Fetches the data pages and returns an iterator decoding them lazily.
    pub async fn read_pages(&self) -> ParquetResult<PageIterator> {
        let dictionary = self.dictionary().await?;
        let (offset, len) = self.meta.data_range();
        let len = usize::try_from(len).map_err(|_| {
            fmt_err!(MalformedFile, "column chunk of {} bytes is too large", len)
        })?;
        let data = self
            .reader
            .read_as_buffer(offset, len)
            .await
            .with_context(|_| format!("could not read pages of column {}", self.context.path))?;
        log::debug!(
            "fetched {} bytes of pages for column {} at offset {}",
            len,
            self.context.path,
            offset
        );
        Ok(PageIterator::new(
            data,
            self.meta.num_values,
            self.context.clone(),
            dictionary,
        ))
    }

    /// Whether the chunk may hold `value`. A `false` answer is definitive.
    ///
    /// Cheap evidence is consulted first: null counts, then the min/max
    /// statistics, then the bloom filter and finally the dictionary.
    pub async fn might_contain(&self, value: &Value) -> ParquetResult<bool> {
        if !self.contains_non_nulls() {
            return Ok(false);
        }
        let col_type = &self.context.col_type;
        // statistics bound the type order; a descending column sees them swapped
        let order = self.meta.sort_order;
        let (mut first, mut last) = (self.statistics_min()?, self.statistics_max()?);
        if order.descending {
            std::mem::swap(&mut first, &mut last);
        }
        if let Some(first) = first {
            if order.compare(col_type, Some(value), Some(&first)) == Some(Ordering::Less) {
                return Ok(false);
            }
        }
        if let Some(last) = last {
            if order.compare(col_type, Some(value), Some(&last)) == Some(Ordering::Greater) {
                return Ok(false);
            }
        }
        if let Some(filter) = self.bloom_filter().await? {
            if !filter.contains(col_type, value) {
                log::trace!("bloom filter of column {} rules out {}", self.context.path, value);
                return Ok(false);
            }
        }
        if self.meta.all_data_pages_dictionary_encoded() {
            if let Some(dictionary) = self.dictionary().await? {
                return Ok(dictionary.contains(col_type, value));
            }
        }
        Ok(true)
    }
}

async fn load_dictionary(
    reader: &dyn ByteRangeReader,
    meta: &ColumnChunkMetaData,
    context: &PageContext,
) -> ParquetResult<Option<Arc<Dictionary>>> {
    let Some((offset, len)) = meta.dictionary_range() else {
        return Ok(None);
    };
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= context.max_page_size.saturating_mul(2))
        .ok_or_else(|| {
            fmt_err!(
                MalformedFile,
                "dictionary of column {} spans {} bytes",
                context.path,
                len
            )
        })?;
    let data = reader.read_as_buffer(offset, len).await?;
    let (header, body, _) = split_page(&data, context.max_page_size)?;
    if PageType::from(header.type_) != PageType::DictionaryPage {
        return Err(fmt_err!(
            MalformedFile,
            "page at the dictionary offset of column {} is not a dictionary page",
            context.path
        ));
    }
    let dictionary = decode_dictionary_page(&header, body, context)?;
    log::debug!(
        "loaded dictionary of {} values for column {}",
        dictionary.len(),
        context.path
    );
    Ok(Some(Arc::new(dictionary)))
}

async fn load_bloom_filter(
    reader: &dyn ByteRangeReader,
    meta: &ColumnChunkMetaData,
    options: &ReadOptions,
) -> ParquetResult<Option<Arc<BloomFilter>>> {
    let Some(offset) = meta.bloom_filter_offset else {
        return Ok(None);
    };
    let path = meta.path_in_schema.join(".");
    let file_size = reader.total_bytes_available().await?;
    if offset >= file_size {
        return Err(fmt_err!(
            MalformedFile,
            "bloom filter of column {} starts past the end of the file",
            path
        ));
    }
    // the header is small, so fetching a little extra usually brings the
    // start of the bitset along with it
    let prefix_len = (options.bloom_header_prefetch as u64).min(file_size - offset) as usize;
    let prefix = reader.read_as_buffer(offset, prefix_len).await?;
    let (header, header_size) = read_header(&prefix)
        .with_context(|_| format!("could not read bloom filter of column {}", path))?;
    if header.num_bytes > options.max_page_size {
        return Err(fmt_err!(
            MalformedFile,
            "bloom filter of column {} declares {} bytes",
            path,
            header.num_bytes
        ));
    }
    let end = header_size + header.num_bytes;
    let bitset = if end <= prefix.len() {
        prefix[header_size..end].to_vec()
    } else {
        reader
            .read_as_buffer(offset + header_size as u64, header.num_bytes)
            .await?
            .to_vec()
    };
    log::debug!(
        "loaded bloom filter of {} bytes for column {}",
        header.num_bytes,
        path
    );
    Ok(Some(Arc::new(BloomFilter::from_header(&header, bitset)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parquet::compression::Compression;
    use crate::parquet::io::InMemoryReader;
    use crate::parquet_read::meta::{Encoding, SortingColumn, Statistics};
    use async_trait::async_trait;
    use parquet_format_safe::thrift::protocol::TCompactOutputProtocol;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// Counts fetches to prove memoization.
    struct CountingReader {
        inner: InMemoryReader,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl ByteRangeReader for CountingReader {
        async fn total_bytes_available(&self) -> ParquetResult<u64> {
            self.inner.total_bytes_available().await
        }

        async fn read_into_buffer(&self, offset: u64, buf: &mut [u8]) -> ParquetResult<usize> {
            self.reads.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.read_into_buffer(offset, buf).await
        }
    }

    fn chunk_meta(num_values: u64) -> ColumnChunkMetaData {
        ColumnChunkMetaData {
            path_in_schema: vec!["v".to_string()],
            encodings: vec![Encoding::Plain],
            encoding_stats: None,
            compression: Compression::Uncompressed,
            num_values,
            total_compressed_size: 0,
            total_uncompressed_size: 0,
            data_page_offset: 4,
            dictionary_page_offset: None,
            bloom_filter_offset: None,
            statistics: None,
            sort_order: SortingColumn::ascending(0),
        }
    }

    fn bloom_file(values: &[i64]) -> (Vec<u8>, u64) {
        let mut filter = BloomFilter::with_capacity(values.len() as u64, 0.01).unwrap();
        for v in values {
            assert!(filter.insert(&ColumnType::Int64, &Value::Int64(*v)));
        }
        let header = parquet_format_safe::BloomFilterHeader {
            num_bytes: filter.num_bytes() as i32,
            algorithm: parquet_format_safe::BloomFilterAlgorithm::BLOCK(
                parquet_format_safe::SplitBlockAlgorithm {},
            ),
            hash: parquet_format_safe::BloomFilterHash::XXHASH(parquet_format_safe::XxHash {}),
            compression: parquet_format_safe::BloomFilterCompression::UNCOMPRESSED(
                parquet_format_safe::Uncompressed {},
            ),
        };
        let mut data = b"PAR1".to_vec();
        let offset = data.len() as u64;
        {
            let mut prot = TCompactOutputProtocol::new(&mut data);
            header.write_to_out_protocol(&mut prot).unwrap();
        }
        data.extend_from_slice(filter.bitset());
        data.extend_from_slice(b"PAR1");
        (data, offset)
    }

    #[tokio::test]
    async fn test_might_contain_uses_statistics() {
        let mut meta = chunk_meta(10);
        meta.statistics = Some(Statistics {
            null_count: Some(0),
            distinct_count: None,
            min_value: Some(10i64.to_le_bytes().to_vec()),
            max_value: Some(20i64.to_le_bytes().to_vec()),
            min: None,
            max: None,
        });
        let reader: Arc<dyn ByteRangeReader> = Arc::new(InMemoryReader::new(b"PAR1".to_vec()));
        let chunk = ColumnChunkReader::new(
            reader,
            Arc::new(meta),
            ColumnType::Int64,
            1,
            0,
            ReadOptions::default(),
        );
        assert!(chunk.has_range_stats());
        assert_eq!(chunk.statistics_min().unwrap(), Some(Value::Int64(10)));
        assert!(!chunk.might_contain(&Value::Int64(9)).await.unwrap());
        assert!(chunk.might_contain(&Value::Int64(10)).await.unwrap());
        assert!(chunk.might_contain(&Value::Int64(15)).await.unwrap());
        assert!(!chunk.might_contain(&Value::Int64(21)).await.unwrap());
        // an operand of another type is compared after coercion
        assert!(chunk.might_contain(&Value::Int32(12)).await.unwrap());
    }

    #[tokio::test]
    async fn test_might_contain_on_descending_column() {
        let mut meta = chunk_meta(10);
        meta.statistics = Some(Statistics {
            min_value: Some(10i64.to_le_bytes().to_vec()),
            max_value: Some(20i64.to_le_bytes().to_vec()),
            ..Default::default()
        });
        meta.sort_order = SortingColumn {
            column_idx: 0,
            descending: true,
            nulls_first: false,
        };
        let reader: Arc<dyn ByteRangeReader> = Arc::new(InMemoryReader::new(b"PAR1".to_vec()));
        let chunk = ColumnChunkReader::new(
            reader,
            Arc::new(meta),
            ColumnType::Int64,
            1,
            0,
            ReadOptions::default(),
        );
        assert!(!chunk.might_contain(&Value::Int64(9)).await.unwrap());
        assert!(chunk.might_contain(&Value::Int64(10)).await.unwrap());
        assert!(chunk.might_contain(&Value::Int64(20)).await.unwrap());
        assert!(!chunk.might_contain(&Value::Int64(21)).await.unwrap());
    }

    #[tokio::test]
    async fn test_all_null_chunk_contains_nothing() {
        let mut meta = chunk_meta(3);
        meta.statistics = Some(Statistics {
            null_count: Some(3),
            ..Default::default()
        });
        let reader: Arc<dyn ByteRangeReader> = Arc::new(InMemoryReader::new(b"PAR1".to_vec()));
        let chunk = ColumnChunkReader::new(
            reader,
            Arc::new(meta),
            ColumnType::Int64,
            1,
            0,
            ReadOptions::default(),
        );
        assert!(!chunk.contains_non_nulls());
        assert!(!chunk.might_contain(&Value::Int64(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_bloom_filter_is_fetched_once() {
        let values = (0..100).map(|i| i * 7).collect::<Vec<i64>>();
        let (data, offset) = bloom_file(&values);
        let reader = Arc::new(CountingReader {
            inner: InMemoryReader::new(data),
            reads: AtomicUsize::new(0),
        });
        let mut meta = chunk_meta(100);
        meta.bloom_filter_offset = Some(offset);
        let chunk = ColumnChunkReader::new(
            reader.clone(),
            Arc::new(meta),
            ColumnType::Int64,
            0,
            0,
            ReadOptions::default(),
        );

        let (a, b) = futures::join!(chunk.bloom_filter(), chunk.bloom_filter());
        let (a, b) = (a.unwrap().unwrap(), b.unwrap().unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        let reads = reader.reads.load(AtomicOrdering::SeqCst);

        for v in &values {
            assert!(chunk.might_contain(&Value::Int64(*v)).await.unwrap());
        }
        let false_positives = (0..1000)
            .map(|i| i * 7 + 1)
            .filter(|v| a.contains(&ColumnType::Int64, &Value::Int64(*v)))
            .count();
        assert!(false_positives < 50, "{false_positives}");
        assert_eq!(reader.reads.load(AtomicOrdering::SeqCst), reads);
        // a string is never in an INT64 bloom filter
        assert!(!chunk.might_contain(&Value::from("7")).await.unwrap());
    }
}
