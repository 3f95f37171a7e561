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
use crate::parquet::compression::Compression;
use crate::parquet::error::{fmt_err, ParquetError, ParquetErrorExt, ParquetResult};
use crate::parquet::io::ByteRangeReader;
use crate::parquet::value::Value;
use crate::parquet_read::schema::SchemaElement;
use crate::parquet_read::ReadOptions;
use parquet_format_safe::thrift::protocol::TCompactInputProtocol;
use std::cmp::Ordering;
use std::io::Cursor;

pub const PARQUET_MAGIC: [u8; 4] = *b"PAR1";
pub const ENCRYPTED_FOOTER_MAGIC: [u8; 4] = *b"PARE";
/// Footer length followed by the magic.
const TRAILER_SIZE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Plain,
    PlainDictionary,
    Rle,
    BitPacked,
    DeltaBinaryPacked,
    DeltaLengthByteArray,
    DeltaByteArray,
    RleDictionary,
    ByteStreamSplit,
    Other(i32),
}

impl Encoding {
    pub fn is_dictionary(&self) -> bool {
        matches!(self, Encoding::PlainDictionary | Encoding::RleDictionary)
    }
}

impl From<parquet_format_safe::Encoding> for Encoding {
    fn from(encoding: parquet_format_safe::Encoding) -> Self {
        use parquet_format_safe::Encoding as E;
        match encoding {
            E::PLAIN => Encoding::Plain,
            E::PLAIN_DICTIONARY => Encoding::PlainDictionary,
            E::RLE => Encoding::Rle,
            E::BIT_PACKED => Encoding::BitPacked,
            E::DELTA_BINARY_PACKED => Encoding::DeltaBinaryPacked,
            E::DELTA_LENGTH_BYTE_ARRAY => Encoding::DeltaLengthByteArray,
            E::DELTA_BYTE_ARRAY => Encoding::DeltaByteArray,
            E::RLE_DICTIONARY => Encoding::RleDictionary,
            E::BYTE_STREAM_SPLIT => Encoding::ByteStreamSplit,
            other => Encoding::Other(other.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    DataPage,
    IndexPage,
    DictionaryPage,
    DataPageV2,
    Other(i32),
}

impl From<parquet_format_safe::PageType> for PageType {
    fn from(page_type: parquet_format_safe::PageType) -> Self {
        use parquet_format_safe::PageType as P;
        match page_type {
            P::DATA_PAGE => PageType::DataPage,
            P::INDEX_PAGE => PageType::IndexPage,
            P::DICTIONARY_PAGE => PageType::DictionaryPage,
            P::DATA_PAGE_V2 => PageType::DataPageV2,
            other => PageType::Other(other.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEncodingStats {
    pub page_type: PageType,
    pub encoding: Encoding,
    pub count: u32,
}

/// Column chunk statistics, kept as the raw plain-encoded bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub null_count: Option<u64>,
    pub distinct_count: Option<u64>,
    pub min_value: Option<Vec<u8>>,
    pub max_value: Option<Vec<u8>>,
    /// Deprecated bounds, written with signed ordering whatever the type.
    pub min: Option<Vec<u8>>,
    pub max: Option<Vec<u8>>,
}

impl Statistics {
    /// The lower bound usable for a column of `col_type`.
    pub fn min_bytes(&self, col_type: &ColumnType) -> Option<&[u8]> {
        match (&self.min_value, col_type.is_signed_order()) {
            (Some(v), _) => Some(v),
            (None, true) => self.min.as_deref(),
            (None, false) => None,
        }
    }

    pub fn max_bytes(&self, col_type: &ColumnType) -> Option<&[u8]> {
        match (&self.max_value, col_type.is_signed_order()) {
            (Some(v), _) => Some(v),
            (None, true) => self.max.as_deref(),
            (None, false) => None,
        }
    }
}

impl From<parquet_format_safe::Statistics> for Statistics {
    fn from(stats: parquet_format_safe::Statistics) -> Self {
        Self {
            null_count: stats.null_count.and_then(|v| u64::try_from(v).ok()),
            distinct_count: stats.distinct_count.and_then(|v| u64::try_from(v).ok()),
            min_value: stats.min_value,
            max_value: stats.max_value,
            min: stats.min,
            max: stats.max,
        }
    }
}

/// Declared sort order of a column within its row group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortingColumn {
    pub column_idx: usize,
    pub descending: bool,
    pub nulls_first: bool,
}

impl SortingColumn {
    /// The order assumed when the row group declares none for the column.
    pub fn ascending(column_idx: usize) -> Self {
        Self {
            column_idx,
            descending: false,
            nulls_first: true,
        }
    }

    /// Orders two possibly-null values by this declared order. `None` when
    /// the type comparator cannot order the values.
    pub fn compare(
        &self,
        col_type: &ColumnType,
        a: Option<&Value>,
        b: Option<&Value>,
    ) -> Option<Ordering> {
        let nulls = if self.nulls_first {
            Ordering::Less
        } else {
            Ordering::Greater
        };
        match (a, b) {
            (None, None) => Some(Ordering::Equal),
            (None, Some(_)) => Some(nulls),
            (Some(_), None) => Some(nulls.reverse()),
            (Some(a), Some(b)) => {
                let ord = col_type.compare(a, b)?;
                Some(if self.descending { ord.reverse() } else { ord })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChunkMetaData {
    pub path_in_schema: Vec<String>,
    pub encodings: Vec<Encoding>,
    pub encoding_stats: Option<Vec<PageEncodingStats>>,
    pub compression: Compression,
    pub num_values: u64,
    pub total_compressed_size: u64,
    pub total_uncompressed_size: u64,
    pub data_page_offset: u64,
    pub dictionary_page_offset: Option<u64>,
    pub bloom_filter_offset: Option<u64>,
    pub statistics: Option<Statistics>,
    pub sort_order: SortingColumn,
}

impl ColumnChunkMetaData {
    /// Byte range of the separate dictionary page, if one precedes the data
    /// pages.
    pub fn dictionary_range(&self) -> Option<(u64, u64)> {
        match self.dictionary_page_offset {
            // some writers store 0 rather than leaving the offset unset
            Some(offset) if offset >= 4 && offset < self.data_page_offset => {
                Some((offset, self.data_page_offset - offset))
            }
            _ => None,
        }
    }

    /// Byte range of the data pages.
    pub fn data_range(&self) -> (u64, u64) {
        let dictionary_len = self.dictionary_range().map(|(_, len)| len).unwrap_or(0);
        (
            self.data_page_offset,
            self.total_compressed_size.saturating_sub(dictionary_len),
        )
    }

    /// Whether every data page is known to be dictionary encoded, so the
    /// dictionary holds every value of the chunk.
    pub fn all_data_pages_dictionary_encoded(&self) -> bool {
        match &self.encoding_stats {
            Some(stats) => stats
                .iter()
                .filter(|s| matches!(s.page_type, PageType::DataPage | PageType::DataPageV2))
                .all(|s| s.encoding.is_dictionary()),
            None => {
                self.encodings.iter().any(Encoding::is_dictionary)
                    && !self.encodings.iter().any(|e| {
                        !e.is_dictionary()
                            && !matches!(e, Encoding::Rle | Encoding::BitPacked)
                    })
            }
        }
    }

    pub fn null_count(&self) -> Option<u64> {
        self.statistics.as_ref().and_then(|s| s.null_count)
    }

    fn try_from_thrift(
        chunk: parquet_format_safe::ColumnChunk,
        sort_order: SortingColumn,
    ) -> ParquetResult<Self> {
        let meta = chunk.meta_data.ok_or_else(|| {
            fmt_err!(
                Unsupported,
                "column chunk {} carries no plaintext metadata",
                sort_order.column_idx
            )
        })?;
        if chunk.file_path.is_some() {
            return Err(fmt_err!(
                Unsupported,
                "column {:?} is stored in an external file",
                meta.path_in_schema
            ));
        }
        let path = meta.path_in_schema.join(".");
        Ok(Self {
            encodings: meta.encodings.into_iter().map(Encoding::from).collect(),
            encoding_stats: meta.encoding_stats.map(|stats| {
                stats
                    .into_iter()
                    .map(|s| PageEncodingStats {
                        page_type: s.page_type.into(),
                        encoding: s.encoding.into(),
                        count: s.count.max(0) as u32,
                    })
                    .collect()
            }),
            compression: meta.codec.into(),
            num_values: non_negative(meta.num_values, "num_values", &path)?,
            total_compressed_size: non_negative(
                meta.total_compressed_size,
                "total_compressed_size",
                &path,
            )?,
            total_uncompressed_size: non_negative(
                meta.total_uncompressed_size,
                "total_uncompressed_size",
                &path,
            )?,
            data_page_offset: non_negative(meta.data_page_offset, "data_page_offset", &path)?,
            dictionary_page_offset: meta
                .dictionary_page_offset
                .map(|o| non_negative(o, "dictionary_page_offset", &path))
                .transpose()?,
            bloom_filter_offset: meta
                .bloom_filter_offset
                .map(|o| non_negative(o, "bloom_filter_offset", &path))
                .transpose()?,
            statistics: meta.statistics.map(Statistics::from),
            path_in_schema: meta.path_in_schema,
            sort_order,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowGroupMetaData {
    pub columns: Vec<ColumnChunkMetaData>,
    pub num_rows: u64,
    pub total_byte_size: u64,
    pub sorting_columns: Vec<SortingColumn>,
}

impl TryFrom<parquet_format_safe::RowGroup> for RowGroupMetaData {
    type Error = ParquetError;

    fn try_from(row_group: parquet_format_safe::RowGroup) -> ParquetResult<Self> {
        let sorting_columns = row_group
            .sorting_columns
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| {
                Some(SortingColumn {
                    column_idx: usize::try_from(s.column_idx).ok()?,
                    descending: s.descending,
                    nulls_first: s.nulls_first,
                })
            })
            .collect::<Vec<_>>();
        let columns = row_group
            .columns
            .into_iter()
            .enumerate()
            .map(|(idx, chunk)| {
                let sort_order = sorting_columns
                    .iter()
                    .find(|s| s.column_idx == idx)
                    .copied()
                    .unwrap_or_else(|| SortingColumn::ascending(idx));
                ColumnChunkMetaData::try_from_thrift(chunk, sort_order)
            })
            .collect::<ParquetResult<Vec<_>>>()?;
        Ok(Self {
            columns,
            num_rows: non_negative(row_group.num_rows, "num_rows", "row group")?,
            total_byte_size: row_group.total_byte_size.max(0) as u64,
            sorting_columns,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaData {
    pub version: i32,
    pub num_rows: u64,
    pub schema: Vec<SchemaElement>,
    pub row_groups: Vec<RowGroupMetaData>,
    pub key_value_metadata: Vec<(String, Option<String>)>,
    pub created_by: Option<String>,
}

impl TryFrom<parquet_format_safe::FileMetaData> for FileMetaData {
    type Error = ParquetError;

    fn try_from(meta: parquet_format_safe::FileMetaData) -> ParquetResult<Self> {
        if meta.encryption_algorithm.is_some() {
            return Err(fmt_err!(
                Unsupported,
                "files with encrypted columns are not supported"
            ));
        }
        Ok(Self {
            version: meta.version,
            num_rows: non_negative(meta.num_rows, "num_rows", "file")?,
            schema: meta
                .schema
                .into_iter()
                .map(SchemaElement::try_from)
                .collect::<ParquetResult<_>>()?,
            row_groups: meta
                .row_groups
                .into_iter()
                .enumerate()
                .map(|(i, rg)| {
                    RowGroupMetaData::try_from(rg)
                        .with_context(|_| format!("could not read metadata of row group {}", i))
                })
                .collect::<ParquetResult<_>>()?,
            key_value_metadata: meta
                .key_value_metadata
                .unwrap_or_default()
                .into_iter()
                .map(|kv| (kv.key, kv.value))
                .collect(),
            created_by: meta.created_by,
        })
    }
}

fn non_negative(value: i64, field: &str, owner: &str) -> ParquetResult<u64> {
    u64::try_from(value)
        .map_err(|_| fmt_err!(MalformedFile, "negative {} {} in {}", field, value, owner))
}

/// Reads and decodes the footer at the end of the file.
pub async fn read_footer(
    reader: &dyn ByteRangeReader,
    options: &ReadOptions,
) -> ParquetResult<FileMetaData> {
    let file_size = reader.total_bytes_available().await?;
    if file_size < TRAILER_SIZE + PARQUET_MAGIC.len() as u64 {
        return Err(fmt_err!(
            MalformedFile,
            "file of {} bytes is too small to be parquet",
            file_size
        ));
    }
    let trailer = reader
        .read_as_buffer(file_size - TRAILER_SIZE, TRAILER_SIZE as usize)
        .await?;
    let magic = &trailer[4..8];
    if magic == ENCRYPTED_FOOTER_MAGIC {
        return Err(fmt_err!(Unsupported, "encrypted footers are not supported"));
    }
    if magic != PARQUET_MAGIC {
        return Err(fmt_err!(
            MalformedFile,
            "invalid parquet magic {:?}",
            String::from_utf8_lossy(magic)
        ));
    }
    let mut len = [0u8; 4];
    len.copy_from_slice(&trailer[..4]);
    let footer_len = u32::from_le_bytes(len) as u64;
    if footer_len + TRAILER_SIZE + PARQUET_MAGIC.len() as u64 > file_size {
        return Err(fmt_err!(
            MalformedFile,
            "footer of {} bytes does not fit in a file of {} bytes",
            footer_len,
            file_size
        ));
    }
    if footer_len > options.max_footer_size as u64 {
        return Err(fmt_err!(
            MalformedFile,
            "footer of {} bytes exceeds the {} byte limit",
            footer_len,
            options.max_footer_size
        ));
    }

    let footer = reader
        .read_as_buffer(file_size - TRAILER_SIZE - footer_len, footer_len as usize)
        .await?;
    let mut cursor = Cursor::new(&footer[..]);
    let meta = {
        let mut prot = TCompactInputProtocol::new(&mut cursor, options.max_footer_size);
        parquet_format_safe::FileMetaData::read_from_in_protocol(&mut prot)
            .map_err(ParquetError::from)
            .context("could not decode file footer")?
    };
    log::debug!(
        "read footer of {} bytes: {} rows in {} row groups",
        footer_len,
        meta.num_rows,
        meta.row_groups.len()
    );
    FileMetaData::try_from(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parquet::io::InMemoryReader;

    fn chunk(encodings: Vec<Encoding>, stats: Option<Vec<PageEncodingStats>>) -> ColumnChunkMetaData {
        ColumnChunkMetaData {
            path_in_schema: vec!["c".to_string()],
            encodings,
            encoding_stats: stats,
            compression: Compression::Uncompressed,
            num_values: 10,
            total_compressed_size: 100,
            total_uncompressed_size: 100,
            data_page_offset: 40,
            dictionary_page_offset: Some(4),
            bloom_filter_offset: None,
            statistics: None,
            sort_order: SortingColumn::ascending(0),
        }
    }

    #[test]
    fn test_ranges() {
        let mut meta = chunk(vec![Encoding::Plain], None);
        assert_eq!(meta.dictionary_range(), Some((4, 36)));
        assert_eq!(meta.data_range(), (40, 64));

        meta.dictionary_page_offset = Some(0);
        assert_eq!(meta.dictionary_range(), None);
        assert_eq!(meta.data_range(), (40, 100));
    }

    #[test]
    fn test_dictionary_coverage() {
        let stats = |encoding| {
            Some(vec![
                PageEncodingStats {
                    page_type: PageType::DictionaryPage,
                    encoding: Encoding::Plain,
                    count: 1,
                },
                PageEncodingStats {
                    page_type: PageType::DataPage,
                    encoding,
                    count: 3,
                },
            ])
        };
        assert!(chunk(vec![], stats(Encoding::RleDictionary)).all_data_pages_dictionary_encoded());
        assert!(!chunk(vec![], stats(Encoding::Plain)).all_data_pages_dictionary_encoded());

        // without page stats, PLAIN may be a dictionary fallback
        let dict_only = vec![Encoding::RleDictionary, Encoding::Rle];
        assert!(chunk(dict_only, None).all_data_pages_dictionary_encoded());
        let mixed = vec![Encoding::Plain, Encoding::RleDictionary, Encoding::Rle];
        assert!(!chunk(mixed, None).all_data_pages_dictionary_encoded());
    }

    #[test]
    fn test_sorting_column_compare() {
        let col = ColumnType::Int32;
        let one = Value::Int32(1);
        let two = Value::Int32(2);
        let asc = SortingColumn::ascending(0);
        assert_eq!(asc.compare(&col, Some(&one), Some(&two)), Some(Ordering::Less));
        assert_eq!(asc.compare(&col, None, Some(&one)), Some(Ordering::Less));

        let desc = SortingColumn {
            column_idx: 0,
            descending: true,
            nulls_first: false,
        };
        assert_eq!(desc.compare(&col, Some(&one), Some(&two)), Some(Ordering::Greater));
        assert_eq!(desc.compare(&col, None, Some(&one)), Some(Ordering::Greater));
        assert_eq!(desc.compare(&col, None, None), Some(Ordering::Equal));
    }

    #[test]
    fn test_statistics_bounds() {
        let stats = Statistics {
            min: Some(vec![1, 0, 0, 0]),
            max: Some(vec![9, 0, 0, 0]),
            ..Default::default()
        };
        assert_eq!(stats.min_bytes(&ColumnType::Int32), Some(&[1u8, 0, 0, 0][..]));
        assert_eq!(stats.max_bytes(&ColumnType::UInt32), None);
        assert_eq!(stats.min_bytes(&ColumnType::String), None);
    }

    async fn footer_error(data: Vec<u8>) -> ParquetError {
        let reader = InMemoryReader::new(data);
        read_footer(&reader, &ReadOptions::default()).await.unwrap_err()
    }

    #[tokio::test]
    async fn test_footer_trailer() {
        assert!(footer_error(b"PAR1".to_vec()).await.is_malformed());

        let mut encrypted = b"PAR1".to_vec();
        encrypted.extend_from_slice(&[0, 0, 0, 0]);
        encrypted.extend_from_slice(b"PARE");
        assert!(footer_error(encrypted).await.is_unsupported());

        let mut bad_magic = b"PAR1".to_vec();
        bad_magic.extend_from_slice(&[0, 0, 0, 0]);
        bad_magic.extend_from_slice(b"PAR2");
        assert!(footer_error(bad_magic).await.is_malformed());

        let mut too_long = b"PAR1".to_vec();
        too_long.extend_from_slice(&100u32.to_le_bytes());
        too_long.extend_from_slice(b"PAR1");
        assert!(footer_error(too_long).await.is_malformed());

        let mut garbage = b"PAR1".to_vec();
        garbage.extend_from_slice(&[0xff, 0xff, 0xff]);
        garbage.extend_from_slice(&3u32.to_le_bytes());
        garbage.extend_from_slice(b"PAR1");
        let err = footer_error(garbage).await;
        assert!(matches!(
            err.cause(),
            crate::parquet::error::ParquetErrorCause::Thrift(_)
        ));
    }
}
