//! Value decoders: turn the value section of a page into [`Value`]s.
//!
//! Each encoding composes the integer codecs in `encoding` with the column's
//! [`ColumnType`], which materializes and validates individual values.

/// `BYTE_STREAM_SPLIT` for fixed width types.
mod byte_stream_split;
/// `DELTA_LENGTH_BYTE_ARRAY` and `DELTA_BYTE_ARRAY`.
mod delta_byte_array;
/// Dictionary pages and dictionary index streams.
mod dictionary;
/// `PLAIN` values of every physical type.
mod plain;

pub use delta_byte_array::{decode_byte_array, decode_length_byte_array};
pub use dictionary::{decode_indices, Dictionary};
pub use plain::decode_plain;

use crate::parquet::col_type::{ColumnType, PhysicalType};
use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet::value::Value;
use crate::parquet_read::encoding::{delta_bitpacked, hybrid_rle, split_length_prefixed};
use crate::parquet_read::meta::Encoding;
use bytes::Bytes;
use std::sync::Arc;

/// The non-null values of one data page, in slot order.
#[derive(Debug, Clone)]
pub enum PageValues {
    Materialized(Vec<Value>),
    /// Indices already checked against the dictionary's length.
    Dictionary {
        dictionary: Arc<Dictionary>,
        indices: Vec<u32>,
    },
}

impl PageValues {
    pub fn len(&self) -> usize {
        match self {
            PageValues::Materialized(values) => values.len(),
            PageValues::Dictionary { indices, .. } => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            PageValues::Materialized(values) => values.get(index),
            PageValues::Dictionary {
                dictionary,
                indices,
            } => dictionary.get(*indices.get(index)? as usize),
        }
    }

    /// The dictionary index of the value at `index`, for dictionary pages.
    pub fn dictionary_index(&self, index: usize) -> Option<u32> {
        match self {
            PageValues::Materialized(_) => None,
            PageValues::Dictionary { indices, .. } => indices.get(index).copied(),
        }
    }
}

/// Decodes `num_values` non-null values from the value section of a page.
pub fn decode_values(
    encoding: Encoding,
    data: &Bytes,
    num_values: usize,
    col_type: &ColumnType,
    dictionary: Option<&Arc<Dictionary>>,
) -> ParquetResult<PageValues> {
    if num_values == 0 {
        // all-null page: writers differ in what, if anything, they put here
        return Ok(PageValues::Materialized(Vec::new()));
    }
    let physical = col_type.physical();
    let values = match (encoding, physical) {
        (Encoding::Plain, _) => decode_plain(data, num_values, col_type)?.0,
        (Encoding::PlainDictionary | Encoding::RleDictionary, _) => {
            let dictionary = dictionary.ok_or_else(|| {
                fmt_err!(
                    MalformedFile,
                    "dictionary encoded page in a column chunk without a dictionary page"
                )
            })?;
            let indices = decode_indices(data, num_values, dictionary.len())?;
            return Ok(PageValues::Dictionary {
                dictionary: dictionary.clone(),
                indices,
            });
        }
        (Encoding::Rle, PhysicalType::Boolean) => {
            let (body, _) = split_length_prefixed(data)?;
            hybrid_rle::decode(body, 1, num_values)?
                .into_iter()
                .map(|v| Value::Boolean(v != 0))
                .collect()
        }
        (Encoding::DeltaBinaryPacked, PhysicalType::Int32) => {
            let (ints, _) = delta_bitpacked::decode_as::<i32>(data, num_values)?;
            ints.into_iter()
                .map(|v| col_type.wrap_i32(v))
                .collect::<ParquetResult<_>>()?
        }
        (Encoding::DeltaBinaryPacked, PhysicalType::Int64) => {
            let (ints, _) = delta_bitpacked::decode(data, num_values)?;
            ints.into_iter()
                .map(|v| col_type.wrap_i64(v))
                .collect::<ParquetResult<_>>()?
        }
        (
            Encoding::DeltaLengthByteArray,
            PhysicalType::ByteArray | PhysicalType::FixedLenByteArray(_),
        ) => decode_length_byte_array(data, num_values)?
            .0
            .into_iter()
            .map(|v| col_type.wrap_bytes(v))
            .collect::<ParquetResult<_>>()?,
        (
            Encoding::DeltaByteArray,
            PhysicalType::ByteArray | PhysicalType::FixedLenByteArray(_),
        ) => decode_byte_array(data, num_values)?
            .into_iter()
            .map(|v| col_type.wrap_bytes(v))
            .collect::<ParquetResult<_>>()?,
        (Encoding::ByteStreamSplit, _) => byte_stream_split::decode(data, num_values, col_type)?,
        (encoding, physical) => {
            return Err(fmt_err!(
                Unsupported,
                "encoding {:?} is not supported for {:?} values",
                encoding,
                physical
            ))
        }
    };
    Ok(PageValues::Materialized(values))
}
