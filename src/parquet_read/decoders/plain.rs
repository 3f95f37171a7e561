//! Decoder for `PLAIN` encoded values.
//!
//! Fixed width types are little-endian arrays, booleans are bit-packed least
//! significant bit first, and byte arrays are each prefixed by a 4-byte length.

use crate::parquet::col_type::{ColumnType, PhysicalType};
use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet::value::Value;
use crate::parquet_read::encoding::{bitpacked, ceil8};
use bytes::Bytes;

/// Decodes `num_values` plain values, returning them with the number of bytes
/// they occupied.
pub fn decode_plain(
    data: &Bytes,
    num_values: usize,
    col_type: &ColumnType,
) -> ParquetResult<(Vec<Value>, usize)> {
    match col_type.physical() {
        PhysicalType::Boolean => {
            let values = bitpacked::Decoder::try_new(data, 1, num_values)?
                .map(|bit| Value::Boolean(bit == 1))
                .collect();
            Ok((values, ceil8(num_values)))
        }
        PhysicalType::Int32 => {
            let chunks = fixed_chunks::<4>(data, num_values)?;
            let values = chunks
                .map(|c| col_type.wrap_i32(i32::from_le_bytes(c)))
                .collect::<ParquetResult<_>>()?;
            Ok((values, num_values * 4))
        }
        PhysicalType::Int64 => {
            let chunks = fixed_chunks::<8>(data, num_values)?;
            let values = chunks
                .map(|c| col_type.wrap_i64(i64::from_le_bytes(c)))
                .collect::<ParquetResult<_>>()?;
            Ok((values, num_values * 8))
        }
        PhysicalType::Float => {
            let values = fixed_chunks::<4>(data, num_values)?
                .map(|c| Value::Float(f32::from_le_bytes(c)))
                .collect();
            Ok((values, num_values * 4))
        }
        PhysicalType::Double => {
            let values = fixed_chunks::<8>(data, num_values)?
                .map(|c| Value::Double(f64::from_le_bytes(c)))
                .collect();
            Ok((values, num_values * 8))
        }
        PhysicalType::ByteArray => {
            let mut values = Vec::with_capacity(num_values.min(data.len() / 4));
            let mut offset = 0usize;
            for i in 0..num_values {
                let len = data
                    .get(offset..offset + 4)
                    .and_then(|b| b.try_into().ok())
                    .map(u32::from_le_bytes)
                    .ok_or_else(|| {
                        fmt_err!(MalformedFile, "byte array length of value {} truncated", i)
                    })? as usize;
                offset += 4;
                if offset + len > data.len() {
                    return Err(fmt_err!(
                        MalformedFile,
                        "byte array value {} of {} bytes exceeds the page",
                        i,
                        len
                    ));
                }
                values.push(col_type.wrap_bytes(data.slice(offset..offset + len))?);
                offset += len;
            }
            Ok((values, offset))
        }
        PhysicalType::FixedLenByteArray(len) => {
            let needed = len.checked_mul(num_values).filter(|n| *n <= data.len());
            let Some(needed) = needed else {
                return Err(fmt_err!(
                    MalformedFile,
                    "{} fixed length values of {} bytes exceed the {} byte page",
                    num_values,
                    len,
                    data.len()
                ));
            };
            let values = (0..num_values)
                .map(|i| col_type.wrap_bytes(data.slice(i * len..(i + 1) * len)))
                .collect::<ParquetResult<_>>()?;
            Ok((values, needed))
        }
        PhysicalType::Int96 => Err(fmt_err!(Unsupported, "INT96 values are not supported")),
    }
}

fn fixed_chunks<const N: usize>(
    data: &[u8],
    num_values: usize,
) -> ParquetResult<impl Iterator<Item = [u8; N]> + '_> {
    let needed = num_values.checked_mul(N).filter(|n| *n <= data.len());
    let Some(needed) = needed else {
        return Err(fmt_err!(
            MalformedFile,
            "{} values of {} bytes exceed the {} byte page",
            num_values,
            N,
            data.len()
        ));
    };
    Ok(data[..needed].chunks_exact(N).map(|c| {
        let mut out = [0u8; N];
        out.copy_from_slice(c);
        out
    }))
}
