use super::plain::decode_plain;
use crate::parquet::col_type::{ColumnType, PhysicalType};
use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet::value::Value;
use bytes::Bytes;

/// Decodes `BYTE_STREAM_SPLIT`: byte `k` of every value is stored in stream
/// `k`, streams laid out one after another. The values are reassembled into
/// plain order and decoded as such.
pub fn decode(data: &Bytes, num_values: usize, col_type: &ColumnType) -> ParquetResult<Vec<Value>> {
    let width = match col_type.physical() {
        PhysicalType::Int32 | PhysicalType::Float => 4,
        PhysicalType::Int64 | PhysicalType::Double => 8,
        PhysicalType::FixedLenByteArray(len) => len,
        physical => {
            return Err(fmt_err!(
                Unsupported,
                "BYTE_STREAM_SPLIT is not supported for {:?} values",
                physical
            ))
        }
    };
    if data.len() != width * num_values {
        return Err(fmt_err!(
            MalformedFile,
            "BYTE_STREAM_SPLIT page of {} bytes cannot hold {} values of {} bytes",
            data.len(),
            num_values,
            width
        ));
    }
    let mut plain = vec![0u8; data.len()];
    for (stream, bytes) in data.chunks(num_values.max(1)).enumerate() {
        for (i, b) in bytes.iter().enumerate() {
            plain[i * width + stream] = *b;
        }
    }
    let (values, _) = decode_plain(&Bytes::from(plain), num_values, col_type)?;
    Ok(values)
}
