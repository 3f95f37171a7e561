use super::uleb128;
use crate::parquet::error::ParquetResult;

#[inline]
pub fn decode_zigzag(value: u64) -> i64 {
    (value >> 1) as i64 ^ -((value & 1) as i64)
}

#[inline]
pub fn encode_zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Decodes a zigzag ULEB128 varint, returning the value and its byte length.
pub fn decode(values: &[u8]) -> ParquetResult<(i64, usize)> {
    let (u, consumed) = uleb128::decode(values)?;
    Ok((decode_zigzag(u), consumed))
}

pub fn encode(value: i64, container: &mut [u8; 10]) -> usize {
    uleb128::encode(encode_zigzag(value), container)
}
