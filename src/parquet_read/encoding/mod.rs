//! Integer codecs shared by levels, dictionary indices and length streams.

pub mod bitpacked;
pub mod delta_bitpacked;
pub mod hybrid_rle;
pub mod uleb128;
pub mod zigzag;

use crate::parquet::error::{fmt_err, ParquetResult};

/// Number of bytes needed to hold `bits` bits.
#[inline]
pub fn ceil8(bits: usize) -> usize {
    bits / 8 + usize::from(bits % 8 != 0)
}

/// Number of bits needed to represent `max`.
#[inline]
pub fn bit_width(max: u64) -> u32 {
    64 - max.leading_zeros()
}

/// Splits a section prefixed by its 4-byte little-endian length.
pub fn split_length_prefixed(data: &[u8]) -> ParquetResult<(&[u8], usize)> {
    let prefix: [u8; 4] = data
        .get(..4)
        .and_then(|p| p.try_into().ok())
        .ok_or_else(|| fmt_err!(MalformedFile, "missing 4-byte length prefix"))?;
    let len = u32::from_le_bytes(prefix) as usize;
    let body = data.get(4..4 + len).ok_or_else(|| {
        fmt_err!(
            MalformedFile,
            "length prefix declares {} bytes, only {} remain",
            len,
            data.len() - 4
        )
    })?;
    Ok((body, 4 + len))
}
