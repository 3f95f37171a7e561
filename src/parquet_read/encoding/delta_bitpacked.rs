//! Decoder for the `DELTA_BINARY_PACKED` integer encoding.
//!
//! The stream starts with `<block size> <miniblocks per block> <total values>
//! <first value>` and is followed by blocks of
//! `<min delta> <one bit width per miniblock> <miniblocks>`.

use super::{bitpacked, ceil8, uleb128, zigzag};
use crate::parquet::error::{fmt_err, ParquetResult};
use num_traits::AsPrimitive;

/// Upper bound on the values reserved up front, independent of the header.
const MAX_PREALLOCATION: usize = 1 << 16;

#[derive(Debug, Clone, Copy)]
struct Header {
    values_per_miniblock: usize,
    num_miniblocks: usize,
    total_values: usize,
    first_value: i64,
}

fn read_header(data: &[u8]) -> ParquetResult<(Header, usize)> {
    let (block_size, mut consumed) = uleb128::decode(data)?;
    let (num_miniblocks, used) = uleb128::decode(&data[consumed..])?;
    consumed += used;
    let (total_values, used) = uleb128::decode(&data[consumed..])?;
    consumed += used;
    let (first_value, used) = zigzag::decode(&data[consumed..])?;
    consumed += used;

    if num_miniblocks == 0 {
        return Err(fmt_err!(
            DecodeInvariant,
            "delta block declares zero miniblocks"
        ));
    }
    if block_size % num_miniblocks != 0 || (block_size / num_miniblocks) % 32 != 0 {
        return Err(fmt_err!(
            DecodeInvariant,
            "delta block size {} is not a multiple of 32 per each of its {} miniblocks",
            block_size,
            num_miniblocks
        ));
    }
    // a miniblock of 64 bit deltas must still have a byte size
    let values_per_miniblock = usize::try_from(block_size / num_miniblocks)
        .ok()
        .filter(|n| n.checked_mul(64).is_some())
        .ok_or_else(|| fmt_err!(DecodeInvariant, "delta block size {} too large", block_size))?;
    let num_miniblocks = usize::try_from(num_miniblocks)
        .map_err(|_| fmt_err!(DecodeInvariant, "{} miniblocks too many", num_miniblocks))?;
    let total_values = usize::try_from(total_values)
        .map_err(|_| fmt_err!(MalformedFile, "{} delta values too many", total_values))?;
    Ok((
        Header {
            values_per_miniblock,
            num_miniblocks,
            total_values,
            first_value,
        },
        consumed,
    ))
}

/// Decodes the first `num_values` values of a delta-packed stream, returning
/// them and the number of bytes read. A stream that declares exactly
/// `num_values` values is read to its end.
///
/// A stream declaring fewer values than `num_values` is malformed. Values it
/// declares beyond `num_values` are never expanded.
pub fn decode(data: &[u8], num_values: usize) -> ParquetResult<(Vec<i64>, usize)> {
    let (header, mut consumed) = read_header(data)?;
    if header.total_values < num_values {
        return Err(fmt_err!(
            MalformedFile,
            "delta stream holds {} values, expected {}",
            header.total_values,
            num_values
        ));
    }
    let mut values = Vec::with_capacity(num_values.min(MAX_PREALLOCATION));
    if num_values == 0 {
        return Ok((values, consumed));
    }
    values.push(header.first_value);
    let mut last = header.first_value;

    while values.len() < num_values {
        let (min_delta, used) = zigzag::decode(&data[consumed..])?;
        consumed += used;
        let widths = consumed
            .checked_add(header.num_miniblocks)
            .and_then(|end| data.get(consumed..end))
            .ok_or_else(|| fmt_err!(MalformedFile, "delta block bit widths truncated"))?;
        consumed += header.num_miniblocks;

        for &num_bits in widths {
            let outstanding = num_values - values.len();
            if outstanding == 0 {
                break;
            }
            let num_bits = num_bits as usize;
            if num_bits > 64 {
                return Err(fmt_err!(
                    DecodeInvariant,
                    "delta miniblock bit width {} exceeds 64",
                    num_bits
                ));
            }
            // bounded by the header check on values_per_miniblock
            let declared = ceil8(header.values_per_miniblock * num_bits);
            // the last miniblock may be stored without its padding
            let end = consumed.saturating_add(declared).min(data.len());
            let packed = &data[consumed..end];
            let count = outstanding.min(header.values_per_miniblock);
            for delta in bitpacked::Decoder::try_new(packed, num_bits, count)? {
                last = last.wrapping_add(min_delta).wrapping_add(delta as i64);
                values.push(last);
            }
            consumed += packed.len();
        }
    }
    Ok((values, consumed))
}

/// Decodes a delta-packed stream into the narrower integer `T`.
pub fn decode_as<T>(data: &[u8], num_values: usize) -> ParquetResult<(Vec<T>, usize)>
where
    T: Copy + 'static,
    i64: AsPrimitive<T>,
{
    let (values, consumed) = decode(data, num_values)?;
    Ok((values.into_iter().map(|v| v.as_()).collect(), consumed))
}
