use super::ceil8;
use crate::parquet::error::{fmt_err, ParquetResult};

/// An [`Iterator`] of values of `num_bits` bits, packed least significant bit
/// first into consecutive bytes.
///
/// Width `0` yields zeros without reading any byte.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    packed: &'a [u8],
    num_bits: usize,
    bit_offset: usize,
    remaining: usize,
}

impl<'a> Decoder<'a> {
    /// Returns a [`Decoder`] over `length` values encoded in `packed`.
    pub fn try_new(packed: &'a [u8], num_bits: usize, length: usize) -> ParquetResult<Self> {
        if num_bits > 64 {
            return Err(fmt_err!(
                DecodeInvariant,
                "bit width {} exceeds 64 bits",
                num_bits
            ));
        }
        let needed = length
            .checked_mul(num_bits)
            .map(ceil8)
            .ok_or_else(|| fmt_err!(MalformedFile, "{} bit-packed values overflow", length))?;
        if packed.len() < needed {
            return Err(fmt_err!(
                MalformedFile,
                "unpacking {} values of {} bits requires at least {} bytes, found {}",
                length,
                num_bits,
                needed,
                packed.len()
            ));
        }
        Ok(Self {
            packed,
            num_bits,
            bit_offset: 0,
            remaining: length,
        })
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Skips up to `n` values, returning how many were skipped.
    pub fn advance(&mut self, n: usize) -> usize {
        let n = n.min(self.remaining);
        self.remaining -= n;
        self.bit_offset += n * self.num_bits;
        n
    }
}

#[inline]
fn read_lsb(packed: &[u8], bit_offset: usize, num_bits: usize) -> u64 {
    let mut value = 0u64;
    let mut read = 0usize;
    let mut byte = bit_offset / 8;
    let mut shift = bit_offset % 8;
    while read < num_bits {
        let take = (8 - shift).min(num_bits - read);
        let bits = (packed[byte] >> shift) as u64 & ((1u64 << take) - 1);
        value |= bits << read;
        read += take;
        byte += 1;
        shift = 0;
    }
    value
}

impl Iterator for Decoder<'_> {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = read_lsb(self.packed, self.bit_offset, self.num_bits);
        self.bit_offset += self.num_bits;
        self.remaining -= 1;
        Some(value)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Decodes the legacy `BIT_PACKED` encoding: values packed most significant
/// bit first.
pub fn decode_msb(packed: &[u8], num_bits: usize, length: usize) -> ParquetResult<Vec<u32>> {
    if num_bits > 32 {
        return Err(fmt_err!(
            DecodeInvariant,
            "bit width {} exceeds 32 bits",
            num_bits
        ));
    }
    if num_bits == 0 || length == 0 {
        return Ok(vec![0; length]);
    }
    let needed = ceil8(length * num_bits);
    if packed.len() < needed {
        return Err(fmt_err!(
            MalformedFile,
            "unpacking {} values of {} bits requires at least {} bytes, found {}",
            length,
            num_bits,
            needed,
            packed.len()
        ));
    }
    let mut out = Vec::with_capacity(length);
    let mut bit = 0usize;
    for _ in 0..length {
        let mut value = 0u32;
        for _ in 0..num_bits {
            let set = (packed[bit / 8] >> (7 - bit % 8)) & 1;
            value = (value << 1) | set as u32;
            bit += 1;
        }
        out.push(value);
    }
    Ok(out)
}

/// Packs `values` least significant bit first.
pub fn encode(values: &[u64], num_bits: usize) -> Vec<u8> {
    let mut out = vec![0u8; ceil8(values.len() * num_bits)];
    let mut bit = 0usize;
    for value in values {
        for i in 0..num_bits {
            if (value >> i) & 1 == 1 {
                out[bit / 8] |= 1 << (bit % 8);
            }
            bit += 1;
        }
    }
    out
}
