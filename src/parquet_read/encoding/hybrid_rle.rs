use super::{bitpacked, ceil8, split_length_prefixed, uleb128};
use crate::parquet::error::{fmt_err, ParquetResult};

#[derive(Debug, Clone)]
enum Run<'a> {
    Bitpacked(bitpacked::Decoder<'a>),
    Repeated { value: u32, remaining: usize },
}

/// An [`Iterator`] of `u32` decoded from the RLE / bit-packing hybrid
/// encoding. Yields exactly `num_values` items, or an error once the runs
/// are exhausted early.
#[derive(Debug, Clone)]
pub struct HybridRleDecoder<'a> {
    data: &'a [u8],
    num_bits: usize,
    remaining: usize,
    run: Option<Run<'a>>,
}

impl<'a> HybridRleDecoder<'a> {
    pub fn try_new(data: &'a [u8], num_bits: u32, num_values: usize) -> ParquetResult<Self> {
        if num_bits > 32 {
            return Err(fmt_err!(
                DecodeInvariant,
                "hybrid RLE bit width {} exceeds 32 bits",
                num_bits
            ));
        }
        Ok(Self {
            data,
            num_bits: num_bits as usize,
            remaining: num_values,
            run: None,
        })
    }

    fn next_run(&mut self) -> ParquetResult<Run<'a>> {
        if self.data.is_empty() {
            if self.num_bits == 0 {
                return Ok(Run::Repeated {
                    value: 0,
                    remaining: self.remaining,
                });
            }
            return Err(fmt_err!(
                MalformedFile,
                "hybrid RLE data ended with {} values outstanding",
                self.remaining
            ));
        }
        let (header, consumed) = uleb128::decode(self.data)?;
        self.data = &self.data[consumed..];

        if header & 1 == 1 {
            let groups = usize::try_from(header >> 1)
                .map_err(|_| fmt_err!(MalformedFile, "bit-packed run header {} too large", header))?;
            let values = groups.saturating_mul(8);
            // The final run may be truncated to the bytes the outstanding values need.
            let bytes = groups.saturating_mul(self.num_bits).min(self.data.len());
            let (packed, rest) = self.data.split_at(bytes);
            self.data = rest;
            let length = if self.num_bits == 0 {
                values
            } else {
                values.min(packed.len() * 8 / self.num_bits)
            };
            Ok(Run::Bitpacked(bitpacked::Decoder::try_new(
                packed,
                self.num_bits,
                length,
            )?))
        } else {
            let run_length = usize::try_from(header >> 1)
                .map_err(|_| fmt_err!(MalformedFile, "repeated run header {} too large", header))?;
            let width = ceil8(self.num_bits);
            let bytes = self.data.get(..width).ok_or_else(|| {
                fmt_err!(MalformedFile, "repeated run value truncated")
            })?;
            let mut value = [0u8; 4];
            value[..width].copy_from_slice(bytes);
            self.data = &self.data[width..];
            Ok(Run::Repeated {
                value: u32::from_le_bytes(value),
                remaining: run_length,
            })
        }
    }
}

impl Iterator for HybridRleDecoder<'_> {
    type Item = ParquetResult<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        loop {
            match &mut self.run {
                Some(Run::Bitpacked(decoder)) => {
                    if let Some(value) = decoder.next() {
                        self.remaining -= 1;
                        return Some(Ok(value as u32));
                    }
                }
                Some(Run::Repeated { value, remaining }) if *remaining > 0 => {
                    *remaining -= 1;
                    self.remaining -= 1;
                    return Some(Ok(*value));
                }
                _ => {}
            }
            match self.next_run() {
                Ok(run) => self.run = Some(run),
                Err(err) => {
                    self.remaining = 0;
                    return Some(Err(err));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Decodes `num_values` hybrid-encoded values with no length header.
pub fn decode(data: &[u8], num_bits: u32, num_values: usize) -> ParquetResult<Vec<u32>> {
    HybridRleDecoder::try_new(data, num_bits, num_values)?.collect()
}

/// Decodes `num_values` hybrid-encoded values preceded by a 4-byte length,
/// returning the values and the bytes consumed including the length.
pub fn decode_length_prefixed(
    data: &[u8],
    num_bits: u32,
    num_values: usize,
) -> ParquetResult<(Vec<u32>, usize)> {
    let (body, consumed) = split_length_prefixed(data)?;
    Ok((decode(body, num_bits, num_values)?, consumed))
}

#[cfg(test)]
pub(crate) mod encoder {
    use super::super::{bitpacked, ceil8, uleb128};

    /// Appends a repeated run of `count` copies of `value`.
    pub fn repeated(out: &mut Vec<u8>, value: u32, count: usize, num_bits: u32) {
        let mut container = [0u8; 10];
        let used = uleb128::encode((count as u64) << 1, &mut container);
        out.extend_from_slice(&container[..used]);
        out.extend_from_slice(&value.to_le_bytes()[..ceil8(num_bits as usize)]);
    }

    /// Appends one bit-packed run holding `values`, zero padded to a multiple of 8.
    pub fn bitpacked(out: &mut Vec<u8>, values: &[u32], num_bits: u32) {
        let groups = ceil8(values.len());
        let mut container = [0u8; 10];
        let used = uleb128::encode(((groups as u64) << 1) | 1, &mut container);
        out.extend_from_slice(&container[..used]);
        let mut padded = values.iter().map(|v| *v as u64).collect::<Vec<_>>();
        padded.resize(groups * 8, 0);
        out.extend_from_slice(&bitpacked::encode(&padded, num_bits as usize));
    }

    /// Encodes `values` as alternating runs: stretches of at least 8 equal
    /// values become repeated runs, the rest bit-packed.
    pub fn encode(values: &[u32], num_bits: u32) -> Vec<u8> {
        let mut out = Vec::new();
        let mut literal: Vec<u32> = Vec::new();
        let mut i = 0;
        while i < values.len() {
            let mut j = i;
            while j < values.len() && values[j] == values[i] {
                j += 1;
            }
            if j - i >= 8 && literal.len() % 8 == 0 {
                if !literal.is_empty() {
                    bitpacked(&mut out, &literal, num_bits);
                    literal.clear();
                }
                repeated(&mut out, values[i], j - i, num_bits);
            } else {
                literal.extend_from_slice(&values[i..j]);
            }
            i = j;
        }
        if !literal.is_empty() {
            bitpacked(&mut out, &literal, num_bits);
        }
        out
    }
}
