use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet_read::encoding::delta_bitpacked;
use bytes::Bytes;

/// Decodes `DELTA_LENGTH_BYTE_ARRAY`: delta-packed lengths followed by the
/// concatenated values. Returns the values and the bytes consumed.
pub fn decode_length_byte_array(data: &Bytes, num_values: usize) -> ParquetResult<(Vec<Bytes>, usize)> {
    let (lengths, mut offset) = delta_bitpacked::decode(data, num_values)?;
    let mut values = Vec::with_capacity(num_values);
    for (i, len) in lengths.into_iter().enumerate() {
        let len = usize::try_from(len)
            .map_err(|_| fmt_err!(MalformedFile, "negative length {} of value {}", len, i))?;
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                fmt_err!(MalformedFile, "value {} of {} bytes exceeds the page", i, len)
            })?;
        values.push(data.slice(offset..end));
        offset = end;
    }
    Ok((values, offset))
}

/// Decodes `DELTA_BYTE_ARRAY`: delta-packed prefix lengths followed by the
/// suffixes as `DELTA_LENGTH_BYTE_ARRAY`. Each value is the first `prefix`
/// bytes of its predecessor followed by its suffix.
pub fn decode_byte_array(data: &Bytes, num_values: usize) -> ParquetResult<Vec<Bytes>> {
    let (prefixes, consumed) = delta_bitpacked::decode(data, num_values)?;
    let (suffixes, _) = decode_length_byte_array(&data.slice(consumed..), num_values)?;

    let mut values = Vec::with_capacity(num_values);
    let mut previous = Bytes::new();
    for (i, (prefix, suffix)) in prefixes.into_iter().zip(suffixes).enumerate() {
        let prefix = usize::try_from(prefix)
            .ok()
            .filter(|p| *p <= previous.len())
            .ok_or_else(|| {
                fmt_err!(
                    MalformedFile,
                    "prefix length {} of value {} exceeds the previous value of {} bytes",
                    prefix,
                    i,
                    previous.len()
                )
            })?;
        let value = if prefix == 0 {
            suffix
        } else {
            let mut value = Vec::with_capacity(prefix + suffix.len());
            value.extend_from_slice(&previous[..prefix]);
            value.extend_from_slice(&suffix);
            Bytes::from(value)
        };
        previous = value.clone();
        values.push(value);
    }
    Ok(values)
}
