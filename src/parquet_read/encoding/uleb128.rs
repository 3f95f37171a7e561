use crate::parquet::error::{fmt_err, ParquetResult};

/// Decodes an unsigned LEB128 varint, returning the value and the number of
/// bytes it occupied.
pub fn decode(values: &[u8]) -> ParquetResult<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0u32;
    for (consumed, byte) in values.iter().enumerate() {
        if shift == 63 && *byte > 1 {
            return Err(fmt_err!(DecodeInvariant, "ULEB128 value overflows 64 bits"));
        }
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, consumed + 1));
        }
        shift += 7;
        if shift > 63 {
            return Err(fmt_err!(DecodeInvariant, "ULEB128 value overflows 64 bits"));
        }
    }
    Err(fmt_err!(MalformedFile, "truncated ULEB128 value"))
}

/// Encodes `value` into `container`, returning the number of bytes written.
pub fn encode(mut value: u64, container: &mut [u8; 10]) -> usize {
    let mut consumed = 0;
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        container[consumed] = byte;
        consumed += 1;
        if value == 0 {
            return consumed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_1() {
        let data = vec![0xe5, 0x8e, 0x26, 0xDE, 0xAD, 0xBE, 0xEF];
        let (value, len) = decode(&data).unwrap();
        assert_eq!(value, 624_485);
        assert_eq!(len, 3);
    }

    #[test]
    fn test_decode_2() {
        let data = vec![0b00010000, 0b00000001, 0b00000011, 0b00000011];
        let (value, len) = decode(&data).unwrap();
        assert_eq!(value, 16);
        assert_eq!(len, 1);
    }

    #[test]
    fn test_extremes() {
        let mut container = [0u8; 10];
        let len = encode(u64::MAX, &mut container);
        assert_eq!(len, 10);
        assert_eq!(decode(&container[..len]).unwrap(), (u64::MAX, 10));

        let len = encode(0, &mut container);
        assert_eq!(decode(&container[..len]).unwrap(), (0, 1));
    }

    #[test]
    fn test_malformed() {
        assert!(decode(&[0x80, 0x80]).unwrap_err().is_malformed());
        let too_long = [0xff; 11];
        assert!(decode(&too_long).unwrap_err().is_decode_invariant());
    }
}
