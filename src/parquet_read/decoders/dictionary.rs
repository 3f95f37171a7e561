//! Dictionary pages and the index streams that refer to them.

use super::plain::decode_plain;
use crate::parquet::col_type::ColumnType;
use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet::value::Value;
use crate::parquet_read::encoding::hybrid_rle;
use crate::parquet_read::predicate::Predicate;
use bytes::Bytes;
use std::cmp::Ordering;

/// The decoded values of a column chunk's dictionary page.
#[derive(Debug, Clone, PartialEq)]
pub struct Dictionary {
    values: Vec<Value>,
}

impl Dictionary {
    /// Decodes a dictionary page. Dictionary pages are always plain encoded.
    pub fn try_new(data: &Bytes, num_values: usize, col_type: &ColumnType) -> ParquetResult<Self> {
        let (values, _) = decode_plain(data, num_values, col_type)?;
        Ok(Self { values })
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Linear scan for a value equal to `value` under the column's ordering.
    pub fn contains(&self, col_type: &ColumnType, value: &Value) -> bool {
        self.values
            .iter()
            .any(|v| col_type.compare(v, value) == Some(Ordering::Equal))
    }

    /// Evaluates `predicate` once per dictionary entry, so pages can be
    /// filtered by index.
    pub fn match_set(&self, col_type: &ColumnType, predicate: &Predicate) -> Vec<bool> {
        self.values
            .iter()
            .map(|v| predicate.value_matches(col_type, v))
            .collect()
    }
}

/// Decodes the indices of a dictionary encoded page: a one byte bit width
/// followed by hybrid runs without a length header.
pub fn decode_indices(data: &[u8], num_values: usize, dictionary_len: usize) -> ParquetResult<Vec<u32>> {
    if num_values == 0 {
        return Ok(Vec::new());
    }
    let (&num_bits, runs) = data
        .split_first()
        .ok_or_else(|| fmt_err!(MalformedFile, "dictionary index bit width missing"))?;
    let indices = hybrid_rle::decode(runs, num_bits as u32, num_values)?;
    if let Some(bad) = indices.iter().find(|i| **i as usize >= dictionary_len) {
        return Err(fmt_err!(
            MalformedFile,
            "dictionary index {} out of range for a dictionary of {} values",
            bad,
            dictionary_len
        ));
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parquet_read::encoding::hybrid_rle::encoder;

    fn strings() -> Dictionary {
        let mut data = Vec::new();
        for s in ["apple", "kiwi", "plum"] {
            data.extend_from_slice(&(s.len() as u32).to_le_bytes());
            data.extend_from_slice(s.as_bytes());
        }
        Dictionary::try_new(&data.into(), 3, &ColumnType::String).unwrap()
    }

    #[test]
    fn test_indices() {
        let mut data = vec![2u8];
        encoder::bitpacked(&mut data, &[2, 0, 1], 2);
        encoder::repeated(&mut data, 1, 5, 2);
        let indices = decode_indices(&data, 8, 3).unwrap();
        assert_eq!(indices, vec![2, 0, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_index_out_of_range() {
        let mut data = vec![2u8];
        encoder::repeated(&mut data, 3, 4, 2);
        assert!(decode_indices(&data, 4, 3).unwrap_err().is_malformed());
        assert!(decode_indices(&[], 1, 3).unwrap_err().is_malformed());
        assert_eq!(decode_indices(&[], 0, 3).unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn test_contains_and_match_set() {
        let dict = strings();
        assert_eq!(dict.len(), 3);
        assert!(dict.contains(&ColumnType::String, &Value::from("kiwi")));
        assert!(!dict.contains(&ColumnType::String, &Value::from("pear")));
        assert!(!dict.contains(&ColumnType::String, &Value::Int32(1)));

        let predicate = Predicate::ge(["fruit"], "kiwi").for_child("fruit");
        assert_eq!(
            dict.match_set(&ColumnType::String, &predicate),
            vec![false, true, true]
        );
    }
}
