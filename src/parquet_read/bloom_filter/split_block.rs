//! The split block bloom filter layout: 256 bit blocks of eight 32 bit words,
//! one bit set per word.

use super::BloomAlgorithm;
use crate::parquet::error::{fmt_err, ParquetResult};

/// magic numbers taken from https://github.com/apache/parquet-format/blob/master/BloomFilter.md
const SALT: [u32; 8] = [
    0x47b6137b, 0x44974d91, 0x8824ad5b, 0xa2b7289d, 0x705495c7, 0x2df1424b, 0x9efc4947, 0x5c6bfb31,
];

pub const BYTES_PER_BLOCK: usize = 32;

#[inline]
fn hash_to_block_index(hash: u64, len: usize) -> usize {
    let number_of_blocks = len as u64 / BYTES_PER_BLOCK as u64;
    let high_hash = hash >> 32;
    ((high_hash * number_of_blocks) >> 32) as usize
}

#[inline]
fn word(bitset: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&bitset[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
fn masks(hash: u64) -> impl Iterator<Item = (usize, u32)> {
    let key = hash as u32;
    SALT.iter()
        .enumerate()
        .map(move |(i, &salt)| (i * 4, 1u32 << (key.wrapping_mul(salt) >> 27)))
}

#[inline]
pub fn is_in_set(bitset: &[u8], hash: u64) -> bool {
    if bitset.is_empty() {
        return false;
    }
    let block_offset = hash_to_block_index(hash, bitset.len()) * BYTES_PER_BLOCK;
    masks(hash).all(|(word_offset, mask)| word(bitset, block_offset + word_offset) & mask != 0)
}

/// Inserts a new hash to the set
#[inline]
pub fn insert(bitset: &mut [u8], hash: u64) {
    if bitset.is_empty() {
        return;
    }
    let block_offset = hash_to_block_index(hash, bitset.len()) * BYTES_PER_BLOCK;
    for (word_offset, mask) in masks(hash) {
        let offset = block_offset + word_offset;
        let new_word = word(bitset, offset) | mask;
        bitset[offset..offset + 4].copy_from_slice(&new_word.to_le_bytes());
    }
}

/// The `BLOCK` bloom filter algorithm.
#[derive(Debug, Default)]
pub struct SplitBlock;

impl BloomAlgorithm for SplitBlock {
    fn validate(&self, bitset: &[u8]) -> ParquetResult<()> {
        if bitset.is_empty() || bitset.len() % BYTES_PER_BLOCK != 0 {
            return Err(fmt_err!(
                MalformedFile,
                "split block bloom filter of {} bytes is not a whole number of {} byte blocks",
                bitset.len(),
                BYTES_PER_BLOCK
            ));
        }
        Ok(())
    }

    fn check(&self, bitset: &[u8], hash: u64) -> bool {
        is_in_set(bitset, hash)
    }

    fn insert(&self, bitset: &mut [u8], hash: u64) {
        insert(bitset, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_then_check() {
        let mut bitset = vec![0u8; 4 * BYTES_PER_BLOCK];
        let hashes = [0u64, 1, 0xdead_beef_cafe_babe, u64::MAX];
        for h in hashes {
            insert(&mut bitset, h);
        }
        for h in hashes {
            assert!(is_in_set(&bitset, h));
        }
        // one block holds at most 8 bits per inserted hash
        let set_bits: u32 = bitset.iter().map(|b| b.count_ones()).sum();
        assert!(set_bits <= 8 * hashes.len() as u32);
    }

    #[test]
    fn test_block_selection_uses_high_bits() {
        assert_eq!(hash_to_block_index(0x0000_0000_ffff_ffff, 8 * BYTES_PER_BLOCK), 0);
        assert_eq!(hash_to_block_index(0xffff_ffff_0000_0000, 8 * BYTES_PER_BLOCK), 7);
        assert_eq!(hash_to_block_index(0x8000_0000_0000_0000, 8 * BYTES_PER_BLOCK), 4);
    }

    #[test]
    fn test_single_word_mask() {
        let mut bitset = vec![0u8; BYTES_PER_BLOCK];
        insert(&mut bitset, 1);
        // key 1 selects bit (salt >> 27) in each word
        for (i, salt) in SALT.iter().enumerate() {
            assert_eq!(word(&bitset, i * 4), 1 << (salt >> 27));
        }
    }

    #[test]
    fn test_validate() {
        assert!(SplitBlock.validate(&[0; 64]).is_ok());
        assert!(SplitBlock.validate(&[0; 48]).unwrap_err().is_malformed());
        assert!(SplitBlock.validate(&[]).unwrap_err().is_malformed());
    }
}
