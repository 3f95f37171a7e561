//! Bloom filters stored next to column chunks, and the registries of the hash
//! functions and algorithms they may declare.

mod read;
pub mod split_block;

pub use read::{read_header, BloomFilterHeader};

use crate::parquet::col_type::ColumnType;
use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet::value::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock, RwLock};

pub const XXHASH: &str = "XXHASH";
pub const BLOCK: &str = "BLOCK";

/// Smallest and largest bitsets writers produce.
const MIN_BYTES: usize = split_block::BYTES_PER_BLOCK;
const MAX_BYTES: usize = 128 * 1024 * 1024;

/// Maps the plain-encoded bytes of a value to the 64 bit hash a filter
/// stores.
pub trait BloomHash: Send + Sync + Debug {
    fn hash(&self, bytes: &[u8]) -> u64;
}

/// How hashes are laid out in a filter's bitset.
pub trait BloomAlgorithm: Send + Sync + Debug {
    fn validate(&self, bitset: &[u8]) -> ParquetResult<()>;
    fn check(&self, bitset: &[u8], hash: u64) -> bool;
    fn insert(&self, bitset: &mut [u8], hash: u64);
}

/// xxHash64 with seed 0.
#[derive(Debug, Default)]
pub struct XxHash64;

impl BloomHash for XxHash64 {
    fn hash(&self, bytes: &[u8]) -> u64 {
        xxhash_rust::xxh64::xxh64(bytes, 0)
    }
}

struct Registry<T: ?Sized> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> Registry<T> {
    fn new(defaults: Vec<(&str, Arc<T>)>) -> Self {
        let entries = defaults
            .into_iter()
            .map(|(name, entry)| (name.to_string(), entry))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    fn register(&self, name: &str, entry: Arc<T>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(name.to_string(), entry);
    }

    fn lookup(&self, name: &str) -> Option<Arc<T>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(name).cloned()
    }
}

fn hashes() -> &'static Registry<dyn BloomHash> {
    static HASHES: OnceLock<Registry<dyn BloomHash>> = OnceLock::new();
    HASHES.get_or_init(|| Registry::new(vec![(XXHASH, Arc::new(XxHash64) as Arc<dyn BloomHash>)]))
}

fn algorithms() -> &'static Registry<dyn BloomAlgorithm> {
    static ALGORITHMS: OnceLock<Registry<dyn BloomAlgorithm>> = OnceLock::new();
    ALGORITHMS.get_or_init(|| {
        Registry::new(vec![(
            BLOCK,
            Arc::new(split_block::SplitBlock) as Arc<dyn BloomAlgorithm>,
        )])
    })
}

/// Adds or replaces the hash function filters tagged `name` are read with.
pub fn register_hash(name: &str, hash: Arc<dyn BloomHash>) {
    hashes().register(name, hash);
}

pub fn register_algorithm(name: &str, algorithm: Arc<dyn BloomAlgorithm>) {
    algorithms().register(name, algorithm);
}

pub fn lookup_hash(name: &str) -> ParquetResult<Arc<dyn BloomHash>> {
    hashes()
        .lookup(name)
        .ok_or_else(|| fmt_err!(Unsupported, "no bloom filter hash registered as {:?}", name))
}

pub fn lookup_algorithm(name: &str) -> ParquetResult<Arc<dyn BloomAlgorithm>> {
    algorithms().lookup(name).ok_or_else(|| {
        fmt_err!(
            Unsupported,
            "no bloom filter algorithm registered as {:?}",
            name
        )
    })
}

/// A bloom filter over the values of one column chunk.
///
/// Membership is one-sided: `false` means the value is certainly absent.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bitset: Vec<u8>,
    hash: Arc<dyn BloomHash>,
    algorithm: Arc<dyn BloomAlgorithm>,
}

impl BloomFilter {
    pub fn try_new(
        bitset: Vec<u8>,
        hash: Arc<dyn BloomHash>,
        algorithm: Arc<dyn BloomAlgorithm>,
    ) -> ParquetResult<Self> {
        algorithm.validate(&bitset)?;
        Ok(Self {
            bitset,
            hash,
            algorithm,
        })
    }

    /// Builds the filter a header describes, resolving its hash function and
    /// algorithm through the registries.
    pub fn from_header(header: &BloomFilterHeader, bitset: Vec<u8>) -> ParquetResult<Self> {
        if bitset.len() != header.num_bytes {
            return Err(fmt_err!(
                MalformedFile,
                "bloom filter bitset has {} bytes, header declares {}",
                bitset.len(),
                header.num_bytes
            ));
        }
        Self::try_new(
            bitset,
            lookup_hash(&header.hash)?,
            lookup_algorithm(&header.algorithm)?,
        )
    }

    /// An empty split block filter sized for `ndv` distinct values at false
    /// positive probability `fpp`.
    pub fn with_capacity(ndv: u64, fpp: f64) -> ParquetResult<Self> {
        Self::try_new(
            vec![0; optimal_num_bytes(ndv, fpp)],
            lookup_hash(XXHASH)?,
            lookup_algorithm(BLOCK)?,
        )
    }

    pub fn num_bytes(&self) -> usize {
        self.bitset.len()
    }

    pub fn bitset(&self) -> &[u8] {
        &self.bitset
    }

    pub fn hash_bytes(&self, bytes: &[u8]) -> u64 {
        self.hash.hash(bytes)
    }

    pub fn contains_hash(&self, hash: u64) -> bool {
        self.algorithm.check(&self.bitset, hash)
    }

    pub fn insert_hash(&mut self, hash: u64) {
        self.algorithm.insert(&mut self.bitset, hash)
    }

    /// Whether `value` may be among the values of a column of `col_type`.
    /// A value the column cannot hold is never contained.
    pub fn contains(&self, col_type: &ColumnType, value: &Value) -> bool {
        match col_type.plain_bytes(value) {
            Some(bytes) => self.contains_hash(self.hash_bytes(&bytes)),
            None => false,
        }
    }

    /// Inserts `value`, returning `false` when the column cannot hold it.
    pub fn insert(&mut self, col_type: &ColumnType, value: &Value) -> bool {
        match col_type.plain_bytes(value) {
            Some(bytes) => {
                let hash = self.hash_bytes(&bytes);
                self.insert_hash(hash);
                true
            }
            None => false,
        }
    }
}

/// Bitset size for `ndv` distinct values at false positive probability
/// `fpp`, rounded up to a power of two.
pub fn optimal_num_bytes(ndv: u64, fpp: f64) -> usize {
    let fpp = fpp.clamp(f64::MIN_POSITIVE, 0.999);
    let bits = -8.0 * ndv as f64 / (1.0 - fpp.powf(1.0 / 8.0)).ln();
    let bytes = (bits / 8.0).ceil();
    let bytes = if bytes.is_finite() && bytes < MAX_BYTES as f64 {
        bytes as usize
    } else {
        MAX_BYTES
    };
    bytes.next_power_of_two().clamp(MIN_BYTES, MAX_BYTES)
}
