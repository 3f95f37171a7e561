pub mod bloom_filter;
pub mod column_chunk;
pub mod column_spec;
pub mod decoders;
pub mod encoding;
pub mod file;
pub mod meta;
pub mod page;
pub mod predicate;
pub mod row_group;
pub mod rows;
pub mod schema;

/// Limits applied while reading a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Largest page (compressed or not) a page header may declare.
    pub max_page_size: usize,
    /// Largest footer the trailer may declare.
    pub max_footer_size: usize,
    /// Bytes fetched ahead of a bloom filter bitset to decode its header.
    pub bloom_header_prefetch: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            max_page_size: 512 * 1024 * 1024,
            max_footer_size: 64 * 1024 * 1024,
            bloom_header_prefetch: 64,
        }
    }
}
