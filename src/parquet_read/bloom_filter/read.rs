use super::{BLOCK, XXHASH};
use crate::parquet::error::{fmt_err, ParquetError, ParquetErrorExt, ParquetResult};
use parquet_format_safe::thrift::protocol::TCompactInputProtocol;
use parquet_format_safe::{BloomFilterAlgorithm, BloomFilterCompression, BloomFilterHash};
use std::io::Cursor;

/// The header stored in front of a bloom filter bitset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilterHeader {
    pub num_bytes: usize,
    /// Registry name of the layout, e.g. `BLOCK`.
    pub algorithm: String,
    /// Registry name of the hash function, e.g. `XXHASH`.
    pub hash: String,
}

/// Decodes a bloom filter header from the start of `data`, returning it with
/// its encoded size. `data` may extend into the bitset.
pub fn read_header(data: &[u8]) -> ParquetResult<(BloomFilterHeader, usize)> {
    let mut cursor = Cursor::new(data);
    let header = {
        // max is ok since `BloomFilterHeader` never allocates
        let mut prot = TCompactInputProtocol::new(&mut cursor, usize::MAX);
        parquet_format_safe::BloomFilterHeader::read_from_in_protocol(&mut prot)
            .map_err(ParquetError::from)
            .context("could not decode bloom filter header")?
    };
    let header_size = cursor.position() as usize;

    let algorithm = match header.algorithm {
        BloomFilterAlgorithm::BLOCK(_) => BLOCK,
    };
    let hash = match header.hash {
        BloomFilterHash::XXHASH(_) => XXHASH,
    };
    match header.compression {
        BloomFilterCompression::UNCOMPRESSED(_) => {}
    }
    let num_bytes = usize::try_from(header.num_bytes).map_err(|_| {
        fmt_err!(
            MalformedFile,
            "bloom filter declares {} bytes",
            header.num_bytes
        )
    })?;
    Ok((
        BloomFilterHeader {
            num_bytes,
            algorithm: algorithm.to_string(),
            hash: hash.to_string(),
        },
        header_size,
    ))
}
