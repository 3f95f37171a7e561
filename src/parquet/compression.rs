/*******************************************************************************
 *     ___                  _   ____  ____
 *    / _ \ _   _  ___  ___| |_|  _ \| __ )
 *   | | | | | | |/ _ \/ __| __| | | |  _ \
 *   | |_| | |_| |  __/\__ \ |_| |_| | |_) |
 *    \__\_\\__,_|\___||___/\__|____/|____/
 *
 *  Copyright (c) 2014-2019 Appsicle
 *  Copyright (c) 2019-2024 QuestDB
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *  http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 *
 ******************************************************************************/
use crate::parquet::error::{fmt_err, ParquetResult};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Debug;
use std::io::Read;
use std::sync::{Arc, OnceLock, RwLock};

/// Compression codec of a column chunk, as tagged in the footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    Uncompressed,
    Snappy,
    Gzip,
    Lzo,
    Brotli,
    Lz4,
    Zstd,
    Lz4Raw,
    /// A codec id this crate has no name for.
    Other(i32),
}

impl From<parquet_format_safe::CompressionCodec> for Compression {
    fn from(codec: parquet_format_safe::CompressionCodec) -> Self {
        use parquet_format_safe::CompressionCodec as Codec;
        match codec {
            Codec::UNCOMPRESSED => Compression::Uncompressed,
            Codec::SNAPPY => Compression::Snappy,
            Codec::GZIP => Compression::Gzip,
            Codec::LZO => Compression::Lzo,
            Codec::BROTLI => Compression::Brotli,
            Codec::LZ4 => Compression::Lz4,
            Codec::ZSTD => Compression::Zstd,
            Codec::LZ4_RAW => Compression::Lz4Raw,
            other => Compression::Other(other.0),
        }
    }
}

/// Turns a compressed page payload back into its plain bytes.
pub trait Decompressor: Send + Sync + Debug {
    /// `uncompressed_size` is the size declared by the page header.
    fn decompress(&self, input: Bytes, uncompressed_size: usize) -> ParquetResult<Bytes>;
}

#[derive(Debug)]
struct Passthrough;

impl Decompressor for Passthrough {
    fn decompress(&self, input: Bytes, _uncompressed_size: usize) -> ParquetResult<Bytes> {
        Ok(input)
    }
}

#[derive(Debug)]
struct Snappy;

impl Decompressor for Snappy {
    fn decompress(&self, input: Bytes, uncompressed_size: usize) -> ParquetResult<Bytes> {
        let mut out = vec![0u8; uncompressed_size];
        let len = snap::raw::Decoder::new()
            .decompress(&input, &mut out)
            .map_err(|e| fmt_err!(MalformedFile, "snappy decompression failed: {}", e))?;
        out.truncate(len);
        Ok(out.into())
    }
}

#[derive(Debug)]
struct Gzip;

impl Decompressor for Gzip {
    fn decompress(&self, input: Bytes, uncompressed_size: usize) -> ParquetResult<Bytes> {
        let mut out = Vec::with_capacity(uncompressed_size);
        flate2::read::MultiGzDecoder::new(&input[..])
            .read_to_end(&mut out)
            .map_err(|e| fmt_err!(MalformedFile, "gzip decompression failed: {}", e))?;
        Ok(out.into())
    }
}

#[derive(Debug)]
struct Brotli;

impl Decompressor for Brotli {
    fn decompress(&self, input: Bytes, uncompressed_size: usize) -> ParquetResult<Bytes> {
        const BUFFER_SIZE: usize = 4096;
        let mut out = Vec::with_capacity(uncompressed_size);
        brotli::Decompressor::new(&input[..], BUFFER_SIZE)
            .read_to_end(&mut out)
            .map_err(|e| fmt_err!(MalformedFile, "brotli decompression failed: {}", e))?;
        Ok(out.into())
    }
}

#[derive(Debug)]
struct Zstd;

impl Decompressor for Zstd {
    fn decompress(&self, input: Bytes, _uncompressed_size: usize) -> ParquetResult<Bytes> {
        let out = zstd::stream::decode_all(&input[..])
            .map_err(|e| fmt_err!(MalformedFile, "zstd decompression failed: {}", e))?;
        Ok(out.into())
    }
}

#[derive(Debug)]
struct Lz4Raw;

impl Decompressor for Lz4Raw {
    fn decompress(&self, input: Bytes, uncompressed_size: usize) -> ParquetResult<Bytes> {
        let out = lz4_flex::block::decompress(&input, uncompressed_size)
            .map_err(|e| fmt_err!(MalformedFile, "lz4 decompression failed: {}", e))?;
        Ok(out.into())
    }
}

/// The deprecated LZ4 codec: Hadoop framed blocks, with a fallback to the
/// LZ4 frame format some writers produced instead.
#[derive(Debug)]
struct Lz4Hadoop;

impl Lz4Hadoop {
    const PREFIX_LEN: usize = 8;

    fn try_hadoop(input: &[u8], uncompressed_size: usize) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(uncompressed_size);
        let mut rest = input;
        while !rest.is_empty() {
            if rest.len() < Self::PREFIX_LEN {
                return None;
            }
            let expected = u32::from_be_bytes(rest[0..4].try_into().ok()?) as usize;
            let compressed = u32::from_be_bytes(rest[4..8].try_into().ok()?) as usize;
            rest = &rest[Self::PREFIX_LEN..];
            if compressed > rest.len() {
                return None;
            }
            let block = lz4_flex::block::decompress(&rest[..compressed], expected).ok()?;
            if block.len() != expected {
                return None;
            }
            out.extend_from_slice(&block);
            rest = &rest[compressed..];
        }
        (out.len() == uncompressed_size).then_some(out)
    }
}

impl Decompressor for Lz4Hadoop {
    fn decompress(&self, input: Bytes, uncompressed_size: usize) -> ParquetResult<Bytes> {
        if let Some(out) = Self::try_hadoop(&input, uncompressed_size) {
            return Ok(out.into());
        }
        let mut out = Vec::with_capacity(uncompressed_size);
        lz4_flex::frame::FrameDecoder::new(&input[..])
            .read_to_end(&mut out)
            .map_err(|e| fmt_err!(MalformedFile, "lz4 decompression failed: {}", e))?;
        Ok(out.into())
    }
}

type Registry = RwLock<HashMap<Compression, Arc<dyn Decompressor>>>;

fn registry() -> &'static Registry {
    static CODECS: OnceLock<Registry> = OnceLock::new();
    CODECS.get_or_init(|| {
        let mut codecs: HashMap<Compression, Arc<dyn Decompressor>> = HashMap::new();
        codecs.insert(Compression::Uncompressed, Arc::new(Passthrough));
        codecs.insert(Compression::Snappy, Arc::new(Snappy));
        codecs.insert(Compression::Gzip, Arc::new(Gzip));
        codecs.insert(Compression::Brotli, Arc::new(Brotli));
        codecs.insert(Compression::Lz4, Arc::new(Lz4Hadoop));
        codecs.insert(Compression::Zstd, Arc::new(Zstd));
        codecs.insert(Compression::Lz4Raw, Arc::new(Lz4Raw));
        RwLock::new(codecs)
    })
}

/// Adds or replaces the decompressor used for `codec`.
pub fn register(codec: Compression, decompressor: Arc<dyn Decompressor>) {
    let mut codecs = registry().write().unwrap_or_else(|e| e.into_inner());
    codecs.insert(codec, decompressor);
}

pub fn lookup(codec: Compression) -> ParquetResult<Arc<dyn Decompressor>> {
    let codecs = registry().read().unwrap_or_else(|e| e.into_inner());
    codecs.get(&codec).cloned().ok_or_else(|| {
        fmt_err!(
            Unsupported,
            "no decompressor registered for codec {:?}, use compression::register to add one",
            codec
        )
    })
}

pub fn decompress(codec: Compression, input: Bytes, uncompressed_size: usize) -> ParquetResult<Bytes> {
    let out = lookup(codec)?.decompress(input, uncompressed_size)?;
    if out.len() != uncompressed_size {
        return Err(fmt_err!(
            MalformedFile,
            "{:?} page decompressed to {} bytes, header declared {}",
            codec,
            out.len(),
            uncompressed_size
        ));
    }
    Ok(out)
}
