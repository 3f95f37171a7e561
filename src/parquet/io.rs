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
use async_trait::async_trait;
use bytes::Bytes;
use std::io::{Cursor, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Random access to the bytes of a parquet file.
///
/// Fetches are the only suspension points of the reader. Implementations must
/// be safe to call concurrently for independent ranges.
#[async_trait]
pub trait ByteRangeReader: Send + Sync {
    async fn total_bytes_available(&self) -> ParquetResult<u64>;

    /// Reads as many bytes as are readily available into `buf`, starting at
    /// `offset`. Returns `0` once `offset` is at or past the end of the data.
    async fn read_into_buffer(&self, offset: u64, buf: &mut [u8]) -> ParquetResult<usize>;

    /// Retries short reads until `buf` is full.
    async fn read_until_full(&self, offset: u64, buf: &mut [u8]) -> ParquetResult<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            let read = self
                .read_into_buffer(offset + filled as u64, &mut buf[filled..])
                .await?;
            if read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "not enough bytes to fill the buffer: wanted {} at offset {}, got {}",
                        buf.len(),
                        offset,
                        filled
                    ),
                )
                .into());
            }
            filled += read;
        }
        Ok(())
    }

    async fn read_as_buffer(&self, offset: u64, len: usize) -> ParquetResult<Bytes> {
        let mut buf = vec![0u8; len];
        self.read_until_full(offset, &mut buf).await?;
        Ok(Bytes::from(buf))
    }

    async fn read_as_stream(&self, offset: u64, len: usize) -> ParquetResult<Cursor<Bytes>> {
        Ok(Cursor::new(self.read_as_buffer(offset, len).await?))
    }
}

/// A reader over bytes already held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryReader {
    data: Bytes,
}

impl InMemoryReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ByteRangeReader for InMemoryReader {
    async fn total_bytes_available(&self) -> ParquetResult<u64> {
        Ok(self.data.len() as u64)
    }

    async fn read_into_buffer(&self, offset: u64, buf: &mut [u8]) -> ParquetResult<usize> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let count = buf.len().min(self.data.len() - start);
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        Ok(count)
    }

    async fn read_as_buffer(&self, offset: u64, len: usize) -> ParquetResult<Bytes> {
        let start = usize::try_from(offset)
            .map_err(|_| fmt_err!(MalformedFile, "offset {} does not fit in memory", offset))?;
        let end = start.checked_add(len).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => Ok(self.data.slice(start..end)),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "range {}+{} exceeds the {} available bytes",
                    offset,
                    len,
                    self.data.len()
                ),
            )
            .into()),
        }
    }
}

/// A reader over a local file. Every fetch opens its own handle, so fetches
/// for different ranges never contend on a shared cursor.
#[derive(Debug, Clone)]
pub struct FileReader {
    path: PathBuf,
}

impl FileReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ByteRangeReader for FileReader {
    async fn total_bytes_available(&self) -> ParquetResult<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    async fn read_into_buffer(&self, offset: u64, buf: &mut [u8]) -> ParquetResult<usize> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        Ok(file.read(buf).await?)
    }

    async fn read_until_full(&self, offset: u64, buf: &mut [u8]) -> ParquetResult<()> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.read_exact(buf).await?;
        Ok(())
    }
}
