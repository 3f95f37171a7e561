use crate::parquet::col_type::ColumnType;
use crate::parquet::compression::{self, Compression};
use crate::parquet::error::{fmt_err, ParquetError, ParquetErrorExt, ParquetResult};
use crate::parquet_read::decoders::{decode_values, Dictionary, PageValues};
use crate::parquet_read::encoding::{bit_width, bitpacked, ceil8, hybrid_rle};
use crate::parquet_read::meta::{Encoding, PageType};
use bytes::Bytes;
use parquet_format_safe::thrift::protocol::TCompactInputProtocol;
use parquet_format_safe::PageHeader as ParquetPageHeader;
use std::io::Cursor;
use std::sync::Arc;

/// What every page of one column chunk is decoded with.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub col_type: ColumnType,
    pub compression: Compression,
    pub max_def_level: u16,
    pub max_rep_level: u16,
    pub max_page_size: usize,
    /// Dotted column path, for error messages.
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPageVersion {
    V1,
    V2,
}

/// A decoded data page: one repetition and definition level per slot, and
/// the values of the slots whose definition level is the column maximum.
#[derive(Debug, Clone)]
pub struct DataPage {
    pub version: DataPageVersion,
    pub encoding: Encoding,
    pub num_values: usize,
    pub num_nulls: usize,
    pub rep_levels: Vec<u16>,
    pub def_levels: Vec<u16>,
    pub values: PageValues,
}

/// Decodes a page header from the start of `data`, returning it with its
/// encoded size.
pub fn read_page_header(data: &[u8], max_page_size: usize) -> ParquetResult<(ParquetPageHeader, usize)> {
    let mut cursor = Cursor::new(data);
    let header = {
        let mut prot = TCompactInputProtocol::new(&mut cursor, max_page_size);
        ParquetPageHeader::read_from_in_protocol(&mut prot)
            .map_err(ParquetError::from)
            .context("could not decode page header")?
    };
    Ok((header, cursor.position() as usize))
}

fn page_size(size: i32, what: &str, max_page_size: usize) -> ParquetResult<usize> {
    let size = usize::try_from(size)
        .map_err(|_| fmt_err!(MalformedFile, "negative {} page size {}", what, size))?;
    if size > max_page_size {
        return Err(fmt_err!(
            MalformedFile,
            "{} page size {} exceeds the {} byte limit",
            what,
            size,
            max_page_size
        ));
    }
    Ok(size)
}

/// Splits the page at the start of `data` into its header and its
/// (compressed) body, returning the bytes both occupy.
pub fn split_page(data: &Bytes, max_page_size: usize) -> ParquetResult<(ParquetPageHeader, Bytes, usize)> {
    let (header, header_size) = read_page_header(data, max_page_size)?;
    let compressed = page_size(header.compressed_page_size, "compressed", max_page_size)?;
    page_size(header.uncompressed_page_size, "uncompressed", max_page_size)?;
    let end = header_size + compressed;
    if end > data.len() {
        return Err(fmt_err!(
            MalformedFile,
            "page of {} bytes overruns the column chunk by {} bytes",
            compressed,
            end - data.len()
        ));
    }
    Ok((header, data.slice(header_size..end), end))
}

/// Decodes a dictionary page body.
pub fn decode_dictionary_page(
    header: &ParquetPageHeader,
    body: Bytes,
    context: &PageContext,
) -> ParquetResult<Dictionary> {
    let dict_header = header.dictionary_page_header.as_ref().ok_or_else(|| {
        fmt_err!(
            MalformedFile,
            "dictionary page of column {} has no dictionary header",
            context.path
        )
    })?;
    let encoding = Encoding::from(dict_header.encoding);
    if !matches!(encoding, Encoding::Plain | Encoding::PlainDictionary) {
        return Err(fmt_err!(
            Unsupported,
            "dictionary page of column {} is encoded as {:?}",
            context.path,
            encoding
        ));
    }
    let num_values = usize::try_from(dict_header.num_values).map_err(|_| {
        fmt_err!(
            MalformedFile,
            "dictionary page declares {} values",
            dict_header.num_values
        )
    })?;
    let data = compression::decompress(
        context.compression,
        body,
        header.uncompressed_page_size as usize,
    )?;
    Dictionary::try_new(&data, num_values, &context.col_type)
        .with_context(|_| format!("could not decode dictionary of column {}", context.path))
}

/// Decodes the levels of one kind for a v1 page, returning them with the
/// bytes they occupied.
fn decode_levels_v1(
    data: &[u8],
    encoding: Encoding,
    max_level: u16,
    num_values: usize,
) -> ParquetResult<(Vec<u16>, usize)> {
    if max_level == 0 {
        return Ok((vec![0; num_values], 0));
    }
    let num_bits = bit_width(max_level as u64);
    let (levels, consumed) = match encoding {
        Encoding::Rle => hybrid_rle::decode_length_prefixed(data, num_bits, num_values)?,
        Encoding::BitPacked => {
            let levels = bitpacked::decode_msb(data, num_bits as usize, num_values)?;
            (levels, ceil8(num_values * num_bits as usize))
        }
        other => {
            return Err(fmt_err!(
                Unsupported,
                "levels encoded as {:?} are not supported",
                other
            ))
        }
    };
    Ok((to_levels(levels, max_level)?, consumed))
}

fn to_levels(levels: Vec<u32>, max_level: u16) -> ParquetResult<Vec<u16>> {
    levels
        .into_iter()
        .map(|l| {
            if l > max_level as u32 {
                Err(fmt_err!(
                    DecodeInvariant,
                    "level {} exceeds the column maximum {}",
                    l,
                    max_level
                ))
            } else {
                Ok(l as u16)
            }
        })
        .collect()
}

fn count_non_null(def_levels: &[u16], max_def_level: u16) -> usize {
    def_levels.iter().filter(|d| **d == max_def_level).count()
}

pub fn decode_data_page_v1(
    header: &ParquetPageHeader,
    body: Bytes,
    context: &PageContext,
    dictionary: Option<&Arc<Dictionary>>,
) -> ParquetResult<DataPage> {
    let page_header = header.data_page_header.as_ref().ok_or_else(|| {
        fmt_err!(MalformedFile, "v1 data page has no data page header")
    })?;
    let num_values = usize::try_from(page_header.num_values).map_err(|_| {
        fmt_err!(
            MalformedFile,
            "data page declares {} values",
            page_header.num_values
        )
    })?;
    let data = compression::decompress(
        context.compression,
        body,
        header.uncompressed_page_size as usize,
    )?;

    let (rep_levels, rep_size) = decode_levels_v1(
        &data,
        page_header.repetition_level_encoding.into(),
        context.max_rep_level,
        num_values,
    )
    .context("could not decode repetition levels")?;
    let (def_levels, def_size) = decode_levels_v1(
        &data[rep_size..],
        page_header.definition_level_encoding.into(),
        context.max_def_level,
        num_values,
    )
    .context("could not decode definition levels")?;

    let non_null = count_non_null(&def_levels, context.max_def_level);
    let encoding = Encoding::from(page_header.encoding);
    let values = decode_values(
        encoding,
        &data.slice(rep_size + def_size..),
        non_null,
        &context.col_type,
        dictionary,
    )?;
    Ok(DataPage {
        version: DataPageVersion::V1,
        encoding,
        num_values,
        num_nulls: num_values - non_null,
        rep_levels,
        def_levels,
        values,
    })
}

pub fn decode_data_page_v2(
    header: &ParquetPageHeader,
    body: Bytes,
    context: &PageContext,
    dictionary: Option<&Arc<Dictionary>>,
) -> ParquetResult<DataPage> {
    let page_header = header.data_page_header_v2.as_ref().ok_or_else(|| {
        fmt_err!(MalformedFile, "v2 data page has no data page header")
    })?;
    let as_size = |v: i32, what: &str| {
        usize::try_from(v)
            .map_err(|_| fmt_err!(MalformedFile, "v2 data page declares {} {}", v, what))
    };
    let num_values = as_size(page_header.num_values, "values")?;
    let num_nulls = as_size(page_header.num_nulls, "nulls")?;
    let rep_size = as_size(page_header.repetition_levels_byte_length, "repetition level bytes")?;
    let def_size = as_size(page_header.definition_levels_byte_length, "definition level bytes")?;
    let levels_size = rep_size + def_size;
    if levels_size > body.len() {
        return Err(fmt_err!(
            MalformedFile,
            "v2 levels of {} bytes exceed the {} byte page",
            levels_size,
            body.len()
        ));
    }

    // levels are never compressed in v2 pages
    let rep_levels = if context.max_rep_level == 0 {
        vec![0; num_values]
    } else {
        let num_bits = bit_width(context.max_rep_level as u64);
        let levels = hybrid_rle::decode(&body[..rep_size], num_bits, num_values)
            .context("could not decode repetition levels")?;
        to_levels(levels, context.max_rep_level)?
    };
    let def_levels = if context.max_def_level == 0 {
        vec![0; num_values]
    } else {
        let num_bits = bit_width(context.max_def_level as u64);
        let levels = hybrid_rle::decode(&body[rep_size..levels_size], num_bits, num_values)
            .context("could not decode definition levels")?;
        to_levels(levels, context.max_def_level)?
    };

    let non_null = count_non_null(&def_levels, context.max_def_level);
    if num_nulls > num_values || non_null != num_values - num_nulls {
        return Err(fmt_err!(
            DecodeInvariant,
            "v2 data page of column {} declares {} nulls in {} values, definition levels show {}",
            context.path,
            num_nulls,
            num_values,
            num_values - non_null
        ));
    }

    let values = body.slice(levels_size..);
    let values = if page_header.is_compressed.unwrap_or(true) {
        let uncompressed = (header.uncompressed_page_size as usize)
            .checked_sub(levels_size)
            .ok_or_else(|| {
                fmt_err!(
                    MalformedFile,
                    "v2 uncompressed page size {} is smaller than its levels",
                    header.uncompressed_page_size
                )
            })?;
        compression::decompress(context.compression, values, uncompressed)?
    } else {
        values
    };

    let encoding = Encoding::from(page_header.encoding);
    let values = decode_values(encoding, &values, non_null, &context.col_type, dictionary)?;
    Ok(DataPage {
        version: DataPageVersion::V2,
        encoding,
        num_values,
        num_nulls,
        rep_levels,
        def_levels,
        values,
    })
}

/// Lazily decodes the data pages of a column chunk, one at a time.
///
/// Iteration ends once the pages seen account for the chunk's declared value
/// count. A dictionary page met along the way becomes the dictionary of the
/// pages that follow it.
#[derive(Debug, Clone)]
pub struct PageIterator {
    data: Bytes,
    offset: usize,
    values_seen: u64,
    total_values: u64,
    context: Arc<PageContext>,
    dictionary: Option<Arc<Dictionary>>,
    failed: bool,
}

impl PageIterator {
    pub fn new(
        data: Bytes,
        total_values: u64,
        context: Arc<PageContext>,
        dictionary: Option<Arc<Dictionary>>,
    ) -> Self {
        Self {
            data,
            offset: 0,
            values_seen: 0,
            total_values,
            context,
            dictionary,
            failed: false,
        }
    }

    pub fn context(&self) -> &PageContext {
        &self.context
    }

    pub fn dictionary(&self) -> Option<&Arc<Dictionary>> {
        self.dictionary.as_ref()
    }

    fn read_next(&mut self) -> ParquetResult<Option<DataPage>> {
        loop {
            if self.values_seen >= self.total_values {
                return Ok(None);
            }
            if self.offset >= self.data.len() {
                return Err(fmt_err!(
                    MalformedFile,
                    "column chunk {} ended after {} of {} values",
                    self.context.path,
                    self.values_seen,
                    self.total_values
                ));
            }
            let rest = self.data.slice(self.offset..);
            let (header, body, consumed) = split_page(&rest, self.context.max_page_size)?;
            self.offset += consumed;

            let page = match PageType::from(header.type_) {
                PageType::DictionaryPage => {
                    if self.dictionary.is_some() {
                        return Err(fmt_err!(
                            MalformedFile,
                            "column chunk {} has more than one dictionary page",
                            self.context.path
                        ));
                    }
                    log::warn!(
                        "dictionary page of column {} found among its data pages",
                        self.context.path
                    );
                    let dictionary = decode_dictionary_page(&header, body, &self.context)?;
                    self.dictionary = Some(Arc::new(dictionary));
                    continue;
                }
                PageType::DataPage => {
                    decode_data_page_v1(&header, body, &self.context, self.dictionary.as_ref())?
                }
                PageType::DataPageV2 => {
                    decode_data_page_v2(&header, body, &self.context, self.dictionary.as_ref())?
                }
                other => {
                    log::trace!("skipping {:?} page of column {}", other, self.context.path);
                    continue;
                }
            };
            log::trace!(
                "decoded {:?} page of column {}: {} values, {} nulls, {:?}",
                page.version,
                self.context.path,
                page.num_values,
                page.num_nulls,
                page.encoding
            );
            self.values_seen += page.num_values as u64;
            return Ok(Some(page));
        }
    }
}

impl Iterator for PageIterator {
    type Item = ParquetResult<Arc<DataPage>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let page = self
            .read_next()
            .with_context(|_| format!("could not decode page of column {}", self.context.path));
        match page {
            Ok(page) => page.map(|p| Ok(Arc::new(p))),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parquet::value::Value;
    use crate::parquet_read::encoding::hybrid_rle::encoder;
    use parquet_format_safe::thrift::protocol::TCompactOutputProtocol;
    use parquet_format_safe::{DataPageHeader, DataPageHeaderV2, DictionaryPageHeader};

    fn context(max_def_level: u16, max_rep_level: u16) -> Arc<PageContext> {
        Arc::new(PageContext {
            col_type: ColumnType::Int32,
            compression: Compression::Uncompressed,
            max_def_level,
            max_rep_level,
            max_page_size: 1 << 20,
            path: "c".to_string(),
        })
    }

    fn header(page_type: parquet_format_safe::PageType, body_len: usize) -> ParquetPageHeader {
        ParquetPageHeader {
            type_: page_type,
            uncompressed_page_size: body_len as i32,
            compressed_page_size: body_len as i32,
            crc: None,
            data_page_header: None,
            index_page_header: None,
            dictionary_page_header: None,
            data_page_header_v2: None,
        }
    }

    fn write_page(out: &mut Vec<u8>, header: &ParquetPageHeader, body: &[u8]) {
        let mut prot = TCompactOutputProtocol::new(&mut *out);
        header.write_to_out_protocol(&mut prot).unwrap();
        out.extend_from_slice(body);
    }

    fn ints(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// A v1 page of an optional column: `None` entries are nulls.
    fn v1_page(out: &mut Vec<u8>, values: &[Option<i32>], encoding: parquet_format_safe::Encoding) {
        let defs = values.iter().map(|v| v.is_some() as u32).collect::<Vec<_>>();
        let levels = encoder::encode(&defs, 1);
        let mut body = (levels.len() as u32).to_le_bytes().to_vec();
        body.extend_from_slice(&levels);
        let present = values.iter().flatten().copied().collect::<Vec<_>>();
        if encoding == parquet_format_safe::Encoding::RLE_DICTIONARY {
            body.push(8);
            encoder::bitpacked(
                &mut body,
                &present.iter().map(|v| *v as u32).collect::<Vec<_>>(),
                8,
            );
        } else {
            body.extend_from_slice(&ints(&present));
        }
        let mut h = header(parquet_format_safe::PageType::DATA_PAGE, body.len());
        h.data_page_header = Some(DataPageHeader {
            num_values: values.len() as i32,
            encoding,
            definition_level_encoding: parquet_format_safe::Encoding::RLE,
            repetition_level_encoding: parquet_format_safe::Encoding::RLE,
            statistics: None,
        });
        write_page(out, &h, &body);
    }

    fn collect(pages: PageIterator) -> Vec<Option<Value>> {
        let mut out = Vec::new();
        for page in pages {
            let page = page.unwrap();
            let mut value_index = 0;
            for def in &page.def_levels {
                if *def == 1 {
                    out.push(page.values.get(value_index).cloned());
                    value_index += 1;
                } else {
                    out.push(None);
                }
            }
        }
        out
    }

    #[test]
    fn test_v1_pages() {
        let mut data = Vec::new();
        v1_page(&mut data, &[Some(1), None, Some(3)], parquet_format_safe::Encoding::PLAIN);
        v1_page(&mut data, &[None, Some(5)], parquet_format_safe::Encoding::PLAIN);
        let pages = PageIterator::new(data.into(), 5, context(1, 0), None);
        assert_eq!(
            collect(pages),
            vec![
                Some(Value::Int32(1)),
                None,
                Some(Value::Int32(3)),
                None,
                Some(Value::Int32(5))
            ]
        );
    }

    #[test]
    fn test_inline_dictionary_page() {
        let mut data = Vec::new();
        let dict = ints(&[100, 200, 300]);
        let mut h = header(parquet_format_safe::PageType::DICTIONARY_PAGE, dict.len());
        h.dictionary_page_header = Some(DictionaryPageHeader {
            num_values: 3,
            encoding: parquet_format_safe::Encoding::PLAIN,
            is_sorted: None,
        });
        write_page(&mut data, &h, &dict);
        v1_page(
            &mut data,
            &[Some(2), None, Some(0)],
            parquet_format_safe::Encoding::RLE_DICTIONARY,
        );
        let pages = PageIterator::new(data.into(), 3, context(1, 0), None);
        assert_eq!(
            collect(pages),
            vec![Some(Value::Int32(300)), None, Some(Value::Int32(100))]
        );
    }

    #[test]
    fn test_v2_page_null_count_mismatch() {
        let defs = encoder::encode(&[1, 0, 1], 1);
        let mut body = defs.clone();
        body.extend_from_slice(&ints(&[7, 8]));
        let mut h = header(parquet_format_safe::PageType::DATA_PAGE_V2, body.len());
        let mut v2 = DataPageHeaderV2 {
            num_values: 3,
            num_nulls: 1,
            num_rows: 3,
            encoding: parquet_format_safe::Encoding::PLAIN,
            definition_levels_byte_length: defs.len() as i32,
            repetition_levels_byte_length: 0,
            is_compressed: Some(false),
            statistics: None,
        };
        h.data_page_header_v2 = Some(v2.clone());
        let page = decode_data_page_v2(&h, body.clone().into(), &context(1, 0), None).unwrap();
        assert_eq!(page.def_levels, vec![1, 0, 1]);
        assert_eq!(page.values.get(1), Some(&Value::Int32(8)));

        v2.num_nulls = 2;
        h.data_page_header_v2 = Some(v2);
        let err = decode_data_page_v2(&h, body.into(), &context(1, 0), None).unwrap_err();
        assert!(err.is_decode_invariant());
    }

    #[test]
    fn test_truncated_chunk() {
        let mut data = Vec::new();
        v1_page(&mut data, &[Some(1), Some(2)], parquet_format_safe::Encoding::PLAIN);
        let mut pages = PageIterator::new(data.into(), 4, context(1, 0), None);
        assert!(pages.next().unwrap().is_ok());
        assert!(pages.next().unwrap().unwrap_err().is_malformed());
        assert!(pages.next().is_none());
    }

    #[test]
    fn test_page_overruns_chunk() {
        let mut data = Vec::new();
        v1_page(&mut data, &[Some(1), Some(2)], parquet_format_safe::Encoding::PLAIN);
        data.truncate(data.len() - 1);
        let mut pages = PageIterator::new(data.into(), 2, context(1, 0), None);
        assert!(pages.next().unwrap().unwrap_err().is_malformed());
    }

    #[test]
    fn test_bit_packed_levels() {
        // three levels of width 2, most significant bit first: 2, 1, 0
        let data = [0b1001_0000u8];
        let (levels, consumed) = decode_levels_v1(&data, Encoding::BitPacked, 2, 3).unwrap();
        assert_eq!(levels, vec![2, 1, 0]);
        assert_eq!(consumed, 1);
        let (levels, consumed) = decode_levels_v1(&data, Encoding::Rle, 0, 3).unwrap();
        assert_eq!(levels, vec![0, 0, 0]);
        assert_eq!(consumed, 0);
    }
}
