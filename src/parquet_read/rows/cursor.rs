use crate::parquet::col_type::ColumnType;
use crate::parquet::error::{fmt_err, ParquetResult};
use crate::parquet::value::Value;
use crate::parquet_read::decoders::{Dictionary, PageValues};
use crate::parquet_read::page::{DataPage, PageIterator};
use crate::parquet_read::predicate::Predicate;
use std::cell::RefCell;
use std::sync::Arc;

/// Per-entry predicate outcomes for one dictionary.
#[derive(Debug, Clone)]
struct MatchSet {
    dictionary: Arc<Dictionary>,
    predicate: Predicate,
    matches: Arc<Vec<bool>>,
}

/// Position within the slots of one column chunk.
///
/// The cursor always rests on a slot of a loaded page, or past the last slot
/// of the chunk. Cloning it is cheap: pages are shared and only the
/// position is copied, which lets callers look ahead without disturbing it.
#[derive(Debug, Clone)]
pub struct LeafCursor {
    pages: PageIterator,
    page: Option<Arc<DataPage>>,
    level_index: usize,
    value_index: usize,
    max_def_level: u16,
    max_rep_level: u16,
    col_type: ColumnType,
    match_set: RefCell<Option<MatchSet>>,
}

impl LeafCursor {
    pub fn try_new(pages: PageIterator) -> ParquetResult<Self> {
        let context = pages.context();
        let mut cursor = Self {
            max_def_level: context.max_def_level,
            max_rep_level: context.max_rep_level,
            col_type: context.col_type.clone(),
            pages,
            page: None,
            level_index: 0,
            value_index: 0,
            match_set: RefCell::new(None),
        };
        cursor.load_next_page()?;
        Ok(cursor)
    }

    fn load_next_page(&mut self) -> ParquetResult<()> {
        self.page = None;
        self.level_index = 0;
        self.value_index = 0;
        for page in self.pages.by_ref() {
            let page = page?;
            if page.num_values > 0 {
                self.page = Some(page);
                break;
            }
        }
        Ok(())
    }

    pub fn col_type(&self) -> &ColumnType {
        &self.col_type
    }

    pub fn max_definition_level(&self) -> u16 {
        self.max_def_level
    }

    pub fn max_repetition_level(&self) -> u16 {
        self.max_rep_level
    }

    pub fn has_next(&self) -> bool {
        self.page.is_some()
    }

    /// Definition level of the current slot, `0` past the end.
    pub fn definition_level(&self) -> u16 {
        self.page
            .as_ref()
            .map_or(0, |p| p.def_levels[self.level_index])
    }

    /// Repetition level of the current slot, `0` past the end.
    pub fn repetition_level(&self) -> u16 {
        self.page
            .as_ref()
            .map_or(0, |p| p.rep_levels[self.level_index])
    }

    pub fn is_null(&self) -> bool {
        self.definition_level() < self.max_def_level
    }

    /// The value of the current slot, `None` for nulls.
    pub fn value(&self) -> ParquetResult<Option<&Value>> {
        let Some(page) = &self.page else {
            return Err(fmt_err!(DecodeInvariant, "read past the end of a column chunk"));
        };
        if page.def_levels[self.level_index] < self.max_def_level {
            return Ok(None);
        }
        page.values.get(self.value_index).map(Some).ok_or_else(|| {
            fmt_err!(
                DecodeInvariant,
                "page holds fewer values than its definition levels declare"
            )
        })
    }

    pub fn advance(&mut self) -> ParquetResult<()> {
        let Some(page) = &self.page else {
            return Err(fmt_err!(DecodeInvariant, "read past the end of a column chunk"));
        };
        if page.def_levels[self.level_index] == self.max_def_level {
            self.value_index += 1;
        }
        self.level_index += 1;
        if self.level_index >= page.num_values {
            self.load_next_page()?;
        }
        Ok(())
    }

    /// Evaluates `predicate` on the current slot. Dictionary encoded pages
    /// are checked through a per-entry outcome table, built once per
    /// dictionary and predicate.
    pub fn value_matches(&self, predicate: &Predicate) -> ParquetResult<bool> {
        if predicate.is_all() {
            return Ok(true);
        }
        let Some(page) = &self.page else {
            return Err(fmt_err!(DecodeInvariant, "read past the end of a column chunk"));
        };
        if page.def_levels[self.level_index] < self.max_def_level {
            return Ok(predicate.matches(&self.col_type, None));
        }
        if let PageValues::Dictionary {
            dictionary,
            indices,
        } = &page.values
        {
            let index = indices.get(self.value_index).copied().ok_or_else(|| {
                fmt_err!(
                    DecodeInvariant,
                    "page holds fewer values than its definition levels declare"
                )
            })?;
            let matches = self.match_set(dictionary, predicate);
            return Ok(matches.get(index as usize).copied().unwrap_or(false));
        }
        Ok(self
            .value()?
            .map_or(false, |v| predicate.value_matches(&self.col_type, v)))
    }

    fn match_set(&self, dictionary: &Arc<Dictionary>, predicate: &Predicate) -> Arc<Vec<bool>> {
        let mut cached = self.match_set.borrow_mut();
        match cached.as_ref() {
            Some(set) if Arc::ptr_eq(&set.dictionary, dictionary) && &set.predicate == predicate => {
                set.matches.clone()
            }
            _ => {
                let matches = Arc::new(dictionary.match_set(&self.col_type, predicate));
                *cached = Some(MatchSet {
                    dictionary: dictionary.clone(),
                    predicate: predicate.clone(),
                    matches: matches.clone(),
                });
                matches
            }
        }
    }
}

#[cfg(test)]
impl LeafCursor {
    /// A cursor resting on the first slot of `page`, with no pages after it.
    pub(crate) fn over_page(page: DataPage, context: Arc<crate::parquet_read::page::PageContext>) -> Self {
        let pages = PageIterator::new(bytes::Bytes::new(), 0, context, None);
        let mut cursor = Self::try_new(pages).expect("no pages to decode");
        cursor.page = (page.num_values > 0).then(|| Arc::new(page));
        cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parquet::compression::Compression;
    use crate::parquet_read::meta::Encoding;
    use crate::parquet_read::page::{DataPageVersion, PageContext};

    fn cursor_over(page: DataPage, max_def_level: u16) -> LeafCursor {
        let context = Arc::new(PageContext {
            col_type: ColumnType::String,
            compression: Compression::Uncompressed,
            max_def_level,
            max_rep_level: 0,
            max_page_size: 1024,
            path: "s".to_string(),
        });
        LeafCursor::over_page(page, context)
    }

    fn dictionary_page(indices: Vec<u32>, defs: Vec<u16>) -> DataPage {
        let dictionary = Arc::new(Dictionary::from_values(vec![
            Value::from("apple"),
            Value::from("kiwi"),
            Value::from("pear"),
        ]));
        DataPage {
            version: DataPageVersion::V1,
            encoding: Encoding::RleDictionary,
            num_values: defs.len(),
            num_nulls: defs.iter().filter(|d| **d == 0).count(),
            rep_levels: vec![0; defs.len()],
            def_levels: defs,
            values: PageValues::Dictionary {
                dictionary,
                indices,
            },
        }
    }

    #[test]
    fn test_walks_slots() {
        let mut cursor = cursor_over(dictionary_page(vec![2, 0], vec![1, 0, 1]), 1);
        assert_eq!(cursor.value().unwrap(), Some(&Value::from("pear")));
        cursor.advance().unwrap();
        assert!(cursor.is_null());
        assert_eq!(cursor.value().unwrap(), None);
        cursor.advance().unwrap();
        assert_eq!(cursor.value().unwrap(), Some(&Value::from("apple")));
        cursor.advance().unwrap();
        assert!(!cursor.has_next());
        assert!(cursor.advance().unwrap_err().is_decode_invariant());
    }

    #[test]
    fn test_dictionary_match_set_is_reused() {
        let mut cursor = cursor_over(dictionary_page(vec![1, 2, 0], vec![1, 1, 1]), 1);
        let predicate = Predicate::ge(["s"], "kiwi").for_child("s");
        let mut outcomes = Vec::new();
        while cursor.has_next() {
            outcomes.push(cursor.value_matches(&predicate).unwrap());
            cursor.advance().unwrap();
        }
        assert_eq!(outcomes, vec![true, true, false]);
        let cached = cursor.match_set.borrow();
        assert_eq!(cached.as_ref().unwrap().matches.as_slice(), &[false, true, true]);
    }

    #[test]
    fn test_clone_looks_ahead() {
        let cursor = cursor_over(dictionary_page(vec![0, 1], vec![1, 1]), 1);
        let mut ahead = cursor.clone();
        ahead.advance().unwrap();
        assert_eq!(ahead.value().unwrap(), Some(&Value::from("kiwi")));
        assert_eq!(cursor.value().unwrap(), Some(&Value::from("apple")));
    }
}
