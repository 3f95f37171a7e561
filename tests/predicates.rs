mod common;

use common::{open, optional_strings, read_rows, strings, write_parquet, Column, Values};
use futures::TryStreamExt;
use parquet::file::properties::WriterProperties;
use parquet_rows::{
    BranchBuilder, CollectionBuilder, ColumnSpec, Field, FieldReader, JsonReader, ParquetResult,
    Predicate, Reader, RowReadSpec, Value,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const FLAT: &str = "
    message m {
        required int64 id;
        optional binary name (STRING);
        optional double score;
    }
";

const NUM_ROWS: usize = 1000;

fn name(row: usize) -> Option<String> {
    (row % 10 != 9).then(|| format!("n{}", row % 13))
}

fn score(row: usize) -> Option<f64> {
    (row % 4 != 0).then(|| row as f64 / 4.0)
}

fn flat_columns() -> Vec<Column> {
    let names = (0..NUM_ROWS).map(name).collect::<Vec<_>>();
    let names = names.iter().map(|n| n.as_deref()).collect::<Vec<_>>();
    let scores = (0..NUM_ROWS).map(score).collect::<Vec<_>>();
    vec![
        Column::required(Values::Int64((0..NUM_ROWS as i64).collect())),
        optional_strings(&names),
        Column::optional(
            Values::Double(scores.iter().flatten().copied().collect()),
            scores.iter().map(|s| s.is_some() as i16).collect(),
        ),
    ]
}

fn props(dictionary: bool) -> WriterProperties {
    WriterProperties::builder()
        .set_dictionary_enabled(dictionary)
        .set_write_batch_size(100)
        .set_data_page_row_count_limit(100)
        .build()
}

/// Counts the rows it builds. Only the root reader counts, nested groups
/// are read by a plain [`FieldReader`].
struct CountingReader {
    builds: Arc<AtomicUsize>,
}

struct CountingBuilder {
    inner: Box<dyn BranchBuilder<Field>>,
    builds: Arc<AtomicUsize>,
}

impl BranchBuilder<Field> for CountingBuilder {
    fn put(&mut self, name: &str, value: Option<Field>) {
        self.inner.put(name, value);
    }

    fn build(self: Box<Self>) -> Field {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.inner.build()
    }
}

impl Reader<Field> for CountingReader {
    fn child_reader(&self, name: &str) -> Arc<dyn Reader<Field>> {
        FieldReader.child_reader(name)
    }

    fn branch_builder(&self) -> Box<dyn BranchBuilder<Field>> {
        Box::new(CountingBuilder {
            inner: FieldReader.branch_builder(),
            builds: self.builds.clone(),
        })
    }

    fn collection_builder(&self) -> Box<dyn CollectionBuilder<Field>> {
        FieldReader.collection_builder()
    }

    fn leaf(&self, value: Value) -> ParquetResult<Field> {
        FieldReader.leaf(value)
    }
}

async fn matching_ids(dictionary: bool, predicate: Predicate) -> Vec<i64> {
    let file = open(write_parquet(FLAT, props(dictionary), vec![flat_columns()])).await;
    let builds = Arc::new(AtomicUsize::new(0));
    let reader = CountingReader {
        builds: builds.clone(),
    };
    let spec = RowReadSpec::new(Arc::new(reader)).with_predicate(predicate);
    let rows = read_rows(&file, spec).await;
    assert_eq!(builds.load(Ordering::SeqCst), rows.len());
    rows.iter()
        .map(|row| row.get("id").and_then(Field::as_value).and_then(Value::as_i64).unwrap())
        .collect()
}

fn ids_where(filter: impl Fn(usize) -> bool) -> Vec<i64> {
    (0..NUM_ROWS).filter(|row| filter(*row)).map(|row| row as i64).collect()
}

#[tokio::test]
async fn test_only_matching_rows_are_built() {
    let ids = matching_ids(false, Predicate::ge(["id"], 900i64)).await;
    assert_eq!(ids, ids_where(|row| row >= 900));
}

#[tokio::test]
async fn test_values_are_coerced_to_the_column_type() {
    let ids = matching_ids(false, Predicate::eq(["id"], 5i32)).await;
    assert_eq!(ids, vec![5]);
}

#[tokio::test]
async fn test_dictionary_encoded_comparisons() {
    for dictionary in [false, true] {
        let ids = matching_ids(dictionary, Predicate::eq(["name"], "n7")).await;
        assert_eq!(ids, ids_where(|row| name(row).as_deref() == Some("n7")));

        let ids = matching_ids(dictionary, Predicate::lt(["name"], "n11")).await;
        assert_eq!(
            ids,
            ids_where(|row| name(row).map_or(false, |n| n.as_str() < "n11")),
            "dictionary {}",
            dictionary
        );
    }
}

#[tokio::test]
async fn test_nulls_never_match() {
    let ids = matching_ids(true, Predicate::lt(["score"], 1e9)).await;
    assert_eq!(ids, ids_where(|row| score(row).is_some()));
    let ids = matching_ids(true, Predicate::ge(["name"], "")).await;
    assert_eq!(ids, ids_where(|row| name(row).is_some()));
}

#[tokio::test]
async fn test_union_of_intersections() {
    let predicate = Predicate::union([
        Predicate::intersection([Predicate::ge(["id"], 10i64), Predicate::lt(["id"], 20i64)]),
        Predicate::intersection([
            Predicate::eq(["name"], "n3"),
            Predicate::gt(["score"], 200.0),
        ]),
    ]);
    let ids = matching_ids(true, predicate).await;
    assert_eq!(
        ids,
        ids_where(|row| {
            (10..20).contains(&row)
                || (name(row).as_deref() == Some("n3") && score(row).map_or(false, |s| s > 200.0))
        })
    );
}

#[tokio::test]
async fn test_unknown_column_matches_everything() {
    let ids = matching_ids(false, Predicate::eq(["nope"], 1i64)).await;
    assert_eq!(ids.len(), NUM_ROWS);
}

#[tokio::test]
async fn test_predicate_columns_are_decoded() {
    let file = open(write_parquet(FLAT, props(true), vec![flat_columns()])).await;
    let spec = RowReadSpec::new(Arc::new(FieldReader))
        .with_columns(ColumnSpec::column(["score"]))
        .with_predicate(Predicate::eq(["id"], 7i64));
    let rows = read_rows(&file, spec).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].to_string(), "{id: 7, score: 1.75}");
}

const TAGGED: &str = "
    message m {
        required int64 id;
        repeated binary tags (STRING);
        optional group meta {
            optional binary doc (JSON);
        }
    }
";

fn tagged_columns(docs: &[Option<&str>]) -> Vec<Column> {
    // tags: ["a", "b"], [], ["c"], ["b"]
    let mut doc = optional_strings(docs);
    doc.def = doc
        .def
        .map(|def| def.into_iter().map(|d| d + 1).collect());
    vec![
        Column::required(Values::Int64(vec![0, 1, 2, 3])),
        Column::repeated(strings(&["a", "b", "c", "b"]), vec![1, 1, 0, 1, 1], vec![0, 1, 0, 0, 0]),
        doc,
    ]
}

#[tokio::test]
async fn test_any_element_of_a_list_matches() {
    let docs = [None, None, None, None];
    let file = open(write_parquet(
        TAGGED,
        WriterProperties::builder().build(),
        vec![tagged_columns(&docs)],
    ))
    .await;
    let spec = RowReadSpec::new(Arc::new(FieldReader))
        .with_columns(ColumnSpec::column(["tags"]))
        .with_predicate(Predicate::eq(["tags"], "b"));
    let rows = read_rows(&file, spec)
        .await
        .iter()
        .map(Field::to_string)
        .collect::<Vec<_>>();
    assert_eq!(rows, vec!["{tags: [\"a\", \"b\"]}", "{tags: [\"b\"]}"]);
}

#[tokio::test]
async fn test_embedded_json() {
    let docs = [Some(r#"{"k": [1, 2]}"#), None, Some("3"), Some("\"x\"")];
    let file = open(write_parquet(
        TAGGED,
        WriterProperties::builder().build(),
        vec![tagged_columns(&docs)],
    ))
    .await;
    let reader = JsonReader::new().with_embedded_json(["meta", "doc"]);
    let spec = RowReadSpec::new(Arc::new(reader)).with_predicate(Predicate::ge(["id"], 2i64));
    let rows = read_rows(&file, spec).await;
    assert_eq!(
        rows,
        vec![
            json!({"id": 2, "tags": ["c"], "meta": {"doc": 3}}),
            json!({"id": 3, "tags": ["b"], "meta": {"doc": "x"}}),
        ]
    );

    let spec = RowReadSpec::new(Arc::new(JsonReader::new()))
        .with_columns(ColumnSpec::column(["meta"]))
        .with_predicate(Predicate::eq(["id"], 0i64));
    let rows = read_rows(&file, spec).await;
    assert_eq!(rows, vec![json!({"id": 0, "meta": {"doc": r#"{"k": [1, 2]}"#}})]);
}

#[tokio::test]
async fn test_invalid_embedded_json_fails_the_stream() {
    let docs = [Some("{"), None, None, None];
    let file = open(write_parquet(
        TAGGED,
        WriterProperties::builder().build(),
        vec![tagged_columns(&docs)],
    ))
    .await;
    let reader = JsonReader::new().with_embedded_json(["meta", "doc"]);
    let result: ParquetResult<Vec<_>> = file
        .rows(RowReadSpec::new(Arc::new(reader)))
        .try_collect()
        .await;
    assert!(result.is_err());
}
