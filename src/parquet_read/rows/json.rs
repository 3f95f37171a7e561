use crate::parquet::error::ParquetResult;
use crate::parquet::value::Value;
use crate::parquet_read::rows::reader::{BranchBuilder, CollectionBuilder, Reader};
use serde_json::{Map, Number, Value as Json};
use std::collections::HashSet;
use std::sync::Arc;

/// Reads rows as JSON objects.
///
/// Numbers and booleans map to their JSON counterparts, NaN and infinities to
/// `null`, and every other value to its display string. Columns named with
/// [`JsonReader::with_embedded_json`] hold JSON text and are parsed in place.
#[derive(Debug, Clone, Default)]
pub struct JsonReader {
    embedded: Arc<HashSet<Vec<String>>>,
    path: Vec<String>,
}

impl JsonReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedded_json<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::make_mut(&mut self.embedded).insert(path.into_iter().map(Into::into).collect());
        self
    }
}

pub fn value_to_json(value: Value) -> Json {
    match value {
        Value::Boolean(v) => Json::Bool(v),
        Value::Int32(v) => Json::from(v),
        Value::Int64(v) => Json::from(v),
        Value::UInt32(v) => Json::from(v),
        Value::UInt64(v) => Json::from(v),
        Value::Float(v) => Number::from_f64(v as f64).map_or(Json::Null, Json::Number),
        Value::Double(v) => Number::from_f64(v).map_or(Json::Null, Json::Number),
        Value::String(v) => Json::String(v.to_string()),
        other => Json::String(other.to_string()),
    }
}

struct ObjectBuilder(Map<String, Json>);

impl BranchBuilder<Json> for ObjectBuilder {
    fn put(&mut self, name: &str, value: Option<Json>) {
        self.0.insert(name.to_string(), value.unwrap_or(Json::Null));
    }

    fn build(self: Box<Self>) -> Json {
        Json::Object(self.0)
    }
}

struct ArrayBuilder(Vec<Json>);

impl CollectionBuilder<Json> for ArrayBuilder {
    fn add(&mut self, value: Json) {
        self.0.push(value);
    }

    fn build(self: Box<Self>) -> Json {
        Json::Array(self.0)
    }
}

impl Reader<Json> for JsonReader {
    fn child_reader(&self, name: &str) -> Arc<dyn Reader<Json>> {
        let mut path = self.path.clone();
        path.push(name.to_string());
        Arc::new(JsonReader {
            embedded: self.embedded.clone(),
            path,
        })
    }

    fn branch_builder(&self) -> Box<dyn BranchBuilder<Json>> {
        Box::new(ObjectBuilder(Map::new()))
    }

    fn collection_builder(&self) -> Box<dyn CollectionBuilder<Json>> {
        Box::new(ArrayBuilder(Vec::new()))
    }

    fn leaf(&self, value: Value) -> ParquetResult<Json> {
        if self.embedded.contains(&self.path) {
            if let Value::String(text) = &value {
                return Ok(serde_json::from_str(text)?);
            }
        }
        Ok(value_to_json(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_leaf_mapping() {
        let reader = JsonReader::new();
        assert_eq!(reader.leaf(Value::Int64(-3)).unwrap(), json!(-3));
        assert_eq!(reader.leaf(Value::Double(f64::NAN)).unwrap(), Json::Null);
        assert_eq!(reader.leaf(Value::Float(1.5)).unwrap(), json!(1.5));
        let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        assert_eq!(reader.leaf(Value::Date(date)).unwrap(), json!("2020-01-31"));
        assert_eq!(reader.leaf(Value::from(vec![1u8, 2])).unwrap(), json!("0102"));
    }

    #[test]
    fn test_object() {
        let reader = JsonReader::new();
        let mut tags = reader.child_reader("tags").collection_builder();
        tags.add(json!("a"));
        let mut row = reader.branch_builder();
        row.put("id", Some(json!(1)));
        row.put("tags", Some(tags.build()));
        row.put("missing", None);
        assert_eq!(
            row.build(),
            json!({"id": 1, "tags": ["a"], "missing": null})
        );
    }

    #[test]
    fn test_embedded_json() {
        let reader = JsonReader::new().with_embedded_json(["meta", "payload"]);
        let payload = reader.child_reader("meta").child_reader("payload");
        assert_eq!(
            payload.leaf(Value::from(r#"{"k": [1, 2]}"#)).unwrap(),
            json!({"k": [1, 2]})
        );
        let err = payload.leaf(Value::from("{not json")).unwrap_err();
        assert!(matches!(
            err.cause(),
            crate::parquet::error::ParquetErrorCause::Json(_)
        ));
        // other columns keep their text
        let other = reader.child_reader("payload");
        assert_eq!(other.leaf(Value::from("{}")).unwrap(), json!("{}"));
    }
}
