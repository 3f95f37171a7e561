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
#![allow(dead_code)]

use futures::TryStreamExt;
use parquet::data_type::{
    BoolType, ByteArray, ByteArrayType, DoubleType, FixedLenByteArray, FixedLenByteArrayType,
    FloatType, Int32Type, Int64Type,
};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::{SerializedColumnWriter, SerializedFileWriter};
use parquet::schema::parser::parse_message_type;
use parquet_rows::{
    ByteRangeReader, InMemoryReader, ParquetFileReader, ReadOptions, RowReadSpec,
};
use std::sync::Arc;

/// The non-null values of one column chunk.
pub enum Values {
    Boolean(Vec<bool>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Bytes(Vec<ByteArray>),
    Fixed(Vec<FixedLenByteArray>),
}

/// One column chunk to write: values plus optional levels.
pub struct Column {
    pub values: Values,
    pub def: Option<Vec<i16>>,
    pub rep: Option<Vec<i16>>,
}

impl Column {
    pub fn required(values: Values) -> Self {
        Self {
            values,
            def: None,
            rep: None,
        }
    }

    pub fn optional(values: Values, def: Vec<i16>) -> Self {
        Self {
            values,
            def: Some(def),
            rep: None,
        }
    }

    pub fn repeated(values: Values, def: Vec<i16>, rep: Vec<i16>) -> Self {
        Self {
            values,
            def: Some(def),
            rep: Some(rep),
        }
    }
}

pub fn strings(values: &[&str]) -> Values {
    Values::Bytes(values.iter().map(|s| ByteArray::from(*s)).collect())
}

/// An optional column from `None`/`Some` entries, with definition level 1 for
/// present values.
pub fn optional_i64(values: &[Option<i64>]) -> Column {
    Column::optional(
        Values::Int64(values.iter().flatten().copied().collect()),
        values.iter().map(|v| v.is_some() as i16).collect(),
    )
}

pub fn optional_strings(values: &[Option<&str>]) -> Column {
    Column::optional(
        Values::Bytes(values.iter().flatten().map(|s| ByteArray::from(*s)).collect()),
        values.iter().map(|v| v.is_some() as i16).collect(),
    )
}

fn write_column(writer: &mut SerializedColumnWriter<'_>, column: &Column) {
    let def = column.def.as_deref();
    let rep = column.rep.as_deref();
    let written = match &column.values {
        Values::Boolean(v) => writer.typed::<BoolType>().write_batch(v, def, rep),
        Values::Int32(v) => writer.typed::<Int32Type>().write_batch(v, def, rep),
        Values::Int64(v) => writer.typed::<Int64Type>().write_batch(v, def, rep),
        Values::Float(v) => writer.typed::<FloatType>().write_batch(v, def, rep),
        Values::Double(v) => writer.typed::<DoubleType>().write_batch(v, def, rep),
        Values::Bytes(v) => writer.typed::<ByteArrayType>().write_batch(v, def, rep),
        Values::Fixed(v) => writer
            .typed::<FixedLenByteArrayType>()
            .write_batch(v, def, rep),
    };
    written.unwrap();
}

/// Writes a parquet file with one entry of `row_groups` per row group, each
/// holding the column chunks in schema order.
pub fn write_parquet(schema: &str, props: WriterProperties, row_groups: Vec<Vec<Column>>) -> Vec<u8> {
    let schema = Arc::new(parse_message_type(schema).unwrap());
    let mut buf = Vec::new();
    let mut writer = SerializedFileWriter::new(&mut buf, schema, Arc::new(props)).unwrap();
    for columns in row_groups {
        let mut row_group = writer.next_row_group().unwrap();
        for column in &columns {
            let mut col = row_group.next_column().unwrap().unwrap();
            write_column(&mut col, column);
            col.close().unwrap();
        }
        row_group.close().unwrap();
    }
    writer.close().unwrap();
    buf
}

pub async fn open(data: Vec<u8>) -> ParquetFileReader {
    let reader: Arc<dyn ByteRangeReader> = Arc::new(InMemoryReader::new(data));
    ParquetFileReader::open(reader, ReadOptions::default())
        .await
        .unwrap()
}

pub async fn read_rows<T: 'static>(file: &ParquetFileReader, spec: RowReadSpec<T>) -> Vec<T> {
    file.rows(spec).try_collect().await.unwrap()
}
