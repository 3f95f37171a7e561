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
use crate::parquet::value::Value;
use bytes::Bytes;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Storage type of a leaf column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    Boolean,
    Int32,
    Int64,
    Int96,
    Float,
    Double,
    ByteArray,
    FixedLenByteArray(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Millis,
    Micros,
    Nanos,
}

impl TimeUnit {
    fn per_second(self) -> i64 {
        match self {
            TimeUnit::Millis => 1_000,
            TimeUnit::Micros => 1_000_000,
            TimeUnit::Nanos => NANOS_PER_SECOND,
        }
    }
}

/// Logical annotation of a schema element. Legacy converted types are mapped
/// onto the same variants when the footer is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    String,
    Enum,
    Json,
    Bson,
    Uuid,
    Date,
    Time { unit: TimeUnit, utc: bool },
    Timestamp { unit: TimeUnit, utc: bool },
    Integer { bit_width: u8, signed: bool },
    Decimal { scale: i32, precision: i32 },
    List,
    Map,
    Unknown,
}

/// Resolved value type of a leaf column: how its plain bytes turn into a
/// [`Value`] and how two values of the column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Int32,
    UInt32,
    Date,
    Time(TimeUnit),
    Int64,
    UInt64,
    Timestamp(TimeUnit),
    Float,
    Double,
    Binary,
    String,
    FixedBinary(usize),
    Uuid,
}

impl ColumnType {
    pub fn resolve(physical: PhysicalType, logical: Option<LogicalType>) -> ParquetResult<Self> {
        let column_type = match (physical, logical) {
            (PhysicalType::Boolean, _) => ColumnType::Boolean,
            (PhysicalType::Int32, Some(LogicalType::Date)) => ColumnType::Date,
            (PhysicalType::Int32, Some(LogicalType::Time { unit: TimeUnit::Millis, .. })) => {
                ColumnType::Time(TimeUnit::Millis)
            }
            (PhysicalType::Int32, Some(LogicalType::Integer { signed: false, .. })) => {
                ColumnType::UInt32
            }
            (PhysicalType::Int32, _) => ColumnType::Int32,
            (PhysicalType::Int64, Some(LogicalType::Time { unit, .. }))
                if unit != TimeUnit::Millis =>
            {
                ColumnType::Time(unit)
            }
            (PhysicalType::Int64, Some(LogicalType::Timestamp { unit, .. })) => {
                ColumnType::Timestamp(unit)
            }
            (PhysicalType::Int64, Some(LogicalType::Integer { signed: false, .. })) => {
                ColumnType::UInt64
            }
            (PhysicalType::Int64, _) => ColumnType::Int64,
            (PhysicalType::Int96, _) => {
                return Err(fmt_err!(Unsupported, "INT96 columns are not supported"));
            }
            (PhysicalType::Float, _) => ColumnType::Float,
            (PhysicalType::Double, _) => ColumnType::Double,
            (
                PhysicalType::ByteArray,
                Some(LogicalType::String | LogicalType::Enum | LogicalType::Json),
            ) => ColumnType::String,
            (PhysicalType::ByteArray, _) => ColumnType::Binary,
            (PhysicalType::FixedLenByteArray(16), Some(LogicalType::Uuid)) => ColumnType::Uuid,
            (PhysicalType::FixedLenByteArray(len), Some(LogicalType::Uuid)) => {
                return Err(fmt_err!(
                    MalformedFile,
                    "UUID column must be 16 bytes wide, found {}",
                    len
                ));
            }
            (PhysicalType::FixedLenByteArray(len), _) => ColumnType::FixedBinary(len),
        };
        Ok(column_type)
    }

    pub fn physical(&self) -> PhysicalType {
        match self {
            ColumnType::Boolean => PhysicalType::Boolean,
            ColumnType::Int32 | ColumnType::UInt32 | ColumnType::Date => PhysicalType::Int32,
            ColumnType::Time(TimeUnit::Millis) => PhysicalType::Int32,
            ColumnType::Time(_)
            | ColumnType::Int64
            | ColumnType::UInt64
            | ColumnType::Timestamp(_) => PhysicalType::Int64,
            ColumnType::Float => PhysicalType::Float,
            ColumnType::Double => PhysicalType::Double,
            ColumnType::Binary | ColumnType::String => PhysicalType::ByteArray,
            ColumnType::FixedBinary(len) => PhysicalType::FixedLenByteArray(*len),
            ColumnType::Uuid => PhysicalType::FixedLenByteArray(16),
        }
    }

    /// Whether legacy `min`/`max` statistics were written with this ordering.
    pub fn is_signed_order(&self) -> bool {
        !matches!(
            self,
            ColumnType::UInt32
                | ColumnType::UInt64
                | ColumnType::Binary
                | ColumnType::String
                | ColumnType::FixedBinary(_)
                | ColumnType::Uuid
        )
    }

    pub fn wrap_i32(&self, v: i32) -> ParquetResult<Value> {
        match self {
            ColumnType::Int32 => Ok(Value::Int32(v)),
            ColumnType::UInt32 => Ok(Value::UInt32(v as u32)),
            ColumnType::Date => date_from_days(v).map(Value::Date),
            ColumnType::Time(unit) => time_from_units(v as i64, *unit).map(Value::Time),
            _ => Err(fmt_err!(DecodeInvariant, "INT32 value read for {} column", self)),
        }
    }

    pub fn wrap_i64(&self, v: i64) -> ParquetResult<Value> {
        match self {
            ColumnType::Int64 => Ok(Value::Int64(v)),
            ColumnType::UInt64 => Ok(Value::UInt64(v as u64)),
            ColumnType::Time(unit) => time_from_units(v, *unit).map(Value::Time),
            ColumnType::Timestamp(unit) => timestamp_from_units(v, *unit).map(Value::Timestamp),
            _ => Err(fmt_err!(DecodeInvariant, "INT64 value read for {} column", self)),
        }
    }

    pub fn wrap_bytes(&self, v: Bytes) -> ParquetResult<Value> {
        match self {
            ColumnType::String => Ok(Value::String(std::str::from_utf8(&v)?.into())),
            ColumnType::Binary => Ok(Value::Binary(v)),
            ColumnType::FixedBinary(len) if v.len() == *len => Ok(Value::Binary(v)),
            ColumnType::Uuid if v.len() == 16 => {
                let mut uuid = [0u8; 16];
                uuid.copy_from_slice(&v);
                Ok(Value::Uuid(uuid))
            }
            _ => Err(fmt_err!(
                DecodeInvariant,
                "{} byte value read for {} column",
                v.len(),
                self
            )),
        }
    }

    /// Decodes a single value as stored in column statistics: the plain
    /// encoding without a length prefix.
    pub fn read_stats_value(&self, bytes: &[u8]) -> ParquetResult<Value> {
        fn fixed<const N: usize>(bytes: &[u8]) -> ParquetResult<[u8; N]> {
            bytes.try_into().map_err(|_| {
                fmt_err!(
                    MalformedFile,
                    "statistics value has {} bytes, expected {}",
                    bytes.len(),
                    N
                )
            })
        }

        match self.physical() {
            PhysicalType::Boolean => match bytes {
                [b] => Ok(Value::Boolean(*b != 0)),
                _ => Err(fmt_err!(MalformedFile, "boolean statistics value has {} bytes", bytes.len())),
            },
            PhysicalType::Int32 => self.wrap_i32(i32::from_le_bytes(fixed(bytes)?)),
            PhysicalType::Int64 => self.wrap_i64(i64::from_le_bytes(fixed(bytes)?)),
            PhysicalType::Float => Ok(Value::Float(f32::from_le_bytes(fixed(bytes)?))),
            PhysicalType::Double => Ok(Value::Double(f64::from_le_bytes(fixed(bytes)?))),
            PhysicalType::ByteArray | PhysicalType::FixedLenByteArray(_) => {
                self.wrap_bytes(Bytes::copy_from_slice(bytes))
            }
            PhysicalType::Int96 => Err(fmt_err!(Unsupported, "INT96 statistics")),
        }
    }

    /// Converts `value` into this column's representation, if it denotes a
    /// value the column can hold.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ColumnType::Boolean, Value::Boolean(_)) => Some(value.clone()),
            (ColumnType::Int32, v) => i32::try_from(integer(v)?).ok().map(Value::Int32),
            (ColumnType::UInt32, v) => u32::try_from(integer(v)?).ok().map(Value::UInt32),
            (ColumnType::Int64, v) => i64::try_from(integer(v)?).ok().map(Value::Int64),
            (ColumnType::UInt64, v) => u64::try_from(integer(v)?).ok().map(Value::UInt64),
            (ColumnType::Float, Value::Float(_)) => Some(value.clone()),
            (ColumnType::Float, Value::Double(v)) => Some(Value::Float(*v as f32)),
            (ColumnType::Double, Value::Double(_)) => Some(value.clone()),
            (ColumnType::Double, Value::Float(v)) => Some(Value::Double(*v as f64)),
            (ColumnType::Date, Value::Date(_))
            | (ColumnType::Time(_), Value::Time(_))
            | (ColumnType::Timestamp(_), Value::Timestamp(_)) => Some(value.clone()),
            (ColumnType::String, Value::String(_)) => Some(value.clone()),
            (ColumnType::String, Value::Binary(v)) => std::str::from_utf8(v)
                .ok()
                .map(|s| Value::String(s.into())),
            (ColumnType::Binary, Value::Binary(_)) => Some(value.clone()),
            (ColumnType::Binary, Value::String(v)) => {
                Some(Value::Binary(Bytes::copy_from_slice(v.as_bytes())))
            }
            (ColumnType::FixedBinary(len), v) => {
                let bytes = v.as_bytes()?;
                (bytes.len() == *len).then(|| Value::Binary(Bytes::copy_from_slice(bytes)))
            }
            (ColumnType::Uuid, Value::Uuid(_)) => Some(value.clone()),
            (ColumnType::Uuid, Value::Binary(v)) => {
                let uuid: [u8; 16] = v.as_ref().try_into().ok()?;
                Some(Value::Uuid(uuid))
            }
            _ => None,
        }
    }

    /// Orders two values by this column's logical semantics. `None` when either
    /// side cannot be held by the column, or the values are unordered (NaN).
    pub fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        let a = self.coerce(a)?;
        let b = self.coerce(b)?;
        match (&a, &b) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::UInt32(a), Value::UInt32(b)) => Some(a.cmp(b)),
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::UInt64(a), Value::UInt64(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(compare_uuid(a, b)),
            (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Value::Binary(a), Value::Binary(b)) => Some(a.as_ref().cmp(b.as_ref())),
            _ => None,
        }
    }

    /// The plain encoding of `value` as this column stores it, without a
    /// length prefix. These are the bytes bloom filters hash.
    pub fn plain_bytes(&self, value: &Value) -> Option<Vec<u8>> {
        let value = self.coerce(value)?;
        let bytes = match (self, &value) {
            (_, Value::Boolean(v)) => vec![*v as u8],
            (_, Value::Int32(v)) => v.to_le_bytes().to_vec(),
            (_, Value::UInt32(v)) => v.to_le_bytes().to_vec(),
            (_, Value::Int64(v)) => v.to_le_bytes().to_vec(),
            (_, Value::UInt64(v)) => v.to_le_bytes().to_vec(),
            (_, Value::Float(v)) => v.to_le_bytes().to_vec(),
            (_, Value::Double(v)) => v.to_le_bytes().to_vec(),
            (_, Value::Date(v)) => days_from_date(v).to_le_bytes().to_vec(),
            (ColumnType::Time(TimeUnit::Millis), Value::Time(v)) => {
                (time_to_units(v, TimeUnit::Millis) as i32).to_le_bytes().to_vec()
            }
            (ColumnType::Time(unit), Value::Time(v)) => {
                time_to_units(v, *unit).to_le_bytes().to_vec()
            }
            (ColumnType::Timestamp(unit), Value::Timestamp(v)) => {
                timestamp_to_units(v, *unit)?.to_le_bytes().to_vec()
            }
            (_, Value::Binary(v)) => v.to_vec(),
            (_, Value::String(v)) => v.as_bytes().to_vec(),
            (_, Value::Uuid(v)) => v.to_vec(),
            _ => return None,
        };
        Some(bytes)
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::FixedBinary(len) => write!(f, "FixedBinary({})", len),
            ColumnType::Time(unit) => write!(f, "Time({:?})", unit),
            ColumnType::Timestamp(unit) => write!(f, "Timestamp({:?})", unit),
            other => write!(f, "{:?}", other),
        }
    }
}

fn integer(value: &Value) -> Option<i128> {
    match value {
        Value::Int32(v) => Some(*v as i128),
        Value::Int64(v) => Some(*v as i128),
        Value::UInt32(v) => Some(*v as i128),
        Value::UInt64(v) => Some(*v as i128),
        _ => None,
    }
}

/// Unsigned comparison of the big-endian high halves, then the low halves.
fn compare_uuid(a: &[u8; 16], b: &[u8; 16]) -> Ordering {
    let halves = |v: &[u8; 16]| {
        let mut high = [0u8; 8];
        let mut low = [0u8; 8];
        high.copy_from_slice(&v[..8]);
        low.copy_from_slice(&v[8..]);
        (u64::from_be_bytes(high), u64::from_be_bytes(low))
    };
    halves(a).cmp(&halves(b))
}

fn date_from_days(days: i32) -> ParquetResult<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| fmt_err!(DecodeInvariant, "date {} days from epoch is out of range", days))
}

fn days_from_date(date: &NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn time_from_units(v: i64, unit: TimeUnit) -> ParquetResult<NaiveTime> {
    let per_second = unit.per_second();
    let secs = v.div_euclid(per_second);
    let nanos = v.rem_euclid(per_second) * (NANOS_PER_SECOND / per_second);
    u32::try_from(secs)
        .ok()
        .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos as u32))
        .ok_or_else(|| fmt_err!(DecodeInvariant, "time of day {} {:?} is out of range", v, unit))
}

fn time_to_units(time: &NaiveTime, unit: TimeUnit) -> i64 {
    let per_second = unit.per_second();
    time.num_seconds_from_midnight() as i64 * per_second
        + time.nanosecond() as i64 / (NANOS_PER_SECOND / per_second)
}

fn timestamp_from_units(v: i64, unit: TimeUnit) -> ParquetResult<DateTime<Utc>> {
    let per_second = unit.per_second();
    let secs = v.div_euclid(per_second);
    let nanos = v.rem_euclid(per_second) * (NANOS_PER_SECOND / per_second);
    DateTime::from_timestamp(secs, nanos as u32)
        .ok_or_else(|| fmt_err!(DecodeInvariant, "timestamp {} {:?} is out of range", v, unit))
}

fn timestamp_to_units(ts: &DateTime<Utc>, unit: TimeUnit) -> Option<i64> {
    match unit {
        TimeUnit::Millis => Some(ts.timestamp_millis()),
        TimeUnit::Micros => Some(ts.timestamp_micros()),
        TimeUnit::Nanos => ts.timestamp_nanos_opt(),
    }
}
