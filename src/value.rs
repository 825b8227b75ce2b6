//! Scalar values carried by mapped objects and their SQL-ready counterparts.

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::{EntityMapError, Result};

/// Value bound into statements and read back from rows.
pub type SqlValue = rusqlite::types::Value;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Float(v) => Some(*v as i64),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Untyped conversion used for ad-hoc query parameters.
    pub fn to_sql(&self) -> SqlValue {
        match self {
            Value::Null => SqlValue::Null,
            Value::Int(v) => SqlValue::Integer(*v),
            Value::Float(v) => SqlValue::Real(*v),
            Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
            Value::Text(v) => SqlValue::Text(v.clone()),
            Value::Date(v) => SqlValue::Text(v.format(DATE_FORMAT).to_string()),
            Value::DateTime(v) => SqlValue::Text(v.format(DATETIME_FORMAT).to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Value::from(*v),
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Text(v) => serde_json::Value::String(v.clone()),
            Value::Date(_) | Value::DateTime(_) => serde_json::Value::String(self.to_string()),
        }
    }

    /// Converts a configured default (JSON literal) into a value of the given type.
    pub fn from_json(json: &serde_json::Value, ty: &PropertyType) -> Result<Value> {
        let raw = match json {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => SqlValue::Text(s.clone()),
            other => {
                return Err(EntityMapError::conversion(format!(
                    "unsupported default literal {other}"
                )));
            }
        };
        from_sql_value(ty, raw)
    }
}

/// Textual form used for primary-key hashing: null is empty, booleans are `1`/`0`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => f.write_str(if *v { "1" } else { "0" }),
            Value::Text(v) => f.write_str(v),
            Value::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
            Value::DateTime(v) => write!(f, "{}", v.format(DATETIME_FORMAT)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Semantic column type declared on a property.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PropertyType {
    Int,
    Float,
    Varchar,
    Text,
    Bool,
    Date,
    DateTime,
    Embedded,
    Other(String),
}

impl PropertyType {
    pub fn as_str(&self) -> &str {
        match self {
            PropertyType::Int => "int",
            PropertyType::Float => "float",
            PropertyType::Varchar => "varchar",
            PropertyType::Text => "text",
            PropertyType::Bool => "bool",
            PropertyType::Date => "date",
            PropertyType::DateTime => "datetime",
            PropertyType::Embedded => "embedded",
            PropertyType::Other(name) => name,
        }
    }
}

impl FromStr for PropertyType {
    type Err = EntityMapError;

    fn from_str(s: &str) -> Result<Self> {
        let ty = match s.trim().to_ascii_lowercase().as_str() {
            "" => return Err(EntityMapError::config("property type must not be empty")),
            "int" | "integer" => PropertyType::Int,
            "float" | "double" | "real" => PropertyType::Float,
            "varchar" | "string" => PropertyType::Varchar,
            "text" => PropertyType::Text,
            "bool" | "boolean" => PropertyType::Bool,
            "date" => PropertyType::Date,
            "datetime" => PropertyType::DateTime,
            "embedded" => PropertyType::Embedded,
            other => PropertyType::Other(other.to_string()),
        };
        Ok(ty)
    }
}

impl TryFrom<String> for PropertyType {
    type Error = EntityMapError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PropertyType> for String {
    fn from(value: PropertyType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coerces a property value into the form bound into a statement.
pub fn to_sql_value(ty: &PropertyType, value: &Value) -> SqlValue {
    if value.is_null() {
        return SqlValue::Null;
    }
    match ty {
        PropertyType::Date => match value {
            Value::Date(d) => SqlValue::Text(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => SqlValue::Text(dt.date().format(DATE_FORMAT).to_string()),
            other => other.to_sql(),
        },
        PropertyType::DateTime => match value {
            Value::DateTime(dt) => SqlValue::Text(dt.format(DATETIME_FORMAT).to_string()),
            Value::Date(d) => SqlValue::Text(
                d.and_hms_opt(0, 0, 0)
                    .map(|dt| dt.format(DATETIME_FORMAT).to_string())
                    .unwrap_or_default(),
            ),
            other => other.to_sql(),
        },
        PropertyType::Int | PropertyType::Bool => SqlValue::Integer(integer_of(value)),
        PropertyType::Float => SqlValue::Real(float_of(value)),
        _ => value.to_sql(),
    }
}

/// Converts a value read from a row into the property's declared type.
pub fn from_sql_value(ty: &PropertyType, raw: SqlValue) -> Result<Value> {
    if matches!(raw, SqlValue::Null) {
        return Ok(Value::Null);
    }
    let value = match ty {
        PropertyType::Int => Value::Int(integer_of(&untyped(raw))),
        PropertyType::Float => Value::Float(float_of(&untyped(raw))),
        PropertyType::Bool => Value::Bool(integer_of(&untyped(raw)) == 1),
        PropertyType::Date => match raw {
            SqlValue::Text(text) => Value::Date(parse_date(&text)?),
            other => return Err(unexpected(ty, &other)),
        },
        PropertyType::DateTime => match raw {
            SqlValue::Text(text) => Value::DateTime(parse_datetime(&text)?),
            other => return Err(unexpected(ty, &other)),
        },
        _ => untyped(raw),
    };
    Ok(value)
}

fn untyped(raw: SqlValue) -> Value {
    match raw {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Int(i),
        SqlValue::Real(f) => Value::Float(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn integer_of(value: &Value) -> i64 {
    match value {
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64))
            .unwrap_or(0),
        other => other.as_i64().unwrap_or(0),
    }
}

fn float_of(value: &Value) -> f64 {
    match value {
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Text(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .or_else(|_| parse_datetime(text).map(|dt| dt.date()))
        .map_err(|_| EntityMapError::conversion(format!("invalid date '{text}'")))
}

fn parse_datetime(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| EntityMapError::conversion(format!("invalid datetime '{text}'")))
}

fn unexpected(ty: &PropertyType, raw: &SqlValue) -> EntityMapError {
    EntityMapError::conversion(format!("cannot read {raw:?} as {ty}"))
}
