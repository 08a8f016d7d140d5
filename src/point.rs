use chrono::{DateTime, TimeZone, Utc};
use std::{collections::BTreeMap, fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("measurement name is empty")]
    EmptyMeasurement,
    #[error("point has no fields")]
    NoFields,
    #[error("tag or field key is empty")]
    EmptyKey,
    #[error("tag {0} has an empty value")]
    EmptyTagValue(String),
    #[error("{0:?} ends with a backslash")]
    TrailingBackslash(String),
    #[error("field {0} is not a finite number")]
    NonFiniteField(String),
    #[error("timestamp {0} cannot be represented as nanoseconds since the epoch")]
    TimestampOutOfRange(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    UInteger(u64),
    Boolean(bool),
    String(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v.into())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v.into())
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInteger(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::UInteger(v.into())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

/// Unit of the encoded timestamp. Sent to the store as the `precision`
/// query parameter, so both sides agree on how to read the epoch value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WritePrecision {
    #[default]
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl WritePrecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            WritePrecision::Nanoseconds => "ns",
            WritePrecision::Microseconds => "us",
            WritePrecision::Milliseconds => "ms",
            WritePrecision::Seconds => "s",
        }
    }

    // Truncates toward zero, the same way the store's own clients do.
    pub fn epoch(&self, timestamp_nanos: i64) -> i64 {
        match self {
            WritePrecision::Nanoseconds => timestamp_nanos,
            WritePrecision::Microseconds => timestamp_nanos / 1_000,
            WritePrecision::Milliseconds => timestamp_nanos / 1_000_000,
            WritePrecision::Seconds => timestamp_nanos / 1_000_000_000,
        }
    }
}

impl fmt::Display for WritePrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("unknown write precision {0:?}, expected one of ns, us, ms, s")]
pub struct ParsePrecisionError(pub String);

impl FromStr for WritePrecision {
    type Err = ParsePrecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ns" => Ok(WritePrecision::Nanoseconds),
            "us" => Ok(WritePrecision::Microseconds),
            "ms" => Ok(WritePrecision::Milliseconds),
            "s" => Ok(WritePrecision::Seconds),
            other => Err(ParsePrecisionError(other.to_string())),
        }
    }
}

/// A single measurement record: one series name, optional tags, at least
/// one field and a timestamp. Tags and fields are kept sorted by key, which
/// is the order the store expects them on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    // Nanoseconds since the unix epoch.
    timestamp: i64,
}

impl Point {
    pub fn new<T, F, K, V, FK, FV>(
        measurement: impl Into<String>,
        tags: T,
        fields: F,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ValidationError>
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
        F: IntoIterator<Item = (FK, FV)>,
        FK: Into<String>,
        FV: Into<FieldValue>,
    {
        let mut builder = Point::builder(measurement).timestamp(timestamp);
        for (key, value) in tags {
            builder = builder.tag(key, value);
        }
        for (key, value) in fields {
            builder = builder.field(key, value);
        }
        builder.build()
    }

    pub fn builder(measurement: impl Into<String>) -> PointBuilder {
        PointBuilder {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.timestamp)
    }

    pub fn timestamp_nanos(&self) -> i64 {
        self.timestamp
    }
}

#[derive(Debug, Clone)]
pub struct PointBuilder {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: Option<DateTime<Utc>>,
}

impl PointBuilder {
    // Adding a key twice keeps the last value.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Validates the point. Without an explicit timestamp the point is
    /// stamped with the current time.
    pub fn build(self) -> Result<Point, ValidationError> {
        if self.measurement.is_empty() {
            return Err(ValidationError::EmptyMeasurement);
        }
        if self.fields.is_empty() {
            return Err(ValidationError::NoFields);
        }
        check_trailing_backslash(&self.measurement)?;
        for (key, value) in &self.tags {
            if key.is_empty() {
                return Err(ValidationError::EmptyKey);
            }
            if value.is_empty() {
                return Err(ValidationError::EmptyTagValue(key.clone()));
            }
            check_trailing_backslash(key)?;
            check_trailing_backslash(value)?;
        }
        for (key, value) in &self.fields {
            if key.is_empty() {
                return Err(ValidationError::EmptyKey);
            }
            check_trailing_backslash(key)?;
            if let FieldValue::Float(v) = value {
                if !v.is_finite() {
                    return Err(ValidationError::NonFiniteField(key.clone()));
                }
            }
        }

        let timestamp = self.timestamp.unwrap_or_else(Utc::now);
        let nanos = timestamp
            .timestamp_nanos_opt()
            .ok_or(ValidationError::TimestampOutOfRange(timestamp))?;

        Ok(Point {
            measurement: self.measurement,
            tags: self.tags,
            fields: self.fields,
            timestamp: nanos,
        })
    }
}

// A trailing backslash would escape the separator written after it.
fn check_trailing_backslash(s: &str) -> Result<(), ValidationError> {
    if s.ends_with('\\') {
        return Err(ValidationError::TrailingBackslash(s.to_string()));
    }
    Ok(())
}
