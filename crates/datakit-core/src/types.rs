use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

pub use serde_json::Value;

/// A record as key-value pairs; relations are nested records
pub type Record = serde_json::Map<String, Value>;

/// Separator between a relation name and the path inside the related collection
pub const PATH_SEPARATOR: char = ':';

/// Primitive column types
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Boolean,
    Binary,
    Date,
    Dateonly,
    Enum,
    Json,
    Number,
    Point,
    String,
    Time,
    Timeonly,
    Uuid,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveType::Boolean => write!(f, "Boolean"),
            PrimitiveType::Binary => write!(f, "Binary"),
            PrimitiveType::Date => write!(f, "Date"),
            PrimitiveType::Dateonly => write!(f, "Dateonly"),
            PrimitiveType::Enum => write!(f, "Enum"),
            PrimitiveType::Json => write!(f, "Json"),
            PrimitiveType::Number => write!(f, "Number"),
            PrimitiveType::Point => write!(f, "Point"),
            PrimitiveType::String => write!(f, "String"),
            PrimitiveType::Time => write!(f, "Time"),
            PrimitiveType::Timeonly => write!(f, "Timeonly"),
            PrimitiveType::Uuid => write!(f, "Uuid"),
        }
    }
}

/// Type of a column: a primitive, a list, or a composite object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnType {
    Primitive(PrimitiveType),
    Array(Box<ColumnType>),
    Object(BTreeMap<String, ColumnType>),
}

impl From<PrimitiveType> for ColumnType {
    fn from(primitive: PrimitiveType) -> Self {
        ColumnType::Primitive(primitive)
    }
}

/// Identity on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caller {
    pub id: u64,
    pub email: String,
    /// "UTC" or a fixed "+HH:MM" / "-HH:MM" offset, used for date grouping.
    /// Named zones such as "Europe/Paris" are rejected by date grouping.
    pub timezone: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Caller {
    pub fn new(id: u64, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            timezone: "UTC".to_string(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Read the value at a colon-separated path, walking nested relations.
///
/// Returns `None` when any segment is missing or an intermediate relation is
/// not an object.
pub fn get_field_value<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    match path.split_once(PATH_SEPARATOR) {
        None => record.get(path),
        Some((relation, rest)) => match record.get(relation)? {
            Value::Object(nested) => get_field_value(nested, rest),
            _ => None,
        },
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total ordering over JSON values used for sorting and min/max.
///
/// Values of different kinds are ordered null < bool < number < string <
/// array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(x, y)| compare_values(x, y))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Equality that treats `1` and `1.0` as the same number
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Convert a float to a JSON number, keeping integers integral
pub fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::from(number as i64)
    } else {
        serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
