use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of a remote object.
///
/// The remote store assigns numeric ids. Dry runs synthesize string ids so
/// downstream consumers can keep building the object graph without any remote
/// mutation; the variant split keeps the two impossible to confuse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Num(i64),
    Synthetic(String),
}

impl Id {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic(_))
    }

    /// Parse an id out of a record field value, if it looks like one.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Num),
            Value::String(s) => Some(Self::Synthetic(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{}", n),
            Self::Synthetic(s) => f.write_str(s),
        }
    }
}

impl From<Id> for Value {
    fn from(id: Id) -> Self {
        match id {
            Id::Num(n) => Value::from(n),
            Id::Synthetic(s) => Value::from(s),
        }
    }
}

/// The fields identifying a record independent of its server-assigned id.
///
/// `Name` is the default; associations are keyed by the ordered
/// (lineItemId, creativeId) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NaturalKey {
    Name(String),
    Pair(Id, Id),
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Pair(a, b) => write!(f, "({}, {})", a, b),
        }
    }
}

/// One remote object as a mapping of named fields.
///
/// Field sets are type-specific and the remote store may attach fields this
/// system never asked for; the map representation preserves them all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(serde_json::Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert an arbitrary JSON value into a record. Non-objects are rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Builder-style insert for literal record construction.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Resolve a dotted path ("size.width") through nested objects.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn id(&self) -> Option<Id> {
        self.id_field("id")
    }

    pub fn id_field(&self, field: &str) -> Option<Id> {
        self.get(field).and_then(Id::from_value)
    }

    pub fn set_id(&mut self, id: Id) {
        self.insert("id", id);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Record> for Value {
    fn from(rec: Record) -> Self {
        Value::Object(rec.0)
    }
}
