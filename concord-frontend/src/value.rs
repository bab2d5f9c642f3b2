use std::{collections::HashMap, fmt};

use concord_protocol as cp;
use serde::Serialize;
use smol_str::SmolStr;

/// A scalar in the document.
///
/// Counters and timestamps coerce to their numeric projection
/// ([`Primitive::as_i64`], [`Display`](fmt::Display), JSON) but stay
/// structurally distinct from plain numbers, so deep equality against an
/// `Int` of the same magnitude is false.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Primitive {
    Str(SmolStr),
    Int(i64),
    F64(f64),
    Counter(i64),
    Timestamp(i64),
    Boolean(bool),
    Null,
}

impl Primitive {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Primitive::Int(n) | Primitive::Counter(n) | Primitive::Timestamp(n) => Some(*n),
            Primitive::F64(n) => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Primitive::Int(n) | Primitive::Counter(n) | Primitive::Timestamp(n) => Some(*n as f64),
            Primitive::F64(n) => Some(*n),
            _ => None,
        }
    }

    /// The wire form of this scalar: its JSON projection plus the datatype
    /// tag counters and timestamps carry.
    pub(crate) fn to_wire(&self) -> (cp::PrimitiveValue, Option<cp::DataType>) {
        match self {
            Primitive::Str(s) => (cp::PrimitiveValue::Str(s.clone()), None),
            Primitive::Int(n) => (cp::PrimitiveValue::Int(*n), None),
            Primitive::F64(n) => (cp::PrimitiveValue::F64(*n), None),
            Primitive::Counter(n) => (cp::PrimitiveValue::Int(*n), Some(cp::DataType::Counter)),
            Primitive::Timestamp(n) => (cp::PrimitiveValue::Int(*n), Some(cp::DataType::Timestamp)),
            Primitive::Boolean(b) => (cp::PrimitiveValue::Boolean(*b), None),
            Primitive::Null => (cp::PrimitiveValue::Null, None),
        }
    }

    pub(crate) fn from_wire(value: &cp::PrimitiveValue, datatype: Option<cp::DataType>) -> Primitive {
        match (datatype, value.to_i64()) {
            (Some(cp::DataType::Counter), Some(n)) => return Primitive::Counter(n),
            (Some(cp::DataType::Timestamp), Some(n)) => return Primitive::Timestamp(n),
            _ => {}
        }
        match value {
            cp::PrimitiveValue::Str(s) => Primitive::Str(s.clone()),
            cp::PrimitiveValue::Int(n) => Primitive::Int(*n),
            cp::PrimitiveValue::F64(n) => Primitive::F64(*n),
            cp::PrimitiveValue::Boolean(b) => Primitive::Boolean(*b),
            cp::PrimitiveValue::Null => Primitive::Null,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Str(s) => write!(f, "{}", s),
            Primitive::Int(n) | Primitive::Counter(n) | Primitive::Timestamp(n) => {
                write!(f, "{}", n)
            }
            Primitive::F64(n) => write!(f, "{}", n),
            Primitive::Boolean(b) => write!(f, "{}", b),
            Primitive::Null => write!(f, "null"),
        }
    }
}

/// A composite value: the materialised projection of (part of) a document,
/// and the shape application code hands to [`LocalChange::set`][crate::LocalChange::set].
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Map(HashMap<SmolStr, Value>),
    List(Vec<Value>),
    Primitive(Primitive),
}

impl Value {
    pub fn map(&self) -> Option<&HashMap<SmolStr, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn primitive(&self) -> Option<&Primitive> {
        match self {
            Value::Primitive(p) => Some(p),
            _ => None,
        }
    }

    /// Convert a JSON document into a [`Value`]. Integral numbers become
    /// `Int`, everything else `F64`.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Object(kvs) => {
                let result: HashMap<SmolStr, Value> = kvs
                    .iter()
                    .map(|(k, v)| (SmolStr::new(k), Value::from_json(v)))
                    .collect();
                Value::Map(result)
            }
            serde_json::Value::Array(vs) => Value::List(vs.iter().map(Value::from_json).collect()),
            serde_json::Value::String(s) => Value::Primitive(Primitive::Str(SmolStr::new(s))),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Primitive(Primitive::Int(i)),
                None => Value::Primitive(Primitive::F64(n.as_f64().unwrap_or(0.0))),
            },
            serde_json::Value::Bool(b) => Value::Primitive(Primitive::Boolean(*b)),
            serde_json::Value::Null => Value::Primitive(Primitive::Null),
        }
    }

    /// Convert this [`Value`] into its JSON projection. Counters and
    /// timestamps become plain numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Map(map) => {
                let result: serde_json::map::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect();
                serde_json::Value::Object(result)
            }
            Value::List(elements) => {
                serde_json::Value::Array(elements.iter().map(|v| v.to_json()).collect())
            }
            Value::Primitive(v) => match v {
                Primitive::Str(s) => serde_json::Value::String(s.to_string()),
                Primitive::Int(n) | Primitive::Counter(n) | Primitive::Timestamp(n) => {
                    serde_json::Value::Number(serde_json::Number::from(*n))
                }
                Primitive::F64(n) => serde_json::Value::Number(
                    serde_json::Number::from_f64(*n).unwrap_or_else(|| serde_json::Number::from(0)),
                ),
                Primitive::Boolean(b) => serde_json::Value::Bool(*b),
                Primitive::Null => serde_json::Value::Null,
            },
        }
    }
}

impl From<Primitive> for Value {
    fn from(p: Primitive) -> Self {
        Value::Primitive(p)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Primitive(Primitive::Str(SmolStr::new(s)))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Primitive(Primitive::Int(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Primitive(Primitive::F64(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Primitive(Primitive::Boolean(b))
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(|t| t.into()).collect())
    }
}

impl<T, K> From<HashMap<K, T>> for Value
where
    T: Into<Value>,
    K: AsRef<str>,
{
    fn from(h: HashMap<K, T>) -> Self {
        Value::Map(
            h.into_iter()
                .map(|(k, v)| (SmolStr::new(k), v.into()))
                .collect(),
        )
    }
}

/// The operations which write `value` under `key` in `object_id`.
///
/// A primitive is a single `set`. A composite allocates a fresh object,
/// recursively writes its contents, and only then links the new object into
/// its parent, so a backend can apply the batch in order. List contents are
/// built with `ins` operations whose element counters start at 1 in the new
/// list.
pub(crate) fn ops_for_property(
    actor: &cp::ActorId,
    object_id: &cp::ObjectId,
    key: cp::Key,
    value: &Value,
) -> Vec<cp::Operation> {
    match value {
        Value::Primitive(p) => {
            let (value, datatype) = p.to_wire();
            vec![cp::Operation::Set {
                object_id: object_id.clone(),
                key,
                value,
                datatype,
            }]
        }
        Value::Map(kvs) => {
            let map_id = cp::ObjectId::random();
            let mut ops = vec![cp::Operation::MakeMap {
                object_id: map_id.clone(),
            }];
            for (k, v) in kvs.iter() {
                ops.extend(ops_for_property(
                    actor,
                    &map_id,
                    cp::Key(k.clone()),
                    v,
                ));
            }
            ops.push(cp::Operation::Link {
                object_id: object_id.clone(),
                key,
                value: map_id,
            });
            ops
        }
        Value::List(vs) => {
            let list_id = cp::ObjectId::random();
            let mut ops = vec![cp::Operation::MakeList {
                object_id: list_id.clone(),
            }];
            let mut previous = cp::ElementId::Head;
            for (index, v) in vs.iter().enumerate() {
                let elem = (index + 1) as u64;
                ops.push(cp::Operation::Insert {
                    list_id: list_id.clone(),
                    key: previous,
                    elem,
                });
                let elem_id = cp::ElementId::Id(actor.clone(), elem);
                ops.extend(ops_for_property(actor, &list_id, elem_id.as_key(), v));
                previous = elem_id;
            }
            ops.push(cp::Operation::Link {
                object_id: object_id.clone(),
                key,
                value: list_id,
            });
            ops
        }
    }
}
