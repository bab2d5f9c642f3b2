//! Types which are exchanged between a concord frontend and backend.
//!
//! Everything in this crate maps onto a JSON wire format. Requests flow from
//! the frontend to the backend as [`ChangeRequest`]s containing [`Operation`]s,
//! and the backend answers with [`Patch`]es containing flat lists of [`Diff`]s.
//! The serialized forms are load bearing: object ids are UUID strings (with
//! the zero UUID reserved for the root object), element ids are
//! `"<actor>:<counter>"` strings with `"_head"` marking the front of a list,
//! and operations are tagged by their `action` field.
mod error;
mod serde_impls;
mod utility_impls;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

pub use error::{InvalidElementId, InvalidObjectId};

/// The string form of the object id which identifies the root of a document.
pub const ROOT_STR: &str = "00000000-0000-0000-0000-000000000000";

/// The sentinel key used by insert operations targeting the front of a list.
pub const HEAD_STR: &str = "_head";

/// The identity of an actor, a replica which mints operations.
#[derive(Deserialize, Serialize, Eq, PartialEq, Hash, Debug, Clone, PartialOrd, Ord)]
pub struct ActorId(pub String);

impl ActorId {
    /// Mint a fresh random actor id.
    pub fn random() -> ActorId {
        ActorId(uuid::Uuid::new_v4().to_string())
    }
}

/// The identity of an object in a document, either the reserved root or a
/// UUID allocated by the actor which created the object.
#[derive(Eq, PartialEq, Hash, Debug, Clone, PartialOrd, Ord)]
pub enum ObjectId {
    Root,
    Id(String),
}

impl ObjectId {
    /// Allocate a fresh object id.
    pub fn random() -> ObjectId {
        ObjectId::Id(uuid::Uuid::new_v4().to_string())
    }
}

/// A position in a list CRDT. `Head` is the position before the first
/// element, a specific id is the pair of the minting actor and the counter
/// that actor allocated for the insertion.
///
/// Element ids are totally ordered by `(counter, actor)` with `Head` before
/// everything else.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub enum ElementId {
    Head,
    Id(ActorId, u64),
}

impl ElementId {
    pub fn as_key(&self) -> Key {
        Key(SmolStr::new(self.to_string()))
    }

    pub fn counter(&self) -> Option<u64> {
        match self {
            ElementId::Head => None,
            ElementId::Id(_, counter) => Some(*counter),
        }
    }
}

/// A property of an object: a map key, or the serialized element id of a
/// list position.
#[derive(Deserialize, Serialize, Eq, PartialEq, Hash, Debug, Clone, PartialOrd, Ord)]
pub struct Key(pub SmolStr);

impl Key {
    pub fn head() -> Key {
        Key(SmolStr::new(HEAD_STR))
    }

    pub fn as_element_id(&self) -> Result<ElementId, InvalidElementId> {
        self.0.as_str().parse()
    }
}

/// A vector clock summarising observed history, mapping each actor to the
/// highest sequence number seen from it.
#[derive(Deserialize, Serialize, Eq, PartialEq, Debug, Clone, Default)]
#[serde(transparent)]
pub struct Clock(pub HashMap<ActorId, u64>);

impl Clock {
    pub fn empty() -> Clock {
        Clock(HashMap::new())
    }

    pub fn seq_for(&self, actor: &ActorId) -> u64 {
        self.0.get(actor).copied().unwrap_or(0)
    }

    /// A copy of this clock with `actor` at least at `seq`.
    pub fn with_dependency(&self, actor: &ActorId, seq: u64) -> Clock {
        let mut result = self.clone();
        let entry = result.0.entry(actor.clone()).or_insert(0);
        *entry = std::cmp::max(*entry, seq);
        result
    }

    /// The componentwise maximum of two clocks. Clocks never decrease, so
    /// this is how observed history is merged in.
    pub fn upper_bound(&self, other: &Clock) -> Clock {
        let mut result = self.clone();
        for (actor, seq) in &other.0 {
            let entry = result.0.entry(actor.clone()).or_insert(0);
            *entry = std::cmp::max(*entry, *seq);
        }
        result
    }

    /// A copy of this clock with the component for `actor` removed.
    pub fn without(&self, actor: &ActorId) -> Clock {
        let mut result = self.clone();
        result.0.remove(actor);
        result
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The tag a backend attaches to scalar values which are more than their
/// JSON projection.
#[derive(Deserialize, Serialize, Eq, PartialEq, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    Counter,
    Timestamp,
}

/// The kind of a keyed object.
#[derive(Deserialize, Serialize, Eq, PartialEq, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub enum MapType {
    Map,
    Table,
}

/// The kind of an ordered object.
#[derive(Deserialize, Serialize, Eq, PartialEq, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub enum SequenceType {
    List,
    Text,
}

/// A scalar as it appears on the wire. Counters and timestamps travel as
/// numbers alongside a [`DataType`] tag.
#[derive(Deserialize, Serialize, PartialEq, Debug, Clone)]
#[serde(untagged)]
pub enum PrimitiveValue {
    Str(SmolStr),
    Int(i64),
    F64(f64),
    Boolean(bool),
    Null,
}

impl PrimitiveValue {
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            PrimitiveValue::Int(n) => Some(*n),
            PrimitiveValue::F64(n) => Some(*n as i64),
            _ => None,
        }
    }
}

/// A value held in a diff or conflict: a scalar, or a link to another
/// object in the document.
#[derive(PartialEq, Debug, Clone)]
pub enum ElementValue {
    Primitive(PrimitiveValue),
    Link(ObjectId),
}

/// A single operation produced by the frontend.
///
/// `makeMap` and `makeList` allocate a fresh object; `link` wires the new
/// object into its parent. `ins` allocates a list position after the given
/// predecessor; the value arrives in a following `set` keyed by the new
/// element id.
#[derive(Deserialize, Serialize, PartialEq, Debug, Clone)]
#[serde(tag = "action")]
pub enum Operation {
    #[serde(rename = "makeMap")]
    MakeMap {
        #[serde(rename = "obj")]
        object_id: ObjectId,
    },
    #[serde(rename = "makeList")]
    MakeList {
        #[serde(rename = "obj")]
        object_id: ObjectId,
    },
    #[serde(rename = "set")]
    Set {
        #[serde(rename = "obj")]
        object_id: ObjectId,
        key: Key,
        value: PrimitiveValue,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        datatype: Option<DataType>,
    },
    #[serde(rename = "del")]
    Delete {
        #[serde(rename = "obj")]
        object_id: ObjectId,
        key: Key,
    },
    #[serde(rename = "link")]
    Link {
        #[serde(rename = "obj")]
        object_id: ObjectId,
        key: Key,
        value: ObjectId,
    },
    #[serde(rename = "ins")]
    Insert {
        #[serde(rename = "obj")]
        list_id: ObjectId,
        key: ElementId,
        elem: u64,
    },
    #[serde(rename = "inc")]
    Increment {
        #[serde(rename = "obj")]
        object_id: ObjectId,
        key: Key,
        value: i64,
    },
}

impl Operation {
    pub fn object_id(&self) -> &ObjectId {
        match self {
            Operation::MakeMap { object_id }
            | Operation::MakeList { object_id }
            | Operation::Set { object_id, .. }
            | Operation::Delete { object_id, .. }
            | Operation::Link { object_id, .. }
            | Operation::Increment { object_id, .. } => object_id,
            Operation::Insert { list_id, .. } => list_id,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            Operation::Set { key, .. }
            | Operation::Delete { key, .. }
            | Operation::Link { key, .. }
            | Operation::Increment { key, .. } => Some(key),
            Operation::MakeMap { .. } | Operation::MakeList { .. } | Operation::Insert { .. } => {
                None
            }
        }
    }

    /// Whether `other` can be folded into this operation. Only plain
    /// assignments addressing the same property merge; insertions and
    /// object allocations never do.
    pub fn can_merge(&self, other: &Operation) -> bool {
        match (self.key(), other.key()) {
            (Some(key), Some(other_key)) => key == other_key && self.object_id() == other.object_id(),
            _ => false,
        }
    }

    /// Fold `other` into this operation. Increments sum; an increment
    /// against an assignment of a fresh counter collapses into a plain
    /// assignment of the final number; any other assignment supersedes
    /// this one.
    pub fn merge(&mut self, other: Operation) {
        if let Operation::Increment { value: delta, .. } = other {
            match self {
                Operation::Set {
                    value: PrimitiveValue::Int(n),
                    datatype,
                    ..
                } if *datatype == Some(DataType::Counter) => {
                    *n += delta;
                    *datatype = None;
                }
                Operation::Increment { value: n, .. } => *n += delta,
                _ => {}
            }
        } else {
            *self = other;
        }
    }
}

/// The type of request a frontend can make of its backend.
#[derive(Deserialize, Serialize, Eq, PartialEq, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub enum RequestType {
    Change,
    Undo,
    Redo,
}

/// A causally dated batch of operations produced by one actor.
#[derive(Deserialize, Serialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub request_type: RequestType,
    #[serde(rename = "actor")]
    pub actor_id: ActorId,
    pub seq: u64,
    pub deps: Clock,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(default)]
    pub ops: Vec<Operation>,
}

/// A losing candidate for a property on which concurrent writes occurred,
/// keyed by the actor which wrote it.
#[derive(PartialEq, Debug, Clone)]
pub struct Conflict {
    pub actor: ActorId,
    pub value: ElementValue,
    pub datatype: Option<DataType>,
}

/// One step of a backend-computed difference between two document states.
#[derive(PartialEq, Debug, Clone)]
pub enum DiffAction {
    CreateMap(ObjectId, MapType),
    CreateList(ObjectId, SequenceType),
    MaxElem(ObjectId, u64, SequenceType),
    RemoveMapKey(ObjectId, MapType, Key),
    SetMapKey(ObjectId, MapType, Key, ElementValue, Option<DataType>),
    RemoveSequenceElement(ObjectId, SequenceType, usize),
    InsertSequenceElement(
        ObjectId,
        SequenceType,
        usize,
        ElementValue,
        Option<DataType>,
        ElementId,
    ),
    SetSequenceElement(ObjectId, SequenceType, usize, ElementValue, Option<DataType>),
}

impl DiffAction {
    pub fn object_id(&self) -> &ObjectId {
        match self {
            DiffAction::CreateMap(object_id, _)
            | DiffAction::CreateList(object_id, _)
            | DiffAction::MaxElem(object_id, _, _)
            | DiffAction::RemoveMapKey(object_id, _, _)
            | DiffAction::SetMapKey(object_id, _, _, _, _)
            | DiffAction::RemoveSequenceElement(object_id, _, _)
            | DiffAction::InsertSequenceElement(object_id, _, _, _, _, _)
            | DiffAction::SetSequenceElement(object_id, _, _, _, _) => object_id,
        }
    }
}

/// A diff plus the conflicting writes it displaced.
#[derive(PartialEq, Debug, Clone)]
pub struct Diff {
    pub action: DiffAction,
    pub conflicts: Vec<Conflict>,
}

impl Diff {
    pub fn new(action: DiffAction) -> Diff {
        Diff {
            action,
            conflicts: Vec::new(),
        }
    }

    pub fn with_conflicts(action: DiffAction, conflicts: Vec<Conflict>) -> Diff {
        Diff { action, conflicts }
    }
}

/// A backend-produced patch: causal metadata plus diffs in apply order.
///
/// `actor` and `seq` are present iff the patch acknowledges a request made
/// by that actor.
#[derive(Deserialize, Serialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub actor: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub clock: Option<Clock>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deps: Option<Clock>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub can_undo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub can_redo: Option<bool>,
    #[serde(default)]
    pub diffs: Vec<Diff>,
}

impl Patch {
    pub fn empty() -> Patch {
        Patch {
            actor: None,
            seq: None,
            clock: None,
            deps: None,
            can_undo: None,
            can_redo: None,
            diffs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_ids_order_by_counter_then_actor() {
        let a = ActorId("02ef21f3-c9eb-4087-880e-bedd7c4bbe43".to_string());
        let b = ActorId("2a1d376b-24f7-4400-8d4a-f58252d644dd".to_string());
        let mut ids = vec![
            ElementId::Id(b.clone(), 2),
            ElementId::Id(a.clone(), 3),
            ElementId::Head,
            ElementId::Id(b.clone(), 1),
            ElementId::Id(a.clone(), 2),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                ElementId::Head,
                ElementId::Id(b.clone(), 1),
                ElementId::Id(a.clone(), 2),
                ElementId::Id(b, 2),
                ElementId::Id(a, 3),
            ]
        );
    }

    #[test]
    fn merge_sums_increments() {
        let obj = ObjectId::random();
        let mut op = Operation::Increment {
            object_id: obj.clone(),
            key: Key("wrens".into()),
            value: 2,
        };
        let other = Operation::Increment {
            object_id: obj.clone(),
            key: Key("wrens".into()),
            value: 3,
        };
        assert!(op.can_merge(&other));
        op.merge(other);
        assert_eq!(
            op,
            Operation::Increment {
                object_id: obj,
                key: Key("wrens".into()),
                value: 5,
            }
        );
    }

    #[test]
    fn merge_collapses_counter_assignment_and_increment() {
        let obj = ObjectId::random();
        let mut op = Operation::Set {
            object_id: obj.clone(),
            key: Key("wrens".into()),
            value: PrimitiveValue::Int(1),
            datatype: Some(DataType::Counter),
        };
        op.merge(Operation::Increment {
            object_id: obj.clone(),
            key: Key("wrens".into()),
            value: 2,
        });
        assert_eq!(
            op,
            Operation::Set {
                object_id: obj,
                key: Key("wrens".into()),
                value: PrimitiveValue::Int(3),
                datatype: None,
            }
        );
    }

    #[test]
    fn merge_keeps_the_last_assignment() {
        let obj = ObjectId::random();
        let mut op = Operation::Set {
            object_id: obj.clone(),
            key: Key("bird".into()),
            value: PrimitiveValue::Str("magpie".into()),
            datatype: None,
        };
        op.merge(Operation::Set {
            object_id: obj.clone(),
            key: Key("bird".into()),
            value: PrimitiveValue::Str("wagtail".into()),
            datatype: None,
        });
        assert_eq!(
            op,
            Operation::Set {
                object_id: obj,
                key: Key("bird".into()),
                value: PrimitiveValue::Str("wagtail".into()),
                datatype: None,
            }
        );
    }

    #[test]
    fn insertions_never_merge() {
        let obj = ObjectId::random();
        let actor = ActorId::random();
        let ins = Operation::Insert {
            list_id: obj.clone(),
            key: ElementId::Head,
            elem: 1,
        };
        let set = Operation::Set {
            object_id: obj,
            key: ElementId::Id(actor, 1).as_key(),
            value: PrimitiveValue::Str("chaffinch".into()),
            datatype: None,
        };
        assert!(!ins.can_merge(&set));
        assert!(!set.can_merge(&ins));
    }
}
