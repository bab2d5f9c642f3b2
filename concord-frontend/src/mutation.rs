use concord_protocol as cp;
use concord_protocol::{ActorId, ElementId, Key, ObjectId};

use crate::{
    error::InvalidChangeRequest,
    object_store::{ObjectStore, StoredValue},
    path::{Path, PathElement},
    value::{self, Primitive, Value},
};

/// The surface a change closure mutates the document through.
pub trait MutableDocument {
    /// Read a value as it stands inside the current change, including the
    /// effect of changes added earlier in the same closure.
    fn value_at_path(&self, path: &Path) -> Option<Value>;
    /// Record a mutation. Changes apply immediately, so later reads in the
    /// same closure observe them.
    fn add_change(&mut self, change: LocalChange) -> Result<(), InvalidChangeRequest>;
}

#[derive(Debug, PartialEq, Clone)]
enum LocalOperation {
    Set(Value),
    Delete,
    Increment(i64),
    Insert(Value),
    InsertMany(Vec<Value>),
}

/// A single mutation of the document, described by the path it applies at.
#[derive(Debug, PartialEq, Clone)]
pub struct LocalChange {
    path: Path,
    operation: LocalOperation,
}

impl LocalChange {
    /// Set the value at `path` to `value`
    pub fn set<TV>(path: Path, value: TV) -> LocalChange
    where
        TV: Into<Value>,
    {
        LocalChange {
            path,
            operation: LocalOperation::Set(value.into()),
        }
    }

    /// Delete the entry at `path`
    pub fn delete(path: Path) -> LocalChange {
        LocalChange {
            path,
            operation: LocalOperation::Delete,
        }
    }

    /// Increment the counter at `path` by 1
    pub fn increment(path: Path) -> LocalChange {
        LocalChange {
            path,
            operation: LocalOperation::Increment(1),
        }
    }

    /// Increment the counter at `path` by a (possibly negative) amount `by`
    pub fn increment_by(path: Path, by: i64) -> LocalChange {
        LocalChange {
            path,
            operation: LocalOperation::Increment(by),
        }
    }

    /// Decrement the counter at `path` by 1
    pub fn decrement(path: Path) -> LocalChange {
        LocalChange {
            path,
            operation: LocalOperation::Increment(-1),
        }
    }

    /// Insert `value` before the list index `path` ends in
    pub fn insert<TV>(path: Path, value: TV) -> LocalChange
    where
        TV: Into<Value>,
    {
        LocalChange {
            path,
            operation: LocalOperation::Insert(value.into()),
        }
    }

    /// Insert several values starting at the list index `path` ends in
    pub fn insert_many(path: Path, values: Vec<Value>) -> LocalChange {
        LocalChange {
            path,
            operation: LocalOperation::InsertMany(values),
        }
    }
}

/// `MutationTracker` is the context a change closure runs in. It implements
/// [`MutableDocument`], turning each [`LocalChange`] into wire operations.
///
/// Operations are applied to a scratch copy of the rendered state as they
/// are generated, which keeps reads inside the closure consistent with
/// earlier writes and guarantees the committed state agrees with the
/// emitted operations. The scratch copy is only adopted by the document if
/// the whole closure succeeds.
pub(crate) struct MutationTracker {
    state: ObjectStore,
    ops: Vec<cp::Operation>,
    actor_id: Option<ActorId>,
}

impl MutationTracker {
    pub(crate) fn new(state: ObjectStore, actor_id: Option<ActorId>) -> MutationTracker {
        MutationTracker {
            state,
            ops: Vec::new(),
            actor_id,
        }
    }

    pub(crate) fn into_parts(self) -> (ObjectStore, Vec<cp::Operation>) {
        (self.state, self.ops)
    }

    fn actor(&self) -> Result<ActorId, InvalidChangeRequest> {
        self.actor_id
            .clone()
            .ok_or(InvalidChangeRequest::ActorIdNotSet)
    }

    /// Apply an operation to the scratch state and add it to the op list,
    /// folding it into an earlier op on the same property where the
    /// coalescing rules allow.
    fn apply_and_push(&mut self, op: cp::Operation, path: &Path) -> Result<(), InvalidChangeRequest> {
        let actor = self.actor()?;
        self.state
            .apply_local_op(&actor, &op)
            .map_err(|_| InvalidChangeRequest::NoSuchPath { path: path.clone() })?;
        if let Some(index) = self.ops.iter().rposition(|existing| existing.can_merge(&op)) {
            self.ops[index].merge(op);
        } else {
            self.ops.push(op);
        }
        Ok(())
    }

    /// Resolve the object containing `path` and the key of its final
    /// component within that object.
    fn resolve_parent(&self, path: &Path) -> Result<(ObjectId, Key), InvalidChangeRequest> {
        let name = path
            .name()
            .ok_or_else(|| InvalidChangeRequest::NoSuchPath { path: path.clone() })?;
        let parent = self
            .state
            .object_at_path(&path.parent())
            .ok_or_else(|| InvalidChangeRequest::NoSuchPath { path: path.clone() })?;
        let key = self
            .state
            .key_at(&parent, name)
            .ok_or_else(|| InvalidChangeRequest::NoSuchPath { path: path.clone() })?;
        Ok((parent, key))
    }

    /// If the value is a map, assign each of its entries to a key of the
    /// root object.
    fn wrap_root_assignment(&mut self, value: Value) -> Result<(), InvalidChangeRequest> {
        match value {
            Value::Map(kvs) => {
                for (k, v) in kvs.into_iter() {
                    self.set(Path::root().key(k), v)?;
                }
                Ok(())
            }
            _ => Err(InvalidChangeRequest::CannotSetNonMapAsRoot { value }),
        }
    }

    fn set(&mut self, path: Path, value: Value) -> Result<(), InvalidChangeRequest> {
        if path.is_root() {
            return self.wrap_root_assignment(value);
        }
        let actor = self.actor()?;
        if let Some(StoredValue::Primitive(Primitive::Counter(_))) = self.state.stored_at_path(&path)
        {
            return Err(InvalidChangeRequest::CannotOverwriteCounter { path });
        }
        let (parent, key) = self.resolve_parent(&path)?;
        for op in value::ops_for_property(&actor, &parent, key, &value) {
            self.apply_and_push(op, &path)?;
        }
        Ok(())
    }

    fn delete(&mut self, path: Path) -> Result<(), InvalidChangeRequest> {
        if path.is_root() {
            return Err(InvalidChangeRequest::CannotDeleteRoot);
        }
        self.actor()?;
        if self.state.stored_at_path(&path).is_none() {
            return Err(InvalidChangeRequest::NoSuchPath { path });
        }
        let (parent, key) = self.resolve_parent(&path)?;
        self.apply_and_push(
            cp::Operation::Delete {
                object_id: parent,
                key,
            },
            &path,
        )
    }

    fn increment(&mut self, path: Path, by: i64) -> Result<(), InvalidChangeRequest> {
        self.actor()?;
        match self.state.stored_at_path(&path) {
            Some(StoredValue::Primitive(Primitive::Counter(_))) => {}
            Some(_) => return Err(InvalidChangeRequest::IncrementForNonCounter { path }),
            None => return Err(InvalidChangeRequest::NoSuchPath { path }),
        }
        let (parent, key) = self.resolve_parent(&path)?;
        self.apply_and_push(
            cp::Operation::Increment {
                object_id: parent,
                key,
                value: by,
            },
            &path,
        )
    }

    fn insert(&mut self, path: Path, values: Vec<Value>) -> Result<(), InvalidChangeRequest> {
        let actor = self.actor()?;
        let index = match path.name() {
            Some(PathElement::Index(index)) => *index,
            _ => return Err(InvalidChangeRequest::InsertForNonList { path }),
        };
        let list = self
            .state
            .object_at_path(&path.parent())
            .ok_or_else(|| InvalidChangeRequest::NoSuchPath { path: path.clone() })?;
        let len = self
            .state
            .list_len(&list)
            .ok_or_else(|| InvalidChangeRequest::InsertForNonList { path: path.clone() })?;
        if index > len {
            return Err(InvalidChangeRequest::NoSuchPath { path });
        }
        for (offset, value) in values.into_iter().enumerate() {
            let at = index + offset;
            let predecessor = if at == 0 {
                ElementId::Head
            } else {
                self.state
                    .elem_id_at(&list, at - 1)
                    .ok_or_else(|| InvalidChangeRequest::NoSuchPath { path: path.clone() })?
            };
            let elem = self.state.max_elem(&list) + 1;
            self.apply_and_push(
                cp::Operation::Insert {
                    list_id: list.clone(),
                    key: predecessor,
                    elem,
                },
                &path,
            )?;
            let elem_id = ElementId::Id(actor.clone(), elem);
            for op in value::ops_for_property(&actor, &list, elem_id.as_key(), &value) {
                self.apply_and_push(op, &path)?;
            }
        }
        Ok(())
    }
}

impl MutableDocument for MutationTracker {
    fn value_at_path(&self, path: &Path) -> Option<Value> {
        self.state.value_at_path(path)
    }

    fn add_change(&mut self, change: LocalChange) -> Result<(), InvalidChangeRequest> {
        match change.operation {
            LocalOperation::Set(value) => self.set(change.path, value),
            LocalOperation::Delete => self.delete(change.path),
            LocalOperation::Increment(by) => self.increment(change.path, by),
            LocalOperation::Insert(value) => self.insert(change.path, vec![value]),
            LocalOperation::InsertMany(values) => self.insert(change.path, values),
        }
    }
}
