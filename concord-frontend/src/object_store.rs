//! The materialised side of a document: a cache of map and list nodes keyed
//! by object id, together with the bookkeeping the frontend needs around it
//! (reverse links for path construction, per-property conflict buckets, and
//! the element counter watermark of each list).
//!
//! The store is built on persistent maps and vectors, so cloning one is
//! cheap and an update leaves every untouched node shared with the original.
//! That sharing is what lets the document hand out snapshot after snapshot
//! while old ones stay valid.

use std::collections::HashMap as StdHashMap;

use concord_protocol as cp;
use concord_protocol::{ActorId, DataType, ElementId, Key, ObjectId};
use im_rc::{HashMap, Vector};
use tracing::instrument;

use crate::{
    error::InvalidPatch,
    path::{Path, PathElement},
    value::{Primitive, Value},
};

/// A value as held inside a node: a scalar, or a link to another object in
/// the cache.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StoredValue {
    Primitive(Primitive),
    Link(ObjectId),
}

impl StoredValue {
    fn linked_object(&self) -> Option<&ObjectId> {
        match self {
            StoredValue::Link(object_id) => Some(object_id),
            StoredValue::Primitive(_) => None,
        }
    }

    fn from_element_value(value: &cp::ElementValue, datatype: Option<DataType>) -> StoredValue {
        match value {
            cp::ElementValue::Primitive(v) => {
                StoredValue::Primitive(Primitive::from_wire(v, datatype))
            }
            cp::ElementValue::Link(object_id) => StoredValue::Link(object_id.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct MapNode {
    pub(crate) fields: HashMap<Key, StoredValue>,
}

/// `elements` and `elem_ids` always have the same length; the element id at
/// an index is the identity of the value at that index.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct ListNode {
    pub(crate) elements: Vector<StoredValue>,
    pub(crate) elem_ids: Vector<ElementId>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Map(MapNode),
    List(ListNode),
}

/// An error applying a locally generated operation to a store. Only replay
/// over freshly arrived remote state can produce one; the operation no
/// longer has a target and is dropped.
#[derive(Debug, PartialEq)]
pub(crate) struct StaleOp;

#[derive(Debug, Clone)]
pub(crate) struct ObjectStore {
    cache: HashMap<ObjectId, Node>,
    /// Inverse of the parent links in `cache`: child id to `(parent, key)`.
    /// Tracks the materialised view only, never conflicted alternates.
    inbound: HashMap<ObjectId, (ObjectId, Key)>,
    conflicts: HashMap<ObjectId, HashMap<Key, HashMap<ActorId, StoredValue>>>,
    /// The highest element counter observed per list, across all actors.
    /// Freshly minted element ids must exceed this.
    max_elem: HashMap<ObjectId, u64>,
}

impl ObjectStore {
    pub(crate) fn new() -> ObjectStore {
        let mut cache = HashMap::new();
        cache.insert(ObjectId::Root, Node::Map(MapNode::default()));
        ObjectStore {
            cache,
            inbound: HashMap::new(),
            conflicts: HashMap::new(),
            max_elem: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, object_id: &ObjectId) -> Option<&Node> {
        self.cache.get(object_id)
    }

    /// Whether two stores share their cache storage wholesale, which is the
    /// case exactly when nothing was changed between them.
    #[cfg(test)]
    pub(crate) fn cache_ptr_eq(&self, other: &ObjectStore) -> bool {
        self.cache.ptr_eq(&other.cache)
    }

    pub(crate) fn max_elem(&self, object_id: &ObjectId) -> u64 {
        self.max_elem.get(object_id).copied().unwrap_or(0)
    }

    fn raise_max_elem(&mut self, object_id: &ObjectId, counter: u64) {
        let current = self.max_elem(object_id);
        if counter > current {
            self.max_elem.insert(object_id.clone(), counter);
        }
    }

    fn map_node(&self, object_id: &ObjectId) -> Result<MapNode, InvalidPatch> {
        match self.cache.get(object_id) {
            Some(Node::Map(node)) => Ok(node.clone()),
            Some(Node::List(_)) => Err(InvalidPatch::MismatchedObjectType {
                object_id: object_id.clone(),
            }),
            None => Err(InvalidPatch::MissingObject(object_id.clone())),
        }
    }

    fn list_node(&self, object_id: &ObjectId) -> Result<ListNode, InvalidPatch> {
        match self.cache.get(object_id) {
            Some(Node::List(node)) => Ok(node.clone()),
            Some(Node::Map(_)) => Err(InvalidPatch::MismatchedObjectType {
                object_id: object_id.clone(),
            }),
            None => Err(InvalidPatch::MissingObject(object_id.clone())),
        }
    }

    fn unlink(&mut self, old: Option<&StoredValue>) {
        if let Some(child) = old.and_then(|v| v.linked_object()) {
            self.inbound.remove(child);
        }
    }

    fn link(&mut self, value: &StoredValue, parent: &ObjectId, key: &Key) {
        if let StoredValue::Link(child) = value {
            self.inbound
                .insert(child.clone(), (parent.clone(), key.clone()));
        }
    }

    fn set_conflicts(&mut self, object_id: &ObjectId, key: &Key, conflicts: &[cp::Conflict]) {
        if conflicts.is_empty() {
            self.clear_conflict(object_id, key);
        } else {
            let mut bucket: HashMap<ActorId, StoredValue> = HashMap::new();
            for conflict in conflicts {
                bucket.insert(
                    conflict.actor.clone(),
                    StoredValue::from_element_value(&conflict.value, conflict.datatype),
                );
            }
            let mut for_object = self.conflicts.get(object_id).cloned().unwrap_or_default();
            for_object.insert(key.clone(), bucket);
            self.conflicts.insert(object_id.clone(), for_object);
        }
    }

    fn clear_conflict(&mut self, object_id: &ObjectId, key: &Key) {
        if let Some(for_object) = self.conflicts.get(object_id) {
            let mut for_object = for_object.clone();
            for_object.remove(key);
            if for_object.is_empty() {
                self.conflicts.remove(object_id);
            } else {
                self.conflicts.insert(object_id.clone(), for_object);
            }
        }
    }

    /// Fold one backend diff into the store.
    #[instrument(level = "trace", skip(self))]
    pub(crate) fn apply_diff(&mut self, diff: &cp::Diff) -> Result<(), InvalidPatch> {
        match &diff.action {
            cp::DiffAction::CreateMap(object_id, _) => {
                self.cache
                    .insert(object_id.clone(), Node::Map(MapNode::default()));
            }
            cp::DiffAction::CreateList(object_id, _) => {
                self.cache
                    .insert(object_id.clone(), Node::List(ListNode::default()));
            }
            cp::DiffAction::MaxElem(object_id, max, _) => {
                self.list_node(object_id)?;
                self.raise_max_elem(object_id, *max);
            }
            cp::DiffAction::SetMapKey(object_id, _, key, value, datatype) => {
                let mut node = self.map_node(object_id)?;
                let stored = StoredValue::from_element_value(value, *datatype);
                self.unlink(node.fields.get(key));
                self.link(&stored, object_id, key);
                node.fields.insert(key.clone(), stored);
                self.cache.insert(object_id.clone(), Node::Map(node));
                self.set_conflicts(object_id, key, &diff.conflicts);
            }
            cp::DiffAction::RemoveMapKey(object_id, _, key) => {
                let mut node = self.map_node(object_id)?;
                self.unlink(node.fields.get(key));
                node.fields.remove(key);
                self.cache.insert(object_id.clone(), Node::Map(node));
                self.clear_conflict(object_id, key);
            }
            cp::DiffAction::InsertSequenceElement(object_id, _, index, value, datatype, elem_id) => {
                let mut node = self.list_node(object_id)?;
                if *index > node.elements.len() {
                    return Err(InvalidPatch::IndexOutOfBounds {
                        object_id: object_id.clone(),
                        index: *index,
                    });
                }
                let key = Key::from(elem_id);
                let stored = StoredValue::from_element_value(value, *datatype);
                self.link(&stored, object_id, &key);
                node.elements.insert(*index, stored);
                node.elem_ids.insert(*index, elem_id.clone());
                self.cache.insert(object_id.clone(), Node::List(node));
                if let Some(counter) = elem_id.counter() {
                    self.raise_max_elem(object_id, counter);
                }
                self.set_conflicts(object_id, &key, &diff.conflicts);
            }
            cp::DiffAction::SetSequenceElement(object_id, _, index, value, datatype) => {
                let mut node = self.list_node(object_id)?;
                let elem_id = node.elem_ids.get(*index).cloned().ok_or_else(|| {
                    InvalidPatch::IndexOutOfBounds {
                        object_id: object_id.clone(),
                        index: *index,
                    }
                })?;
                let key = Key::from(&elem_id);
                let stored = StoredValue::from_element_value(value, *datatype);
                self.unlink(node.elements.get(*index));
                self.link(&stored, object_id, &key);
                node.elements.set(*index, stored);
                self.cache.insert(object_id.clone(), Node::List(node));
                self.set_conflicts(object_id, &key, &diff.conflicts);
            }
            cp::DiffAction::RemoveSequenceElement(object_id, _, index) => {
                let mut node = self.list_node(object_id)?;
                if *index >= node.elements.len() {
                    return Err(InvalidPatch::IndexOutOfBounds {
                        object_id: object_id.clone(),
                        index: *index,
                    });
                }
                self.unlink(node.elements.get(*index));
                let elem_id = node.elem_ids.remove(*index);
                node.elements.remove(*index);
                self.cache.insert(object_id.clone(), Node::List(node));
                self.clear_conflict(object_id, &Key::from(&elem_id));
            }
        }
        Ok(())
    }

    /// Apply an operation this frontend generated itself, either straight
    /// after capture or when replaying in-flight requests over fresh remote
    /// state.
    #[instrument(level = "trace", skip(self))]
    pub(crate) fn apply_local_op(
        &mut self,
        actor: &ActorId,
        op: &cp::Operation,
    ) -> Result<(), StaleOp> {
        match op {
            cp::Operation::MakeMap { object_id } => {
                self.cache
                    .insert(object_id.clone(), Node::Map(MapNode::default()));
                Ok(())
            }
            cp::Operation::MakeList { object_id } => {
                self.cache
                    .insert(object_id.clone(), Node::List(ListNode::default()));
                Ok(())
            }
            cp::Operation::Set {
                object_id,
                key,
                value,
                datatype,
            } => self.set_property(
                object_id,
                key,
                StoredValue::Primitive(Primitive::from_wire(value, *datatype)),
            ),
            cp::Operation::Link {
                object_id,
                key,
                value,
            } => self.set_property(object_id, key, StoredValue::Link(value.clone())),
            cp::Operation::Delete { object_id, key } => self.delete_property(object_id, key),
            cp::Operation::Insert { list_id, key, elem } => self.insert_element(
                list_id,
                key,
                ElementId::Id(actor.clone(), *elem),
            ),
            cp::Operation::Increment {
                object_id,
                key,
                value,
            } => self.increment_property(object_id, key, *value),
        }
    }

    fn set_property(
        &mut self,
        object_id: &ObjectId,
        key: &Key,
        stored: StoredValue,
    ) -> Result<(), StaleOp> {
        match self.cache.get(object_id) {
            Some(Node::Map(node)) => {
                let mut node = node.clone();
                self.unlink(node.fields.get(key));
                self.link(&stored, object_id, key);
                node.fields.insert(key.clone(), stored);
                self.cache.insert(object_id.clone(), Node::Map(node));
            }
            Some(Node::List(node)) => {
                let elem_id = key.as_element_id().map_err(|_| StaleOp)?;
                let index = node.elem_ids.index_of(&elem_id).ok_or(StaleOp)?;
                let mut node = node.clone();
                self.unlink(node.elements.get(index));
                self.link(&stored, object_id, key);
                node.elements.set(index, stored);
                self.cache.insert(object_id.clone(), Node::List(node));
            }
            None => return Err(StaleOp),
        }
        // a local write supersedes whatever conflict was recorded there
        self.clear_conflict(object_id, key);
        Ok(())
    }

    fn delete_property(&mut self, object_id: &ObjectId, key: &Key) -> Result<(), StaleOp> {
        match self.cache.get(object_id) {
            Some(Node::Map(node)) => {
                if !node.fields.contains_key(key) {
                    return Err(StaleOp);
                }
                let mut node = node.clone();
                self.unlink(node.fields.get(key));
                node.fields.remove(key);
                self.cache.insert(object_id.clone(), Node::Map(node));
            }
            Some(Node::List(node)) => {
                let elem_id = key.as_element_id().map_err(|_| StaleOp)?;
                let index = node.elem_ids.index_of(&elem_id).ok_or(StaleOp)?;
                let mut node = node.clone();
                self.unlink(node.elements.get(index));
                node.elements.remove(index);
                node.elem_ids.remove(index);
                self.cache.insert(object_id.clone(), Node::List(node));
            }
            None => return Err(StaleOp),
        }
        self.clear_conflict(object_id, key);
        Ok(())
    }

    fn insert_element(
        &mut self,
        list_id: &ObjectId,
        predecessor: &ElementId,
        elem_id: ElementId,
    ) -> Result<(), StaleOp> {
        let node = match self.cache.get(list_id) {
            Some(Node::List(node)) => node,
            _ => return Err(StaleOp),
        };
        let mut index = match predecessor {
            ElementId::Head => 0,
            _ => node.elem_ids.index_of(predecessor).ok_or(StaleOp)? + 1,
        };
        // concurrent successors of the same predecessor are ordered by
        // descending element id, counter first then actor
        while let Some(existing) = node.elem_ids.get(index) {
            if *existing > elem_id {
                index += 1;
            } else {
                break;
            }
        }
        let mut node = node.clone();
        node.elements
            .insert(index, StoredValue::Primitive(Primitive::Null));
        node.elem_ids.insert(index, elem_id.clone());
        self.cache.insert(list_id.clone(), Node::List(node));
        if let Some(counter) = elem_id.counter() {
            self.raise_max_elem(list_id, counter);
        }
        Ok(())
    }

    fn increment_property(
        &mut self,
        object_id: &ObjectId,
        key: &Key,
        by: i64,
    ) -> Result<(), StaleOp> {
        match self.cache.get(object_id) {
            Some(Node::Map(node)) => match node.fields.get(key) {
                Some(StoredValue::Primitive(Primitive::Counter(n))) => {
                    let mut node = node.clone();
                    node.fields
                        .insert(key.clone(), StoredValue::Primitive(Primitive::Counter(n + by)));
                    self.cache.insert(object_id.clone(), Node::Map(node));
                    Ok(())
                }
                _ => Err(StaleOp),
            },
            Some(Node::List(node)) => {
                let elem_id = key.as_element_id().map_err(|_| StaleOp)?;
                let index = node.elem_ids.index_of(&elem_id).ok_or(StaleOp)?;
                match node.elements.get(index) {
                    Some(StoredValue::Primitive(Primitive::Counter(n))) => {
                        let n = *n;
                        let mut node = node.clone();
                        node.elements
                            .set(index, StoredValue::Primitive(Primitive::Counter(n + by)));
                        self.cache.insert(object_id.clone(), Node::List(node));
                        Ok(())
                    }
                    _ => Err(StaleOp),
                }
            }
            None => Err(StaleOp),
        }
    }

    /// The stored value addressed by `element` within `object_id`.
    fn stored_at(&self, object_id: &ObjectId, element: &PathElement) -> Option<&StoredValue> {
        match (self.cache.get(object_id)?, element) {
            (Node::Map(node), PathElement::Key(key)) => node.fields.get(&Key(key.clone())),
            (Node::List(node), PathElement::Index(index)) => node.elements.get(*index),
            _ => None,
        }
    }

    /// The key of `element` within `object_id`: the map key itself, or the
    /// element id currently at a list index.
    pub(crate) fn key_at(&self, object_id: &ObjectId, element: &PathElement) -> Option<Key> {
        match (self.cache.get(object_id)?, element) {
            (Node::Map(_), PathElement::Key(key)) => Some(Key(key.clone())),
            (Node::List(node), PathElement::Index(index)) => {
                node.elem_ids.get(*index).map(Key::from)
            }
            _ => None,
        }
    }

    pub(crate) fn elem_id_at(&self, list_id: &ObjectId, index: usize) -> Option<ElementId> {
        match self.cache.get(list_id)? {
            Node::List(node) => node.elem_ids.get(index).cloned(),
            Node::Map(_) => None,
        }
    }

    pub(crate) fn list_len(&self, object_id: &ObjectId) -> Option<usize> {
        match self.cache.get(object_id)? {
            Node::List(node) => Some(node.elements.len()),
            Node::Map(_) => None,
        }
    }

    /// The id of the object a path leads to, if it leads to an object.
    pub(crate) fn object_at_path(&self, path: &Path) -> Option<ObjectId> {
        let mut current = ObjectId::Root;
        for element in path.elements() {
            match self.stored_at(&current, element)? {
                StoredValue::Link(object_id) => current = object_id.clone(),
                StoredValue::Primitive(_) => return None,
            }
        }
        Some(current)
    }

    pub(crate) fn stored_at_path(&self, path: &Path) -> Option<StoredValue> {
        let name = path.name()?;
        let parent = self.object_at_path(&path.parent())?;
        self.stored_at(&parent, name).cloned()
    }

    pub(crate) fn value_at_path(&self, path: &Path) -> Option<Value> {
        match path.name() {
            None => Some(self.root_value()),
            Some(_) => {
                let stored = self.stored_at_path(path)?;
                self.realise(&stored)
            }
        }
    }

    /// Rebuild the path to an object by walking the inbound links up to the
    /// root.
    pub(crate) fn path_to_object(&self, object_id: &ObjectId) -> Option<Path> {
        let mut elements = Vec::new();
        let mut current = object_id.clone();
        while current != ObjectId::Root {
            let (parent, key) = self.inbound.get(&current)?.clone();
            let element = match self.cache.get(&parent)? {
                Node::Map(_) => PathElement::Key(key.0.clone()),
                Node::List(node) => {
                    let elem_id = key.as_element_id().ok()?;
                    PathElement::Index(node.elem_ids.index_of(&elem_id)?)
                }
            };
            elements.push(element);
            current = parent;
        }
        elements.reverse();
        Some(Path::from_elements(elements))
    }

    fn realise(&self, stored: &StoredValue) -> Option<Value> {
        match stored {
            StoredValue::Primitive(p) => Some(Value::Primitive(p.clone())),
            StoredValue::Link(object_id) => self.value_of(object_id),
        }
    }

    /// Materialise the object under `object_id` as a plain value.
    pub(crate) fn value_of(&self, object_id: &ObjectId) -> Option<Value> {
        match self.cache.get(object_id)? {
            Node::Map(node) => {
                let mut result = StdHashMap::new();
                for (key, stored) in node.fields.iter() {
                    result.insert(key.0.clone(), self.realise(stored)?);
                }
                Some(Value::Map(result))
            }
            Node::List(node) => {
                let elements: Option<Vec<Value>> =
                    node.elements.iter().map(|v| self.realise(v)).collect();
                Some(Value::List(elements?))
            }
        }
    }

    pub(crate) fn root_value(&self) -> Value {
        self.value_of(&ObjectId::Root)
            .unwrap_or_else(|| Value::Map(StdHashMap::new()))
    }

    /// The recorded losing writes for a property, materialised and keyed by
    /// the actor which made them.
    pub(crate) fn conflicts_for(
        &self,
        object_id: &ObjectId,
        key: &Key,
    ) -> Option<StdHashMap<ActorId, Value>> {
        let bucket = self.conflicts.get(object_id)?.get(key)?;
        let mut result = StdHashMap::new();
        for (actor, stored) in bucket.iter() {
            result.insert(actor.clone(), self.realise(stored)?);
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;

    fn actor(n: u8) -> ActorId {
        ActorId(format!("0000000{}-0000-4000-8000-000000000000", n))
    }

    fn set_map_key(object_id: &ObjectId, key: &str, value: &str) -> cp::Diff {
        cp::Diff::new(cp::DiffAction::SetMapKey(
            object_id.clone(),
            cp::MapType::Map,
            Key::from(key),
            cp::ElementValue::Primitive(cp::PrimitiveValue::Str(value.into())),
            None,
        ))
    }

    fn create_map(object_id: &ObjectId) -> cp::Diff {
        cp::Diff::new(cp::DiffAction::CreateMap(object_id.clone(), cp::MapType::Map))
    }

    fn link_map_key(parent: &ObjectId, key: &str, child: &ObjectId) -> cp::Diff {
        cp::Diff::new(cp::DiffAction::SetMapKey(
            parent.clone(),
            cp::MapType::Map,
            Key::from(key),
            cp::ElementValue::Link(child.clone()),
            None,
        ))
    }

    #[test]
    fn patching_one_subtree_shares_the_other() {
        let birds = ObjectId::random();
        let mammals = ObjectId::random();
        let mut store = ObjectStore::new();
        for diff in vec![
            create_map(&birds),
            set_map_key(&birds, "wren", "small"),
            link_map_key(&ObjectId::Root, "birds", &birds),
            create_map(&mammals),
            set_map_key(&mammals, "badger", "stripy"),
            link_map_key(&ObjectId::Root, "mammals", &mammals),
        ] {
            store.apply_diff(&diff).unwrap();
        }

        let updated = {
            let mut updated = store.clone();
            updated
                .apply_diff(&set_map_key(&birds, "magpie", "noisy"))
                .unwrap();
            updated
        };

        let old_mammals = match store.get(&mammals).unwrap() {
            Node::Map(node) => node,
            _ => panic!("mammals was not a map"),
        };
        let new_mammals = match updated.get(&mammals).unwrap() {
            Node::Map(node) => node,
            _ => panic!("mammals was not a map"),
        };
        assert!(old_mammals.fields.ptr_eq(&new_mammals.fields));

        let old_birds = match store.get(&birds).unwrap() {
            Node::Map(node) => node.clone(),
            _ => panic!("birds was not a map"),
        };
        let new_birds = match updated.get(&birds).unwrap() {
            Node::Map(node) => node.clone(),
            _ => panic!("birds was not a map"),
        };
        assert!(!old_birds.fields.ptr_eq(&new_birds.fields));
        // the old snapshot still reads as it did before the patch
        assert_eq!(old_birds.fields.len(), 1);
        assert_eq!(new_birds.fields.len(), 2);
    }

    #[test]
    fn inbound_links_mirror_the_materialised_tree() {
        let birds = ObjectId::random();
        let mut store = ObjectStore::new();
        for diff in vec![
            create_map(&birds),
            link_map_key(&ObjectId::Root, "birds", &birds),
        ] {
            store.apply_diff(&diff).unwrap();
        }
        assert_eq!(
            store.path_to_object(&birds),
            Some(Path::root().key("birds"))
        );

        store
            .apply_diff(&cp::Diff::new(cp::DiffAction::RemoveMapKey(
                ObjectId::Root,
                cp::MapType::Map,
                Key::from("birds"),
            )))
            .unwrap();
        assert_eq!(store.path_to_object(&birds), None);
    }

    #[test]
    fn replayed_insert_orders_by_element_id() {
        let list = ObjectId::random();
        let local = actor(1);
        let remote = actor(2);
        let mut store = ObjectStore::new();
        store
            .apply_diff(&cp::Diff::new(cp::DiffAction::CreateList(
                list.clone(),
                cp::SequenceType::List,
            )))
            .unwrap();
        store
            .apply_diff(&cp::Diff::new(cp::DiffAction::InsertSequenceElement(
                list.clone(),
                cp::SequenceType::List,
                0,
                cp::ElementValue::Primitive(cp::PrimitiveValue::Str("remote".into())),
                None,
                ElementId::Id(remote, 7),
            )))
            .unwrap();

        // a pending local insert at the head, minted before the remote
        // element arrived, replays behind the greater element id
        store
            .apply_local_op(
                &local,
                &cp::Operation::Insert {
                    list_id: list.clone(),
                    key: ElementId::Head,
                    elem: 5,
                },
            )
            .unwrap();
        store
            .apply_local_op(
                &local,
                &cp::Operation::Set {
                    object_id: list.clone(),
                    key: ElementId::Id(local.clone(), 5).as_key(),
                    value: cp::PrimitiveValue::Str("local".into()),
                    datatype: None,
                },
            )
            .unwrap();

        assert_eq!(
            store.value_of(&list).unwrap(),
            Value::List(vec![Value::from("remote"), Value::from("local")])
        );
        assert_eq!(store.max_elem(&list), 7);
    }

    #[test]
    fn element_counts_stay_aligned() {
        let list = ObjectId::random();
        let local = actor(1);
        let mut store = ObjectStore::new();
        store
            .apply_local_op(&local, &cp::Operation::MakeList {
                object_id: list.clone(),
            })
            .unwrap();
        for (elem, pred) in vec![
            (1, ElementId::Head),
            (2, ElementId::Id(local.clone(), 1)),
            (3, ElementId::Id(local.clone(), 2)),
        ] {
            store
                .apply_local_op(&local, &cp::Operation::Insert {
                    list_id: list.clone(),
                    key: pred,
                    elem,
                })
                .unwrap();
        }
        store
            .apply_local_op(&local, &cp::Operation::Delete {
                object_id: list.clone(),
                key: Key::from(ElementId::Id(local.clone(), 2)),
            })
            .unwrap();
        match store.get(&list).unwrap() {
            Node::List(node) => {
                assert_eq!(node.elements.len(), node.elem_ids.len());
                assert_eq!(node.elements.len(), 2);
            }
            _ => panic!("expected a list"),
        }
        assert_eq!(store.max_elem(&list), 3);
    }

    #[test]
    fn stale_ops_report_rather_than_apply() {
        let local = actor(1);
        let gone = ObjectId::from_str("2ce778e4-d23f-426f-98d7-e97fea47181c").unwrap();
        let mut store = ObjectStore::new();
        let result = store.apply_local_op(&local, &cp::Operation::Set {
            object_id: gone,
            key: Key::from("wrens"),
            value: cp::PrimitiveValue::Int(3),
            datatype: None,
        });
        assert_eq!(result, Err(StaleOp));
    }
}
