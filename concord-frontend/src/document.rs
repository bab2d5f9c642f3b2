use std::{collections::HashMap, convert::TryFrom};

use concord_protocol as cp;
use concord_protocol::{ActorId, Clock, ObjectId};
use im_rc::Vector;
use tracing::instrument;

use crate::{
    error::{InvalidChangeRequest, InvalidPatch},
    mutation::{MutableDocument, MutationTracker},
    object_store::ObjectStore,
    path::Path,
    value::Value,
};

/// Options for building a [`Document`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    actor_id: Option<ActorId>,
    defer_actor_id: bool,
}

impl Options {
    /// Set the actor id to appear in changes from this document.
    ///
    /// The default is [`ActorId::random`].
    pub fn with_actor_id<A: Into<ActorId>>(mut self, actor_id: A) -> Options {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Leave the actor id unassigned until [`Document::set_actor_id`] is
    /// called. Changing the document before then fails with
    /// [`InvalidChangeRequest::ActorIdNotSet`].
    pub fn defer_actor_id(mut self) -> Options {
        self.defer_actor_id = true;
        self
    }
}

/// The number of milliseconds since the Unix epoch, as stored by timestamp
/// values.
pub fn system_time() -> Option<i64> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_millis()).ok())
}

/// A concord document: the materialised view of a CRDT presented to
/// application code.
///
/// A `Document` is an immutable value. [`change`](Document::change) and
/// [`apply_patch`](Document::apply_patch) return a new document and leave
/// the receiver untouched; unchanged subtrees are shared between the old
/// and new documents by reference.
///
/// Two views of the state are kept. The reconciled view reflects only what
/// the backend has acknowledged. The rendered view is the reconciled view
/// with all in-flight local requests replayed on top, and is what
/// [`state`](Document::state) exposes, so an application keeps seeing its
/// own edits while they travel to the backend and back.
#[derive(Debug, Clone)]
pub struct Document {
    actor_id: Option<ActorId>,
    seq: u64,
    deps: Clock,
    can_undo: bool,
    can_redo: bool,
    reconciled: ObjectStore,
    rendered: ObjectStore,
    requests: Vector<cp::ChangeRequest>,
}

impl Default for Document {
    fn default() -> Self {
        Document::new(Options::default())
    }
}

impl Document {
    /// Create an empty document whose root is an empty map.
    pub fn new(options: Options) -> Document {
        let actor_id = if options.defer_actor_id {
            None
        } else {
            Some(options.actor_id.unwrap_or_else(ActorId::random))
        };
        let store = ObjectStore::new();
        Document {
            actor_id,
            seq: 0,
            deps: Clock::empty(),
            can_undo: false,
            can_redo: false,
            reconciled: store.clone(),
            rendered: store,
            requests: Vector::new(),
        }
    }

    pub fn actor_id(&self) -> Option<&ActorId> {
        self.actor_id.as_ref()
    }

    /// A copy of this document with the given actor id assigned.
    pub fn set_actor_id<A: Into<ActorId>>(&self, actor_id: A) -> Document {
        let mut doc = self.clone();
        doc.actor_id = Some(actor_id.into());
        doc
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The dependency clock of the latest authoritative state.
    pub fn deps(&self) -> &Clock {
        &self.deps
    }

    pub fn can_undo(&self) -> bool {
        self.can_undo
    }

    pub fn can_redo(&self) -> bool {
        self.can_redo
    }

    /// The sequence numbers of requests sent to the backend but not yet
    /// acknowledged, oldest first.
    pub fn in_flight_requests(&self) -> Vec<u64> {
        self.requests.iter().map(|r| r.seq).collect()
    }

    /// The rendered state of the document.
    pub fn state(&self) -> Value {
        self.rendered.root_value()
    }

    /// The state the backend has acknowledged, without in-flight local
    /// requests.
    pub fn backend_value(&self) -> Value {
        self.reconciled.root_value()
    }

    /// The rendered value at `path`, if the path exists.
    pub fn value_at(&self, path: &Path) -> Option<Value> {
        self.rendered.value_at_path(path)
    }

    /// The id of the object `path` leads to, if it leads to an object.
    pub fn get_object_id(&self, path: &Path) -> Option<ObjectId> {
        self.rendered.object_at_path(path)
    }

    /// The path of the object with the given id in the rendered view.
    pub fn path_to_object(&self, object_id: &ObjectId) -> Option<Path> {
        self.rendered.path_to_object(object_id)
    }

    /// The recorded losing writes for the property at `path`, keyed by the
    /// actor which made them. `None` when no concurrent writes are
    /// recorded there.
    pub fn get_conflicts(&self, path: &Path) -> Option<HashMap<ActorId, Value>> {
        let name = path.name()?;
        let parent = self.rendered.object_at_path(&path.parent())?;
        let key = self.rendered.key_at(&parent, name)?;
        self.rendered.conflicts_for(&parent, &key)
    }

    /// Run `change_closure` against a mutable view of this document.
    ///
    /// Returns the new document along with the change request to forward to
    /// the backend. If the closure made no changes the returned document
    /// shares all its state with this one and no request is produced. If
    /// the closure fails the error propagates and nothing happened: this
    /// document is left exactly as it was.
    #[instrument(level = "debug", skip(self, change_closure))]
    pub fn change<F>(
        &self,
        message: Option<String>,
        change_closure: F,
    ) -> Result<(Document, Option<cp::ChangeRequest>), InvalidChangeRequest>
    where
        F: FnOnce(&mut dyn MutableDocument) -> Result<(), InvalidChangeRequest>,
    {
        let mut tracker = MutationTracker::new(self.rendered.clone(), self.actor_id.clone());
        change_closure(&mut tracker)?;
        let (state, ops) = tracker.into_parts();
        if ops.is_empty() {
            return Ok((self.clone(), None));
        }
        let actor_id = self
            .actor_id
            .clone()
            .ok_or(InvalidChangeRequest::ActorIdNotSet)?;
        let request = cp::ChangeRequest {
            request_type: cp::RequestType::Change,
            seq: self.seq + 1,
            // the actor's own latest change is implied by seq
            deps: self.deps.without(&actor_id),
            actor_id,
            message,
            ops,
        };
        tracing::debug!(seq = request.seq, num_ops = request.ops.len(), "committing change");
        let mut doc = self.clone();
        doc.seq = request.seq;
        doc.rendered = state;
        doc.requests.push_back(request.clone());
        doc.can_undo = true;
        Ok((doc, Some(request)))
    }

    /// Emit a request with no operations, marking a point in the sequence
    /// without touching the document contents.
    pub fn empty_change(
        &self,
        message: Option<String>,
    ) -> Result<(Document, cp::ChangeRequest), InvalidChangeRequest> {
        self.request_without_ops(cp::RequestType::Change, message)
    }

    /// Ask the backend to undo the latest undoable change by this actor.
    pub fn undo(
        &self,
        message: Option<String>,
    ) -> Result<(Document, cp::ChangeRequest), InvalidChangeRequest> {
        if !self.can_undo {
            return Err(InvalidChangeRequest::CannotUndo);
        }
        self.request_without_ops(cp::RequestType::Undo, message)
    }

    /// Ask the backend to redo the latest undone change by this actor.
    pub fn redo(
        &self,
        message: Option<String>,
    ) -> Result<(Document, cp::ChangeRequest), InvalidChangeRequest> {
        if !self.can_redo {
            return Err(InvalidChangeRequest::CannotRedo);
        }
        self.request_without_ops(cp::RequestType::Redo, message)
    }

    fn request_without_ops(
        &self,
        request_type: cp::RequestType,
        message: Option<String>,
    ) -> Result<(Document, cp::ChangeRequest), InvalidChangeRequest> {
        let actor_id = self
            .actor_id
            .clone()
            .ok_or(InvalidChangeRequest::ActorIdNotSet)?;
        let request = cp::ChangeRequest {
            request_type,
            seq: self.seq + 1,
            deps: self.deps.without(&actor_id),
            actor_id,
            message,
            ops: Vec::new(),
        };
        let mut doc = self.clone();
        doc.seq = request.seq;
        doc.requests.push_back(request.clone());
        Ok((doc, request))
    }

    /// Fold a backend patch into the document.
    ///
    /// A patch carrying this actor's id and a sequence number acknowledges
    /// the in-flight request at the head of the queue; anything else would
    /// mean the backend answered out of order and is rejected. Remaining
    /// in-flight requests are replayed on top of the new authoritative
    /// state so the rendered view keeps showing them.
    #[instrument(level = "debug", skip(self))]
    pub fn apply_patch(&self, patch: cp::Patch) -> Result<Document, InvalidPatch> {
        let mut requests = self.requests.clone();
        if let (Some(patch_actor), Some(patch_seq)) = (&patch.actor, patch.seq) {
            if self.actor_id.as_ref() == Some(patch_actor) {
                match requests.front() {
                    Some(head) if head.seq == patch_seq => {
                        requests.pop_front();
                    }
                    Some(head) => {
                        return Err(InvalidPatch::MismatchedSequenceNumber {
                            expected: head.seq,
                            actual: patch_seq,
                        });
                    }
                    None => return Err(InvalidPatch::UnexpectedAcknowledgment(patch_seq)),
                }
            }
        }

        let mut reconciled = self.reconciled.clone();
        for diff in &patch.diffs {
            reconciled.apply_diff(diff)?;
        }

        let rendered = if requests.is_empty() {
            reconciled.clone()
        } else {
            let mut rendered = reconciled.clone();
            for request in &requests {
                for op in &request.ops {
                    // an op whose target a remote change removed no longer
                    // applies; the acknowledging patch is authoritative
                    if rendered.apply_local_op(&request.actor_id, op).is_err() {
                        tracing::debug!(?op, "skipping stale in-flight op during replay");
                    }
                }
            }
            rendered
        };

        let mut doc = self.clone();
        if let (Some(actor_id), Some(clock)) = (&self.actor_id, &patch.clock) {
            let seen = clock.seq_for(actor_id);
            if seen > doc.seq {
                doc.seq = seen;
            }
        }
        if let Some(deps) = &patch.deps {
            doc.deps = self.deps.upper_bound(deps);
        } else if let Some(clock) = &patch.clock {
            doc.deps = self.deps.upper_bound(clock);
        }
        if let Some(can_undo) = patch.can_undo {
            doc.can_undo = can_undo;
        }
        if let Some(can_redo) = patch.can_redo {
            doc.can_redo = can_redo;
        }
        doc.reconciled = reconciled;
        doc.rendered = rendered;
        doc.requests = requests;
        Ok(doc)
    }
}
