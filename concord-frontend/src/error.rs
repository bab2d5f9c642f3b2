use concord_protocol::ObjectId;
use thiserror::Error;

use crate::{Path, Value};

/// Reasons a local mutation can be rejected. None of these leave any trace
/// on the document they were attempted against.
#[derive(Error, Debug, PartialEq)]
pub enum InvalidChangeRequest {
    #[error("an actor id must be set before the document can be changed")]
    ActorIdNotSet,
    #[error("cannot overwrite the counter at {path}")]
    CannotOverwriteCounter { path: Path },
    #[error("no such path: {path}")]
    NoSuchPath { path: Path },
    #[error("cannot increment the non-counter value at {path}")]
    IncrementForNonCounter { path: Path },
    #[error("cannot delete the root object")]
    CannotDeleteRoot,
    #[error("insert requires a list index path, got {path}")]
    InsertForNonList { path: Path },
    #[error("only a map can be assigned to the root object, got {value:?}")]
    CannotSetNonMapAsRoot { value: Value },
    #[error("the backend has nothing to undo")]
    CannotUndo,
    #[error("the backend has nothing to redo")]
    CannotRedo,
}

/// Reasons a backend patch can be rejected. A rejected patch leaves the
/// document untouched.
#[derive(Error, Debug, PartialEq)]
pub enum InvalidPatch {
    #[error("patch acknowledged seq {actual} but the head request has seq {expected}")]
    MismatchedSequenceNumber { expected: u64, actual: u64 },
    #[error("patch acknowledged seq {0} but no requests are in flight")]
    UnexpectedAcknowledgment(u64),
    #[error("patch referenced the missing object {0}")]
    MissingObject(ObjectId),
    #[error("patch addressed {object_id} as the wrong kind of object")]
    MismatchedObjectType { object_id: ObjectId },
    #[error("patch index {index} is out of bounds for {object_id}")]
    IndexOutOfBounds { object_id: ObjectId, index: usize },
}
