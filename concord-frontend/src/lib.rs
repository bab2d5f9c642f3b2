//! The frontend of a concord document: a conventional-looking JSON document
//! which captures mutations as CRDT operations for a backend, and folds the
//! backend's patches back into an immutable, structurally shared
//! materialised view.
//!
//! ```rust
//! use concord_frontend::{Document, LocalChange, Path};
//!
//! let doc = Document::default();
//! let (doc, request) = doc
//!     .change(Some("set a bird".into()), |d| {
//!         d.add_change(LocalChange::set(Path::root().key("bird"), "magpie"))
//!     })
//!     .unwrap();
//! // `request` is sent to the backend; the patch it answers with is folded
//! // back in with `doc.apply_patch`.
//! assert!(request.is_some());
//! assert_eq!(doc.state().to_json(), serde_json::json!({ "bird": "magpie" }));
//! ```
mod document;
mod error;
mod mutation;
mod object_store;
mod path;
mod value;

pub use document::{system_time, Document, Options};
pub use error::{InvalidChangeRequest, InvalidPatch};
pub use mutation::{LocalChange, MutableDocument};
pub use path::{Path, PathElement};
pub use value::{Primitive, Value};
