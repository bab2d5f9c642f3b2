use concord_frontend::{
    Document, InvalidChangeRequest, InvalidPatch, LocalChange, Options, Path,
};
use concord_protocol as cp;
use concord_protocol::{Key, ObjectId};
use maplit::hashmap;
use pretty_assertions::assert_eq;
use serde_json::json;

const LOCAL: &str = "ec28cfbc-db8e-4b16-9b3d-49285c2d6748";
const REMOTE1: &str = "02ef21f3-c9eb-4087-880e-bedd7c4bbe43";
const REMOTE2: &str = "2a1d376b-24f7-4400-8d4a-f58252d644dd";

fn local_doc() -> Document {
    Document::new(Options::default().with_actor_id(LOCAL))
}

fn set_key(object_id: &ObjectId, key: &str, value: &str) -> cp::Diff {
    cp::Diff::new(cp::DiffAction::SetMapKey(
        object_id.clone(),
        cp::MapType::Map,
        Key::from(key),
        cp::ElementValue::Primitive(cp::PrimitiveValue::Str(value.into())),
        None,
    ))
}

#[test]
fn acknowledgment_pops_exactly_the_head_request() {
    let doc = local_doc();
    let (doc, _) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(Path::root().key("bird"), "magpie"))
        })
        .unwrap();
    let (doc, _) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(Path::root().key("fish"), "salmon"))
        })
        .unwrap();
    assert_eq!(doc.in_flight_requests(), vec![1, 2]);

    let ack = cp::Patch {
        actor: Some(LOCAL.into()),
        seq: Some(1),
        clock: Some(cp::Clock(hashmap! { LOCAL.into() => 1 })),
        diffs: vec![set_key(&ObjectId::Root, "bird", "magpie")],
        ..cp::Patch::empty()
    };
    let doc = doc.apply_patch(ack).unwrap();
    assert_eq!(doc.in_flight_requests(), vec![2]);
    // the rendered view still carries the unacknowledged edit
    assert_eq!(
        doc.state().to_json(),
        json!({ "bird": "magpie", "fish": "salmon" })
    );
    assert_eq!(doc.backend_value().to_json(), json!({ "bird": "magpie" }));
}

#[test]
fn out_of_order_acknowledgment_is_rejected() {
    let doc = local_doc();
    let (doc, _) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(Path::root().key("bird"), "magpie"))
        })
        .unwrap();
    let (doc, _) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(Path::root().key("fish"), "salmon"))
        })
        .unwrap();

    let ack = cp::Patch {
        actor: Some(LOCAL.into()),
        seq: Some(2),
        diffs: vec![set_key(&ObjectId::Root, "fish", "salmon")],
        ..cp::Patch::empty()
    };
    assert_eq!(
        doc.apply_patch(ack).unwrap_err(),
        InvalidPatch::MismatchedSequenceNumber {
            expected: 1,
            actual: 2
        }
    );
    // the rejected patch left the document untouched
    assert_eq!(doc.in_flight_requests(), vec![1, 2]);
    assert_eq!(
        doc.state().to_json(),
        json!({ "bird": "magpie", "fish": "salmon" })
    );
}

#[test]
fn acknowledgment_without_in_flight_requests_is_rejected() {
    let doc = local_doc();
    let ack = cp::Patch {
        actor: Some(LOCAL.into()),
        seq: Some(1),
        ..cp::Patch::empty()
    };
    assert_eq!(
        doc.apply_patch(ack).unwrap_err(),
        InvalidPatch::UnexpectedAcknowledgment(1)
    );
}

#[test]
fn pending_requests_replay_over_remote_patches() {
    let doc = local_doc();
    let (doc, _) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(Path::root().key("bird"), "magpie"))
        })
        .unwrap();

    let remote = cp::Patch {
        clock: Some(cp::Clock(hashmap! { REMOTE1.into() => 1 })),
        diffs: vec![set_key(&ObjectId::Root, "fish", "salmon")],
        ..cp::Patch::empty()
    };
    let doc = doc.apply_patch(remote).unwrap();

    // the authoritative view has only the remote edit, the rendered view
    // keeps showing the in-flight local one on top of it
    assert_eq!(doc.backend_value().to_json(), json!({ "fish": "salmon" }));
    assert_eq!(
        doc.state().to_json(),
        json!({ "bird": "magpie", "fish": "salmon" })
    );
    assert_eq!(doc.in_flight_requests(), vec![1]);
}

#[test]
fn replayed_ops_whose_target_vanished_are_dropped() {
    let doc = local_doc();
    let (doc, request) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(
                Path::root().key("birds"),
                concord_frontend::Value::from_json(&json!({})),
            ))
        })
        .unwrap();
    let birds_id = doc.get_object_id(&Path::root().key("birds")).unwrap();
    let request = request.unwrap();

    // the backend acknowledges the map creation
    let ack = cp::Patch {
        actor: Some(LOCAL.into()),
        seq: Some(request.seq),
        clock: Some(cp::Clock(hashmap! { LOCAL.into() => 1 })),
        diffs: vec![
            cp::Diff::new(cp::DiffAction::CreateMap(birds_id.clone(), cp::MapType::Map)),
            cp::Diff::new(cp::DiffAction::SetMapKey(
                ObjectId::Root,
                cp::MapType::Map,
                Key::from("birds"),
                cp::ElementValue::Link(birds_id.clone()),
                None,
            )),
        ],
        ..cp::Patch::empty()
    };
    let doc = doc.apply_patch(ack).unwrap();

    // a local edit inside the map is still in flight when a remote change
    // deletes the whole map
    let (doc, _) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(
                Path::root().key("birds").key("wrens"),
                3i64,
            ))
        })
        .unwrap();
    let remote = cp::Patch {
        clock: Some(cp::Clock(hashmap! { REMOTE1.into() => 1, LOCAL.into() => 1 })),
        diffs: vec![cp::Diff::new(cp::DiffAction::RemoveMapKey(
            ObjectId::Root,
            cp::MapType::Map,
            Key::from("birds"),
        ))],
        ..cp::Patch::empty()
    };
    let doc = doc.apply_patch(remote).unwrap();
    assert_eq!(doc.state().to_json(), json!({}));
}

#[test]
fn deps_follow_the_latest_patch_minus_the_local_component() {
    let doc = local_doc();
    // get the local actor to seq 4 via four acknowledged changes
    let mut doc = doc;
    for n in 1..=4u64 {
        let (next, request) = doc
            .change(None, |d| {
                d.add_change(LocalChange::set(Path::root().key("n"), n as i64))
            })
            .unwrap();
        let ack = cp::Patch {
            actor: Some(LOCAL.into()),
            seq: Some(request.unwrap().seq),
            clock: Some(cp::Clock(hashmap! { LOCAL.into() => n })),
            ..cp::Patch::empty()
        };
        doc = next.apply_patch(ack).unwrap();
    }
    assert_eq!(doc.seq(), 4);

    let patch = cp::Patch {
        clock: Some(cp::Clock(hashmap! {
            LOCAL.into() => 4,
            REMOTE1.into() => 11,
            REMOTE2.into() => 41,
        })),
        deps: Some(cp::Clock(hashmap! {
            LOCAL.into() => 4,
            REMOTE2.into() => 41,
        })),
        diffs: vec![set_key(&ObjectId::Root, "bird", "magpie")],
        ..cp::Patch::empty()
    };
    let doc = doc.apply_patch(patch).unwrap();

    let (_, request) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(Path::root().key("partridges"), 1i64))
        })
        .unwrap();
    let request = request.unwrap();
    assert_eq!(request.seq, 5);
    assert_eq!(
        request.deps,
        cp::Clock(hashmap! { REMOTE2.into() => 41 })
    );
}

#[test]
fn patch_clock_advances_the_local_sequence() {
    let doc = local_doc();
    let patch = cp::Patch {
        clock: Some(cp::Clock(hashmap! { LOCAL.into() => 4 })),
        ..cp::Patch::empty()
    };
    let doc = doc.apply_patch(patch).unwrap();
    assert_eq!(doc.seq(), 4);

    let (_, request) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(Path::root().key("bird"), "magpie"))
        })
        .unwrap();
    assert_eq!(request.unwrap().seq, 5);
}

#[test]
fn undo_and_redo_follow_the_backend_flags() {
    let doc = local_doc();
    assert!(!doc.can_undo());
    assert_eq!(doc.undo(None).unwrap_err(), InvalidChangeRequest::CannotUndo);
    assert_eq!(doc.redo(None).unwrap_err(), InvalidChangeRequest::CannotRedo);

    let (doc, _) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(Path::root().key("bird"), "magpie"))
        })
        .unwrap();
    assert!(doc.can_undo());
    let (doc, request) = doc.undo(Some("undo the bird".into())).unwrap();
    assert_eq!(request.request_type, cp::RequestType::Undo);
    assert_eq!(request.seq, 2);
    assert!(request.ops.is_empty());
    assert_eq!(doc.in_flight_requests(), vec![1, 2]);

    let patch = cp::Patch {
        can_redo: Some(true),
        can_undo: Some(false),
        ..cp::Patch::empty()
    };
    let doc = doc.apply_patch(patch).unwrap();
    assert!(doc.can_redo());
    assert!(!doc.can_undo());
    let (_, request) = doc.redo(None).unwrap();
    assert_eq!(request.request_type, cp::RequestType::Redo);
    assert_eq!(request.seq, 3);
}

#[test]
fn round_trip_of_changes_through_backend_style_diffs() {
    // capture the ops of a series of changes, express them as the diffs a
    // backend would derive, and check a fresh document converges on the
    // same state
    let doc = local_doc();
    let (doc, r1) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(
                Path::root().key("birds"),
                concord_frontend::Value::from_json(&json!({ "wrens": 3 })),
            ))
        })
        .unwrap();
    let (doc, r2) = doc
        .change(None, |d| {
            d.add_change(LocalChange::set(Path::root().key("birds").key("sparrows"), 15i64))
        })
        .unwrap();
    let birds_id = doc.get_object_id(&Path::root().key("birds")).unwrap();

    let diffs = vec![
        cp::Diff::new(cp::DiffAction::CreateMap(birds_id.clone(), cp::MapType::Map)),
        cp::Diff::new(cp::DiffAction::SetMapKey(
            birds_id.clone(),
            cp::MapType::Map,
            Key::from("wrens"),
            cp::ElementValue::Primitive(cp::PrimitiveValue::Int(3)),
            None,
        )),
        cp::Diff::new(cp::DiffAction::SetMapKey(
            ObjectId::Root,
            cp::MapType::Map,
            Key::from("birds"),
            cp::ElementValue::Link(birds_id.clone()),
            None,
        )),
        cp::Diff::new(cp::DiffAction::SetMapKey(
            birds_id,
            cp::MapType::Map,
            Key::from("sparrows"),
            cp::ElementValue::Primitive(cp::PrimitiveValue::Int(15)),
            None,
        )),
    ];
    assert_eq!(r1.unwrap().seq, 1);
    assert_eq!(r2.unwrap().seq, 2);

    let fresh = Document::default()
        .apply_patch(cp::Patch {
            clock: Some(cp::Clock(hashmap! { LOCAL.into() => 2 })),
            diffs,
            ..cp::Patch::empty()
        })
        .unwrap();
    assert_eq!(fresh.state(), doc.state());
}
