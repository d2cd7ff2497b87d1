use taproot_core::{
    load_document, open_document_db, open_document_db_in_memory, save_document,
    AttributeFactory, Document, FunctionAttribute, IntegerAttribute, RealAttribute, ShapeBuilder,
    ShapeRef, StoreError, TextAttribute, TypedAttribute,
};
use uuid::Uuid;

fn factory() -> AttributeFactory {
    AttributeFactory::with_standard_types()
}

#[test]
fn snapshot_round_trips_tree_and_payloads() {
    let mut document = Document::new();
    let root = document.root();
    let child = document.find_child(root, 1, true).unwrap();
    let grandchild = document.find_child(child, 3, true).unwrap();
    document
        .add_attribute(child, Box::new(IntegerAttribute::new(42)))
        .unwrap();
    document
        .add_attribute(grandchild, Box::new(RealAttribute::new(2.5)))
        .unwrap();
    document
        .add_attribute(grandchild, Box::new(TextAttribute::new("fillet")))
        .unwrap();

    let mut conn = open_document_db_in_memory().unwrap();
    save_document(&document, &mut conn).unwrap();
    let loaded = load_document(&conn, &factory()).unwrap();

    let child_entry = document.entry(child).unwrap();
    let grandchild_entry = document.entry(grandchild).unwrap();
    let loaded_child = loaded.label_at(&child_entry).unwrap();
    let loaded_grandchild = loaded.label_at(&grandchild_entry).unwrap();

    assert_eq!(
        loaded
            .find_attribute::<IntegerAttribute>(loaded_child)
            .unwrap()
            .value,
        42
    );
    assert_eq!(
        loaded
            .find_attribute::<RealAttribute>(loaded_grandchild)
            .unwrap()
            .value,
        2.5
    );
    assert_eq!(
        loaded
            .find_attribute::<TextAttribute>(loaded_grandchild)
            .unwrap()
            .value,
        "fillet"
    );
    assert!(loaded.flags(loaded_child).unwrap().imported);
    assert!(loaded.flags(loaded.root()).unwrap().imported);
}

#[test]
fn label_ids_survive_save_load_with_gaps() {
    let mut document = Document::new();
    let root = document.root();
    let keep = document.find_child(root, 1, true).unwrap();
    let drop = document.find_child(root, 2, true).unwrap();
    let tail = document.find_child(root, 3, true).unwrap();
    document.remove(drop, false).unwrap();

    let mut conn = open_document_db_in_memory().unwrap();
    save_document(&document, &mut conn).unwrap();
    let loaded = load_document(&conn, &factory()).unwrap();

    // Ids are preserved, including the gap left by the removed label.
    assert_eq!(loaded.label_at(&document.entry(keep).unwrap()).unwrap(), keep);
    assert_eq!(loaded.label_at(&document.entry(tail).unwrap()).unwrap(), tail);
    assert!(!loaded.is_alive(drop));
}

#[test]
fn function_attributes_keep_their_label_references() {
    let mut document = Document::new();
    let root = document.root();
    let input = document.find_child(root, 1, true).unwrap();
    let output = document.find_child(root, 2, true).unwrap();
    let function = document.find_child(root, 10, true).unwrap();
    let driver = Uuid::from_u128(0xd0);
    document
        .add_attribute(
            function,
            Box::new(FunctionAttribute::new(driver, vec![input], vec![output])),
        )
        .unwrap();

    let mut conn = open_document_db_in_memory().unwrap();
    save_document(&document, &mut conn).unwrap();
    let loaded = load_document(&conn, &factory()).unwrap();

    let descriptor = loaded
        .find_attribute::<FunctionAttribute>(function)
        .unwrap();
    assert_eq!(descriptor.driver, driver);
    assert_eq!(descriptor.arguments, vec![input]);
    assert_eq!(descriptor.results, vec![output]);
}

#[test]
fn evolution_history_round_trips() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    let old = ShapeRef::fresh();
    let new = ShapeRef::fresh();
    let gone = ShapeRef::fresh();

    {
        let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
        builder.modified(old, new).unwrap();
    }
    {
        let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
        builder.deleted(gone).unwrap();
    }

    let mut conn = open_document_db_in_memory().unwrap();
    save_document(&document, &mut conn).unwrap();
    let loaded = load_document(&conn, &factory()).unwrap();

    let evolutions: Vec<_> =
        taproot_core::EvolutionIterator::on(&loaded, label, old).collect();
    assert_eq!(
        evolutions,
        vec![(Some(new), taproot_core::Evolution::Modified)]
    );
    let deletions: Vec<_> =
        taproot_core::EvolutionIterator::on(&loaded, label, gone).collect();
    assert_eq!(deletions, vec![(None, taproot_core::Evolution::Deleted)]);
}

#[test]
fn forgotten_tombstones_survive_persistence() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(5)))
        .unwrap();
    document
        .forget_attribute(label, IntegerAttribute::TYPE_UUID)
        .unwrap();
    document.forget_all(label).unwrap();

    let mut conn = open_document_db_in_memory().unwrap();
    save_document(&document, &mut conn).unwrap();
    let loaded = load_document(&conn, &factory()).unwrap();

    assert!(loaded.flags(label).unwrap().forgotten);
    assert!(loaded.find_attribute::<IntegerAttribute>(label).is_err());
}

// External codecs consume the (type id, ordered field list) contract; the
// field list itself must serialize cleanly.
#[test]
fn field_lists_serialize_for_external_codecs() {
    use taproot_core::{Attribute, Field};

    let attribute = IntegerAttribute::new(7);
    let json = serde_json::to_string(&attribute.fields()).unwrap();
    assert!(json.contains("\"name\":\"value\""));

    let fields: Vec<Field> = serde_json::from_str(&json).unwrap();
    let rebuilt = factory()
        .rebuild(IntegerAttribute::TYPE_UUID, &fields)
        .unwrap();
    let rebuilt = rebuilt
        .as_any()
        .downcast_ref::<IntegerAttribute>()
        .unwrap();
    assert_eq!(rebuilt.value, 7);
}

#[test]
fn empty_database_is_rejected_as_invalid() {
    let conn = open_document_db_in_memory().unwrap();
    let err = load_document(&conn, &factory()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}

#[test]
fn newer_schema_versions_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.taproot");

    {
        let mut conn = open_document_db(&path).unwrap();
        save_document(&Document::new(), &mut conn).unwrap();
        conn.pragma_update(None, "user_version", 99).unwrap();
    }

    let err = open_document_db(&path).map(|_| ()).unwrap_err();
    assert!(matches!(
        err,
        StoreError::UnsupportedSchemaVersion { db_version: 99, .. }
    ));
}

#[test]
fn save_replaces_prior_snapshot_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.taproot");

    let mut first = Document::new();
    let label = first.find_child(first.root(), 1, true).unwrap();
    first
        .add_attribute(label, Box::new(IntegerAttribute::new(1)))
        .unwrap();
    {
        let mut conn = open_document_db(&path).unwrap();
        save_document(&first, &mut conn).unwrap();
    }

    let mut second = Document::new();
    let other = second.find_child(second.root(), 9, true).unwrap();
    second
        .add_attribute(other, Box::new(IntegerAttribute::new(2)))
        .unwrap();
    {
        let mut conn = open_document_db(&path).unwrap();
        save_document(&second, &mut conn).unwrap();
    }

    let conn = open_document_db(&path).unwrap();
    let loaded = load_document(&conn, &factory()).unwrap();
    assert!(loaded.label_at(&second.entry(other).unwrap()).is_ok());
    assert!(loaded.label_at(&first.entry(label).unwrap()).is_err());
}
