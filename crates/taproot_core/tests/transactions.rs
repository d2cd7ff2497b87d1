use taproot_core::{
    Document, DocumentError, ErrorClass, IntegerAttribute, TextAttribute, TypedAttribute,
};

fn value_of(document: &Document, label: taproot_core::LabelId) -> i64 {
    document
        .find_attribute::<IntegerAttribute>(label)
        .expect("integer attribute present")
        .value
}

#[test]
fn abort_restores_attributes_exactly() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(5)))
        .unwrap();
    document
        .add_attribute(label, Box::new(TextAttribute::new("base")))
        .unwrap();

    document.open_transaction().unwrap();
    document
        .modify_attribute::<IntegerAttribute, _>(label, |attribute| attribute.value = 9)
        .unwrap();
    document
        .modify_attribute::<TextAttribute, _>(label, |attribute| {
            attribute.value = "changed".to_string()
        })
        .unwrap();
    document
        .remove_attribute(label, TextAttribute::TYPE_UUID)
        .unwrap();
    document.abort_transaction().unwrap();

    assert_eq!(value_of(&document, label), 5);
    let text = document.find_attribute::<TextAttribute>(label).unwrap();
    assert_eq!(text.value, "base");
    assert_eq!(document.undo_depth(), 0);
    assert_eq!(document.redo_depth(), 0);
}

#[test]
fn abort_rolls_back_structural_changes() {
    let mut document = Document::new();
    let root = document.root();

    document.open_transaction().unwrap();
    let child = document.find_child(root, 4, true).unwrap();
    document.abort_transaction().unwrap();

    assert!(!document.is_alive(child));
    assert_eq!(document.children(root).unwrap().count(), 0);
}

#[test]
fn nested_commit_merges_into_single_undo_entry() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(1)))
        .unwrap();

    document.open_transaction().unwrap();
    document
        .modify_attribute::<IntegerAttribute, _>(label, |attribute| attribute.value = 2)
        .unwrap();
    document.open_transaction().unwrap();
    document
        .modify_attribute::<IntegerAttribute, _>(label, |attribute| attribute.value = 3)
        .unwrap();
    assert!(!document.commit_transaction().unwrap());
    assert!(document.commit_transaction().unwrap());

    assert_eq!(document.undo_depth(), 1);
    document.undo().unwrap();
    assert_eq!(value_of(&document, label), 1);
}

#[test]
fn inner_abort_leaves_outer_changes_in_place() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(1)))
        .unwrap();

    document.open_transaction().unwrap();
    document
        .modify_attribute::<IntegerAttribute, _>(label, |attribute| attribute.value = 2)
        .unwrap();
    document.open_transaction().unwrap();
    document
        .modify_attribute::<IntegerAttribute, _>(label, |attribute| attribute.value = 7)
        .unwrap();
    document.abort_transaction().unwrap();

    assert_eq!(value_of(&document, label), 2);
    document.commit_transaction().unwrap();
    document.undo().unwrap();
    assert_eq!(value_of(&document, label), 1);
}

#[test]
fn backup_happens_once_per_scope() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(10)))
        .unwrap();

    document.open_transaction().unwrap();
    for value in [11, 12, 13] {
        document
            .modify_attribute::<IntegerAttribute, _>(label, |attribute| attribute.value = value)
            .unwrap();
    }
    document.commit_transaction().unwrap();

    document.undo().unwrap();
    assert_eq!(value_of(&document, label), 10);
    document.redo().unwrap();
    assert_eq!(value_of(&document, label), 13);
}

#[test]
fn duplicate_attribute_type_is_rejected() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(1)))
        .unwrap();

    let err = document
        .add_attribute(label, Box::new(IntegerAttribute::new(2)))
        .unwrap_err();
    assert!(matches!(err, DocumentError::DuplicateAttribute { .. }));
    assert_eq!(err.class(), ErrorClass::Domain);
    assert_eq!(value_of(&document, label), 1);
}

#[test]
fn remove_absent_attribute_is_an_error() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();

    let err = document
        .remove_attribute(label, IntegerAttribute::TYPE_UUID)
        .unwrap_err();
    assert!(matches!(err, DocumentError::AttributeNotFound { .. }));
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[test]
fn forgotten_attribute_reads_as_absent_until_undone() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(5)))
        .unwrap();

    document.open_transaction().unwrap();
    document
        .forget_attribute(label, IntegerAttribute::TYPE_UUID)
        .unwrap();
    assert!(document
        .find_attribute::<IntegerAttribute>(label)
        .is_err());
    document.commit_transaction().unwrap();

    document.undo().unwrap();
    assert_eq!(value_of(&document, label), 5);
}

#[test]
fn commit_and_abort_require_an_open_transaction() {
    let mut document = Document::new();
    assert!(matches!(
        document.commit_transaction().unwrap_err(),
        DocumentError::NoOpenTransaction
    ));
    assert!(matches!(
        document.abort_transaction().unwrap_err(),
        DocumentError::NoOpenTransaction
    ));
}

#[test]
fn undo_refuses_while_a_transaction_is_open() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(1)))
        .unwrap();
    document.open_transaction().unwrap();
    document
        .modify_attribute::<IntegerAttribute, _>(label, |attribute| attribute.value = 2)
        .unwrap();
    document.commit_transaction().unwrap();

    document.open_transaction().unwrap();
    let err = document.undo().unwrap_err();
    assert!(matches!(err, DocumentError::TransactionStillOpen));
    document.abort_transaction().unwrap();
}

#[test]
fn empty_outermost_commit_pushes_no_undo_entry() {
    let mut document = Document::new();
    document.open_transaction().unwrap();
    assert!(!document.commit_transaction().unwrap());
    assert_eq!(document.undo_depth(), 0);
}

#[test]
fn mutations_outside_transactions_are_not_undoable() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(1)))
        .unwrap();
    assert_eq!(document.undo_depth(), 0);
    let err = document.undo().unwrap_err();
    assert!(matches!(err, DocumentError::UndoStackEmpty));
}
