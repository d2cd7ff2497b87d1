use taproot_core::{Document, DocumentError, ErrorClass, IntegerAttribute, TextAttribute};

fn value_of(document: &Document, label: taproot_core::LabelId) -> i64 {
    document
        .find_attribute::<IntegerAttribute>(label)
        .expect("integer attribute present")
        .value
}

// Create a child, attach Integer=5 under T1, set 9 under T2, then walk the
// history both ways.
#[test]
fn two_transaction_scenario_round_trips() {
    let mut document = Document::new();
    let root = document.root();

    document.open_transaction().unwrap();
    let label = document.find_child(root, 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(5)))
        .unwrap();
    document.commit_transaction().unwrap();

    document.open_transaction().unwrap();
    document
        .modify_attribute::<IntegerAttribute, _>(label, |attribute| attribute.value = 9)
        .unwrap();
    document.commit_transaction().unwrap();

    assert_eq!(value_of(&document, label), 9);

    document.undo().unwrap();
    assert_eq!(value_of(&document, label), 5);

    document.undo().unwrap();
    let err = document.find_attribute::<IntegerAttribute>(label).unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert!(!document.is_alive(label));

    document.redo().unwrap();
    assert_eq!(value_of(&document, label), 5);
    document.redo().unwrap();
    assert_eq!(value_of(&document, label), 9);
}

#[test]
fn n_transactions_undo_then_redo_restore_final_state() {
    let mut document = Document::new();
    let root = document.root();
    let label = document.find_child(root, 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(0)))
        .unwrap();
    document
        .add_attribute(label, Box::new(TextAttribute::new("t0")))
        .unwrap();

    for step in 1..=4i64 {
        document.open_transaction().unwrap();
        document
            .modify_attribute::<IntegerAttribute, _>(label, |attribute| attribute.value = step)
            .unwrap();
        document
            .modify_attribute::<TextAttribute, _>(label, |attribute| {
                attribute.value = format!("t{step}")
            })
            .unwrap();
        document.commit_transaction().unwrap();
    }
    assert_eq!(document.undo_depth(), 4);

    for _ in 0..4 {
        document.undo().unwrap();
    }
    assert_eq!(value_of(&document, label), 0);
    assert_eq!(
        document.find_attribute::<TextAttribute>(label).unwrap().value,
        "t0"
    );

    for _ in 0..4 {
        document.redo().unwrap();
    }
    assert_eq!(value_of(&document, label), 4);
    assert_eq!(
        document.find_attribute::<TextAttribute>(label).unwrap().value,
        "t4"
    );
}

#[test]
fn new_commit_invalidates_redo_history() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(1)))
        .unwrap();

    for value in [2i64, 3] {
        document.open_transaction().unwrap();
        document
            .modify_attribute::<IntegerAttribute, _>(label, |attribute| attribute.value = value)
            .unwrap();
        document.commit_transaction().unwrap();
    }

    document.undo().unwrap();
    assert_eq!(document.redo_depth(), 1);

    document.open_transaction().unwrap();
    document
        .modify_attribute::<IntegerAttribute, _>(label, |attribute| attribute.value = 40)
        .unwrap();
    document.commit_transaction().unwrap();

    assert_eq!(document.redo_depth(), 0);
    let err = document.redo().unwrap_err();
    assert!(matches!(err, DocumentError::RedoStackEmpty));
    assert_eq!(err.class(), ErrorClass::Domain);
}

#[test]
fn empty_stacks_report_domain_errors() {
    let mut document = Document::new();
    assert!(matches!(
        document.undo().unwrap_err(),
        DocumentError::UndoStackEmpty
    ));
    assert!(matches!(
        document.redo().unwrap_err(),
        DocumentError::RedoStackEmpty
    ));
}

#[test]
fn structural_removal_round_trips_with_attributes() {
    let mut document = Document::new();
    let root = document.root();
    let parent = document.find_child(root, 1, true).unwrap();
    let child = document.find_child(parent, 2, true).unwrap();
    document
        .add_attribute(child, Box::new(IntegerAttribute::new(27)))
        .unwrap();

    document.open_transaction().unwrap();
    document.remove(parent, true).unwrap();
    document.commit_transaction().unwrap();
    assert!(!document.is_alive(parent));
    assert!(!document.is_alive(child));

    document.undo().unwrap();
    assert!(document.is_alive(parent));
    assert!(document.is_alive(child));
    assert_eq!(document.father(child).unwrap(), parent);
    assert_eq!(value_of(&document, child), 27);

    document.redo().unwrap();
    assert!(!document.is_alive(parent));
    assert!(!document.is_alive(child));
}

#[test]
fn forget_all_round_trips_through_undo() {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    document
        .add_attribute(label, Box::new(IntegerAttribute::new(5)))
        .unwrap();

    document.open_transaction().unwrap();
    document.forget_all(label).unwrap();
    document.commit_transaction().unwrap();
    assert!(document.flags(label).unwrap().forgotten);
    assert!(document.find_attribute::<IntegerAttribute>(label).is_err());

    document.undo().unwrap();
    assert!(!document.flags(label).unwrap().forgotten);
    assert_eq!(value_of(&document, label), 5);

    document.redo().unwrap();
    assert!(document.flags(label).unwrap().forgotten);
}
