use taproot_core::{Document, DocumentError, Entry, ErrorClass};

#[test]
fn root_is_always_available() {
    let document = Document::new();
    let root = document.root();
    assert!(document.is_root(root).unwrap());
    assert_eq!(document.tag(root).unwrap(), 0);
    assert_eq!(document.depth(root).unwrap(), 0);
    assert_eq!(document.entry(root).unwrap(), Entry::root());
}

#[test]
fn father_of_root_fails() {
    let document = Document::new();
    let err = document.father(document.root()).unwrap_err();
    assert!(matches!(err, DocumentError::RootHasNoFather));
    assert_eq!(err.class(), ErrorClass::Domain);
}

#[test]
fn find_child_without_create_reports_not_found() {
    let mut document = Document::new();
    let err = document
        .find_child(document.root(), 7, false)
        .unwrap_err();
    assert!(matches!(err, DocumentError::ChildNotFound { tag: 7, .. }));
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[test]
fn find_child_creates_and_is_idempotent() {
    let mut document = Document::new();
    let root = document.root();

    let child = document.find_child(root, 3, true).unwrap();
    assert!(document.flags(child).unwrap().new);
    assert!(document.flags(root).unwrap().modified);
    assert_eq!(document.tag(child).unwrap(), 3);
    assert_eq!(document.depth(child).unwrap(), 1);
    assert_eq!(document.father(child).unwrap(), root);

    let again = document.find_child(root, 3, true).unwrap();
    assert_eq!(again, child);
}

#[test]
fn children_iterate_in_tag_ascending_order() {
    let mut document = Document::new();
    let root = document.root();

    // Created out of order on purpose.
    document.find_child(root, 5, true).unwrap();
    document.find_child(root, 1, true).unwrap();
    document.find_child(root, 3, true).unwrap();

    let tags: Vec<u32> = document
        .children(root)
        .unwrap()
        .map(|child| document.tag(child).unwrap())
        .collect();
    assert_eq!(tags, vec![1, 3, 5]);

    // Restartable: a second walk sees the same sequence.
    let again: Vec<u32> = document
        .children(root)
        .unwrap()
        .map(|child| document.tag(child).unwrap())
        .collect();
    assert_eq!(again, tags);
}

#[test]
fn entries_round_trip_through_label_at() {
    let mut document = Document::new();
    let root = document.root();
    let child = document.find_child(root, 1, true).unwrap();
    let grandchild = document.find_child(child, 3, true).unwrap();

    let entry = document.entry(grandchild).unwrap();
    assert_eq!(entry.to_string(), "0:1:3");
    assert_eq!(document.label_at(&entry).unwrap(), grandchild);

    let missing: Entry = "0:1:9".parse().unwrap();
    let err = document.label_at(&missing).unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[test]
fn remove_refuses_live_children_without_recursive_flag() {
    let mut document = Document::new();
    let root = document.root();
    let parent = document.find_child(root, 1, true).unwrap();
    document.find_child(parent, 2, true).unwrap();

    let err = document.remove(parent, false).unwrap_err();
    assert!(matches!(err, DocumentError::LabelHasChildren(_)));
    assert_eq!(err.class(), ErrorClass::Domain);

    document.remove(parent, true).unwrap();
    assert!(!document.is_alive(parent));
}

#[test]
fn dead_label_ids_resolve_to_not_found() {
    let mut document = Document::new();
    let root = document.root();
    let child = document.find_child(root, 1, true).unwrap();
    document.remove(child, false).unwrap();

    let err = document.tag(child).unwrap_err();
    assert!(matches!(err, DocumentError::LabelNotFound(_)));
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert_eq!(document.children(root).unwrap().count(), 0);
}

#[test]
fn root_cannot_be_removed() {
    let mut document = Document::new();
    let err = document.remove(document.root(), true).unwrap_err();
    assert!(matches!(err, DocumentError::CannotRemoveRoot));
}

#[test]
fn forget_all_tombstones_subtree_but_keeps_it_addressable() {
    let mut document = Document::new();
    let root = document.root();
    let parent = document.find_child(root, 1, true).unwrap();
    let child = document.find_child(parent, 2, true).unwrap();

    document.forget_all(parent).unwrap();
    assert!(document.flags(parent).unwrap().forgotten);
    assert!(document.flags(child).unwrap().forgotten);
    assert!(document.is_alive(parent));
    assert_eq!(document.tag(child).unwrap(), 2);
}
