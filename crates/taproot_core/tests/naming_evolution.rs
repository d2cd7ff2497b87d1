use taproot_core::{
    evolution_descendants, Document, Evolution, EvolutionIterator, NamingError, ShapeBuilder,
    ShapeRef,
};

fn document_with_label() -> (Document, taproot_core::LabelId) {
    let mut document = Document::new();
    let label = document.find_child(document.root(), 1, true).unwrap();
    (document, label)
}

#[test]
fn builder_records_each_evolution_kind() {
    let (mut document, label) = document_with_label();
    let base = ShapeRef::fresh();
    let derived = ShapeRef::fresh();

    {
        let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
        builder.generated_from(base, derived).unwrap();
    }

    let evolutions: Vec<_> = EvolutionIterator::on(&document, label, base).collect();
    assert_eq!(evolutions, vec![(Some(derived), Evolution::Generated)]);
}

#[test]
fn primitive_records_have_no_ancestor() {
    let (mut document, label) = document_with_label();
    let shape = ShapeRef::fresh();

    {
        let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
        builder.generated(shape).unwrap();
    }

    // Nothing evolves *from* a primitive's missing ancestor.
    assert_eq!(EvolutionIterator::on(&document, label, shape).count(), 0);
    assert!(evolution_descendants(&document, label, shape).is_empty());
}

#[test]
fn deleted_records_carry_no_successor() {
    let (mut document, label) = document_with_label();
    let shape = ShapeRef::fresh();

    {
        let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
        builder.deleted(shape).unwrap();
    }

    let evolutions: Vec<_> = EvolutionIterator::on(&document, label, shape).collect();
    assert_eq!(evolutions, vec![(None, Evolution::Deleted)]);
}

#[test]
fn unknown_shapes_yield_empty_sequences() {
    let (document, label) = document_with_label();
    let stranger = ShapeRef::fresh();
    assert_eq!(EvolutionIterator::on(&document, label, stranger).count(), 0);
    assert!(evolution_descendants(&document, label, stranger).is_empty());
}

#[test]
fn chains_accumulate_across_builder_batches() {
    let (mut document, label) = document_with_label();
    let v1 = ShapeRef::fresh();
    let v2 = ShapeRef::fresh();
    let v3 = ShapeRef::fresh();

    {
        let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
        builder.modified(v1, v2).unwrap();
    }
    {
        let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
        builder.modified(v2, v3).unwrap();
    }

    let descendants = evolution_descendants(&document, label, v1);
    assert!(descendants.contains(&v2));
    assert!(descendants.contains(&v3));
    assert_eq!(descendants.len(), 2);
}

#[test]
fn identical_old_and_new_shapes_are_rejected() {
    let (mut document, label) = document_with_label();
    let shape = ShapeRef::fresh();

    let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
    let err = builder.modified(shape, shape).unwrap_err();
    assert!(matches!(err, NamingError::IdenticalShapes { .. }));
}

#[test]
fn cycles_are_rejected() {
    let (mut document, label) = document_with_label();
    let v1 = ShapeRef::fresh();
    let v2 = ShapeRef::fresh();
    let v3 = ShapeRef::fresh();

    {
        let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
        builder.modified(v1, v2).unwrap();
        builder.modified(v2, v3).unwrap();
    }

    let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
    let err = builder.modified(v3, v1).unwrap_err();
    assert!(matches!(err, NamingError::EvolutionCycle { .. }));

    // The rejected record must not have been appended.
    assert_eq!(EvolutionIterator::on(&document, label, v3).count(), 0);
}

#[test]
fn one_builder_enforces_one_evolution_kind() {
    let (mut document, label) = document_with_label();
    let a = ShapeRef::fresh();
    let b = ShapeRef::fresh();
    let c = ShapeRef::fresh();

    let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
    builder.generated_from(a, b).unwrap();
    let err = builder.modified(b, c).unwrap_err();
    assert!(matches!(
        err,
        NamingError::MixedEvolution {
            batch: Evolution::Generated,
            requested: Evolution::Modified,
            ..
        }
    ));
}

#[test]
fn selection_references_context_without_extending_the_chain() {
    let (mut document, label) = document_with_label();
    let context = ShapeRef::fresh();
    let picked = ShapeRef::fresh();

    {
        let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
        builder.selected(picked, context).unwrap();
    }

    let evolutions: Vec<_> = EvolutionIterator::on(&document, label, context).collect();
    assert_eq!(evolutions, vec![(Some(picked), Evolution::Selected)]);
    assert!(evolution_descendants(&document, label, context).is_empty());
}

#[test]
fn evolution_recording_is_transactional() {
    let (mut document, label) = document_with_label();
    let old = ShapeRef::fresh();
    let new = ShapeRef::fresh();

    document.open_transaction().unwrap();
    {
        let mut builder = ShapeBuilder::new(&mut document, label).unwrap();
        builder.modified(old, new).unwrap();
    }
    document.commit_transaction().unwrap();
    assert_eq!(EvolutionIterator::on(&document, label, old).count(), 1);

    document.undo().unwrap();
    assert_eq!(EvolutionIterator::on(&document, label, old).count(), 0);

    document.redo().unwrap();
    assert_eq!(EvolutionIterator::on(&document, label, old).count(), 1);
}
