//! Shape evolution tracking across recomputation passes.
//!
//! # Responsibility
//! - Record how shapes on a label evolved (created, derived, modified,
//!   deleted, selected) so dependent operations can re-resolve identity
//!   after a parametric edit.
//! - Answer "what did this shape become" queries lazily.
//!
//! # Invariants
//! - Evolution chains never cycle; the builder rejects a record that would
//!   close one.
//! - One builder appends records of one evolution kind; a fresh builder
//!   starts a fresh batch.
//! - Queries about unknown shapes yield empty sequences, never errors.

use crate::document::{Document, DocumentError, ErrorClass, LabelId};
use crate::model::attribute::{
    field_int, field_opt_id, field_text, Attribute, AttributeTypeId, Field, FieldDecodeError,
    FieldValue, SnapshotMismatch, TypedAttribute,
};
use crate::model::entry::Entry;
use crate::model::shape::ShapeRef;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// How a shape on a label came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evolution {
    /// Created fresh, no ancestor.
    Primitive,
    /// New shape derives from an old one that still exists.
    Generated,
    /// New shape replaces the old one.
    Modified,
    /// Old shape disappeared; no successor.
    Deleted,
    /// Reference by selection rather than by construction.
    Selected,
}

impl Evolution {
    /// Stable string id used by the generic store codec.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primitive => "primitive",
            Self::Generated => "generated",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Selected => "selected",
        }
    }

    /// Parses one evolution kind from its stable string id.
    pub fn parse(value: &str) -> Result<Self, FieldDecodeError> {
        match value {
            "primitive" => Ok(Self::Primitive),
            "generated" => Ok(Self::Generated),
            "modified" => Ok(Self::Modified),
            "deleted" => Ok(Self::Deleted),
            "selected" => Ok(Self::Selected),
            other => Err(FieldDecodeError::Malformed(format!(
                "unknown evolution kind: {other}"
            ))),
        }
    }
}

impl Display for Evolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One (old, new, kind) evolution triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    pub old: Option<ShapeRef>,
    pub new: Option<ShapeRef>,
    pub kind: Evolution,
}

/// Ordered evolution history attached to one label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedShapeAttribute {
    records: Vec<EvolutionRecord>,
}

impl NamedShapeAttribute {
    /// Recorded history, oldest first.
    pub fn records(&self) -> &[EvolutionRecord] {
        &self.records
    }
}

impl Attribute for NamedShapeAttribute {
    fn type_uuid(&self) -> AttributeTypeId {
        Self::TYPE_UUID
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn snapshot(&self) -> Box<dyn Attribute> {
        Box::new(self.clone())
    }

    fn restore(&mut self, snapshot: &dyn Attribute) -> Result<(), SnapshotMismatch> {
        let source = snapshot
            .as_any()
            .downcast_ref::<Self>()
            .ok_or(SnapshotMismatch {
                expected: Self::TYPE_UUID,
                actual: snapshot.type_uuid(),
            })?;
        *self = source.clone();
        Ok(())
    }

    fn fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::new(
            "record_count",
            FieldValue::Int(self.records.len() as i64),
        )];
        for record in &self.records {
            fields.push(Field::new(
                "old",
                record
                    .old
                    .map_or(FieldValue::None, |shape| FieldValue::Id(shape.uuid())),
            ));
            fields.push(Field::new(
                "new",
                record
                    .new
                    .map_or(FieldValue::None, |shape| FieldValue::Id(shape.uuid())),
            ));
            fields.push(Field::new(
                "kind",
                FieldValue::Text(record.kind.as_str().to_string()),
            ));
        }
        fields
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TypedAttribute for NamedShapeAttribute {
    const TYPE_UUID: AttributeTypeId = Uuid::from_u128(0x7f3a_1c02_9d4e_4b1a_8e5d_02a7c1640005);
    const TYPE_NAME: &'static str = "named_shape";

    fn from_fields(fields: &[Field]) -> Result<Self, FieldDecodeError> {
        let record_count = field_int(fields, 0, "record_count")?;
        if record_count < 0 {
            return Err(FieldDecodeError::Malformed(
                "negative evolution record count".to_string(),
            ));
        }

        let mut records = Vec::with_capacity(record_count as usize);
        let mut index = 1;
        for _ in 0..record_count {
            let old = field_opt_id(fields, index, "old")?.map(ShapeRef::from_uuid);
            let new = field_opt_id(fields, index + 1, "new")?.map(ShapeRef::from_uuid);
            let kind = Evolution::parse(field_text(fields, index + 2, "kind")?)?;
            records.push(EvolutionRecord { old, new, kind });
            index += 3;
        }
        Ok(Self { records })
    }
}

/// Errors from evolution recording.
#[derive(Debug)]
pub enum NamingError {
    /// Underlying document failure.
    Document(DocumentError),
    /// Old and new shape of one record are the same value.
    IdenticalShapes { label: Entry, shape: ShapeRef },
    /// Record would make a shape its own evolution descendant.
    EvolutionCycle {
        label: Entry,
        old: ShapeRef,
        new: ShapeRef,
    },
    /// Builder batch already carries a different evolution kind.
    MixedEvolution {
        label: Entry,
        batch: Evolution,
        requested: Evolution,
    },
}

impl NamingError {
    /// Maps this error onto the front-end error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Document(err) => err.class(),
            Self::IdenticalShapes { .. }
            | Self::EvolutionCycle { .. }
            | Self::MixedEvolution { .. } => ErrorClass::Domain,
        }
    }
}

impl Display for NamingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document(err) => write!(f, "{err}"),
            Self::IdenticalShapes { label, shape } => {
                write!(f, "evolution on label {label} maps shape {shape} to itself")
            }
            Self::EvolutionCycle { label, old, new } => write!(
                f,
                "evolution {old} -> {new} on label {label} would close a cycle"
            ),
            Self::MixedEvolution {
                label,
                batch,
                requested,
            } => write!(
                f,
                "builder on label {label} already records {batch} evolutions, got {requested}"
            ),
        }
    }
}

impl Error for NamingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Document(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DocumentError> for NamingError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}

/// Appends evolution records to one label's history.
///
/// Creates the named-shape attribute on first use. Every append goes
/// through the transactional mutation path, so evolution recording is
/// undoable like any other attribute change.
pub struct ShapeBuilder<'a> {
    document: &'a mut Document,
    label: LabelId,
    batch_kind: Option<Evolution>,
}

impl<'a> ShapeBuilder<'a> {
    /// Opens a builder for `label`, starting a fresh record batch.
    pub fn new(document: &'a mut Document, label: LabelId) -> Result<Self, NamingError> {
        if !document.has_attribute(label, NamedShapeAttribute::TYPE_UUID) {
            document.add_attribute(label, Box::new(NamedShapeAttribute::default()))?;
        }
        Ok(Self {
            document,
            label,
            batch_kind: None,
        })
    }

    /// Records a freshly created shape with no ancestor.
    pub fn generated(&mut self, new: ShapeRef) -> Result<(), NamingError> {
        self.push(Evolution::Primitive, None, Some(new))
    }

    /// Records a new shape derived from a surviving old one.
    pub fn generated_from(&mut self, old: ShapeRef, new: ShapeRef) -> Result<(), NamingError> {
        self.push(Evolution::Generated, Some(old), Some(new))
    }

    /// Records a shape replaced by its successor.
    pub fn modified(&mut self, old: ShapeRef, new: ShapeRef) -> Result<(), NamingError> {
        self.push(Evolution::Modified, Some(old), Some(new))
    }

    /// Records a shape that disappeared.
    pub fn deleted(&mut self, old: ShapeRef) -> Result<(), NamingError> {
        self.push(Evolution::Deleted, Some(old), None)
    }

    /// Records a selection of `shape` inside `context`.
    pub fn selected(&mut self, shape: ShapeRef, context: ShapeRef) -> Result<(), NamingError> {
        self.push(Evolution::Selected, Some(context), Some(shape))
    }

    fn push(
        &mut self,
        kind: Evolution,
        old: Option<ShapeRef>,
        new: Option<ShapeRef>,
    ) -> Result<(), NamingError> {
        if let Some(batch) = self.batch_kind {
            if batch != kind {
                return Err(NamingError::MixedEvolution {
                    label: self.document.entry(self.label)?,
                    batch,
                    requested: kind,
                });
            }
        }
        if let (Some(old), Some(new)) = (old, new) {
            if old == new {
                return Err(NamingError::IdenticalShapes {
                    label: self.document.entry(self.label)?,
                    shape: old,
                });
            }
            // Selections reference context, they do not extend the chain.
            if kind != Evolution::Selected
                && evolution_descendants(self.document, self.label, new).contains(&old)
            {
                return Err(NamingError::EvolutionCycle {
                    label: self.document.entry(self.label)?,
                    old,
                    new,
                });
            }
        }

        let record = EvolutionRecord { old, new, kind };
        self.document
            .modify_attribute::<NamedShapeAttribute, _>(self.label, |attribute| {
                attribute.records.push(record);
            })?;
        self.batch_kind = Some(kind);
        Ok(())
    }
}

/// Every shape reachable from `shape` through the label's evolution edges.
///
/// Unknown shapes and labels without history yield an empty list.
pub fn evolution_descendants(document: &Document, label: LabelId, shape: ShapeRef) -> Vec<ShapeRef> {
    let attribute = match document.find_attribute::<NamedShapeAttribute>(label) {
        Ok(attribute) => attribute,
        Err(_) => return Vec::new(),
    };

    let mut seen: BTreeSet<ShapeRef> = BTreeSet::new();
    let mut frontier = vec![shape];
    let mut reachable = Vec::new();
    while let Some(current) = frontier.pop() {
        for record in attribute.records() {
            if record.kind == Evolution::Selected {
                continue;
            }
            if record.old == Some(current) {
                if let Some(next) = record.new {
                    if seen.insert(next) {
                        reachable.push(next);
                        frontier.push(next);
                    }
                }
            }
        }
    }
    reachable
}

/// Lazy walk over the evolutions recorded against one old shape.
pub struct EvolutionIterator<'a> {
    records: &'a [EvolutionRecord],
    old: ShapeRef,
    index: usize,
}

impl<'a> EvolutionIterator<'a> {
    /// Opens the query; labels without history yield an empty sequence.
    pub fn on(document: &'a Document, label: LabelId, old: ShapeRef) -> Self {
        let records = document
            .find_attribute::<NamedShapeAttribute>(label)
            .map(|attribute| attribute.records())
            .unwrap_or(&[]);
        Self {
            records,
            old,
            index: 0,
        }
    }
}

impl Iterator for EvolutionIterator<'_> {
    type Item = (Option<ShapeRef>, Evolution);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.records.len() {
            let record = &self.records[self.index];
            self.index += 1;
            if record.old == Some(self.old) {
                return Some((record.new, record.kind));
            }
        }
        None
    }
}
