//! Attribute capability surface and standard payload types.
//!
//! # Responsibility
//! - Define the polymorphic attribute contract used by the label store.
//! - Ship the standard payload attributes (integer, real, text, reference).
//! - Provide the factory registry that rebuilds attributes from field lists.
//!
//! # Invariants
//! - Each concrete attribute type owns one stable 128-bit type id.
//! - `fields()` order is stable per type; external codecs rely on it.
//! - Snapshots restore only onto the same concrete type.

use crate::document::{Document, DocumentError, LabelId};
use crate::model::entry::Entry;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use uuid::Uuid;

/// Globally unique identifier of one concrete attribute type.
pub type AttributeTypeId = Uuid;

/// One typed value inside an attribute's serialized field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Int(i64),
    Real(f64),
    Text(String),
    Id(Uuid),
    /// Explicit absence slot, kept so field indices stay stable.
    None,
}

impl FieldValue {
    /// Stable kind discriminator used by the generic store codec.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Id(_) => "id",
            Self::None => "none",
        }
    }
}

/// Named entry of an attribute's ordered field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    /// Creates one named field.
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Errors from rebuilding an attribute out of a field list.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDecodeError {
    /// Field list is shorter than the type requires.
    MissingField { index: usize, name: &'static str },
    /// Field exists but carries the wrong value kind.
    WrongKind {
        index: usize,
        name: &'static str,
        expected: &'static str,
    },
    /// Field value parsed but violates the type's own rules.
    Malformed(String),
}

impl Display for FieldDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { index, name } => {
                write!(f, "missing field `{name}` at index {index}")
            }
            Self::WrongKind {
                index,
                name,
                expected,
            } => write!(f, "field `{name}` at index {index} must be {expected}"),
            Self::Malformed(message) => write!(f, "malformed attribute fields: {message}"),
        }
    }
}

impl Error for FieldDecodeError {}

/// Snapshot/restore mismatch between two concrete attribute types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMismatch {
    pub expected: AttributeTypeId,
    pub actual: AttributeTypeId,
}

impl Display for SnapshotMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "snapshot type {} does not match attribute type {}",
            self.actual, self.expected
        )
    }
}

impl Error for SnapshotMismatch {}

/// Polymorphic capability contract every label attribute implements.
///
/// The store never interprets payloads; it relies on this surface for
/// transactional backup, type lookup and generic persistence.
pub trait Attribute: Debug {
    /// Stable 128-bit type identifier.
    fn type_uuid(&self) -> AttributeTypeId;
    /// Human-readable type name for logs and errors.
    fn type_name(&self) -> &'static str;
    /// Clones the full current state into a backup value.
    fn snapshot(&self) -> Box<dyn Attribute>;
    /// Replaces the full current state from a backup value.
    fn restore(&mut self, snapshot: &dyn Attribute) -> Result<(), SnapshotMismatch>;
    /// Ordered field list consumed by the generic store codec.
    fn fields(&self) -> Vec<Field>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Statically typed attribute contract used by generic lookups and the factory.
pub trait TypedAttribute: Attribute + Sized + 'static {
    /// Stable type id shared by every instance of the type.
    const TYPE_UUID: AttributeTypeId;
    /// Human-readable type name for logs and errors.
    const TYPE_NAME: &'static str;

    /// Rebuilds one instance from its ordered field list.
    fn from_fields(fields: &[Field]) -> Result<Self, FieldDecodeError>;
}

/// Reads one integer field at a fixed index.
pub fn field_int(fields: &[Field], index: usize, name: &'static str) -> Result<i64, FieldDecodeError> {
    match fields.get(index) {
        Some(field) => match field.value {
            FieldValue::Int(value) => Ok(value),
            _ => Err(FieldDecodeError::WrongKind {
                index,
                name,
                expected: "int",
            }),
        },
        None => Err(FieldDecodeError::MissingField { index, name }),
    }
}

/// Reads one real field at a fixed index.
pub fn field_real(fields: &[Field], index: usize, name: &'static str) -> Result<f64, FieldDecodeError> {
    match fields.get(index) {
        Some(field) => match field.value {
            FieldValue::Real(value) => Ok(value),
            _ => Err(FieldDecodeError::WrongKind {
                index,
                name,
                expected: "real",
            }),
        },
        None => Err(FieldDecodeError::MissingField { index, name }),
    }
}

/// Reads one text field at a fixed index.
pub fn field_text<'a>(
    fields: &'a [Field],
    index: usize,
    name: &'static str,
) -> Result<&'a str, FieldDecodeError> {
    match fields.get(index) {
        Some(field) => match &field.value {
            FieldValue::Text(value) => Ok(value),
            _ => Err(FieldDecodeError::WrongKind {
                index,
                name,
                expected: "text",
            }),
        },
        None => Err(FieldDecodeError::MissingField { index, name }),
    }
}

/// Reads one id field at a fixed index.
pub fn field_id(fields: &[Field], index: usize, name: &'static str) -> Result<Uuid, FieldDecodeError> {
    match fields.get(index) {
        Some(field) => match field.value {
            FieldValue::Id(value) => Ok(value),
            _ => Err(FieldDecodeError::WrongKind {
                index,
                name,
                expected: "id",
            }),
        },
        None => Err(FieldDecodeError::MissingField { index, name }),
    }
}

/// Reads one optional id field (`Id` or `None`) at a fixed index.
pub fn field_opt_id(
    fields: &[Field],
    index: usize,
    name: &'static str,
) -> Result<Option<Uuid>, FieldDecodeError> {
    match fields.get(index) {
        Some(field) => match field.value {
            FieldValue::Id(value) => Ok(Some(value)),
            FieldValue::None => Ok(None),
            _ => Err(FieldDecodeError::WrongKind {
                index,
                name,
                expected: "id or none",
            }),
        },
        None => Err(FieldDecodeError::MissingField { index, name }),
    }
}

/// Integer payload attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerAttribute {
    pub value: i64,
}

impl IntegerAttribute {
    pub fn new(value: i64) -> Self {
        Self { value }
    }

    /// Attaches or updates the integer attribute on `label`.
    pub fn set(document: &mut Document, label: LabelId, value: i64) -> Result<(), DocumentError> {
        if document.has_attribute(label, Self::TYPE_UUID) {
            document.modify_attribute::<Self, _>(label, |attribute| attribute.value = value)
        } else {
            document.add_attribute(label, Box::new(Self::new(value)))
        }
    }
}

impl Attribute for IntegerAttribute {
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
        vec![Field::new("value", FieldValue::Int(self.value))]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TypedAttribute for IntegerAttribute {
    const TYPE_UUID: AttributeTypeId = Uuid::from_u128(0x7f3a_1c02_9d4e_4b1a_8e5d_02a7c1640001);
    const TYPE_NAME: &'static str = "integer";

    fn from_fields(fields: &[Field]) -> Result<Self, FieldDecodeError> {
        Ok(Self {
            value: field_int(fields, 0, "value")?,
        })
    }
}

/// Real payload attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct RealAttribute {
    pub value: f64,
}

impl RealAttribute {
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    /// Attaches or updates the real attribute on `label`.
    pub fn set(document: &mut Document, label: LabelId, value: f64) -> Result<(), DocumentError> {
        if document.has_attribute(label, Self::TYPE_UUID) {
            document.modify_attribute::<Self, _>(label, |attribute| attribute.value = value)
        } else {
            document.add_attribute(label, Box::new(Self::new(value)))
        }
    }
}

impl Attribute for RealAttribute {
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
        vec![Field::new("value", FieldValue::Real(self.value))]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TypedAttribute for RealAttribute {
    const TYPE_UUID: AttributeTypeId = Uuid::from_u128(0x7f3a_1c02_9d4e_4b1a_8e5d_02a7c1640002);
    const TYPE_NAME: &'static str = "real";

    fn from_fields(fields: &[Field]) -> Result<Self, FieldDecodeError> {
        Ok(Self {
            value: field_real(fields, 0, "value")?,
        })
    }
}

/// Text payload attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAttribute {
    pub value: String,
}

impl TextAttribute {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Attaches or updates the text attribute on `label`.
    pub fn set(
        document: &mut Document,
        label: LabelId,
        value: impl Into<String>,
    ) -> Result<(), DocumentError> {
        let value = value.into();
        if document.has_attribute(label, Self::TYPE_UUID) {
            document.modify_attribute::<Self, _>(label, |attribute| attribute.value = value)
        } else {
            document.add_attribute(label, Box::new(Self::new(value)))
        }
    }
}

impl Attribute for TextAttribute {
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
        vec![Field::new("value", FieldValue::Text(self.value.clone()))]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TypedAttribute for TextAttribute {
    const TYPE_UUID: AttributeTypeId = Uuid::from_u128(0x7f3a_1c02_9d4e_4b1a_8e5d_02a7c1640003);
    const TYPE_NAME: &'static str = "text";

    fn from_fields(fields: &[Field]) -> Result<Self, FieldDecodeError> {
        Ok(Self {
            value: field_text(fields, 0, "value")?.to_string(),
        })
    }
}

/// Label reference payload attribute.
///
/// Targets are kept as entries, not arena ids, so references survive
/// save/load and never dangle harder than a failed entry resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAttribute {
    pub target: Entry,
}

impl ReferenceAttribute {
    pub fn new(target: Entry) -> Self {
        Self { target }
    }
}

impl Attribute for ReferenceAttribute {
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
        vec![Field::new(
            "target",
            FieldValue::Text(self.target.to_string()),
        )]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TypedAttribute for ReferenceAttribute {
    const TYPE_UUID: AttributeTypeId = Uuid::from_u128(0x7f3a_1c02_9d4e_4b1a_8e5d_02a7c1640004);
    const TYPE_NAME: &'static str = "reference";

    fn from_fields(fields: &[Field]) -> Result<Self, FieldDecodeError> {
        let raw = field_text(fields, 0, "target")?;
        let target = raw
            .parse()
            .map_err(|err| FieldDecodeError::Malformed(format!("reference target: {err}")))?;
        Ok(Self { target })
    }
}

/// Attribute rebuild registry errors.
#[derive(Debug, Clone, PartialEq)]
pub enum FactoryError {
    /// Type id already has a registered builder.
    DuplicateType(AttributeTypeId),
    /// Type id has no registered builder.
    UnknownType(AttributeTypeId),
    /// Builder rejected the persisted field list.
    Decode(FieldDecodeError),
}

impl Display for FactoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateType(id) => write!(f, "attribute type already registered: {id}"),
            Self::UnknownType(id) => write!(f, "attribute type not registered: {id}"),
            Self::Decode(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FactoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Decode(err) => Some(err),
            _ => None,
        }
    }
}

type BuildFn = fn(&[Field]) -> Result<Box<dyn Attribute>, FieldDecodeError>;

fn build_typed<A: TypedAttribute>(fields: &[Field]) -> Result<Box<dyn Attribute>, FieldDecodeError> {
    A::from_fields(fields).map(|attribute| Box::new(attribute) as Box<dyn Attribute>)
}

/// Registry mapping attribute type ids to rebuild functions.
///
/// Used by the document store to reconstruct typed attributes from their
/// persisted field lists. One registry per load path; no global state.
#[derive(Default)]
pub struct AttributeFactory {
    builders: BTreeMap<AttributeTypeId, BuildFn>,
}

impl AttributeFactory {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every kernel-shipped attribute type.
    pub fn with_standard_types() -> Self {
        let mut factory = Self::new();
        factory
            .register::<IntegerAttribute>()
            .expect("fresh registry accepts integer");
        factory
            .register::<RealAttribute>()
            .expect("fresh registry accepts real");
        factory
            .register::<TextAttribute>()
            .expect("fresh registry accepts text");
        factory
            .register::<ReferenceAttribute>()
            .expect("fresh registry accepts reference");
        factory
            .register::<crate::naming::NamedShapeAttribute>()
            .expect("fresh registry accepts named shape");
        factory
            .register::<crate::function::FunctionAttribute>()
            .expect("fresh registry accepts function");
        factory
    }

    /// Registers one attribute type.
    pub fn register<A: TypedAttribute>(&mut self) -> Result<(), FactoryError> {
        if self.builders.contains_key(&A::TYPE_UUID) {
            return Err(FactoryError::DuplicateType(A::TYPE_UUID));
        }
        self.builders.insert(A::TYPE_UUID, build_typed::<A>);
        Ok(())
    }

    /// Rebuilds one attribute from its persisted field list.
    pub fn rebuild(
        &self,
        type_uuid: AttributeTypeId,
        fields: &[Field],
    ) -> Result<Box<dyn Attribute>, FactoryError> {
        let builder = self
            .builders
            .get(&type_uuid)
            .ok_or(FactoryError::UnknownType(type_uuid))?;
        builder(fields).map_err(FactoryError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AttributeFactory, Attribute, FactoryError, Field, FieldDecodeError, FieldValue,
        IntegerAttribute, ReferenceAttribute, TextAttribute, TypedAttribute,
    };

    #[test]
    fn integer_snapshot_restores_prior_value() {
        let mut attribute = IntegerAttribute::new(5);
        let backup = attribute.snapshot();
        attribute.value = 9;
        attribute.restore(backup.as_ref()).expect("same type restores");
        assert_eq!(attribute.value, 5);
    }

    #[test]
    fn restore_rejects_foreign_snapshot() {
        let mut attribute = IntegerAttribute::new(5);
        let foreign = TextAttribute::new("five").snapshot();
        let err = attribute
            .restore(foreign.as_ref())
            .expect_err("cross-type restore must fail");
        assert_eq!(err.expected, IntegerAttribute::TYPE_UUID);
        assert_eq!(err.actual, TextAttribute::TYPE_UUID);
    }

    #[test]
    fn factory_round_trips_standard_types() {
        let factory = AttributeFactory::with_standard_types();
        let original = IntegerAttribute::new(42);
        let rebuilt = factory
            .rebuild(IntegerAttribute::TYPE_UUID, &original.fields())
            .expect("registered type rebuilds");
        let rebuilt = rebuilt
            .as_any()
            .downcast_ref::<IntegerAttribute>()
            .expect("rebuilt value keeps concrete type");
        assert_eq!(rebuilt.value, 42);
    }

    #[test]
    fn factory_rejects_duplicate_and_unknown_types() {
        let mut factory = AttributeFactory::with_standard_types();
        let err = factory
            .register::<IntegerAttribute>()
            .expect_err("duplicate registration must fail");
        assert_eq!(err, FactoryError::DuplicateType(IntegerAttribute::TYPE_UUID));

        let unknown = uuid::Uuid::new_v4();
        let err = factory
            .rebuild(unknown, &[])
            .map(|_| ())
            .expect_err("unknown type must fail");
        assert_eq!(err, FactoryError::UnknownType(unknown));
    }

    #[test]
    fn reference_rebuild_validates_entry() {
        let factory = AttributeFactory::with_standard_types();
        let bad = vec![Field::new("target", FieldValue::Text("not-an-entry".into()))];
        let err = factory
            .rebuild(ReferenceAttribute::TYPE_UUID, &bad)
            .map(|_| ())
            .expect_err("malformed entry must fail");
        assert!(matches!(
            err,
            FactoryError::Decode(FieldDecodeError::Malformed(_))
        ));
    }
}
