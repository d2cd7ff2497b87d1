//! Function attributes, driver contracts and the driver registry.
//!
//! # Responsibility
//! - Describe computations attached to labels: driver id plus declared
//!   argument and result label sets.
//! - Resolve driver ids to executable bodies at recomputation time.
//!
//! # Invariants
//! - The kernel never interprets what a driver computes; it only schedules.
//! - Driver ids are stable 128-bit values, one per driver implementation.

use crate::document::{Document, LabelId};
use crate::model::attribute::{
    field_id, field_int, Attribute, AttributeTypeId, Field, FieldDecodeError, FieldValue,
    SnapshotMismatch, TypedAttribute,
};
use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub mod logbook;
pub mod recompute;

/// Computation descriptor attached to one label.
///
/// Argument and result sets are declared up front; the scheduler consults
/// them without executing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAttribute {
    /// Driver id resolved through the registry at execution time.
    pub driver: Uuid,
    /// Labels the computation reads.
    pub arguments: Vec<LabelId>,
    /// Labels the computation writes.
    pub results: Vec<LabelId>,
}

impl FunctionAttribute {
    pub fn new(driver: Uuid, arguments: Vec<LabelId>, results: Vec<LabelId>) -> Self {
        Self {
            driver,
            arguments,
            results,
        }
    }
}

impl Attribute for FunctionAttribute {
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
        let mut fields = vec![
            Field::new("driver", FieldValue::Id(self.driver)),
            Field::new("argument_count", FieldValue::Int(self.arguments.len() as i64)),
            Field::new("result_count", FieldValue::Int(self.results.len() as i64)),
        ];
        for argument in &self.arguments {
            fields.push(Field::new("argument", FieldValue::Int(i64::from(argument.raw()))));
        }
        for result in &self.results {
            fields.push(Field::new("result", FieldValue::Int(i64::from(result.raw()))));
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

impl TypedAttribute for FunctionAttribute {
    const TYPE_UUID: AttributeTypeId = Uuid::from_u128(0x7f3a_1c02_9d4e_4b1a_8e5d_02a7c1640006);
    const TYPE_NAME: &'static str = "function";

    fn from_fields(fields: &[Field]) -> Result<Self, FieldDecodeError> {
        let driver = field_id(fields, 0, "driver")?;
        let argument_count = field_int(fields, 1, "argument_count")?;
        let result_count = field_int(fields, 2, "result_count")?;
        if argument_count < 0 || result_count < 0 {
            return Err(FieldDecodeError::Malformed(
                "negative function arity".to_string(),
            ));
        }

        let mut arguments = Vec::with_capacity(argument_count as usize);
        let mut index = 3;
        for _ in 0..argument_count {
            let raw = field_int(fields, index, "argument")?;
            arguments.push(label_from_raw(raw)?);
            index += 1;
        }
        let mut results = Vec::with_capacity(result_count as usize);
        for _ in 0..result_count {
            let raw = field_int(fields, index, "result")?;
            results.push(label_from_raw(raw)?);
            index += 1;
        }
        Ok(Self {
            driver,
            arguments,
            results,
        })
    }
}

fn label_from_raw(raw: i64) -> Result<LabelId, FieldDecodeError> {
    u32::try_from(raw)
        .map(LabelId::from_raw)
        .map_err(|_| FieldDecodeError::Malformed(format!("label id out of range: {raw}")))
}

/// Failure reported by one driver body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverFailure {
    pub message: String,
}

impl DriverFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for DriverFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for DriverFailure {}

/// Executable body behind one function attribute.
///
/// Drivers read their declared arguments and write their declared results
/// through the document API; every write lands in the logbook automatically.
pub trait FunctionDriver {
    fn execute(&self, document: &mut Document, function: LabelId) -> Result<(), DriverFailure>;
}

/// Driver registration/lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverRegistryError {
    /// Driver id already has a registered body.
    DuplicateDriver(Uuid),
    /// Driver id has no registered body.
    DriverNotFound(Uuid),
}

impl Display for DriverRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateDriver(id) => write!(f, "driver already registered: {id}"),
            Self::DriverNotFound(id) => write!(f, "driver not registered: {id}"),
        }
    }
}

impl Error for DriverRegistryError {}

/// Runtime driver registry consulted by the recomputation scheduler.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<Uuid, Arc<dyn FunctionDriver>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one driver body under its stable id.
    pub fn register(
        &mut self,
        driver_id: Uuid,
        driver: Arc<dyn FunctionDriver>,
    ) -> Result<(), DriverRegistryError> {
        if self.drivers.contains_key(&driver_id) {
            return Err(DriverRegistryError::DuplicateDriver(driver_id));
        }
        self.drivers.insert(driver_id, driver);
        Ok(())
    }

    /// Looks one driver body up by id.
    pub fn find(&self, driver_id: Uuid) -> Option<Arc<dyn FunctionDriver>> {
        self.drivers.get(&driver_id).cloned()
    }
}
