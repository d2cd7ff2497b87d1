//! Minimal-recomputation scheduler.
//!
//! # Responsibility
//! - Re-execute exactly the functions whose inputs were touched, in an
//!   order that respects declared argument/result dependencies.
//! - Abort the whole pass, transaction-style, when no progress is possible.
//!
//! # Invariants
//! - A pass runs inside its own transaction scope; a cyclic dependency or a
//!   driver failure leaves no attribute mutated.
//! - Ordering among mutually-independent ready functions is unspecified;
//!   drivers must not rely on it.

use crate::document::{Document, DocumentError, ErrorClass, LabelId};
use crate::function::{DriverRegistry, FunctionAttribute};
use crate::model::attribute::TypedAttribute;
use crate::model::entry::Entry;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors from one recomputation pass.
#[derive(Debug)]
pub enum RecomputeError {
    /// Underlying document/transaction failure.
    Document(DocumentError),
    /// A scheduled function names a driver the registry does not know.
    DriverNotRegistered { function: Entry, driver: Uuid },
    /// A driver body reported failure; the pass was rolled back.
    DriverFailed { function: Entry, message: String },
    /// No executable function remains while some still need to run.
    CyclicDependency { remaining: Vec<Entry> },
}

impl RecomputeError {
    /// Maps this error onto the front-end error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Document(err) => err.class(),
            Self::DriverNotRegistered { .. } | Self::DriverFailed { .. } => ErrorClass::Domain,
            Self::CyclicDependency { .. } => ErrorClass::Cycle,
        }
    }
}

impl Display for RecomputeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document(err) => write!(f, "{err}"),
            Self::DriverNotRegistered { function, driver } => {
                write!(f, "function {function} names unregistered driver {driver}")
            }
            Self::DriverFailed { function, message } => {
                write!(f, "function {function} failed: {message}")
            }
            Self::CyclicDependency { remaining } => {
                write!(f, "cyclic dependency among functions: ")?;
                let mut first = true;
                for entry in remaining {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{entry}")?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}

impl Error for RecomputeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Document(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DocumentError> for RecomputeError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}

/// Summary of one successful recomputation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputeOutcome {
    /// Function labels that executed, in execution order.
    pub executed: Vec<LabelId>,
}

/// Runs one recomputation pass over the touched labels.
///
/// The pass opens its own transaction scope, so calling it outside any open
/// transaction yields exactly one undoable history entry. The impacted set
/// is cleared when the pass starts; the touched set survives the pass
/// (outputs written by drivers join it), and callers clear the logbook when
/// they are done inspecting it.
pub fn recompute(
    document: &mut Document,
    drivers: &DriverRegistry,
) -> Result<RecomputeOutcome, RecomputeError> {
    document.logbook_mut().clear_impacted();
    document.open_transaction()?;
    document.logbook_mut().start_recording();

    let result = run_pass(document, drivers);
    document.logbook_mut().stop_recording();

    match result {
        Ok(executed) => {
            document.commit_transaction()?;
            Ok(RecomputeOutcome { executed })
        }
        Err(err) => {
            document.abort_transaction()?;
            Err(err)
        }
    }
}

fn run_pass(
    document: &mut Document,
    drivers: &DriverRegistry,
) -> Result<Vec<LabelId>, RecomputeError> {
    let mut executed: Vec<LabelId> = Vec::new();
    let mut done: BTreeSet<LabelId> = BTreeSet::new();

    loop {
        let functions = collect_functions(document)?;
        let pending: Vec<&(LabelId, FunctionAttribute)> = functions
            .iter()
            .filter(|(label, function)| {
                !done.contains(label)
                    && (document.logbook().is_touched(*label)
                        || function
                            .arguments
                            .iter()
                            .any(|&argument| document.logbook().is_touched(argument)))
            })
            .collect();
        if pending.is_empty() {
            break;
        }

        let produced: BTreeSet<LabelId> = pending
            .iter()
            .flat_map(|(_, function)| function.results.iter().copied())
            .collect();
        let ready: Vec<(LabelId, FunctionAttribute)> = pending
            .iter()
            .filter(|(_, function)| {
                function
                    .arguments
                    .iter()
                    .all(|argument| !produced.contains(argument))
            })
            .map(|&entry| entry.clone())
            .collect();
        if ready.is_empty() {
            let mut remaining = Vec::with_capacity(pending.len());
            for (label, _) in pending {
                remaining.push(document.entry(*label)?);
            }
            return Err(RecomputeError::CyclicDependency { remaining });
        }

        for (label, function) in ready {
            let entry = document.entry(label)?;
            let driver =
                drivers
                    .find(function.driver)
                    .ok_or_else(|| RecomputeError::DriverNotRegistered {
                        function: entry.clone(),
                        driver: function.driver,
                    })?;
            driver
                .execute(document, label)
                .map_err(|failure| RecomputeError::DriverFailed {
                    function: entry,
                    message: failure.message,
                })?;
            for &result in &function.results {
                document.logbook_mut().set_impacted(result);
            }
            done.insert(label);
            executed.push(label);
        }
    }
    Ok(executed)
}

fn collect_functions(
    document: &Document,
) -> Result<Vec<(LabelId, FunctionAttribute)>, RecomputeError> {
    let mut functions = Vec::new();
    for label in document.live_labels() {
        if document.has_attribute(label, FunctionAttribute::TYPE_UUID) {
            let function = document.find_attribute::<FunctionAttribute>(label)?.clone();
            functions.push((label, function));
        }
    }
    Ok(functions)
}
