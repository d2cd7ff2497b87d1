//! Delta capture and transactional undo/redo.
//!
//! # Responsibility
//! - Record reversible deltas for every tracked mutation.
//! - Drive commit/abort of nested scopes and the undo/redo stacks.
//!
//! # Invariants
//! - Deltas replay in strict reverse capture order; each replay turns an
//!   entry into its exact opposite-direction counterpart.
//! - Only the outermost commit contributes an undo entry; inner commits
//!   merge their deltas into the enclosing scope in capture order.
//! - A failed replay marks the document corrupted and the engine refuses
//!   every further transaction operation.

use crate::document::{AttrSlot, DocumentError, LabelArena, LabelId};
use crate::model::attribute::{Attribute, AttributeTypeId};
use crate::model::entry::Tag;

/// Token identifying one opened transaction scope.
///
/// Purely informational (logging, debugging); commit and abort always act on
/// the innermost scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionToken(pub(crate) u64);

impl TransactionToken {
    /// Serial of the scope this token was issued for.
    pub fn serial(&self) -> u64 {
        self.0
    }
}

/// One reversible record of one atomic state change.
///
/// `invert` applies the opposite change to the arena and returns the delta
/// describing what it just did, so undo and redo share one code path.
#[derive(Debug)]
pub(crate) enum Delta {
    AttributeAdded {
        label: LabelId,
        type_uuid: AttributeTypeId,
    },
    AttributeRemoved {
        label: LabelId,
        snapshot: Box<dyn Attribute>,
    },
    AttributeModified {
        label: LabelId,
        type_uuid: AttributeTypeId,
        snapshot: Box<dyn Attribute>,
    },
    AttributeForgotten {
        label: LabelId,
        type_uuid: AttributeTypeId,
    },
    AttributeRevealed {
        label: LabelId,
        type_uuid: AttributeTypeId,
    },
    LabelCreated {
        label: LabelId,
    },
    LabelRemoved {
        label: LabelId,
        parent: LabelId,
        tag: Tag,
    },
    LabelForgotten {
        label: LabelId,
    },
    LabelRevealed {
        label: LabelId,
    },
}

impl Delta {
    /// Applies the inverse change and returns its reversal record.
    ///
    /// Errors carry a replay detail string; the caller decides corruption
    /// handling.
    pub(crate) fn invert(self, arena: &mut LabelArena) -> Result<Delta, String> {
        match self {
            Delta::AttributeAdded { label, type_uuid } => {
                let node = arena
                    .node_mut(label)
                    .ok_or_else(|| format!("added attribute on unknown label {label}"))?;
                let slot = node.attributes.remove(&type_uuid).ok_or_else(|| {
                    format!("attribute {type_uuid} vanished from label {label}")
                })?;
                Ok(Delta::AttributeRemoved {
                    label,
                    snapshot: slot.value,
                })
            }
            Delta::AttributeRemoved { label, snapshot } => {
                let type_uuid = snapshot.type_uuid();
                let node = arena
                    .node_mut(label)
                    .ok_or_else(|| format!("removed attribute on unknown label {label}"))?;
                if node.attributes.contains_key(&type_uuid) {
                    return Err(format!(
                        "attribute {type_uuid} reappeared on label {label}"
                    ));
                }
                node.attributes.insert(type_uuid, AttrSlot::fresh(snapshot));
                Ok(Delta::AttributeAdded { label, type_uuid })
            }
            Delta::AttributeModified {
                label,
                type_uuid,
                snapshot,
            } => {
                let node = arena
                    .node_mut(label)
                    .ok_or_else(|| format!("modified attribute on unknown label {label}"))?;
                let slot = node.attributes.get_mut(&type_uuid).ok_or_else(|| {
                    format!("backup snapshot for {type_uuid} has no live attribute on {label}")
                })?;
                let displaced = slot.value.snapshot();
                slot.value
                    .restore(snapshot.as_ref())
                    .map_err(|err| err.to_string())?;
                slot.backed_up_in = None;
                Ok(Delta::AttributeModified {
                    label,
                    type_uuid,
                    snapshot: displaced,
                })
            }
            Delta::AttributeForgotten { label, type_uuid } => {
                let node = arena
                    .node_mut(label)
                    .ok_or_else(|| format!("forgotten attribute on unknown label {label}"))?;
                let slot = node.attributes.get_mut(&type_uuid).ok_or_else(|| {
                    format!("forgotten attribute {type_uuid} vanished from label {label}")
                })?;
                slot.forgotten = false;
                Ok(Delta::AttributeRevealed { label, type_uuid })
            }
            Delta::AttributeRevealed { label, type_uuid } => {
                let node = arena
                    .node_mut(label)
                    .ok_or_else(|| format!("revealed attribute on unknown label {label}"))?;
                let slot = node.attributes.get_mut(&type_uuid).ok_or_else(|| {
                    format!("revealed attribute {type_uuid} vanished from label {label}")
                })?;
                slot.forgotten = true;
                Ok(Delta::AttributeForgotten { label, type_uuid })
            }
            Delta::LabelCreated { label } => {
                let (parent, tag) = match arena.node(label) {
                    Some(node) => match node.parent {
                        Some(parent) => (parent, node.tag),
                        None => return Err(format!("created label {label} has no parent")),
                    },
                    None => return Err(format!("created label {label} is unknown")),
                };
                arena.detach_child(parent, label)?;
                if let Some(node) = arena.node_mut(label) {
                    node.dead = true;
                }
                Ok(Delta::LabelRemoved { label, parent, tag })
            }
            Delta::LabelRemoved { label, parent, tag } => {
                match arena.node_mut(label) {
                    Some(node) => {
                        node.dead = false;
                        node.parent = Some(parent);
                        node.tag = tag;
                    }
                    None => return Err(format!("removed label {label} is unknown")),
                }
                arena.attach_child(parent, label)?;
                Ok(Delta::LabelCreated { label })
            }
            Delta::LabelForgotten { label } => {
                let node = arena
                    .node_mut(label)
                    .ok_or_else(|| format!("forgotten label {label} is unknown"))?;
                node.flags.forgotten = false;
                Ok(Delta::LabelRevealed { label })
            }
            Delta::LabelRevealed { label } => {
                let node = arena
                    .node_mut(label)
                    .ok_or_else(|| format!("revealed label {label} is unknown"))?;
                node.flags.forgotten = true;
                Ok(Delta::LabelForgotten { label })
            }
        }
    }
}

/// One open transaction scope.
struct Scope {
    serial: u64,
    deltas: Vec<Delta>,
}

/// One committed (or undone) transaction on the history stacks.
struct HistoryEntry {
    deltas: Vec<Delta>,
}

/// Scope stack plus undo/redo history for one document.
pub(crate) struct TransactionEngine {
    scopes: Vec<Scope>,
    next_serial: u64,
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    corrupted: bool,
}

impl TransactionEngine {
    pub(crate) fn new() -> Self {
        Self {
            scopes: Vec::new(),
            next_serial: 1,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            corrupted: false,
        }
    }

    pub(crate) fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    pub(crate) fn open_depth(&self) -> usize {
        self.scopes.len()
    }

    pub(crate) fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub(crate) fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Serial of the innermost open scope, when any.
    pub(crate) fn open_scope_serial(&self) -> Option<u64> {
        self.scopes.last().map(|scope| scope.serial)
    }

    /// Appends one delta to the innermost open scope; no-op outside scopes.
    pub(crate) fn record(&mut self, delta: Delta) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.deltas.push(delta);
        }
    }

    pub(crate) fn open(&mut self) -> TransactionToken {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.scopes.push(Scope {
            serial,
            deltas: Vec::new(),
        });
        TransactionToken(serial)
    }

    /// Commits the innermost scope. Returns whether an undo entry was pushed.
    pub(crate) fn commit(&mut self) -> Result<bool, DocumentError> {
        let scope = self
            .scopes
            .pop()
            .ok_or(DocumentError::NoOpenTransaction)?;
        if let Some(enclosing) = self.scopes.last_mut() {
            enclosing.deltas.extend(scope.deltas);
            return Ok(false);
        }
        if scope.deltas.is_empty() {
            return Ok(false);
        }
        self.undo_stack.push(HistoryEntry {
            deltas: scope.deltas,
        });
        self.redo_stack.clear();
        Ok(true)
    }

    /// Aborts the innermost scope, rolling its deltas back immediately.
    pub(crate) fn abort(&mut self, arena: &mut LabelArena) -> Result<(), DocumentError> {
        let scope = self
            .scopes
            .pop()
            .ok_or(DocumentError::NoOpenTransaction)?;
        self.replay(arena, scope.deltas).map(|_| ())
    }

    pub(crate) fn undo(&mut self, arena: &mut LabelArena) -> Result<(), DocumentError> {
        if !self.scopes.is_empty() {
            return Err(DocumentError::TransactionStillOpen);
        }
        let entry = self
            .undo_stack
            .pop()
            .ok_or(DocumentError::UndoStackEmpty)?;
        let reverted = self.replay(arena, entry.deltas)?;
        self.redo_stack.push(HistoryEntry { deltas: reverted });
        Ok(())
    }

    pub(crate) fn redo(&mut self, arena: &mut LabelArena) -> Result<(), DocumentError> {
        if !self.scopes.is_empty() {
            return Err(DocumentError::TransactionStillOpen);
        }
        let entry = self
            .redo_stack
            .pop()
            .ok_or(DocumentError::RedoStackEmpty)?;
        let reapplied = self.replay(arena, entry.deltas)?;
        self.undo_stack.push(HistoryEntry { deltas: reapplied });
        Ok(())
    }

    /// Replays `deltas` in reverse capture order as one logical unit.
    ///
    /// On a mid-replay failure the applied prefix is rolled back when
    /// possible, and the engine is marked corrupted either way.
    fn replay(
        &mut self,
        arena: &mut LabelArena,
        deltas: Vec<Delta>,
    ) -> Result<Vec<Delta>, DocumentError> {
        let total = deltas.len();
        let mut inverted: Vec<Delta> = Vec::with_capacity(total);
        for (offset, delta) in deltas.into_iter().rev().enumerate() {
            match delta.invert(arena) {
                Ok(inverse) => inverted.push(inverse),
                Err(detail) => {
                    let mut rolled_back = true;
                    while let Some(applied) = inverted.pop() {
                        if applied.invert(arena).is_err() {
                            rolled_back = false;
                            break;
                        }
                    }
                    self.corrupted = true;
                    let position = total - offset;
                    return Err(DocumentError::ReplayFailed(format!(
                        "delta {position} of {total}: {detail}{}",
                        if rolled_back {
                            ""
                        } else {
                            "; prefix rollback failed"
                        }
                    )));
                }
            }
        }
        inverted.reverse();
        Ok(inverted)
    }
}
