//! In-memory document: label tree and per-label attribute store.
//!
//! # Responsibility
//! - Own the arena of labels and every attribute attached to them.
//! - Funnel all mutation through the transactional backup rule.
//! - Keep tree invariants (tag-ascending siblings, stable label ids).
//!
//! # Invariants
//! - Label ids are arena indices; slots are never reused, so a dead id
//!   resolves to `LabelNotFound` instead of dangling.
//! - At most one attribute per type id per label.
//! - The first mutation of an attribute inside an open transaction scope
//!   snapshots its prior state before the mutation applies.

use crate::function::logbook::Logbook;
use crate::model::attribute::{Attribute, AttributeTypeId, TypedAttribute};
use crate::model::entry::{Entry, Tag};
use crate::transaction::{Delta, TransactionEngine, TransactionToken};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier of one label inside one document.
///
/// Ids are document-scoped; two documents never share label ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub(crate) u32);

impl LabelId {
    pub(crate) fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl Display for LabelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-label bookkeeping flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelFlags {
    /// Label was created during the current editing session.
    pub new: bool,
    /// Label structure (children) changed.
    pub modified: bool,
    /// An attribute on the label was added, removed or mutated.
    pub attribute_modified: bool,
    /// Label is tombstoned but still addressable.
    pub forgotten: bool,
    /// Label was rebuilt from a persisted document.
    pub imported: bool,
}

impl LabelFlags {
    /// Packs flags into the store's integer column shape.
    pub fn to_bits(self) -> i64 {
        let mut bits = 0;
        if self.new {
            bits |= 1;
        }
        if self.modified {
            bits |= 1 << 1;
        }
        if self.attribute_modified {
            bits |= 1 << 2;
        }
        if self.forgotten {
            bits |= 1 << 3;
        }
        if self.imported {
            bits |= 1 << 4;
        }
        bits
    }

    /// Unpacks flags from the store's integer column shape.
    pub fn from_bits(bits: i64) -> Self {
        Self {
            new: bits & 1 != 0,
            modified: bits & (1 << 1) != 0,
            attribute_modified: bits & (1 << 2) != 0,
            forgotten: bits & (1 << 3) != 0,
            imported: bits & (1 << 4) != 0,
        }
    }
}

/// Error classes mirrored 1:1 onto front-end exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Requested label/attribute does not exist; caller decides fallback.
    NotFound,
    /// Operation violates a structural invariant; state is unchanged.
    Domain,
    /// Dependency graph cannot make progress.
    Cycle,
    /// Replay hit inconsistent state; document needs a reload.
    Corruption,
}

/// Errors from document tree, attribute and transaction operations.
#[derive(Debug)]
pub enum DocumentError {
    /// Label id does not resolve to a live label.
    LabelNotFound(LabelId),
    /// No child with the requested tag under the parent.
    ChildNotFound { parent: Entry, tag: Tag },
    /// No label at the requested entry.
    EntryNotFound(Entry),
    /// Root label has no father.
    RootHasNoFather,
    /// Root label cannot be structurally removed.
    CannotRemoveRoot,
    /// Label still has attached children; pass the recursive flag.
    LabelHasChildren(Entry),
    /// No attribute of the requested type on the label.
    AttributeNotFound { label: Entry, type_name: String },
    /// An attribute of the same type already sits on the label.
    DuplicateAttribute { label: Entry, type_name: String },
    /// Attribute exists but its concrete type differs from the request.
    AttributeTypeMismatch { label: Entry, expected: &'static str },
    /// Commit/abort called with no open transaction.
    NoOpenTransaction,
    /// Undo/redo called while a transaction is still open.
    TransactionStillOpen,
    /// Undo called on an empty undo stack.
    UndoStackEmpty,
    /// Redo called on an empty redo stack.
    RedoStackEmpty,
    /// Document was marked corrupted by a failed replay.
    Corrupted,
    /// Delta replay hit inconsistent state; document is now corrupted.
    ReplayFailed(String),
}

impl DocumentError {
    /// Maps this error onto the front-end error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::LabelNotFound(_)
            | Self::ChildNotFound { .. }
            | Self::EntryNotFound(_)
            | Self::AttributeNotFound { .. } => ErrorClass::NotFound,
            Self::RootHasNoFather
            | Self::CannotRemoveRoot
            | Self::LabelHasChildren(_)
            | Self::DuplicateAttribute { .. }
            | Self::AttributeTypeMismatch { .. }
            | Self::NoOpenTransaction
            | Self::TransactionStillOpen
            | Self::UndoStackEmpty
            | Self::RedoStackEmpty => ErrorClass::Domain,
            Self::Corrupted | Self::ReplayFailed(_) => ErrorClass::Corruption,
        }
    }
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LabelNotFound(id) => write!(f, "label not found: {id}"),
            Self::ChildNotFound { parent, tag } => {
                write!(f, "no child with tag {tag} under label {parent}")
            }
            Self::EntryNotFound(entry) => write!(f, "no label at entry {entry}"),
            Self::RootHasNoFather => write!(f, "root label has no father"),
            Self::CannotRemoveRoot => write!(f, "root label cannot be removed"),
            Self::LabelHasChildren(entry) => {
                write!(
                    f,
                    "label {entry} still has children; removal needs the recursive flag"
                )
            }
            Self::AttributeNotFound { label, type_name } => {
                write!(f, "no {type_name} attribute on label {label}")
            }
            Self::DuplicateAttribute { label, type_name } => {
                write!(f, "label {label} already carries a {type_name} attribute")
            }
            Self::AttributeTypeMismatch { label, expected } => {
                write!(f, "attribute on label {label} is not a {expected}")
            }
            Self::NoOpenTransaction => write!(f, "no transaction is open"),
            Self::TransactionStillOpen => {
                write!(
                    f,
                    "undo/redo requires every transaction to be committed or aborted"
                )
            }
            Self::UndoStackEmpty => write!(f, "nothing to undo"),
            Self::RedoStackEmpty => write!(f, "nothing to redo"),
            Self::Corrupted => {
                write!(f, "document is corrupted; reload it from its last saved state")
            }
            Self::ReplayFailed(detail) => write!(f, "delta replay failed: {detail}"),
        }
    }
}

impl Error for DocumentError {}

/// One attribute slot on a label.
pub(crate) struct AttrSlot {
    pub(crate) value: Box<dyn Attribute>,
    pub(crate) forgotten: bool,
    /// Transaction scope serial of the latest backup snapshot.
    pub(crate) backed_up_in: Option<u64>,
}

impl AttrSlot {
    pub(crate) fn fresh(value: Box<dyn Attribute>) -> Self {
        Self {
            value,
            forgotten: false,
            backed_up_in: None,
        }
    }
}

/// One label node inside the arena.
pub(crate) struct LabelNode {
    pub(crate) tag: Tag,
    pub(crate) parent: Option<LabelId>,
    pub(crate) children: Vec<LabelId>,
    pub(crate) attributes: BTreeMap<AttributeTypeId, AttrSlot>,
    pub(crate) flags: LabelFlags,
    pub(crate) dead: bool,
}

impl LabelNode {
    fn new(tag: Tag, parent: Option<LabelId>) -> Self {
        Self {
            tag,
            parent,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            flags: LabelFlags::default(),
            dead: false,
        }
    }
}

/// Arena owning every label node of one document.
///
/// Slots are append-only; structural removal marks a node dead and detaches
/// it, keeping every historical id resolvable for delta replay.
pub(crate) struct LabelArena {
    nodes: Vec<LabelNode>,
}

impl LabelArena {
    fn new() -> Self {
        Self {
            nodes: vec![LabelNode::new(0, None)],
        }
    }

    pub(crate) fn node(&self, label: LabelId) -> Option<&LabelNode> {
        self.nodes.get(label.0 as usize)
    }

    pub(crate) fn node_mut(&mut self, label: LabelId) -> Option<&mut LabelNode> {
        self.nodes.get_mut(label.0 as usize)
    }

    pub(crate) fn alive(&self, label: LabelId) -> Result<&LabelNode, DocumentError> {
        self.node(label)
            .filter(|node| !node.dead)
            .ok_or(DocumentError::LabelNotFound(label))
    }

    pub(crate) fn alive_mut(&mut self, label: LabelId) -> Result<&mut LabelNode, DocumentError> {
        match self.nodes.get_mut(label.0 as usize) {
            Some(node) if !node.dead => Ok(node),
            _ => Err(DocumentError::LabelNotFound(label)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn new_node(&mut self, parent: LabelId, tag: Tag) -> LabelId {
        let id = LabelId(self.nodes.len() as u32);
        self.nodes.push(LabelNode::new(tag, Some(parent)));
        id
    }

    /// Appends a dead placeholder node; used by the store to preserve id gaps.
    pub(crate) fn new_placeholder(&mut self) -> LabelId {
        let id = LabelId(self.nodes.len() as u32);
        let mut node = LabelNode::new(0, None);
        node.dead = true;
        self.nodes.push(node);
        id
    }

    pub(crate) fn tag_of(&self, label: LabelId) -> Option<Tag> {
        self.node(label).map(|node| node.tag)
    }

    pub(crate) fn child_by_tag(&self, parent: LabelId, tag: Tag) -> Option<LabelId> {
        let parent_node = self.node(parent)?;
        parent_node
            .children
            .iter()
            .copied()
            .find(|&child| self.tag_of(child) == Some(tag))
    }

    /// Inserts `child` into its parent's tag-ascending child list.
    pub(crate) fn attach_child(&mut self, parent: LabelId, child: LabelId) -> Result<(), String> {
        let child_tag = self
            .tag_of(child)
            .ok_or_else(|| format!("attach of unknown label {child}"))?;
        let parent_node = self
            .node(parent)
            .ok_or_else(|| format!("attach under unknown label {parent}"))?;

        let mut position = parent_node.children.len();
        for (index, &sibling) in parent_node.children.iter().enumerate() {
            if self.tag_of(sibling).is_some_and(|tag| tag > child_tag) {
                position = index;
                break;
            }
        }

        match self.node_mut(parent) {
            Some(node) => {
                node.children.insert(position, child);
                Ok(())
            }
            None => Err(format!("attach under unknown label {parent}")),
        }
    }

    pub(crate) fn detach_child(&mut self, parent: LabelId, child: LabelId) -> Result<(), String> {
        let parent_node = self
            .node_mut(parent)
            .ok_or_else(|| format!("detach under unknown label {parent}"))?;
        let position = parent_node
            .children
            .iter()
            .position(|&candidate| candidate == child)
            .ok_or_else(|| format!("label {child} is not attached under {parent}"))?;
        parent_node.children.remove(position);
        Ok(())
    }

    pub(crate) fn entry_of(&self, label: LabelId) -> Result<Entry, DocumentError> {
        let mut tags = Vec::new();
        let mut cursor = label;
        loop {
            let node = self
                .node(cursor)
                .ok_or(DocumentError::LabelNotFound(label))?;
            tags.push(node.tag);
            match node.parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        tags.reverse();

        let mut entry = Entry::root();
        for &tag in &tags[1..] {
            entry = entry.child(tag);
        }
        Ok(entry)
    }

    /// Best-effort entry for error messages; falls back to the raw id.
    pub(crate) fn entry_for_message(&self, label: LabelId) -> Entry {
        self.entry_of(label).unwrap_or_else(|_| Entry::root())
    }
}

/// Lazy, restartable iteration over one label's attached children.
pub struct Children<'a> {
    ids: std::slice::Iter<'a, LabelId>,
}

impl Iterator for Children<'_> {
    type Item = LabelId;

    fn next(&mut self) -> Option<LabelId> {
        self.ids.next().copied()
    }
}

/// One in-memory document: label tree, attributes, transactions, logbook.
///
/// All entry points take the document explicitly; there is no process-global
/// session state. Multiple documents may coexist but never share labels.
pub struct Document {
    pub(crate) arena: LabelArena,
    pub(crate) txn: TransactionEngine,
    pub(crate) logbook: Logbook,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document holding only the root label.
    pub fn new() -> Self {
        Self {
            arena: LabelArena::new(),
            txn: TransactionEngine::new(),
            logbook: Logbook::new(),
        }
    }

    /// Returns the root label. Never fails.
    pub fn root(&self) -> LabelId {
        LabelId(0)
    }

    /// Returns whether the label resolves to a live node.
    pub fn is_alive(&self, label: LabelId) -> bool {
        self.arena.alive(label).is_ok()
    }

    /// Returns the child with `tag`, creating it when asked to.
    ///
    /// Creation marks the child new, the parent modified, and records a
    /// structural delta when a transaction is open.
    pub fn find_child(
        &mut self,
        parent: LabelId,
        tag: Tag,
        create_if_absent: bool,
    ) -> Result<LabelId, DocumentError> {
        self.arena.alive(parent)?;
        if let Some(child) = self.arena.child_by_tag(parent, tag) {
            return Ok(child);
        }
        if !create_if_absent {
            return Err(DocumentError::ChildNotFound {
                parent: self.arena.entry_for_message(parent),
                tag,
            });
        }
        self.ensure_mutable()?;

        let child = self.arena.new_node(parent, tag);
        self.arena
            .attach_child(parent, child)
            .map_err(DocumentError::ReplayFailed)?;
        if let Some(node) = self.arena.node_mut(child) {
            node.flags.new = true;
        }
        if let Some(node) = self.arena.node_mut(parent) {
            node.flags.modified = true;
        }
        self.txn.record(Delta::LabelCreated { label: child });
        Ok(child)
    }

    /// Returns the father label; fails on the root.
    pub fn father(&self, label: LabelId) -> Result<LabelId, DocumentError> {
        let node = self.arena.alive(label)?;
        node.parent.ok_or(DocumentError::RootHasNoFather)
    }

    /// Returns whether the label is the root.
    pub fn is_root(&self, label: LabelId) -> Result<bool, DocumentError> {
        Ok(self.arena.alive(label)?.parent.is_none())
    }

    /// Returns the label's own tag.
    pub fn tag(&self, label: LabelId) -> Result<Tag, DocumentError> {
        Ok(self.arena.alive(label)?.tag)
    }

    /// Returns distance from the root (root has depth 0).
    pub fn depth(&self, label: LabelId) -> Result<u32, DocumentError> {
        self.arena.alive(label)?;
        let mut depth = 0;
        let mut cursor = label;
        while let Some(parent) = self.arena.node(cursor).and_then(|node| node.parent) {
            depth += 1;
            cursor = parent;
        }
        Ok(depth)
    }

    /// Returns the dotted entry addressing the label.
    pub fn entry(&self, label: LabelId) -> Result<Entry, DocumentError> {
        self.arena.alive(label)?;
        self.arena.entry_of(label)
    }

    /// Resolves an entry to a live label.
    pub fn label_at(&self, entry: &Entry) -> Result<LabelId, DocumentError> {
        let mut cursor = self.root();
        for &tag in entry.tags_below_root() {
            cursor = self
                .arena
                .child_by_tag(cursor, tag)
                .ok_or_else(|| DocumentError::EntryNotFound(entry.clone()))?;
        }
        self.arena.alive(cursor)?;
        Ok(cursor)
    }

    /// Iterates attached children in tag-ascending order.
    pub fn children(&self, label: LabelId) -> Result<Children<'_>, DocumentError> {
        let node = self.arena.alive(label)?;
        Ok(Children {
            ids: node.children.iter(),
        })
    }

    /// Returns a copy of the label's bookkeeping flags.
    pub fn flags(&self, label: LabelId) -> Result<LabelFlags, DocumentError> {
        Ok(self.arena.alive(label)?.flags)
    }

    /// Tombstones a label subtree and all its attributes.
    ///
    /// Reversible while a transaction is open; the subtree stays addressable.
    pub fn forget_all(&mut self, label: LabelId) -> Result<(), DocumentError> {
        self.arena.alive(label)?;
        self.ensure_mutable()?;

        for target in self.subtree_preorder(label) {
            let node = match self.arena.node(target) {
                Some(node) => node,
                None => continue,
            };
            if !node.flags.forgotten {
                if let Some(node) = self.arena.node_mut(target) {
                    node.flags.forgotten = true;
                }
                self.txn.record(Delta::LabelForgotten { label: target });
            }

            let types: Vec<AttributeTypeId> = match self.arena.node(target) {
                Some(node) => node
                    .attributes
                    .iter()
                    .filter(|(_, slot)| !slot.forgotten)
                    .map(|(&type_uuid, _)| type_uuid)
                    .collect(),
                None => Vec::new(),
            };
            for type_uuid in types {
                if let Some(slot) = self
                    .arena
                    .node_mut(target)
                    .and_then(|node| node.attributes.get_mut(&type_uuid))
                {
                    slot.forgotten = true;
                }
                self.txn.record(Delta::AttributeForgotten {
                    label: target,
                    type_uuid,
                });
                self.note_attribute_change(target);
            }
        }
        Ok(())
    }

    /// Structurally removes a label; fails on attached children unless recursive.
    pub fn remove(&mut self, label: LabelId, recursive: bool) -> Result<(), DocumentError> {
        let node = self.arena.alive(label)?;
        if node.parent.is_none() {
            return Err(DocumentError::CannotRemoveRoot);
        }
        if !node.children.is_empty() && !recursive {
            return Err(DocumentError::LabelHasChildren(
                self.arena.entry_for_message(label),
            ));
        }
        self.ensure_mutable()?;

        // Children first so undo revives parents before reattaching children.
        let mut order = self.subtree_preorder(label);
        order.reverse();
        for target in order {
            let (parent, tag) = match self.arena.node(target) {
                Some(node) => match node.parent {
                    Some(parent) => (parent, node.tag),
                    None => continue,
                },
                None => continue,
            };
            self.arena
                .detach_child(parent, target)
                .map_err(DocumentError::ReplayFailed)?;
            if let Some(node) = self.arena.node_mut(target) {
                node.dead = true;
            }
            if let Some(node) = self.arena.node_mut(parent) {
                node.flags.modified = true;
            }
            self.txn.record(Delta::LabelRemoved {
                label: target,
                parent,
                tag,
            });
        }
        Ok(())
    }

    /// Attaches one attribute; at most one per type per label.
    pub fn add_attribute(
        &mut self,
        label: LabelId,
        attribute: Box<dyn Attribute>,
    ) -> Result<(), DocumentError> {
        self.arena.alive(label)?;
        self.ensure_mutable()?;
        let type_uuid = attribute.type_uuid();
        let type_name = attribute.type_name();

        let node = self.arena.alive_mut(label)?;
        if node.attributes.contains_key(&type_uuid) {
            let entry = self.arena.entry_for_message(label);
            return Err(DocumentError::DuplicateAttribute {
                label: entry,
                type_name: type_name.to_string(),
            });
        }
        node.attributes.insert(type_uuid, AttrSlot::fresh(attribute));
        self.txn.record(Delta::AttributeAdded { label, type_uuid });
        self.note_attribute_change(label);
        Ok(())
    }

    /// Finds one attribute by concrete type.
    pub fn find_attribute<A: TypedAttribute>(&self, label: LabelId) -> Result<&A, DocumentError> {
        let node = self.arena.alive(label)?;
        let slot = node
            .attributes
            .get(&A::TYPE_UUID)
            .filter(|slot| !slot.forgotten)
            .ok_or_else(|| DocumentError::AttributeNotFound {
                label: self.arena.entry_for_message(label),
                type_name: A::TYPE_NAME.to_string(),
            })?;
        slot.value
            .as_any()
            .downcast_ref::<A>()
            .ok_or_else(|| DocumentError::AttributeTypeMismatch {
                label: self.arena.entry_for_message(label),
                expected: A::TYPE_NAME,
            })
    }

    /// Finds one attribute by raw type id.
    pub fn find_attribute_raw(
        &self,
        label: LabelId,
        type_uuid: AttributeTypeId,
    ) -> Result<&dyn Attribute, DocumentError> {
        let node = self.arena.alive(label)?;
        let slot = node
            .attributes
            .get(&type_uuid)
            .filter(|slot| !slot.forgotten)
            .ok_or_else(|| DocumentError::AttributeNotFound {
                label: self.arena.entry_for_message(label),
                type_name: type_uuid.to_string(),
            })?;
        Ok(slot.value.as_ref())
    }

    /// Returns whether the label carries a live attribute of the type.
    pub fn has_attribute(&self, label: LabelId, type_uuid: AttributeTypeId) -> bool {
        self.arena
            .alive(label)
            .ok()
            .and_then(|node| node.attributes.get(&type_uuid))
            .is_some_and(|slot| !slot.forgotten)
    }

    /// Detaches one attribute. Removing an absent attribute is an error.
    pub fn remove_attribute(
        &mut self,
        label: LabelId,
        type_uuid: AttributeTypeId,
    ) -> Result<(), DocumentError> {
        self.arena.alive(label)?;
        self.ensure_mutable()?;

        let node = self.arena.alive_mut(label)?;
        let present = node
            .attributes
            .get(&type_uuid)
            .is_some_and(|slot| !slot.forgotten);
        if !present {
            let entry = self.arena.entry_for_message(label);
            return Err(DocumentError::AttributeNotFound {
                label: entry,
                type_name: type_uuid.to_string(),
            });
        }

        let slot = match self
            .arena
            .node_mut(label)
            .and_then(|node| node.attributes.remove(&type_uuid))
        {
            Some(slot) => slot,
            None => return Err(DocumentError::LabelNotFound(label)),
        };
        self.txn.record(Delta::AttributeRemoved {
            label,
            snapshot: slot.value,
        });
        self.note_attribute_change(label);
        Ok(())
    }

    /// Tombstones one attribute; it stays addressable for delta replay.
    pub fn forget_attribute(
        &mut self,
        label: LabelId,
        type_uuid: AttributeTypeId,
    ) -> Result<(), DocumentError> {
        self.arena.alive(label)?;
        self.ensure_mutable()?;

        let node = self.arena.alive_mut(label)?;
        match node.attributes.get_mut(&type_uuid) {
            Some(slot) if !slot.forgotten => {
                slot.forgotten = true;
            }
            _ => {
                let entry = self.arena.entry_for_message(label);
                return Err(DocumentError::AttributeNotFound {
                    label: entry,
                    type_name: type_uuid.to_string(),
                });
            }
        }
        self.txn.record(Delta::AttributeForgotten { label, type_uuid });
        self.note_attribute_change(label);
        Ok(())
    }

    /// Mutates one attribute under the copy-on-first-write backup rule.
    ///
    /// The first mutation inside an open transaction scope snapshots the
    /// attribute's prior state; later mutations in the same scope do not.
    pub fn modify_attribute<A: TypedAttribute, T>(
        &mut self,
        label: LabelId,
        mutate: impl FnOnce(&mut A) -> T,
    ) -> Result<T, DocumentError> {
        self.arena.alive(label)?;
        self.ensure_mutable()?;
        let scope = self.txn.open_scope_serial();

        let entry = self.arena.entry_for_message(label);
        let node = self.arena.alive_mut(label)?;
        let slot = node
            .attributes
            .get_mut(&A::TYPE_UUID)
            .filter(|slot| !slot.forgotten)
            .ok_or_else(|| DocumentError::AttributeNotFound {
                label: entry.clone(),
                type_name: A::TYPE_NAME.to_string(),
            })?;

        let backup = match scope {
            Some(serial) if slot.backed_up_in != Some(serial) => {
                let snapshot = slot.value.snapshot();
                slot.backed_up_in = Some(serial);
                Some(snapshot)
            }
            _ => None,
        };

        let attribute = slot
            .value
            .as_any_mut()
            .downcast_mut::<A>()
            .ok_or(DocumentError::AttributeTypeMismatch {
                label: entry,
                expected: A::TYPE_NAME,
            })?;
        let out = mutate(attribute);

        if let Some(snapshot) = backup {
            self.txn.record(Delta::AttributeModified {
                label,
                type_uuid: A::TYPE_UUID,
                snapshot,
            });
        }
        self.note_attribute_change(label);
        Ok(out)
    }

    /// Opens a new transaction scope and returns its token.
    pub fn open_transaction(&mut self) -> Result<TransactionToken, DocumentError> {
        self.ensure_mutable()?;
        Ok(self.txn.open())
    }

    /// Commits the innermost scope; returns whether an undo entry was pushed.
    ///
    /// Nested commits merge deltas into the enclosing scope; only the
    /// outermost commit contributes to the undo history.
    pub fn commit_transaction(&mut self) -> Result<bool, DocumentError> {
        self.ensure_mutable()?;
        self.txn.commit()
    }

    /// Aborts the innermost scope, rolling back every captured delta.
    pub fn abort_transaction(&mut self) -> Result<(), DocumentError> {
        self.ensure_mutable()?;
        self.txn.abort(&mut self.arena)
    }

    /// Reverts the most recent committed transaction.
    pub fn undo(&mut self) -> Result<(), DocumentError> {
        self.ensure_mutable()?;
        self.txn.undo(&mut self.arena)
    }

    /// Re-applies the most recently undone transaction.
    pub fn redo(&mut self) -> Result<(), DocumentError> {
        self.ensure_mutable()?;
        self.txn.redo(&mut self.arena)
    }

    /// Number of committed transactions available to undo.
    pub fn undo_depth(&self) -> usize {
        self.txn.undo_depth()
    }

    /// Number of undone transactions available to redo.
    pub fn redo_depth(&self) -> usize {
        self.txn.redo_depth()
    }

    /// Returns whether any transaction scope is open.
    pub fn has_open_transaction(&self) -> bool {
        self.txn.open_depth() > 0
    }

    /// Returns whether a failed replay marked the document corrupted.
    pub fn is_corrupted(&self) -> bool {
        self.txn.is_corrupted()
    }

    /// Read access to the recomputation logbook.
    pub fn logbook(&self) -> &Logbook {
        &self.logbook
    }

    /// Write access to the recomputation logbook.
    pub fn logbook_mut(&mut self) -> &mut Logbook {
        &mut self.logbook
    }

    /// Every live label id, in arena order. Used by the store and the
    /// function graph scan.
    pub fn live_labels(&self) -> Vec<LabelId> {
        (0..self.arena.len() as u32)
            .map(LabelId)
            .filter(|&id| self.is_alive(id))
            .collect()
    }

    fn ensure_mutable(&self) -> Result<(), DocumentError> {
        if self.txn.is_corrupted() {
            return Err(DocumentError::Corrupted);
        }
        Ok(())
    }

    fn note_attribute_change(&mut self, label: LabelId) {
        if let Some(node) = self.arena.node_mut(label) {
            node.flags.attribute_modified = true;
        }
        if self.logbook.is_recording() {
            self.logbook.set_touched(label);
        }
    }

    /// Collects the subtree rooted at `label` in parent-before-child order.
    fn subtree_preorder(&self, label: LabelId) -> Vec<LabelId> {
        let mut order = Vec::new();
        let mut stack = vec![label];
        while let Some(current) = stack.pop() {
            order.push(current);
            if let Some(node) = self.arena.node(current) {
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        order
    }
}
