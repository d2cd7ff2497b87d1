//! Recomputation logbook.
//!
//! # Responsibility
//! - Track which labels were touched (dirty inputs) and impacted (outputs)
//!   during one recomputation pass.
//!
//! # Invariants
//! - While recording, every attribute mutation in the document marks the
//!   owning label touched; callers never wire this by hand.

use crate::document::LabelId;
use std::collections::BTreeSet;

/// Touched/impacted label sets for one recomputation pass.
#[derive(Debug, Default, Clone)]
pub struct Logbook {
    touched: BTreeSet<LabelId>,
    impacted: BTreeSet<LabelId>,
    recording: bool,
}

impl Logbook {
    /// Creates an empty logbook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one label dirty.
    pub fn set_touched(&mut self, label: LabelId) {
        self.touched.insert(label);
    }

    /// Returns whether the label is marked dirty.
    pub fn is_touched(&self, label: LabelId) -> bool {
        self.touched.contains(&label)
    }

    /// Marks one label as the output of an executed function.
    pub fn set_impacted(&mut self, label: LabelId) {
        self.impacted.insert(label);
    }

    /// Returns whether the label was produced during the current pass.
    pub fn is_impacted(&self, label: LabelId) -> bool {
        self.impacted.contains(&label)
    }

    /// Touched labels in ascending id order.
    pub fn touched(&self) -> impl Iterator<Item = LabelId> + '_ {
        self.touched.iter().copied()
    }

    /// Impacted labels in ascending id order.
    pub fn impacted(&self) -> impl Iterator<Item = LabelId> + '_ {
        self.impacted.iter().copied()
    }

    /// Drops every touched mark.
    pub fn clear_touched(&mut self) {
        self.touched.clear();
    }

    /// Drops every impacted mark.
    pub fn clear_impacted(&mut self) {
        self.impacted.clear();
    }

    /// Drops every mark.
    pub fn clear(&mut self) {
        self.touched.clear();
        self.impacted.clear();
    }

    /// Returns whether mutations are currently being captured.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub(crate) fn start_recording(&mut self) {
        self.recording = true;
    }

    pub(crate) fn stop_recording(&mut self) {
        self.recording = false;
    }
}

#[cfg(test)]
mod tests {
    use super::Logbook;
    use crate::document::Document;

    #[test]
    fn touched_and_impacted_are_independent() {
        let mut document = Document::new();
        let child = document
            .find_child(document.root(), 1, true)
            .expect("child creation succeeds");

        let mut logbook = Logbook::new();
        logbook.set_touched(child);
        assert!(logbook.is_touched(child));
        assert!(!logbook.is_impacted(child));

        logbook.set_impacted(child);
        assert!(logbook.is_impacted(child));

        logbook.clear_impacted();
        assert!(logbook.is_touched(child));
        assert!(!logbook.is_impacted(child));
    }
}
