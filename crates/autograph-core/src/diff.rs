//! Structural diff between two versions of a canvas document

use std::collections::BTreeSet;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::classify::{StyleClassifier, StyleKeyClass};
use crate::model::*;

/// Category of change to a single element. Several may apply at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Moved,
    Resized,
    ColorChanged,
    TextChanged,
    StyleChanged,
}

/// An element present in both versions whose content differs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementModification {
    pub element_id: ElementId,
    pub before: Element,
    pub after: Element,
    pub change_kinds: BTreeSet<ChangeKind>,
}

impl ElementModification {
    pub fn has(&self, kind: ChangeKind) -> bool {
        self.change_kinds.contains(&kind)
    }
}

/// Change counts. Always derived from the result's sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub total_changes: usize,
    pub added_count: usize,
    pub deleted_count: usize,
    pub modified_count: usize,
}

/// The structural delta between two canvas documents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiffResult {
    /// Present in the newer version only, in its element order.
    pub additions: Vec<Element>,
    /// Present in the older version only, in its element order.
    pub deletions: Vec<Element>,
    /// Present in both and changed, in the older version's element order.
    pub modifications: Vec<ElementModification>,
    pub note_changed: bool,
}

impl DiffResult {
    pub fn summary(&self) -> DiffSummary {
        let added_count = self.additions.len();
        let deleted_count = self.deletions.len();
        let modified_count = self.modifications.len();
        DiffSummary {
            total_changes: added_count + deleted_count + modified_count,
            added_count,
            deleted_count,
            modified_count,
        }
    }

    /// Check if this diff is empty (no element or note changes).
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty()
            && self.deletions.is_empty()
            && self.modifications.is_empty()
            && !self.note_changed
    }

    pub fn modification(&self, id: &str) -> Option<&ElementModification> {
        self.modifications.iter().find(|m| m.element_id.as_str() == id)
    }
}

impl Serialize for DiffResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DiffResult", 5)?;
        state.serialize_field("additions", &self.additions)?;
        state.serialize_field("deletions", &self.deletions)?;
        state.serialize_field("modifications", &self.modifications)?;
        state.serialize_field("note_changed", &self.note_changed)?;
        state.serialize_field("summary", &self.summary())?;
        state.end()
    }
}

/// Computes diffs using a configurable color-key table.
#[derive(Debug, Clone, Default)]
pub struct VersionDiffEngine {
    classifier: StyleClassifier,
}

impl VersionDiffEngine {
    pub fn new(classifier: StyleClassifier) -> Self {
        VersionDiffEngine { classifier }
    }

    pub fn classifier(&self) -> &StyleClassifier {
        &self.classifier
    }

    /// Compare two versions. Pure and deterministic: identical inputs give
    /// identical output, including ordering.
    pub fn compare(&self, v1: &CanvasDocument, v2: &CanvasDocument) -> DiffResult {
        let mut diff = DiffResult::default();

        // Deletions and modifications, in v1 order
        for before in v1.elements() {
            match v2.element(before.id.as_str()) {
                None => diff.deletions.push(before.clone()),
                Some(after) => {
                    let change_kinds = self.change_kinds(before, after);
                    if !change_kinds.is_empty() {
                        diff.modifications.push(ElementModification {
                            element_id: before.id.clone(),
                            before: before.clone(),
                            after: after.clone(),
                            change_kinds,
                        });
                    }
                }
            }
        }

        // Additions, in v2 order
        for after in v2.elements() {
            if !v1.contains(after.id.as_str()) {
                diff.additions.push(after.clone());
            }
        }

        diff.note_changed = v1.note() != v2.note();

        tracing::debug!(
            "Diff computed: {} added, {} deleted, {} modified, note changed: {}",
            diff.additions.len(),
            diff.deletions.len(),
            diff.modifications.len(),
            diff.note_changed
        );
        diff
    }

    /// Classify how one element changed between two versions. Empty when equal.
    pub fn change_kinds(&self, before: &Element, after: &Element) -> BTreeSet<ChangeKind> {
        let mut kinds = BTreeSet::new();

        if before.position != after.position {
            kinds.insert(ChangeKind::Moved);
        }
        if before.size != after.size {
            kinds.insert(ChangeKind::Resized);
        }

        let (color_changed, generic_changed) =
            self.style_changes(before.style.as_ref(), after.style.as_ref());
        if color_changed {
            kinds.insert(ChangeKind::ColorChanged);
        }
        if before.text != after.text {
            kinds.insert(ChangeKind::TextChanged);
        }
        if generic_changed && kinds.is_empty() {
            kinds.insert(ChangeKind::StyleChanged);
        }

        // A shape-kind swap is not covered above; report it as a generic change
        if kinds.is_empty() && before != after {
            kinds.insert(ChangeKind::StyleChanged);
        }

        kinds
    }

    /// Returns (color-bearing key differs, generic key differs).
    fn style_changes(&self, before: Option<&StyleMap>, after: Option<&StyleMap>) -> (bool, bool) {
        match (before, after) {
            (None, None) => (false, false),
            (Some(a), Some(b)) => {
                let mut color = false;
                let mut generic = false;
                for key in a.keys().chain(b.keys()) {
                    if a.get(key) == b.get(key) {
                        continue;
                    }
                    match self.classifier.classify(key) {
                        StyleKeyClass::Color => color = true,
                        StyleKeyClass::Generic => generic = true,
                    }
                }
                (color, generic)
            }
            (Some(present), None) | (None, Some(present)) => {
                if present.is_empty() {
                    return (false, true);
                }
                let color = present.keys().any(|k| self.classifier.is_color_key(k));
                let generic = present.keys().any(|k| !self.classifier.is_color_key(k));
                (color, generic)
            }
        }
    }
}

/// Compare two versions with the default color-key table.
pub fn compare(v1: &CanvasDocument, v2: &CanvasDocument) -> DiffResult {
    VersionDiffEngine::default().compare(v1, v2)
}
