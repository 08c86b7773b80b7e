//! Change planning: desired configuration vs observed remote state

use serde::{Deserialize, Serialize};

/// Kind of mutating call a change stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Add members or sub-objects
    Add,
    /// Re-submit the whole object (no partial field updates)
    Replace,
    /// Remove members or sub-objects
    Remove,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Add => write!(f, "add"),
            ChangeKind::Replace => write!(f, "replace"),
            ChangeKind::Remove => write!(f, "remove"),
        }
    }
}

/// One planned mutating call
#[derive(Debug, Clone, PartialEq)]
pub struct Change<C> {
    pub kind: ChangeKind,

    /// Attributes that caused this change
    pub fields: Vec<String>,

    pub description: String,

    /// Resource-specific request to issue
    pub call: C,
}

impl<C> Change<C> {
    pub fn new(kind: ChangeKind, description: impl Into<String>, call: C) -> Self {
        Self {
            kind,
            fields: Vec::new(),
            description: description.into(),
            call,
        }
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Ordered, minimal list of calls needed to converge
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<C> {
    changes: Vec<Change<C>>,
}

impl<C> Default for ChangeSet<C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<C> ChangeSet<C> {
    pub fn empty() -> Self {
        Self {
            changes: Vec::new(),
        }
    }

    pub fn push(&mut self, change: Change<C>) {
        self.changes.push(change);
    }

    /// A single full-replace call, or nothing when no field differs
    pub fn replace_if_changed(
        diff: &FieldDiff,
        description: impl Into<String>,
        call: impl FnOnce() -> C,
    ) -> Self {
        let mut set = Self::empty();
        if !diff.is_empty() {
            set.push(
                Change::new(ChangeKind::Replace, description, call()).with_fields(diff.fields()),
            );
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change<C>> {
        self.changes.iter()
    }

    pub fn changes_by_kind(&self, kind: ChangeKind) -> Vec<&Change<C>> {
        self.changes.iter().filter(|c| c.kind == kind).collect()
    }

    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary {
            add: self.changes_by_kind(ChangeKind::Add).len(),
            replace: self.changes_by_kind(ChangeKind::Replace).len(),
            remove: self.changes_by_kind(ChangeKind::Remove).len(),
        }
    }
}

impl<C> IntoIterator for ChangeSet<C> {
    type Item = Change<C>;
    type IntoIter = std::vec::IntoIter<Change<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// Counts of planned calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSummary {
    pub add: usize,
    pub replace: usize,
    pub remove: usize,
}

impl std::fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to add, {} to replace, {} to remove",
            self.add, self.replace, self.remove
        )
    }
}

/// Field-by-field comparison of desired and observed values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDiff {
    changed: Vec<String>,
}

impl FieldDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compare<T: PartialEq + ?Sized>(
        &mut self,
        field: &str,
        desired: &T,
        observed: &T,
    ) -> &mut Self {
        if desired != observed {
            self.changed.push(field.to_string());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn fields(&self) -> &[String] {
        &self.changed
    }
}

/// Members to add and remove so `observed` becomes `desired`, keeping
/// the order in which they appear
pub fn membership_delta<T: PartialEq + Clone>(desired: &[T], observed: &[T]) -> (Vec<T>, Vec<T>) {
    let to_add = desired
        .iter()
        .filter(|d| !observed.contains(d))
        .cloned()
        .collect();
    let to_remove = observed
        .iter()
        .filter(|o| !desired.contains(o))
        .cloned()
        .collect();
    (to_add, to_remove)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_changes_emits_no_call() {
        let mut diff = FieldDiff::new();
        diff.compare("name", "rule", "rule")
            .compare("function", "f()", "f()");

        let set = ChangeSet::replace_if_changed(&diff, "update rule", || "UpdateRule");
        assert!(set.is_empty());
    }

    #[test]
    fn test_any_change_emits_exactly_one_replace() {
        let mut diff = FieldDiff::new();
        diff.compare("name", "new", "old")
            .compare("function", "g()", "f()")
            .compare("publish_status", "DRAFT", "DRAFT");

        let set = ChangeSet::replace_if_changed(&diff, "update rule", || "UpdateRule");
        assert_eq!(set.len(), 1);

        let change = set.iter().next().unwrap();
        assert_eq!(change.kind, ChangeKind::Replace);
        assert_eq!(change.fields, vec!["name", "function"]);
        assert_eq!(change.call, "UpdateRule");
    }

    #[test]
    fn test_membership_delta() {
        let desired = vec!["qc-1", "qc-2", "qc-4"];
        let observed = vec!["qc-1", "qc-2", "qc-3"];

        let (add, remove) = membership_delta(&desired, &observed);
        assert_eq!(add, vec!["qc-4"]);
        assert_eq!(remove, vec!["qc-3"]);

        let (add, remove) = membership_delta(&desired, &desired);
        assert!(add.is_empty() && remove.is_empty());
    }

    #[test]
    fn test_summary() {
        let mut set = ChangeSet::empty();
        set.push(Change::new(ChangeKind::Add, "associate qc-4", 1));
        set.push(Change::new(ChangeKind::Remove, "disassociate qc-3", 2));

        let summary = set.summary();
        assert_eq!(summary.add, 1);
        assert_eq!(summary.remove, 1);
        assert_eq!(summary.to_string(), "1 to add, 0 to replace, 1 to remove");
    }
}
