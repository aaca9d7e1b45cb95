//! Raw change notifications emitted by the indexer.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::symbols::{Declaration, Namespace};
use crate::types::{CompactString, ProjectId, SymbolId};

/// Old and new object of a renamed, moved or re-parsed declaration.
///
/// `new` is `None` when the declaration disappeared as part of the change.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationChange {
    pub old: Arc<Declaration>,
    pub new: Option<Arc<Declaration>>,
}

/// One logical edit as reported by the indexer.
///
/// Created per edit, consumed exactly once by a [`ChangeAccumulator`].
/// Insertion order is preserved so application follows the order the
/// indexer reported things in.
///
/// [`ChangeAccumulator`]: super::ChangeAccumulator
#[derive(Debug, Clone, Default)]
pub struct ChangeEvent {
    new_namespaces: IndexMap<(ProjectId, CompactString), Arc<Namespace>>,
    removed_namespaces: IndexMap<(ProjectId, CompactString), Arc<Namespace>>,
    new_declarations: IndexMap<(ProjectId, SymbolId), Arc<Declaration>>,
    removed_declarations: IndexMap<(ProjectId, SymbolId), Arc<Declaration>>,
    changed_declarations: IndexMap<(ProjectId, SymbolId), DeclarationChange>,
    libraries_changed: IndexSet<ProjectId>,
}

impl ChangeEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_namespace(&mut self, namespace: Arc<Namespace>) -> &mut Self {
        let key = (namespace.project, namespace.qualified_name.clone());
        self.new_namespaces.insert(key, namespace);
        self
    }

    pub fn remove_namespace(&mut self, namespace: Arc<Namespace>) -> &mut Self {
        let key = (namespace.project, namespace.qualified_name.clone());
        self.removed_namespaces.insert(key, namespace);
        self
    }

    pub fn add_declaration(&mut self, declaration: Arc<Declaration>) -> &mut Self {
        self.new_declarations
            .insert((declaration.project, declaration.id), declaration);
        self
    }

    pub fn remove_declaration(&mut self, declaration: Arc<Declaration>) -> &mut Self {
        self.removed_declarations
            .insert((declaration.project, declaration.id), declaration);
        self
    }

    /// Record `old` being replaced by `new` (rename, move, re-parse).
    pub fn change_declaration(
        &mut self,
        old: Arc<Declaration>,
        new: Option<Arc<Declaration>>,
    ) -> &mut Self {
        self.changed_declarations
            .insert((old.project, old.id), DeclarationChange { old, new });
        self
    }

    pub fn libraries_changed(&mut self, project: ProjectId) -> &mut Self {
        self.libraries_changed.insert(project);
        self
    }

    pub fn new_namespaces(&self) -> impl Iterator<Item = &Arc<Namespace>> {
        self.new_namespaces.values()
    }

    pub fn removed_namespaces(&self) -> impl Iterator<Item = &Arc<Namespace>> {
        self.removed_namespaces.values()
    }

    pub fn new_declarations(&self) -> impl Iterator<Item = &Arc<Declaration>> {
        self.new_declarations.values()
    }

    pub fn removed_declarations(&self) -> impl Iterator<Item = &Arc<Declaration>> {
        self.removed_declarations.values()
    }

    pub fn changed_declarations(&self) -> impl Iterator<Item = &DeclarationChange> {
        self.changed_declarations.values()
    }

    pub fn projects_with_changed_libraries(&self) -> impl Iterator<Item = ProjectId> + '_ {
        self.libraries_changed.iter().copied()
    }

    /// Removals cannot be merged with later additions; they invalidate keys
    /// that may already be queued as new.
    pub fn has_removals(&self) -> bool {
        !self.removed_namespaces.is_empty()
            || !self.removed_declarations.is_empty()
            || self.changed_declarations.values().any(|c| c.new.is_none())
    }

    pub fn is_empty(&self) -> bool {
        self.new_namespaces.is_empty()
            && self.removed_namespaces.is_empty()
            && self.new_declarations.is_empty()
            && self.removed_declarations.is_empty()
            && self.changed_declarations.is_empty()
            && self.libraries_changed.is_empty()
    }

    /// Fold another event into this one. Used by the indexer to describe
    /// compound edits; the batching worker merges through the accumulator.
    pub fn extend(&mut self, other: ChangeEvent) {
        self.new_namespaces.extend(other.new_namespaces);
        self.removed_namespaces.extend(other.removed_namespaces);
        self.new_declarations.extend(other.new_declarations);
        self.removed_declarations.extend(other.removed_declarations);
        self.changed_declarations.extend(other.changed_declarations);
        self.libraries_changed.extend(other.libraries_changed);
    }
}
