//! Mergeable per-project accumulation of raw change events.
//!
//! The batching worker seeds an accumulator with the first event of a burst
//! and keeps merging follow-up events into it until a merge is refused.
//! Merging is refused for anything carrying removals: a removal can
//! invalidate keys already queued as new and must be applied on its own.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::symbols::{Declaration, Namespace, SymbolIndex};
use crate::types::{CompactString, ProjectId, SymbolId};

use super::{ChangeEvent, DeclarationChange};

/// Changes of one project, merged across raw events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Storage {
    new_namespaces: IndexMap<CompactString, Arc<Namespace>>,
    removed_namespaces: IndexMap<CompactString, Arc<Namespace>>,
    new_declarations: IndexMap<SymbolId, Arc<Declaration>>,
    removed_declarations: IndexMap<SymbolId, Arc<Declaration>>,
    changed_declarations: IndexMap<SymbolId, DeclarationChange>,
    libraries_changed: bool,
}

impl Storage {
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

    pub fn libraries_changed(&self) -> bool {
        self.libraries_changed
    }

    pub fn has_removals(&self) -> bool {
        !self.removed_namespaces.is_empty()
            || !self.removed_declarations.is_empty()
            || self.changed_declarations.values().any(|c| c.new.is_none())
    }

    /// Number of individual changes held.
    pub fn len(&self) -> usize {
        self.new_namespaces.len()
            + self.removed_namespaces.len()
            + self.new_declarations.len()
            + self.removed_declarations.len()
            + self.changed_declarations.len()
            + usize::from(self.libraries_changed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Union of sets, map-union of the change table, OR of the library flag.
    fn merge(&mut self, other: &Storage) {
        self.new_namespaces.extend(
            other
                .new_namespaces
                .iter()
                .map(|(k, v)| (k.clone(), Arc::clone(v))),
        );
        self.removed_namespaces.extend(
            other
                .removed_namespaces
                .iter()
                .map(|(k, v)| (k.clone(), Arc::clone(v))),
        );
        self.new_declarations.extend(
            other
                .new_declarations
                .iter()
                .map(|(k, v)| (*k, Arc::clone(v))),
        );
        self.removed_declarations.extend(
            other
                .removed_declarations
                .iter()
                .map(|(k, v)| (*k, Arc::clone(v))),
        );
        self.changed_declarations.extend(
            other
                .changed_declarations
                .iter()
                .map(|(k, v)| (*k, v.clone())),
        );
        self.libraries_changed |= other.libraries_changed;
    }
}

/// Batch of merged change events, bucketed by owning project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeAccumulator {
    storages: IndexMap<ProjectId, Storage>,
    count: usize,
}

impl ChangeAccumulator {
    /// Seed an accumulator from one raw event.
    ///
    /// Items of projects the index reports as invalid are dropped.
    pub fn new(event: &ChangeEvent, index: &dyn SymbolIndex) -> Self {
        let mut accumulator = Self::default();
        accumulator.absorb(event, index);
        accumulator.count = 1;
        accumulator
    }

    /// Merge another raw event.
    ///
    /// Returns false, leaving the accumulator untouched, if the event
    /// carries any removals.
    pub fn add_change_event(&mut self, event: &ChangeEvent, index: &dyn SymbolIndex) -> bool {
        if event.has_removals() {
            return false;
        }
        self.absorb(event, index);
        self.count += 1;
        true
    }

    /// Merge another accumulator wholesale.
    ///
    /// Returns false, leaving the accumulator untouched, if `other` holds
    /// pending removals.
    pub fn add_accumulator(&mut self, other: &ChangeAccumulator) -> bool {
        if other.has_removals() {
            return false;
        }
        for (project, storage) in &other.storages {
            self.storages.entry(*project).or_default().merge(storage);
        }
        self.count += other.count;
        true
    }

    /// Number of raw events merged in.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn has_removals(&self) -> bool {
        self.storages.values().any(Storage::has_removals)
    }

    pub fn is_empty(&self) -> bool {
        self.storages.values().all(Storage::is_empty)
    }

    pub fn storage(&self, project: ProjectId) -> Option<&Storage> {
        self.storages.get(&project)
    }

    pub fn storages(&self) -> impl Iterator<Item = (ProjectId, &Storage)> {
        self.storages.iter().map(|(p, s)| (*p, s))
    }

    pub fn into_storages(self) -> impl Iterator<Item = (ProjectId, Storage)> {
        self.storages.into_iter()
    }

    fn absorb(&mut self, event: &ChangeEvent, index: &dyn SymbolIndex) {
        for ns in event.new_namespaces() {
            if let Some(storage) = self.storage_for(ns.project, index) {
                storage
                    .new_namespaces
                    .insert(ns.qualified_name.clone(), Arc::clone(ns));
            }
        }
        for ns in event.removed_namespaces() {
            if let Some(storage) = self.storage_for(ns.project, index) {
                storage
                    .removed_namespaces
                    .insert(ns.qualified_name.clone(), Arc::clone(ns));
            }
        }
        for decl in event.new_declarations() {
            if let Some(storage) = self.storage_for(decl.project, index) {
                storage.new_declarations.insert(decl.id, Arc::clone(decl));
            }
        }
        for decl in event.removed_declarations() {
            if let Some(storage) = self.storage_for(decl.project, index) {
                storage.removed_declarations.insert(decl.id, Arc::clone(decl));
            }
        }
        for change in event.changed_declarations() {
            if let Some(storage) = self.storage_for(change.old.project, index) {
                storage
                    .changed_declarations
                    .insert(change.old.id, change.clone());
            }
        }
        for project in event.projects_with_changed_libraries() {
            if let Some(storage) = self.storage_for(project, index) {
                storage.libraries_changed = true;
            }
        }
    }

    fn storage_for(&mut self, project: ProjectId, index: &dyn SymbolIndex) -> Option<&mut Storage> {
        if !self.storages.contains_key(&project) {
            if !index.is_valid(project) {
                crate::debug_event!("accumulator", "dropped", "changes of invalid project {project}");
                return None;
            }
            self.storages.insert(project, Storage::default());
        }
        self.storages.get_mut(&project)
    }
}
