//! Root of the browser: open projects and batch application.
//!
//! [`ClassViewModel::update`] takes one merged batch and routes every change
//! to the reconcilers showing the affected scope, holding the project lock
//! for the whole project's share of the batch. Listeners are notified after
//! the lock is released.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::config::BrowserConfig;
use crate::error::{ClassViewError, ClassViewResult};
use crate::events::{ChangeAccumulator, Storage};
use crate::key::{Marker, StableKey};
use crate::reconciler::{Reconciler, ScopeKind, display_scope, scope_key};
use crate::symbols::{DeclKind, Declaration, Symbol, SymbolIndex};
use crate::types::ProjectId;
use crate::updater::{ChildrenUpdater, ProjectGuard};
use crate::worker::ChangeSink;

pub struct ClassViewModel {
    index: Arc<dyn SymbolIndex>,
    updater: Arc<ChildrenUpdater>,
    browser: BrowserConfig,
    roots: Mutex<IndexMap<ProjectId, Arc<Reconciler>>>,
    user_active: AtomicBool,
}

/// Reconcilers touched while applying one project's changes.
#[derive(Default)]
struct Touched(Vec<Arc<Reconciler>>);

impl Touched {
    fn add(&mut self, reconciler: &Arc<Reconciler>) {
        if !self.0.iter().any(|r| Arc::ptr_eq(r, reconciler)) {
            self.0.push(Arc::clone(reconciler));
        }
    }
}

impl ClassViewModel {
    pub fn new(index: Arc<dyn SymbolIndex>, browser: BrowserConfig) -> Self {
        Self {
            index,
            updater: Arc::new(ChildrenUpdater::new()),
            browser,
            roots: Mutex::new(IndexMap::new()),
            user_active: AtomicBool::new(false),
        }
    }

    pub fn index(&self) -> &Arc<dyn SymbolIndex> {
        &self.index
    }

    pub fn updater(&self) -> &Arc<ChildrenUpdater> {
        &self.updater
    }

    /// Add a project to the view. Opening an already open project returns
    /// its existing root.
    pub fn open_project(&self, project: ProjectId) -> ClassViewResult<Arc<Reconciler>> {
        if !self.index.is_valid(project) {
            return Err(ClassViewError::ProjectClosed(project));
        }
        let mut roots = self.roots.lock();
        if let Some(root) = roots.get(&project) {
            return Ok(Arc::clone(root));
        }
        let root = Reconciler::new(
            ScopeKind::Namespace {
                project_root: true,
                library_view: false,
            },
            project,
            StableKey::namespace(project, ""),
            Arc::clone(&self.index),
            Arc::clone(&self.updater),
            self.browser.clone(),
        );
        roots.insert(project, Arc::clone(&root));
        crate::log_event!("model", "project opened", "{project}");
        Ok(root)
    }

    pub fn close_project(&self, project: ProjectId) {
        let Some(root) = self.roots.lock().shift_remove(&project) else {
            return;
        };
        root.dispose();
        if self.updater.registered(project).is_empty() {
            self.updater.unregister_project(project);
        }
        crate::log_event!("model", "project closed", "{project}");
    }

    pub fn projects(&self) -> Vec<ProjectId> {
        self.roots.lock().keys().copied().collect()
    }

    pub fn project_root(&self, project: ProjectId) -> Option<Arc<Reconciler>> {
        self.roots.lock().get(&project).cloned()
    }

    /// Signal that the user is interacting with the tree.
    pub fn set_user_active(&self, active: bool) {
        self.user_active.store(active, Ordering::Release);
    }

    /// Parsing of a project settled.
    pub fn parsing_finished(&self, project: ProjectId) {
        let lock = self.updater.lock(project);
        let guard = lock.lock();
        let mut touched = Touched::default();
        for root in self.updater.get(project, &StableKey::namespace(project, "")) {
            root.parsing_finished(&guard);
            touched.add(&root);
        }
        Self::finish(&guard, &touched);
        drop(guard);
        Self::publish(touched);
    }

    /// Apply one merged batch.
    pub fn update(&self, batch: ChangeAccumulator) -> ClassViewResult<()> {
        crate::debug_event!("model", "update", "{} events", batch.count());
        for (project, storage) in batch.into_storages() {
            if !self.index.is_valid(project) {
                crate::debug_event!("model", "skipped", "changes of closed project {project}");
                continue;
            }
            self.apply_project(project, &storage);
        }
        Ok(())
    }

    fn apply_project(&self, project: ProjectId, storage: &Storage) {
        let lock = self.updater.lock(project);
        let guard = lock.lock();
        let mut touched = Touched::default();

        for decl in storage.removed_declarations() {
            for reconciler in self.removal_targets(project, decl) {
                reconciler.remove_declaration(&guard, decl);
                touched.add(&reconciler);
            }
            // The surviving half of a function pair may move to another scope.
            if decl.kind.is_function() {
                if let Some(partner) = self.index.paired_function(decl) {
                    self.add_declaration(&guard, project, &partner, &mut touched);
                }
            }
            // A forward declaration of a removed classifier is unresolved again.
            if let Some(forward) = self.forward_of(decl) {
                self.add_declaration(&guard, project, &forward, &mut touched);
            }
        }

        for ns in storage.removed_namespaces() {
            if let Some(parent) = ns.parent_qualified_name() {
                let key = StableKey::namespace(project, parent);
                for reconciler in self.updater.get(project, &key) {
                    reconciler.remove_namespace(&guard, ns);
                    touched.add(&reconciler);
                }
            }
        }

        for ns in storage.new_namespaces() {
            if let Some(parent) = ns.parent_qualified_name() {
                let key = StableKey::namespace(project, parent);
                for reconciler in self.updater.get(project, &key) {
                    reconciler.new_namespace(&guard, ns);
                    touched.add(&reconciler);
                }
            }
        }

        for decl in storage.new_declarations() {
            self.add_declaration(&guard, project, decl, &mut touched);
            if let Some(forward) = self.forward_of(decl) {
                for reconciler in self.removal_targets(project, &forward) {
                    reconciler.remove_declaration(&guard, &forward);
                    touched.add(&reconciler);
                }
            }
        }

        for change in storage.changed_declarations() {
            let mut targets = self.removal_targets(project, &change.old);
            if let Some(new) = &change.new {
                for reconciler in self.display_targets(project, new) {
                    if !targets.iter().any(|r| Arc::ptr_eq(r, &reconciler)) {
                        targets.push(reconciler);
                    }
                }
            }
            for reconciler in &targets {
                reconciler.change_declaration(&guard, &change.old, change.new.as_ref());
                touched.add(reconciler);
            }

            // A replaced container re-syncs its own subtree.
            if let Some(new) = change.new.as_ref().filter(|d| d.kind.is_classifier()) {
                let key = StableKey::for_scope_symbol(&Symbol::Declaration(Arc::clone(new)));
                let seeds = self.updater.get(project, &key);
                self.cascade(&guard, project, seeds, &mut touched);
            }
        }

        if storage.libraries_changed() {
            let root = StableKey::namespace(project, "");
            let libraries = StableKey::marker(project, Marker::Libraries);
            for key in [root, libraries] {
                for reconciler in self.updater.get(project, &key) {
                    reconciler.libraries_changed(&guard);
                    touched.add(&reconciler);
                }
            }
        }

        Self::finish(&guard, &touched);
        drop(guard);
        Self::publish(touched);
    }

    fn add_declaration(
        &self,
        guard: &ProjectGuard<'_>,
        project: ProjectId,
        decl: &Arc<Declaration>,
        touched: &mut Touched,
    ) {
        for reconciler in self.display_targets(project, decl) {
            reconciler.new_declaration(guard, decl);
            touched.add(&reconciler);
        }
    }

    fn cascade(
        &self,
        guard: &ProjectGuard<'_>,
        project: ProjectId,
        seeds: Vec<Arc<Reconciler>>,
        touched: &mut Touched,
    ) {
        let mut queue = seeds;
        while let Some(reconciler) = queue.pop() {
            if reconciler.project() != project {
                continue;
            }
            let mut nested = Vec::new();
            if reconciler.reset(guard, &mut nested) {
                touched.add(&reconciler);
            }
            queue.extend(nested);
        }
    }

    /// Views of the scope a live declaration is displayed in.
    fn display_targets(&self, project: ProjectId, decl: &Declaration) -> Vec<Arc<Reconciler>> {
        scope_key(&*self.index, project, &display_scope(&*self.index, decl))
            .map(|key| self.updater.get(project, &key))
            .unwrap_or_default()
    }

    /// Views that may show a declaration being removed or replaced: its
    /// lexical scope and its display scope.
    fn removal_targets(&self, project: ProjectId, decl: &Declaration) -> Vec<Arc<Reconciler>> {
        let mut targets = self.display_targets(project, decl);
        if let Some(key) = scope_key(&*self.index, project, &decl.scope) {
            for reconciler in self.updater.get(project, &key) {
                if !targets.iter().any(|r| Arc::ptr_eq(r, &reconciler)) {
                    targets.push(reconciler);
                }
            }
        }
        targets
    }

    /// Forward declaration naming the same type as a classifier.
    fn forward_of(&self, decl: &Declaration) -> Option<Arc<Declaration>> {
        let forward = match decl.kind {
            DeclKind::Class | DeclKind::Struct | DeclKind::Union => DeclKind::ForwardClass,
            DeclKind::Enum => DeclKind::ForwardEnum,
            _ => return None,
        };
        let unique = format!("{}:{}", forward.unique_prefix(), decl.qualified_name);
        self.index.find_declaration(decl.project, &unique)
    }

    fn finish(guard: &ProjectGuard<'_>, touched: &Touched) {
        for reconciler in &touched.0 {
            reconciler.flush(guard);
        }
    }

    fn publish(touched: Touched) {
        for reconciler in touched.0 {
            reconciler.publish();
        }
    }

    /// Tear down every open project.
    pub fn dispose(&self) {
        let roots: Vec<_> = self.roots.lock().drain(..).map(|(_, root)| root).collect();
        for root in roots {
            root.dispose();
        }
        self.updater.clear();
        crate::log_event!("model", "disposed");
    }
}

impl ChangeSink for ClassViewModel {
    fn apply(&self, batch: ChangeAccumulator) -> ClassViewResult<()> {
        self.update(batch)
    }

    fn is_user_active(&self) -> bool {
        self.user_active.load(Ordering::Acquire)
    }
}
