//! Incremental reconciliation of one displayed scope.
//!
//! A [`Reconciler`] owns the displayed key set of a namespace, classifier or
//! libraries folder. It diffs the scope's live member set against what is
//! shown, keeps the ordered child list, and materializes child nodes on
//! demand.
//!
//! All mutation of the displayed set happens under the project lock. The
//! primitives take the held guard as a witness; listener notification is
//! deferred to [`Reconciler::publish`], which callers invoke after releasing
//! the lock.

mod node;
mod scope;

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::{Mutex, MutexGuard};

use crate::config::BrowserConfig;
use crate::error::ClassViewError;
use crate::key::{FUNCTION_BUCKET, Marker, SortedName, StableKey};
use crate::symbols::{DeclKind, Declaration, Namespace, Symbol, SymbolIndex};
use crate::types::ProjectId;
use crate::updater::{ChildrenUpdater, ProjectGuard, ProjectLock};

pub use node::{ChildNode, NodeListener};
pub use scope::{Members, ScopeKind, declaration_entry, display_scope, members, scope_key};

/// Callback receiving the new ordered child list of a scope.
pub trait ChildrenListener: Send + Sync {
    fn children_changed(&self, scope: &StableKey, keys: &[StableKey]);
}

impl<F> ChildrenListener for F
where
    F: Fn(&StableKey, &[StableKey]) + Send + Sync,
{
    fn children_changed(&self, scope: &StableKey, keys: &[StableKey]) {
        self(scope, keys)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Initialized,
    Disposed,
}

#[derive(Default)]
struct ReconcilerState {
    lifecycle: Lifecycle,
    displayed: HashMap<StableKey, SortedName>,
    nodes: HashMap<StableKey, Arc<ChildNode>>,
    ordered: Vec<StableKey>,
    dirty: bool,
    pending_publish: bool,
    /// Bumped on teardown; a loader started in an older epoch discards
    /// its result.
    epoch: u64,
    /// Bumped by every primitive.
    mutations: u64,
    loading: bool,
    refreshed: Vec<Arc<ChildNode>>,
    /// Children of other projects, disposed after our lock is released.
    deferred: Vec<Arc<Reconciler>>,
}

impl ReconcilerState {
    fn insert(&mut self, key: StableKey, name: SortedName) {
        if self.displayed.get(&key) != Some(&name) {
            self.displayed.insert(key, name);
            self.dirty = true;
        }
    }

    fn remove(&mut self, key: &StableKey) -> Option<Arc<ChildNode>> {
        if self.displayed.remove(key).is_some() {
            self.dirty = true;
        }
        self.nodes.remove(key)
    }
}

pub struct Reconciler {
    kind: ScopeKind,
    project: ProjectId,
    scope_key: StableKey,
    index: Arc<dyn SymbolIndex>,
    updater: Arc<ChildrenUpdater>,
    lock: ProjectLock,
    browser: BrowserConfig,
    state: Mutex<ReconcilerState>,
    listeners: Mutex<Vec<Arc<dyn ChildrenListener>>>,
    weak_self: Weak<Reconciler>,
}

impl Reconciler {
    pub fn new(
        kind: ScopeKind,
        project: ProjectId,
        scope_key: StableKey,
        index: Arc<dyn SymbolIndex>,
        updater: Arc<ChildrenUpdater>,
        browser: BrowserConfig,
    ) -> Arc<Self> {
        let lock = updater.lock(project);
        Arc::new_cyclic(|weak_self| Self {
            kind,
            project,
            scope_key,
            index,
            updater,
            lock,
            browser,
            state: Mutex::new(ReconcilerState::default()),
            listeners: Mutex::new(Vec::new()),
            weak_self: weak_self.clone(),
        })
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn project(&self) -> ProjectId {
        self.project
    }

    pub fn scope_key(&self) -> &StableKey {
        &self.scope_key
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lock().lifecycle
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle() == Lifecycle::Initialized
    }

    /// True while a lazily expanded scope still shows its placeholder.
    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn add_listener(&self, listener: Arc<dyn ChildrenListener>) {
        self.listeners.lock().push(listener);
    }

    /// Displayed children in display order, as of the last flush.
    pub fn keys(&self) -> Vec<StableKey> {
        self.state.lock().ordered.clone()
    }

    /// Current member set of the scope, straight from the index.
    pub fn members(&self) -> Members {
        members(
            self.kind,
            &*self.index,
            self.project,
            &self.scope_key,
            &self.browser,
        )
    }

    fn holds(&self, guard: &ProjectGuard<'_>) -> bool {
        if std::ptr::eq(MutexGuard::mutex(guard), &*self.lock) {
            return true;
        }
        let err = ClassViewError::InvariantViolation {
            scope: self.scope_key.to_string(),
            reason: "mutation without the project lock".to_string(),
        };
        crate::error_event!("reconciler", err);
        false
    }

    /// Witness check plus lifecycle check shared by all primitives.
    fn accepts(&self, guard: &ProjectGuard<'_>) -> bool {
        self.holds(guard) && self.is_initialized()
    }

    fn scope_symbol(&self) -> Option<Symbol> {
        match self.kind {
            ScopeKind::Libraries => None,
            _ => self.scope_key.resolve(&*self.index),
        }
    }

    /// Expand the scope.
    ///
    /// No-op unless uninitialized. A namespace expanded without `force`
    /// shows a loading placeholder first and computes its members on a
    /// background thread when lazy loading is enabled.
    pub fn add_notify(&self, force: bool) {
        let Some(this) = self.weak_self.upgrade() else {
            return;
        };
        let guard = self.lock.lock();
        if self.lifecycle() != Lifecycle::Uninitialized {
            return;
        }

        let lazy = !force
            && self.browser.lazy_namespaces
            && matches!(self.kind, ScopeKind::Namespace { .. });
        let fresh = if lazy {
            let mut placeholder = Members::new();
            placeholder.insert(
                StableKey::marker(self.project, Marker::Loading),
                SortedName::marker(Marker::Loading),
            );
            placeholder
        } else {
            self.members()
        };

        let epoch = {
            let mut state = self.state.lock();
            state.lifecycle = Lifecycle::Initialized;
            state.loading = lazy;
            for (key, name) in fresh {
                state.insert(key, name);
            }
            state.dirty = true;
            state.epoch
        };
        self.updater
            .register(self.project, self.scope_key.clone(), &this);
        crate::debug_event!("reconciler", "expanded", "{} lazy={lazy}", self.scope_key);

        self.flush(&guard);
        drop(guard);
        self.publish();

        if lazy {
            self.spawn_loader(epoch);
        }
    }

    fn spawn_loader(&self, epoch: u64) {
        let weak = self.weak_self.clone();
        let spawned = thread::Builder::new()
            .name("classview-loader".to_string())
            .spawn(move || {
                if let Some(this) = weak.upgrade() {
                    this.finish_loading(epoch);
                }
            });
        if let Err(e) = spawned {
            crate::warn_event!("reconciler", "loader thread failed to start", "{e}");
            self.finish_loading(epoch);
        }
    }

    /// Second phase of a lazy expansion: compute off the lock, then apply a
    /// full diff against whatever the placeholder phase accumulated.
    fn finish_loading(&self, epoch: u64) {
        let seen = self.state.lock().mutations;
        let mut fresh = self.members();

        let guard = self.lock.lock();
        {
            let state = self.state.lock();
            if state.epoch != epoch || state.lifecycle != Lifecycle::Initialized {
                return;
            }
            if state.mutations != seen {
                drop(state);
                fresh = self.members();
            }
        }

        let mut cascade = Vec::new();
        self.sync(&guard, fresh, &mut cascade);
        self.state.lock().loading = false;
        self.flush(&guard);
        drop(guard);
        self.publish();
        crate::debug_event!("reconciler", "loaded", "{}", self.scope_key);
    }

    /// Collapse the scope: drop all children and stop receiving updates.
    pub fn remove_notify(&self) {
        let guard = self.lock.lock();
        if !self.is_initialized() {
            return;
        }
        let mut deferred = Vec::new();
        self.teardown_locked(&guard, Lifecycle::Uninitialized, &mut deferred);
        self.state.lock().deferred.extend(deferred);
        drop(guard);
        self.publish();
    }

    /// Tear down for good. Children of other projects are disposed after
    /// this project's lock is released.
    pub fn dispose(&self) {
        let guard = self.lock.lock();
        let mut deferred = Vec::new();
        self.teardown_locked(&guard, Lifecycle::Disposed, &mut deferred);
        let leftovers = mem::take(&mut self.state.lock().deferred);
        drop(guard);

        for child in deferred.into_iter().chain(leftovers) {
            child.dispose();
        }
        self.listeners.lock().clear();
    }

    fn teardown_locked(
        &self,
        guard: &ProjectGuard<'_>,
        target: Lifecycle,
        deferred: &mut Vec<Arc<Reconciler>>,
    ) {
        let nodes: Vec<Arc<ChildNode>> = {
            let mut state = self.state.lock();
            if state.lifecycle == Lifecycle::Disposed {
                return;
            }
            state.lifecycle = target;
            state.epoch += 1;
            state.loading = false;
            state.dirty = false;
            state.displayed.clear();
            state.refreshed.clear();
            if !state.ordered.is_empty() {
                state.ordered.clear();
                state.pending_publish = target != Lifecycle::Disposed;
            }
            state.nodes.drain().map(|(_, node)| node).collect()
        };
        self.updater.release(self.project, &self.scope_key, self);
        self.drop_nodes(guard, nodes, deferred);
    }

    fn drop_nodes(
        &self,
        guard: &ProjectGuard<'_>,
        nodes: Vec<Arc<ChildNode>>,
        deferred: &mut Vec<Arc<Reconciler>>,
    ) {
        for node in nodes {
            let Some(child) = node.children() else {
                continue;
            };
            if child.project == self.project {
                child.teardown_locked(guard, Lifecycle::Disposed, deferred);
            } else {
                deferred.push(Arc::clone(child));
            }
        }
    }

    fn discard(&self, guard: &ProjectGuard<'_>, nodes: Vec<Arc<ChildNode>>) {
        if nodes.is_empty() {
            return;
        }
        let mut deferred = Vec::new();
        self.drop_nodes(guard, nodes, &mut deferred);
        self.state.lock().deferred.extend(deferred);
    }

    pub fn new_declaration(&self, guard: &ProjectGuard<'_>, decl: &Arc<Declaration>) {
        if !self.accepts(guard) {
            return;
        }
        let Some(scope) = self.scope_symbol() else {
            return;
        };
        let Some((key, name)) = declaration_entry(self.kind, &*self.index, &scope, decl) else {
            return;
        };

        let mut dropped = Vec::new();
        {
            let mut state = self.state.lock();
            state.mutations += 1;
            if decl.kind == DeclKind::FunctionDefinition {
                let paired = self
                    .index
                    .paired_function(decl)
                    .and_then(|declaration| StableKey::for_declaration(&declaration));
                if let Some(paired) = paired.filter(|paired| *paired != key) {
                    dropped.extend(state.remove(&paired));
                }
            }
            state.insert(key, name);
        }
        self.discard(guard, dropped);
    }

    pub fn new_namespace(&self, guard: &ProjectGuard<'_>, namespace: &Arc<Namespace>) {
        if !self.accepts(guard) {
            return;
        }
        let Some(Symbol::Namespace(scope)) = self.scope_symbol() else {
            return;
        };
        if let Some((key, name)) = scope::namespace_entry(&scope, namespace) {
            let mut state = self.state.lock();
            state.mutations += 1;
            state.insert(key, name);
        }
    }

    pub fn remove_declaration(&self, guard: &ProjectGuard<'_>, decl: &Arc<Declaration>) {
        if !self.accepts(guard) {
            return;
        }
        let mut dropped = Vec::new();
        {
            let mut state = self.state.lock();
            state.mutations += 1;
            if let Some(key) = StableKey::for_declaration(decl) {
                dropped.extend(state.remove(&key));
            }
        }

        if decl.kind.is_function() {
            // The surviving half of a declaration/definition pair takes over.
            let partner = self.index.paired_function(decl);
            let scope = self.scope_symbol();
            if let (Some(partner), Some(scope)) = (partner, scope) {
                if let Some((key, name)) =
                    declaration_entry(self.kind, &*self.index, &scope, &partner)
                {
                    self.state.lock().insert(key, name);
                }
            }
            dropped.extend(self.revalidate_functions());
        }
        self.discard(guard, dropped);
    }

    pub fn remove_namespace(&self, guard: &ProjectGuard<'_>, namespace: &Namespace) {
        if !self.accepts(guard) {
            return;
        }
        let key = StableKey::namespace(namespace.project, &namespace.qualified_name);
        let dropped = {
            let mut state = self.state.lock();
            state.mutations += 1;
            state.remove(&key)
        };
        self.discard(guard, dropped.into_iter().collect());
    }

    /// Apply a rename, move or re-parse of a declaration.
    ///
    /// If the old and new object share a key the entry is refreshed in
    /// place and its node listener fires; otherwise this is a removal
    /// followed by an insertion.
    pub fn change_declaration(
        &self,
        guard: &ProjectGuard<'_>,
        old: &Arc<Declaration>,
        new: Option<&Arc<Declaration>>,
    ) {
        let Some(new) = new else {
            self.remove_declaration(guard, old);
            return;
        };
        if !self.accepts(guard) {
            return;
        }

        let old_key = StableKey::for_declaration(old);
        let entry = self
            .scope_symbol()
            .and_then(|scope| declaration_entry(self.kind, &*self.index, &scope, new));

        match (old_key, entry) {
            (Some(old_key), Some((key, name))) if old_key == key => {
                let dropped = {
                    let mut state = self.state.lock();
                    state.mutations += 1;
                    state.insert(key.clone(), name);
                    if let Some(node) = state.nodes.get(&key).cloned() {
                        if !node.update(&Symbol::Declaration(Arc::clone(new))) {
                            node.touch();
                        }
                        state.refreshed.push(node);
                    }
                    drop(state);
                    if new.kind.is_function() {
                        self.revalidate_functions()
                    } else {
                        Vec::new()
                    }
                };
                self.discard(guard, dropped);
            }
            _ => {
                self.remove_declaration(guard, old);
                self.new_declaration(guard, new);
            }
        }
    }

    /// Drop function entries that no longer belong here: gone from the
    /// index, or now displayed as their pair partner.
    fn revalidate_functions(&self) -> Vec<Arc<ChildNode>> {
        let Some(scope) = self.scope_symbol() else {
            return Vec::new();
        };
        let candidates: Vec<StableKey> = self
            .state
            .lock()
            .displayed
            .iter()
            .filter(|(_, name)| name.bucket == FUNCTION_BUCKET)
            .map(|(key, _)| key.clone())
            .collect();

        let stale: Vec<StableKey> = candidates
            .into_iter()
            .filter(|key| match key.resolve(&*self.index) {
                Some(Symbol::Declaration(decl)) => {
                    declaration_entry(self.kind, &*self.index, &scope, &decl)
                        .is_none_or(|(shown, _)| shown != *key)
                }
                _ => true,
            })
            .collect();

        let mut state = self.state.lock();
        stale.iter().filter_map(|key| state.remove(key)).collect()
    }

    /// Full re-sync against the index.
    ///
    /// Returns true if anything changed. Changed children that are
    /// containers are appended to `recursive_out` for cascading.
    pub fn reset(&self, guard: &ProjectGuard<'_>, recursive_out: &mut Vec<Arc<Reconciler>>) -> bool {
        if !self.accepts(guard) {
            return false;
        }
        let fresh = self.members();
        self.sync(guard, fresh, recursive_out)
    }

    fn sync(
        &self,
        guard: &ProjectGuard<'_>,
        fresh: Members,
        recursive_out: &mut Vec<Arc<Reconciler>>,
    ) -> bool {
        let mut changed = false;
        let mut dropped = Vec::new();
        {
            let mut state = self.state.lock();
            let stale: Vec<StableKey> = state
                .displayed
                .keys()
                .filter(|key| !fresh.contains_key(*key))
                .cloned()
                .collect();
            for key in &stale {
                dropped.extend(state.remove(key));
                changed = true;
            }

            for (key, name) in fresh {
                let Some(previous) = state.displayed.get(&key) else {
                    state.insert(key, name);
                    changed = true;
                    continue;
                };
                let mut entry_changed = *previous != name;
                if entry_changed {
                    state.insert(key.clone(), name);
                }
                if let Some(node) = state.nodes.get(&key).cloned() {
                    let refreshed = key
                        .resolve(&*self.index)
                        .is_some_and(|symbol| node.update(&symbol));
                    if refreshed {
                        state.refreshed.push(Arc::clone(&node));
                        entry_changed = true;
                    }
                    if entry_changed {
                        if let Some(child) = node.children() {
                            recursive_out.push(Arc::clone(child));
                        }
                    }
                }
                changed |= entry_changed;
            }
            if changed {
                state.mutations += 1;
            }
        }
        self.discard(guard, dropped);
        changed
    }

    /// Parsing of the project settled: drop the "unstable" marker.
    pub fn parsing_finished(&self, guard: &ProjectGuard<'_>) {
        if !self.accepts(guard) || !self.kind.is_project_root() {
            return;
        }
        let mut state = self.state.lock();
        state.mutations += 1;
        state.remove(&StableKey::marker(self.project, Marker::Unstable));
    }

    /// The project's library set changed.
    pub fn libraries_changed(&self, guard: &ProjectGuard<'_>) {
        if !self.accepts(guard) {
            return;
        }
        match self.kind {
            ScopeKind::Namespace {
                project_root: true,
                library_view: false,
            } => {
                let key = StableKey::marker(self.project, Marker::Libraries);
                let wanted = self.browser.show_libraries && !self.index.libraries(self.project).is_empty();
                let dropped = {
                    let mut state = self.state.lock();
                    state.mutations += 1;
                    if wanted {
                        state.insert(key, SortedName::marker(Marker::Libraries));
                        None
                    } else {
                        state.remove(&key)
                    }
                };
                self.discard(guard, dropped.into_iter().collect());
            }
            ScopeKind::Libraries => {
                let mut cascade = Vec::new();
                self.reset(guard, &mut cascade);
            }
            ScopeKind::Namespace { .. } | ScopeKind::Classifier => {}
        }
    }

    /// Recompute the ordered list if anything changed since the last flush.
    pub fn flush(&self, guard: &ProjectGuard<'_>) {
        if !self.holds(guard) {
            return;
        }
        let mut state = self.state.lock();
        if !mem::take(&mut state.dirty) {
            return;
        }
        let mut entries: Vec<(&SortedName, String, &StableKey)> = state
            .displayed
            .iter()
            .map(|(key, name)| (name, key.to_string(), key))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(&b.1)));
        let ordered: Vec<StableKey> = entries.into_iter().map(|(_, _, key)| key.clone()).collect();

        if ordered != state.ordered {
            state.ordered = ordered;
            state.pending_publish = true;
        }
    }

    /// Notify listeners of everything flushed so far. Call without holding
    /// the project lock.
    pub fn publish(&self) {
        let (keys, refreshed, deferred) = {
            let mut state = self.state.lock();
            let keys = if mem::take(&mut state.pending_publish) {
                Some(state.ordered.clone())
            } else {
                None
            };
            (
                keys,
                mem::take(&mut state.refreshed),
                mem::take(&mut state.deferred),
            )
        };

        if let Some(keys) = keys {
            let listeners = self.listeners.lock().clone();
            for listener in listeners {
                listener.children_changed(&self.scope_key, &keys);
            }
        }
        for node in refreshed {
            node.notify();
        }
        for child in deferred {
            child.dispose();
        }
    }

    /// Materialize the display node of a displayed key.
    ///
    /// Returns `None` if the key is not displayed, no longer resolves, or
    /// resolves to something this scope cannot show.
    pub fn create_node(&self, key: &StableKey) -> Option<Arc<ChildNode>> {
        {
            let state = self.state.lock();
            if let Some(node) = state.nodes.get(key) {
                return Some(Arc::clone(node));
            }
            if !state.displayed.contains_key(key) {
                return None;
            }
        }

        let node = Arc::new(self.build_node(key)?);
        let mut state = self.state.lock();
        if !state.displayed.contains_key(key) {
            return None;
        }
        Some(Arc::clone(state.nodes.entry(key.clone()).or_insert(node)))
    }

    fn child(&self, kind: ScopeKind, project: ProjectId, scope_key: StableKey) -> Arc<Reconciler> {
        Reconciler::new(
            kind,
            project,
            scope_key,
            Arc::clone(&self.index),
            Arc::clone(&self.updater),
            self.browser.clone(),
        )
    }

    fn build_node(&self, key: &StableKey) -> Option<ChildNode> {
        let leaf = |text: String| Some(ChildNode::new(key.clone(), text, None));

        if let StableKey::Marker { project, marker } = key {
            return match marker {
                Marker::Loading => leaf("Loading...".to_string()),
                Marker::Unstable => leaf("Parsing in progress".to_string()),
                Marker::Libraries => {
                    let child = self.child(ScopeKind::Libraries, *project, key.clone());
                    Some(ChildNode::new(key.clone(), "Project libraries".to_string(), Some(child)))
                }
            };
        }

        let symbol = key.resolve(&*self.index)?;
        let text = symbol.display_text();
        let container = |kind: ScopeKind, project: ProjectId, scope_key: StableKey| {
            let child = self.child(kind, project, scope_key);
            Some(ChildNode::new(key.clone(), text.clone(), Some(child)))
        };

        match &symbol {
            Symbol::Project(project) => container(
                ScopeKind::Namespace {
                    project_root: true,
                    library_view: true,
                },
                project.id,
                StableKey::namespace(project.id, ""),
            ),
            Symbol::Namespace(_) => container(
                ScopeKind::Namespace {
                    project_root: false,
                    library_view: self.kind.is_library_view(),
                },
                self.project,
                key.clone(),
            ),
            Symbol::Declaration(decl) => match decl.kind {
                DeclKind::Class | DeclKind::Struct | DeclKind::Union | DeclKind::Enum => {
                    container(ScopeKind::Classifier, decl.project, key.clone())
                }
                DeclKind::Typedef => match self.index.anonymous_target(decl) {
                    Some(target) => container(
                        ScopeKind::Classifier,
                        decl.project,
                        StableKey::for_scope_symbol(&Symbol::Declaration(target)),
                    ),
                    None => leaf(text.clone()),
                },
                DeclKind::ForwardClass | DeclKind::ForwardEnum => {
                    match self.index.resolve_forward(decl) {
                        Some(target) => container(
                            ScopeKind::Classifier,
                            decl.project,
                            StableKey::for_scope_symbol(&Symbol::Declaration(target)),
                        ),
                        None => leaf(text.clone()),
                    }
                }
                DeclKind::Function
                | DeclKind::FunctionDefinition
                | DeclKind::Variable
                | DeclKind::Field
                | DeclKind::Enumerator
                | DeclKind::FriendClass
                | DeclKind::FriendFunction => leaf(text.clone()),
                DeclKind::Error => {
                    let err = ClassViewError::UnexpectedKind {
                        kind: decl.kind,
                        scope: self.scope_key.to_string(),
                    };
                    crate::warn_event!("reconciler", err);
                    None
                }
            },
        }
    }

    /// Displayed key of a symbol: exact key first, then qualified name
    /// (and signature for functions).
    pub fn find_child(&self, symbol: Option<&Symbol>) -> Option<StableKey> {
        let symbol = symbol?;
        let candidates = {
            let state = self.state.lock();
            if let Some(key) = StableKey::for_symbol(symbol) {
                if state.displayed.contains_key(&key) {
                    return Some(key);
                }
            }
            state.ordered.clone()
        };

        let is_function = symbol
            .as_declaration()
            .is_some_and(|decl| decl.kind.is_function());
        candidates.into_iter().filter(|key| !key.is_marker()).find(|key| {
            key.resolve(&*self.index).is_some_and(|candidate| {
                candidate.qualified_name() == symbol.qualified_name()
                    && (!is_function || candidate.signature() == symbol.signature())
            })
        })
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("kind", &self.kind)
            .field("scope", &self.scope_key)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}
