//! Registry routing change batches to live reconcilers.
//!
//! The tree owns its reconcilers; the registry only addresses them through
//! weak references, keyed by project and owning scope key. The same scope
//! can be on screen more than once (a project opened directly and again as
//! somebody's library), so a key maps to every live view of it.
//!
//! The registry also hands out the per-project lock that serializes batch
//! application against lazy expansion and teardown.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};

use crate::key::StableKey;
use crate::reconciler::Reconciler;
use crate::types::ProjectId;

/// Lock serializing all tree mutation of one project.
pub type ProjectLock = Arc<Mutex<()>>;

/// Held guard of a [`ProjectLock`]. Reconciler primitives take it as proof
/// that the caller holds the project lock.
pub type ProjectGuard<'a> = MutexGuard<'a, ()>;

type Views = Vec<Weak<Reconciler>>;

#[derive(Default)]
pub struct ChildrenUpdater {
    locks: DashMap<ProjectId, ProjectLock>,
    reconcilers: DashMap<ProjectId, HashMap<StableKey, Views>>,
}

impl ChildrenUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock object of a project, created on first use.
    pub fn lock(&self, project: ProjectId) -> ProjectLock {
        Arc::clone(self.locks.entry(project).or_default().value())
    }

    pub fn register(&self, project: ProjectId, key: StableKey, reconciler: &Arc<Reconciler>) {
        crate::debug_event!("updater", "register", "{key}");
        let mut scopes = self.reconcilers.entry(project).or_default();
        let views = scopes.entry(key).or_default();
        views.retain(|weak| weak.strong_count() > 0);
        if !views.iter().any(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(reconciler))) {
            views.push(Arc::downgrade(reconciler));
        }
    }

    /// Drop every view registered under `key`.
    pub fn unregister(&self, project: ProjectId, key: &StableKey) {
        if let Some(mut scopes) = self.reconcilers.get_mut(&project) {
            scopes.remove(key);
        }
    }

    /// Drop one particular view of `key`, leaving other views alone.
    pub fn release(&self, project: ProjectId, key: &StableKey, reconciler: &Reconciler) {
        let Some(mut scopes) = self.reconcilers.get_mut(&project) else {
            return;
        };
        let emptied = match scopes.get_mut(key) {
            Some(views) => {
                views.retain(|weak| {
                    weak.strong_count() > 0 && !std::ptr::eq(weak.as_ptr(), reconciler)
                });
                views.is_empty()
            }
            None => false,
        };
        if emptied {
            scopes.remove(key);
        }
    }

    /// Forget every scope of a project.
    ///
    /// The project's lock stays: views built earlier (a collapsed library
    /// view, say) keep using it as their witness when they come back.
    pub fn unregister_project(&self, project: ProjectId) {
        self.reconcilers.remove(&project);
        crate::debug_event!("updater", "project unregistered", "{project}");
    }

    /// Live views of a scope. Dead entries are pruned on the way.
    pub fn get(&self, project: ProjectId, key: &StableKey) -> Vec<Arc<Reconciler>> {
        let Some(mut scopes) = self.reconcilers.get_mut(&project) else {
            return Vec::new();
        };
        let Some(views) = scopes.get_mut(key) else {
            return Vec::new();
        };
        let live: Vec<_> = views.iter().filter_map(Weak::upgrade).collect();
        if live.len() != views.len() {
            views.retain(|weak| weak.strong_count() > 0);
            if views.is_empty() {
                scopes.remove(key);
            }
        }
        live
    }

    /// All live reconcilers of a project.
    pub fn registered(&self, project: ProjectId) -> Vec<Arc<Reconciler>> {
        let Some(mut scopes) = self.reconcilers.get_mut(&project) else {
            return Vec::new();
        };
        scopes.retain(|_, views| {
            views.retain(|weak| weak.strong_count() > 0);
            !views.is_empty()
        });
        scopes
            .values()
            .flat_map(|views| views.iter().filter_map(Weak::upgrade))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.reconcilers.iter().all(|scopes| {
            scopes
                .values()
                .all(|views| views.iter().all(|weak| weak.strong_count() == 0))
        })
    }

    /// Forget every registered view. Locks are kept for the same reason as
    /// in [`ChildrenUpdater::unregister_project`].
    pub fn clear(&self) {
        self.reconcilers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserConfig;
    use crate::reconciler::ScopeKind;
    use crate::symbols::MemoryIndex;

    fn view(updater: &Arc<ChildrenUpdater>, project: ProjectId, key: &StableKey) -> Arc<Reconciler> {
        Reconciler::new(
            ScopeKind::Classifier,
            project,
            key.clone(),
            Arc::new(MemoryIndex::new()),
            Arc::clone(updater),
            BrowserConfig::default(),
        )
    }

    fn project(n: u32) -> ProjectId {
        ProjectId::new(n).unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let updater = Arc::new(ChildrenUpdater::new());
        let key = StableKey::namespace(project(1), "ns");
        let a = view(&updater, project(1), &key);

        updater.register(project(1), key.clone(), &a);
        updater.register(project(1), key.clone(), &a);

        let found = updater.get(project(1), &key);
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &a));
        assert!(updater.get(project(2), &key).is_empty());
    }

    #[test]
    fn test_release_keeps_other_views() {
        let updater = Arc::new(ChildrenUpdater::new());
        let key = StableKey::namespace(project(1), "");
        let a = view(&updater, project(1), &key);
        let b = view(&updater, project(1), &key);
        updater.register(project(1), key.clone(), &a);
        updater.register(project(1), key.clone(), &b);
        assert_eq!(updater.get(project(1), &key).len(), 2);

        updater.release(project(1), &key, &a);
        let found = updater.get(project(1), &key);
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &b));

        updater.unregister(project(1), &key);
        assert!(updater.get(project(1), &key).is_empty());
    }

    #[test]
    fn test_dead_views_are_pruned() {
        let updater = Arc::new(ChildrenUpdater::new());
        let key = StableKey::namespace(project(1), "");
        let a = view(&updater, project(1), &key);
        updater.register(project(1), key.clone(), &a);
        assert!(!updater.is_empty());

        drop(a);
        assert!(updater.is_empty());
        assert!(updater.get(project(1), &key).is_empty());
        assert!(updater.registered(project(1)).is_empty());
    }

    #[test]
    fn test_lock_is_shared_per_project() {
        let updater = ChildrenUpdater::new();
        let first = updater.lock(project(1));
        assert!(Arc::ptr_eq(&first, &updater.lock(project(1))));
        assert!(!Arc::ptr_eq(&first, &updater.lock(project(2))));

        // A view built before the project was unregistered must still hold
        // the lock that batches are applied under.
        updater.unregister_project(project(1));
        assert!(Arc::ptr_eq(&first, &updater.lock(project(1))));
        updater.clear();
        assert!(Arc::ptr_eq(&first, &updater.lock(project(1))));
    }
}
