//! Materialized child entries.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::key::StableKey;
use crate::symbols::Symbol;

use super::Reconciler;

/// Callback fired when a node's display data changed in place.
pub trait NodeListener: Send + Sync {
    fn node_changed(&self, node: &ChildNode);
}

impl<F> NodeListener for F
where
    F: Fn(&ChildNode) + Send + Sync,
{
    fn node_changed(&self, node: &ChildNode) {
        self(node)
    }
}

/// One displayed entry, created on demand by [`Reconciler::create_node`].
///
/// Containers own the reconciler of their children; leaves have none.
pub struct ChildNode {
    key: StableKey,
    display: RwLock<String>,
    revision: AtomicU64,
    children: Option<Arc<Reconciler>>,
    listeners: Mutex<Vec<Arc<dyn NodeListener>>>,
}

impl ChildNode {
    pub(crate) fn new(key: StableKey, display: String, children: Option<Arc<Reconciler>>) -> Self {
        Self {
            key,
            display: RwLock::new(display),
            revision: AtomicU64::new(0),
            children,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn key(&self) -> &StableKey {
        &self.key
    }

    pub fn display_text(&self) -> String {
        self.display.read().clone()
    }

    /// Bumped every time the display data is refreshed.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    pub fn children(&self) -> Option<&Arc<Reconciler>> {
        self.children.as_ref()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn add_listener(&self, listener: Arc<dyn NodeListener>) {
        self.listeners.lock().push(listener);
    }

    /// Refresh from the live symbol. Returns true if anything visible changed.
    pub(crate) fn update(&self, symbol: &Symbol) -> bool {
        let text = symbol.display_text();
        let mut display = self.display.write();
        if *display == text {
            return false;
        }
        *display = text;
        self.revision.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Force a refresh notification even if the text is unchanged.
    pub(crate) fn touch(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn notify(&self) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener.node_changed(self);
        }
    }
}

impl fmt::Debug for ChildNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildNode")
            .field("key", &self.key)
            .field("display", &*self.display.read())
            .field("revision", &self.revision())
            .field("leaf", &self.is_leaf())
            .finish()
    }
}
