//! Incremental synchronization engine for a symbol browser tree.
//!
//! An indexer reports edits as [`ChangeEvent`]s. The [`BatchingWorker`]
//! coalesces them into [`ChangeAccumulator`] batches, and the
//! [`ClassViewModel`] routes each batch through the [`ChildrenUpdater`] to
//! the [`Reconciler`]s of the scopes currently on screen.

#[macro_use]
pub mod logging;

pub mod config;
pub mod error;
pub mod events;
pub mod key;
pub mod model;
pub mod reconciler;
pub mod symbols;
pub mod types;
pub mod updater;
pub mod worker;

pub use config::Settings;
pub use error::{ClassViewError, ClassViewResult};
pub use events::{ChangeAccumulator, ChangeEvent, DeclarationChange};
pub use key::{Marker, SortedName, StableKey};
pub use model::ClassViewModel;
pub use reconciler::{ChildNode, ChildrenListener, NodeListener, Reconciler, ScopeKind};
pub use symbols::{DeclKind, DeclSpec, Declaration, MemoryIndex, Namespace, Symbol, SymbolIndex};
pub use types::{ProjectId, SymbolId};
pub use updater::ChildrenUpdater;
pub use worker::{BatchPolicy, BatchingWorker, ChangeSink, UpdateQueue, WorkerState};
