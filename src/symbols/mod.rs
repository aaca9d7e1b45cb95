//! Symbol data model and the index the browser reads from.

mod index;
mod kind;
mod memory;
mod symbol;

pub use index::{IndexError, IndexResult, SymbolIndex};
pub use kind::DeclKind;
pub use memory::{DeclSpec, MemoryIndex};
pub use symbol::{
    AMBIGUOUS_MARKER, Declaration, Namespace, Project, ScopeRef, Symbol, is_ambiguous_name,
};
