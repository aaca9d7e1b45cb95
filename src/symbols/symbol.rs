//! Read-only symbol objects handed out by the index.
//!
//! Objects are immutable snapshots behind `Arc`. Re-indexing replaces an
//! object with a new allocation, so two snapshots of the same declaration
//! compare equal by value but not by pointer.

use std::sync::Arc;

use crate::types::{CompactString, ProjectId, SymbolId};

use super::DeclKind;

/// Separator the index embeds in unique names it cannot disambiguate
/// (anonymous aggregates, unnamed parameters of local classes and the like).
pub const AMBIGUOUS_MARKER: &str = "::::";

/// Returns true if a unique name carries the ambiguity marker.
pub fn is_ambiguous_name(unique_name: &str) -> bool {
    unique_name.contains(AMBIGUOUS_MARKER)
}

/// A top-level collection of indexed files sharing one symbol namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub name: CompactString,
    /// Synthetic projects (system headers, third-party libraries).
    pub artificial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub project: ProjectId,
    /// Last path segment, empty for the global namespace.
    pub name: CompactString,
    /// Fully qualified name, empty for the global namespace.
    pub qualified_name: CompactString,
}

impl Namespace {
    pub fn is_global(&self) -> bool {
        self.qualified_name.is_empty()
    }

    /// Qualified name of the enclosing namespace, `None` for the global one.
    pub fn parent_qualified_name(&self) -> Option<&str> {
        if self.is_global() {
            return None;
        }
        Some(
            self.qualified_name
                .rfind("::")
                .map(|pos| &self.qualified_name[..pos])
                .unwrap_or(""),
        )
    }
}

/// Lexical scope of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeRef {
    /// Qualified name of the enclosing namespace.
    Namespace(CompactString),
    /// Unique name of the enclosing class, struct, union or enum.
    Classifier(CompactString),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub id: SymbolId,
    pub project: ProjectId,
    pub kind: DeclKind,
    pub name: CompactString,
    pub qualified_name: CompactString,
    pub unique_name: CompactString,
    /// Parameter list for functions, e.g. `(int, char*)`.
    pub signature: Option<CompactString>,
    /// Return or value type shown next to the name.
    pub type_text: Option<CompactString>,
    pub scope: ScopeRef,
    /// Namespace the declaration is written in. The raw namespace listing of
    /// the index is keyed by this, nested members included.
    pub namespace: CompactString,
    /// Unique name of the referenced type for typedefs.
    pub target: Option<CompactString>,
}

impl Declaration {
    /// Text shown for the entry in the browser.
    pub fn display_text(&self) -> String {
        let mut text = String::from(&*self.name);
        if let Some(signature) = &self.signature {
            text.push_str(signature);
        }
        if let Some(type_text) = &self.type_text {
            text.push_str(" : ");
            text.push_str(type_text);
        }
        text
    }

    /// Struct, class or union without a name.
    pub fn is_anonymous_compound(&self) -> bool {
        self.kind.is_compound() && self.name.is_empty()
    }

    /// Typedef whose target is an anonymous aggregate (`typedef struct {..} T;`).
    pub fn aliases_anonymous(&self) -> bool {
        self.kind == DeclKind::Typedef
            && self
                .target
                .as_deref()
                .is_some_and(is_ambiguous_name)
    }
}

/// Any live object a key can resolve to.
#[derive(Debug, Clone)]
pub enum Symbol {
    Project(Arc<Project>),
    Namespace(Arc<Namespace>),
    Declaration(Arc<Declaration>),
}

impl Symbol {
    pub fn project(&self) -> ProjectId {
        match self {
            Self::Project(p) => p.id,
            Self::Namespace(ns) => ns.project,
            Self::Declaration(d) => d.project,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Project(p) => &p.name,
            Self::Namespace(ns) => &ns.name,
            Self::Declaration(d) => &d.name,
        }
    }

    pub fn qualified_name(&self) -> &str {
        match self {
            Self::Project(p) => &p.name,
            Self::Namespace(ns) => &ns.qualified_name,
            Self::Declaration(d) => &d.qualified_name,
        }
    }

    pub fn signature(&self) -> Option<&str> {
        match self {
            Self::Declaration(d) => d.signature.as_deref(),
            _ => None,
        }
    }

    pub fn display_text(&self) -> String {
        match self {
            Self::Project(p) => p.name.to_string(),
            Self::Namespace(ns) if ns.is_global() => "<global>".to_string(),
            Self::Namespace(ns) => ns.name.to_string(),
            Self::Declaration(d) => d.display_text(),
        }
    }

    pub fn as_declaration(&self) -> Option<&Arc<Declaration>> {
        match self {
            Self::Declaration(d) => Some(d),
            _ => None,
        }
    }
}
