//! Stable identities for browser entries and their display ordering.
//!
//! Re-indexing replaces symbol objects wholesale, so the tree never holds on
//! to them. Each entry carries a [`StableKey`] instead and resolves it again
//! whenever it needs the live object.

use std::fmt;
use std::sync::Arc;

use crate::symbols::{DeclKind, Declaration, ScopeRef, Symbol, SymbolIndex, is_ambiguous_name};
use crate::types::{ProjectId, SymbolId};

/// What a name-based key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// Qualified namespace name.
    Namespace,
    /// Unique declaration name.
    Declaration,
}

/// Pseudo entries a project root may show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// The "project libraries" folder.
    Libraries,
    /// Shown while the project is still being parsed.
    Unstable,
    /// Placeholder while a lazily expanded scope computes its members.
    Loading,
}

/// Identity token of a browser entry, valid across re-indexing.
///
/// Keys own nothing; [`StableKey::resolve`] always asks the index for the
/// current object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StableKey {
    /// Index-assigned slot id, for symbols without a usable name.
    Identity {
        project: ProjectId,
        id: SymbolId,
        /// Set for aliases of unnamed structs, classes and unions.
        anonymous_compound: bool,
    },
    Named {
        kind: NameKind,
        project: ProjectId,
        name: Arc<str>,
        /// Unique name of the enclosing classifier for class-scoped declarations.
        scope: Option<Arc<str>>,
    },
    Project(ProjectId),
    Marker { project: ProjectId, marker: Marker },
}

impl StableKey {
    /// Key for any live symbol, `None` if the symbol cannot be keyed.
    pub fn for_symbol(symbol: &Symbol) -> Option<Self> {
        match symbol {
            Symbol::Project(project) => Some(Self::Project(project.id)),
            Symbol::Namespace(ns) => Some(Self::namespace(ns.project, &ns.qualified_name)),
            Symbol::Declaration(decl) => Self::for_declaration(decl),
        }
    }

    pub fn for_declaration(decl: &Declaration) -> Option<Self> {
        if decl.kind == DeclKind::Enumerator {
            return Some(Self::identity(decl, false));
        }
        if decl.aliases_anonymous() {
            return Some(Self::identity(decl, true));
        }
        if decl.name.is_empty() || is_ambiguous_name(&decl.unique_name) {
            return None;
        }
        let scope = match &decl.scope {
            ScopeRef::Classifier(unique) => Some(Arc::from(&**unique)),
            ScopeRef::Namespace(_) => None,
        };
        Some(Self::Named {
            kind: NameKind::Declaration,
            project: decl.project,
            name: Arc::from(&*decl.unique_name),
            scope,
        })
    }

    pub fn identity(decl: &Declaration, anonymous_compound: bool) -> Self {
        Self::Identity {
            project: decl.project,
            id: decl.id,
            anonymous_compound,
        }
    }

    /// Key of an owning scope. Anonymous aggregates cannot be named, so
    /// they fall back to their slot identity.
    pub fn for_scope_symbol(symbol: &Symbol) -> Self {
        match symbol {
            Symbol::Declaration(decl) => {
                Self::for_declaration(decl).unwrap_or_else(|| Self::identity(decl, true))
            }
            other => Self::for_symbol(other).unwrap_or(Self::Project(other.project())),
        }
    }

    pub fn namespace(project: ProjectId, qualified_name: &str) -> Self {
        Self::Named {
            kind: NameKind::Namespace,
            project,
            name: Arc::from(qualified_name),
            scope: None,
        }
    }

    pub fn marker(project: ProjectId, marker: Marker) -> Self {
        Self::Marker { project, marker }
    }

    pub fn project(&self) -> ProjectId {
        match self {
            Self::Identity { project, .. }
            | Self::Named { project, .. }
            | Self::Project(project)
            | Self::Marker { project, .. } => *project,
        }
    }

    pub fn is_project_libraries(&self) -> bool {
        matches!(
            self,
            Self::Marker {
                marker: Marker::Libraries,
                ..
            }
        )
    }

    /// Pseudo entry without a symbol behind it.
    pub fn is_marker(&self) -> bool {
        matches!(self, Self::Marker { .. })
    }

    /// Current live object for this identity, `None` once it is gone.
    pub fn resolve(&self, index: &dyn SymbolIndex) -> Option<Symbol> {
        if !index.is_valid(self.project()) {
            return None;
        }
        match self {
            Self::Identity { project, id, .. } => {
                index.declaration(*project, *id).map(Symbol::Declaration)
            }
            Self::Named {
                kind: NameKind::Namespace,
                project,
                name,
                ..
            } => index.find_namespace(*project, name).map(Symbol::Namespace),
            Self::Named {
                kind: NameKind::Declaration,
                project,
                name,
                scope,
            } => index
                .find_declaration(*project, name)
                .filter(|decl| match (&decl.scope, scope) {
                    (ScopeRef::Classifier(actual), Some(expected)) => **actual == **expected,
                    (ScopeRef::Namespace(_), None) => true,
                    _ => false,
                })
                .map(Symbol::Declaration),
            Self::Project(project) | Self::Marker { project, .. } => {
                index.project(*project).map(Symbol::Project)
            }
        }
    }
}

impl fmt::Display for StableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity {
                project,
                id,
                anonymous_compound,
            } => {
                write!(f, "{project}/{id}")?;
                if *anonymous_compound {
                    f.write_str("~anon")?;
                }
                Ok(())
            }
            Self::Named {
                kind: NameKind::Namespace,
                project,
                name,
                ..
            } => write!(f, "{project}/ns:{name}"),
            Self::Named {
                kind: NameKind::Declaration,
                project,
                name,
                scope,
            } => {
                write!(f, "{project}/{name}")?;
                if let Some(scope) = scope {
                    write!(f, "@{scope}")?;
                }
                Ok(())
            }
            Self::Project(project) => write!(f, "{project}"),
            Self::Marker { project, marker } => {
                let name = match marker {
                    Marker::Libraries => "libraries",
                    Marker::Unstable => "unstable",
                    Marker::Loading => "loading",
                };
                write!(f, "{project}/<{name}>")
            }
        }
    }
}

/// Sort bucket shared by function declarations and definitions.
pub const FUNCTION_BUCKET: u8 = 3;

/// Display sort key: kind bucket, display text, sub bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SortedName {
    pub bucket: u8,
    pub text: String,
    pub sub_bucket: u8,
}

impl SortedName {
    pub fn new(bucket: u8, text: impl Into<String>, sub_bucket: u8) -> Self {
        Self {
            bucket,
            text: text.into(),
            sub_bucket,
        }
    }

    pub fn of(symbol: &Symbol) -> Self {
        let text = symbol.display_text();
        match symbol {
            Symbol::Project(_) | Symbol::Namespace(_) => Self::new(0, text, 0),
            Symbol::Declaration(decl) => {
                let (bucket, sub) = match decl.kind {
                    DeclKind::Class | DeclKind::Struct | DeclKind::Union => (1, 0),
                    DeclKind::Enum => (1, 1),
                    DeclKind::Typedef => (1, 2),
                    DeclKind::ForwardClass | DeclKind::ForwardEnum | DeclKind::FriendClass => (1, 0),
                    DeclKind::Variable | DeclKind::Field | DeclKind::Enumerator => (2, 0),
                    DeclKind::Function | DeclKind::FriendFunction => (FUNCTION_BUCKET, 0),
                    DeclKind::FunctionDefinition => (FUNCTION_BUCKET, 1),
                    DeclKind::Error => (2, 0),
                };
                Self::new(bucket, text, sub)
            }
        }
    }

    /// Pseudo entries: unstable and loading ahead of everything, libraries last.
    pub fn marker(marker: Marker) -> Self {
        match marker {
            Marker::Unstable => Self::new(0, "", 0),
            Marker::Loading => Self::new(0, "", 1),
            Marker::Libraries => Self::new(u8::MAX, "", 0),
        }
    }
}
