//! Per-scope membership policies.
//!
//! Each reconciler is one of three closed scope kinds. The kind decides
//! which symbols are members, which pseudo entries appear, and what key a
//! member is displayed under.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::BrowserConfig;
use crate::error::{ClassViewError, ClassViewResult};
use crate::key::{Marker, SortedName, StableKey};
use crate::symbols::{DeclKind, Declaration, Namespace, ScopeRef, Symbol, SymbolIndex};
use crate::types::ProjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Nested namespaces and the declarations written in a namespace.
    Namespace {
        /// Global namespace shown directly under a project.
        project_root: bool,
        /// Reached through another project's libraries folder.
        library_view: bool,
    },
    /// Members of a class, struct or union, enumerators of an enum.
    Classifier,
    /// Library projects of a project.
    Libraries,
}

impl ScopeKind {
    pub fn is_project_root(self) -> bool {
        matches!(
            self,
            Self::Namespace {
                project_root: true,
                ..
            }
        )
    }

    pub fn is_library_view(self) -> bool {
        matches!(
            self,
            Self::Namespace {
                library_view: true,
                ..
            }
        )
    }
}

/// Ordered member set of a scope.
pub type Members = IndexMap<StableKey, SortedName>;

/// Scope a declaration is displayed under.
///
/// Out-of-line definitions belong where their declaration is.
pub fn display_scope(index: &dyn SymbolIndex, decl: &Declaration) -> ScopeRef {
    if decl.kind == DeclKind::FunctionDefinition {
        if let Some(declaration) = index.paired_function(decl) {
            return declaration.scope.clone();
        }
    }
    decl.scope.clone()
}

/// Registry key of the reconcilers showing a scope, `None` if the scope
/// is gone.
pub fn scope_key(index: &dyn SymbolIndex, project: ProjectId, scope: &ScopeRef) -> Option<StableKey> {
    match scope {
        ScopeRef::Namespace(qualified) => Some(StableKey::namespace(project, qualified)),
        ScopeRef::Classifier(unique) => index
            .find_declaration(project, unique)
            .map(|classifier| StableKey::for_scope_symbol(&Symbol::Declaration(classifier))),
    }
}

/// Display entry of a live declaration in a scope.
///
/// Returns `None` if the declaration is not shown there. A function
/// declaration whose definition exists is shown as the definition.
pub fn declaration_entry(
    kind: ScopeKind,
    index: &dyn SymbolIndex,
    scope: &Symbol,
    decl: &Arc<Declaration>,
) -> Option<(StableKey, SortedName)> {
    if !in_display_scope(index, scope, decl) {
        return None;
    }

    let shown = match (kind, scope) {
        (ScopeKind::Namespace { .. }, Symbol::Namespace(_)) => namespace_shows(index, decl),
        (ScopeKind::Classifier, Symbol::Declaration(owner)) => classifier_shows(owner, decl),
        _ => false,
    };
    if !shown {
        return None;
    }

    if decl.kind == DeclKind::Function {
        if let Some(definition) = index.paired_function(decl) {
            return match kind {
                // The definition is listed in its own right.
                ScopeKind::Namespace { .. } => None,
                _ => entry(&definition),
            };
        }
    }
    entry(decl)
}

fn entry(decl: &Arc<Declaration>) -> Option<(StableKey, SortedName)> {
    let key = StableKey::for_declaration(decl)?;
    let name = SortedName::of(&Symbol::Declaration(Arc::clone(decl)));
    Some((key, name))
}

fn in_display_scope(index: &dyn SymbolIndex, scope: &Symbol, decl: &Declaration) -> bool {
    match (display_scope(index, decl), scope) {
        (ScopeRef::Namespace(qualified), Symbol::Namespace(ns)) => {
            ns.project == decl.project && qualified == ns.qualified_name
        }
        (ScopeRef::Classifier(unique), Symbol::Declaration(owner)) => {
            owner.project == decl.project && unique == owner.unique_name
        }
        _ => false,
    }
}

fn namespace_shows(index: &dyn SymbolIndex, decl: &Declaration) -> bool {
    match decl.kind {
        DeclKind::Class | DeclKind::Struct | DeclKind::Union => !decl.is_anonymous_compound(),
        DeclKind::Enum | DeclKind::Typedef | DeclKind::Variable => true,
        DeclKind::Function | DeclKind::FunctionDefinition => true,
        DeclKind::ForwardClass | DeclKind::ForwardEnum => index.is_unresolved_forward(decl),
        DeclKind::Enumerator | DeclKind::Field => false,
        DeclKind::FriendClass | DeclKind::FriendFunction => false,
        DeclKind::Error => false,
    }
}

fn classifier_shows(owner: &Declaration, decl: &Declaration) -> bool {
    if owner.kind == DeclKind::Enum {
        return decl.kind == DeclKind::Enumerator;
    }
    match decl.kind {
        DeclKind::Class | DeclKind::Struct | DeclKind::Union => !decl.is_anonymous_compound(),
        DeclKind::Enum | DeclKind::Typedef | DeclKind::Variable | DeclKind::Field => true,
        DeclKind::Function | DeclKind::FunctionDefinition => true,
        DeclKind::FriendClass | DeclKind::FriendFunction => true,
        DeclKind::ForwardClass | DeclKind::ForwardEnum => true,
        DeclKind::Enumerator => false,
        DeclKind::Error => false,
    }
}

/// Display entry of a nested namespace.
pub fn namespace_entry(scope: &Namespace, nested: &Arc<Namespace>) -> Option<(StableKey, SortedName)> {
    if nested.project != scope.project || nested.parent_qualified_name() != Some(&*scope.qualified_name) {
        return None;
    }
    let key = StableKey::namespace(nested.project, &nested.qualified_name);
    let name = SortedName::of(&Symbol::Namespace(Arc::clone(nested)));
    Some((key, name))
}

/// Pseudo entries of a project root.
pub fn root_markers(
    kind: ScopeKind,
    index: &dyn SymbolIndex,
    project: ProjectId,
    browser: &BrowserConfig,
) -> Members {
    let mut markers = Members::new();
    if !kind.is_project_root() {
        return markers;
    }
    if browser.show_unstable_projects && !index.is_stable(project) {
        markers.insert(
            StableKey::marker(project, Marker::Unstable),
            SortedName::marker(Marker::Unstable),
        );
    }
    if browser.show_libraries && !kind.is_library_view() && !index.libraries(project).is_empty() {
        markers.insert(
            StableKey::marker(project, Marker::Libraries),
            SortedName::marker(Marker::Libraries),
        );
    }
    markers
}

/// Complete member set of a scope.
///
/// Enumeration failures are logged; the scope shows what could be
/// collected.
pub fn members(
    kind: ScopeKind,
    index: &dyn SymbolIndex,
    project: ProjectId,
    scope_key: &StableKey,
    browser: &BrowserConfig,
) -> Members {
    let mut out = root_markers(kind, index, project, browser);

    if kind == ScopeKind::Libraries {
        for library in index.libraries(project) {
            if let Some(lib) = index.project(library) {
                let name = SortedName::of(&Symbol::Project(Arc::clone(&lib)));
                out.insert(StableKey::Project(lib.id), name);
            }
        }
        return out;
    }

    let Some(scope) = scope_key.resolve(index) else {
        return out;
    };

    if let Err(e) = list_scope(kind, index, scope_key, &scope, &mut out) {
        crate::warn_event!("reconciler", "members", "{scope_key}: {e}");
    }
    out
}

/// Fill `out` with the nested namespaces and declarations of a resolved
/// scope. Entries found before a failing index query are kept.
fn list_scope(
    kind: ScopeKind,
    index: &dyn SymbolIndex,
    scope_key: &StableKey,
    scope: &Symbol,
    out: &mut Members,
) -> ClassViewResult<()> {
    let decls = match (&kind, scope) {
        (ScopeKind::Namespace { .. }, Symbol::Namespace(ns)) => {
            for child in &index.nested_namespaces(ns)? {
                if let Some((key, name)) = namespace_entry(ns, child) {
                    out.insert(key, name);
                }
            }
            index.namespace_declarations(ns)?
        }
        (ScopeKind::Classifier, Symbol::Declaration(owner)) if owner.kind.is_classifier() => {
            index.classifier_members(owner)?
        }
        _ => {
            return Err(ClassViewError::InvariantViolation {
                scope: scope_key.to_string(),
                reason: format!("{kind:?} scope resolved to {}", scope.display_text()),
            });
        }
    };

    for decl in &decls {
        if let Some((key, name)) = declaration_entry(kind, index, scope, decl) {
            out.insert(key, name);
        }
    }
    Ok(())
}
