//! Query surface the browser needs from the symbol index.

use std::sync::Arc;

use thiserror::Error;

use crate::types::{ProjectId, SymbolId};

use super::{Declaration, Namespace, Project, ScopeRef, Symbol};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Project {0} is not in the index")]
    UnknownProject(ProjectId),

    #[error("Corrupted index entry {name}: {reason}")]
    Corrupted { name: String, reason: String },
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Read-only view of the symbol index.
///
/// Lookups by name always go to the live index and return the current
/// object, or `None` when the symbol is gone. Enumerations may fail; callers
/// degrade to whatever they could collect.
pub trait SymbolIndex: Send + Sync {
    fn project(&self, project: ProjectId) -> Option<Arc<Project>>;

    /// False once the project was closed or removed.
    fn is_valid(&self, project: ProjectId) -> bool;

    /// False while the project is still being parsed.
    fn is_stable(&self, project: ProjectId) -> bool;

    /// Library projects the project depends on.
    fn libraries(&self, project: ProjectId) -> Vec<ProjectId>;

    fn find_namespace(&self, project: ProjectId, qualified_name: &str) -> Option<Arc<Namespace>>;

    fn find_declaration(&self, project: ProjectId, unique_name: &str) -> Option<Arc<Declaration>>;

    fn declaration(&self, project: ProjectId, id: SymbolId) -> Option<Arc<Declaration>>;

    fn nested_namespaces(&self, namespace: &Namespace) -> IndexResult<Vec<Arc<Namespace>>>;

    /// Raw declaration listing of a namespace.
    ///
    /// Includes everything written inside the namespace, nested class members
    /// and out-of-line method definitions too.
    fn namespace_declarations(&self, namespace: &Namespace) -> IndexResult<Vec<Arc<Declaration>>>;

    /// Members and friends of a class, struct or union; enumerators of an enum.
    fn classifier_members(&self, classifier: &Declaration) -> IndexResult<Vec<Arc<Declaration>>>;

    /// Definition of a function declaration, or declaration of a definition.
    fn paired_function(&self, function: &Declaration) -> Option<Arc<Declaration>>;

    /// Anonymous aggregate a typedef names, if any.
    fn anonymous_target(&self, typedef: &Declaration) -> Option<Arc<Declaration>>;

    /// Classifier a forward declaration refers to, `None` while unresolved.
    fn resolve_forward(&self, forward: &Declaration) -> Option<Arc<Declaration>>;

    fn is_unresolved_forward(&self, forward: &Declaration) -> bool {
        forward.kind.is_forward() && self.resolve_forward(forward).is_none()
    }

    /// Live object of the declaration's lexical scope.
    fn scope_symbol(&self, declaration: &Declaration) -> Option<Symbol> {
        match &declaration.scope {
            ScopeRef::Namespace(qualified) => self
                .find_namespace(declaration.project, qualified)
                .map(Symbol::Namespace),
            ScopeRef::Classifier(unique) => self
                .find_declaration(declaration.project, unique)
                .filter(|d| d.kind.is_classifier())
                .map(Symbol::Declaration),
        }
    }
}
