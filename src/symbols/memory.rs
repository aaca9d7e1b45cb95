//! In-memory symbol index.
//!
//! Plays the indexer role for the demo binary and the tests. Every mutation
//! returns the [`ChangeEvent`] describing it, which callers push into the
//! batching worker exactly as a real indexer would.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

use crate::events::ChangeEvent;
use crate::types::{CompactString, ProjectId, SymbolId, compact_string};

use super::{
    AMBIGUOUS_MARKER, DeclKind, Declaration, IndexError, IndexResult, Namespace, Project,
    ScopeRef, SymbolIndex,
};

/// Description of a declaration to insert.
#[derive(Debug, Clone)]
pub struct DeclSpec {
    kind: DeclKind,
    name: CompactString,
    namespace: CompactString,
    classifier: Option<CompactString>,
    qualified_name: Option<CompactString>,
    unique_name: Option<CompactString>,
    signature: Option<CompactString>,
    type_text: Option<CompactString>,
    target: Option<CompactString>,
}

impl DeclSpec {
    pub fn new(kind: DeclKind, name: &str) -> Self {
        Self {
            kind,
            name: compact_string(name),
            namespace: compact_string(""),
            classifier: None,
            qualified_name: None,
            unique_name: None,
            signature: None,
            type_text: None,
            target: None,
        }
    }

    /// Place the declaration in a namespace (global by default).
    pub fn in_namespace(mut self, qualified_name: &str) -> Self {
        self.namespace = compact_string(qualified_name);
        self
    }

    /// Place the declaration inside a class, struct, union or enum.
    pub fn in_classifier(mut self, unique_name: &str) -> Self {
        self.classifier = Some(compact_string(unique_name));
        self
    }

    /// Override the derived qualified name, e.g. `Foo::bar` for an
    /// out-of-line method definition written at namespace level.
    pub fn with_qualified_name(mut self, qualified_name: &str) -> Self {
        self.qualified_name = Some(compact_string(qualified_name));
        self
    }

    pub fn with_unique_name(mut self, unique_name: &str) -> Self {
        self.unique_name = Some(compact_string(unique_name));
        self
    }

    pub fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(compact_string(signature));
        self
    }

    pub fn with_type(mut self, type_text: &str) -> Self {
        self.type_text = Some(compact_string(type_text));
        self
    }

    /// Unique name of the aliased type for typedefs.
    pub fn with_target(mut self, unique_name: &str) -> Self {
        self.target = Some(compact_string(unique_name));
        self
    }
}

struct ProjectEntry {
    project: Arc<Project>,
    stable: bool,
    libraries: Vec<ProjectId>,
    namespaces: BTreeMap<CompactString, Arc<Namespace>>,
    declarations: BTreeMap<SymbolId, Arc<Declaration>>,
    by_unique: HashMap<CompactString, SymbolId>,
}

impl ProjectEntry {
    fn new(project: Project) -> Self {
        let global = Arc::new(Namespace {
            project: project.id,
            name: compact_string(""),
            qualified_name: compact_string(""),
        });
        let mut namespaces = BTreeMap::new();
        namespaces.insert(compact_string(""), global);
        Self {
            project: Arc::new(project),
            stable: true,
            libraries: Vec::new(),
            namespaces,
            declarations: BTreeMap::new(),
            by_unique: HashMap::new(),
        }
    }

    /// Insert a namespace and any missing parents, parents first.
    fn ensure_namespace(&mut self, qualified_name: &str, event: &mut ChangeEvent) {
        if self.namespaces.contains_key(qualified_name) {
            return;
        }
        let (parent, name) = match qualified_name.rfind("::") {
            Some(pos) => (&qualified_name[..pos], &qualified_name[pos + 2..]),
            None => ("", qualified_name),
        };
        self.ensure_namespace(parent, event);

        let namespace = Arc::new(Namespace {
            project: self.project.id,
            name: compact_string(name),
            qualified_name: compact_string(qualified_name),
        });
        self.namespaces
            .insert(compact_string(qualified_name), Arc::clone(&namespace));
        event.add_namespace(namespace);
    }

    fn build(&self, id: SymbolId, spec: DeclSpec) -> Declaration {
        let classifier = spec
            .classifier
            .as_deref()
            .and_then(|unique| self.by_unique.get(unique))
            .and_then(|id| self.declarations.get(id));

        let (scope, scope_qualified, namespace) = match (&spec.classifier, classifier) {
            (Some(unique), Some(owner)) => (
                ScopeRef::Classifier(unique.clone()),
                owner.qualified_name.clone(),
                owner.namespace.clone(),
            ),
            (Some(unique), None) => (
                ScopeRef::Classifier(unique.clone()),
                spec.namespace.clone(),
                spec.namespace.clone(),
            ),
            (None, _) => (
                ScopeRef::Namespace(spec.namespace.clone()),
                spec.namespace.clone(),
                spec.namespace.clone(),
            ),
        };

        let qualified_name = spec.qualified_name.clone().unwrap_or_else(|| {
            if scope_qualified.is_empty() {
                spec.name.clone()
            } else {
                format!("{scope_qualified}::{}", spec.name).into()
            }
        });

        let prefix = spec.kind.unique_prefix();
        let unique_name = spec.unique_name.clone().unwrap_or_else(|| {
            if spec.kind.is_compound() && spec.name.is_empty() {
                format!("{prefix}:{scope_qualified}{AMBIGUOUS_MARKER}{}", id.value()).into()
            } else {
                let signature = spec.signature.as_deref().unwrap_or("");
                format!("{prefix}:{qualified_name}{signature}").into()
            }
        });

        Declaration {
            id,
            project: self.project.id,
            kind: spec.kind,
            name: spec.name,
            qualified_name,
            unique_name,
            signature: spec.signature,
            type_text: spec.type_text,
            scope,
            namespace,
            target: spec.target,
        }
    }

    fn insert(&mut self, declaration: Arc<Declaration>) {
        self.by_unique
            .insert(declaration.unique_name.clone(), declaration.id);
        self.declarations.insert(declaration.id, declaration);
    }

    /// Remove a declaration together with everything scoped inside it.
    fn remove_recursive(&mut self, id: SymbolId, event: &mut ChangeEvent) {
        let Some(declaration) = self.declarations.remove(&id) else {
            return;
        };
        if self.by_unique.get(&declaration.unique_name) == Some(&id) {
            self.by_unique.remove(&declaration.unique_name);
        }
        if declaration.kind.is_classifier() {
            let members: Vec<SymbolId> = self
                .declarations
                .values()
                .filter(|d| {
                    matches!(&d.scope, ScopeRef::Classifier(u) if *u == declaration.unique_name)
                })
                .map(|d| d.id)
                .collect();
            for member in members {
                self.remove_recursive(member, event);
            }
        }
        event.remove_declaration(declaration);
    }
}

/// Thread-safe in-memory [`SymbolIndex`].
pub struct MemoryIndex {
    projects: DashMap<ProjectId, ProjectEntry>,
    next_project: AtomicU32,
    next_symbol: AtomicU32,
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            projects: DashMap::new(),
            next_project: AtomicU32::new(1),
            next_symbol: AtomicU32::new(1),
        }
    }

    pub fn add_project(&self, name: &str) -> ProjectId {
        self.insert_project(name, false)
    }

    /// Add an artificial project (system headers, third-party code).
    pub fn add_library_project(&self, name: &str) -> ProjectId {
        self.insert_project(name, true)
    }

    fn insert_project(&self, name: &str, artificial: bool) -> ProjectId {
        let id = self.allocate_project();
        let project = Project {
            id,
            name: compact_string(name),
            artificial,
        };
        self.projects.insert(id, ProjectEntry::new(project));
        crate::debug_event!("index", "project added", "{name} as {id}");
        id
    }

    fn allocate_project(&self) -> ProjectId {
        loop {
            let raw = self.next_project.fetch_add(1, Ordering::Relaxed);
            if let Some(id) = ProjectId::new(raw) {
                return id;
            }
        }
    }

    fn allocate_symbol(&self) -> SymbolId {
        loop {
            let raw = self.next_symbol.fetch_add(1, Ordering::Relaxed);
            if let Some(id) = SymbolId::new(raw) {
                return id;
            }
        }
    }

    /// Drop a project. Its symbols stop resolving and it reports invalid.
    pub fn close_project(&self, project: ProjectId) -> bool {
        self.projects.remove(&project).is_some()
    }

    /// Mark the project as being parsed.
    pub fn begin_parsing(&self, project: ProjectId) {
        if let Some(mut entry) = self.projects.get_mut(&project) {
            entry.stable = false;
        }
    }

    /// Mark parsing as settled. Returns true if the project was unstable.
    pub fn finish_parsing(&self, project: ProjectId) -> bool {
        self.projects
            .get_mut(&project)
            .map(|mut entry| !std::mem::replace(&mut entry.stable, true))
            .unwrap_or(false)
    }

    pub fn set_libraries(&self, project: ProjectId, libraries: Vec<ProjectId>) -> ChangeEvent {
        let mut event = ChangeEvent::new();
        if let Some(mut entry) = self.projects.get_mut(&project) {
            entry.libraries = libraries;
            event.libraries_changed(project);
        }
        event
    }

    /// Add a namespace and any missing parents.
    pub fn add_namespace(&self, project: ProjectId, qualified_name: &str) -> ChangeEvent {
        let mut event = ChangeEvent::new();
        if let Some(mut entry) = self.projects.get_mut(&project) {
            entry.ensure_namespace(qualified_name, &mut event);
        }
        event
    }

    /// Remove a namespace with its nested namespaces and their declarations.
    pub fn remove_namespace(&self, project: ProjectId, qualified_name: &str) -> ChangeEvent {
        let mut event = ChangeEvent::new();
        if qualified_name.is_empty() {
            return event;
        }
        let Some(mut entry) = self.projects.get_mut(&project) else {
            return event;
        };

        let nested_prefix = format!("{qualified_name}::");
        let doomed: Vec<CompactString> = entry
            .namespaces
            .keys()
            .filter(|qn| &***qn == qualified_name || qn.starts_with(&nested_prefix))
            .cloned()
            .collect();

        let declarations: Vec<SymbolId> = entry
            .declarations
            .values()
            .filter(|d| doomed.contains(&d.namespace))
            .map(|d| d.id)
            .collect();
        for id in declarations {
            entry.remove_recursive(id, &mut event);
        }

        // Innermost first.
        for qn in doomed.iter().rev() {
            if let Some(namespace) = entry.namespaces.remove(qn) {
                event.remove_namespace(namespace);
            }
        }
        event
    }

    /// Add a declaration, creating its namespace if needed.
    ///
    /// A declaration whose unique name is already taken replaces the existing
    /// object in place and is reported as a change.
    pub fn add_declaration(&self, project: ProjectId, spec: DeclSpec) -> (Arc<Declaration>, ChangeEvent) {
        let mut event = ChangeEvent::new();
        let fresh_id = self.allocate_symbol();
        let Some(mut entry) = self.projects.get_mut(&project) else {
            // Unknown project: hand back a detached object, nothing to report.
            let orphan = ProjectEntry::new(Project {
                id: project,
                name: compact_string(""),
                artificial: false,
            });
            return (Arc::new(orphan.build(fresh_id, spec)), event);
        };

        if spec.classifier.is_none() {
            let namespace = spec.namespace.clone();
            entry.ensure_namespace(&namespace, &mut event);
        }

        let candidate = entry.build(fresh_id, spec.clone());
        let existing = entry
            .by_unique
            .get(&candidate.unique_name)
            .and_then(|id| entry.declarations.get(id))
            .cloned();

        match existing {
            Some(old) => {
                let new = Arc::new(entry.build(old.id, spec));
                entry.insert(Arc::clone(&new));
                event.change_declaration(old, Some(Arc::clone(&new)));
                (new, event)
            }
            None => {
                let new = Arc::new(candidate);
                entry.insert(Arc::clone(&new));
                event.add_declaration(Arc::clone(&new));
                (new, event)
            }
        }
    }

    /// Remove a declaration and, for classifiers, its members.
    pub fn remove_declaration(&self, project: ProjectId, id: SymbolId) -> ChangeEvent {
        let mut event = ChangeEvent::new();
        if let Some(mut entry) = self.projects.get_mut(&project) {
            entry.remove_recursive(id, &mut event);
        }
        event
    }

    /// Rename or move a declaration, keeping its slot id.
    pub fn replace_declaration(&self, project: ProjectId, id: SymbolId, spec: DeclSpec) -> ChangeEvent {
        let mut event = ChangeEvent::new();
        let Some(mut entry) = self.projects.get_mut(&project) else {
            return event;
        };
        let Some(old) = entry.declarations.get(&id).cloned() else {
            return event;
        };
        if spec.classifier.is_none() {
            let namespace = spec.namespace.clone();
            entry.ensure_namespace(&namespace, &mut event);
        }

        let new = Arc::new(entry.build(id, spec));
        if entry.by_unique.get(&old.unique_name) == Some(&id) {
            entry.by_unique.remove(&old.unique_name);
        }
        entry.insert(Arc::clone(&new));
        event.change_declaration(old, Some(new));
        event
    }

    /// Simulate a re-parse: same content, new object.
    pub fn reparse_declaration(&self, project: ProjectId, id: SymbolId) -> ChangeEvent {
        let mut event = ChangeEvent::new();
        let Some(mut entry) = self.projects.get_mut(&project) else {
            return event;
        };
        let Some(old) = entry.declarations.get(&id).cloned() else {
            return event;
        };
        let new = Arc::new(Declaration::clone(&old));
        entry.insert(Arc::clone(&new));
        event.change_declaration(old, Some(new));
        event
    }

    fn with_entry<T>(&self, project: ProjectId, f: impl FnOnce(&ProjectEntry) -> T) -> IndexResult<T> {
        self.projects
            .get(&project)
            .map(|entry| f(&entry))
            .ok_or(IndexError::UnknownProject(project))
    }

    fn lookup_unique(&self, project: ProjectId, unique_name: &str) -> Option<Arc<Declaration>> {
        self.with_entry(project, |entry| {
            entry
                .by_unique
                .get(unique_name)
                .and_then(|id| entry.declarations.get(id))
                .cloned()
        })
        .ok()
        .flatten()
    }
}

impl SymbolIndex for MemoryIndex {
    fn project(&self, project: ProjectId) -> Option<Arc<Project>> {
        self.projects.get(&project).map(|e| Arc::clone(&e.project))
    }

    fn is_valid(&self, project: ProjectId) -> bool {
        self.projects.contains_key(&project)
    }

    fn is_stable(&self, project: ProjectId) -> bool {
        self.projects.get(&project).is_some_and(|e| e.stable)
    }

    fn libraries(&self, project: ProjectId) -> Vec<ProjectId> {
        self.projects
            .get(&project)
            .map(|e| e.libraries.clone())
            .unwrap_or_default()
    }

    fn find_namespace(&self, project: ProjectId, qualified_name: &str) -> Option<Arc<Namespace>> {
        self.projects
            .get(&project)
            .and_then(|e| e.namespaces.get(qualified_name).cloned())
    }

    fn find_declaration(&self, project: ProjectId, unique_name: &str) -> Option<Arc<Declaration>> {
        self.lookup_unique(project, unique_name)
    }

    fn declaration(&self, project: ProjectId, id: SymbolId) -> Option<Arc<Declaration>> {
        self.projects
            .get(&project)
            .and_then(|e| e.declarations.get(&id).cloned())
    }

    fn nested_namespaces(&self, namespace: &Namespace) -> IndexResult<Vec<Arc<Namespace>>> {
        self.with_entry(namespace.project, |entry| {
            entry
                .namespaces
                .values()
                .filter(|ns| ns.parent_qualified_name() == Some(&*namespace.qualified_name))
                .cloned()
                .collect()
        })
    }

    fn namespace_declarations(&self, namespace: &Namespace) -> IndexResult<Vec<Arc<Declaration>>> {
        self.with_entry(namespace.project, |entry| {
            entry
                .declarations
                .values()
                .filter(|d| d.namespace == namespace.qualified_name)
                .cloned()
                .collect()
        })
    }

    fn classifier_members(&self, classifier: &Declaration) -> IndexResult<Vec<Arc<Declaration>>> {
        if !classifier.kind.is_classifier() {
            return Err(IndexError::Corrupted {
                name: classifier.unique_name.to_string(),
                reason: format!("{} has no members", classifier.kind),
            });
        }
        self.with_entry(classifier.project, |entry| {
            entry
                .declarations
                .values()
                .filter(|d| matches!(&d.scope, ScopeRef::Classifier(u) if *u == classifier.unique_name))
                .cloned()
                .collect()
        })
    }

    fn paired_function(&self, function: &Declaration) -> Option<Arc<Declaration>> {
        let counterpart = match function.kind {
            DeclKind::Function => DeclKind::FunctionDefinition,
            DeclKind::FunctionDefinition => DeclKind::Function,
            _ => return None,
        };
        let (_, rest) = function.unique_name.split_once(':')?;
        let unique = format!("{}:{rest}", counterpart.unique_prefix());
        self.lookup_unique(function.project, &unique)
    }

    fn anonymous_target(&self, typedef: &Declaration) -> Option<Arc<Declaration>> {
        if !typedef.aliases_anonymous() {
            return None;
        }
        let target = typedef.target.as_deref()?;
        self.lookup_unique(typedef.project, target)
            .filter(|d| d.kind.is_classifier())
    }

    fn resolve_forward(&self, forward: &Declaration) -> Option<Arc<Declaration>> {
        let candidates: &[DeclKind] = match forward.kind {
            DeclKind::ForwardClass => &[DeclKind::Class, DeclKind::Struct, DeclKind::Union],
            DeclKind::ForwardEnum => &[DeclKind::Enum],
            _ => return None,
        };
        candidates.iter().find_map(|kind| {
            let unique = format!("{}:{}", kind.unique_prefix(), forward.qualified_name);
            self.lookup_unique(forward.project, &unique)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_declaration_creates_parent_namespaces() {
        let index = MemoryIndex::new();
        let app = index.add_project("app");

        let (decl, event) = index.add_declaration(
            app,
            DeclSpec::new(DeclKind::Class, "Foo").in_namespace("a::b"),
        );

        assert_eq!(&*decl.qualified_name, "a::b::Foo");
        assert_eq!(&*decl.unique_name, "C:a::b::Foo");
        let added: Vec<_> = event
            .new_namespaces()
            .map(|ns| ns.qualified_name.to_string())
            .collect();
        assert_eq!(added, vec!["a", "a::b"]);
        assert_eq!(event.new_declarations().count(), 1);
    }

    #[test]
    fn test_members_and_pairing() {
        let index = MemoryIndex::new();
        let app = index.add_project("app");
        let (foo, _) = index.add_declaration(app, DeclSpec::new(DeclKind::Class, "Foo"));
        let (decl, _) = index.add_declaration(
            app,
            DeclSpec::new(DeclKind::Function, "bar")
                .in_classifier(&foo.unique_name)
                .with_signature("()"),
        );
        let (def, _) = index.add_declaration(
            app,
            DeclSpec::new(DeclKind::FunctionDefinition, "bar")
                .with_qualified_name("Foo::bar")
                .with_signature("()"),
        );

        assert_eq!(&*decl.qualified_name, "Foo::bar");
        assert_eq!(index.classifier_members(&foo).unwrap().len(), 1);
        assert!(Arc::ptr_eq(&index.paired_function(&decl).unwrap(), &def));
        assert!(Arc::ptr_eq(&index.paired_function(&def).unwrap(), &decl));
    }

    #[test]
    fn test_anonymous_compound_gets_ambiguous_name() {
        let index = MemoryIndex::new();
        let app = index.add_project("app");
        let (anon, _) = index.add_declaration(app, DeclSpec::new(DeclKind::Struct, ""));
        let (alias, _) = index.add_declaration(
            app,
            DeclSpec::new(DeclKind::Typedef, "Point").with_target(&anon.unique_name),
        );

        assert!(super::super::is_ambiguous_name(&anon.unique_name));
        assert!(alias.aliases_anonymous());
        assert!(Arc::ptr_eq(&index.anonymous_target(&alias).unwrap(), &anon));
    }

    #[test]
    fn test_duplicate_unique_name_is_a_change() {
        let index = MemoryIndex::new();
        let app = index.add_project("app");
        let (first, _) = index.add_declaration(app, DeclSpec::new(DeclKind::Variable, "x"));
        let (second, event) = index.add_declaration(
            app,
            DeclSpec::new(DeclKind::Variable, "x").with_type("int"),
        );

        assert_eq!(first.id, second.id);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(event.new_declarations().count(), 0);
        assert_eq!(event.changed_declarations().count(), 1);
    }

    #[test]
    fn test_remove_namespace_takes_contents() {
        let index = MemoryIndex::new();
        let app = index.add_project("app");
        let (foo, _) = index.add_declaration(app, DeclSpec::new(DeclKind::Class, "Foo").in_namespace("a::b"));
        index.add_declaration(app, DeclSpec::new(DeclKind::Field, "x").in_classifier(&foo.unique_name));

        let event = index.remove_namespace(app, "a");
        assert_eq!(event.removed_namespaces().count(), 2);
        assert_eq!(event.removed_declarations().count(), 2);
        assert!(index.find_namespace(app, "a").is_none());
        assert!(index.find_declaration(app, "C:a::b::Foo").is_none());
    }

    #[test]
    fn test_forward_resolution() {
        let index = MemoryIndex::new();
        let app = index.add_project("app");
        let (fwd, _) = index.add_declaration(app, DeclSpec::new(DeclKind::ForwardClass, "Foo"));
        assert!(index.is_unresolved_forward(&fwd));

        index.add_declaration(app, DeclSpec::new(DeclKind::Struct, "Foo"));
        assert!(!index.is_unresolved_forward(&fwd));
    }

    #[test]
    fn test_parsing_state() {
        let index = MemoryIndex::new();
        let app = index.add_project("app");
        assert!(index.is_stable(app));
        index.begin_parsing(app);
        assert!(!index.is_stable(app));
        assert!(index.finish_parsing(app));
        assert!(!index.finish_parsing(app));
    }
}
