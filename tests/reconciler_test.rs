//! Tests for incremental reconciliation of displayed scopes

use classview::config::BrowserConfig;
use classview::{
    ChangeAccumulator, ChangeEvent, ChildNode, ClassViewModel, DeclKind, DeclSpec, Marker,
    MemoryIndex, ProjectId, Reconciler, StableKey, Symbol, SymbolIndex,
};
use crossbeam_channel::unbounded;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn eager() -> BrowserConfig {
    BrowserConfig {
        lazy_namespaces: false,
        ..BrowserConfig::default()
    }
}

struct Fixture {
    index: Arc<MemoryIndex>,
    model: ClassViewModel,
    app: ProjectId,
    root: Arc<Reconciler>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(eager())
    }

    fn with_config(browser: BrowserConfig) -> Self {
        let index = Arc::new(MemoryIndex::new());
        let app = index.add_project("app");
        let model = ClassViewModel::new(index.clone(), browser);
        let root = model.open_project(app).unwrap();
        Self {
            index,
            model,
            app,
            root,
        }
    }

    fn apply(&self, event: &ChangeEvent) {
        let batch = ChangeAccumulator::new(event, &*self.index);
        self.model.update(batch).unwrap();
    }

    fn apply_all(&self, events: &[ChangeEvent]) {
        let mut batch = ChangeAccumulator::new(&events[0], &*self.index);
        for event in &events[1..] {
            assert!(batch.add_change_event(event, &*self.index));
        }
        self.model.update(batch).unwrap();
    }

    fn add(&self, spec: DeclSpec) -> Arc<classview::Declaration> {
        let (decl, event) = self.index.add_declaration(self.app, spec);
        self.apply(&event);
        decl
    }
}

fn texts(reconciler: &Reconciler) -> Vec<String> {
    reconciler
        .keys()
        .iter()
        .map(|key| reconciler.create_node(key).unwrap().display_text())
        .collect()
}

fn child_of(reconciler: &Reconciler, text: &str) -> Arc<Reconciler> {
    reconciler
        .keys()
        .iter()
        .filter_map(|key| reconciler.create_node(key))
        .find(|node| node.display_text() == text)
        .and_then(|node| node.children().cloned())
        .unwrap_or_else(|| panic!("no container named {text}"))
}

#[test]
fn test_class_and_function_in_empty_namespace() {
    let f = Fixture::new();
    f.root.add_notify(true);
    assert!(f.root.keys().is_empty());

    let (_, foo) = f
        .index
        .add_declaration(f.app, DeclSpec::new(DeclKind::Class, "Foo"));
    let (_, bar) = f.index.add_declaration(
        f.app,
        DeclSpec::new(DeclKind::Function, "bar").with_signature("()"),
    );
    f.apply_all(&[foo, bar]);

    assert_eq!(texts(&f.root), vec!["Foo", "bar()"]);
}

#[test]
fn test_definition_replaces_declaration() {
    let f = Fixture::new();
    f.root.add_notify(true);

    f.add(
        DeclSpec::new(DeclKind::Function, "f")
            .with_signature("()")
            .with_type("int"),
    );
    assert_eq!(f.root.keys().len(), 1);

    let def = f.add(
        DeclSpec::new(DeclKind::FunctionDefinition, "f")
            .with_signature("()")
            .with_type("int"),
    );

    let keys = f.root.keys();
    assert_eq!(keys, vec![StableKey::for_declaration(&def).unwrap()]);
    assert_eq!(texts(&f.root), vec!["f() : int"]);
}

#[test]
fn test_declaration_returns_when_definition_removed() {
    let f = Fixture::new();
    f.root.add_notify(true);

    let decl = f.add(DeclSpec::new(DeclKind::Function, "f").with_signature("()"));
    let def = f.add(DeclSpec::new(DeclKind::FunctionDefinition, "f").with_signature("()"));
    assert_eq!(f.root.keys().len(), 1);

    f.apply(&f.index.remove_declaration(f.app, def.id));
    assert_eq!(
        f.root.keys(),
        vec![StableKey::for_declaration(&decl).unwrap()]
    );
}

#[test]
fn test_no_duplicate_pair_entries_in_one_batch() {
    let f = Fixture::new();
    f.root.add_notify(true);

    let (_, def) = f.index.add_declaration(
        f.app,
        DeclSpec::new(DeclKind::FunctionDefinition, "g").with_signature("(int)"),
    );
    let (_, decl) = f.index.add_declaration(
        f.app,
        DeclSpec::new(DeclKind::Function, "g").with_signature("(int)"),
    );
    f.apply_all(&[def, decl]);

    assert_eq!(texts(&f.root), vec!["g(int)"]);
}

#[test]
fn test_out_of_line_definition_shown_in_class() {
    let f = Fixture::new();
    f.root.add_notify(true);

    let foo = f.add(DeclSpec::new(DeclKind::Class, "Foo"));
    let class_view = child_of(&f.root, "Foo");
    class_view.add_notify(true);

    let decl = f.add(
        DeclSpec::new(DeclKind::Function, "run")
            .in_classifier(&foo.unique_name)
            .with_signature("()"),
    );
    let def = f.add(
        DeclSpec::new(DeclKind::FunctionDefinition, "run")
            .with_qualified_name("Foo::run")
            .with_signature("()"),
    );

    assert_eq!(texts(&f.root), vec!["Foo"]);
    assert_eq!(
        class_view.keys(),
        vec![StableKey::for_declaration(&def).unwrap()]
    );

    // Lookup by the declaration lands on the displayed definition.
    let found = class_view.find_child(Some(&Symbol::Declaration(decl)));
    assert_eq!(found, StableKey::for_declaration(&def));
}

#[test]
fn test_same_key_change_refreshes_in_place() {
    let f = Fixture::new();
    f.root.add_notify(true);

    f.add(DeclSpec::new(DeclKind::Class, "Alpha"));
    let g = f.add(
        DeclSpec::new(DeclKind::Function, "g")
            .with_signature("()")
            .with_type("int"),
    );
    let key = StableKey::for_declaration(&g).unwrap();
    let node = f.root.create_node(&key).unwrap();
    let before = f.root.keys();

    let list_changes = Arc::new(AtomicUsize::new(0));
    let counter = list_changes.clone();
    f.root
        .add_listener(Arc::new(move |_: &StableKey, _: &[StableKey]| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    let node_changes = Arc::new(AtomicUsize::new(0));
    let counter = node_changes.clone();
    node.add_listener(Arc::new(move |_: &ChildNode| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    // Same unique name, new return type: the index reports a change.
    let (_, event) = f.index.add_declaration(
        f.app,
        DeclSpec::new(DeclKind::Function, "g")
            .with_signature("()")
            .with_type("long"),
    );
    assert_eq!(event.changed_declarations().count(), 1);
    f.apply(&event);

    assert_eq!(node_changes.load(Ordering::SeqCst), 1);
    assert_eq!(list_changes.load(Ordering::SeqCst), 0);
    assert_eq!(f.root.keys(), before);
    assert!(Arc::ptr_eq(&f.root.create_node(&key).unwrap(), &node));
    assert_eq!(node.display_text(), "g() : long");
    assert_eq!(node.revision(), 1);
}

#[test]
fn test_reindexed_class_keeps_node_and_view() {
    let f = Fixture::new();
    f.root.add_notify(true);

    let shape = f.add(DeclSpec::new(DeclKind::Class, "Shape"));
    f.add(
        DeclSpec::new(DeclKind::Field, "sides")
            .in_classifier(&shape.unique_name)
            .with_type("int"),
    );
    let key = StableKey::for_declaration(&shape).unwrap();
    let node = f.root.create_node(&key).unwrap();
    let class_view = node.children().unwrap().clone();
    class_view.add_notify(true);
    assert_eq!(texts(&class_view), vec!["sides : int"]);
    let before = f.root.keys();

    let list_changes = Arc::new(AtomicUsize::new(0));
    for view in [&f.root, &class_view] {
        let counter = list_changes.clone();
        view.add_listener(Arc::new(move |_: &StableKey, _: &[StableKey]| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    }
    let node_changes = Arc::new(AtomicUsize::new(0));
    let counter = node_changes.clone();
    node.add_listener(Arc::new(move |_: &ChildNode| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    // Classes are keyed by unique name, so re-indexing under the same name
    // is a change of the existing entry.
    let (again, event) = f
        .index
        .add_declaration(f.app, DeclSpec::new(DeclKind::Class, "Shape"));
    assert_eq!(again.id, shape.id);
    assert_eq!(event.changed_declarations().count(), 1);
    f.apply(&event);

    assert_eq!(node_changes.load(Ordering::SeqCst), 1);
    assert_eq!(list_changes.load(Ordering::SeqCst), 0);
    assert_eq!(f.root.keys(), before);
    assert!(Arc::ptr_eq(&f.root.create_node(&key).unwrap(), &node));
    assert!(Arc::ptr_eq(node.children().unwrap(), &class_view));
    assert!(class_view.is_initialized());
    assert_eq!(texts(&class_view), vec!["sides : int"]);
}

#[test]
fn test_class_rename_replaces_entry() {
    let f = Fixture::new();
    f.root.add_notify(true);

    let shape = f.add(DeclSpec::new(DeclKind::Class, "Shape"));
    let class_view = child_of(&f.root, "Shape");
    class_view.add_notify(true);
    let old_key = StableKey::for_declaration(&shape).unwrap();

    f.apply(&f.index.replace_declaration(
        f.app,
        shape.id,
        DeclSpec::new(DeclKind::Class, "Polygon"),
    ));

    assert_eq!(texts(&f.root), vec!["Polygon"]);
    assert_ne!(f.root.keys()[0], old_key);
    assert!(!class_view.is_initialized());
    assert!(f.model.updater().get(f.app, &old_key).is_empty());
}

#[test]
fn test_rename_moves_entry() {
    let f = Fixture::new();
    f.root.add_notify(true);

    let old = f.add(DeclSpec::new(DeclKind::Variable, "counter"));
    f.add(DeclSpec::new(DeclKind::Variable, "limit"));
    assert_eq!(texts(&f.root), vec!["counter", "limit"]);

    f.apply(&f.index.replace_declaration(
        f.app,
        old.id,
        DeclSpec::new(DeclKind::Variable, "total"),
    ));
    assert_eq!(texts(&f.root), vec!["limit", "total"]);
}

#[test]
fn test_order_is_deterministic() {
    fn build(reverse: bool) -> Vec<String> {
        let f = Fixture::new();
        f.root.add_notify(true);
        let mut specs = vec![
            DeclSpec::new(DeclKind::Function, "zap").with_signature("()"),
            DeclSpec::new(DeclKind::Variable, "value"),
            DeclSpec::new(DeclKind::Typedef, "Alias"),
            DeclSpec::new(DeclKind::Enum, "Alias"),
            DeclSpec::new(DeclKind::Class, "Alias"),
            DeclSpec::new(DeclKind::Class, "Beta"),
        ];
        if reverse {
            specs.reverse();
        }
        f.apply(&f.index.add_namespace(f.app, "ns"));
        for spec in specs {
            f.add(spec);
        }
        texts(&f.root)
    }

    let forward = build(false);
    assert_eq!(forward, build(true));
    assert_eq!(
        forward,
        vec!["ns", "Alias", "Alias", "Alias", "Beta", "value", "zap()"]
    );
}

#[test]
fn test_reset_is_idempotent() {
    let f = Fixture::new();
    f.root.add_notify(true);
    f.add(DeclSpec::new(DeclKind::Class, "Foo"));
    f.apply(&f.index.add_namespace(f.app, "ns"));

    let lock = f.model.updater().lock(f.app);
    let guard = lock.lock();
    let mut nested = Vec::new();
    assert!(!f.root.reset(&guard, &mut nested));

    // An edit the view never heard about is picked up once.
    f.index
        .add_declaration(f.app, DeclSpec::new(DeclKind::Variable, "missed"));
    assert!(f.root.reset(&guard, &mut nested));
    assert!(!f.root.reset(&guard, &mut nested));
    f.root.flush(&guard);
    drop(guard);
    f.root.publish();

    assert_eq!(texts(&f.root), vec!["ns", "Foo", "missed"]);
}

#[test]
fn test_removed_class_unregisters_its_view() {
    let f = Fixture::new();
    f.root.add_notify(true);

    let foo = f.add(DeclSpec::new(DeclKind::Class, "Foo"));
    let class_view = child_of(&f.root, "Foo");
    class_view.add_notify(true);
    let key = StableKey::for_declaration(&foo).unwrap();
    assert_eq!(f.model.updater().get(f.app, &key).len(), 1);

    f.apply(&f.index.remove_declaration(f.app, foo.id));

    assert!(f.root.keys().is_empty());
    assert!(f.model.updater().get(f.app, &key).is_empty());
    assert!(!class_view.is_initialized());
}

#[test]
fn test_namespace_add_and_remove() {
    let f = Fixture::new();
    f.root.add_notify(true);

    f.apply(&f.index.add_namespace(f.app, "outer::inner"));
    assert_eq!(texts(&f.root), vec!["outer"]);

    let outer = child_of(&f.root, "outer");
    outer.add_notify(true);
    assert_eq!(texts(&outer), vec!["inner"]);

    f.apply(&f.index.remove_namespace(f.app, "outer"));
    assert!(f.root.keys().is_empty());
}

#[test]
fn test_forward_declaration_yields_to_definition() {
    let f = Fixture::new();
    f.root.add_notify(true);

    f.add(DeclSpec::new(DeclKind::ForwardClass, "Widget"));
    assert_eq!(texts(&f.root), vec!["Widget"]);
    let forward_key = f.root.keys()[0].clone();
    assert!(f.root.create_node(&forward_key).unwrap().is_leaf());

    let widget = f.add(DeclSpec::new(DeclKind::Class, "Widget"));
    assert_eq!(
        f.root.keys(),
        vec![StableKey::for_declaration(&widget).unwrap()]
    );

    f.apply(&f.index.remove_declaration(f.app, widget.id));
    assert_eq!(f.root.keys(), vec![forward_key]);
}

#[test]
fn test_typedef_of_anonymous_struct_exposes_members() {
    let f = Fixture::new();
    f.root.add_notify(true);

    let anon = f.add(DeclSpec::new(DeclKind::Struct, ""));
    f.add(DeclSpec::new(DeclKind::Typedef, "Point").with_target(&anon.unique_name));
    assert_eq!(texts(&f.root), vec!["Point"]);

    let point = child_of(&f.root, "Point");
    point.add_notify(true);
    assert!(point.keys().is_empty());

    f.add(
        DeclSpec::new(DeclKind::Field, "x")
            .in_classifier(&anon.unique_name)
            .with_type("int"),
    );
    assert_eq!(texts(&point), vec!["x : int"]);
}

#[test]
fn test_enum_rename_of_enumerator_keeps_identity() {
    let f = Fixture::new();
    f.root.add_notify(true);

    let color = f.add(DeclSpec::new(DeclKind::Enum, "Color"));
    let red = f.add(DeclSpec::new(DeclKind::Enumerator, "Red").in_classifier(&color.unique_name));
    let view = child_of(&f.root, "Color");
    view.add_notify(true);
    let key = view.keys()[0].clone();
    let node = view.create_node(&key).unwrap();

    f.apply(&f.index.replace_declaration(
        f.app,
        red.id,
        DeclSpec::new(DeclKind::Enumerator, "Crimson").in_classifier(&color.unique_name),
    ));

    assert_eq!(view.keys(), vec![key]);
    assert_eq!(node.display_text(), "Crimson");
}

#[test]
fn test_unstable_marker_until_parsing_finished() {
    let index = Arc::new(MemoryIndex::new());
    let app = index.add_project("app");
    index.begin_parsing(app);
    let model = ClassViewModel::new(index.clone(), eager());
    let root = model.open_project(app).unwrap();
    root.add_notify(true);

    assert_eq!(root.keys(), vec![StableKey::marker(app, Marker::Unstable)]);

    index.finish_parsing(app);
    model.parsing_finished(app);
    assert!(root.keys().is_empty());
}

#[test]
fn test_libraries_folder() {
    let f = Fixture::new();
    f.root.add_notify(true);
    let stdlib = f.index.add_library_project("stdlib");
    f.index
        .add_declaration(stdlib, DeclSpec::new(DeclKind::Class, "vector").in_namespace("std"));

    f.apply(&f.index.set_libraries(f.app, vec![stdlib]));
    let libraries_key = StableKey::marker(f.app, Marker::Libraries);
    assert_eq!(f.root.keys(), vec![libraries_key.clone()]);
    assert!(f.root.keys()[0].is_project_libraries());

    let folder = f.root.create_node(&libraries_key).unwrap();
    let libraries = folder.children().unwrap().clone();
    libraries.add_notify(true);
    assert_eq!(texts(&libraries), vec!["stdlib"]);

    let library_root = child_of(&libraries, "stdlib");
    library_root.add_notify(true);
    assert_eq!(texts(&library_root), vec!["std"]);

    // Library views follow edits of their own project.
    let (_, event) = f
        .index
        .add_declaration(stdlib, DeclSpec::new(DeclKind::Variable, "errno"));
    f.apply(&event);
    assert_eq!(texts(&library_root), vec!["std", "errno"]);
}

#[test]
fn test_library_view_outlives_closed_library_project() {
    let index = Arc::new(MemoryIndex::new());
    let app = index.add_project("app");
    let lib = index.add_library_project("lib");
    let model = ClassViewModel::new(index.clone(), eager());
    let apply = |event: &ChangeEvent| {
        model
            .update(ChangeAccumulator::new(event, &*index))
            .unwrap();
    };

    let app_root = model.open_project(app).unwrap();
    model.open_project(lib).unwrap();
    app_root.add_notify(true);
    apply(&index.set_libraries(app, vec![lib]));

    let folder = app_root
        .create_node(&StableKey::marker(app, Marker::Libraries))
        .unwrap();
    let libraries = folder.children().unwrap().clone();
    libraries.add_notify(true);
    let lib_root = child_of(&libraries, "lib");
    lib_root.add_notify(true);

    // Collapse the library view, close the library's own root, expand again.
    lib_root.remove_notify();
    model.close_project(lib);
    lib_root.add_notify(true);
    assert!(lib_root.is_initialized());

    let (_, event) = index.add_declaration(lib, DeclSpec::new(DeclKind::Class, "Vec"));
    apply(&event);
    assert_eq!(texts(&lib_root), vec!["Vec"]);
}

#[test]
fn test_lazy_expansion_publishes_members() {
    let f = Fixture::with_config(BrowserConfig::default());
    f.index
        .add_declaration(f.app, DeclSpec::new(DeclKind::Class, "Foo"));

    let (tx, rx) = unbounded();
    f.root
        .add_listener(Arc::new(move |_: &StableKey, keys: &[StableKey]| {
            let _ = tx.send(keys.to_vec());
        }));

    f.root.add_notify(false);
    let placeholder = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(placeholder, vec![StableKey::marker(f.app, Marker::Loading)]);

    let loaded = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(!loaded[0].is_marker());
    assert!(!f.root.is_loading());
    assert_eq!(texts(&f.root), vec!["Foo"]);
}

#[test]
fn test_collapse_and_reexpand() {
    let f = Fixture::new();
    f.root.add_notify(true);
    f.add(DeclSpec::new(DeclKind::Class, "Foo"));

    f.root.remove_notify();
    assert!(f.root.keys().is_empty());
    assert!(!f.root.is_initialized());

    // Changes while collapsed are not lost: expansion recomputes.
    f.index
        .add_declaration(f.app, DeclSpec::new(DeclKind::Class, "Bar"));
    f.root.add_notify(true);
    assert_eq!(texts(&f.root), vec!["Bar", "Foo"]);
}

#[test]
fn test_closed_project_is_torn_down() {
    let f = Fixture::new();
    f.root.add_notify(true);
    f.add(DeclSpec::new(DeclKind::Class, "Foo"));
    assert!(!f.model.updater().registered(f.app).is_empty());

    f.model.close_project(f.app);
    assert!(f.model.projects().is_empty());
    assert!(f.model.updater().registered(f.app).is_empty());
    assert!(f.index.is_valid(f.app));
}
