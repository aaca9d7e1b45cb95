use anyhow::Context;
use clap::{Parser, Subcommand};
use classview::{
    BatchPolicy, BatchingWorker, ChangeEvent, ClassViewModel, DeclKind, DeclSpec, MemoryIndex,
    ProjectId, Reconciler, Settings, WorkerState,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "classview")]
#[command(about = "Incremental symbol browser synchronization engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration
    Config,

    /// Replay a simulated indexer burst through the worker and print the tree
    Demo {
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,

        /// Override every batching delay (milliseconds)
        #[arg(long, env = "CV_DEMO_DELAY_MS")]
        delay_ms: Option<u64>,
    },
}

#[derive(Serialize)]
struct TreeEntry {
    text: String,
    key: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeEntry>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Settings::load().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        Settings::default()
    });
    classview::logging::init_with_config(&config.logging);

    match cli.command {
        Commands::Init { force } => {
            let cwd = std::env::current_dir().context("cannot read current directory")?;
            let path = Settings::init_config_file(&cwd, force)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("Created configuration file at: {}", path.display());
        }
        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Demo { json, delay_ms } => {
            let mut policy = BatchPolicy::from(&config.batching);
            if let Some(ms) = delay_ms {
                let delay = Duration::from_millis(ms);
                policy.minimal_delay = delay;
                policy.batch_mode_delay = delay;
                policy.user_activity_backoff = delay;
            }
            run_demo(&config, policy, json)?;
        }
    }
    Ok(())
}

fn run_demo(config: &Settings, policy: BatchPolicy, json: bool) -> anyhow::Result<()> {
    let index = Arc::new(MemoryIndex::new());
    let app = index.add_project("app");
    let stdlib = index.add_library_project("stdlib");
    index.add_declaration(stdlib, DeclSpec::new(DeclKind::Class, "string").in_namespace("std"));

    let model = Arc::new(ClassViewModel::new(index.clone(), config.browser.clone()));
    let root = model.open_project(app)?;
    root.add_notify(true);

    let worker = BatchingWorker::spawn(index.clone(), model.clone(), policy)?;
    for event in simulated_burst(&index, app, stdlib) {
        worker.enqueue(event)?;
    }
    wait_for_quiescence(&worker, Duration::from_secs(30));

    index.finish_parsing(app);
    model.parsing_finished(app);

    let tree = snapshot(&root);
    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        for entry in &tree {
            print_entry(entry, 0);
        }
    }

    worker.set_stop();
    model.dispose();
    Ok(())
}

/// The edits a user typing a small header would produce.
fn simulated_burst(index: &MemoryIndex, app: ProjectId, stdlib: ProjectId) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    index.begin_parsing(app);

    events.push(index.add_namespace(app, "geometry"));
    let (shape, event) = index.add_declaration(
        app,
        DeclSpec::new(DeclKind::Class, "Shape").in_namespace("geometry"),
    );
    events.push(event);
    let (_, event) = index.add_declaration(
        app,
        DeclSpec::new(DeclKind::Function, "area")
            .in_classifier(&shape.unique_name)
            .with_signature("()")
            .with_type("double"),
    );
    events.push(event);
    let (_, event) = index.add_declaration(
        app,
        DeclSpec::new(DeclKind::FunctionDefinition, "area")
            .in_namespace("geometry")
            .with_qualified_name("geometry::Shape::area")
            .with_signature("()")
            .with_type("double"),
    );
    events.push(event);

    let (color, event) = index.add_declaration(
        app,
        DeclSpec::new(DeclKind::Enum, "Color").in_namespace("geometry"),
    );
    events.push(event);
    for name in ["Red", "Green", "Blue"] {
        let (_, event) = index.add_declaration(
            app,
            DeclSpec::new(DeclKind::Enumerator, name).in_classifier(&color.unique_name),
        );
        events.push(event);
    }

    let (point, event) = index.add_declaration(app, DeclSpec::new(DeclKind::Struct, ""));
    events.push(event);
    for field in ["x", "y"] {
        let (_, event) = index.add_declaration(
            app,
            DeclSpec::new(DeclKind::Field, field)
                .in_classifier(&point.unique_name)
                .with_type("int"),
        );
        events.push(event);
    }
    let (_, event) = index.add_declaration(
        app,
        DeclSpec::new(DeclKind::Typedef, "Point").with_target(&point.unique_name),
    );
    events.push(event);

    let (scratch, event) = index.add_declaration(
        app,
        DeclSpec::new(DeclKind::Variable, "scratch").with_type("int"),
    );
    events.push(event);
    let (_, event) = index.add_declaration(
        app,
        DeclSpec::new(DeclKind::Function, "main").with_signature("()").with_type("int"),
    );
    events.push(event);
    events.push(index.remove_declaration(app, scratch.id));

    events.push(index.set_libraries(app, vec![stdlib]));
    events
}

fn wait_for_quiescence(worker: &BatchingWorker, timeout: Duration) {
    let started = Instant::now();
    let mut settled_rounds = 0;
    while started.elapsed() < timeout {
        if worker.state() == WorkerState::Idle && worker.queue().is_empty() {
            settled_rounds += 1;
            if settled_rounds >= 3 {
                return;
            }
        } else {
            settled_rounds = 0;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    eprintln!("Warning: worker did not settle within {timeout:?}");
}

/// Expand everything below `reconciler` and collect the visible tree.
fn snapshot(reconciler: &Arc<Reconciler>) -> Vec<TreeEntry> {
    reconciler.add_notify(true);
    reconciler
        .keys()
        .into_iter()
        .filter_map(|key| {
            let node = reconciler.create_node(&key)?;
            let children = node.children().map(snapshot).unwrap_or_default();
            Some(TreeEntry {
                text: node.display_text(),
                key: key.to_string(),
                children,
            })
        })
        .collect()
}

fn print_entry(entry: &TreeEntry, depth: usize) {
    println!("{}{}", "  ".repeat(depth), entry.text);
    for child in &entry.children {
        print_entry(child, depth + 1);
    }
}
