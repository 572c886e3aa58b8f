//! Metaweave CLI - derive metadata from a directory of type-fact files

mod project;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use metaweave_engine::{AttributeValue, EngineConfig, MetadataValue, TypeFacts};
use metaweave_ids::{Identifier, Marker, TypeKey, TypeName};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use project::{CliError, Project, Result};

#[derive(Parser)]
#[command(name = "metaweave")]
#[command(about = "Incremental metadata derivation over type facts", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log engine activity at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive every artifact and print them as JSON
    Derive {
        /// Directory of type-fact files
        dir: PathBuf,
        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Print the dependency edges discovered while deriving
    Graph {
        /// Directory of type-fact files
        dir: PathBuf,
    },
    /// Show one artifact with its upstream and downstream identifiers
    Explain {
        /// Directory of type-fact files
        dir: PathBuf,
        /// Identifier, e.g. MID:Controller#main?shop.Order
        identifier: String,
    },
    /// Re-derive affected artifacts whenever a fact file changes
    Watch {
        /// Directory of type-fact files
        dir: PathBuf,
    },
    /// Interactive session over a loaded directory
    Repl {
        /// Directory of type-fact files
        dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Derive { dir, pretty } => cmd_derive(&dir, config, pretty),
        Commands::Graph { dir } => cmd_graph(&dir, config),
        Commands::Explain { dir, identifier } => cmd_explain(&dir, config, &identifier),
        Commands::Watch { dir } => cmd_watch(&dir, config),
        Commands::Repl { dir } => cmd_repl(&dir, config),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn cmd_derive(dir: &Path, config: EngineConfig, pretty: bool) -> Result<()> {
    let project = Project::open(dir, config)?;
    let derived = project.derive_all()?;

    let mut out = Map::new();
    for (id, value) in &derived {
        out.insert(id.to_string(), value.to_json());
    }
    let out = Value::Object(out);
    let json = if pretty {
        serde_json::to_string_pretty(&out)
    } else {
        serde_json::to_string(&out)
    };
    println!("{}", json.unwrap_or_default());

    let present = derived.iter().filter(|(_, value)| value.is_present()).count();
    let diagnostics = project.service().take_diagnostics();
    for diagnostic in &diagnostics {
        eprintln!("{}", diagnostic);
    }
    eprintln!(
        "{} artifacts ({} absent), {} diagnostics",
        present,
        derived.len() - present,
        diagnostics.len()
    );
    if !diagnostics.is_empty() {
        std::process::exit(2);
    }
    Ok(())
}

fn cmd_graph(dir: &Path, config: EngineConfig) -> Result<()> {
    let project = Project::open(dir, config)?;
    project.derive_all()?;
    print_graph(&project);
    Ok(())
}

fn print_graph(project: &Project) {
    let edges = project.service().edges();
    for (upstream, downstream) in &edges {
        println!("{} -> {}", upstream, downstream);
    }
    println!();
    println!("{} edges", edges.len());
}

fn cmd_explain(dir: &Path, config: EngineConfig, identifier: &str) -> Result<()> {
    let project = Project::open(dir, config)?;
    project.service().rescan();
    let id: Identifier = identifier.parse()?;
    explain(&project, &id)
}

fn explain(project: &Project, id: &Identifier) -> Result<()> {
    let service = project.service();
    let value = service.get(id)?;
    println!("{}", id);
    match &value {
        MetadataValue::Absent => println!("  value: absent"),
        MetadataValue::Present(_) => println!(
            "  value: {}",
            serde_json::to_string_pretty(&value.to_json()).unwrap_or_default()
        ),
    }
    for upstream in service.upstream_of(id) {
        println!("  reads   {}", upstream);
    }
    for downstream in service.downstream_of(id) {
        println!("  read by {}", downstream);
    }
    for diagnostic in service.take_diagnostics() {
        eprintln!("{}", diagnostic);
    }
    Ok(())
}

fn cmd_watch(dir: &Path, config: EngineConfig) -> Result<()> {
    let mut project = Project::open(dir, config)?;
    let derived = project.derive_all()?;
    report_diagnostics(&project);
    println!(
        "Watching {} ({} artifacts), Ctrl-C to stop",
        project.root().display(),
        derived.len()
    );

    let (_watcher, rx) = project.watch()?;
    project.follow(rx, |project, refreshed| {
        match refreshed {
            Ok(refreshed) => {
                for (id, value) in refreshed {
                    let state = if value.is_present() { "updated" } else { "absent" };
                    println!("  {} {}", state, id);
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        }
        report_diagnostics(project);
    });
    Ok(())
}

fn report_diagnostics(project: &Project) {
    for diagnostic in project.service().take_diagnostics() {
        eprintln!("{}", diagnostic);
    }
}

fn cmd_repl(dir: &Path, config: EngineConfig) -> Result<()> {
    use rustyline::DefaultEditor;

    let mut project = Project::open(dir, config)?;
    let owned = project.service().rescan();

    println!("Metaweave REPL v0.1.0");
    println!("{} types, {} artifacts. Type help for help, quit to exit", project.facts().len(), owned.len());
    println!();

    let mut rl = DefaultEditor::new().map_err(|e| CliError::Usage(e.to_string()))?;

    loop {
        let line = match rl.readline("metaweave> ") {
            Ok(line) => line,
            Err(_) => break,
        };
        let _ = rl.add_history_entry(&line);
        let words: Vec<&str> = line.split_whitespace().collect();

        let outcome = match words.as_slice() {
            [] => Ok(()),
            ["quit" | "q"] => break,
            ["help" | "h"] => {
                println!("Commands:");
                println!("  get <identifier>                    - Compute and explain an artifact");
                println!("  list                                - List artifacts owned by active providers");
                println!("  touch <type>                        - Announce that a type changed");
                println!("  set <type> <marker> <attr> <value>  - Change a marker attribute and propagate");
                println!("  unset <type> <marker>               - Remove a marker and propagate");
                println!("  reload                              - Re-read every fact file");
                println!("  graph                               - Show dependency edges");
                println!("  stats                               - Show cache counters");
                println!("  quit                                - Exit REPL");
                Ok(())
            }
            ["get", id] => id
                .parse::<Identifier>()
                .map_err(CliError::from)
                .and_then(|id| explain(&project, &id)),
            ["list"] => {
                for id in project.service().rescan() {
                    println!("  {}", id);
                }
                Ok(())
            }
            ["touch", ty] => repl_touch(&project, ty),
            ["set", ty, marker, attribute, value] => {
                repl_edit(&project, ty, |facts| {
                    *facts = facts.clone().with_attribute(
                        Marker::new(*marker),
                        attribute,
                        parse_attribute(value),
                    );
                })
            }
            ["unset", ty, marker] => repl_edit(&project, ty, |facts| {
                facts.markers.remove(&Marker::new(*marker));
            }),
            ["reload"] => {
                let root = project.root().to_path_buf();
                let config = project.service().config().clone();
                Project::open(&root, config).map(|fresh| {
                    project = fresh;
                    println!("Reloaded {} types", project.facts().len());
                })
            }
            ["graph"] => {
                print_graph(&project);
                Ok(())
            }
            ["stats"] => {
                let stats = project.service().cache_stats();
                println!(
                    "  {} valid, {} invalidated, {} hits, {} misses",
                    stats.valid, stats.invalidated, stats.hits, stats.misses
                );
                Ok(())
            }
            _ => {
                println!("Unknown command. Type help for help.");
                Ok(())
            }
        };

        if let Err(e) = outcome {
            eprintln!("Error: {}", e);
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn locate(project: &Project, ty: &str) -> Result<TypeKey> {
    let name = TypeName::new(ty)?;
    project
        .service()
        .facts()
        .locate(&name)
        .ok_or_else(|| CliError::Usage(format!("unknown type '{}'", ty)))
}

fn repl_touch(project: &Project, ty: &str) -> Result<()> {
    let key = locate(project, ty)?;
    let refreshed = project.refresh(&[key])?;
    for (id, value) in &refreshed {
        let state = if value.is_present() { "updated" } else { "absent" };
        println!("  {} {}", state, id);
    }
    report_diagnostics(project);
    Ok(())
}

fn repl_edit<F>(project: &Project, ty: &str, edit: F) -> Result<()>
where
    F: FnOnce(&mut TypeFacts),
{
    let key = locate(project, ty)?;
    project.facts().update(&key, edit);
    repl_touch(project, ty)
}

/// `true`/`false`, an integer, or text
fn parse_attribute(raw: &str) -> AttributeValue {
    match raw {
        "true" => AttributeValue::Bool(true),
        "false" => AttributeValue::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(AttributeValue::Int)
            .unwrap_or_else(|_| AttributeValue::Text(raw.to_string())),
    }
}
