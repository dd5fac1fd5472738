use crate::cli::{Cli, Commands};
use crate::errors::DiscoveryError;
use crate::expand::{self, Expansion};
use crate::fetch::{AzCliFetcher, ResourceFetcher};
use crate::graph::{Resource, ResourceGraph};
use crate::report;
use crate::utils::config::{load_config_at, AppConfig};
use crate::utils::json::{read_json, read_json_or_default, write_json};
use crate::visualization::{PumlGenerator, PumlOptions, SvgRenderer};
use clap::CommandFactory;
use clap_complete::generate;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SEED_FILE: &str = "seed.json";
pub const INVENTORY_FILE: &str = "inventory.json";
pub const UNRESOLVED_FILE: &str = "unresolved.json";
pub const RBAC_FILE: &str = "rbac.json";
pub const GRAPH_FILE: &str = "graph.json";
pub const PUML_FILE: &str = "diagram.puml";

/// Run the CLI logic in-process.
///
/// Returns an exit code (0 = success).
#[must_use]
pub fn run_cli(cli: Cli) -> i32 {
    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = env!("CARGO_PKG_NAME");
            generate(shell, &mut cmd, bin_name, &mut io::stdout());
            Ok(())
        }
        Commands::Run { config, plantuml_jar } => with_config(&config, |cfg| {
            let fetcher = AzCliFetcher::new(cfg.subscriptions.clone());
            discover(cfg, &fetcher, quiet)?;
            expand_inventory(cfg, &fetcher, quiet)?;
            build_graph(cfg, quiet)?;
            emit_puml(cfg, &PumlOptions::default(), quiet)?;
            render_svg(cfg, plantuml_jar.as_deref(), quiet)?;
            write_docs(cfg, quiet)
        }),
        Commands::Discover { config } => with_config(&config, |cfg| {
            discover(cfg, &AzCliFetcher::new(cfg.subscriptions.clone()), quiet).map(|_| ())
        }),
        Commands::Expand { config } => with_config(&config, |cfg| {
            expand_inventory(cfg, &AzCliFetcher::new(cfg.subscriptions.clone()), quiet).map(|_| ())
        }),
        Commands::Graph { config } => with_config(&config, |cfg| build_graph(cfg, quiet).map(|_| ())),
        Commands::Puml { config, edge_labels } => with_config(&config, |cfg| {
            let opts = PumlOptions { edge_labels, ..PumlOptions::default() };
            emit_puml(cfg, &opts, quiet).map(|_| ())
        }),
        Commands::Render { config, plantuml_jar } => {
            with_config(&config, |cfg| render_svg(cfg, plantuml_jar.as_deref(), quiet).map(|_| ()))
        }
        Commands::Docs { config } => with_config(&config, |cfg| write_docs(cfg, quiet)),
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            report_error(&e);
            1
        }
    }
}

fn with_config<F>(path: &Path, stage: F) -> Result<(), DiscoveryError>
where
    F: FnOnce(&AppConfig) -> Result<(), DiscoveryError>,
{
    let cfg = load_config_at(path)?;
    std::fs::create_dir_all(&cfg.output_dir)?;
    info!(app = %cfg.app, output_dir = %cfg.output_dir.display(), "loaded configuration");
    stage(&cfg)
}

fn report_error(e: &DiscoveryError) {
    eprintln!("Error: {e}");
    if let DiscoveryError::Fetch(fe) = e {
        eprintln!("Command: {}", fe.command_line());
        if let Some(stderr) = fe.stderr() {
            eprintln!("Stderr: {}", stderr.trim_end());
        }
    }
}

/// Query the seed scope and persist `seed.json`.
///
/// # Errors
/// Returns `DiscoveryError` if the query fails or the artifact cannot be written.
pub fn discover(cfg: &AppConfig, fetcher: &dyn ResourceFetcher, quiet: bool) -> Result<Vec<Resource>, DiscoveryError> {
    info!("running seed query");
    let seed = fetcher.query_by_scope(&cfg.seed_scope())?;
    write_json(&cfg.artifact(SEED_FILE), &seed)?;
    if !quiet {
        println!("discover: {} resources written to {SEED_FILE}", seed.len());
    }
    Ok(seed)
}

/// Expand the inventory (reusing `seed.json` when present) and optionally
/// fetch role assignments. Persists inventory, unresolved and rbac artifacts.
///
/// # Errors
/// Returns `DiscoveryError` on fatal fetch failures or I/O errors.
pub fn expand_inventory(
    cfg: &AppConfig,
    fetcher: &dyn ResourceFetcher,
    quiet: bool,
) -> Result<(Expansion, Vec<Resource>), DiscoveryError> {
    let seed_path = cfg.artifact(SEED_FILE);
    let expansion = if seed_path.exists() {
        info!(path = %seed_path.display(), "reusing existing seed");
        let seed: Vec<Resource> = read_json(&seed_path)?;
        expand::expand_from_seed(seed, fetcher, cfg.expand_options())?
    } else {
        expand::expand(&cfg.seed_scope(), fetcher, cfg.expand_options())?
    };

    let rbac = if cfg.include_rbac {
        info!("querying role assignments");
        fetcher.query_relations(&expand::build_rbac_scopes(&expansion.inventory))?
    } else {
        Vec::new()
    };

    write_json(&cfg.artifact(INVENTORY_FILE), &expansion.inventory)?;
    write_json(&cfg.artifact(UNRESOLVED_FILE), &expansion.unresolved)?;
    write_json(&cfg.artifact(RBAC_FILE), &rbac)?;
    if !quiet {
        println!(
            "expand: {} resources, {} unresolved, {} role assignments ({} iterations{})",
            expansion.inventory.len(),
            expansion.unresolved.len(),
            rbac.len(),
            expansion.iterations,
            if expansion.closed { "" } else { ", cap reached" }
        );
    }
    Ok((expansion, rbac))
}

/// Build `graph.json` from the persisted inventory and role assignments.
///
/// # Errors
/// Returns `DiscoveryError` if the inputs cannot be read or the graph written.
pub fn build_graph(cfg: &AppConfig, quiet: bool) -> Result<ResourceGraph, DiscoveryError> {
    let inventory: Vec<Resource> = read_json(&cfg.artifact(INVENTORY_FILE))?;
    let rbac: Vec<Resource> = read_json_or_default(&cfg.artifact(RBAC_FILE))?;
    let graph = ResourceGraph::build(&inventory, &rbac);
    graph.save_json(&cfg.artifact(GRAPH_FILE))?;
    if !quiet {
        println!("graph: {} nodes, {} edges", graph.nodes.len(), graph.edges.len());
    }
    Ok(graph)
}

/// Write `diagram.puml` from `graph.json`.
///
/// # Errors
/// Returns `DiscoveryError` if the graph cannot be read or the diagram written.
pub fn emit_puml(cfg: &AppConfig, opts: &PumlOptions, quiet: bool) -> Result<PathBuf, DiscoveryError> {
    let graph = ResourceGraph::load_json(&cfg.artifact(GRAPH_FILE))?;
    let path = cfg.artifact(PUML_FILE);
    std::fs::write(&path, PumlGenerator::new().generate_with_options(&graph, opts))?;
    if !quiet {
        println!("puml: written to {}", path.display());
    }
    Ok(path)
}

/// Render `diagram.puml` to SVG.
///
/// # Errors
/// Returns `DiscoveryError::Render` if the PlantUML jar cannot be run.
pub fn render_svg(cfg: &AppConfig, jar_flag: Option<&str>, quiet: bool) -> Result<PathBuf, DiscoveryError> {
    let jar = SvgRenderer::resolve_jar(jar_flag, cfg.plantuml_jar.as_deref());
    let svg = SvgRenderer::new(jar).render(&cfg.artifact(PUML_FILE), &cfg.output_dir)?;
    if !quiet {
        println!("render: written to {}", svg.display());
    }
    Ok(svg)
}

/// Write `catalog.md` and `edges.md`.
///
/// # Errors
/// Returns `DiscoveryError` if inputs cannot be read or reports written.
pub fn write_docs(cfg: &AppConfig, quiet: bool) -> Result<(), DiscoveryError> {
    let inventory: Vec<Resource> = read_json(&cfg.artifact(INVENTORY_FILE))?;
    let graph = ResourceGraph::load_json(&cfg.artifact(GRAPH_FILE))?;
    let unresolved: Vec<String> = read_json_or_default(&cfg.artifact(UNRESOLVED_FILE))?;
    report::write_catalog(&inventory, &cfg.output_dir)?;
    report::write_edges(&graph, &unresolved, &cfg.output_dir)?;
    if !quiet {
        println!("docs: catalog.md and edges.md written");
    }
    Ok(())
}
