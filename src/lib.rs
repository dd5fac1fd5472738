//! azdisc: Azure resource discovery and diagramming
//!
//! Start from a set of seed resource groups, query Azure Resource Graph through
//! the `az` CLI, and keep following every ARM resource id found in resource
//! properties until nothing new turns up. The resulting inventory becomes a
//! dependency graph, a PlantUML diagram and markdown reports.
//!
//! # Pipeline
//! - `discover`: seed query, writes `seed.json`
//! - `expand`: reference closure, writes `inventory.json`, `unresolved.json`, `rbac.json`
//! - `graph`: rule based edge extraction, writes `graph.json`
//! - `puml` / `render`: `diagram.puml` and `diagram.svg`
//! - `docs`: `catalog.md` and `edges.md`
//!
//! # Quickstart (Library)
//! ```no_run
//! use azdisc::graph::{Resource, ResourceGraph};
//! use azdisc::visualization::PumlGenerator;
//!
//! let inventory: Vec<Resource> = azdisc::utils::json::read_json(std::path::Path::new("out/inventory.json"))
//!     .expect("read inventory");
//! let graph = ResourceGraph::build(&inventory, &[]);
//! println!("nodes: {} edges: {}", graph.nodes.len(), graph.edges.len());
//! let puml = PumlGenerator::new().generate(&graph);
//! std::fs::write("out/diagram.puml", puml).expect("write diagram");
//! ```
//!
//! # Quickstart (CLI)
//! ```text
//! azdisc run config.json
//! azdisc graph config.json && azdisc docs config.json
//! ```
pub mod app;
pub mod cli;
pub mod errors;
pub mod expand;
pub mod fetch;
pub mod graph;
pub mod ids;
pub mod report;
pub mod utils;
pub mod visualization;
