use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "azdisc",
    version,
    about = "Azure resource discovery and diagram tool",
    long_about = "Discover resources in seed resource groups through Azure Resource Graph, follow every referenced resource id until closure, then build a dependency graph, a PlantUML diagram and markdown reports. Each stage reads and writes JSON artifacts in the configured output directory."
)]
pub struct Cli {
    /// Suppress stage summaries on stdout
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,
    /// Log level for diagnostics on stderr (RUST_LOG overrides)
    #[arg(long, global = true, value_enum, default_value = "warn")]
    pub log_level: LogLevel,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run every stage: discover, expand, graph, puml, render, docs
    Run {
        /// Path to the JSON (or .toml) configuration file
        config: PathBuf,
        /// Path to plantuml.jar (falls back to PLANTUML_JAR, then the config)
        #[arg(long)]
        plantuml_jar: Option<String>,
    },
    /// Query the seed resource groups and write seed.json
    Discover {
        /// Path to the JSON (or .toml) configuration file
        config: PathBuf,
    },
    /// Follow references to closure; write inventory.json, unresolved.json and rbac.json
    Expand {
        /// Path to the JSON (or .toml) configuration file
        config: PathBuf,
    },
    /// Build graph.json from inventory.json and rbac.json
    Graph {
        /// Path to the JSON (or .toml) configuration file
        config: PathBuf,
    },
    /// Emit diagram.puml from graph.json
    Puml {
        /// Path to the JSON (or .toml) configuration file
        config: PathBuf,
        /// Label edges with their kind
        #[arg(long, default_value_t = false)]
        edge_labels: bool,
    },
    /// Render diagram.puml to diagram.svg with the PlantUML jar
    Render {
        /// Path to the JSON (or .toml) configuration file
        config: PathBuf,
        /// Path to plantuml.jar (falls back to PLANTUML_JAR, then the config)
        #[arg(long)]
        plantuml_jar: Option<String>,
    },
    /// Write catalog.md and edges.md
    Docs {
        /// Path to the JSON (or .toml) configuration file
        config: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
