use crate::errors::DiscoveryError;
use crate::graph::{EdgeKind, ResourceGraph};
use crate::ids::slugify;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Azure-PlantUML sprite macros for well-known resource types.
const TYPE_MACROS: &[(&str, &str)] = &[
    ("microsoft.compute/virtualmachines", "AzureVirtualMachine"),
    ("microsoft.compute/disks", "AzureManagedDisks"),
    ("microsoft.network/virtualnetworks", "AzureVirtualNetwork"),
    ("microsoft.network/virtualnetworks/subnets", "AzureVirtualNetwork"),
    ("microsoft.network/networkinterfaces", "AzureNetworkInterface"),
    ("microsoft.network/networksecuritygroups", "AzureNetworkSecurityGroup"),
    ("microsoft.network/publicipaddresses", "AzurePublicIPAddress"),
    ("microsoft.network/loadbalancers", "AzureLoadBalancer"),
    ("microsoft.network/applicationgateways", "AzureApplicationGateway"),
    ("microsoft.network/routetables", "AzureRouteTable"),
    ("microsoft.network/privateendpoints", "AzurePrivateEndpoint"),
    ("microsoft.storage/storageaccounts", "AzureStorageAccount"),
    ("microsoft.web/sites", "AzureAppService"),
    ("microsoft.keyvault/vaults", "AzureKeyVault"),
    ("microsoft.sql/servers", "AzureSQLServer"),
    ("microsoft.sql/servers/databases", "AzureSQLDatabase"),
    ("microsoft.authorization/roleassignments", "AzureRoleAssignment"),
];

const INCLUDE_GROUPS: &[&str] = &["Compute", "Network", "Storage", "Web", "Integration", "Security"];

#[derive(Debug, Clone)]
pub struct PumlOptions {
    /// Location of the Azure-PlantUML `dist` directory, as seen from the diagram.
    pub azure_puml_root: String,
    /// Label every edge with its kind.
    pub edge_labels: bool,
}

impl Default for PumlOptions {
    fn default() -> Self {
        Self { azure_puml_root: "./vendor/azure-plantuml/dist".to_string(), edge_labels: false }
    }
}

fn macro_for(node_type: &str) -> Option<&'static str> {
    TYPE_MACROS.iter().find(|(t, _)| *t == node_type).map(|(_, m)| *m)
}

fn type_short(node_type: &str) -> &str {
    if node_type.is_empty() {
        "unknown"
    } else {
        node_type.rsplit('/').next().unwrap_or(node_type)
    }
}

fn escape_label(s: &str) -> String {
    s.replace('"', "'")
}

#[derive(Debug, Default)]
pub struct PumlGenerator;

impl PumlGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generate PlantUML with default options.
    #[must_use]
    pub fn generate(&self, graph: &ResourceGraph) -> String {
        self.generate_with_options(graph, &PumlOptions::default())
    }

    /// Nodes are nested location -> resource group -> short type; edges follow.
    #[must_use]
    pub fn generate_with_options(&self, graph: &ResourceGraph, opts: &PumlOptions) -> String {
        let mut s = String::from("@startuml\n");
        let _ = writeln!(s, "!define AzurePuml {}", opts.azure_puml_root);
        s.push_str("!include AzurePuml/AzureCommon.puml\n");
        for group in INCLUDE_GROUPS {
            let _ = writeln!(s, "!include AzurePuml/{group}/all.puml");
        }
        s.push('\n');

        let mut clusters: BTreeMap<(&str, &str, &str), Vec<_>> = BTreeMap::new();
        for node in &graph.nodes {
            let location = if node.location.is_empty() { "unknown" } else { node.location.as_str() };
            let rg = if node.resource_group.is_empty() { "external" } else { node.resource_group.as_str() };
            clusters.entry((location, rg, type_short(&node.node_type))).or_default().push(node);
        }

        for ((location, rg, short), nodes) in &clusters {
            let short = escape_label(short);
            let _ = writeln!(s, "package \"{}\" {{", escape_label(location));
            let _ = writeln!(s, "  package \"{}\" {{", escape_label(rg));
            let _ = writeln!(s, "    package \"{short}\" {{");
            for node in nodes {
                let alias = slugify(&node.id);
                let name = if node.name.is_empty() { crate::ids::last_segment(&node.id) } else { node.name.as_str() };
                let name = escape_label(name);
                match macro_for(&node.node_type) {
                    Some(m) => {
                        let _ = writeln!(s, "      {m}({alias}, \"{name}\")");
                    }
                    None => {
                        let _ = writeln!(s, "      rectangle \"{name}\\n({short})\" as {alias}");
                    }
                }
            }
            s.push_str("    }\n  }\n}\n\n");
        }

        s.push_str("' ---- edges ----\n");
        for edge in &graph.edges {
            let (src, dst) = (slugify(&edge.src), slugify(&edge.dst));
            if opts.edge_labels {
                let _ = writeln!(s, "{src} --> {dst} : {}", edge.kind.as_str());
            } else if edge.kind == EdgeKind::RbacAssignment {
                let _ = writeln!(s, "{src} ..> {dst}");
            } else {
                let _ = writeln!(s, "{src} --> {dst}");
            }
        }
        s.push_str("\n@enduml\n");
        s
    }
}

/// Renders `.puml` files to SVG with the PlantUML jar.
#[derive(Debug, Clone)]
pub struct SvgRenderer {
    java: String,
    jar: PathBuf,
}

impl SvgRenderer {
    #[must_use]
    pub fn new(jar: impl Into<PathBuf>) -> Self {
        Self { java: "java".to_string(), jar: jar.into() }
    }

    /// Use a specific `java` executable.
    #[must_use]
    pub fn with_java(mut self, java: impl Into<String>) -> Self {
        self.java = java.into();
        self
    }

    /// Pick the jar: explicit flag, then `PLANTUML_JAR`, then config, then `plantuml.jar`.
    #[must_use]
    pub fn resolve_jar(flag: Option<&str>, configured: Option<&str>) -> PathBuf {
        flag.map(PathBuf::from)
            .or_else(|| std::env::var_os("PLANTUML_JAR").filter(|v| !v.is_empty()).map(PathBuf::from))
            .or_else(|| configured.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("plantuml.jar"))
    }

    /// Render `puml` into `output_dir`, returning the SVG path.
    ///
    /// # Errors
    /// Returns `DiscoveryError::Render` if `java` cannot be launched or exits
    /// with a non-success status.
    pub fn render(&self, puml: &Path, output_dir: &Path) -> Result<PathBuf, DiscoveryError> {
        std::fs::create_dir_all(output_dir)?;
        let out_abs = std::fs::canonicalize(output_dir)?;
        debug!(jar = %self.jar.display(), puml = %puml.display(), "rendering svg");
        let output = std::process::Command::new(&self.java)
            .arg("-jar")
            .arg(&self.jar)
            .arg("-tsvg")
            .arg("-o")
            .arg(&out_abs)
            .arg(puml)
            .output()
            .map_err(|e| DiscoveryError::Render(format!("Failed to run '{}': {e}", self.java)))?;
        if !output.status.success() {
            return Err(DiscoveryError::Render(format!(
                "plantuml render failed for {} (code {:?}): {}",
                puml.display(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stem = puml.file_stem().and_then(|s| s.to_str()).unwrap_or("diagram");
        Ok(output_dir.join(format!("{stem}.svg")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

    fn node(id: &str, name: &str, node_type: &str, rg: &str) -> Node {
        Node {
            id: id.into(),
            name: name.into(),
            node_type: node_type.into(),
            location: if rg.is_empty() { String::new() } else { "westeurope".into() },
            resource_group: rg.into(),
            subscription_id: String::new(),
            is_external: rg.is_empty(),
        }
    }

    fn sample() -> ResourceGraph {
        ResourceGraph {
            nodes: vec![
                node("/s/rg/vm1", "vm \"one\"", "microsoft.compute/virtualmachines", "rg"),
                node("/s/rg/widget", "widget", "contoso.things/widgets", "rg"),
                node("/x/nic", "nic", "", ""),
            ],
            edges: vec![
                Edge { src: "/s/rg/vm1".into(), dst: "/x/nic".into(), kind: EdgeKind::Dependency },
                Edge { src: "/s/rg/widget".into(), dst: "/s/rg/vm1".into(), kind: EdgeKind::RbacAssignment },
            ],
        }
    }

    #[test]
    fn puml_has_header_clusters_and_edges() {
        let out = PumlGenerator::new().generate(&sample());
        assert!(out.starts_with("@startuml\n!define AzurePuml ./vendor/azure-plantuml/dist"));
        assert!(out.trim_end().ends_with("@enduml"));
        assert!(out.contains("package \"westeurope\" {"));
        assert!(out.contains("package \"unknown\" {\n  package \"external\" {\n    package \"unknown\" {"));
        assert!(out.contains("AzureVirtualMachine(s_rg_vm1, \"vm 'one'\")"));
        assert!(out.contains("rectangle \"widget\\n(widgets)\" as s_rg_widget"));
        assert!(out.contains("s_rg_vm1 --> x_nic"));
        assert!(out.contains("s_rg_widget ..> s_rg_vm1"));
    }

    #[test]
    fn puml_edge_labels_option() {
        let opts = PumlOptions { edge_labels: true, ..Default::default() };
        let out = PumlGenerator::new().generate_with_options(&sample(), &opts);
        assert!(out.contains("s_rg_vm1 --> x_nic : dependency"));
        assert!(out.contains("s_rg_widget --> s_rg_vm1 : rbac_assignment"));
    }

    #[test]
    fn puml_is_deterministic() {
        let g = sample();
        assert_eq!(PumlGenerator::new().generate(&g), PumlGenerator::new().generate(&g));
    }

    #[test]
    fn jar_resolution_prefers_flag() {
        assert_eq!(SvgRenderer::resolve_jar(Some("/opt/p.jar"), Some("/cfg.jar")), PathBuf::from("/opt/p.jar"));
    }

    #[test]
    fn render_reports_missing_java() {
        let dir = tempfile::tempdir().unwrap();
        let r = SvgRenderer::new("plantuml.jar").with_java("azdisc-test-no-such-java");
        let err = r.render(&dir.path().join("diagram.puml"), dir.path()).unwrap_err();
        assert!(matches!(err, DiscoveryError::Render(_)));
    }
}
