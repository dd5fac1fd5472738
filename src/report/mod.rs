//! Markdown reports over the inventory and the graph.
use crate::errors::DiscoveryError;
use crate::graph::{Resource, ResourceGraph};
use crate::utils::table;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const TOP_NODES: usize = 20;
const UNRESOLVED_SAMPLES: usize = 20;

fn or_unknown(s: &str) -> &str {
    if s.is_empty() {
        "(unknown)"
    } else {
        s
    }
}

fn count_table(label: &str, counts: &BTreeMap<&str, usize>, total: usize) -> String {
    let mut rows: Vec<Vec<String>> = counts.iter().map(|(k, v)| vec![(*k).to_string(), v.to_string()]).collect();
    rows.push(vec!["**Total**".to_string(), format!("**{total}**")]);
    format!("## By {label}\n\n{}\n", table::render(&[label, "Count"], &rows))
}

/// Resource counts by type, region, resource group and subscription.
#[must_use]
pub fn catalog_markdown(inventory: &[Resource]) -> String {
    let mut by_type = BTreeMap::new();
    let mut by_region = BTreeMap::new();
    let mut by_rg = BTreeMap::new();
    let mut by_sub = BTreeMap::new();
    for r in inventory {
        *by_type.entry(or_unknown(&r.resource_type)).or_insert(0) += 1;
        *by_region.entry(or_unknown(&r.location)).or_insert(0) += 1;
        *by_rg.entry(or_unknown(&r.resource_group)).or_insert(0) += 1;
        *by_sub.entry(or_unknown(&r.subscription_id)).or_insert(0) += 1;
    }
    let total = inventory.len();
    let mut out = String::from("# Resource Catalog\n\n");
    for (label, counts) in
        [("Type", &by_type), ("Region", &by_region), ("Resource Group", &by_rg), ("Subscription", &by_sub)]
    {
        out.push_str(&count_table(label, counts, total));
        out.push('\n');
    }
    out
}

/// Edge counts by kind, best connected nodes and unresolved references.
#[must_use]
pub fn edges_markdown(graph: &ResourceGraph, unresolved: &[String]) -> String {
    let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
    for e in &graph.edges {
        *by_kind.entry(e.kind.as_str()).or_default() += 1;
    }

    let mut degree: Vec<(&str, usize)> = graph.degree().into_iter().collect();
    degree.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    degree.truncate(TOP_NODES);

    let mut out = String::from("# Graph Edges Report\n\n");

    let mut kind_rows: Vec<Vec<String>> = by_kind.iter().map(|(k, v)| vec![(*k).to_string(), v.to_string()]).collect();
    kind_rows.push(vec!["**Total**".to_string(), format!("**{}**", graph.edges.len())]);
    out.push_str("## Edge Counts by Kind\n\n");
    out.push_str(&table::render(&["Kind", "Count"], &kind_rows));
    out.push_str("\n\n");

    let degree_rows: Vec<Vec<String>> = degree.iter().map(|(id, d)| vec![(*id).to_string(), d.to_string()]).collect();
    out.push_str(&format!("## Top {TOP_NODES} Nodes by Degree\n\n"));
    out.push_str(&table::render(&["Node ID", "Degree"], &degree_rows));
    out.push_str("\n\n");

    out.push_str(&format!("## Unresolved References ({} total)\n\n", unresolved.len()));
    if unresolved.is_empty() {
        out.push_str("_None_\n");
    } else {
        let mut sorted: Vec<&String> = unresolved.iter().collect();
        sorted.sort();
        out.push_str(&format!("First {UNRESOLVED_SAMPLES} samples:\n\n"));
        for id in sorted.into_iter().take(UNRESOLVED_SAMPLES) {
            out.push_str(&format!("- {id}\n"));
        }
    }
    out
}

/// Write `catalog.md` into `output_dir`.
///
/// # Errors
/// Returns `DiscoveryError::Io` if the directory or file cannot be written.
pub fn write_catalog(inventory: &[Resource], output_dir: &Path) -> Result<PathBuf, DiscoveryError> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join("catalog.md");
    std::fs::write(&path, catalog_markdown(inventory))?;
    Ok(path)
}

/// Write `edges.md` into `output_dir`.
///
/// # Errors
/// Returns `DiscoveryError::Io` if the directory or file cannot be written.
pub fn write_edges(graph: &ResourceGraph, unresolved: &[String], output_dir: &Path) -> Result<PathBuf, DiscoveryError> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join("edges.md");
    std::fs::write(&path, edges_markdown(graph, unresolved))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeKind};

    fn res(id: &str, t: &str, loc: &str) -> Resource {
        Resource {
            id: id.into(),
            resource_type: t.into(),
            location: loc.into(),
            resource_group: "rg".into(),
            subscription_id: "s1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn catalog_counts_and_totals() {
        let md = catalog_markdown(&[res("/a", "t1", "eu"), res("/b", "t1", ""), res("/c", "t2", "eu")]);
        assert!(md.starts_with("# Resource Catalog"));
        assert!(md.contains("## By Type"));
        assert!(md.contains("## By Subscription"));
        assert!(md.contains("| t1 "));
        assert!(md.contains("(unknown)"));
        assert_eq!(md.matches("**3**").count(), 4);
    }

    #[test]
    fn edges_report_sections() {
        let g = ResourceGraph {
            nodes: vec![],
            edges: vec![
                Edge { src: "/a".into(), dst: "/b".into(), kind: EdgeKind::Dependency },
                Edge { src: "/a".into(), dst: "/c".into(), kind: EdgeKind::Dependency },
                Edge { src: "/s".into(), dst: "/a".into(), kind: EdgeKind::RbacAssignment },
            ],
        };
        let md = edges_markdown(&g, &["/z".into(), "/y".into()]);
        assert!(md.contains("| dependency "));
        assert!(md.contains("| rbac_assignment "));
        assert!(md.contains("**3**"));
        // /a has degree 3 and is listed first
        let top = md.split("## Top 20 Nodes by Degree").nth(1).unwrap();
        assert!(top.lines().nth(4).unwrap().starts_with("| /a "));
        assert!(md.contains("## Unresolved References (2 total)"));
        assert!(md.find("- /y").unwrap() < md.find("- /z").unwrap());
    }

    #[test]
    fn edges_report_without_unresolved() {
        let md = edges_markdown(&ResourceGraph::default(), &[]);
        assert!(md.contains("_None_"));
    }
}
