//! Resource model and graph builder.
//!
//! This module defines the records returned by the fetcher (`Resource`), the
//! normalized graph (`ResourceGraph`, `Node`, `Edge`) and the single-pass
//! `GraphBuilder` that turns an inventory plus relation records into a graph.
//!
//! Per-type edge extraction lives in [`rules`]; nested property access goes
//! through [`lookup::Lookup`].
use crate::errors::DiscoveryError;
use crate::ids;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::debug;

pub mod lookup;
pub mod rules;

use lookup::Lookup;
use rules::RuleRegistry;

/// A resource record as returned by the graph-query API.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, rename = "type", deserialize_with = "null_as_empty")]
    pub resource_type: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subscription_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resource_group: String,
    #[serde(default)]
    pub properties: Value,
}

// Query rows carry explicit nulls for fields that do not apply to a type
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Resource {
    #[must_use]
    pub fn key(&self) -> String {
        ids::normalize(&self.id)
    }

    #[must_use]
    pub fn normalized_type(&self) -> String {
        ids::normalize(&self.resource_type)
    }

    #[must_use]
    pub fn props(&self) -> Lookup<'_> {
        Lookup::new(&self.properties)
    }

    /// Identifiers referenced from this record's properties.
    #[must_use]
    pub fn references(&self) -> BTreeSet<String> {
        ids::extract_references(&self.properties)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Dependency,
    RbacAssignment,
}

impl EdgeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Dependency => "dependency",
            EdgeKind::RbacAssignment => "rbac_assignment",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub location: String,
    pub resource_group: String,
    pub subscription_id: String,
    pub is_external: bool,
}

impl Node {
    #[must_use]
    pub fn from_resource(resource: &Resource) -> Self {
        Self {
            id: resource.key(),
            name: resource.name.clone(),
            node_type: resource.normalized_type(),
            location: resource.location.clone(),
            resource_group: resource.resource_group.clone(),
            subscription_id: resource.subscription_id.clone(),
            is_external: false,
        }
    }

    /// Placeholder for an identifier that is referenced but was never fetched.
    #[must_use]
    pub fn external(id: &str) -> Self {
        let id = ids::normalize(id);
        Self {
            name: ids::last_segment(&id).to_string(),
            id,
            node_type: String::new(),
            location: String::new(),
            resource_group: String::new(),
            subscription_id: String::new(),
            is_external: true,
        }
    }
}

/// Directed relation. Field order drives the derived ordering: `(src, dst, kind)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub src: String,
    pub dst: String,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResourceGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl ResourceGraph {
    /// Build a graph with the default rule registry.
    #[must_use]
    pub fn build(inventory: &[Resource], relations: &[Resource]) -> Self {
        GraphBuilder::build_with(&RuleRegistry::with_defaults(), inventory, relations)
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        let key = ids::normalize(id);
        self.nodes
            .binary_search_by(|n| n.id.as_str().cmp(key.as_str()))
            .ok()
            .map(|i| &self.nodes[i])
    }

    /// In-degree plus out-degree for every node touched by an edge.
    #[must_use]
    pub fn degree(&self) -> HashMap<&str, usize> {
        let mut out: HashMap<&str, usize> = HashMap::new();
        for e in &self.edges {
            *out.entry(e.src.as_str()).or_default() += 1;
            *out.entry(e.dst.as_str()).or_default() += 1;
        }
        out
    }

    /// Save the graph as deterministic JSON.
    ///
    /// # Errors
    /// Returns `DiscoveryError` if serialization or writing fails.
    pub fn save_json(&self, path: &Path) -> Result<(), DiscoveryError> {
        crate::utils::json::write_json(path, self)
    }

    /// Load a graph previously written by [`ResourceGraph::save_json`].
    ///
    /// # Errors
    /// Returns `DiscoveryError` if the file cannot be read or parsed.
    pub fn load_json(path: &Path) -> Result<Self, DiscoveryError> {
        crate::utils::json::read_json(path)
    }
}

/// State for one graph construction pass.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: BTreeMap<String, Node>,
    edges: BTreeSet<Edge>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the full pipeline: inventory nodes, rule edges, relation edges.
    #[must_use]
    pub fn build_with(
        registry: &RuleRegistry,
        inventory: &[Resource],
        relations: &[Resource],
    ) -> ResourceGraph {
        let mut builder = GraphBuilder::new();
        for resource in inventory {
            builder.add_resource(resource);
        }
        for resource in inventory {
            builder.apply_rules(registry, resource);
        }
        for assignment in relations {
            builder.add_relation(assignment);
        }
        builder.finish()
    }

    /// Insert (or overwrite) the node for a fetched resource.
    pub fn add_resource(&mut self, resource: &Resource) {
        let node = Node::from_resource(resource);
        if node.id.is_empty() {
            return;
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Insert a node derived from another record. It replaces a placeholder
    /// but never a node that came from the inventory.
    pub fn declare(&mut self, node: Node) {
        match self.nodes.get(&node.id) {
            Some(existing) if !existing.is_external => {}
            _ => {
                self.nodes.insert(node.id.clone(), node);
            }
        }
    }

    /// Make sure a node exists for `id`, creating a placeholder if needed.
    /// Returns the normalized id, or `None` for an empty id.
    pub fn ensure_node(&mut self, id: &str) -> Option<String> {
        let key = ids::normalize(id);
        if key.is_empty() {
            return None;
        }
        if !self.nodes.contains_key(&key) {
            self.nodes.insert(key.clone(), Node::external(&key));
        }
        Some(key)
    }

    /// Add an edge, materializing both endpoints. Self-loops and empty
    /// endpoints are dropped.
    pub fn add_edge(&mut self, src: &str, dst: &str, kind: EdgeKind) {
        let (src, dst) = (ids::normalize(src), ids::normalize(dst));
        if src.is_empty() || dst.is_empty() || src == dst {
            return;
        }
        self.ensure_node(&src);
        self.ensure_node(&dst);
        self.edges.insert(Edge { src, dst, kind });
    }

    pub fn apply_rules(&mut self, registry: &RuleRegistry, resource: &Resource) {
        let rtype = resource.normalized_type();
        let Some(rule) = registry.get(&rtype) else {
            return;
        };
        let extraction = rule(resource);
        debug!(
            resource = %resource.key(),
            edges = extraction.edges.len(),
            nodes = extraction.nodes.len(),
            "applied edge rule"
        );
        for node in extraction.nodes {
            self.declare(node);
        }
        for (src, dst) in extraction.edges {
            self.add_edge(&src, &dst, EdgeKind::Dependency);
        }
    }

    /// Add a role-assignment style record: its own node plus `scope -> record`.
    pub fn add_relation(&mut self, assignment: &Resource) {
        let id = assignment.key();
        if id.is_empty() {
            return;
        }
        if !self.nodes.contains_key(&id) {
            self.nodes.insert(id.clone(), Node::from_resource(assignment));
        }
        if let Some(scope) = assignment.props().get("scope").as_str() {
            self.add_edge(scope, &id, EdgeKind::RbacAssignment);
        }
    }

    #[must_use]
    pub fn finish(self) -> ResourceGraph {
        ResourceGraph { nodes: self.nodes.into_values().collect(), edges: self.edges.into_iter().collect() }
    }
}
