//! Per-type edge extraction rules.
//!
//! A rule is a pure function from one resource to the dependency edges (and
//! derived nodes) it implies. Rules are looked up by normalized resource type
//! in a [`RuleRegistry`]; registering a new type never touches the builder.
use super::lookup::Lookup;
use super::{Node, Resource};
use crate::ids;
use std::collections::HashMap;

pub const VIRTUAL_MACHINE: &str = "microsoft.compute/virtualmachines";
pub const NETWORK_INTERFACE: &str = "microsoft.network/networkinterfaces";
pub const SUBNET: &str = "microsoft.network/virtualnetworks/subnets";
pub const VIRTUAL_NETWORK: &str = "microsoft.network/virtualnetworks";
pub const PRIVATE_ENDPOINT: &str = "microsoft.network/privateendpoints";
pub const PUBLIC_IP: &str = "microsoft.network/publicipaddresses";
pub const LOAD_BALANCER: &str = "microsoft.network/loadbalancers";
pub const APPLICATION_GATEWAY: &str = "microsoft.network/applicationgateways";
pub const WEB_SITE: &str = "microsoft.web/sites";
pub const SQL_DATABASE: &str = "microsoft.sql/servers/databases";

/// What a rule found for one resource.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    /// Dependency edges as `(dependent, dependency)`.
    pub edges: Vec<(String, String)>,
    /// Nodes described inline by the resource (embedded sub-resources).
    pub nodes: Vec<Node>,
}

impl Extraction {
    fn link(&mut self, src: &str, dst: Option<&str>) {
        if let Some(dst) = dst {
            self.edges.push((src.to_string(), dst.to_string()));
        }
    }
}

pub type EdgeRule = fn(&Resource) -> Extraction;

#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, EdgeRule>,
}

impl RuleRegistry {
    /// An empty registry: every resource becomes an isolated node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        r.register(VIRTUAL_MACHINE, virtual_machine);
        r.register(NETWORK_INTERFACE, network_interface);
        r.register(SUBNET, subnet);
        r.register(VIRTUAL_NETWORK, virtual_network);
        r.register(PRIVATE_ENDPOINT, private_endpoint);
        r.register(PUBLIC_IP, public_ip);
        r.register(LOAD_BALANCER, load_balancer);
        r.register(APPLICATION_GATEWAY, application_gateway);
        r.register(WEB_SITE, web_site);
        r.register(SQL_DATABASE, sql_database);
        r
    }

    /// Register (or replace) the rule for `resource_type`.
    pub fn register(&mut self, resource_type: &str, rule: EdgeRule) {
        self.rules.insert(ids::normalize(resource_type), rule);
    }

    #[must_use]
    pub fn get(&self, resource_type: &str) -> Option<EdgeRule> {
        self.rules.get(&ids::normalize(resource_type)).copied()
    }

    #[must_use]
    pub fn types(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        out.sort_unstable();
        out
    }
}

/// NIC list, OS disk and data disks.
pub fn virtual_machine(r: &Resource) -> Extraction {
    let mut x = Extraction::default();
    let props = r.props();
    for nic in props.path(&["networkProfile", "networkInterfaces"]).items() {
        x.link(&r.id, nic.id());
    }
    x.link(&r.id, props.path(&["storageProfile", "osDisk", "managedDisk"]).id());
    for disk in props.path(&["storageProfile", "dataDisks"]).items() {
        x.link(&r.id, disk.get("managedDisk").id());
    }
    x
}

/// Subnets of every ip configuration plus the attached security group.
pub fn network_interface(r: &Resource) -> Extraction {
    let mut x = Extraction::default();
    let props = r.props();
    for ip_cfg in props.get("ipConfigurations").items() {
        x.link(&r.id, ip_cfg.path(&["properties", "subnet"]).id());
    }
    x.link(&r.id, props.get("networkSecurityGroup").id());
    x
}

pub fn subnet(r: &Resource) -> Extraction {
    let mut x = Extraction::default();
    let parent = ids::derive_parent(&r.id, "subnets");
    x.link(&r.id, Some(parent.as_str()));
    subnet_attachments(&mut x, &r.id, r.props());
    x
}

fn subnet_attachments(x: &mut Extraction, subnet_id: &str, props: Lookup<'_>) {
    x.link(subnet_id, props.get("networkSecurityGroup").id());
    x.link(subnet_id, props.get("routeTable").id());
}

/// Peerings, and subnets declared inline in the network's properties.
pub fn virtual_network(r: &Resource) -> Extraction {
    let mut x = Extraction::default();
    let props = r.props();
    for peering in props.get("virtualNetworkPeerings").items() {
        x.link(&r.id, peering.path(&["properties", "remoteVirtualNetwork"]).id());
    }
    for sn in props.get("subnets").items() {
        let Some(subnet_id) = sn.id() else { continue };
        let id = ids::normalize(subnet_id);
        let name = sn.get("name").as_str().unwrap_or_else(|| ids::last_segment(&id)).to_string();
        x.nodes.push(Node {
            id: id.clone(),
            name,
            node_type: SUBNET.to_string(),
            location: r.location.clone(),
            resource_group: r.resource_group.clone(),
            subscription_id: r.subscription_id.clone(),
            is_external: false,
        });
        x.link(&id, Some(r.id.as_str()));
        subnet_attachments(&mut x, &id, sn.get("properties"));
    }
    x
}

pub fn private_endpoint(r: &Resource) -> Extraction {
    let mut x = Extraction::default();
    let props = r.props();
    x.link(&r.id, props.get("subnet").id());
    for conn in props.get("privateLinkServiceConnections").items() {
        x.link(&r.id, conn.path(&["properties", "privateLinkServiceId"]).as_str());
    }
    x
}

/// The ip configuration id names a child of the owning NIC or gateway.
pub fn public_ip(r: &Resource) -> Extraction {
    let mut x = Extraction::default();
    let owner = r.props().get("ipConfiguration").id().and_then(|id| ids::strip_child(id, 2));
    x.link(&r.id, owner.as_deref());
    x
}

fn backend_pool_owners(x: &mut Extraction, r: &Resource) {
    for pool in r.props().get("backendAddressPools").items() {
        for ip_cfg in pool.path(&["properties", "backendIPConfigurations"]).items() {
            let owner = ip_cfg.id().and_then(|id| ids::strip_child(id, 2));
            x.link(&r.id, owner.as_deref());
        }
    }
}

pub fn load_balancer(r: &Resource) -> Extraction {
    let mut x = Extraction::default();
    backend_pool_owners(&mut x, r);
    x
}

pub fn application_gateway(r: &Resource) -> Extraction {
    let mut x = Extraction::default();
    backend_pool_owners(&mut x, r);
    for gw_cfg in r.props().get("gatewayIPConfigurations").items() {
        x.link(&r.id, gw_cfg.path(&["properties", "subnet"]).id());
    }
    x
}

pub fn web_site(r: &Resource) -> Extraction {
    let mut x = Extraction::default();
    let props = r.props();
    x.link(&r.id, props.get("serverFarmId").as_str());
    x.link(&r.id, props.get("virtualNetworkSubnetId").as_str());
    x
}

pub fn sql_database(r: &Resource) -> Extraction {
    let mut x = Extraction::default();
    let server = ids::derive_parent(&r.id, "databases");
    x.link(&r.id, Some(server.as_str()));
    x
}
