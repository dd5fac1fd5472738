use azdisc::app;
use azdisc::errors::FetchError;
use azdisc::fetch::{ResourceFetcher, SeedScope};
use azdisc::graph::{EdgeKind, Resource};
use azdisc::utils::config::AppConfig;
use azdisc::visualization::PumlOptions;
use serde_json::json;
use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;

const VM: &str = "/subscriptions/s1/resourceGroups/rg-app/providers/Microsoft.Compute/virtualMachines/vm1";
const NIC: &str = "/subscriptions/s1/resourceGroups/rg-app/providers/Microsoft.Network/networkInterfaces/nic1";
const SUBNET: &str =
    "/subscriptions/s1/resourceGroups/rg-net/providers/Microsoft.Network/virtualNetworks/vnet1/subnets/default";
const VNET: &str = "/subscriptions/s1/resourceGroups/rg-net/providers/Microsoft.Network/virtualNetworks/vnet1";
const NSG: &str = "/subscriptions/s1/resourceGroups/rg-sec/providers/Microsoft.Network/networkSecurityGroups/gone";
const ROLE: &str = "/subscriptions/s1/resourceGroups/rg-app/providers/Microsoft.Authorization/roleAssignments/ra1";

fn resource(id: &str, rtype: &str, rg: &str, properties: serde_json::Value) -> Resource {
    Resource {
        id: id.into(),
        name: id.rsplit('/').next().unwrap_or_default().into(),
        resource_type: rtype.into(),
        location: "westeurope".into(),
        subscription_id: "s1".into(),
        resource_group: rg.into(),
        properties,
    }
}

/// In-memory tenant: seed holds the VM, everything else is reachable by id.
struct FakeTenant {
    by_id: HashMap<String, Resource>,
    seed: Vec<Resource>,
    relations: Vec<Resource>,
    id_calls: Cell<usize>,
}

impl FakeTenant {
    fn new() -> Self {
        let vm = resource(
            VM,
            "Microsoft.Compute/virtualMachines",
            "rg-app",
            json!({ "networkProfile": { "networkInterfaces": [ { "id": NIC } ] } }),
        );
        let nic = resource(
            NIC,
            "Microsoft.Network/networkInterfaces",
            "rg-app",
            json!({
                "ipConfigurations": [ { "properties": { "subnet": { "id": SUBNET } } } ],
                "networkSecurityGroup": { "id": NSG }
            }),
        );
        let subnet = resource(SUBNET, "Microsoft.Network/virtualNetworks/subnets", "rg-net", json!({}));
        let vnet = resource(VNET, "Microsoft.Network/virtualNetworks", "rg-net", json!({ "subnets": [] }));
        let role = resource(
            ROLE,
            "Microsoft.Authorization/roleAssignments",
            "rg-app",
            json!({ "scope": VM, "principalId": "p1" }),
        );
        let by_id = [nic, subnet, vnet].into_iter().map(|r| (r.key(), r)).collect();
        Self { by_id, seed: vec![vm], relations: vec![role], id_calls: Cell::new(0) }
    }
}

impl ResourceFetcher for FakeTenant {
    fn query_by_scope(&self, _scope: &SeedScope) -> Result<Vec<Resource>, FetchError> {
        Ok(self.seed.clone())
    }

    fn query_by_ids(&self, ids: &[String]) -> Result<Vec<Resource>, FetchError> {
        self.id_calls.set(self.id_calls.get() + 1);
        Ok(ids.iter().filter_map(|id| self.by_id.get(id).cloned()).collect())
    }

    fn query_relations(&self, scopes: &[String]) -> Result<Vec<Resource>, FetchError> {
        let scopes: Vec<String> = scopes.iter().map(|s| s.to_lowercase()).collect();
        Ok(self
            .relations
            .iter()
            .filter(|r| r.props().get("scope").as_str().is_some_and(|s| scopes.contains(&s.to_lowercase())))
            .cloned()
            .collect())
    }
}

fn config(out: &Path, include_rbac: bool) -> AppConfig {
    AppConfig {
        app: "pipeline".into(),
        subscriptions: vec!["s1".into()],
        seed_resource_groups: vec!["rg-app".into()],
        output_dir: out.to_path_buf(),
        include_rbac,
        max_iterations: 50,
        batch_size: 200,
        plantuml_jar: None,
    }
}

#[test]
fn full_pipeline_with_fake_tenant() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), true);
    let tenant = FakeTenant::new();

    let seed = app::discover(&cfg, &tenant, true).unwrap();
    assert_eq!(seed.len(), 1);
    assert!(dir.path().join("seed.json").exists());

    let (expansion, rbac) = app::expand_inventory(&cfg, &tenant, true).unwrap();
    // vm -> nic -> subnet; vnet is only reachable from the subnet id prefix, not as a reference
    let keys: Vec<String> = expansion.inventory.iter().map(Resource::key).collect();
    assert!(keys.contains(&NIC.to_lowercase()));
    assert!(keys.contains(&SUBNET.to_lowercase()));
    assert_eq!(expansion.unresolved, vec![NSG.to_lowercase()]);
    assert!(expansion.closed);
    assert_eq!(rbac.len(), 1);

    let graph = app::build_graph(&cfg, true).unwrap();
    let has = |src: &str, dst: &str, kind: EdgeKind| {
        graph.edges.iter().any(|e| e.src == src.to_lowercase() && e.dst == dst.to_lowercase() && e.kind == kind)
    };
    assert!(has(VM, NIC, EdgeKind::Dependency));
    assert!(has(NIC, SUBNET, EdgeKind::Dependency));
    assert!(has(NIC, NSG, EdgeKind::Dependency));
    assert!(has(SUBNET, VNET, EdgeKind::Dependency));
    assert!(has(VM, ROLE, EdgeKind::RbacAssignment));
    assert!(graph.node(NSG).is_some_and(|n| n.is_external));
    assert!(graph.node(VM).is_some_and(|n| !n.is_external));

    let puml = app::emit_puml(&cfg, &PumlOptions::default(), true).unwrap();
    let text = std::fs::read_to_string(puml).unwrap();
    assert!(text.contains("..>"));

    app::write_docs(&cfg, true).unwrap();
    let edges = std::fs::read_to_string(dir.path().join("edges.md")).unwrap();
    assert!(edges.contains("| rbac_assignment "));
    assert!(edges.contains("(1 total)"));
}

#[test]
fn expand_reuses_existing_seed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), false);
    let tenant = FakeTenant::new();

    // Seed on disk differs from what the tenant would return
    let nic_only = vec![tenant.by_id[&NIC.to_lowercase()].clone()];
    azdisc::utils::json::write_json(&dir.path().join("seed.json"), &nic_only).unwrap();

    let (expansion, rbac) = app::expand_inventory(&cfg, &tenant, true).unwrap();
    let keys: Vec<String> = expansion.inventory.iter().map(Resource::key).collect();
    assert!(!keys.contains(&VM.to_lowercase()));
    assert!(keys.contains(&SUBNET.to_lowercase()));
    assert!(rbac.is_empty());
    let rbac_file: Vec<Resource> = azdisc::utils::json::read_json(&dir.path().join("rbac.json")).unwrap();
    assert!(rbac_file.is_empty());
}

#[test]
fn expansion_is_independent_of_fetch_order() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let tenant = FakeTenant::new();
    let mut reversed = FakeTenant::new();
    reversed.seed.reverse();

    let a = app::expand_inventory(&config(dir_a.path(), false), &tenant, true).unwrap().0;
    let b = app::expand_inventory(&config(dir_b.path(), false), &reversed, true).unwrap().0;
    assert_eq!(a.unresolved, b.unresolved);
    assert!(tenant.id_calls.get() >= 2);

    let ga = app::build_graph(&config(dir_a.path(), false), true).unwrap();
    let gb = app::build_graph(&config(dir_b.path(), false), true).unwrap();
    assert_eq!(ga, gb);
}
