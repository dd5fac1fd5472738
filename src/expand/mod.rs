//! Inventory expansion.
//!
//! Starting from a seed inventory, repeatedly fetch every referenced
//! identifier that has not been collected yet until no new identifier shows up
//! or the iteration cap is hit.
use crate::errors::FetchError;
use crate::fetch::{ResourceFetcher, SeedScope};
use crate::graph::Resource;
use crate::ids;
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ITERATIONS: usize = 50;
pub const DEFAULT_BATCH_SIZE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Upper bound on fetch rounds after the seed.
    pub max_iterations: usize,
    /// Identifiers per `query_by_ids` call.
    pub batch_size: usize,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self { max_iterations: DEFAULT_MAX_ITERATIONS, batch_size: DEFAULT_BATCH_SIZE }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    pub inventory: Vec<Resource>,
    /// Referenced but never returned, sorted.
    pub unresolved: Vec<String>,
    /// Fetch rounds performed after the seed.
    pub iterations: usize,
    /// False when the iteration cap stopped expansion before closure.
    pub closed: bool,
}

/// Fetch the seed for `scope`, then expand it.
///
/// # Errors
/// Returns `FetchError` if the seed query fails, or if a reference batch fails
/// in a way that is fatal (see [`FetchError::is_fatal`]).
pub fn expand<F: ResourceFetcher + ?Sized>(
    scope: &SeedScope,
    fetcher: &F,
    opts: ExpandOptions,
) -> Result<Expansion, FetchError> {
    info!(resource_groups = scope.resource_groups.len(), "running seed query");
    let seed = fetcher.query_by_scope(scope)?;
    expand_from_seed(seed, fetcher, opts)
}

/// Expand an already fetched seed inventory.
///
/// # Errors
/// Returns `FetchError` if a reference batch fails fatally.
pub fn expand_from_seed<F: ResourceFetcher + ?Sized>(
    seed: Vec<Resource>,
    fetcher: &F,
    opts: ExpandOptions,
) -> Result<Expansion, FetchError> {
    let mut state = ExpansionState::default();
    state.absorb(seed);

    let batch_size = opts.batch_size.max(1);
    let mut iterations = 0;
    let mut closed = false;
    while iterations < opts.max_iterations {
        let missing = state.missing();
        if missing.is_empty() {
            closed = true;
            break;
        }
        iterations += 1;
        info!(iteration = iterations, missing = missing.len(), "fetching referenced resources");

        let mut fetched_ids = BTreeSet::new();
        for batch in missing.chunks(batch_size) {
            match fetcher.query_by_ids(batch) {
                Ok(found) => {
                    debug!(requested = batch.len(), returned = found.len(), "reference batch");
                    fetched_ids.extend(state.absorb(found));
                }
                Err(e) if !e.is_fatal() => {
                    warn!(error = %e, ids = batch.len(), "reference batch failed; marking unresolved");
                }
                Err(e) => return Err(e),
            }
        }
        for id in missing {
            if !fetched_ids.contains(&id) && !state.collected.contains(&id) {
                state.unresolved.insert(id);
            }
        }
    }

    if !closed {
        // the last round may have reached closure exactly at the cap
        closed = state.missing().is_empty();
        if !closed {
            warn!(max_iterations = opts.max_iterations, "iteration cap reached before closure");
        }
    }

    info!(
        resources = state.inventory.len(),
        unresolved = state.unresolved.len(),
        iterations,
        closed,
        "expansion finished"
    );
    Ok(Expansion {
        inventory: state.inventory,
        unresolved: state.unresolved.into_iter().collect(),
        iterations,
        closed,
    })
}

#[derive(Debug, Default)]
struct ExpansionState {
    inventory: Vec<Resource>,
    collected: BTreeSet<String>,
    unresolved: BTreeSet<String>,
    referenced: BTreeSet<String>,
    /// Inventory prefix whose references are already in `referenced`.
    scanned: usize,
}

impl ExpansionState {
    /// Add resources not collected yet. Returns the ids of everything in
    /// `resources`, including ones that were already present.
    fn absorb(&mut self, resources: Vec<Resource>) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        for r in resources {
            let key = r.key();
            if key.is_empty() {
                continue;
            }
            seen.insert(key.clone());
            if self.collected.insert(key) {
                self.inventory.push(r);
            }
        }
        seen
    }

    /// Referenced ids that are neither collected nor known to be unresolvable.
    fn missing(&mut self) -> Vec<String> {
        let fresh = &self.inventory[self.scanned..];
        let refs = fresh
            .par_iter()
            .map(Resource::references)
            .reduce(BTreeSet::new, |mut a, b| {
                a.extend(b);
                a
            });
        self.referenced.extend(refs);
        self.scanned = self.inventory.len();

        self.referenced
            .iter()
            .filter(|id| !self.collected.contains(*id) && !self.unresolved.contains(*id))
            .cloned()
            .collect()
    }
}

/// Scopes used to look up role assignments: every resource id plus the
/// resource-group scope of each resource. Sorted and normalized.
#[must_use]
pub fn build_rbac_scopes(resources: &[Resource]) -> Vec<String> {
    let mut scopes = BTreeSet::new();
    for r in resources {
        let key = r.key();
        if !key.is_empty() {
            scopes.insert(key);
        }
        if !r.subscription_id.is_empty() && !r.resource_group.is_empty() {
            scopes.insert(ids::normalize(&format!(
                "/subscriptions/{}/resourcegroups/{}",
                r.subscription_id, r.resource_group
            )));
        }
    }
    scopes.into_iter().collect()
}
