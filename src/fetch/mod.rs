//! Resource fetching.
//!
//! [`ResourceFetcher`] is the seam between the expansion/graph core and the
//! query transport. [`AzCliFetcher`] implements it by shelling out to
//! `az graph query`, following skip tokens and splitting long subscription and
//! identifier lists into batches the service accepts.
use crate::errors::FetchError;
use crate::graph::Resource;
use serde::Deserialize;
use std::process::Command;
use tracing::debug;

const PROJECTION: &str = "project id, name, type, location, subscriptionId, resourceGroup, properties";
pub const SUBSCRIPTION_BATCH: usize = 20;
/// Scopes per role-assignment query.
pub const SCOPE_BATCH: usize = 200;
pub const PAGE_SIZE: usize = 1000;

/// Resource groups whose contents make up the seed inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedScope {
    pub resource_groups: Vec<String>,
}

impl SeedScope {
    pub fn new<I, S>(resource_groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { resource_groups: resource_groups.into_iter().map(Into::into).collect() }
    }
}

/// Source of resource records.
///
/// Implementations hide pagination and batching: every call returns the
/// complete result set, in no particular order.
pub trait ResourceFetcher {
    /// All resources inside the seed scope.
    ///
    /// # Errors
    /// Returns `FetchError` when the query cannot be executed or parsed.
    fn query_by_scope(&self, scope: &SeedScope) -> Result<Vec<Resource>, FetchError>;

    /// Resources whose identifiers appear in `ids`. Unknown ids are simply absent.
    ///
    /// `ids` is one batch: it succeeds or fails as a unit.
    ///
    /// # Errors
    /// Returns `FetchError` when the query cannot be executed or parsed.
    fn query_by_ids(&self, ids: &[String]) -> Result<Vec<Resource>, FetchError>;

    /// Role assignment records whose scope is one of `scopes`.
    ///
    /// # Errors
    /// Returns `FetchError` when the query cannot be executed or parsed.
    fn query_relations(&self, scopes: &[String]) -> Result<Vec<Resource>, FetchError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    data: Vec<Resource>,
    #[serde(default, alias = "skip_token")]
    skip_token: Option<String>,
}

/// Fetcher backed by the `az` CLI's Resource Graph extension.
#[derive(Debug, Clone)]
pub struct AzCliFetcher {
    program: String,
    subscriptions: Vec<String>,
    page_size: usize,
}

impl AzCliFetcher {
    #[must_use]
    pub fn new(subscriptions: Vec<String>) -> Self {
        Self { program: "az".to_string(), subscriptions, page_size: PAGE_SIZE }
    }

    /// Use a different executable instead of `az` on `PATH`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn subscription_batches(&self) -> Vec<&[String]> {
        if self.subscriptions.is_empty() {
            // no explicit subscriptions: let the CLI use its default context
            vec![&self.subscriptions[..]]
        } else {
            self.subscriptions.chunks(SUBSCRIPTION_BATCH).collect()
        }
    }

    fn build_args(&self, kql: &str, subs: &[String], skip_token: Option<&str>) -> Vec<String> {
        let mut args = vec!["graph".to_string(), "query".to_string(), "-q".to_string(), kql.to_string()];
        if !subs.is_empty() {
            args.push("--subscriptions".to_string());
            args.extend(subs.iter().cloned());
        }
        args.push("--first".to_string());
        args.push(self.page_size.to_string());
        if let Some(token) = skip_token {
            args.push("--skip-token".to_string());
            args.push(token.to_string());
        }
        args
    }

    /// Run `kql` against every subscription batch, following skip tokens.
    fn run_query(&self, kql: &str, operation: &str) -> Result<Vec<Resource>, FetchError> {
        let mut results = Vec::new();
        for subs in self.subscription_batches() {
            let mut skip_token: Option<String> = None;
            loop {
                let args = self.build_args(kql, subs, skip_token.as_deref());
                let mut command = vec![self.program.clone()];
                command.extend(args.iter().cloned());

                let output = Command::new(&self.program).args(&args).output().map_err(|source| {
                    FetchError::Launch {
                        operation: operation.to_string(),
                        program: self.program.clone(),
                        command: command.clone(),
                        source,
                    }
                })?;
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if !output.status.success() {
                    return Err(FetchError::Command {
                        operation: operation.to_string(),
                        command,
                        status: output.status.code(),
                        stdout,
                        stderr,
                    });
                }

                let page = parse_page(&stdout).map_err(|source| FetchError::Parse {
                    operation: operation.to_string(),
                    command: command.clone(),
                    stdout: stdout.clone(),
                    stderr: stderr.clone(),
                    source,
                })?;
                debug!(operation, rows = page.data.len(), more = page.skip_token.is_some(), "query page");
                results.extend(page.data);

                match page.skip_token.filter(|t| !t.is_empty()) {
                    Some(token) => skip_token = Some(token),
                    None => break,
                }
            }
        }
        Ok(results)
    }
}

impl ResourceFetcher for AzCliFetcher {
    fn query_by_scope(&self, scope: &SeedScope) -> Result<Vec<Resource>, FetchError> {
        self.run_query(&seed_query(&scope.resource_groups), "seed query")
    }

    // one query per call; the caller sizes id batches
    fn query_by_ids(&self, ids: &[String]) -> Result<Vec<Resource>, FetchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.run_query(&ids_query(ids), "query by ids")
    }

    fn query_relations(&self, scopes: &[String]) -> Result<Vec<Resource>, FetchError> {
        let mut out = Vec::new();
        for batch in scopes.chunks(SCOPE_BATCH) {
            out.extend(self.run_query(&relations_query(batch), "rbac query")?);
        }
        Ok(out)
    }
}

fn parse_page(stdout: &str) -> Result<QueryPage, serde_json::Error> {
    serde_json::from_str(stdout)
}

fn quote_list(values: &[String]) -> String {
    values.iter().map(|v| format!("'{}'", v.replace('\\', "\\\\").replace('\'', "\\'"))).collect::<Vec<_>>().join(", ")
}

#[must_use]
pub fn seed_query(resource_groups: &[String]) -> String {
    format!("resources | where resourceGroup in~ ({}) | {PROJECTION}", quote_list(resource_groups))
}

#[must_use]
pub fn ids_query(ids: &[String]) -> String {
    format!("resources | where id in~ ({}) | {PROJECTION}", quote_list(ids))
}

#[must_use]
pub fn relations_query(scopes: &[String]) -> String {
    format!(
        "authorizationresources \
         | where type =~ 'microsoft.authorization/roleassignments' \
         | extend scope = tolower(tostring(properties.scope)) \
         | where scope in~ ({}) \
         | project id, name, type, subscriptionId, resourceGroup, properties",
        quote_list(scopes)
    )
}
