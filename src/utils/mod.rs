// Shared helpers: markdown tables, configuration, JSON artifacts
pub mod table {
    // Escape characters that would break a markdown table cell
    fn cell(s: &str) -> String {
        s.replace('|', "\\|").replace('\n', " ")
    }

    fn line(cells: &[String], widths: &[usize]) -> String {
        let mut s = String::from("|");
        for (i, c) in cells.iter().enumerate() {
            let w = widths[i];
            s.push(' ');
            s.push_str(c);
            if c.len() < w {
                s.push_str(&" ".repeat(w - c.len()));
            }
            s.push_str(" |");
        }
        s
    }

    // Render a markdown pipe table given headers and rows
    pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
        let cols = headers.len();
        let header_cells: Vec<String> = headers.iter().map(|h| cell(h)).collect();
        let body: Vec<Vec<String>> = rows
            .iter()
            .map(|row| (0..cols).map(|i| row.get(i).map(|c| cell(c)).unwrap_or_default()).collect())
            .collect();

        let mut widths: Vec<usize> = header_cells.iter().map(|h| h.len().max(3)).collect();
        for row in &body {
            for (c, w) in widths.iter_mut().enumerate() {
                *w = (*w).max(row[c].len());
            }
        }

        let mut out = String::new();
        out.push_str(&line(&header_cells, &widths));
        out.push('\n');
        let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&line(&dashes, &widths));
        for row in &body {
            out.push('\n');
            out.push_str(&line(row, &widths));
        }
        out
    }
}

pub mod config {
    use crate::errors::DiscoveryError;
    use crate::expand::{ExpandOptions, DEFAULT_BATCH_SIZE, DEFAULT_MAX_ITERATIONS};
    use crate::fetch::SeedScope;
    use serde::Deserialize;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn default_max_iterations() -> usize {
        DEFAULT_MAX_ITERATIONS
    }

    fn default_batch_size() -> usize {
        DEFAULT_BATCH_SIZE
    }

    #[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct AppConfig {
        pub app: String,
        pub subscriptions: Vec<String>,
        pub seed_resource_groups: Vec<String>,
        pub output_dir: PathBuf,
        #[serde(default)]
        pub include_rbac: bool,
        #[serde(default = "default_max_iterations")]
        pub max_iterations: usize,
        #[serde(default = "default_batch_size")]
        pub batch_size: usize,
        #[serde(default)]
        pub plantuml_jar: Option<String>,
    }

    impl AppConfig {
        #[must_use]
        pub fn seed_scope(&self) -> SeedScope {
            SeedScope::new(self.seed_resource_groups.iter().cloned())
        }

        #[must_use]
        pub fn expand_options(&self) -> ExpandOptions {
            ExpandOptions { max_iterations: self.max_iterations, batch_size: self.batch_size }
        }

        /// Path of an artifact inside the output directory.
        #[must_use]
        pub fn artifact(&self, name: &str) -> PathBuf {
            self.output_dir.join(name)
        }
    }

    /// Load and validate a configuration file. `.toml` files are parsed as
    /// TOML, anything else as JSON.
    ///
    /// # Errors
    /// Returns `DiscoveryError::Config` if the file cannot be read, does not
    /// parse, misses a required field, or carries a zero limit.
    pub fn load_config_at(path: &Path) -> Result<AppConfig, DiscoveryError> {
        let err = |message: String| DiscoveryError::Config { path: path.to_path_buf(), message };
        let data = fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
        let is_toml = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        let cfg: AppConfig = if is_toml {
            toml::from_str(&data).map_err(|e| err(e.to_string()))?
        } else {
            serde_json::from_str(&data).map_err(|e| err(e.to_string()))?
        };
        if cfg.max_iterations == 0 {
            return Err(err("maxIterations must be at least 1".into()));
        }
        if cfg.batch_size == 0 {
            return Err(err("batchSize must be at least 1".into()));
        }
        Ok(cfg)
    }
}

pub mod json {
    use crate::errors::DiscoveryError;
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use std::fs;
    use std::path::Path;

    /// Write `value` as pretty JSON with object keys sorted at every level.
    ///
    /// Going through `serde_json::Value` sorts keys because its map is ordered.
    ///
    /// # Errors
    /// Returns `DiscoveryError` if serialization fails or the file cannot be written.
    pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DiscoveryError> {
        let json_err = |source| DiscoveryError::Json { path: path.to_path_buf(), source };
        let tree = serde_json::to_value(value).map_err(json_err)?;
        let mut data = serde_json::to_string_pretty(&tree).map_err(json_err)?;
        data.push('\n');
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }

    /// # Errors
    /// Returns `DiscoveryError` if the file cannot be read or parsed as `T`.
    pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DiscoveryError> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|source| DiscoveryError::Json { path: path.to_path_buf(), source })
    }

    /// Like [`read_json`], but a missing file yields `T::default()`.
    ///
    /// # Errors
    /// Returns `DiscoveryError` if the file exists but cannot be read or parsed.
    pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, DiscoveryError> {
        if path.exists() {
            read_json(path)
        } else {
            Ok(T::default())
        }
    }
}
