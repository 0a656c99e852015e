//! Configuration loading.
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. built-in defaults;
//! 2. the user file `<config dir>/phpantom-docs/config.toml`;
//! 3. the project file `.phpantom-docs.toml`;
//! 4. `composer.json`: the primary PSR-4 mapping fills a root namespace
//!    and root path that are still unset;
//! 5. command-line overrides.
//!
//! Each file layer is a [`ConfigLayer`] whose unset fields leave the
//! lower layers alone.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::composer::{self, Psr4Mapping};
use crate::error::DocError;
use crate::links::{DEFAULT_THIRD_PARTY, LinkContext};

/// Project configuration file name.
pub const PROJECT_CONFIG_FILE: &str = ".phpantom-docs.toml";

const DEFAULT_OUTPUT_DIR: &str = "docs/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// One layer of settings as written in a TOML file or given on the
/// command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub root_namespace: Option<String>,
    pub root_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub exclude: Option<Vec<String>>,
    /// Merged key by key over lower layers.
    pub third_party: BTreeMap<String, String>,
    pub timeout_secs: Option<u64>,
    pub workers: Option<usize>,
}

impl ConfigLayer {
    /// Parse a TOML file; a missing file is an empty layer.
    pub fn from_file(path: &Path) -> Result<Option<Self>, DocError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(DocError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&text)
            .map(Some)
            .map_err(|err| DocError::Config(format!("{}: {err}", path.display())))
    }
}

/// Effective settings for one documentation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding `composer.json` and the project config file.
    pub project_root: PathBuf,
    pub root_namespace: Option<String>,
    /// Relative to `project_root` unless absolute.
    pub root_path: Option<PathBuf>,
    pub base_url: String,
    pub output_dir: PathBuf,
    pub exclude: Vec<String>,
    pub third_party: BTreeMap<String, String>,
    pub timeout_secs: u64,
    /// Worker count for batch builds; `None` uses the available cores.
    pub workers: Option<usize>,
    /// PSR-4 mappings read from `composer.json`.
    pub psr4_mappings: Vec<Psr4Mapping>,
}

impl Config {
    /// Built-in defaults for `project_root`.
    pub fn defaults(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            root_namespace: None,
            root_path: None,
            base_url: String::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            exclude: Vec::new(),
            third_party: DEFAULT_THIRD_PARTY
                .iter()
                .map(|(prefix, url)| (prefix.to_string(), url.to_string()))
                .collect(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workers: None,
            psr4_mappings: Vec::new(),
        }
    }

    /// Load every layer for `project_root`, with `cli` applied last.
    pub fn load(project_root: &Path, cli: ConfigLayer) -> Result<Self, DocError> {
        let mut config = Self::defaults(project_root);

        if let Some(user_file) = user_config_path() {
            if let Some(layer) = ConfigLayer::from_file(&user_file)? {
                tracing::debug!(path = %user_file.display(), "applying user config");
                config.apply(layer);
            }
        }

        let project_file = project_root.join(PROJECT_CONFIG_FILE);
        if let Some(layer) = ConfigLayer::from_file(&project_file)? {
            tracing::debug!(path = %project_file.display(), "applying project config");
            config.apply(layer);
        }

        config.psr4_mappings = composer::parse_composer_json(project_root);
        config.fill_from_composer();

        config.apply(cli);
        config.validate()?;
        Ok(config)
    }

    /// Overlay the set fields of `layer`.
    pub fn apply(&mut self, layer: ConfigLayer) {
        if let Some(ns) = layer.root_namespace {
            self.root_namespace = Some(ns.trim_matches('\\').to_string());
        }
        if let Some(path) = layer.root_path {
            self.root_path = Some(path);
        }
        if let Some(url) = layer.base_url {
            self.base_url = url;
        }
        if let Some(dir) = layer.output_dir {
            self.output_dir = dir;
        }
        if let Some(exclude) = layer.exclude {
            self.exclude = exclude;
        }
        self.third_party.extend(layer.third_party);
        if let Some(secs) = layer.timeout_secs {
            self.timeout_secs = secs;
        }
        if let Some(workers) = layer.workers {
            self.workers = Some(workers);
        }
    }

    fn fill_from_composer(&mut self) {
        let Some(mapping) = composer::primary_mapping(&self.psr4_mappings) else {
            return;
        };
        if self.root_namespace.is_none() {
            tracing::debug!(namespace = mapping.namespace(), "root namespace from composer.json");
            self.root_namespace = Some(mapping.namespace().to_string());
        }
        if self.root_path.is_none() {
            self.root_path = Some(PathBuf::from(&mapping.base_path));
        }
    }

    fn validate(&self) -> Result<(), DocError> {
        if self.root_namespace.as_deref().is_none_or(str::is_empty) {
            return Err(DocError::Config(
                "no root namespace: set `root_namespace` or add a PSR-4 mapping to composer.json"
                    .to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(DocError::Config("`timeout_secs` must be at least 1".to_string()));
        }
        if self.workers == Some(0) {
            return Err(DocError::Config("`workers` must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The root source directory as an absolute (project-joined) path.
    pub fn source_root(&self) -> PathBuf {
        match &self.root_path {
            Some(path) => self.project_root.join(path),
            None => self.project_root.clone(),
        }
    }

    /// Where generated files go.
    pub fn output_root(&self) -> PathBuf {
        self.project_root.join(&self.output_dir)
    }

    /// The link configuration handed to the documentation core.
    pub fn link_context(&self) -> LinkContext {
        LinkContext {
            root_namespace: self.root_namespace.clone().unwrap_or_default(),
            root_path: self.source_root(),
            base_url: self.base_url.clone(),
            exclude: self.exclude.clone(),
            third_party: self.third_party.clone(),
        }
    }
}

/// `<config dir>/phpantom-docs/config.toml`, if a home directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    use etcetera::BaseStrategy;
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("phpantom-docs").join("config.toml"))
}
