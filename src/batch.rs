//! Batch driver.
//!
//! Indexes every PHP file under the configured source root, then builds a
//! view for each class in the root namespace on a bounded pool of
//! blocking workers.  Each worker owns its own [`DocBuilder`]; the shared
//! [`SymbolIndex`] is the only state crossing threads.
//!
//! A build that overruns its time budget is reported as
//! [`DocError::Timeout`].  Blocking work cannot be interrupted, so the
//! worker keeps its pool slot until it finishes on its own.
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::builder::DocBuilder;
use crate::config::Config;
use crate::docblock::DocblockParser;
use crate::error::{Degradation, DocError};
use crate::introspection::SymbolIndex;
use crate::links::LinkContext;
use crate::view::ClassView;

/// File written next to the per-class views.
pub const INDEX_FILE: &str = "index.json";

/// Concurrency settings for [`run_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub workers: usize,
    pub timeout: Duration,
}

impl BatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.workers.unwrap_or_else(default_workers),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout: Duration::from_secs(10),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
}

/// Outcome of a batch run, keyed by fully-qualified class name.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub views: BTreeMap<String, ClassView>,
    pub failures: BTreeMap<String, DocError>,
    /// Only classes that degraded appear here.
    pub degradations: BTreeMap<String, Vec<Degradation>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexFile<'a> {
    /// Namespace → short names of the classes documented in it.
    namespaces: BTreeMap<&'a str, Vec<&'a str>>,
    failures: BTreeMap<&'a str, String>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Classes grouped by namespace; the global namespace is `""`.
    pub fn namespaces(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut namespaces: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for view in self.views.values() {
            namespaces
                .entry(view.namespace.as_deref().unwrap_or(""))
                .or_default()
                .push(view.short_name.as_str());
        }
        namespaces
    }

    /// Write one JSON file per view plus [`INDEX_FILE`] under `dir`.
    ///
    /// A view's path mirrors its namespace below the root namespace:
    /// `App\Models\Book` lands in `Models/Book.json`.
    pub fn write_to(&self, dir: &Path, root_namespace: &str) -> Result<Vec<PathBuf>, DocError> {
        let mut written = Vec::with_capacity(self.views.len() + 1);
        for (name, view) in &self.views {
            let path = dir.join(view_path(name, root_namespace));
            write_json(&path, view)?;
            written.push(path);
        }

        let index = IndexFile {
            namespaces: self.namespaces(),
            failures: self
                .failures
                .iter()
                .map(|(class, err)| (class.as_str(), err.to_string()))
                .collect(),
        };
        let path = dir.join(INDEX_FILE);
        write_json(&path, &index)?;
        written.push(path);
        Ok(written)
    }
}

/// Relative output path for `class_name`.
fn view_path(class_name: &str, root_namespace: &str) -> PathBuf {
    let root = root_namespace.trim_matches('\\');
    let relative = class_name
        .get(..root.len())
        .filter(|head| !root.is_empty() && head.eq_ignore_ascii_case(root))
        .and_then(|_| class_name[root.len()..].strip_prefix('\\'))
        .unwrap_or(class_name);
    let mut path: PathBuf = relative.split('\\').collect();
    path.set_extension("json");
    path
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<(), DocError> {
    let io_error = |source| DocError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| DocError::Config(format!("cannot serialize {}: {err}", path.display())))?;
    std::fs::write(path, json).map_err(io_error)
}

/// Every `.php` file under `root`, sorted.  Hidden and ignored files are
/// skipped the way `git` would skip them.
pub fn discover_php_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(root)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable path");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(ignore::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("php")))
        .collect();
    files.sort();
    files
}

/// Index the configured source root.  Classes outside it are loaded
/// lazily through the project's PSR-4 mappings.
pub fn index_project(config: &Config) -> SymbolIndex {
    let index = SymbolIndex::with_psr4(&config.project_root, config.psr4_mappings.clone());
    let root = config.source_root();
    let files = discover_php_files(&root);
    tracing::info!(root = %root.display(), files = files.len(), "indexing sources");
    for file in &files {
        if let Err(err) = index.load_file(file) {
            tracing::warn!(error = %err, "skipping file");
        }
    }
    index
}

/// Indexed classes that get a page: under the root namespace and not
/// excluded.
pub fn documented_classes(index: &SymbolIndex, context: &LinkContext) -> Vec<String> {
    index
        .class_names()
        .into_iter()
        .filter(|name| context.is_local(name) && !context.is_excluded(name))
        .map(|name| name.to_string())
        .collect()
}

struct Built {
    view: ClassView,
    degradations: Vec<Degradation>,
}

/// Build a view for every class in `classes`, at most `options.workers`
/// at a time.
pub async fn run_batch(
    index: Arc<SymbolIndex>,
    classes: Vec<String>,
    context: LinkContext,
    options: BatchOptions,
) -> BatchReport {
    let semaphore = Arc::new(Semaphore::new(options.workers.max(1)));
    let context = Arc::new(context);
    let mut tasks = JoinSet::new();

    tracing::info!(classes = classes.len(), workers = options.workers, "building class views");
    for class in classes {
        let semaphore = Arc::clone(&semaphore);
        let index = Arc::clone(&index);
        let context = Arc::clone(&context);
        tasks.spawn(async move {
            let outcome = build_one(semaphore, index, context, class.clone(), options.timeout).await;
            (class, outcome)
        });
    }

    let mut report = BatchReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((class, Ok(built))) => {
                if !built.degradations.is_empty() {
                    report.degradations.insert(class.clone(), built.degradations);
                }
                report.views.insert(class, built.view);
            }
            Ok((class, Err(err))) => {
                tracing::error!(class = %class, error = %err, "class build failed");
                report.failures.insert(class, err);
            }
            Err(err) => tracing::error!(error = %err, "batch task aborted"),
        }
    }
    tracing::info!(
        built = report.views.len(),
        failed = report.failures.len(),
        "batch finished"
    );
    report
}

async fn build_one(
    semaphore: Arc<Semaphore>,
    index: Arc<SymbolIndex>,
    context: Arc<LinkContext>,
    class: String,
    timeout: Duration,
) -> Result<Built, DocError> {
    let permit = semaphore
        .acquire_owned()
        .await
        .map_err(|err| DocError::Worker {
            class: class.clone(),
            message: err.to_string(),
        })?;

    let name = class.clone();
    let handle = tokio::task::spawn_blocking(move || -> Result<Built, DocError> {
        let _permit = permit;
        let parser = DocblockParser;
        let builder = DocBuilder::new(&*index, &parser);
        let view = builder.build_class_view(&name, &context)?;
        Ok(Built {
            view,
            degradations: builder.take_degradations(),
        })
    });

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => Err(DocError::Worker {
            class,
            message: err.to_string(),
        }),
        Err(_) => Err(DocError::Timeout {
            class,
            seconds: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> Arc<SymbolIndex> {
        let index = SymbolIndex::new();
        index.add_source(
            "/project/src/Models/Book.php",
            "<?php namespace App\\Models;\n/** A book. */\nclass Book extends Base { public ?string $title = null; }",
        );
        index.add_source(
            "/project/src/Models/Base.php",
            "<?php namespace App\\Models; abstract class Base {}",
        );
        index.add_source(
            "/project/src/Internal/Cache.php",
            "<?php namespace App\\Internal; class Cache {}",
        );
        index.add_source("/vendor/Other.php", "<?php namespace Other; class Thing {}");
        Arc::new(index)
    }

    fn context() -> LinkContext {
        LinkContext::new("App", "/project/src", "/api").with_exclude(["App\\Internal"])
    }

    #[test]
    fn documented_classes_skip_foreign_and_excluded() {
        let index = sample_index();
        assert_eq!(
            documented_classes(&index, &context()),
            vec!["App\\Models\\Base".to_string(), "App\\Models\\Book".to_string()]
        );
    }

    #[tokio::test]
    async fn batch_builds_every_class_and_reports_failures() {
        let index = sample_index();
        let classes = vec![
            "App\\Models\\Book".to_string(),
            "App\\Models\\Base".to_string(),
            "App\\Models\\Missing".to_string(),
        ];
        let options = BatchOptions {
            workers: 2,
            timeout: Duration::from_secs(10),
        };
        let report = run_batch(index, classes, context(), options).await;

        assert_eq!(report.views.len(), 2);
        let book = &report.views["App\\Models\\Book"];
        assert_eq!(book.summary, "A book.");
        assert_eq!(book.lineage(), vec!["App\\Models\\Book", "App\\Models\\Base"]);
        assert!(matches!(
            report.failures.get("App\\Models\\Missing"),
            Some(DocError::UnknownSymbol { .. })
        ));
        assert!(!report.is_success());
        assert_eq!(
            report.namespaces().get("App\\Models"),
            Some(&vec!["Base", "Book"])
        );
    }

    #[tokio::test]
    async fn report_is_written_as_json_tree() {
        let index = sample_index();
        let classes = vec!["App\\Models\\Book".to_string()];
        let report = run_batch(index, classes, context(), BatchOptions::default()).await;

        let out = tempfile::tempdir().unwrap();
        let written = report.write_to(out.path(), "App").unwrap();
        assert_eq!(written.len(), 2);

        let book: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.path().join("Models/Book.json")).unwrap())
                .unwrap();
        assert_eq!(book["shortName"], "Book");
        assert_eq!(book["properties"][0]["name"], "title");

        let index: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.path().join(INDEX_FILE)).unwrap()).unwrap();
        assert_eq!(index["namespaces"]["App\\Models"][0], "Book");
    }

    #[test]
    fn view_paths_mirror_namespaces_below_the_root() {
        assert_eq!(view_path("App\\Models\\Book", "App"), PathBuf::from("Models/Book.json"));
        assert_eq!(view_path("Other\\Thing", "App"), PathBuf::from("Other/Thing.json"));
        assert_eq!(view_path("Thing", ""), PathBuf::from("Thing.json"));
    }

    #[test]
    fn discovery_finds_php_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Models")).unwrap();
        std::fs::write(dir.path().join("Models/Book.php"), "<?php").unwrap();
        std::fs::write(dir.path().join("Models/notes.txt"), "").unwrap();
        std::fs::write(dir.path().join("bootstrap.php"), "<?php").unwrap();

        let files = discover_php_files(dir.path());
        assert_eq!(
            files,
            vec![dir.path().join("Models/Book.php"), dir.path().join("bootstrap.php")]
        );
    }
}
