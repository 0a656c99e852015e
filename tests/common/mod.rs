#![allow(dead_code)]

use std::fs;
use std::path::Path;

use phpantom_docs::{ClassView, DocBuilder, DocblockParser, LinkContext, SymbolIndex};

/// Root every inline source is placed under.
pub const SRC: &str = "/project/src";

/// Helper: index inline PHP sources given as `(relative path, content)`.
pub fn index_sources(files: &[(&str, &str)]) -> SymbolIndex {
    let index = SymbolIndex::new();
    for (path, content) in files {
        index.add_source(&format!("{SRC}/{path}"), content);
    }
    index
}

/// The link context inline sources are documented with.
pub fn context() -> LinkContext {
    LinkContext::new("App", SRC, "https://docs.example.com/api")
}

/// Helper: build one class view, panicking on a hard error.
pub fn build_view(index: &SymbolIndex, class_name: &str) -> ClassView {
    let parser = DocblockParser;
    let builder = DocBuilder::new(index, &parser);
    builder
        .build_class_view(class_name, &context())
        .unwrap_or_else(|err| panic!("building {class_name} failed: {err}"))
}

/// Helper: a temp project with a composer.json and PHP files.
pub struct TestProject {
    pub dir: tempfile::TempDir,
}

impl TestProject {
    pub fn new(composer_json: &str, files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        fs::write(dir.path().join("composer.json"), composer_json)
            .expect("failed to write composer.json");
        for (rel_path, content) in files {
            let full = dir.path().join(rel_path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).expect("failed to create dirs");
            }
            fs::write(&full, content).expect("failed to write PHP file");
        }
        TestProject { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}
