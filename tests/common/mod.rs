//! Common test utilities and fixtures for combo integration tests.
//!
//! A [`TestProject`] is a sandbox holding a root project, a set of on-disk
//! libraries registered in a local sources file as `local_path` entries, and
//! an isolated cache directory. Everything lives inside one temp directory
//! and disappears with it.

// Not every test binary uses every helper
#![allow(dead_code)]

use combo_cli::cache::Cache;
use combo_cli::constants::MANIFEST_FILE_NAME;
use combo_cli::core::dep::Dep;
use combo_cli::manager::DependenciesManager;
use combo_cli::source::{JsonSourceLocator, Registry};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Sandboxed project fixture: libraries, sources file, cache, and root
/// project under one temp directory.
pub struct TestProject {
    temp: TempDir,
    projects: serde_json::Map<String, Value>,
}

impl TestProject {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("libs")).unwrap();

        let project = Self { temp, projects: serde_json::Map::new() };
        project.write_sources();
        project
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn project_dir(&self) -> PathBuf {
        self.path().join("project")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.path().join("Combo")
    }

    pub fn sources_path(&self) -> PathBuf {
        self.path().join("sources.json")
    }

    pub fn contrib_dir(&self) -> PathBuf {
        self.project_dir().join("contrib")
    }

    fn write_sources(&self) {
        let contents =
            serde_json::to_string_pretty(&Value::Object(self.projects.clone())).unwrap();
        fs::write(self.sources_path(), contents).unwrap();
    }

    /// Creates an on-disk library with a manifest and a small payload file,
    /// and registers it in the sources file as a `local_path` entry.
    pub fn add_lib(&mut self, name: &str, version: &str, deps: &[(&str, &str)]) -> PathBuf {
        self.add_lib_with_payload(name, version, deps, &format!("{name} {version}"))
    }

    /// Same as [`add_lib`](Self::add_lib) with caller-controlled payload
    /// content (eviction tests size the payload).
    pub fn add_lib_with_payload(
        &mut self,
        name: &str,
        version: &str,
        deps: &[(&str, &str)],
        payload: &str,
    ) -> PathBuf {
        let dir_name = format!(
            "{}_{}",
            Dep::normalize_name(name),
            version.replace('.', "_")
        );
        let dir = self.path().join("libs").join(dir_name);
        fs::create_dir_all(&dir).unwrap();

        write_manifest_file(&dir, name, version, deps, None);
        fs::write(dir.join("payload.txt"), payload).unwrap();

        let project = self
            .projects
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        project.as_object_mut().unwrap().insert(
            version.to_string(),
            json!({ "type": "local_path", "path": dir.clone() }),
        );
        self.write_sources();

        dir
    }

    /// Writes (or rewrites) the root project manifest.
    pub fn set_root(&self, deps: &[(&str, &str)]) {
        let dir = self.project_dir();
        fs::create_dir_all(&dir).unwrap();
        write_manifest_file(&dir, "Test Project", "1.0", deps, Some("contrib"));
    }

    pub fn registry(&self) -> Registry {
        Registry::Json(JsonSourceLocator::load(&self.sources_path()).unwrap())
    }

    pub fn cache(&self) -> Cache {
        Cache::with_dir(self.cache_dir()).unwrap()
    }

    pub fn manager(&self) -> DependenciesManager<Registry> {
        DependenciesManager::new(&self.project_dir(), self.registry(), self.cache()).unwrap()
    }

    /// Sorted basenames of the contrib directory's children.
    pub fn contrib_names(&self) -> Vec<String> {
        let contrib = self.contrib_dir();
        if !contrib.is_dir() {
            return Vec::new();
        }

        let mut names: Vec<String> = fs::read_dir(&contrib)
            .unwrap()
            .filter_map(|entry| {
                let entry = entry.unwrap();
                entry
                    .file_type()
                    .unwrap()
                    .is_dir()
                    .then(|| entry.file_name().to_string_lossy().to_string())
            })
            .collect();
        names.sort();
        names
    }

    /// Payload content of a materialized library.
    pub fn contrib_payload(&self, lib_dir_name: &str) -> String {
        fs::read_to_string(self.contrib_dir().join(lib_dir_name).join("payload.txt")).unwrap()
    }
}

fn write_manifest_file(
    dir: &Path,
    name: &str,
    version: &str,
    deps: &[(&str, &str)],
    output_directory: Option<&str>,
) {
    let dependencies: Vec<Value> = deps
        .iter()
        .map(|(dep_name, dep_version)| json!({ "name": dep_name, "version": dep_version }))
        .collect();

    let mut manifest = json!({
        "name": name,
        "version": version,
        "dependencies": dependencies,
    });
    if let Some(output) = output_directory {
        manifest["output_directory"] = json!(output);
    }

    fs::write(
        dir.join(MANIFEST_FILE_NAME),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}
