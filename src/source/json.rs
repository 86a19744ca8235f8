//! Local projects-file implementation of the source registry.
//!
//! The file is a JSON object keyed by project name. Lookups consult the
//! project's flat version map, merging the optional `defaults` record into
//! the version record unless the record declares its own `type`. The locator
//! is also a maintainer: `add_project` and `add_version` mutate the map and
//! write the file back atomically.

use crate::core::error::ComboError;
use crate::source::{
    DEFAULT_GENERAL_TYPE, DEFAULTS_KEYWORD, GENERAL_TYPE_KEYWORD, SourceDescriptor, SourceLocator,
    TYPE_KEYWORD,
};
use crate::utils::fs::atomic_write;
use crate::version::Version;
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Source locator backed by a local projects JSON file.
#[derive(Debug)]
pub struct JsonSourceLocator {
    path: PathBuf,
    projects: IndexMap<String, Value>,
}

impl JsonSourceLocator {
    /// Loads the projects file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read projects file: {}", path.display()))?;
        let projects: IndexMap<String, Value> = serde_json::from_str(&contents)
            .with_context(|| format!("Projects file is not valid JSON: {}", path.display()))?;

        Ok(Self { path: path.to_path_buf(), projects })
    }

    fn general_type(project: &Value) -> &str {
        project
            .get(GENERAL_TYPE_KEYWORD)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_GENERAL_TYPE)
    }

    /// Merges the project defaults under a version record. A record that
    /// declares its own `type` stands alone.
    fn merged_details(project: &Value, record: &Value) -> Value {
        if record.get(TYPE_KEYWORD).is_some() {
            return record.clone();
        }

        let mut merged = project.get(DEFAULTS_KEYWORD).cloned().unwrap_or_else(
            || Value::Object(serde_json::Map::new()),
        );
        if let (Some(target), Some(fields)) = (merged.as_object_mut(), record.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    fn persist(&self) -> Result<()> {
        let contents = serde_json::to_vec_pretty(&self.projects)?;
        atomic_write(&self.path, &contents)
    }

    /// Registers a project. Idempotent when it already exists with the same
    /// general type; fails when the types disagree.
    pub fn add_project(&mut self, name: &str, general_type: Option<&str>) -> Result<()> {
        if let Some(existing) = self.projects.get(name) {
            let requested = general_type.unwrap_or(DEFAULT_GENERAL_TYPE);
            let actual = Self::general_type(existing);
            if requested != actual {
                bail!(
                    "Project {name} already exists with general type \"{actual}\", \
                     requested \"{requested}\""
                );
            }
            return Ok(());
        }

        let mut details = serde_json::Map::new();
        if let Some(general_type) = general_type
            && general_type != DEFAULT_GENERAL_TYPE
        {
            details.insert(GENERAL_TYPE_KEYWORD.to_string(), Value::from(general_type));
        }

        self.projects.insert(name.to_string(), Value::Object(details));
        self.persist()
    }

    /// Publishes version details for an existing project, dropping fields
    /// already covered by the project defaults.
    pub fn add_version(&mut self, name: &str, version: &Version, details: Value) -> Result<()> {
        let project = self
            .projects
            .get_mut(name)
            .ok_or_else(|| ComboError::UndefinedProject { name: name.to_string() })?;

        if Self::general_type(project) != DEFAULT_GENERAL_TYPE {
            bail!("Project {name} does not keep a per-version source map");
        }

        let mut details = details;
        if let (Some(defaults), Some(fields)) =
            (project.get(DEFAULTS_KEYWORD).cloned(), details.as_object_mut())
        {
            fields.retain(|key, value| defaults.get(key.as_str()) != Some(&*value));
        }

        if let Some(project) = project.as_object_mut() {
            project.insert(version.to_string(), details);
        } else {
            bail!("Project record for {name} is not an object");
        }

        self.persist()
    }
}

impl SourceLocator for JsonSourceLocator {
    async fn get_source(&self, name: &str, version: &Version) -> Result<SourceDescriptor> {
        let project = self
            .projects
            .get(name)
            .ok_or_else(|| ComboError::UndefinedProject { name: name.to_string() })?;

        let general_type = Self::general_type(project);
        if general_type != DEFAULT_GENERAL_TYPE {
            return Err(ComboError::InvalidVersionDetails {
                name: name.to_string(),
                reason: format!("unsupported {GENERAL_TYPE_KEYWORD} \"{general_type}\""),
            }
            .into());
        }

        let record = project.get(version.to_string()).ok_or_else(|| {
            ComboError::UndefinedProjectVersion {
                name: name.to_string(),
                version: version.to_string(),
            }
        })?;

        let details = Self::merged_details(project, record);
        serde_json::from_value(details)
            .map_err(|e| {
                ComboError::InvalidVersionDetails { name: name.to_string(), reason: e.to_string() }
                    .into()
            })
    }

    async fn available_versions(&self) -> Result<IndexMap<String, Vec<Version>>> {
        let mut listing = IndexMap::new();

        for (name, project) in &self.projects {
            let Some(records) = project.as_object() else {
                continue;
            };

            let mut versions: Vec<Version> =
                records.keys().filter_map(|key| Version::parse(key).ok()).collect();
            versions.sort();
            listing.insert(name.clone(), versions);
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn version(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn write_projects(value: &Value) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sources.json");
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        (temp, path)
    }

    #[tokio::test]
    async fn looks_up_a_git_source() {
        let (_temp, path) = write_projects(&json!({
            "Lib A": {
                "1.7": { "type": "git", "url": "https://example.com/a.git", "commit_hash": "aa" }
            }
        }));

        let locator = JsonSourceLocator::load(&path).unwrap();
        let descriptor = locator.get_source("Lib A", &version("1.7")).await.unwrap();
        assert_eq!(
            descriptor,
            SourceDescriptor::Git {
                url: "https://example.com/a.git".to_string(),
                commit_hash: "aa".to_string()
            }
        );
    }

    #[tokio::test]
    async fn merges_defaults_into_version_records() {
        let (_temp, path) = write_projects(&json!({
            "Lib A": {
                "defaults": { "type": "git", "url": "https://example.com/a.git" },
                "1.7": { "commit_hash": "aa" },
                "1.8": { "type": "local_path", "path": "/srv/a-1.8" }
            }
        }));

        let locator = JsonSourceLocator::load(&path).unwrap();

        // Defaults fill in the missing fields
        let merged = locator.get_source("Lib A", &version("1.7")).await.unwrap();
        assert_eq!(
            merged,
            SourceDescriptor::Git {
                url: "https://example.com/a.git".to_string(),
                commit_hash: "aa".to_string()
            }
        );

        // A record with its own type ignores the defaults
        let standalone = locator.get_source("Lib A", &version("1.8")).await.unwrap();
        assert_eq!(
            standalone,
            SourceDescriptor::LocalPath { path: PathBuf::from("/srv/a-1.8") }
        );
    }

    #[tokio::test]
    async fn unknown_name_and_version() {
        let (_temp, path) = write_projects(&json!({
            "Lib A": { "1.7": { "type": "local_path", "path": "/srv/a" } }
        }));
        let locator = JsonSourceLocator::load(&path).unwrap();

        let err = locator.get_source("Lib B", &version("1.0")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ComboError>(),
            Some(ComboError::UndefinedProject { .. })
        ));

        let err = locator.get_source("Lib A", &version("9.9")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ComboError>(),
            Some(ComboError::UndefinedProjectVersion { .. })
        ));
    }

    #[tokio::test]
    async fn add_project_and_version_persist() {
        let (_temp, path) = write_projects(&json!({}));

        let mut locator = JsonSourceLocator::load(&path).unwrap();
        locator.add_project("Lib A", None).unwrap();
        locator
            .add_version(
                "Lib A",
                &version("1.0"),
                json!({ "type": "local_path", "path": "/srv/a" }),
            )
            .unwrap();

        // Re-adding with the same type is a no-op
        locator.add_project("Lib A", Some(DEFAULT_GENERAL_TYPE)).unwrap();

        // Reload from disk and look the version up
        let reloaded = JsonSourceLocator::load(&path).unwrap();
        let descriptor = reloaded.get_source("Lib A", &version("1.0")).await.unwrap();
        assert_eq!(descriptor, SourceDescriptor::LocalPath { path: PathBuf::from("/srv/a") });
    }

    #[tokio::test]
    async fn add_version_strips_fields_covered_by_defaults() {
        let (_temp, path) = write_projects(&json!({
            "Lib A": { "defaults": { "type": "git", "url": "https://example.com/a.git" } }
        }));

        let mut locator = JsonSourceLocator::load(&path).unwrap();
        locator
            .add_version(
                "Lib A",
                &version("2.0"),
                json!({
                    "type": "git",
                    "url": "https://example.com/a.git",
                    "commit_hash": "cc"
                }),
            )
            .unwrap();

        let reloaded = JsonSourceLocator::load(&path).unwrap();
        let record = reloaded.projects["Lib A"].get("2.0").unwrap();
        assert_eq!(record, &json!({ "commit_hash": "cc" }));

        // The merged lookup still produces the full descriptor
        let descriptor = reloaded.get_source("Lib A", &version("2.0")).await.unwrap();
        assert_eq!(
            descriptor,
            SourceDescriptor::Git {
                url: "https://example.com/a.git".to_string(),
                commit_hash: "cc".to_string()
            }
        );
    }

    #[tokio::test]
    async fn lists_available_versions_sorted() {
        let (_temp, path) = write_projects(&json!({
            "Lib A": {
                "defaults": { "type": "git", "url": "u" },
                "1.10": { "commit_hash": "x" },
                "1.2": { "commit_hash": "y" }
            }
        }));

        let locator = JsonSourceLocator::load(&path).unwrap();
        let listing = locator.available_versions().await.unwrap();
        assert_eq!(listing["Lib A"], vec![version("1.2"), version("1.10")]);
    }
}
