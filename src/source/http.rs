//! Remote registry-service implementation of the source registry.
//!
//! Speaks the registry's HTTP contract:
//! - `GET /get_source?project_name=N&project_version=V` → version-details
//!   JSON
//! - `GET /get_available_versions` → map of `(<name>, v<version>)` keys to
//!   `{size, hash}` records
//! - `POST /add_project` form: `project_name`, optional `source_type`
//! - `POST /add_version` form: `version_details` (JSON-encoded), plus
//!   `project_name` / `project_version`
//!
//! Transport failures surface as `ServerConnectionError`; non-success
//! responses as `NackFromServer` (mapped to `UndefinedProject` for lookups,
//! matching the local variant's contract).

use crate::core::dep::Dep;
use crate::core::error::ComboError;
use crate::source::{AvailableVersion, SourceDescriptor, SourceLocator};
use crate::version::Version;
use anyhow::Result;
use indexmap::IndexMap;
use serde_json::Value;

/// Source locator backed by the remote registry service.
#[derive(Debug)]
pub struct HttpSourceLocator {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSourceLocator {
    /// Creates a locator for the registry at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn connection_error(&self, error: &reqwest::Error) -> ComboError {
        ComboError::ServerConnectionError {
            url: self.base_url.clone(),
            reason: error.to_string(),
        }
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ComboError::NackFromServer { reason: format!("{status}: {body}") }.into())
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(self.endpoint(path))
            .query(query)
            .send()
            .await
            .map_err(|e| self.connection_error(&e))?;
        self.check(response).await
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint(path))
            .form(form)
            .send()
            .await
            .map_err(|e| self.connection_error(&e))?;
        self.check(response).await?;
        Ok(())
    }

    /// Registers a project on the remote registry.
    pub async fn add_project(&self, name: &str, general_type: Option<&str>) -> Result<()> {
        let mut form = vec![("project_name", name.to_string())];
        if let Some(general_type) = general_type {
            form.push(("source_type", general_type.to_string()));
        }
        self.post_form("add_project", &form).await
    }

    /// Publishes version details for a project on the remote registry.
    pub async fn add_version(
        &self,
        name: &str,
        version: &Version,
        details: Value,
    ) -> Result<()> {
        let form = vec![
            ("project_name", name.to_string()),
            ("project_version", version.to_string()),
            ("version_details", serde_json::to_string(&details)?),
        ];
        self.post_form("add_version", &form).await
    }
}

impl SourceLocator for HttpSourceLocator {
    async fn get_source(&self, name: &str, version: &Version) -> Result<SourceDescriptor> {
        let version_str = version.to_string();
        let response = self
            .get("get_source", &[("project_name", name), ("project_version", &version_str)])
            .await
            .map_err(|e| match e.downcast_ref::<ComboError>() {
                // The server answers unknown lookups with a nack
                Some(ComboError::NackFromServer { .. }) => {
                    ComboError::UndefinedProject { name: format!("{name} (version {version})") }
                        .into()
                }
                _ => e,
            })?;

        let details: Value = response.json().await.map_err(|e| self.connection_error(&e))?;
        serde_json::from_value(details).map_err(|e| {
            ComboError::InvalidVersionDetails { name: name.to_string(), reason: e.to_string() }
                .into()
        })
    }

    async fn available_versions(&self) -> Result<IndexMap<String, Vec<Version>>> {
        let response = self.get("get_available_versions", &[]).await?;
        let raw: IndexMap<String, AvailableVersion> =
            response.json().await.map_err(|e| self.connection_error(&e))?;

        let mut listing: IndexMap<String, Vec<Version>> = IndexMap::new();
        for key in raw.keys() {
            match Dep::destring(key) {
                Ok(dep) => listing.entry(dep.name).or_default().push(dep.version),
                Err(_) => {
                    tracing::warn!("Skipping malformed dependency key from registry: {key}");
                }
            }
        }

        for versions in listing.values_mut() {
            versions.sort();
        }
        Ok(listing)
    }
}
