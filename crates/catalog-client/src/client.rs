//! HTTP client for the catalog REST API.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    CoverageList, CoverageMetadata, GranuleCollection, RemoteGranule, StoreRef,
};
use crate::MosaicCatalog;

/// Client for a single catalog instance.
///
/// `host` is the REST base URL (e.g. `http://example.org/geoserver/rest/`);
/// a trailing slash is added when missing.
pub struct CatalogClient {
    http: Client,
    host: String,
    user: String,
    passwd: String,
}

impl CatalogClient {
    pub fn new(host: &str, user: &str, passwd: &str) -> CatalogResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let host = ensure_trailing_slash(host);
        debug!(host = %host, "Connected to catalog");

        Ok(Self {
            http,
            host,
            user: user.to_string(),
            passwd: passwd.to_string(),
        })
    }

    /// The REST base URL, with trailing slash.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.user, Some(&self.passwd))
    }

    async fn check(response: Response) -> CatalogResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CatalogError::request(format!("{}: {}", status, body.trim())))
    }

    /// Look up a workspace; `None` when it does not exist.
    pub async fn get_workspace(&self, workspace: &str) -> CatalogResult<Option<String>> {
        let url = self.url(&format!("workspaces/{}.json", workspace));
        let response = self.with_auth(self.http.get(&url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check(response).await?;
        Ok(Some(workspace.to_string()))
    }

    /// Create a workspace.
    pub async fn create_workspace(&self, workspace: &str) -> CatalogResult<()> {
        let url = self.url("workspaces");
        let body = json!({ "workspace": { "name": workspace } });
        let response = self
            .with_auth(self.http.post(&url))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Create an image mosaic store from a property bundle.
    pub async fn create_imagemosaic(
        &self,
        workspace: &str,
        store: &str,
        bundle: Bytes,
    ) -> CatalogResult<()> {
        let url = self.url(&format!(
            "workspaces/{}/coveragestores/{}/file.imagemosaic",
            workspace, store
        ));
        let response = self
            .with_auth(self.http.put(&url))
            .header(CONTENT_TYPE, "application/zip")
            .body(bundle)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Save coverage metadata (title, abstract, keywords, time dimension,
    /// cache age).
    pub async fn save_coverage(
        &self,
        store: &StoreRef,
        coverage: &str,
        metadata: &CoverageMetadata,
    ) -> CatalogResult<()> {
        let mut body = serde_json::Map::new();
        if let Some(title) = &metadata.title {
            body.insert("title".to_string(), json!(title));
        }
        if let Some(abstract_text) = &metadata.abstract_text {
            body.insert("abstract".to_string(), json!(abstract_text));
        }
        if let Some(keywords) = &metadata.keywords {
            body.insert("keywords".to_string(), json!({ "string": keywords }));
        }

        let mut entries = Vec::new();
        if let Some(time) = &metadata.time {
            let mut dimension = serde_json::Map::new();
            dimension.insert("enabled".to_string(), json!(time.enabled));
            dimension.insert("presentation".to_string(), json!(time.presentation));
            if let Some(resolution) = &time.resolution {
                dimension.insert("resolution".to_string(), json!(resolution));
            }
            dimension.insert("units".to_string(), json!(time.units));
            if let Some(nearest) = time.nearest_match_enabled {
                dimension.insert("nearestMatchEnabled".to_string(), json!(nearest));
            }
            entries.push(json!({ "@key": time.name, "dimensionInfo": dimension }));
        }
        if let Some(age) = metadata.cache_age_max {
            entries.push(json!({ "@key": "cacheAgeMax", "$": age.to_string() }));
            entries.push(json!({ "@key": "cachingEnabled", "$": "true" }));
        }
        if !entries.is_empty() {
            body.insert("metadata".to_string(), json!({ "entry": entries }));
        }

        let url = self.url(&format!(
            "workspaces/{}/coveragestores/{}/coverages/{}.json",
            store.workspace, store.name, coverage
        ));
        let response = self
            .with_auth(self.http.put(&url))
            .json(&json!({ "coverage": body }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Upload a property bundle to a remote-image mosaic store without
    /// configuring coverages.
    pub async fn put_property_bundle(
        &self,
        workspace: &str,
        layer_name: &str,
        bundle: Bytes,
    ) -> CatalogResult<()> {
        let url = self.url(&format!(
            "workspaces/{}/coveragestores/{}/file.imagemosaic?configure=none",
            workspace, layer_name
        ));
        let response = self
            .with_auth(self.http.put(&url))
            .header(CONTENT_TYPE, "application/zip")
            .body(bundle)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Configure a coverage of a remote-image mosaic store from XML.
    pub async fn post_coverage_config(
        &self,
        workspace: &str,
        layer_name: &str,
        coverage_xml: String,
    ) -> CatalogResult<()> {
        let url = self.url(&format!(
            "workspaces/{}/coveragestores/{}/coverages",
            workspace, layer_name
        ));
        let response = self
            .with_auth(self.http.post(&url))
            .header(CONTENT_TYPE, "text/xml")
            .body(coverage_xml)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl MosaicCatalog for CatalogClient {
    async fn get_store(&self, workspace: &str, store: &str) -> CatalogResult<Option<StoreRef>> {
        #[derive(Deserialize)]
        struct StoreResponse {
            #[serde(rename = "coverageStore")]
            coverage_store: RawStore,
        }
        #[derive(Deserialize)]
        struct RawStore {
            name: String,
        }

        let url = self.url(&format!(
            "workspaces/{}/coveragestores/{}.json",
            workspace, store
        ));
        let response = self.with_auth(self.http.get(&url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        let raw: StoreResponse = response.json().await?;
        Ok(Some(StoreRef {
            workspace: workspace.to_string(),
            name: raw.coverage_store.name,
        }))
    }

    async fn mosaic_coverages(&self, store: &StoreRef) -> CatalogResult<CoverageList> {
        let url = self.url(&format!(
            "workspaces/{}/coveragestores/{}/coverages.json",
            store.workspace, store.name
        ));
        let response = self.with_auth(self.http.get(&url)).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn list_granules(
        &self,
        coverage: &str,
        store: &StoreRef,
    ) -> CatalogResult<GranuleCollection> {
        let url = self.url(&format!(
            "workspaces/{}/coveragestores/{}/coverages/{}/index/granules.json",
            store.workspace, store.name, coverage
        ));
        let response = self.with_auth(self.http.get(&url)).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn add_granule(
        &self,
        workspace: &str,
        store: &str,
        file_path: &str,
    ) -> CatalogResult<()> {
        let url = self.url(&format!(
            "workspaces/{}/coveragestores/{}/external.imagemosaic",
            workspace, store
        ));
        let response = self
            .with_auth(self.http.post(&url))
            .header(CONTENT_TYPE, "text/plain")
            .body(file_uri(file_path))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_granule(
        &self,
        coverage: &str,
        store: &StoreRef,
        granule_id: &str,
    ) -> CatalogResult<()> {
        let url = self.url(&format!(
            "workspaces/{}/coveragestores/{}/coverages/{}/index/granules/{}.json",
            store.workspace, store.name, coverage, granule_id
        ));
        let response = self.with_auth(self.http.delete(&url)).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn add_remote_granule(&self, remote: &RemoteGranule) -> CatalogResult<()> {
        let url = format!(
            "{}workspaces/{}/coveragestores/{}/remote.imagemosaic",
            ensure_trailing_slash(&remote.host),
            remote.workspace,
            remote.layer_name
        );
        let response = self
            .with_auth(self.http.post(&url))
            .header(CONTENT_TYPE, "text/plain")
            .body(remote.image_url.clone())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

fn ensure_trailing_slash(host: &str) -> String {
    if host.ends_with('/') {
        host.to_string()
    } else {
        format!("{}/", host)
    }
}

/// Harvest body for a filesystem granule; paths that already carry a
/// scheme are passed through untouched.
fn file_uri(file_path: &str) -> String {
    if file_path.contains("://") {
        file_path.to_string()
    } else {
        format!("file://{}", file_path)
    }
}
