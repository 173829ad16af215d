//! npm Registry adapter
//!
//! Fetches full package documents (all versions and dist-tags).
//! API endpoint: {registry}/{package}, scoped names as `@scope%2fname`

use crate::error::RegistryError;
use crate::registry::{HttpClient, PackageMetadata, RegistryAdapter};
use async_trait::async_trait;
use serde_json::Value;

/// Public npm registry
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// npm Registry adapter
pub struct NpmAdapter {
    client: HttpClient,
    registry_url: String,
}

impl NpmAdapter {
    /// Create an adapter for the public registry
    pub fn new(client: HttpClient) -> Self {
        Self::with_registry(client, DEFAULT_REGISTRY_URL)
    }

    /// Create an adapter for a custom registry
    pub fn with_registry(client: HttpClient, registry_url: &str) -> Self {
        Self {
            client,
            registry_url: registry_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the URL for a package
    fn build_url(&self, package: &str) -> String {
        format!("{}/{}", self.registry_url, package.replace('/', "%2f"))
    }
}

#[async_trait]
impl RegistryAdapter for NpmAdapter {
    fn registry_name(&self) -> &str {
        &self.registry_url
    }

    async fn fetch_metadata(&self, package: &str) -> Result<PackageMetadata, RegistryError> {
        let url = self.build_url(package);
        tracing::debug!("fetching {url}");
        let packument: Value = self
            .client
            .get_json(&url, package, self.registry_name())
            .await?;
        Ok(PackageMetadata::from_packument(package, packument))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(url: &str) -> NpmAdapter {
        NpmAdapter::with_registry(HttpClient::new().unwrap(), url)
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            adapter(DEFAULT_REGISTRY_URL).build_url("lodash"),
            "https://registry.npmjs.org/lodash"
        );
    }

    #[test]
    fn test_build_url_scoped_package() {
        assert_eq!(
            adapter(DEFAULT_REGISTRY_URL).build_url("@angular/core"),
            "https://registry.npmjs.org/@angular%2fcore"
        );
    }

    #[test]
    fn test_custom_registry_trailing_slash() {
        let adapter = adapter("https://npm.example.com/repo/");
        assert_eq!(adapter.registry_name(), "https://npm.example.com/repo");
        assert_eq!(
            adapter.build_url("rxjs"),
            "https://npm.example.com/repo/rxjs"
        );
    }
}
