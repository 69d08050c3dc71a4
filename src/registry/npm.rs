use crate::error::{PkgupError, Result};
use crate::registry::packument::Packument;
use crate::registry::RegistryClient;
use colored::Colorize;
use reqwest::blocking::Client;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";
const MAX_PACKUMENT_BYTES: usize = 64 * 1024 * 1024;

/// npm registry client
pub struct NpmRegistry {
    client: Client,
    base: Url,
}

impl NpmRegistry {
    pub fn new(registry_url: Option<&str>) -> Result<Self> {
        let base = Self::validate_registry_url(registry_url.unwrap_or(DEFAULT_REGISTRY))?;
        let client = Self::build_client()?;

        Ok(Self { client, base })
    }

    fn build_client() -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("pkgup")
            .build()
            .map_err(|e| PkgupError::Registry(e.to_string()))
    }

    fn validate_registry_url(url: &str) -> Result<Url> {
        let parsed = Url::parse(url)
            .map_err(|_| PkgupError::Registry(format!("Invalid registry URL: {url}")))?;

        match parsed.scheme() {
            "https" | "http" => {}
            scheme => {
                return Err(PkgupError::Registry(format!(
                    "Unsupported registry scheme: {scheme}"
                )));
            }
        }

        if parsed.host_str().is_none() {
            return Err(PkgupError::Registry(format!(
                "Registry URL has no host: {url}"
            )));
        }

        Ok(parsed)
    }

    /// Scoped names keep the `@` but escape the separating slash, which is
    /// how the registry addresses them.
    fn packument_url(&self, name: &str) -> String {
        let escaped = name.replace('/', "%2f");
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), escaped)
    }
}

impl RegistryClient for NpmRegistry {
    fn fetch_packument(&self, name: &str) -> Result<Option<Packument>> {
        let url = self.packument_url(name);

        if std::env::var("PKGUP_VERBOSE").is_ok() {
            eprintln!("[VERBOSE] Fetching: {}", url);
        }

        let response = match self.client.get(&url).send() {
            Ok(resp) => resp,
            Err(e) => {
                if std::env::var("PKGUP_VERBOSE").is_ok() {
                    eprintln!("[VERBOSE] Request failed: {}", e);
                }
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            if std::env::var("PKGUP_VERBOSE").is_ok() {
                eprintln!("[VERBOSE] HTTP {}: {}", response.status(), url);
            }
            return Ok(None);
        }

        let text = response
            .text()
            .map_err(|e| PkgupError::Registry(e.to_string()))?;

        if text.len() > MAX_PACKUMENT_BYTES {
            return Err(PkgupError::Registry(
                "Packument response exceeded 64MB limit".to_string(),
            ));
        }

        match serde_json::from_str::<Packument>(&text) {
            Ok(packument) => Ok(Some(packument)),
            Err(e) => {
                eprintln!(
                    "{} Metadata for {} could not be parsed: {}. Skipping.",
                    "Warning:".yellow().bold(),
                    name,
                    e
                );
                Ok(None)
            }
        }
    }
}
