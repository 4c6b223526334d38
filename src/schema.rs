//! Schema documents and the fetcher that retrieves them.
//!
//! A [`SchemaDocument`] is treated as opaque JSON: it is fetched from a spec's schema
//! location and republished verbatim. The [`SchemaFetcher`] trait is the seam a host can
//! replace; [`DefaultSchemaFetcher`] handles HTTP(S) URLs and local files.

use crate::error::{Error, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// An API description document, stored and served as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDocument(Value);

impl SchemaDocument {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Pretty-printed JSON with two-space indentation.
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }

    /// Parses JSON, falling back to YAML.
    pub fn parse(location: &str, bytes: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Ok(Self(value)),
            Err(json_err) => match serde_yaml::from_slice::<Value>(bytes) {
                Ok(value) if value.is_object() => Ok(Self(value)),
                Ok(_) => Err(Error::Parse {
                    location: location.to_string(),
                    message: "document is not a JSON or YAML object".to_string(),
                }),
                Err(yaml_err) => Err(Error::Parse {
                    location: location.to_string(),
                    message: format!("not JSON ({}) and not YAML ({})", json_err, yaml_err),
                }),
            },
        }
    }
}

impl From<Value> for SchemaDocument {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Retrieves the schema document a spec points at.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, schema_location: &str) -> Result<SchemaDocument>;
}

/// Fetches `http://` and `https://` locations over the network and reads anything else
/// as a file path relative to the project root.
#[derive(Debug, Clone)]
pub struct DefaultSchemaFetcher {
    client: reqwest::Client,
    base_dir: PathBuf,
}

impl DefaultSchemaFetcher {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_client(reqwest::Client::new(), base_dir)
    }

    pub fn with_client(client: reqwest::Client, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            base_dir: base_dir.into(),
        }
    }

    fn is_remote(location: &str) -> bool {
        location.starts_with("http://") || location.starts_with("https://")
    }

    fn resolve_path(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    async fn fetch_remote(&self, location: &str) -> Result<Vec<u8>> {
        let fetch_err = |message: String| Error::Fetch {
            location: location.to_string(),
            message,
        };

        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| fetch_err(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(fetch_err(format!("server responded {}", response.status())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_err(format!("failed to read body: {}", e)))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl SchemaFetcher for DefaultSchemaFetcher {
    async fn fetch(&self, schema_location: &str) -> Result<SchemaDocument> {
        let bytes = if Self::is_remote(schema_location) {
            debug!("Fetching schema over HTTP: {}", schema_location);
            self.fetch_remote(schema_location).await?
        } else {
            let path = self.resolve_path(schema_location);
            debug!("Reading schema from file: {}", path.display());
            tokio::fs::read(&path).await.map_err(|e| Error::Fetch {
                location: schema_location.to_string(),
                message: format!("cannot read {}: {}", path.display(), e),
            })?
        };

        SchemaDocument::parse(schema_location, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::net::SocketAddr;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response.
    async fn start_test_server(body: &'static str, status: u16) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        addr
    }

    #[test]
    fn test_pretty_json_is_indented() {
        let doc = SchemaDocument::new(json!({"openapi": "3.0.0", "paths": {}}));
        assert_eq!(
            doc.to_pretty_json().unwrap(),
            "{\n  \"openapi\": \"3.0.0\",\n  \"paths\": {}\n}"
        );
    }

    #[test]
    fn test_parse_yaml_fallback() {
        let doc = SchemaDocument::parse("spec.yaml", b"openapi: 3.0.0\ninfo:\n  title: Pets\n").unwrap();
        assert_eq!(doc.as_value()["info"]["title"], "Pets");
    }

    #[test]
    fn test_parse_rejects_scalars() {
        assert!(matches!(
            SchemaDocument::parse("x", b"just words"),
            Err(Error::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_local_relative_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("pets.json"), r#"{"openapi":"3.0.0"}"#).unwrap();

        let fetcher = DefaultSchemaFetcher::new(temp_dir.path());
        let doc = fetcher.fetch("pets.json").await.unwrap();
        assert_eq!(doc.into_value(), json!({"openapi": "3.0.0"}));
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_fetch_error() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = DefaultSchemaFetcher::new(temp_dir.path());
        match fetcher.fetch("missing.json").await {
            Err(Error::Fetch { location, .. }) => assert_eq!(location, "missing.json"),
            other => panic!("expected fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_over_http() {
        let addr = start_test_server(r#"{"swagger":"2.0"}"#, 200).await;
        let fetcher = DefaultSchemaFetcher::new(".");
        let doc = fetcher
            .fetch(&format!("http://{}/v2/api-docs", addr))
            .await
            .unwrap();
        assert_eq!(doc.as_value()["swagger"], "2.0");
    }

    #[tokio::test]
    async fn test_fetch_http_error_status() {
        let addr = start_test_server("nope", 500).await;
        let fetcher = DefaultSchemaFetcher::new(".");
        let result = fetcher.fetch(&format!("http://{}/spec.json", addr)).await;
        assert!(matches!(result, Err(Error::Fetch { .. })));
    }
}
