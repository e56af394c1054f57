use async_trait::async_trait;
use bdaybot_core::BlobStore;
use bdaybot_domain::{RelayError, Result};
use reqwest::{Method, StatusCode};
use tracing::debug;
use url::Url;

use super::validate_key;
use crate::errors::InfraError;
use crate::http::HttpClient;

/// Blobs stored in a bucket behind a plain HTTP object API.
///
/// `GET {endpoint}/{bucket}/{key}` reads a blob (404 means absent) and
/// `PUT` replaces it. Requests carry a bearer token when one is configured.
#[derive(Clone)]
pub struct ObjectStoreBlobStore {
    http: HttpClient,
    base: Url,
    token: Option<String>,
}

impl ObjectStoreBlobStore {
    pub fn new(endpoint: &str, bucket: &str, token: Option<String>) -> Result<Self> {
        Self::with_client(HttpClient::new()?, endpoint, bucket, token)
    }

    pub fn with_client(
        http: HttpClient,
        endpoint: &str,
        bucket: &str,
        token: Option<String>,
    ) -> Result<Self> {
        if bucket.is_empty() || bucket.contains('/') {
            return Err(RelayError::Configuration(format!("invalid bucket name: {bucket:?}")));
        }

        let mut base = Url::parse(endpoint).map_err(|err| {
            RelayError::Configuration(format!("invalid object store endpoint {endpoint:?}: {err}"))
        })?;
        base.path_segments_mut()
            .map_err(|()| {
                RelayError::Configuration(format!(
                    "object store endpoint cannot be a base: {endpoint}"
                ))
            })?
            .pop_if_empty()
            .push(bucket);

        Ok(Self { http, base, token })
    }

    fn url_for(&self, key: &str) -> Result<Url> {
        validate_key(key)?;
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| RelayError::Internal("object store base url lost its path".into()))?
            .extend(key.split('/'));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let url = self.url_for(key)?;
        let response = self.http.send(self.request(Method::GET, url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(key, "storage.object.not_found");
            return Ok(None);
        }

        let response = response.error_for_status().map_err(InfraError::from)?;
        let bytes = response.bytes().await.map_err(InfraError::from)?;
        debug!(key, bytes = bytes.len(), "storage.object.get");
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let url = self.url_for(key)?;
        let size = bytes.len();
        let builder = self
            .request(Method::PUT, url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes);

        self.http.send(builder).await?.error_for_status().map_err(InfraError::from)?;
        debug!(key, bytes = size, "storage.object.put");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn store(server: &MockServer, token: Option<&str>) -> ObjectStoreBlobStore {
        let http = HttpClient::builder()
            .base_backoff(Duration::from_millis(5))
            .max_attempts(3)
            .build()
            .expect("http client");
        ObjectStoreBlobStore::with_client(http, &server.uri(), "relay", token.map(String::from))
            .expect("store")
    }

    #[tokio::test]
    async fn get_returns_body_of_existing_blob() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/relay/auth_info/session.json"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{\"files\":{}}".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let bytes = store(&server, Some("s3cret")).get("auth_info/session.json").await.unwrap();

        assert_eq!(bytes, Some(b"{\"files\":{}}".to_vec()));
    }

    #[tokio::test]
    async fn missing_blob_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(store(&server, None).get("auth_state/last_auth.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_uploads_bytes_and_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/relay/auth_state/last_auth.json"))
            .and(body_bytes(b"{\"timestamp\":\"2026-05-04T08:00:00Z\"}".to_vec()))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/relay/auth_state/last_auth.json"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        store(&server, None)
            .put(
                "auth_state/last_auth.json",
                b"{\"timestamp\":\"2026-05-04T08:00:00Z\"}".to_vec(),
            )
            .await
            .unwrap();

        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejected_credentials_are_a_configuration_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = store(&server, Some("expired"))
            .put("auth_info/session.json", b"{}".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Configuration(_)));
    }
}
