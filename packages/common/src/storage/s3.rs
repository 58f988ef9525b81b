use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tracing::debug;

use super::error::StorageError;
use super::traits::ObjectStore;
use crate::event::StorageKey;

/// S3 (or S3-compatible) object store.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
}

impl S3ObjectStore {
    /// Connect to `bucket` in `region`. Credentials come from the usual AWS
    /// environment/profile chain. A custom `endpoint` switches to path-style
    /// addressing for S3-compatible servers.
    pub fn new(bucket: &str, region: &str, endpoint: Option<&str>) -> Result<Self, StorageError> {
        let credentials = Credentials::default().map_err(|e| StorageError::Backend {
            status: None,
            message: format!("failed to load credentials: {e}"),
        })?;
        Self::with_credentials(bucket, region, endpoint, credentials)
    }

    fn with_credentials(
        bucket: &str,
        region: &str,
        endpoint: Option<&str>,
        credentials: Credentials,
    ) -> Result<Self, StorageError> {
        let region = match endpoint {
            Some(endpoint) => Region::Custom {
                region: region.to_string(),
                endpoint: endpoint.to_string(),
            },
            None => region.parse().map_err(|e| StorageError::Backend {
                status: None,
                message: format!("invalid region '{region}': {e}"),
            })?,
        };

        let mut bucket = Bucket::new(bucket, region, credentials).map_err(backend)?;
        if endpoint.is_some() {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }
}

fn backend(err: S3Error) -> StorageError {
    match err {
        S3Error::HttpFailWithBody(status, body) => StorageError::Backend {
            status: Some(status),
            message: body,
        },
        other => StorageError::Backend {
            status: None,
            message: other.to_string(),
        },
    }
}

fn check_status(status: u16, key: &StorageKey) -> Result<(), StorageError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound(key.to_string())),
        other => Err(StorageError::Backend {
            status: Some(other),
            message: format!("unexpected status for '{key}'"),
        }),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &StorageKey,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .bucket
            .put_object_with_content_type(key.as_str(), data, content_type)
            .await
            .map_err(backend)?;
        debug!(
            bucket = %self.bucket.name(),
            key = %key,
            status = response.status_code(),
            "Object written"
        );
        check_status(response.status_code(), key)
    }

    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>, StorageError> {
        let response = match self.bucket.get_object(key.as_str()).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(backend(e)),
        };
        check_status(response.status_code(), key)?;
        Ok(response.bytes().to_vec())
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError> {
        match self.bucket.head_object(key.as_str()).await {
            Ok((_, status)) => Ok((200..300).contains(&status)),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(backend(e)),
        }
    }

    async fn delete(&self, key: &StorageKey) -> Result<bool, StorageError> {
        if !self.exists(key).await? {
            return Ok(false);
        }
        let response = self
            .bucket
            .delete_object(key.as_str())
            .await
            .map_err(backend)?;
        check_status(response.status_code(), key)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineError;
    use crate::error::Upstream;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> S3ObjectStore {
        let credentials =
            Credentials::new(Some("AKIDEXAMPLE"), Some("secret"), None, None, None).unwrap();
        S3ObjectStore::with_credentials("images", "us-east-1", Some(&server.uri()), credentials)
            .unwrap()
    }

    #[tokio::test]
    async fn put_sends_object_with_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/images/abc123"))
            .and(header("content-type", "image/png"))
            .and(body_bytes(b"png bytes".to_vec()))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag\""))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .put(&StorageKey::new("abc123"), b"png bytes", "image/png")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_put_is_object_store_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
            .mount(&server)
            .await;

        let err = store(&server)
            .put(&StorageKey::new("abc123"), b"data", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Backend {
                status: Some(403),
                ..
            }
        ));
        assert!(matches!(
            PipelineError::from(err),
            PipelineError::Upstream {
                service: Upstream::ObjectStore,
                status: Some(403),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn get_returns_body_and_maps_missing_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/images/present"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"stored".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/images/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server);
        assert_eq!(store.get(&StorageKey::new("present")).await.unwrap(), b"stored");
        assert!(matches!(
            store.get(&StorageKey::new("missing")).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_checks_existence_first() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/images/present"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/images/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/images/present"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server);
        assert!(store.exists(&StorageKey::new("present")).await.unwrap());
        assert!(!store.exists(&StorageKey::new("missing")).await.unwrap());
        assert!(store.delete(&StorageKey::new("present")).await.unwrap());
        assert!(!store.delete(&StorageKey::new("missing")).await.unwrap());
    }

    #[test]
    fn status_mapping() {
        let key = StorageKey::new("k");
        assert!(check_status(204, &key).is_ok());
        assert!(matches!(
            check_status(404, &key),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            check_status(500, &key),
            Err(StorageError::Backend {
                status: Some(500),
                ..
            })
        ));
    }
}
