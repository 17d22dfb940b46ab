// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Google Cloud Storage bucket backend

use super::{BucketOps, StorageError, StorageErrorKind};
use async_trait::async_trait;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::buckets::get::GetBucketRequest;
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::rewrite::RewriteObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;
use tally_core::classify::{is_transient, ErrorFacets};

/// GCS-backed [`BucketOps`].
#[derive(Clone)]
pub struct GcsBucket {
    client: Client,
    bucket: String,
}

impl GcsBucket {
    /// Connect using ambient application-default credentials.
    pub async fn connect(bucket: impl Into<String>) -> Result<Self, StorageError> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| StorageError::permission(format!("storage auth failed: {e}")))?;
        Ok(Self {
            client: Client::new(config),
            bucket: bucket.into(),
        })
    }

    fn convert(err: GcsError) -> StorageError {
        match err {
            GcsError::Response(resp) => {
                let status = resp.code as u16;
                let message = format!("gcs responded {status}: {}", resp.message);
                match status {
                    404 => StorageError::not_found(message),
                    401 | 403 => StorageError::permission(message),
                    _ => {
                        let facets = ErrorFacets {
                            http_status: Some(status),
                            store_code: None,
                            message: &message,
                        };
                        if is_transient(facets) {
                            StorageError::transient(message)
                        } else {
                            StorageError::permanent(message)
                        }
                    }
                }
            }
            GcsError::HttpClient(e) => {
                let message = format!("gcs http error: {e}");
                if e.is_timeout() || e.is_connect() {
                    StorageError::transient(message)
                } else {
                    let facets = ErrorFacets {
                        http_status: e.status().map(|s| s.as_u16()),
                        store_code: None,
                        message: &message,
                    };
                    if is_transient(facets) {
                        StorageError::transient(message)
                    } else {
                        StorageError::permanent(message)
                    }
                }
            }
            GcsError::TokenSource(e) => {
                StorageError::permission(format!("gcs token source error: {e}"))
            }
            other => StorageError::new(StorageErrorKind::Permanent, format!("gcs error: {other}")),
        }
    }
}

#[async_trait]
impl BucketOps for GcsBucket {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        let media = Media {
            name: key.to_string().into(),
            content_type: content_type.to_string().into(),
            content_length: Some(bytes.len() as u64),
        };
        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                bytes.to_vec(),
                &UploadType::Simple(media),
            )
            .await
            .map_err(Self::convert)?;
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let result = self
            .client
            .get_object(&GetObjectRequest {
                bucket: self.bucket.clone(),
                object: key.to_string(),
                ..Default::default()
            })
            .await;
        match result.map_err(Self::convert) {
            Ok(object) => Ok(Some(object.size as u64)),
            Err(e) if e.kind == StorageErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        // rewrite_object is GCS's server-side move primitive; large
        // objects may need multiple calls chained by rewrite_token.
        let mut token: Option<String> = None;
        loop {
            let response = self
                .client
                .rewrite_object(&RewriteObjectRequest {
                    source_bucket: self.bucket.clone(),
                    source_object: src.to_string(),
                    destination_bucket: self.bucket.clone(),
                    destination_object: dst.to_string(),
                    rewrite_token: token,
                    ..Default::default()
                })
                .await
                .map_err(Self::convert)?;
            if response.done {
                return Ok(());
            }
            token = response.rewrite_token;
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object(&DeleteObjectRequest {
                bucket: self.bucket.clone(),
                object: key.to_string(),
                ..Default::default()
            })
            .await
            .map_err(Self::convert)
    }

    async fn probe(&self) -> Result<(), StorageError> {
        self.client
            .get_bucket(&GetBucketRequest {
                bucket: self.bucket.clone(),
                ..Default::default()
            })
            .await
            .map_err(Self::convert)?;
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        format!("gs://{}/{}", self.bucket, key)
    }
}
