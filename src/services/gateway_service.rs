//! src/services/gateway_service.rs
//!
//! StorageGateway: hands out backend-signed headers so callers can talk to
//! the bucket directly, while the gateway picks object keys and keeps the
//! `documents` table in step with what it has signed.
//!
//! Every workflow that reaches the backend performs exactly the round-trips
//! below and nothing else:
//! - new object:      sign PUT, send empty PUT, insert document
//! - existing object: sign GET, send GET
//! - delete:          sign GET, send GET, send DELETE with the GET headers,
//!                    drop the matching document if there is one

use crate::{
    config::StorageConfig,
    errors::{GatewayError, GatewayResult},
    models::{
        document::{Document, NewDocument},
        object_access::{DeleteObjectRequest, ObjectRequest, ObjectResponse},
    },
    services::{document_store::DocumentStore, object_backend::ObjectBackend, signer::RequestSigner},
};
use reqwest::Method;
use std::{path::Path, sync::Arc};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

#[derive(Clone)]
pub struct StorageGateway {
    config: Arc<StorageConfig>,
    store: Arc<dyn DocumentStore>,
    signer: Arc<dyn RequestSigner>,
    backend: Arc<dyn ObjectBackend>,
}

/// What a prepare request resolved to.
enum Target {
    Existing {
        filepath: String,
        uri: Url,
    },
    New {
        filename: String,
        unique_name: String,
        filepath: String,
        uri: Url,
    },
}

impl StorageGateway {
    pub fn new(
        config: StorageConfig,
        store: Arc<dyn DocumentStore>,
        signer: Arc<dyn RequestSigner>,
        backend: Arc<dyn ObjectBackend>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            signer,
            backend,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Sign access to a new or existing object.
    ///
    /// With `s3sourceuri` the existing object is read-signed and nothing is
    /// recorded. Otherwise a fresh `<uuid><ext>` key is composed under
    /// `folder`, write-signed, and recorded once the round-trip succeeded.
    pub async fn prepare_object_access(
        &self,
        request: ObjectRequest,
    ) -> GatewayResult<ObjectResponse> {
        let credentials = self.config.credentials()?;
        let target = self.resolve_target(&request)?;

        let (method, uri) = match &target {
            Target::Existing { uri, .. } => (Method::GET, uri),
            Target::New { uri, .. } => (Method::PUT, uri),
        };
        let signed = self.signer.sign(&method, uri, &credentials)?;
        self.backend.execute(method, uri, &signed).await?;

        match target {
            Target::Existing { filepath, .. } => {
                info!("signed GET for existing object {}", filepath);
                Ok(ObjectResponse {
                    filepath,
                    authheader: signed.authorization,
                    amzdate: signed.amz_date,
                    uniquefilename: String::new(),
                })
            }
            Target::New {
                filename,
                unique_name,
                filepath,
                ..
            } => {
                let doc = self
                    .store
                    .create(NewDocument {
                        name: filename,
                        unique_name: unique_name.clone(),
                        path: filepath.clone(),
                    })
                    .await?;
                info!("signed PUT for document {} at {}", doc.id, doc.path);
                Ok(ObjectResponse {
                    filepath,
                    authheader: signed.authorization,
                    amzdate: signed.amz_date,
                    uniquefilename: unique_name,
                })
            }
        }
    }

    /// Delete an object at the backend and forget its document.
    ///
    /// The DELETE reuses the headers harvested from a signed GET on the
    /// same URI. A missing document is not an error.
    pub async fn delete_object_access(
        &self,
        request: DeleteObjectRequest,
    ) -> GatewayResult<DeleteObjectRequest> {
        let credentials = self.config.credentials()?;
        let uri = parse_object_uri(&request.filepath, "filepath")?;

        let harvested = self.signer.sign(&Method::GET, &uri, &credentials)?;
        self.backend.execute(Method::GET, &uri, &harvested).await?;
        self.backend
            .execute(Method::DELETE, &uri, &harvested)
            .await?;

        match self.store.find_by_path(&request.filepath).await? {
            Some(doc) => match self.store.delete(&doc).await {
                Ok(()) => info!("deleted document {} at {}", doc.id, doc.path),
                // Lost a race with a concurrent delete of the same path.
                Err(GatewayError::DocumentNotFound(id)) => {
                    debug!("document {} already removed", id)
                }
                Err(err) => return Err(err),
            },
            None => debug!("no document recorded for {}", request.filepath),
        }

        Ok(request)
    }

    pub async fn get_document(&self, id: i64) -> GatewayResult<Document> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(GatewayError::DocumentNotFound(id))
    }

    /// `https://{host}/{bucket}{/folder/}{filename}`, or `""` when host,
    /// bucket or filename is missing or the folder is unusable.
    pub fn compute_object_url(&self, filename: &str, folder: &str) -> String {
        match self.object_uri(filename, folder) {
            Ok(Some(uri)) => uri.to_string(),
            _ => String::new(),
        }
    }

    /// Object URI built segment by segment, so `?`, `#` and `%` in the
    /// folder or key are percent-encoded instead of ending the path.
    /// `None` when host, bucket or filename is missing.
    fn object_uri(&self, filename: &str, folder: &str) -> GatewayResult<Option<Url>> {
        let host = self.config.host.as_deref().unwrap_or_default();
        let bucket = self.config.bucket.as_deref().unwrap_or_default();
        if host.is_empty() || bucket.is_empty() || filename.is_empty() {
            return Ok(None);
        }
        let Some(base) = self.config.base_url() else {
            return Ok(None);
        };
        let folder = folder_segments(folder)?;

        let mut uri = Url::parse(&base).map_err(|err| {
            GatewayError::Config(format!("invalid storage base URL `{}`: {}", base, err))
        })?;
        uri.path_segments_mut()
            .map_err(|_| {
                GatewayError::Config(format!("storage base URL `{}` cannot carry a path", base))
            })?
            .pop_if_empty()
            .push(bucket)
            .extend(folder)
            .push(filename);
        Ok(Some(uri))
    }

    fn resolve_target(&self, request: &ObjectRequest) -> GatewayResult<Target> {
        if let Some(source) = request.source_uri() {
            return Ok(Target::Existing {
                filepath: source.to_string(),
                uri: parse_object_uri(source, "s3sourceuri")?,
            });
        }

        let filename = request
            .filename
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| GatewayError::Validation("filename is required".into()))?;
        let unique_name = unique_object_key(filename);
        let uri = self
            .object_uri(&unique_name, request.folder.as_deref().unwrap_or(""))?
            .ok_or_else(|| GatewayError::Config("storage host or bucket is not set".into()))?;
        // The stored path is exactly the URI that gets signed.
        let filepath = uri.to_string();

        Ok(Target::New {
            filename: filename.to_string(),
            unique_name,
            filepath,
            uri,
        })
    }
}

/// Random key that keeps the original extension.
fn unique_object_key(filename: &str) -> String {
    format!("{}{}", Uuid::new_v4(), file_extension(filename))
}

/// Extension including its dot; leading dots of hidden files don't count.
fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Folder split into path segments, surrounding separators dropped.
fn folder_segments(folder: &str) -> GatewayResult<Vec<&str>> {
    let trimmed = folder.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let segments = trimmed.split('/').collect::<Vec<_>>();
    if let Some(dot) = segments.iter().find(|s| matches!(**s, "." | "..")) {
        return Err(GatewayError::Validation(format!(
            "folder `{}` must not contain `{}` segments",
            folder, dot
        )));
    }
    Ok(segments)
}

fn parse_object_uri(raw: &str, field: &str) -> GatewayResult<Url> {
    if raw.trim().is_empty() {
        return Err(GatewayError::Validation(format!("{} is required", field)));
    }
    let uri = Url::parse(raw)
        .map_err(|err| GatewayError::Validation(format!("{} `{}` is not a URI: {}", field, raw, err)))?;
    if uri.host_str().is_none() {
        return Err(GatewayError::Validation(format!("{} `{}` has no host", field, raw)));
    }
    Ok(uri)
}
