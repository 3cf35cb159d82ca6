//! Fakes and fixtures shared by the unit tests.

use crate::{
    config::{
        Credentials, DEFAULT_MAX_ATTEMPTS, DEFAULT_REGION, DEFAULT_SERVICE, DEFAULT_TIMEOUT_SECS,
        StorageConfig,
    },
    errors::{GatewayError, GatewayResult},
    services::{
        document_store::{SqliteDocumentStore, run_migrations},
        gateway_service::StorageGateway,
        object_backend::ObjectBackend,
        signer::{RequestSigner, SignedHeaders},
    },
};
use async_trait::async_trait;
use reqwest::Method;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use url::Url;

pub fn complete_storage_config() -> StorageConfig {
    StorageConfig {
        access_key_id: Some("AKIDEXAMPLE".into()),
        secret_access_key: Some("secret".into()),
        host: Some("store.example.com".into()),
        bucket: Some("docs".into()),
        region: DEFAULT_REGION.into(),
        service: DEFAULT_SERVICE.into(),
        endpoint_url: None,
        timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        max_attempts: DEFAULT_MAX_ATTEMPTS,
    }
}

/// Migrated in-memory database. One connection, so every query sees the
/// same database.
pub async fn memory_pool() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(pool)
}

/// Signer returning `SIGNED <METHOD> <uri>` and recording each call.
#[derive(Default)]
pub struct FakeSigner {
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeSigner {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl RequestSigner for FakeSigner {
    fn sign(
        &self,
        method: &Method,
        uri: &Url,
        _credentials: &Credentials,
    ) -> GatewayResult<SignedHeaders> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), uri.to_string()));
        Ok(SignedHeaders {
            authorization: format!("SIGNED {} {}", method, uri),
            amz_date: "20240101T000000Z".into(),
            content_sha256: "e3b0".into(),
        })
    }
}

/// Backend that records requests and optionally answers with an error status.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<(String, String, SignedHeaders)>>,
    fail_status: Mutex<Option<u16>>,
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<(String, String, SignedHeaders)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(m, _, _)| m).collect()
    }

    pub fn fail_with(&self, status: u16) {
        *self.fail_status.lock().unwrap() = Some(status);
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
        *self.fail_status.lock().unwrap() = None;
    }
}

#[async_trait]
impl ObjectBackend for RecordingBackend {
    async fn execute(
        &self,
        method: Method,
        uri: &Url,
        headers: &SignedHeaders,
    ) -> GatewayResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), uri.to_string(), headers.clone()));
        match *self.fail_status.lock().unwrap() {
            Some(status) => Err(GatewayError::BackendStatus {
                method: method.to_string(),
                uri: uri.to_string(),
                status,
            }),
            None => Ok(()),
        }
    }
}

/// A gateway wired to fakes, with handles to inspect them.
pub struct TestHarness {
    pub gateway: StorageGateway,
    pub pool: Arc<SqlitePool>,
    pub store: Arc<SqliteDocumentStore>,
    pub signer: Arc<FakeSigner>,
    pub backend: Arc<RecordingBackend>,
}

impl TestHarness {
    pub async fn new(config: StorageConfig) -> Self {
        let pool = memory_pool().await;
        let store = Arc::new(SqliteDocumentStore::new(pool.clone()));
        let signer = Arc::new(FakeSigner::default());
        let backend = Arc::new(RecordingBackend::default());
        let gateway = StorageGateway::new(config, store.clone(), signer.clone(), backend.clone());
        Self {
            gateway,
            pool,
            store,
            signer,
            backend,
        }
    }

    pub async fn document_count(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents")
            .fetch_one(&*self.pool)
            .await
            .unwrap()
    }
}
