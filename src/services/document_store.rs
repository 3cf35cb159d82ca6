//! src/services/document_store.rs
//!
//! Persistence of `Document` rows. The gateway only depends on the
//! `DocumentStore` trait; `SqliteDocumentStore` is the production backing.

use crate::{
    errors::{GatewayError, GatewayResult},
    models::document::{Document, NewDocument},
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Keyed record store for documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document and return it with its assigned id.
    ///
    /// A `path` that already exists yields `DocumentConflict`.
    async fn create(&self, doc: NewDocument) -> GatewayResult<Document>;

    async fn find_by_id(&self, id: i64) -> GatewayResult<Option<Document>>;

    /// At most one row matches, `path` being unique.
    async fn find_by_path(&self, path: &str) -> GatewayResult<Option<Document>>;

    /// Remove a document. Deleting a row that is already gone is
    /// `DocumentNotFound`, callers look the row up first.
    async fn delete(&self, doc: &Document) -> GatewayResult<()>;

    /// Cheap connectivity check.
    async fn ping(&self) -> GatewayResult<()>;
}

#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: Arc<SqlitePool>,
}

impl SqliteDocumentStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(&self, doc: NewDocument) -> GatewayResult<Document> {
        let inserted = sqlx::query_as::<_, Document>(
            "INSERT INTO documents (name, unique_name, path)
             VALUES (?, ?, ?)
             RETURNING id, name, unique_name, path",
        )
        .bind(&doc.name)
        .bind(&doc.unique_name)
        .bind(&doc.path)
        .fetch_one(&*self.db)
        .await;

        match inserted {
            Ok(row) => Ok(row),
            Err(err) if is_unique_violation(&err) => Err(GatewayError::DocumentConflict(doc.path)),
            Err(err) => Err(GatewayError::Sqlx(err)),
        }
    }

    async fn find_by_id(&self, id: i64) -> GatewayResult<Option<Document>> {
        let row = sqlx::query_as::<_, Document>(
            "SELECT id, name, unique_name, path FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_path(&self, path: &str) -> GatewayResult<Option<Document>> {
        let row = sqlx::query_as::<_, Document>(
            "SELECT id, name, unique_name, path FROM documents WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, doc: &Document) -> GatewayResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(doc.id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::DocumentNotFound(doc.id));
        }
        Ok(())
    }

    async fn ping(&self) -> GatewayResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

/// Apply the embedded schema one statement at a time.
pub async fn run_migrations(db: &SqlitePool) -> GatewayResult<usize> {
    let statements = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in &statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(statements.len())
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
