//! Metadata row tracking an object the gateway has named.

use serde::Serialize;
use sqlx::FromRow;

/// A stored object's display name, generated key and full storage URI.
///
/// Rows are never updated; they are created after a successful upload
/// signing round-trip and removed by the delete workflow.
#[derive(Serialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Document {
    /// Auto-assigned row identifier.
    pub id: i64,

    /// Original filename supplied by the caller.
    pub name: String,

    /// Generated `<uuid><ext>` key used in the bucket.
    pub unique_name: String,

    /// Full storage URI. Unique across all documents.
    pub path: String,
}

/// Insert payload for [`Document`]; the id is assigned by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDocument {
    pub name: String,
    pub unique_name: String,
    pub path: String,
}
