//! Request and response payloads of the object-access workflows.
//!
//! Field names follow the wire format clients already send
//! (`s3sourceuri`, `authheader`, ...), so no serde renames are applied.

use serde::{Deserialize, Serialize};

/// Body of `POST /objects`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectRequest {
    /// Original filename; required when no source URI is given.
    #[serde(default)]
    pub filename: Option<String>,

    /// Existing object to sign a download for.
    #[serde(default)]
    pub s3sourceuri: Option<String>,

    /// Logical sub-path prefix inside the bucket.
    #[serde(default)]
    pub folder: Option<String>,
}

impl ObjectRequest {
    /// Source URI, ignoring an empty string.
    pub fn source_uri(&self) -> Option<&str> {
        self.s3sourceuri.as_deref().filter(|s| !s.is_empty())
    }
}

/// Headers the caller attaches to its own request against the backend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectResponse {
    pub filepath: String,
    pub authheader: String,
    pub amzdate: String,
    /// Empty when an existing object was targeted.
    pub uniquefilename: String,
}

/// Body of `DELETE /objects`; echoed back unchanged on success.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DeleteObjectRequest {
    pub filepath: String,
}
