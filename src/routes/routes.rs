//! Defines the HTTP surface of the gateway.
//!
//! ## Structure
//! - `POST   /objects`         signed headers for an upload or a download
//! - `DELETE /objects`         delete an object, echo the request body
//! - `GET    /documents/{id}`  document metadata
//! - `GET    /healthz`, `GET /readyz`  health checks

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{delete_object, get_document, prepare_object},
    },
    services::gateway_service::StorageGateway,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router. Handlers share the `StorageGateway` state.
pub fn routes() -> Router<StorageGateway> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/objects", post(prepare_object).delete(delete_object))
        .route("/documents/{id}", get(get_document))
}
