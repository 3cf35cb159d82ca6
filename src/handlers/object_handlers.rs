//! HTTP handlers for the object-access workflows and document lookups.
//! Payload parsing happens here; everything else is delegated to
//! `StorageGateway`.

use crate::{
    errors::AppError,
    models::{
        document::Document,
        object_access::{DeleteObjectRequest, ObjectRequest, ObjectResponse},
    },
    services::gateway_service::StorageGateway,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

/// `POST /objects`: signed headers for a new upload or an existing object.
pub async fn prepare_object(
    State(gateway): State<StorageGateway>,
    payload: Result<Json<ObjectRequest>, JsonRejection>,
) -> Result<Json<ObjectResponse>, AppError> {
    let Json(request) = payload.map_err(bad_payload)?;
    let response = gateway.prepare_object_access(request).await?;
    Ok(Json(response))
}

/// `DELETE /objects`: delete at the backend, echo the request body.
pub async fn delete_object(
    State(gateway): State<StorageGateway>,
    payload: Result<Json<DeleteObjectRequest>, JsonRejection>,
) -> Result<Json<DeleteObjectRequest>, AppError> {
    let Json(request) = payload.map_err(bad_payload)?;
    let echoed = gateway.delete_object_access(request).await?;
    Ok(Json(echoed))
}

/// `GET /documents/{id}`
pub async fn get_document(
    State(gateway): State<StorageGateway>,
    Path(id): Path<i64>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(gateway.get_document(id).await?))
}

/// Every payload rejection is a 400, including well-formed JSON of the
/// wrong shape.
fn bad_payload(rejection: JsonRejection) -> AppError {
    AppError::bad_request(rejection.body_text())
}
