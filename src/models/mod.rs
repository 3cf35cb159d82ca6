//! Core data models for the document gateway.
//!
//! `Document` maps to the `documents` table via `sqlx::FromRow`; the
//! object-access payloads are the JSON bodies of the HTTP surface.

pub mod document;
pub mod object_access;
