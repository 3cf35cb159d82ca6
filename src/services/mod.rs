pub mod document_store;
pub mod gateway_service;
pub mod object_backend;
pub mod signer;
