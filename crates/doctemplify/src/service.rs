/*
 * service.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Collaborator interfaces for the remote document and file services.
//!
//! The engine never talks HTTP itself. Callers provide implementations of
//! [`DocumentService`] and [`FileService`] (backed by a real API client, or
//! by [`MemoryDocumentService`](crate::memory::MemoryDocumentService) in
//! tests) and every failure crosses back as a [`RemoteError`].
//!
//! Every method is a blocking round trip from the engine's point of view:
//! the engine awaits each call before issuing the next, because the index
//! space of a document changes with every mutation.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::request::{Reply, Request};

/// Result type for collaborator calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Broad classification of a collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Credentials missing, expired or rejected
    Auth,
    /// The addressed document or file does not exist
    NotFound,
    /// The service rejected the request as malformed
    InvalidRequest,
    /// Network or server failure
    Transport,
}

/// A failure reported by a collaborator.
#[derive(Debug)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    /// Name of the remote operation, e.g. `documents.get`
    pub operation: String,
    pub message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl RemoteError {
    pub fn new(
        kind: RemoteErrorKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying transport error.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} error in {}: {}", self.kind, self.operation, self.message)
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Identifier and URL of a freshly created document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedDocument {
    pub document_id: String,
    pub url: String,
}

/// Who a permission grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GranteeType {
    Anyone,
    User,
}

/// Access level of a permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Commenter,
    Writer,
}

/// A permission grant on a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(rename = "type")]
    pub grantee: GranteeType,
    pub role: Role,
}

impl Permission {
    /// Anyone with the link may edit.
    pub fn public_writer() -> Self {
        Self {
            grantee: GranteeType::Anyone,
            role: Role::Writer,
        }
    }
}

/// Operations on the structured content of documents.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Create an empty document.
    async fn create_document(&self, title: &str) -> RemoteResult<CreatedDocument>;

    /// Fetch a full structural snapshot of a document.
    async fn get_document(&self, document_id: &str) -> RemoteResult<Document>;

    /// Apply requests in order, returning one reply per request.
    async fn batch_apply(&self, document_id: &str, requests: &[Request])
    -> RemoteResult<Vec<Reply>>;

    /// Replace every occurrence of `search` with `replacement`.
    ///
    /// Returns the number of occurrences changed.
    async fn replace_all_text(
        &self,
        document_id: &str,
        search: &str,
        replacement: &str,
        match_case: bool,
    ) -> RemoteResult<u32>;
}

/// Operations on documents as files.
#[async_trait]
pub trait FileService: Send + Sync {
    /// Copy a file, returning the id of the copy.
    async fn copy_file(&self, file_id: &str, new_name: &str) -> RemoteResult<String>;

    /// Grant a permission on a file.
    async fn create_permission(&self, file_id: &str, permission: &Permission) -> RemoteResult<()>;
}

/// Fetch a document, retrying failed reads.
///
/// Only reads go through here: batch mutations and text replacement are not
/// idempotent and are issued exactly once. Authentication failures are not
/// retried.
pub(crate) async fn get_document_with_retry(
    service: &dyn DocumentService,
    document_id: &str,
    retries: u32,
) -> RemoteResult<Document> {
    let mut attempt = 0;
    loop {
        match service.get_document(document_id).await {
            Ok(document) => return Ok(document),
            Err(err) if attempt < retries && err.kind != RemoteErrorKind::Auth => {
                attempt += 1;
                tracing::warn!(
                    document = %document_id,
                    attempt,
                    error = %err,
                    "Retrying document fetch"
                );
            }
            Err(err) => return Err(err),
        }
    }
}
