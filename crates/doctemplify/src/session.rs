/*
 * session.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! An editing session on one remote document.
//!
//! A session pairs the document service with a document id and the
//! session's own [`PositionTracker`]. Assembly and substitution each run in
//! a fresh session; no cursor state is shared between sessions or kept in
//! statics, so sessions on different documents are independent. Two
//! sessions on the same document must not run concurrently.

use crate::document::Document;
use crate::error::Result;
use crate::position::PositionTracker;
use crate::request::{Reply, Request};
use crate::service::{DocumentService, get_document_with_retry};

pub struct EditSession<'a> {
    service: &'a dyn DocumentService,
    document_id: String,
    read_retries: u32,
    pub tracker: PositionTracker,
}

impl<'a> EditSession<'a> {
    pub fn new(
        service: &'a dyn DocumentService,
        document_id: impl Into<String>,
        read_retries: u32,
    ) -> Self {
        Self {
            service,
            document_id: document_id.into(),
            read_retries,
            tracker: PositionTracker::new(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn cursor(&self) -> usize {
        self.tracker.cursor()
    }

    /// Fetch the current document state, retrying failed reads.
    pub async fn fetch(&self) -> Result<Document> {
        tracing::debug!(document = %self.document_id, "Fetching document");
        Ok(get_document_with_retry(self.service, &self.document_id, self.read_retries).await?)
    }

    /// Apply a batch of requests in order.
    pub async fn apply(&self, requests: &[Request]) -> Result<Vec<Reply>> {
        tracing::debug!(
            document = %self.document_id,
            count = requests.len(),
            kinds = ?requests.iter().map(Request::kind).collect::<Vec<_>>(),
            "Applying requests"
        );
        Ok(self
            .service
            .batch_apply(&self.document_id, requests)
            .await?)
    }

    /// Replace every occurrence of a literal, returning the count.
    pub async fn replace_all(
        &self,
        search: &str,
        replacement: &str,
        match_case: bool,
    ) -> Result<u32> {
        let occurrences = self
            .service
            .replace_all_text(&self.document_id, search, replacement, match_case)
            .await?;
        tracing::debug!(
            document = %self.document_id,
            search = %search,
            occurrences,
            "Replaced text"
        );
        Ok(occurrences)
    }
}
