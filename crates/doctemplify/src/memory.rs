/*
 * memory.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! In-memory implementation of the remote services.
//!
//! [`MemoryDocumentService`] keeps each document as a flat sequence of
//! index units and rebuilds a structural [`Document`] snapshot on every
//! read, so index arithmetic behaves like the real service:
//!
//! - text occupies one unit per UTF-16 code unit
//! - inserting a table at `i` inserts a newline at `i` and the table at
//!   `i + 1`; the table, each row and each cell take one unit, every cell
//!   holds an empty paragraph, and one unit closes the table
//! - an inline image takes one unit
//! - the final newline of the body can never be deleted
//!
//! Every call is recorded for inspection, and reads or writes can be made
//! to fail on demand.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::document::{
    Block, Document, IndexRange, InlineElement, InlineImage, Paragraph, Table, TableCell,
    TableRow, TextRun,
};
use crate::request::{Reply, Request};
use crate::service::{
    CreatedDocument, DocumentService, FileService, Permission, RemoteError, RemoteErrorKind,
    RemoteResult,
};

const NEWLINE: u16 = b'\n' as u16;

#[derive(Debug, Clone, PartialEq)]
enum Unit {
    Char(u16),
    Image {
        uri: String,
        width: f64,
        height: f64,
    },
    TableStart,
    RowStart,
    CellStart,
    TableEnd,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    title: String,
    /// `units[i]` sits at index `i + 1`.
    units: Vec<Unit>,
}

impl StoredDocument {
    fn new(title: &str, text: &str) -> Self {
        let mut units: Vec<Unit> = text.encode_utf16().map(Unit::Char).collect();
        if units.last() != Some(&Unit::Char(NEWLINE)) {
            units.push(Unit::Char(NEWLINE));
        }
        Self {
            title: title.to_string(),
            units,
        }
    }
}

/// A call made against the memory service.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    CreateDocument {
        title: String,
    },
    GetDocument {
        document_id: String,
    },
    BatchApply {
        document_id: String,
        requests: Vec<Request>,
    },
    ReplaceAllText {
        document_id: String,
        search: String,
        replacement: String,
        occurrences: u32,
    },
    CopyFile {
        file_id: String,
        new_name: String,
    },
    CreatePermission {
        file_id: String,
        permission: Permission,
    },
}

impl RecordedCall {
    /// Whether this call changed remote state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, RecordedCall::GetDocument { .. })
    }
}

#[derive(Debug, Default)]
struct State {
    documents: BTreeMap<String, StoredDocument>,
    permissions: Vec<(String, Permission)>,
    calls: Vec<RecordedCall>,
    next_id: u64,
    next_object_id: u64,
    failing_reads: u32,
    failing_writes: u32,
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("doc-{}", self.next_id)
    }

    fn document_mut(&mut self, operation: &str, id: &str) -> RemoteResult<&mut StoredDocument> {
        self.documents
            .get_mut(id)
            .ok_or_else(|| not_found(operation, id))
    }

    fn take_write_failure(&mut self, operation: &str) -> RemoteResult<()> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(RemoteError::new(
                RemoteErrorKind::Transport,
                operation,
                "injected write failure",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentService {
    state: Mutex<State>,
}

impl MemoryDocumentService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a document whose body is `text`, split into paragraphs at
    /// newlines. A final newline is added when missing.
    pub fn insert_document(&self, title: &str, text: &str) -> String {
        let mut state = self.state();
        let id = state.allocate_id();
        state
            .documents
            .insert(id.clone(), StoredDocument::new(title, text));
        id
    }

    /// Current snapshot of a document, without recording a call.
    pub fn snapshot(&self, document_id: &str) -> Option<Document> {
        let state = self.state();
        state
            .documents
            .get(document_id)
            .map(|doc| build_document(document_id, doc))
    }

    /// Plain text of a document, without recording a call.
    pub fn text(&self, document_id: &str) -> Option<String> {
        self.snapshot(document_id).map(|d| d.plain_text())
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Every request sent through `batch_apply`, flattened in order.
    pub fn requests(&self) -> Vec<Request> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::BatchApply { requests, .. } => Some(requests.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Number of calls that changed remote state.
    pub fn mutation_count(&self) -> usize {
        self.state().calls.iter().filter(|c| c.is_mutation()).count()
    }

    /// Permissions granted on a file.
    pub fn permissions(&self, file_id: &str) -> Vec<Permission> {
        self.state()
            .permissions
            .iter()
            .filter(|(id, _)| id == file_id)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Make the next `count` document reads fail with a transport error.
    pub fn fail_next_reads(&self, count: u32) {
        self.state().failing_reads = count;
    }

    /// Make the next `count` mutating calls fail with a transport error.
    pub fn fail_next_writes(&self, count: u32) {
        self.state().failing_writes = count;
    }
}

#[async_trait]
impl DocumentService for MemoryDocumentService {
    async fn create_document(&self, title: &str) -> RemoteResult<CreatedDocument> {
        let mut state = self.state();
        state.take_write_failure("documents.create")?;
        state.calls.push(RecordedCall::CreateDocument {
            title: title.to_string(),
        });
        let id = state.allocate_id();
        state
            .documents
            .insert(id.clone(), StoredDocument::new(title, ""));
        Ok(CreatedDocument {
            url: format!("memory://documents/{}", id),
            document_id: id,
        })
    }

    async fn get_document(&self, document_id: &str) -> RemoteResult<Document> {
        let mut state = self.state();
        state.calls.push(RecordedCall::GetDocument {
            document_id: document_id.to_string(),
        });
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(RemoteError::new(
                RemoteErrorKind::Transport,
                "documents.get",
                "injected read failure",
            ));
        }
        let doc = state
            .documents
            .get(document_id)
            .ok_or_else(|| not_found("documents.get", document_id))?;
        Ok(build_document(document_id, doc))
    }

    async fn batch_apply(
        &self,
        document_id: &str,
        requests: &[Request],
    ) -> RemoteResult<Vec<Reply>> {
        let mut state = self.state();
        state.take_write_failure("documents.batchUpdate")?;
        state.calls.push(RecordedCall::BatchApply {
            document_id: document_id.to_string(),
            requests: requests.to_vec(),
        });

        // Requests apply atomically: work on a copy and commit at the end.
        let mut working = state
            .document_mut("documents.batchUpdate", document_id)?
            .clone();
        let mut replies = Vec::with_capacity(requests.len());
        for request in requests {
            let reply = apply_request(&mut working.units, request)?;
            replies.push(match reply {
                Some(()) => {
                    state.next_object_id += 1;
                    Reply::InsertInlineImage {
                        object_id: format!("kix.{}", state.next_object_id),
                    }
                }
                None => Reply::Empty,
            });
        }
        *state.document_mut("documents.batchUpdate", document_id)? = working;
        Ok(replies)
    }

    async fn replace_all_text(
        &self,
        document_id: &str,
        search: &str,
        replacement: &str,
        match_case: bool,
    ) -> RemoteResult<u32> {
        let mut state = self.state();
        state.take_write_failure("documents.replaceAllText")?;
        let doc = state.document_mut("documents.replaceAllText", document_id)?;
        let (units, occurrences) = replace_units(&doc.units, search, replacement, match_case);
        doc.units = units;
        state.calls.push(RecordedCall::ReplaceAllText {
            document_id: document_id.to_string(),
            search: search.to_string(),
            replacement: replacement.to_string(),
            occurrences,
        });
        Ok(occurrences)
    }
}

#[async_trait]
impl FileService for MemoryDocumentService {
    async fn copy_file(&self, file_id: &str, new_name: &str) -> RemoteResult<String> {
        let mut state = self.state();
        state.take_write_failure("files.copy")?;
        let mut copy = state
            .documents
            .get(file_id)
            .cloned()
            .ok_or_else(|| not_found("files.copy", file_id))?;
        copy.title = new_name.to_string();
        let id = state.allocate_id();
        state.documents.insert(id.clone(), copy);
        state.calls.push(RecordedCall::CopyFile {
            file_id: file_id.to_string(),
            new_name: new_name.to_string(),
        });
        Ok(id)
    }

    async fn create_permission(&self, file_id: &str, permission: &Permission) -> RemoteResult<()> {
        let mut state = self.state();
        state.take_write_failure("permissions.create")?;
        if !state.documents.contains_key(file_id) {
            return Err(not_found("permissions.create", file_id));
        }
        state
            .permissions
            .push((file_id.to_string(), permission.clone()));
        state.calls.push(RecordedCall::CreatePermission {
            file_id: file_id.to_string(),
            permission: permission.clone(),
        });
        Ok(())
    }
}

fn not_found(operation: &str, id: &str) -> RemoteError {
    RemoteError::new(
        RemoteErrorKind::NotFound,
        operation,
        format!("no document with id {}", id),
    )
}

fn invalid(operation: &str, message: impl Into<String>) -> RemoteError {
    RemoteError::new(RemoteErrorKind::InvalidRequest, operation, message)
}

/// Position in `units` for an insertion at `index`.
fn insertion_offset(units: &[Unit], index: usize, kind: &str) -> RemoteResult<usize> {
    if index < 1 || index > units.len() {
        return Err(invalid(
            kind,
            format!("index {} outside 1..={}", index, units.len()),
        ));
    }
    Ok(index - 1)
}

fn check_range(units: &[Unit], range: &IndexRange, kind: &str) -> RemoteResult<()> {
    if range.start_index < 1 || range.is_empty() || range.end_index > units.len() + 1 {
        return Err(invalid(
            kind,
            format!(
                "range {}..{} invalid for document of length {}",
                range.start_index,
                range.end_index,
                units.len()
            ),
        ));
    }
    Ok(())
}

/// Apply one request. Returns `Some(())` when the request created an
/// inline object.
fn apply_request(units: &mut Vec<Unit>, request: &Request) -> RemoteResult<Option<()>> {
    let kind = request.kind();
    match request {
        Request::InsertText { index, text } => {
            let at = insertion_offset(units, *index, kind)?;
            units.splice(at..at, text.encode_utf16().map(Unit::Char));
        }
        Request::InsertTable {
            index,
            rows,
            columns,
        } => {
            if *rows == 0 || *columns == 0 {
                return Err(invalid(kind, "tables need at least one row and column"));
            }
            let at = insertion_offset(units, *index, kind)?;
            let mut table = vec![Unit::Char(NEWLINE), Unit::TableStart];
            for _ in 0..*rows {
                table.push(Unit::RowStart);
                for _ in 0..*columns {
                    table.push(Unit::CellStart);
                    table.push(Unit::Char(NEWLINE));
                }
            }
            table.push(Unit::TableEnd);
            units.splice(at..at, table);
        }
        Request::UpdateParagraphStyle { range, .. }
        | Request::CreateParagraphBullets { range, .. }
        | Request::UpdateTextStyle { range, .. } => check_range(units, range, kind)?,
        Request::InsertInlineImage {
            index,
            uri,
            width,
            height,
        } => {
            let at = insertion_offset(units, *index, kind)?;
            units.insert(
                at,
                Unit::Image {
                    uri: uri.clone(),
                    width: *width,
                    height: *height,
                },
            );
            return Ok(Some(()));
        }
        Request::DeleteContentRange { range } => {
            check_range(units, range, kind)?;
            if range.end_index > units.len() {
                return Err(invalid(kind, "cannot delete the final newline"));
            }
            units.drain(range.start_index - 1..range.end_index - 1);
        }
    }
    Ok(None)
}

fn fold_case(unit: u16) -> u16 {
    if (u16::from(b'A')..=u16::from(b'Z')).contains(&unit) {
        unit + 32
    } else {
        unit
    }
}

fn replace_units(
    units: &[Unit],
    search: &str,
    replacement: &str,
    match_case: bool,
) -> (Vec<Unit>, u32) {
    let needle: Vec<u16> = search.encode_utf16().collect();
    if needle.is_empty() {
        return (units.to_vec(), 0);
    }
    let matches_at = |i: usize| {
        units.len() >= i + needle.len()
            && needle.iter().enumerate().all(|(k, n)| match &units[i + k] {
                Unit::Char(c) if match_case => c == n,
                Unit::Char(c) => fold_case(*c) == fold_case(*n),
                _ => false,
            })
    };

    let mut out = Vec::with_capacity(units.len());
    let mut occurrences = 0;
    let mut i = 0;
    while i < units.len() {
        if matches_at(i) {
            out.extend(replacement.encode_utf16().map(Unit::Char));
            occurrences += 1;
            i += needle.len();
        } else {
            out.push(units[i].clone());
            i += 1;
        }
    }
    (out, occurrences)
}

fn build_document(document_id: &str, doc: &StoredDocument) -> Document {
    let mut pos = 0;
    let mut body = Vec::new();
    while pos < doc.units.len() {
        body.push(build_block(&doc.units, &mut pos));
    }
    Document {
        document_id: document_id.to_string(),
        title: doc.title.clone(),
        body,
    }
}

fn build_block(units: &[Unit], pos: &mut usize) -> Block {
    match units[*pos] {
        Unit::TableStart => Block::Table(build_table(units, pos)),
        _ => Block::Paragraph(build_paragraph(units, pos)),
    }
}

fn build_paragraph(units: &[Unit], pos: &mut usize) -> Paragraph {
    let start_index = *pos + 1;
    let mut elements = Vec::new();
    let mut run: Option<(usize, Vec<u16>)> = None;

    while *pos < units.len() {
        match &units[*pos] {
            Unit::Char(c) => {
                run.get_or_insert_with(|| (*pos + 1, Vec::new())).1.push(*c);
                *pos += 1;
                if *c == NEWLINE {
                    break;
                }
            }
            Unit::Image { uri, width, height } => {
                if let Some((start, text)) = run.take() {
                    elements.push(text_run(start, &text));
                }
                elements.push(InlineElement::Image(InlineImage {
                    start_index: *pos + 1,
                    uri: uri.clone(),
                    width: *width,
                    height: *height,
                }));
                *pos += 1;
            }
            _ => {
                // A structural marker with no text before it; step over it.
                if *pos + 1 == start_index {
                    *pos += 1;
                }
                break;
            }
        }
    }
    if let Some((start, text)) = run.take() {
        elements.push(text_run(start, &text));
    }

    Paragraph {
        start_index,
        end_index: *pos + 1,
        elements,
    }
}

fn text_run(start_index: usize, text: &[u16]) -> InlineElement {
    InlineElement::Text(TextRun {
        start_index,
        content: String::from_utf16_lossy(text),
    })
}

fn build_table(units: &[Unit], pos: &mut usize) -> Table {
    let start_index = *pos + 1;
    *pos += 1;
    let mut rows = Vec::new();

    while units.get(*pos) == Some(&Unit::RowStart) {
        let row_start = *pos + 1;
        *pos += 1;
        let mut cells = Vec::new();
        while units.get(*pos) == Some(&Unit::CellStart) {
            let cell_start = *pos + 1;
            *pos += 1;
            let mut content = Vec::new();
            while *pos < units.len()
                && !matches!(
                    units[*pos],
                    Unit::CellStart | Unit::RowStart | Unit::TableEnd
                )
            {
                content.push(build_block(units, pos));
            }
            cells.push(TableCell {
                start_index: cell_start,
                end_index: *pos + 1,
                content,
            });
        }
        rows.push(TableRow {
            start_index: row_start,
            cells,
        });
    }

    if units.get(*pos) == Some(&Unit::TableEnd) {
        *pos += 1;
    }
    Table {
        start_index,
        end_index: *pos + 1,
        rows,
    }
}
