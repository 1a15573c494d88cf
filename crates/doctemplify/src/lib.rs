/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Build remote rich-text documents from templates and fill their
//! placeholders with data.
//!
//! The crate has two halves that share a remote document through the
//! [`DocumentService`] collaborator:
//!
//! - **Assembly**: [`DocumentAssembler`] walks an ordered
//!   [`TemplateDescription`] (headings, text, lists, tables, image
//!   placeholders) and inserts each element at a tracked cursor.
//! - **Substitution**: [`SubstitutionEngine`] finds `{{ name:style }}`
//!   placeholders in a document, checks all of them against a
//!   [`DataTree`], and only then replaces them, styling values and
//!   swapping image placeholders for inline images.
//!
//! Every call to the remote service is awaited before the next one is
//! issued; the document's index space shifts after each mutation, so
//! there is no pipelining. Sessions on different documents are
//! independent. Callers must not run two sessions on one document at once.
//!
//! # Example
//!
//! ```ignore
//! use doctemplify::{DataTree, MemoryDocumentService, SubstitutionEngine};
//!
//! let service = MemoryDocumentService::new();
//! let id = service.insert_document("Letter", "Dear {{customer.name:font-weight:bold}},");
//! let data = DataTree::from_json_str(r#"{"customer": {"name": "Ann"}}"#)?;
//!
//! let report = pollster::block_on(SubstitutionEngine::default().substitute(&service, &id, &data))?;
//! assert_eq!(service.text(&id).unwrap(), "Dear Ann,\n");
//! ```

pub mod assembler;
pub mod config;
pub mod data;
pub mod description;
pub mod document;
pub mod error;
pub mod generator;
pub mod memory;
pub mod parser;
pub mod position;
pub mod request;
pub mod service;
pub mod session;
pub mod style;
pub mod substitution;

pub use assembler::{AssemblyReport, DocumentAssembler};
pub use config::EngineConfig;
pub use data::DataTree;
pub use description::{TemplateDescription, TemplateElement};
pub use document::{Block, Document, IndexRange};
pub use error::{DoctemplifyError, Result, SubstitutionWarning};
pub use generator::{CreatedTemplate, DocumentGenerator, GeneratedDocument};
pub use memory::{MemoryDocumentService, RecordedCall};
pub use parser::{Placeholder, TemplateParser};
pub use position::PositionTracker;
pub use request::{NamedStyle, Reply, Request};
pub use service::{
    CreatedDocument, DocumentService, FileService, Permission, RemoteError, RemoteErrorKind,
};
pub use session::EditSession;
pub use style::{CompiledStyle, RgbColor, StyleCompiler, StyleDescriptor};
pub use substitution::{SubstitutionEngine, SubstitutionReport, SubstitutionState};
