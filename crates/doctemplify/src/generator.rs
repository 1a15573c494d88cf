/*
 * generator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! End-to-end workflows: building templates and generating documents.

use crate::assembler::{AssemblyReport, DocumentAssembler};
use crate::config::EngineConfig;
use crate::data::DataTree;
use crate::description::TemplateDescription;
use crate::error::Result;
use crate::service::{DocumentService, FileService, Permission};
use crate::substitution::{SubstitutionEngine, SubstitutionReport};

/// A template document built from a description.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedTemplate {
    pub document_id: String,
    pub url: String,
    pub assembly: AssemblyReport,
}

/// A document generated from a template.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDocument {
    pub document_id: String,
    pub substitution: SubstitutionReport,
}

pub struct DocumentGenerator<'a> {
    documents: &'a dyn DocumentService,
    files: &'a dyn FileService,
    assembler: DocumentAssembler,
    engine: SubstitutionEngine,
}

impl<'a> DocumentGenerator<'a> {
    pub fn new(
        documents: &'a dyn DocumentService,
        files: &'a dyn FileService,
        config: EngineConfig,
    ) -> Self {
        Self {
            documents,
            files,
            assembler: DocumentAssembler::new(config.clone()),
            engine: SubstitutionEngine::new(config),
        }
    }

    /// Create a document titled `title`, optionally share it publicly, and
    /// fill it from `description`.
    pub async fn create_template(
        &self,
        description: &TemplateDescription,
        title: &str,
        public: bool,
    ) -> Result<CreatedTemplate> {
        let created = self.documents.create_document(title).await?;
        tracing::info!(document = %created.document_id, title = %title, "Created document");
        if public {
            self.make_public(&created.document_id).await?;
        }

        let assembly = self
            .assembler
            .assemble(self.documents, &created.document_id, description)
            .await?;
        Ok(CreatedTemplate {
            document_id: created.document_id,
            url: created.url,
            assembly,
        })
    }

    /// Copy a template, fill the copy from `data`, and share it publicly.
    pub async fn generate(
        &self,
        template_id: &str,
        data: &DataTree,
        new_name: &str,
    ) -> Result<GeneratedDocument> {
        let document_id = self.files.copy_file(template_id, new_name).await?;
        tracing::info!(template = %template_id, document = %document_id, "Copied template");

        let substitution = self
            .engine
            .substitute(self.documents, &document_id, data)
            .await?;
        self.make_public(&document_id).await?;

        Ok(GeneratedDocument {
            document_id,
            substitution,
        })
    }

    /// Let anyone with the link edit the document.
    pub async fn make_public(&self, document_id: &str) -> Result<()> {
        self.files
            .create_permission(document_id, &Permission::public_writer())
            .await?;
        tracing::debug!(document = %document_id, "Granted public write access");
        Ok(())
    }
}
