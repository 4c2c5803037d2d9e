//! Document loading.
//!
//! Loaders only fetch bytes and attach a format hint; they never interpret
//! the content.

use std::path::Path;

use async_trait::async_trait;

use resumegraph_core::{Document, DocumentFormat};

use crate::error::{PipelineError, Result};

/// Supplies raw documents by location.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, location: &str) -> Result<Document>;
}

/// Reads documents from the local filesystem.
///
/// The format hint comes from the file extension: `.json` is JSON,
/// `.md`/`.markdown` is Markdown, anything else is plain text.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsDocumentLoader;

#[async_trait]
impl DocumentLoader for FsDocumentLoader {
    async fn load(&self, location: &str) -> Result<Document> {
        let path = Path::new(location);
        let content = tokio::fs::read(path)
            .await
            .map_err(|source| PipelineError::Load {
                path: location.to_string(),
                source,
            })?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(DocumentFormat::from_extension)
            .unwrap_or_default();

        tracing::debug!(path = %location, bytes = content.len(), ?format, "Document loaded");
        Ok(Document::new(content, format).with_source(location))
    }
}
