use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use pdfium_render::prelude::*;
use termpdf_core::{
    ensure_readable, DocumentBackend, DocumentInfo, DocumentMetadata, DocumentOpenError,
    DocumentProvider,
};
use tracing::{debug, instrument};

pub struct PdfiumProvider {
    pdfium: Arc<Pdfium>,
}

impl PdfiumProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pdfium: Arc::new(bind_pdfium()?),
        })
    }
}

impl DocumentProvider for PdfiumProvider {
    #[instrument(skip(self))]
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend>, DocumentOpenError> {
        ensure_readable(path)?;
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|err| DocumentOpenError::Corrupt {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        // SAFETY: the document borrows the bindings owned by `self.pdfium`. The
        // backend below keeps its own clone of that Arc, and `document` is
        // declared before `_pdfium` in `PdfiumDocument`, so it is dropped while
        // the bindings are still alive.
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };

        let title = document
            .metadata()
            .get(PdfDocumentMetadataTagType::Title)
            .map(|tag| tag.value().trim().to_owned())
            .filter(|title| !title.is_empty());
        let info = DocumentInfo {
            path: path.to_path_buf(),
            page_count: usize::try_from(document.pages().len()).unwrap_or_default(),
            metadata: DocumentMetadata { title },
        };

        Ok(Box::new(PdfiumDocument {
            document,
            info,
            _pdfium: Arc::clone(&self.pdfium),
        }))
    }
}

struct PdfiumDocument {
    document: PdfDocument<'static>,
    info: DocumentInfo,
    _pdfium: Arc<Pdfium>,
}

impl DocumentBackend for PdfiumDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn page_text(&self, page_index: usize) -> Result<String> {
        let index: PdfPageIndex = page_index
            .try_into()
            .map_err(|_| anyhow!("page {} is out of supported range", page_index))?;
        let page = self
            .document
            .pages()
            .get(index)
            .with_context(|| format!("page {} out of range", page_index))?;
        let text = page
            .text()
            .with_context(|| format!("failed to extract text for page {}", page_index))?;
        Ok(text.all())
    }

    fn close(self: Box<Self>) {
        debug!(path = %self.info.path.display(), "releasing pdfium document");
    }
}

/// Binds pdfium from the build-script staging dir, then `./`, then the
/// system library search path.
fn bind_pdfium() -> Result<Pdfium> {
    let mut candidates = Vec::new();
    if let Some(path) = option_env!("TERMPDF_PDFIUM_LIBRARY_PATH").filter(|p| !p.is_empty()) {
        candidates.push(PathBuf::from(path));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    let mut errors = Vec::new();
    for candidate in &candidates {
        match Pdfium::bind_to_library(candidate) {
            Ok(bindings) => {
                debug!(path = %candidate.display(), "bound pdfium");
                return Ok(Pdfium::new(bindings));
            }
            Err(err) => errors.push(format!("{}: {}", candidate.display(), err)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; ensure it is installed ({})",
                errors.join(", ")
            ))
        }
    }
}
