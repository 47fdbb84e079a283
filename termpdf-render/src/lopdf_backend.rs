use std::path::Path;

use anyhow::{anyhow, Context, Result};
use lopdf::{Document, Object};
use termpdf_core::{
    ensure_readable, DocumentBackend, DocumentInfo, DocumentMetadata, DocumentOpenError,
    DocumentProvider,
};
use tracing::{debug, instrument};

/// Pure-Rust provider used when pdfium is not available.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfProvider;

impl DocumentProvider for LopdfProvider {
    #[instrument(skip(self))]
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend>, DocumentOpenError> {
        ensure_readable(path)?;
        let document = Document::load(path).map_err(|err| DocumentOpenError::Corrupt {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        // lopdf numbers pages from 1.
        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        let info = DocumentInfo {
            path: path.to_path_buf(),
            page_count: page_numbers.len(),
            metadata: DocumentMetadata {
                title: document_title(&document),
            },
        };
        debug!(pages = info.page_count, "loaded document with lopdf");

        Ok(Box::new(LopdfDocument {
            document,
            page_numbers,
            info,
        }))
    }
}

struct LopdfDocument {
    document: Document,
    page_numbers: Vec<u32>,
    info: DocumentInfo,
}

impl DocumentBackend for LopdfDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn page_text(&self, page_index: usize) -> Result<String> {
        let number = *self
            .page_numbers
            .get(page_index)
            .ok_or_else(|| anyhow!("page {} out of range", page_index))?;
        self.document
            .extract_text(&[number])
            .with_context(|| format!("failed to extract text for page {}", page_index))
    }
}

fn document_title(document: &Document) -> Option<String> {
    let info = match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    let title = match info.get(b"Title").ok()? {
        Object::String(bytes, _) => decode_text_string(bytes),
        _ => return None,
    };
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_owned())
}

/// Decodes a PDF text string: UTF-16BE when it carries a byte order mark,
/// otherwise one byte per character.
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}
