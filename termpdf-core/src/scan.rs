use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::debug;

const PDF_EXTENSION: &str = "pdf";

pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(PDF_EXTENSION))
        .unwrap_or(false)
}

/// Regular files in `dir` with a `.pdf` extension (any case), sorted by path.
pub fn scan_pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory {:?}", dir))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list directory {:?}", dir))?;
        let path = entry.path();
        if is_pdf_path(&path) && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    debug!(dir = %dir.display(), count = files.len(), "scanned for PDF files");
    Ok(files)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Cancel,
    /// Zero-based index into the scanned list.
    File(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSelectionInput {
    #[error("Invalid input. Please enter a valid number.")]
    NotANumber { input: String },
    #[error("Invalid choice: {choice} is not between 1 and {available}.")]
    OutOfRange { choice: i64, available: usize },
}

/// Parses a 1-based file number, or `q` to cancel.
pub fn parse_selection(input: &str, available: usize) -> Result<Selection, InvalidSelectionInput> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return Ok(Selection::Cancel);
    }

    let choice: i64 = input
        .parse()
        .map_err(|_| InvalidSelectionInput::NotANumber {
            input: input.to_owned(),
        })?;
    match usize::try_from(choice) {
        Ok(number) if (1..=available).contains(&number) => Ok(Selection::File(number - 1)),
        _ => Err(InvalidSelectionInput::OutOfRange { choice, available }),
    }
}
