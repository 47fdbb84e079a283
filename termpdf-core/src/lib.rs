use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

mod scan;

pub use scan::{is_pdf_path, parse_selection, scan_pdf_files, InvalidSelectionInput, Selection};

#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub page_count: usize,
    pub metadata: DocumentMetadata,
}

impl DocumentInfo {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Reasons a document could not be turned into a viewing session.
#[derive(Debug, Error)]
pub enum DocumentOpenError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not a valid PDF: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("{} has no pages to show", path.display())]
    Empty { path: PathBuf },
}

impl DocumentOpenError {
    pub fn path(&self) -> &Path {
        match self {
            DocumentOpenError::NotFound { path }
            | DocumentOpenError::Unreadable { path, .. }
            | DocumentOpenError::Corrupt { path, .. }
            | DocumentOpenError::Empty { path } => path,
        }
    }
}

/// Checks that `path` names a regular file we are allowed to read.
///
/// Providers call this before handing the path to their parser so that a
/// missing or unreadable file is reported as such instead of as corruption.
pub fn ensure_readable(path: &Path) -> Result<(), DocumentOpenError> {
    if path.is_dir() {
        return Err(DocumentOpenError::Unreadable {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Other, "is a directory"),
        });
    }
    match File::open(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(DocumentOpenError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(DocumentOpenError::Unreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid page number: index {index} is outside a {total}-page document.")]
pub struct InvalidPageIndex {
    pub index: usize,
    pub total: usize,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to extract text for page index {page}: {reason}")]
    Extract { page: usize, reason: String },
}

/// An opened document. Dropping or closing it releases the underlying handle.
pub trait DocumentBackend {
    fn info(&self) -> &DocumentInfo;

    fn page_count(&self) -> usize {
        self.info().page_count
    }

    /// Plain text of the zero-based page `page_index`.
    fn page_text(&self, page_index: usize) -> Result<String>;

    fn close(self: Box<Self>) {}
}

pub trait DocumentProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend>, DocumentOpenError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NextPage,
    PrevPage,
}

/// One viewing session: exclusive owner of the document handle plus the
/// current page, which stays in `0..total_pages` for the whole lifetime.
pub struct Session {
    backend: Box<dyn DocumentBackend>,
    total_pages: usize,
    current_page: usize,
}

impl Session {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open<P: DocumentProvider + ?Sized>(
        provider: &P,
        path: &Path,
    ) -> Result<Self, DocumentOpenError> {
        let backend = provider.open(path)?;
        let total_pages = backend.page_count();
        if total_pages == 0 {
            backend.close();
            warn!("document has no pages");
            return Err(DocumentOpenError::Empty {
                path: path.to_path_buf(),
            });
        }

        info!(total_pages, "opened document");
        Ok(Self {
            backend,
            total_pages,
            current_page: 0,
        })
    }

    pub fn info(&self) -> &DocumentInfo {
        self.backend.info()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Lines of the current page, split on line breaks.
    pub fn render(&self) -> Result<Vec<String>, RenderError> {
        if self.current_page >= self.total_pages {
            let diagnostic = InvalidPageIndex {
                index: self.current_page,
                total: self.total_pages,
            };
            warn!(%diagnostic, "refusing to render page");
            return Ok(vec![diagnostic.to_string()]);
        }

        let text = self
            .backend
            .page_text(self.current_page)
            .map_err(|err| RenderError::Extract {
                page: self.current_page,
                reason: format!("{err:#}"),
            })?;
        Ok(text.lines().map(str::to_owned).collect())
    }

    pub fn next(&mut self) -> bool {
        let next = (self.current_page + 1).min(self.total_pages.saturating_sub(1));
        self.move_to(next)
    }

    pub fn previous(&mut self) -> bool {
        let next = self.current_page.saturating_sub(1);
        self.move_to(next)
    }

    /// Applies a navigation command, returning whether the page changed.
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::NextPage => self.next(),
            Command::PrevPage => self.previous(),
        }
    }

    pub fn quit(self) {
        info!(path = %self.info().path.display(), "closing document");
        self.backend.close();
    }

    fn move_to(&mut self, page: usize) -> bool {
        if page == self.current_page {
            return false;
        }
        debug!(from = self.current_page, to = page, "page changed");
        self.current_page = page;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use anyhow::bail;

    struct FakeBackend {
        info: DocumentInfo,
        pages: Vec<String>,
        fail_extract: bool,
        releases: Rc<Cell<usize>>,
    }

    impl DocumentBackend for FakeBackend {
        fn info(&self) -> &DocumentInfo {
            &self.info
        }

        fn page_text(&self, page_index: usize) -> Result<String> {
            if self.fail_extract {
                bail!("content stream is damaged");
            }
            match self.pages.get(page_index) {
                Some(text) => Ok(text.clone()),
                None => bail!("page {} out of range", page_index),
            }
        }
    }

    impl Drop for FakeBackend {
        fn drop(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        pages: Vec<String>,
        fail_extract: bool,
        releases: Rc<Cell<usize>>,
    }

    impl FakeProvider {
        fn with_pages(count: usize) -> Self {
            Self {
                pages: (0..count).map(|i| format!("page {i}\nsecond line")).collect(),
                ..Self::default()
            }
        }
    }

    impl DocumentProvider for FakeProvider {
        fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend>, DocumentOpenError> {
            if path.extension().map(|ext| ext != "pdf").unwrap_or(true) {
                return Err(DocumentOpenError::Corrupt {
                    path: path.to_path_buf(),
                    reason: "missing header".into(),
                });
            }
            Ok(Box::new(FakeBackend {
                info: DocumentInfo {
                    path: path.to_path_buf(),
                    page_count: self.pages.len(),
                    metadata: DocumentMetadata::default(),
                },
                pages: self.pages.clone(),
                fail_extract: self.fail_extract,
                releases: Rc::clone(&self.releases),
            }))
        }
    }

    fn open(provider: &FakeProvider) -> Session {
        Session::open(provider, Path::new("/tmp/example.pdf")).unwrap()
    }

    #[test]
    fn session_starts_on_first_page() {
        let provider = FakeProvider::with_pages(4);
        let session = open(&provider);
        assert_eq!(session.current_page(), 0);
        assert_eq!(session.total_pages(), 4);
        assert_eq!(session.info().file_name(), "example.pdf");
    }

    #[test]
    fn navigation_clamps_at_both_ends() {
        let provider = FakeProvider::with_pages(3);
        let mut session = open(&provider);

        let mut seen = vec![session.current_page()];
        for command in [
            Command::NextPage,
            Command::NextPage,
            Command::NextPage,
            Command::PrevPage,
        ] {
            session.apply(command);
            seen.push(session.current_page());
        }
        assert_eq!(seen, vec![0, 1, 2, 2, 1]);
    }

    #[test]
    fn next_is_noop_on_last_page() {
        let provider = FakeProvider::with_pages(2);
        let mut session = open(&provider);
        assert!(session.next());
        assert!(!session.next());
        assert!(!session.next());
        assert_eq!(session.current_page(), 1);
    }

    #[test]
    fn previous_is_noop_on_first_page() {
        let provider = FakeProvider::with_pages(2);
        let mut session = open(&provider);
        assert!(!session.previous());
        assert_eq!(session.current_page(), 0);
    }

    #[test]
    fn single_page_document_never_moves() {
        let provider = FakeProvider::with_pages(1);
        let mut session = open(&provider);
        assert!(!session.next());
        assert!(!session.previous());
        assert_eq!(session.current_page(), 0);
    }

    #[test]
    fn every_command_sequence_stays_in_bounds() {
        const STEPS: u32 = 7;
        for total in 1..=5usize {
            let provider = FakeProvider::with_pages(total);
            for mask in 0u32..(1 << STEPS) {
                let mut session = open(&provider);
                let mut expected = 0usize;
                for step in 0..STEPS {
                    if mask & (1 << step) != 0 {
                        session.next();
                        expected = (expected + 1).min(total - 1);
                    } else {
                        session.previous();
                        expected = expected.saturating_sub(1);
                    }
                    assert!(session.current_page() < total);
                    assert_eq!(session.current_page(), expected);
                }
            }
        }
    }

    #[test]
    fn render_splits_page_text_into_lines() {
        let provider = FakeProvider::with_pages(3);
        let session = open(&provider);
        assert_eq!(session.render().unwrap(), vec!["page 0", "second line"]);
    }

    #[test]
    fn render_keeps_blank_interior_lines() {
        let provider = FakeProvider {
            pages: vec!["a\n\nb".to_string()],
            ..FakeProvider::default()
        };
        let session = open(&provider);
        assert_eq!(session.render().unwrap(), vec!["a", "", "b"]);
    }

    #[test]
    fn render_handles_crlf_line_breaks() {
        let provider = FakeProvider {
            pages: vec!["alpha\r\nbeta\r\n".to_string()],
            ..FakeProvider::default()
        };
        let session = open(&provider);
        assert_eq!(session.render().unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn render_out_of_range_page_yields_diagnostic_line() {
        let provider = FakeProvider::with_pages(2);
        let mut session = open(&provider);
        session.current_page = 7;

        let lines = session.render().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            InvalidPageIndex { index: 7, total: 2 }.to_string()
        );
        assert_eq!(session.current_page, 7);
    }

    #[test]
    fn render_reports_extraction_failure() {
        let provider = FakeProvider {
            fail_extract: true,
            ..FakeProvider::with_pages(2)
        };
        let session = open(&provider);
        match session.render() {
            Err(RenderError::Extract { page, reason }) => {
                assert_eq!(page, 0);
                assert!(reason.contains("damaged"));
            }
            other => panic!("unexpected render result: {:?}", other),
        }
    }

    #[test]
    fn zero_page_document_is_rejected_and_released() {
        let provider = FakeProvider::with_pages(0);
        let result = Session::open(&provider, Path::new("/tmp/empty.pdf"));
        assert!(matches!(result, Err(DocumentOpenError::Empty { .. })));
        assert_eq!(provider.releases.get(), 1);
    }

    #[test]
    fn provider_failure_creates_no_session() {
        let provider = FakeProvider::with_pages(3);
        let result = Session::open(&provider, Path::new("/tmp/notes.txt"));
        match result {
            Err(err @ DocumentOpenError::Corrupt { .. }) => {
                assert_eq!(err.path(), Path::new("/tmp/notes.txt"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("session should not open"),
        }
        assert_eq!(provider.releases.get(), 0);
    }

    #[test]
    fn quit_releases_document_exactly_once() {
        let provider = FakeProvider::with_pages(3);
        let mut session = open(&provider);
        session.next();
        assert_eq!(provider.releases.get(), 0);
        session.quit();
        assert_eq!(provider.releases.get(), 1);
    }

    #[test]
    fn dropping_session_releases_document() {
        let provider = FakeProvider::with_pages(3);
        {
            let _session = open(&provider);
        }
        assert_eq!(provider.releases.get(), 1);
    }

    #[test]
    fn ensure_readable_classifies_missing_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pdf");
        assert!(matches!(
            ensure_readable(&missing),
            Err(DocumentOpenError::NotFound { .. })
        ));
        assert!(matches!(
            ensure_readable(dir.path()),
            Err(DocumentOpenError::Unreadable { .. })
        ));

        let present = dir.path().join("present.pdf");
        std::fs::write(&present, b"%PDF-1.5").unwrap();
        assert!(ensure_readable(&present).is_ok());
    }
}
