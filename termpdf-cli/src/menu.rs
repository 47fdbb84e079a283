use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use termpdf_core::{parse_selection, scan_pdf_files, Selection};
use tracing::{debug, info, warn};

use crate::viewer::ViewOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Scan,
    View,
    Quit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Scan),
            "2" => Some(Self::View),
            "3" | "q" | "Q" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Line-oriented main menu. End of input behaves like choosing Quit.
pub struct Menu<R, W> {
    input: R,
    output: W,
    dir: PathBuf,
}

impl<R: BufRead, W: Write> Menu<R, W> {
    pub fn new(input: R, output: W, dir: PathBuf) -> Self {
        Self { input, output, dir }
    }

    pub fn run<V>(&mut self, mut view: V) -> Result<()>
    where
        V: FnMut(&Path) -> Result<ViewOutcome>,
    {
        writeln!(
            self.output,
            "TermPDF Viewer - view and navigate PDF files within the terminal."
        )?;
        writeln!(self.output, "Welcome to the TermPDF Viewer!")?;

        loop {
            self.print_menu()?;
            let Some(line) = self.read_line()? else {
                debug!("input closed at main menu");
                break;
            };
            match MenuChoice::parse(&line) {
                Some(MenuChoice::Scan) => {
                    self.list_files()?;
                }
                Some(MenuChoice::View) => {
                    if !self.choose_and_view(&mut view)? {
                        break;
                    }
                }
                Some(MenuChoice::Quit) => break,
                None => writeln!(self.output, "Invalid choice. Please enter a valid number.")?,
            }
        }

        writeln!(self.output, "Goodbye!")?;
        self.output.flush()?;
        Ok(())
    }

    fn print_menu(&mut self) -> Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "Main Menu:")?;
        writeln!(self.output, "1. Scan for PDF files")?;
        writeln!(self.output, "2. View scanned PDF files")?;
        writeln!(self.output, "3. Quit")?;
        write!(self.output, "Choose an option: ")?;
        self.output.flush()?;
        Ok(())
    }

    /// Returns `false` when input ran out at the selection prompt.
    fn choose_and_view<V>(&mut self, view: &mut V) -> Result<bool>
    where
        V: FnMut(&Path) -> Result<ViewOutcome>,
    {
        let files = self.list_files()?;
        if files.is_empty() {
            return Ok(true);
        }

        write!(
            self.output,
            "Enter the number of the PDF file to view (or 'q' to go back): "
        )?;
        self.output.flush()?;
        let Some(answer) = self.read_line()? else {
            return Ok(false);
        };

        match parse_selection(&answer, files.len()) {
            Ok(Selection::Cancel) => {}
            Ok(Selection::File(index)) => {
                let path = &files[index];
                info!(path = %path.display(), "viewing document");
                match view(path)? {
                    ViewOutcome::Closed => {}
                    ViewOutcome::NotOpened(err) => {
                        writeln!(self.output, "Could not open document: {err}")?
                    }
                    ViewOutcome::Aborted(err) => {
                        writeln!(self.output, "Stopped viewing document: {err}")?
                    }
                }
            }
            Err(err) => {
                debug!(%err, "rejected file selection");
                writeln!(self.output, "{err}")?;
            }
        }
        Ok(true)
    }

    fn list_files(&mut self) -> Result<Vec<PathBuf>> {
        let files = match scan_pdf_files(&self.dir) {
            Ok(files) => files,
            Err(err) => {
                warn!(?err, "scan failed");
                writeln!(self.output, "Could not scan {}: {err:#}", self.dir.display())?;
                return Ok(Vec::new());
            }
        };

        if files.is_empty() {
            if self.dir == Path::new(".") {
                writeln!(self.output, "No PDF files found in the current directory.")?;
            } else {
                writeln!(self.output, "No PDF files found in {}.", self.dir.display())?;
            }
            return Ok(files);
        }

        writeln!(self.output, "Scanned PDF files:")?;
        for (number, path) in files.iter().enumerate() {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy())
                .unwrap_or_else(|| path.to_string_lossy());
            writeln!(self.output, "{}. {}", number + 1, name)?;
        }
        Ok(files)
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}
