use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use crossterm::cursor;
use crossterm::event::{self, Event};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use termpdf_core::{DocumentInfo, DocumentOpenError, DocumentProvider, RenderError, Session};
use termpdf_tty::{map_event, PageFrame, ScreenRenderer, UiEvent, Viewport};
use tracing::{error, warn};

/// Raw mode plus the alternate screen for as long as a document is shown.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let guard = Self;
        crossterm::execute!(io::stdout(), EnterAlternateScreen, cursor::Hide)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

#[derive(Debug)]
pub enum ViewOutcome {
    Closed,
    NotOpened(DocumentOpenError),
    Aborted(RenderError),
}

/// Opens `path` and pages through it full-screen until the user quits.
///
/// Document problems come back as a [`ViewOutcome`]; only terminal failures
/// are errors.
pub fn view_document(provider: &dyn DocumentProvider, path: &Path) -> Result<ViewOutcome> {
    let session = match Session::open(provider, path) {
        Ok(session) => session,
        Err(err) => {
            warn!(path = %err.path().display(), %err, "could not open document");
            return Ok(ViewOutcome::NotOpened(err));
        }
    };

    let _terminal = TerminalGuard::enter().context("failed to enter full-screen mode")?;
    let mut renderer = ScreenRenderer::new(io::stdout());
    run_session(session, &mut renderer, event::read, Viewport::current)
}

/// Draw, block for one event, dispatch; repeat until `q`.
pub fn run_session<W, E, V>(
    mut session: Session,
    renderer: &mut ScreenRenderer<W>,
    mut next_event: E,
    mut viewport: V,
) -> Result<ViewOutcome>
where
    W: Write,
    E: FnMut() -> io::Result<Event>,
    V: FnMut() -> Result<Viewport>,
{
    let status = status_line(session.info());

    loop {
        let lines = match session.render() {
            Ok(lines) => lines,
            Err(err) => {
                error!(%err, "aborting viewing session");
                return Ok(ViewOutcome::Aborted(err));
            }
        };
        let frame = PageFrame {
            current_page: session.current_page(),
            total_pages: session.total_pages(),
            lines: &lines,
            status: Some(&status),
        };
        renderer.draw_page(&frame, viewport()?)?;

        match map_event(&next_event()?) {
            UiEvent::Command(command) => {
                session.apply(command);
            }
            UiEvent::Quit => break,
            UiEvent::None => {}
        }
    }

    session.quit();
    Ok(ViewOutcome::Closed)
}

fn status_line(info: &DocumentInfo) -> String {
    let mut status = info.file_name();
    if let Some(title) = &info.metadata.title {
        status.push_str(&format!(" ({title})"));
    }
    status.push_str(" | Left/Right: turn page | q: back to menu");
    status
}
