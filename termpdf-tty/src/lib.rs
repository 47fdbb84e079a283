use std::io::Write;

use anyhow::Result;
use crossterm::{
    cursor,
    event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{self, Clear, ClearType},
};
use termpdf_core::Command;
use tracing::trace;
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub columns: u16,
    pub rows: u16,
}

impl Viewport {
    pub fn clamped(columns: u16, rows: u16) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }

    pub fn current() -> Result<Self> {
        let (columns, rows) = terminal::size()?;
        Ok(Self::clamped(columns, rows))
    }
}

/// Everything drawn for one page change.
#[derive(Debug, Clone, Copy)]
pub struct PageFrame<'a> {
    pub current_page: usize,
    pub total_pages: usize,
    pub lines: &'a [String],
    pub status: Option<&'a str>,
}

/// Rows that fit the viewport, already clipped to its width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    pub rows: Vec<String>,
    pub status: Option<String>,
    pub hidden_lines: usize,
}

pub fn page_header(current_page: usize, total_pages: usize) -> String {
    format!("Page {} / {}", current_page + 1, total_pages)
}

/// Truncates `line` to at most `columns` display cells. Tabs become a single
/// space and other control characters are dropped so nothing can move the
/// cursor behind the renderer's back.
pub fn clip_line(line: &str, columns: usize) -> String {
    let mut clipped = String::with_capacity(line.len().min(columns));
    let mut width = 0;
    for ch in line.chars() {
        let ch = if ch == '\t' { ' ' } else { ch };
        if ch.is_control() {
            continue;
        }
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > columns {
            break;
        }
        width += ch_width;
        clipped.push(ch);
    }
    clipped
}

/// Header on the first row, then one content line per row. The status line,
/// when given, takes the last row if the viewport has more than two rows.
pub fn layout_page(frame: &PageFrame<'_>, viewport: Viewport) -> PageLayout {
    let columns = usize::from(viewport.columns);
    let total_rows = usize::from(viewport.rows);
    let show_status = frame.status.is_some() && total_rows > 2;
    let body_rows = if show_status {
        total_rows - 1
    } else {
        total_rows
    };
    let content_rows = body_rows.saturating_sub(1);

    let mut rows = Vec::with_capacity(body_rows);
    rows.push(clip_line(
        &page_header(frame.current_page, frame.total_pages),
        columns,
    ));
    rows.extend(
        frame
            .lines
            .iter()
            .take(content_rows)
            .map(|line| clip_line(line, columns)),
    );
    let hidden_lines = frame.lines.len().saturating_sub(content_rows);

    let status = frame.status.filter(|_| show_status).map(|status| {
        let mut text = status.to_string();
        if hidden_lines > 0 {
            text.push_str(&format!(" | {hidden_lines} more lines not shown"));
        }
        clip_line(&text, columns)
    });

    PageLayout {
        rows,
        status,
        hidden_lines,
    }
}

pub struct ScreenRenderer<W: Write> {
    writer: W,
}

impl<W: Write> ScreenRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Clears the viewport and draws the page, one explicitly positioned row
    /// per line, inside a synchronized update.
    pub fn draw_page(&mut self, frame: &PageFrame<'_>, viewport: Viewport) -> Result<PageLayout> {
        let layout = layout_page(frame, viewport);
        trace!(
            page = frame.current_page,
            rows = layout.rows.len(),
            hidden = layout.hidden_lines,
            "drawing page"
        );

        self.begin_sync_update()?;
        queue!(self.writer, Clear(ClearType::All))?;
        for (row, line) in layout.rows.iter().enumerate() {
            queue!(self.writer, cursor::MoveTo(0, row as u16), Print(line))?;
        }
        if let Some(status) = &layout.status {
            queue!(
                self.writer,
                cursor::MoveTo(0, viewport.rows - 1),
                SetAttribute(Attribute::Reverse),
                Print(status),
                SetAttribute(Attribute::Reset)
            )?;
        }
        self.end_sync_update()?;
        Ok(layout)
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// Disables synchronized updates.
    /// The terminal will render all buffered changes at once.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Command(Command),
    Quit,
    None,
}

/// Right and Left turn pages, `q` or Ctrl+C quits; everything else,
/// including resize and key release events, maps to [`UiEvent::None`].
///
/// Raw mode swallows SIGINT, so Ctrl+C arrives here as a plain key.
pub fn map_event(event: &Event) -> UiEvent {
    match event {
        Event::Key(KeyEvent {
            code, modifiers, kind, ..
        }) if *kind != KeyEventKind::Release => match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => UiEvent::Quit,
            KeyCode::Right => UiEvent::Command(Command::NextPage),
            KeyCode::Left => UiEvent::Command(Command::PrevPage),
            KeyCode::Char('q') => UiEvent::Quit,
            _ => UiEvent::None,
        },
        _ => UiEvent::None,
    }
}
