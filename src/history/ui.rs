//! Interactive terminal UI for browsing journal history.
//!
//! Lists past entries with their title, sentiment and follow-up. Selecting an
//! entry copies its full transcription to the clipboard.

use crate::history::JournalEntry;
use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, HighlightSpacing, List, ListItem, ListState, Padding, Paragraph},
};
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crate::ui::format_time;

const BG: Color = Color::Rgb(0, 0, 0);
const FG: Color = Color::Rgb(255, 255, 255);
const DIM_FG: Color = Color::Rgb(100, 100, 100);
const RESPONSE_FG: Color = Color::Rgb(170, 170, 200);
const HIGHLIGHT_BG: Color = Color::Rgb(20, 20, 20);

const NOTIFICATION_TIME: Duration = Duration::from_millis(500);

/// Interactive history viewer for journal entries.
pub struct HistoryViewer {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    entries: Vec<JournalEntry>,
    list_state: ListState,
    notification: Option<(String, Instant)>,
}

/// Actions that can result from user input.
enum InputAction {
    Exit,
    Select(String),
}

impl HistoryViewer {
    pub fn new(entries: Vec<JournalEntry>) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        let mut list_state = ListState::default();
        if !entries.is_empty() {
            list_state.select(Some(0));
        }

        Ok(Self {
            terminal,
            entries,
            list_state,
            notification: None,
        })
    }

    /// Runs the viewer until the user exits or selects an entry.
    ///
    /// Returns the transcription of the selected entry, if any.
    pub fn run(&mut self) -> Result<Option<String>> {
        tracing::debug!("History viewer started with {} entries", self.entries.len());
        let mut selected_text: Option<String> = None;

        loop {
            self.draw()?;

            if let Some((_, shown_at)) = self.notification {
                if shown_at.elapsed() >= NOTIFICATION_TIME {
                    self.notification = None;
                    if selected_text.is_some() {
                        break;
                    }
                }
            }

            if event::poll(Duration::from_millis(50))? {
                let action = match event::read()? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => None,
                };
                match action {
                    Some(InputAction::Exit) => break,
                    Some(InputAction::Select(text)) => {
                        selected_text = Some(text);
                        self.notification =
                            Some(("Copied to clipboard!".to_string(), Instant::now()));
                    }
                    None => {}
                }
            }
        }

        self.cleanup()?;
        Ok(selected_text)
    }

    fn selected_transcription(&self) -> Option<InputAction> {
        let index = self.list_state.selected()?;
        let entry = self.entries.get(index)?;
        tracing::debug!("Journal entry {} selected", entry.id);
        Some(InputAction::Select(entry.transcription.clone()))
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<InputAction> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(InputAction::Exit),
            KeyCode::Up | KeyCode::Char('k') => {
                self.list_state.select_previous();
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.list_state.select_next();
                None
            }
            KeyCode::Enter => self.selected_transcription(),
            _ => None,
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> Option<InputAction> {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.list_state.select_previous(),
            MouseEventKind::ScrollDown => self.list_state.select_next(),
            MouseEventKind::Down(MouseButton::Left) => return self.selected_transcription(),
            _ => {}
        }
        None
    }

    fn draw(&mut self) -> Result<()> {
        let notification = self.notification.clone();
        let items: Vec<ListItem> = self.entries.iter().map(entry_item).collect();

        self.terminal.draw(|frame| {
            let area = frame.area();

            let padding_block = Block::default()
                .padding(Padding::uniform(1))
                .style(Style::default().fg(FG).bg(BG));
            frame.render_widget(&padding_block, area);
            let inner_area = padding_block.inner(area);

            let [list_area, footer_area] =
                Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(inner_area);

            let list = List::new(items)
                .block(
                    Block::default()
                        .title(" Journal ")
                        .borders(Borders::ALL)
                        .padding(Padding::bottom(1)),
                )
                .highlight_style(Style::default().bg(HIGHLIGHT_BG))
                .highlight_symbol("> ")
                .highlight_spacing(HighlightSpacing::Always);
            frame.render_stateful_widget(list, list_area, &mut self.list_state);

            let help = Paragraph::new("↑↓ select, ↵ copy transcription, esc/q exit")
                .alignment(Alignment::Center)
                .style(Style::default().fg(DIM_FG));
            frame.render_widget(help, footer_area);

            if let Some((message, _)) = notification {
                render_notification(frame, area, &message);
            }
        })?;

        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for HistoryViewer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Three lines per entry: metadata, title, follow-up.
fn entry_item(entry: &JournalEntry) -> ListItem<'static> {
    let meta = format!(
        "{}  {}  {} ({:+.2})",
        entry.created_at.format("%Y-%m-%d %H:%M"),
        format_time(entry.duration_secs),
        entry.sentiment_label,
        entry.sentiment_score
    );
    let mut lines = vec![
        Line::styled(meta, Style::default().fg(DIM_FG)),
        Line::styled(entry.title.clone(), Style::default().fg(FG).bold()),
    ];
    if entry.response != entry.title {
        lines.push(Line::styled(
            entry.response.clone(),
            Style::default().fg(RESPONSE_FG).italic(),
        ));
    }
    ListItem::new(lines)
}

fn render_notification(frame: &mut Frame, screen_area: Rect, message: &str) {
    let width = (message.len() as u16)
        .saturating_add(4)
        .min(screen_area.width);
    let height = 3;
    let modal_area = Rect {
        x: screen_area.x + screen_area.width.saturating_sub(width) / 2,
        y: screen_area.y + screen_area.height.saturating_sub(height) / 2,
        width,
        height,
    };

    let style = Style::default().bg(Color::Green).fg(Color::Black);
    let block = Block::default().borders(Borders::ALL).style(style);
    frame.render_widget(&block, modal_area);

    let text = Paragraph::new(message)
        .style(style)
        .alignment(Alignment::Center);
    frame.render_widget(text, block.inner(modal_area));
}
