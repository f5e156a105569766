//! Terminal user interface for recording a journal entry.
//!
//! Shows the orb (sized by intensity, colored by processing stage), a sparkline
//! of recent intensity, the status label or the orb's response, and a scrub bar
//! of elapsed time against the target session length.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{
        canvas::{Canvas, Circle},
        Gauge, Paragraph, Sparkline, Wrap,
    },
};
use std::io::{stdout, Stdout};
use std::time::Duration;

use super::controller::RecorderSnapshot;
use crate::journal::{OrbStage, ProcessingStage, StageAnimation};
use crate::ui::{format_time, render_error, scrub_progress};

const BG: Color = Color::Rgb(0, 0, 0);
const FG: Color = Color::Rgb(206, 224, 220);
const MUTED_FG: Color = Color::Rgb(100, 100, 100);
const RECORDING_FG: Color = Color::Rgb(255, 80, 80);

/// Orb color for each stage, blended by the animated stage value.
const STAGE_COLORS: [(u8, u8, u8); 4] = [
    (185, 207, 212),
    (255, 120, 120),
    (150, 130, 255),
    (130, 220, 160),
];

/// Intensity samples kept for the sparkline.
const HISTORY_LEN: usize = 256;

/// User input on the record screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenInput {
    /// Nothing pressed
    None,
    /// Stop recording and process the entry (Enter)
    Stop,
    /// Abandon the entry (Escape, 'q' or Ctrl+C)
    Cancel,
    /// Any other key
    Other,
}

/// Everything the record screen shows for one frame.
#[derive(Debug, Clone, Copy)]
pub struct ScreenView<'a> {
    pub snapshot: &'a RecorderSnapshot,
    pub stage: ProcessingStage,
    /// Revealed part of the orb's response
    pub response: Option<&'a str>,
    pub transcription: Option<&'a str>,
    pub error: Option<&'a str>,
    pub target_secs: f64,
}

impl ScreenView<'_> {
    fn label(&self) -> &'static str {
        if self.snapshot.is_recording() {
            "Recording..."
        } else {
            self.stage.label()
        }
    }

    fn help(&self) -> &'static str {
        if self.snapshot.is_recording() {
            "↵ stop, esc/q cancel"
        } else if self.stage == ProcessingStage::Complete {
            "press any key to exit"
        } else {
            "esc/q quit"
        }
    }
}

/// Maps a key press to a screen input.
pub fn map_key(key: KeyEvent) -> ScreenInput {
    if key.kind != KeyEventKind::Press {
        return ScreenInput::None;
    }
    match key.code {
        KeyCode::Enter => ScreenInput::Stop,
        KeyCode::Char('q') | KeyCode::Esc => ScreenInput::Cancel,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => ScreenInput::Cancel,
        _ => ScreenInput::Other,
    }
}

/// Terminal session for the record screen.
pub struct OrbTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    intensity_history: Vec<u64>,
    animation: StageAnimation,
}

impl OrbTui {
    /// Enters raw mode and the alternate screen.
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self {
            terminal,
            intensity_history: Vec::with_capacity(HISTORY_LEN),
            animation: StageAnimation::new(OrbStage::Idle),
        })
    }

    /// Records one intensity sample for the sparkline.
    pub fn push_intensity(&mut self, intensity: f32) {
        push_history(&mut self.intensity_history, intensity);
    }

    /// Draws one frame, advancing the orb's stage animation by `delta`.
    pub fn render(&mut self, view: &ScreenView<'_>, delta: Duration) -> anyhow::Result<()> {
        self.animation
            .set_stage(OrbStage::resolve(view.snapshot.is_recording(), view.stage));
        self.animation.advance(delta);

        let history = &self.intensity_history;
        let stage_value = self.animation.value();
        self.terminal
            .draw(|frame| draw_screen(frame, view, history, stage_value))?;
        Ok(())
    }

    /// Polls for a key press without waiting.
    pub fn poll_input(&self) -> anyhow::Result<ScreenInput> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                let input = map_key(key);
                if input != ScreenInput::None {
                    tracing::debug!("Record screen input: {:?}", input);
                    return Ok(input);
                }
            }
        }
        Ok(ScreenInput::None)
    }

    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for OrbTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn push_history(history: &mut Vec<u64>, intensity: f32) {
    if history.len() == HISTORY_LEN {
        history.remove(0);
    }
    history.push((intensity.clamp(0.0, 1.0) * 100.0).round() as u64);
}

/// Linear blend of the stage palette at a fractional stage value.
fn stage_color(stage_value: f32) -> Color {
    let max = (STAGE_COLORS.len() - 1) as f32;
    let value = stage_value.clamp(0.0, max);
    let lower = value.floor() as usize;
    let upper = (lower + 1).min(STAGE_COLORS.len() - 1);
    let t = value - lower as f32;

    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    let (r0, g0, b0) = STAGE_COLORS[lower];
    let (r1, g1, b1) = STAGE_COLORS[upper];
    Color::Rgb(mix(r0, r1), mix(g0, g1), mix(b0, b1))
}

/// Renders the record screen into `frame`.
pub fn draw_screen(frame: &mut Frame, view: &ScreenView<'_>, history: &[u64], stage_value: f32) {
    let area = frame.area();

    if let Some(error) = view.error {
        render_error(frame, area, error, "Press any key to exit");
        return;
    }

    frame.render_widget(
        ratatui::widgets::Block::default().style(Style::default().fg(FG).bg(BG)),
        area,
    );

    let [orb_area, text_area, spark_area, scrub_area, footer_area] = Layout::vertical([
        Constraint::Min(6),
        Constraint::Length(5),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    draw_orb(frame, orb_area, view.snapshot.intensity, stage_value);
    draw_text(frame, text_area, view);

    let visible = history.len().min(spark_area.width as usize);
    let sparkline = Sparkline::default()
        .data(&history[history.len() - visible..])
        .max(100)
        .style(Style::default().fg(stage_color(stage_value)).bg(BG));
    frame.render_widget(sparkline, spark_area);

    let elapsed = view.snapshot.elapsed_secs;
    let progress = scrub_progress(elapsed, view.target_secs);
    let gauge = Gauge::default()
        .ratio(progress)
        .label(format!(
            "{} / {}",
            format_time(elapsed),
            format_time(view.target_secs)
        ))
        .gauge_style(Style::default().fg(MUTED_FG).bg(BG));
    frame.render_widget(gauge, scrub_area);

    let indicator = if view.snapshot.is_recording() {
        Span::styled("● ", Style::default().fg(RECORDING_FG))
    } else {
        Span::raw("  ")
    };
    let footer = Paragraph::new(Line::from(vec![
        indicator,
        Span::styled(view.help(), Style::default().fg(MUTED_FG)),
    ]))
    .alignment(Alignment::Center);
    frame.render_widget(footer, footer_area);
}

fn draw_orb(frame: &mut Frame, area: Rect, intensity: f32, stage_value: f32) {
    let color = stage_color(stage_value);
    let radius = 20.0 + 25.0 * f64::from(intensity.clamp(0.0, 1.0));

    // Terminal cells are about twice as tall as wide.
    let aspect = if area.height == 0 {
        1.0
    } else {
        f64::from(area.width) / (2.0 * f64::from(area.height))
    };
    let canvas = Canvas::default()
        .background_color(BG)
        .marker(symbols::Marker::Braille)
        .x_bounds([-50.0 * aspect, 50.0 * aspect])
        .y_bounds([-50.0, 50.0])
        .paint(move |ctx| {
            ctx.draw(&Circle {
                x: 0.0,
                y: 0.0,
                radius,
                color,
            });
            ctx.draw(&Circle {
                x: 0.0,
                y: 0.0,
                radius: radius * 0.6,
                color,
            });
        });
    frame.render_widget(canvas, area);
}

fn draw_text(frame: &mut Frame, area: Rect, view: &ScreenView<'_>) {
    let mut lines = Vec::new();

    match (view.stage, view.response) {
        (ProcessingStage::Complete, Some(response)) if !view.snapshot.is_recording() => {
            lines.push(Line::styled(response.to_string(), Style::default().fg(FG).bold()));
            if let Some(transcription) = view.transcription {
                lines.push(Line::default());
                lines.push(Line::styled(
                    transcription.to_string(),
                    Style::default().fg(MUTED_FG),
                ));
            }
        }
        _ => {
            lines.push(Line::styled(view.label(), Style::default().fg(FG).bold()));
            if view.stage == ProcessingStage::Idle && !view.snapshot.is_recording() {
                lines.push(Line::styled(
                    "Press Enter when you are done speaking",
                    Style::default().fg(MUTED_FG),
                ));
            }
        }
    }

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}
