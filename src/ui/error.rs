//! Full-screen error view for human-readable error messages.

use ratatui::{prelude::*, widgets::Paragraph, widgets::Wrap};

const ERROR_BG: Color = Color::Rgb(255, 0, 0);
const ERROR_FG: Color = Color::Rgb(255, 255, 255);

/// Paints `area` red and centers `message` in white, wrapped to 80% of the width.
pub fn render_error(frame: &mut Frame, area: Rect, message: &str, hint: &str) {
    let style = Style::default().fg(ERROR_FG).bg(ERROR_BG);
    frame.buffer_mut().set_style(area, style);

    let padding_x = area.width / 10;
    let text_width = (area.width * 80) / 100;

    let lines = vec![
        Line::from(Span::styled(message.to_string(), style.bold())),
        Line::default(),
        Line::from(Span::styled(hint.to_string(), style)),
    ];
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    let centered_area = Rect {
        x: area.x + padding_x,
        y: area.y + area.height / 3,
        width: text_width,
        height: area.height - area.height / 3,
    };
    frame.render_widget(paragraph, centered_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_error_fills_screen_and_shows_message() {
        let mut terminal = Terminal::new(TestBackend::new(40, 9)).unwrap();
        terminal
            .draw(|frame| render_error(frame, frame.area(), "No recording found", "press any key"))
            .unwrap();

        let buffer = terminal.backend().buffer().clone();
        assert_eq!(buffer[(0, 0)].bg, ERROR_BG);
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("No recording found"));
        assert!(text.contains("press any key"));
    }
}
