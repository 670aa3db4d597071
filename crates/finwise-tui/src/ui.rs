use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use finwise_core::LifecycleState;

use crate::app::{App, FocusPane, InputMode, ToastKind};

const HEADLINE: &str = "Start Your Journey Towards Financial Freedom and Peace of Mind Today!";
const STEP_ONE: &str =
    "Please share with us any financial worries or inquiries you may have, whether in English or Filipino.";
const PLACEHOLDER: &str = "Describe your financial situation and objectives: debt repayment, \
unfair collection practices, saving for a big purchase, or general advice.";
const COPY_HINT: &str = "Ready to copy the AI-Powered Financial Advice? Press 'c' to copy it to your clipboard.";

pub fn render(app: &mut App, frame: &mut Frame) {
    let [header_area, intro_area, input_area, button_area, result_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(6),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(app, frame, header_area);
    render_intro(frame, intro_area);
    render_input(app, frame, input_area);
    render_button(app, frame, button_area);
    render_result(app, frame, result_area);
    render_status_bar(app, frame, status_area);

    if app.toast.is_some() {
        render_toast(app, frame);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let header = Line::from(vec![
        Span::styled(" FinWise ", Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::styled(app.endpoint_url.as_str(), Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(header), area);
}

fn render_intro(frame: &mut Frame, area: Rect) {
    let intro = Text::from(vec![
        Line::from(Span::styled(HEADLINE, Style::default().add_modifier(Modifier::BOLD))),
        Line::from(vec![
            Span::styled(" 1 ", Style::default().fg(Color::White).bg(Color::Black)),
            Span::raw(" "),
            Span::styled(STEP_ONE, Style::default().fg(Color::Gray)),
        ]),
    ]);
    frame.render_widget(Paragraph::new(intro).wrap(Wrap { trim: true }), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing {
        Color::Yellow
    } else if app.focus == FocusPane::Input {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Your situation ")
        .title_bottom(Line::from(format!(" {}/{} ", app.input_len(), app.max_chars)).right_aligned());

    // Rows are broken at exact character counts so the cursor cell can be
    // computed from the cursor index alone.
    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let inner_height = area.height.saturating_sub(2).max(1) as usize;
    let (cursor_col, cursor_row) = input_cursor_cell(app.input_cursor, inner_width);
    let offset = cursor_row.saturating_sub(inner_height - 1);

    let body = if app.input.is_empty() && !editing {
        Paragraph::new(Span::styled(PLACEHOLDER, Style::default().fg(Color::DarkGray)))
            .wrap(Wrap { trim: false })
    } else {
        let rows: Vec<Line> = wrap_input(&app.input, inner_width)
            .into_iter()
            .map(Line::from)
            .collect();
        Paragraph::new(rows).scroll((offset as u16, 0))
    };
    frame.render_widget(body.block(block), area);

    if editing {
        let x = area.x + 1 + cursor_col as u16;
        let y = area.y + 1 + (cursor_row - offset) as u16;
        frame.set_cursor_position((x, y));
    }
}

/// Split `text` into rows of at most `width` characters.
fn wrap_input(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|row| row.iter().collect())
        .collect()
}

/// Column and row of the character at `cursor` within rows from [`wrap_input`].
fn input_cursor_cell(cursor: usize, width: usize) -> (usize, usize) {
    let width = width.max(1);
    (cursor % width, cursor / width)
}

fn render_button(app: &App, frame: &mut Frame, area: Rect) {
    let (label, style) = if app.is_loading() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        (
            format!("Typing{}", dots),
            Style::default().fg(Color::White).bg(Color::DarkGray),
        )
    } else if app.can_submit() {
        (
            "Get Financial Guidance → (Enter)".to_string(),
            Style::default().fg(Color::White).bg(Color::Black).add_modifier(Modifier::BOLD),
        )
    } else {
        (
            "Get Financial Guidance →".to_string(),
            Style::default().fg(Color::DarkGray),
        )
    };

    frame.render_widget(
        Paragraph::new(Span::styled(label, style)).alignment(Alignment::Center),
        area,
    );
}

fn render_result(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, for scroll clamping
    app.result_height = area.height.saturating_sub(2);
    app.result_width = area.width.saturating_sub(2);

    let focused = app.focus == FocusPane::Result;
    let border_color = match (&app.lifecycle, focused) {
        (LifecycleState::Failed(_), _) => Color::Red,
        (_, true) => Color::Cyan,
        _ => Color::DarkGray,
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    if app.result_text.is_empty() {
        let hint = match &app.lifecycle {
            LifecycleState::Failed(failure) => Span::styled(failure.user_message(), Style::default().fg(Color::Red)),
            state if state.is_in_flight() => Span::styled("Waiting for guidance...", Style::default().fg(Color::DarkGray)),
            _ => Span::styled("Your guidance will appear here.", Style::default().fg(Color::DarkGray)),
        };
        frame.render_widget(Paragraph::new(hint).block(block), area);
        return;
    }

    block = block.title(Span::styled(
        " Financial Guidance ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ));

    let mut lines: Vec<Line> = app
        .result_text
        .split('\n')
        .map(|line| Line::from(line.to_string()))
        .collect();
    lines.push(Line::default());
    lines.push(Line::from(vec![
        Span::styled("Hint: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(COPY_HINT, Style::default().fg(Color::Gray)),
    ]));

    let result = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.result_scroll, 0));
    frame.render_widget(result, area);
}

fn render_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let keys = match app.input_mode {
        InputMode::Editing => "Enter submit  Esc stop editing  Ctrl+C quit",
        InputMode::Normal => "i edit  Tab switch pane  j/k scroll  c copy  q quit",
    };
    let status = Line::from(vec![
        Span::styled(format!(" {} ", app.lifecycle.label()), Style::default().fg(Color::Black).bg(Color::Gray)),
        Span::raw(" "),
        Span::styled(keys, Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(status), area);
}

fn render_toast(app: &App, frame: &mut Frame) {
    let Some(toast) = &app.toast else {
        return;
    };
    let area = frame.area();
    let width = (toast.message.chars().count() as u16 + 4).min(area.width);
    let height = 3.min(area.height);
    let toast_area = Rect {
        x: area.x + area.width.saturating_sub(width),
        y: area.y + area.height.saturating_sub(height + 1),
        width,
        height,
    };

    let color = match toast.kind {
        ToastKind::Success => Color::Green,
        ToastKind::Error => Color::Red,
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));

    frame.render_widget(Clear, toast_area);
    frame.render_widget(Paragraph::new(toast.message.as_str()).block(block), toast_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_follows_rows_across_word_boundaries() {
        let text = "pay off card debt";
        let rows = wrap_input(text, 10);
        assert_eq!(rows, vec!["pay off ca", "rd debt"]);

        let (col, row) = input_cursor_cell(text.chars().count(), 10);
        assert_eq!((col, row), (rows[1].chars().count(), 1));
    }

    #[test]
    fn test_cursor_on_row_boundary_starts_next_row() {
        assert_eq!(input_cursor_cell(10, 10), (0, 1));
        assert_eq!(input_cursor_cell(9, 10), (9, 0));
    }

    #[test]
    fn test_wrap_counts_characters_not_bytes() {
        let rows = wrap_input("₱500₱500", 4);
        assert_eq!(rows, vec!["₱500", "₱500"]);
        assert!(wrap_input("", 4).is_empty());
    }
}
