use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::App;
use crate::conversation::{Author, TurnState};

/// Convert `**bold**` markers in a response line to styled spans; an
/// unmatched marker is rendered literally.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let segments: Vec<&str> = text.split("**").collect();
    let closed = segments.len() % 2 == 1;
    let mut spans: Vec<Span<'static>> = Vec::new();

    for (i, segment) in segments.iter().enumerate() {
        let last = i == segments.len() - 1;
        if i % 2 == 1 {
            if last && !closed {
                spans.push(Span::raw(format!("**{segment}")));
            } else if !segment.is_empty() {
                spans.push(Span::styled(
                    segment.to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            }
        } else if !segment.is_empty() {
            spans.push(Span::raw(segment.to_string()));
        }
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn draw(frame: &mut Frame, app: &mut App) {
    let [title_area, chat_area, input_area, hint_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    // Title bar
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            "charla",
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" — "),
        Span::styled(
            app.controller.model().to_string(),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .centered();
    frame.render_widget(title, title_area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);
    if app.follow_bottom {
        app.scroll_to_bottom();
    }

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let store = app.controller.store();
    let chat_text = if store.turns().is_empty() {
        Text::from(Span::styled(
            "Enter your question here...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for turn in store.turns() {
            match turn.author {
                Author::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    for line in turn.text.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
                Author::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "Assistant:",
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    )));
                    match turn.state {
                        TurnState::Pending => {
                            // Animated ellipsis: cycles through ".", "..", "..."
                            let dots = ".".repeat((app.animation_frame as usize) + 1);
                            lines.push(Line::from(Span::styled(
                                format!("{}{}", turn.text, dots),
                                Style::default()
                                    .fg(Color::DarkGray)
                                    .add_modifier(Modifier::ITALIC),
                            )));
                        }
                        TurnState::Complete => {
                            for line in turn.text.lines() {
                                lines.push(parse_markdown_line(line));
                            }
                        }
                        TurnState::Failed => {
                            for line in turn.text.lines() {
                                lines.push(Line::from(Span::styled(
                                    line.to_string(),
                                    Style::default().fg(Color::Red),
                                )));
                            }
                        }
                    }
                }
            }
            lines.push(Line::default());
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    // Input box at the bottom
    let input_border = if store.is_loading() {
        Color::DarkGray
    } else {
        Color::Yellow
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border))
        .title(" Message ");

    // Horizontal scroll keeps the cursor visible in a narrow box
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
        0
    } else {
        cursor_pos - inner_width + 1
    };

    let visible_text: String = store
        .pending_input()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, input_area);

    frame.set_cursor_position((
        input_area.x + (cursor_pos - scroll_offset) as u16 + 1,
        input_area.y + 1,
    ));

    // Hint line
    let hint = if store.is_loading() {
        "Waiting for the assistant... · Esc quit"
    } else {
        "Enter send · Up/Down scroll · PgUp/PgDn page · Esc quit"
    };
    frame.render_widget(
        Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray))),
        hint_area,
    );
}
