use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use regex::Regex;
use time::{macros::format_description, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, EditorState, FileAction, FocusPane, OverlayState};
use crate::highlight::{build_highlight_regex, match_ranges};

// title line and blank line above the body in the reader pane
const READER_BODY_OFFSET: u16 = 2;

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(vertical[0]);

    let highlight_regex = state
        .search
        .highlight
        .as_deref()
        .filter(|_| state.highlight_enabled)
        .and_then(build_highlight_regex);
    let highlight_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    render_note_list(frame, state, list_state, columns[0], highlight_regex.as_ref(), highlight_style);
    render_reader(frame, state, columns[1], highlight_regex.as_ref(), highlight_style);

    let results = Paragraph::new(build_results_line(state));
    frame.render_widget(results, vertical[1]);

    let status = build_status_line(state);
    let status_paragraph = Paragraph::new(status).style(Style::default().fg(Color::Gray));
    frame.render_widget(status_paragraph, vertical[2]);

    render_overlay(frame, state);
}

fn render_note_list(
    frame: &mut Frame,
    state: &AppState,
    list_state: &mut ListState,
    area: Rect,
    highlight_regex: Option<&Regex>,
    highlight_style: Style,
) {
    let border_style = if matches!(state.focus, FocusPane::List) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let mut items = Vec::with_capacity(state.len());
    for (index, title) in state.store().titles().enumerate() {
        let mut spans = Vec::new();
        if index == state.selected && state.editor_dirty() {
            spans.push(Span::styled(
                "✎* ",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        spans.extend(highlight_line(
            title,
            highlight_regex,
            highlight_style,
            Style::default(),
        ));
        items.push(ListItem::new(Line::from(spans)));
    }
    if items.is_empty() {
        items.push(ListItem::new("No notes yet. Press `a` to create one."));
    }

    let list = List::new(items)
        .block(
            Block::default()
                .title(format!("Notes ({})", state.len()))
                .borders(Borders::ALL)
                .border_style(border_style),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, area, list_state);
}

fn render_reader(
    frame: &mut Frame,
    state: &AppState,
    area: Rect,
    highlight_regex: Option<&Regex>,
    highlight_style: Style,
) {
    let border_style = if matches!(state.focus, FocusPane::Reader) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let text: Text = state
        .editor()
        .map(|editor| {
            let mut lines = Vec::new();
            let mut header = Vec::new();
            if state.is_editing() {
                let label = if editor.is_dirty() { "[EDIT*] " } else { "[EDIT] " };
                header.push(Span::styled(
                    label,
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ));
            }
            header.extend(highlight_line(
                editor.title(),
                highlight_regex,
                highlight_style,
                Style::default().add_modifier(Modifier::BOLD),
            ));
            lines.push(Line::from(header));
            lines.push(Line::from(""));
            lines.extend(highlight_body(editor.buffer(), highlight_regex, highlight_style));
            Text::from(lines)
        })
        .unwrap_or_else(|| Text::from("Select a note to see its contents."));

    let mut reader = Paragraph::new(text).block(
        Block::default()
            .title("Note")
            .borders(Borders::ALL)
            .border_style(border_style),
    );
    if state.wrap_enabled {
        reader = reader.wrap(Wrap { trim: false });
    }
    frame.render_widget(Clear, area);
    frame.render_widget(reader, area);

    if state.is_editing() && state.overlay().is_none() {
        if let Some(editor) = state.editor() {
            if let Some((x, y)) = editor_cursor_screen_position(editor, area, state.wrap_enabled) {
                frame.set_cursor(x, y);
            }
        }
    }
}

fn build_results_line(state: &AppState) -> Line<'static> {
    let label_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    if state.is_search_active() {
        return Line::from(vec![
            Span::styled("Search /", label_style),
            Span::styled(
                state.search_input().to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled("▌", Style::default().fg(Color::Cyan)),
        ]);
    }
    if state.is_search_pending() {
        return Line::from(vec![
            Span::styled("Results: ", label_style),
            Span::styled("searching…", Style::default().fg(Color::DarkGray)),
        ]);
    }
    match state.search_summary() {
        Some(summary) => Line::from(vec![
            Span::styled("Results: ", label_style),
            Span::raw(summary.to_string()),
        ]),
        None => Line::from(Span::styled(
            "Results: press / to search",
            Style::default().fg(Color::DarkGray),
        )),
    }
}

fn build_status_line(state: &AppState) -> Text<'static> {
    let total = state.len();
    let position = if state.is_empty() {
        "0/0".to_string()
    } else {
        format!("{}/{}", state.selected + 1, total)
    };
    let file = state
        .current_file()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(unsaved)".to_string());

    let mut spans = vec![
        Span::raw("File: "),
        Span::styled(file, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | Selected: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
    ];

    if state.has_unsaved_changes() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            "modified",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    } else if let Some(saved_at) = state.last_saved_at() {
        spans.push(Span::raw(" | Saved "));
        spans.push(Span::styled(
            format_time_short(saved_at),
            Style::default().fg(Color::Gray),
        ));
    }

    spans.push(Span::raw(" | Wrap: "));
    spans.push(Span::styled(
        if state.wrap_enabled { "on" } else { "off" },
        Style::default().fg(Color::Gray),
    ));

    if let Some(message) = &state.status_message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Cyan),
        ));
    }

    let keys = if state.is_editing() {
        "Editing: type to change • arrows/Home/End move • Ctrl-s save • Esc back to list"
    } else {
        "j/k move • e edit • a add • r rename • d delete • / search • s save • o open • W wrap • q quit"
    };

    Text::from(vec![
        Line::from(spans),
        Line::from(Span::styled(keys, Style::default().fg(Color::DarkGray))),
    ])
}

fn format_time_short(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn highlight_line(
    text: &str,
    regex: Option<&Regex>,
    highlight_style: Style,
    base_style: Style,
) -> Vec<Span<'static>> {
    let Some(re) = regex else {
        return vec![Span::styled(text.to_string(), base_style)];
    };
    let mut spans = Vec::new();
    let mut last = 0;
    for (start, end) in match_ranges(text, re) {
        if start > last {
            spans.push(Span::styled(text[last..start].to_string(), base_style));
        }
        spans.push(Span::styled(text[start..end].to_string(), highlight_style));
        last = end;
    }
    if last < text.len() {
        spans.push(Span::styled(text[last..].to_string(), base_style));
    }
    if spans.is_empty() {
        spans.push(Span::styled(text.to_string(), base_style));
    }
    spans
}

fn highlight_body(body: &str, regex: Option<&Regex>, highlight_style: Style) -> Vec<Line<'static>> {
    if body.is_empty() {
        return vec![Line::from("")];
    }
    body.split('\n')
        .map(|line| {
            Line::from(highlight_line(
                line,
                regex,
                highlight_style,
                Style::default(),
            ))
        })
        .collect()
}

fn editor_cursor_screen_position(
    editor: &EditorState,
    area: Rect,
    wrap_enabled: bool,
) -> Option<(u16, u16)> {
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    if inner_width == 0 || inner_height == 0 {
        return None;
    }

    let mut row = READER_BODY_OFFSET;
    let mut col = 0usize;
    let width_limit = inner_width as usize;
    let buffer = editor.buffer();
    let cursor = editor.cursor().min(buffer.len());

    for grapheme in buffer[..cursor].graphemes(true) {
        if grapheme == "\n" {
            row += 1;
            col = 0;
            continue;
        }
        let glyph_width = UnicodeWidthStr::width(grapheme);
        if wrap_enabled && glyph_width > 0 && col + glyph_width > width_limit {
            row += 1;
            col = 0;
        }
        col += glyph_width;
    }

    let row = row.min(inner_height - 1);
    let col = col.min(width_limit - 1) as u16;
    Some((area.x + 1 + col, area.y + 1 + row))
}

fn render_overlay(frame: &mut Frame, state: &AppState) {
    match state.overlay() {
        Some(OverlayState::NewNote(draft)) => {
            render_prompt(frame, "New Note", "Title of the new note", &draft.title, Color::Cyan);
        }
        Some(OverlayState::RenameNote(draft)) => {
            let heading = format!("Rename '{}' to", draft.original);
            render_prompt(frame, "Rename Note", &heading, &draft.title, Color::Cyan);
        }
        Some(OverlayState::File(prompt)) => {
            let (title, heading) = match prompt.action {
                FileAction::Save => ("Save Notes", "Write every note to"),
                FileAction::Open => ("Open Notes", "Replace current notes with the file at"),
            };
            render_prompt(frame, title, heading, &prompt.path, Color::Green);
        }
        Some(OverlayState::DeleteNote(draft)) => {
            render_confirm(
                frame,
                "Confirm Delete",
                &format!("Delete '{}'? Unsaved edits to it are lost.", draft.title),
                Color::Red,
            );
        }
        Some(OverlayState::ConfirmQuit) => {
            render_confirm(
                frame,
                "Quit",
                "There are unsaved changes. Quit anyway?",
                Color::Yellow,
            );
        }
        None => {}
    }
}

fn render_prompt(frame: &mut Frame, title: &str, heading: &str, input: &str, accent: Color) {
    let area = centered_rect(60, 30, frame.size());
    frame.render_widget(Clear, area);
    let mut display = input.to_string();
    display.push('▌');
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            heading.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(display),
        Line::from(""),
        Line::from(Span::styled(
            "Enter to confirm • Esc to cancel",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .title(title.to_string())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(accent)),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_confirm(frame: &mut Frame, title: &str, question: &str, accent: Color) {
    let area = centered_rect(50, 25, frame.size());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            question.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Enter or y confirm • Esc cancel",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .title(title.to_string())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(accent)),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NoteStore;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn span_texts(spans: &[Span<'static>]) -> Vec<String> {
        spans
            .iter()
            .map(|span| span.content.clone().into_owned())
            .collect()
    }

    fn render(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).expect("terminal");
        let mut list_state = ListState::default();
        list_state.select(Some(state.selected));
        terminal
            .draw(|frame| draw_app(frame, state, &mut list_state))
            .expect("draw");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn highlight_splits_around_matches() {
        let regex = build_highlight_regex("sug").expect("regex");
        let spans = highlight_line("Sugar sugar", Some(&regex), Style::default(), Style::default());
        assert_eq!(span_texts(&spans), vec!["Sug", "ar ", "sug", "ar"]);
    }

    #[test]
    fn highlight_without_regex_is_single_span() {
        let spans = highlight_line("plain", None, Style::default(), Style::default());
        assert_eq!(span_texts(&spans), vec!["plain"]);
    }

    #[test]
    fn body_keeps_blank_lines() {
        let lines = highlight_body("a\n\nb", None, Style::default());
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn draws_titles_body_and_results() {
        let mut store = NoteStore::new();
        store.insert("Shopping", "milk and eggs");
        store.insert("Travel", "passport");
        let mut state = AppState::new(store, None);
        state.search.summary = Some("Found: Travel".to_string());

        let screen = render(&state);
        assert!(screen.contains("Shopping"));
        assert!(screen.contains("Travel"));
        assert!(screen.contains("milk and eggs"));
        assert!(screen.contains("Results: Found: Travel"));
        assert!(screen.contains("(unsaved)"));
    }

    #[test]
    fn draws_empty_store_hint() {
        let state = AppState::new(NoteStore::new(), None);
        let screen = render(&state);
        assert!(screen.contains("No notes yet"));
    }
}
