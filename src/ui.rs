use crate::app::{App, Landing, Screen};
use crate::form::{FormField, TaskForm};
use crate::models::Status;
use crate::page::{LoadStatus, TaskPage, MSG_LOAD_ERROR};
use crate::weather::{LabelEdit, SortKey, WeatherCard, WeatherField, WeatherForm, WeatherPage};
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn key_hints(pairs: &[(&'static str, &'static str)]) -> Text<'static> {
    let mut spans = Vec::with_capacity(pairs.len() * 2);
    for (key, action) in pairs {
        spans.push(Span::styled(format!(" {} ", key), Style::default().fg(Color::Red)));
        spans.push(Span::raw(format!(": {} ", action)));
    }
    Text::from(Line::from(spans))
}

fn get_legend(app: &App) -> Text<'static> {
    match &app.screen {
        Screen::Landing(_) => key_hints(&[("Enter", "Continue"), ("Esc", "Quit")]),
        Screen::Tasks(page) => match &page.form {
            _ if page.notice.message().is_some() => key_hints(&[("Enter", "Dismiss")]),
            Some(form) if form.notice.message().is_some() => key_hints(&[("Enter", "Dismiss")]),
            Some(form) if form.suggested_category().is_some() => {
                key_hints(&[("y", "Use Suggestion"), ("n", "Decline")])
            }
            Some(_) => key_hints(&[
                ("Tab", "Next Field"),
                ("Left/Right", "Change"),
                ("Ctrl-s", "Suggest Category"),
                ("Enter", "Save"),
                ("Esc", "Cancel"),
            ]),
            None => key_hints(&[
                ("q", "Quit"),
                ("j", "Down"),
                ("k", "Up"),
                ("a", "Add Task"),
                ("e", "Edit"),
                ("d", "Delete"),
                ("r", "Refresh"),
                ("L", "Log Out"),
            ]),
        },
        Screen::Weather(page) => {
            if page.notice.message().is_some() {
                return key_hints(&[("Enter", "Dismiss")]);
            }
            if page.label_edit.is_some() {
                return key_hints(&[("Enter", "Save Label"), ("Esc", "Cancel")]);
            }
            match &page.form {
                Some(form) if form.notice.message().is_some() => {
                    key_hints(&[("Enter", "Dismiss")])
                }
                Some(_) => key_hints(&[
                    ("Tab", "Next Field"),
                    ("Up/Down", "Search History"),
                    ("Enter", "Look Up / Save"),
                    ("Esc", "Cancel"),
                ]),
                None => key_hints(&[
                    ("q", "Quit"),
                    ("j/k", "Move"),
                    ("a", "Add Location"),
                    ("e", "Edit Label"),
                    ("d", "Delete"),
                    ("u", "Units"),
                    ("s/t/c", "Sort"),
                    ("o", "Order"),
                    ("L", "Log Out"),
                ]),
            }
        }
    }
}

pub fn draw(f: &mut Frame, app: &App) {
    let size = f.area();

    // Split the main layout into body and footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([Constraint::Min(0), Constraint::Length(2)].as_ref())
        .split(size);

    let body_chunk = chunks[0];
    let footer_chunk = chunks[1];

    match &app.screen {
        Screen::Landing(landing) => draw_landing(f, landing, body_chunk),
        Screen::Tasks(page) => draw_tasks(f, page, body_chunk),
        Screen::Weather(page) => draw_weather(f, page, body_chunk),
    }

    let legend = Paragraph::new(get_legend(app))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(legend, footer_chunk);
}

fn draw_landing(f: &mut Frame, landing: &Landing, area: Rect) {
    let popup_area = centered_rect_absolute(50.min(area.width), 5, area);
    let lines = vec![
        Line::from(landing.email.as_str()),
        Line::from(Span::styled(
            if landing.email.trim().is_empty() {
                "Enter your email to continue"
            } else {
                "Press Enter to continue"
            },
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let input = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Email")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Green)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, popup_area);
    f.render_widget(input, popup_area);
}

fn status_placeholder(status: LoadStatus, empty: &'static str) -> Line<'static> {
    match status {
        LoadStatus::Idle => Line::from("No user selected"),
        LoadStatus::Loading => Line::from("Loading..."),
        LoadStatus::Failed => Line::from(Span::styled(
            MSG_LOAD_ERROR,
            Style::default().fg(Color::Red),
        )),
        LoadStatus::Ready => Line::from(empty),
    }
}

fn draw_tasks(f: &mut Frame, page: &TaskPage, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)].as_ref())
        .split(area);

    let title = format!("Tasks ({})", page.email());

    if page.status != LoadStatus::Ready || page.groups().is_empty() {
        let placeholder = status_placeholder(page.status, "No tasks yet");
        let message = Paragraph::new(placeholder)
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(message, chunks[0]);
    } else {
        // Group headings are list rows too, so map the selection past them.
        let mut items: Vec<ListItem> = Vec::new();
        let mut highlighted = None;
        let mut index = 0;
        for group in page.groups().iter() {
            items.push(ListItem::new(Line::from(Span::styled(
                group.name.clone(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))));
            for task in &group.items {
                if index == page.selected {
                    highlighted = Some(items.len());
                }
                let mut content = vec![Span::raw(task.title.clone())];
                if task.status == Status::Completed {
                    content.insert(0, Span::styled("DONE ", Style::default().fg(Color::Green)));
                }
                if page.is_deleting(task.id) {
                    content.push(Span::styled(
                        " (deleting...)",
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                items.push(ListItem::new(Line::from(content)));
                index += 1;
            }
        }

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ");
        let mut state = ListState::default().with_selected(highlighted);
        f.render_stateful_widget(list, chunks[0], &mut state);
    }

    // Right panel: Task details
    let detail_block = Block::default().borders(Borders::ALL).title("Task Details");
    let detail = match page.selected_task() {
        Some(task) => {
            let due_date = if task.due_date.is_empty() {
                "No due date".to_string()
            } else {
                crate::parser::normalize_due_date(&task.due_date)
            };
            let lines = vec![
                labelled("Due Date: ", due_date),
                labelled("Priority: ", task.priority.to_string()),
                labelled("Status: ", task.status.to_string()),
                labelled("Category: ", task.category.name.clone()),
                Line::from(Span::styled(
                    "Description: ",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(task.description.clone()),
            ];
            Paragraph::new(lines)
        }
        None => Paragraph::new("No task selected"),
    };
    f.render_widget(
        detail.block(detail_block).wrap(Wrap { trim: true }),
        chunks[1],
    );

    if let Some(form) = &page.form {
        draw_task_form(f, form, area);
    }
    if let Some(message) = page.notice.message() {
        draw_notice(f, message, Color::Green, area);
    }
}

/// Sixty percent of the screen, at least 40 columns when there is room.
fn popup_width(area: Rect) -> u16 {
    let wide = (u32::from(area.width) * 60 / 100) as u16;
    wide.max(40).min(area.width)
}

fn labelled(label: &'static str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(label, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(value),
    ])
}

fn field_line(label: &'static str, value: String, focused: bool) -> Line<'static> {
    let style = if focused {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    let marker = if focused { "> " } else { "  " };
    Line::from(vec![
        Span::styled(format!("{}{}", marker, label), style),
        Span::raw(value),
    ])
}

fn draw_task_form(f: &mut Frame, form: &TaskForm, area: Rect) {
    let width = popup_width(area);
    let inner_width = width.saturating_sub(2);
    let description_lines = calculate_wrapped_lines(&form.description, inner_width.saturating_sub(15)).max(1);
    let height = (9 + description_lines as u16).min(area.height);
    let popup_area = centered_rect_absolute(width, height, area);

    let category = match form.selected_category() {
        Some(c) => format!("< {} >", c.name),
        None if form.categories().is_empty() => "(no categories)".to_string(),
        None => "< select >".to_string(),
    };
    let mut lines = vec![
        field_line("Title:       ", form.title.clone(), form.focus == FormField::Title),
        field_line(
            "Description: ",
            form.description.clone(),
            form.focus == FormField::Description,
        ),
        field_line(
            "Due Date:    ",
            form.due_date.clone(),
            form.focus == FormField::DueDate,
        ),
        field_line(
            "Priority:    ",
            format!("< {} >", form.priority),
            form.focus == FormField::Priority,
        ),
        field_line(
            "Status:      ",
            format!("< {} >", form.status),
            form.focus == FormField::Status,
        ),
        field_line("Category:    ", category, form.focus == FormField::Category),
    ];

    let busy = if form.is_submitting {
        Some("Saving...")
    } else if form.is_suggesting_category {
        Some("Suggesting...")
    } else if form.is_creating_category {
        Some("Creating category...")
    } else {
        None
    };
    if let Some(busy) = busy {
        lines.push(Line::from(Span::styled(busy, Style::default().fg(Color::Yellow))));
    }

    let popup_block = Block::default()
        .title(form.heading())
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));
    let body = Paragraph::new(lines)
        .block(popup_block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(body, popup_area);

    if let Some(suggestion) = form.suggested_category() {
        let message = format!("Suggested category: \"{}\". Use it? (y/n)", suggestion);
        draw_notice(f, &message, Color::Yellow, area);
    }
    if let Some(message) = form.notice.message() {
        draw_notice(f, message, Color::Red, area);
    }
}

fn draw_notice(f: &mut Frame, message: &str, color: Color, area: Rect) {
    let width = 50.min(area.width);
    let lines = calculate_wrapped_lines(message, width.saturating_sub(2)).max(1);
    let popup_area = centered_rect_absolute(width, lines as u16 + 2, area);
    let notice = Paragraph::new(message.to_string())
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .style(Style::default().fg(color)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, popup_area);
    f.render_widget(notice, popup_area);
}

fn sort_title(page: &WeatherPage) -> String {
    let key = match page.list.sort_key() {
        SortKey::Name => "name",
        SortKey::Temperature => "temperature",
        SortKey::Condition => "condition",
    };
    let order = if page.list.is_ascending() { "asc" } else { "desc" };
    format!("Saved Locations ({}, by {} {})", page.email(), key, order)
}

fn card_item(card: &WeatherCard, deleting: bool) -> ListItem<'static> {
    let heading = if card.label().is_empty() {
        card.data.name.clone()
    } else {
        format!("{} ({})", card.label(), card.data.name)
    };
    let mut first = vec![Span::styled(heading, Style::default().add_modifier(Modifier::BOLD))];
    if deleting {
        first.push(Span::styled(" (deleting...)", Style::default().fg(Color::DarkGray)));
    }
    let readings = format!(
        "  {:.1}°{}  {}  humidity {:.0}%  wind {:.1} m/s",
        card.temperature(),
        card.units.symbol(),
        card.data.condition(),
        card.data.main.humidity,
        card.data.wind.speed,
    );
    ListItem::new(vec![Line::from(first), Line::from(readings)])
}

fn draw_weather(f: &mut Frame, page: &WeatherPage, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(sort_title(page));

    if page.status != LoadStatus::Ready || page.list.cards().is_empty() {
        let placeholder = status_placeholder(page.status, "No saved locations yet");
        f.render_widget(
            Paragraph::new(placeholder).block(block),
            area,
        );
    } else {
        let items: Vec<ListItem> = page
            .list
            .cards()
            .iter()
            .map(|card| card_item(card, page.is_deleting(card.id())))
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ");
        let mut state = ListState::default().with_selected(Some(page.selected));
        f.render_stateful_widget(list, area, &mut state);
    }

    if let Some(form) = &page.form {
        draw_weather_form(f, form, area);
    }
    if let Some(edit) = &page.label_edit {
        draw_label_edit(f, edit, area);
    }
    if let Some(message) = page.notice.message() {
        draw_notice(f, message, Color::Green, area);
    }
}

fn draw_weather_form(f: &mut Frame, form: &WeatherForm, area: Rect) {
    let width = popup_width(area);
    let popup_area = centered_rect_absolute(width, 10.min(area.height), area);

    let mut lines = vec![field_line(
        "City:        ",
        form.city.clone(),
        form.focus == WeatherField::City,
    )];
    match &form.data {
        Some(data) => {
            lines.push(Line::from(format!(
                "  {}: {:.1}°C (feels {:.1}°C), {}",
                data.name,
                data.main.temp,
                data.main.feels_like,
                data.condition()
            )));
            let visibility = data
                .visibility
                .map(|v| format!(", visibility {:.0} m", v))
                .unwrap_or_default();
            lines.push(Line::from(format!(
                "  humidity {:.0}%, pressure {:.0} hPa, wind {:.1} m/s{}",
                data.main.humidity, data.main.pressure, data.wind.speed, visibility
            )));
            lines.push(field_line(
                "Custom name: ",
                form.custom_name.clone(),
                form.focus == WeatherField::CustomName,
            ));
        }
        None => lines.push(Line::from(Span::styled(
            "  Press Enter to get weather info",
            Style::default().fg(Color::DarkGray),
        ))),
    }
    if form.is_looking_up {
        lines.push(Line::from(Span::styled("Looking up...", Style::default().fg(Color::Yellow))));
    } else if form.is_saving {
        lines.push(Line::from(Span::styled("Saving...", Style::default().fg(Color::Yellow))));
    }

    let body = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Add Location")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Green)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, popup_area);
    f.render_widget(body, popup_area);

    if let Some(message) = form.notice.message() {
        draw_notice(f, message, Color::Red, area);
    }
}

fn draw_label_edit(f: &mut Frame, edit: &LabelEdit, area: Rect) {
    let width = 50.min(area.width);
    let lines_required = calculate_wrapped_lines(&edit.text, width.saturating_sub(2)).max(1);
    let popup_area = centered_rect_absolute(width, lines_required as u16 + 2, area);
    let input = Paragraph::new(edit.text.as_str())
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .title(format!("Label for {}", edit.record.lookup_key()))
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Green)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, popup_area);
    f.render_widget(input, popup_area);
}

pub async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, &app))?;

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_input(key) {
                    return Ok(());
                }
            }
        }

        app.drain_completed();
        tokio::task::yield_now().await;
    }
}

fn calculate_wrapped_lines(text: &str, max_width: u16) -> usize {
    if max_width == 0 {
        return text.lines().count();
    }
    let mut line_count = 0;
    for line in text.lines() {
        let line_width = line.chars().count() as u16;
        line_count += ((line_width + max_width - 1) / max_width).max(1) as usize;
    }
    line_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::SharedBackend;
    use crate::config::Variant;
    use crate::models::{Category, Task};
    use crate::page::PageOutcome;
    use crate::parser::{Location, Route};
    use crate::testing::FakeBackend;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        let mut out = String::new();
        for row in buffer.content.chunks(width) {
            for cell in row {
                out.push_str(cell.symbol());
            }
            out.push('\n');
        }
        out
    }

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        screen_text(&terminal)
    }

    fn api() -> SharedBackend {
        Arc::new(FakeBackend::default())
    }

    #[test]
    fn test_popup_width_on_very_wide_terminals() {
        assert_eq!(popup_width(Rect::new(0, 0, 2000, 50)), 1200);
        assert_eq!(popup_width(Rect::new(0, 0, u16::MAX, 50)), 39321);
        assert_eq!(popup_width(Rect::new(0, 0, 50, 20)), 40);
        assert_eq!(popup_width(Rect::new(0, 0, 30, 20)), 30);
    }

    #[test]
    fn test_wrapped_lines() {
        assert_eq!(calculate_wrapped_lines("abcdef", 3), 2);
        assert_eq!(calculate_wrapped_lines("abc\n\nde", 3), 3);
        assert_eq!(calculate_wrapped_lines("abc", 0), 1);
    }

    #[tokio::test]
    async fn test_renders_groups_with_headings() {
        let mut app = App::new(api(), Variant::Tasks, Location::new(Route::Tasks, "me@x.io"));
        if let Screen::Tasks(page) = &mut app.screen {
            let task = |id: u64, category: Category| Task {
                id,
                title: format!("Task number {}", id),
                description: "d".to_string(),
                category,
                ..Task::default()
            };
            page.apply(
                PageOutcome::Fetched(Ok(vec![
                    task(1, Category::new(1, "Work")),
                    task(2, Category::new(2, "Home")),
                ])),
                &mut app.cache,
            );
        }
        let text = render(&app);
        let work = text.find("Work").unwrap();
        let home = text.find("Home").unwrap();
        assert!(work < text.find("Task number 1").unwrap());
        assert!(home > text.find("Task number 1").unwrap());
    }

    #[tokio::test]
    async fn test_renders_generic_load_error() {
        let mut app = App::new(api(), Variant::Tasks, Location::new(Route::Tasks, "me@x.io"));
        if let Screen::Tasks(page) = &mut app.screen {
            page.apply(
                PageOutcome::Fetched(Err(crate::error::ApiError::Malformed("boom".to_string()))),
                &mut app.cache,
            );
        }
        let text = render(&app);
        assert!(text.contains(MSG_LOAD_ERROR));
        assert!(!text.contains("boom"));
    }

    #[tokio::test]
    async fn test_landing_prompts_for_email() {
        let app = App::new(api(), Variant::Weather, Location::landing());
        assert!(render(&app).contains("Enter your email to continue"));
    }
}
