pub mod screen;

use chrono::Utc;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget, Wrap},
    Frame,
};
use time_humanize::HumanTime;
use unicode_width::UnicodeWidthStr;

use typesprint::{
    passage::PassageSource, session::CharState, sink::SubmissionOutcome, util::format_time,
};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

pub fn draw(app: &App, f: &mut Frame) {
    screen::current_screen(app.state).render(app, f);
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Results => render_results(self, area, buf),
            _ => render_typing(self, area, buf),
        }
    }
}

fn render_typing(app: &App, area: Rect, buf: &mut Buffer) {
    let engine = &app.engine;
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
    let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
    let dim_bold_style = Style::default()
        .patch(bold_style)
        .add_modifier(Modifier::DIM);
    let underlined_dim_bold_style = Style::default()
        .patch(dim_bold_style)
        .add_modifier(Modifier::UNDERLINED);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let passage = engine.passage_text();
    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let mut prompt_occupied_lines =
        ((passage.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16;
    if passage.width() <= max_chars_per_line as usize {
        prompt_occupied_lines = 1;
    }
    let padding = area.height.saturating_sub(prompt_occupied_lines + 4) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(padding),
            Constraint::Length(2), // stats
            Constraint::Length(prompt_occupied_lines),
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let stats = Paragraph::new(Span::styled(
        format!(
            "{}   {} wpm   {}% acc",
            format_time(engine.timer().time()),
            engine.current_wpm(),
            engine.current_accuracy()
        ),
        dim_bold_style,
    ))
    .alignment(Alignment::Center);
    stats.render(chunks[1], buf);

    let typed = engine.typed();
    let cursor = typed.len();
    let spans = engine
        .passage()
        .iter()
        .zip(engine.char_states())
        .enumerate()
        .map(|(idx, (expected, state))| match state {
            CharState::Correct => Span::styled(expected.to_string(), green_bold_style),
            CharState::Incorrect => Span::styled(
                match typed[idx] {
                    ' ' => "·".to_owned(),
                    c => c.to_string(),
                },
                red_bold_style,
            ),
            CharState::Pending if idx == cursor => {
                Span::styled(expected.to_string(), underlined_dim_bold_style)
            }
            CharState::Pending => Span::styled(expected.to_string(), dim_bold_style),
        })
        .collect::<Vec<Span>>();

    let widget = Paragraph::new(Line::from(spans))
        .alignment(if prompt_occupied_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true });
    widget.render(chunks[2], buf);

    let source = match app.passage_source {
        Some(PassageSource::Fallback) if app.config.passage_url.is_some() => " (offline passage)",
        _ => "",
    };
    let legend = Paragraph::new(Span::styled(
        format!(
            "{} · {}{}   (←) restart / (→) new passage / (esc)ape",
            app.test_config.difficulty, app.test_config.mode, source
        ),
        italic_style,
    ));
    legend.render(chunks[4], buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(result) = app.engine.result() else {
        return;
    };
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1), // headline
            Constraint::Length(1), // details
            Constraint::Length(1), // padding
            Constraint::Length(1), // submission notice
            Constraint::Min(1),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let headline = Paragraph::new(Span::styled(
        format!("{} wpm   {}% acc", result.wpm, result.accuracy),
        Style::default().patch(bold_style).fg(Color::Magenta),
    ))
    .alignment(Alignment::Center);
    headline.render(chunks[1], buf);

    let details = Paragraph::new(Span::styled(
        format!(
            "{} mistakes   {} chars   {}",
            result.mistakes,
            result.total_chars,
            format_time(result.time_taken)
        ),
        bold_style,
    ))
    .alignment(Alignment::Center);
    details.render(chunks[2], buf);

    let (notice, color) = submission_notice(app);
    let notice = Paragraph::new(Span::styled(
        notice,
        Style::default().fg(color).add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center);
    notice.render(chunks[4], buf);

    let legend = Paragraph::new(Span::styled(
        "(r)etry / (n)ew / (h)istory / (l)eaderboard / (esc)ape",
        italic_style,
    ));
    legend.render(chunks[6], buf);
}

fn submission_notice(app: &App) -> (String, Color) {
    if app.test_config.is_practice() {
        return ("practice run, not recorded".to_string(), Color::Gray);
    }
    match app.report.as_ref().map(|r| &r.submission) {
        Some(SubmissionOutcome::Submitted(entry)) => (
            format!("submitted to the leaderboard as {}", entry.name),
            Color::Green,
        ),
        Some(SubmissionOutcome::Failed(msg)) => {
            (format!("score not submitted: {msg}"), Color::Yellow)
        }
        Some(SubmissionOutcome::Skipped) | None if app.config.player_name().is_none() => (
            "set --name to join the leaderboard".to_string(),
            Color::Gray,
        ),
        _ => (String::new(), Color::Gray),
    }
}

pub fn render_loading(_app: &App, f: &mut Frame) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);

    let loading = Paragraph::new(Span::styled(
        "Fetching passage…",
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::ITALIC),
    ))
    .alignment(Alignment::Center);
    f.render_widget(loading, chunks[1]);
}

fn relative_date(date: chrono::DateTime<Utc>) -> String {
    let age = (Utc::now() - date).num_seconds().max(0);
    HumanTime::from_seconds(-age).to_string()
}

pub fn render_history(app: &App, f: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(VERTICAL_MARGIN)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(f.area());

    let header = Row::new(vec!["When", "WPM", "Acc", "Mistakes", "Time", "Difficulty"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = app
        .history
        .iter()
        .map(|entry| {
            Row::new(vec![
                Cell::from(relative_date(entry.result.date)),
                Cell::from(entry.result.wpm.to_string()),
                Cell::from(format!("{}%", entry.result.accuracy)),
                Cell::from(entry.result.mistakes.to_string()),
                Cell::from(format_time(entry.result.time_taken)),
                Cell::from(entry.config.difficulty.to_string()),
            ])
        })
        .collect();

    let title = match &app.notice {
        Some(notice) if app.history.is_empty() => format!("History ({notice})"),
        _ => format!("History ({} results)", app.history.len()),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(9),
            Constraint::Length(6),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(table, chunks[0]);

    let legend = Paragraph::new("(b)ack / (esc)ape")
        .style(Style::default().add_modifier(Modifier::ITALIC));
    f.render_widget(legend, chunks[1]);
}

pub fn render_leaderboard(app: &App, f: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    let query = &app.leaderboard_query;
    let (rows, title) = match &app.leaderboard {
        Some(page) => {
            let first_rank = (page.current_page.max(1) - 1) * query.limit + 1;
            let rows: Vec<Row> = page
                .scores
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    Row::new(vec![
                        Cell::from(format!("{}", first_rank + i as u32)),
                        Cell::from(entry.name.clone()),
                        Cell::from(entry.wpm.to_string()),
                        Cell::from(format!("{}%", entry.accuracy)),
                        Cell::from(entry.difficulty.to_string()),
                        Cell::from(entry.date.format("%Y-%m-%d").to_string()),
                    ])
                })
                .collect();
            let title = format!(
                "Leaderboard ({}) page {}/{} of {} scores",
                query.difficulty,
                page.current_page,
                page.total_pages.max(1),
                page.total_scores
            );
            (rows, title)
        }
        None => (Vec::new(), format!("Leaderboard ({})", query.difficulty)),
    };

    let header = Row::new(vec!["#", "Name", "WPM", "Acc", "Difficulty", "Date"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(12),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Length(11),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(table, chunks[0]);

    if let Some(notice) = &app.notice {
        let notice = Paragraph::new(Span::styled(
            notice.as_str(),
            Style::default().fg(Color::Yellow),
        ));
        f.render_widget(notice, chunks[1]);
    }

    let legend = Paragraph::new("(←/→) page / (d)ifficulty / (b)ack / (esc)ape")
        .style(Style::default().add_modifier(Modifier::ITALIC));
    f.render_widget(legend, chunks[2]);
}

pub fn render_error(app: &App, f: &mut Frame) {
    let message = app.error.as_deref().unwrap_or("something went wrong");
    let text = vec![
        Line::from(Span::styled(
            "Something went wrong",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(message.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            "(r)etry / (esc)ape",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ];
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Error"))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(widget, f.area());
}
