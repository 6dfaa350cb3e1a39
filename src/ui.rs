use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use time_humanize::HumanTime;
use unicode_width::UnicodeWidthStr;

use gavel::agenda::{current_elapsed_ms, total_elapsed_ms, total_estimated_ms, ItemState, MS_PER_MINUTE};
use gavel::session::MeetingPhase;
use gavel::util::{format_clock, format_minutes};

use crate::{App, AppScreen};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen {
            AppScreen::Agenda => render_agenda(self, area, buf),
            AppScreen::History => render_history(self, area, buf),
        }
    }
}

fn phase_span(phase: MeetingPhase) -> Span<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    match phase {
        MeetingPhase::NotStarted => Span::styled("not started", bold.fg(Color::DarkGray)),
        MeetingPhase::Running => Span::styled("running", bold.fg(Color::Green)),
        MeetingPhase::Paused => Span::styled("paused", bold.fg(Color::Yellow)),
        MeetingPhase::AllComplete => Span::styled("all complete", bold.fg(Color::Magenta)),
    }
}

fn render_agenda(app: &App, area: Rect, buf: &mut Buffer) {
    let now = app.clock.current_ms();
    let items = app.session.items();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints(
            [
                Constraint::Length(2),               // title
                Constraint::Min(1),                  // agenda items
                Constraint::Length(2),               // active item timer
                Constraint::Length(1),               // totals
                Constraint::Length(1),               // edit input / key hints
            ]
            .as_ref(),
        )
        .split(area);

    let title = Line::from(vec![
        Span::styled("gavel ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("— "),
        phase_span(app.session.phase()),
    ]);
    Paragraph::new(title).render(chunks[0], buf);

    let dim = Style::default().add_modifier(Modifier::DIM);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line> = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let selected = idx == app.selected;
        let cursor = if selected { "> " } else { "  " };

        let (marker, marker_style) = match item.state {
            ItemState::Active { .. } => ("▶", Style::default().fg(Color::Green).patch(bold)),
            ItemState::Completed { .. } => ("✓", Style::default().fg(Color::Magenta)),
            ItemState::Pending => ("·", dim),
        };

        let max_name = (chunks[1].width as usize).saturating_sub(28).max(8);
        let name = truncate_to_width(&item.name, max_name);
        let name_style = if selected { bold } else { Style::default() };

        let timing = match item.state {
            ItemState::Completed { actual_minutes } => Span::styled(
                format!("{}m actual", format_minutes(actual_minutes)),
                Style::default().fg(Color::Magenta),
            ),
            ItemState::Active { .. } => Span::styled(
                format_clock(current_elapsed_ms(item, now)),
                Style::default().fg(Color::Green).patch(bold),
            ),
            ItemState::Pending if item.elapsed_ms > 0 => {
                Span::styled(format!("{} banked", format_clock(item.elapsed_ms)), dim)
            }
            ItemState::Pending => Span::raw(""),
        };

        lines.push(Line::from(vec![
            Span::styled(cursor, bold),
            Span::styled(format!("{marker} "), marker_style),
            Span::styled(name, name_style),
            Span::styled(
                format!("  ({}m)  ", format_minutes(item.estimated_minutes)),
                dim,
            ),
            timing,
        ]));
    }
    if items.is_empty() {
        lines.push(Line::from(Span::styled(
            "empty agenda — press a to add an item",
            dim.add_modifier(Modifier::ITALIC),
        )));
    }
    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .render(chunks[1], buf);

    Paragraph::new(timer_line(app, now))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    let totals = Line::from(vec![
        Span::styled("total ", dim),
        Span::styled(format_clock(total_elapsed_ms(items, now)), bold),
        Span::styled(
            format!(" / {} planned", format_clock(total_estimated_ms(items))),
            dim,
        ),
    ]);
    Paragraph::new(totals).render(chunks[3], buf);

    let bottom = if let Some(edit) = &app.edit {
        Line::from(vec![
            Span::styled("rename: ", Style::default().fg(Color::Yellow)),
            Span::raw(edit.buffer.clone()),
            Span::styled("▏", Style::default().fg(Color::Yellow)),
        ])
    } else {
        Line::from(Span::styled(
            "space start/pause  n next  b back  a add  e rename  +/- estimate  d delete  J/K move  w save  h history  r reset  q quit",
            dim,
        ))
    };
    Paragraph::new(bottom).render(chunks[4], buf);
}

fn timer_line(app: &App, now: i64) -> Line<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let Some(idx) = app.session.active_index() else {
        return if app.session.is_all_complete() {
            Line::from(Span::styled(
                "agenda complete — press w to save the meeting",
                Style::default().fg(Color::Magenta).patch(bold),
            ))
        } else {
            Line::from(Span::styled(
                "—",
                Style::default().add_modifier(Modifier::DIM),
            ))
        };
    };

    let item = &app.session.items()[idx];
    let remaining = (item.estimated_minutes * MS_PER_MINUTE) as i64 - current_elapsed_ms(item, now);
    if remaining >= 0 {
        Line::from(Span::styled(
            format_clock(remaining),
            Style::default().fg(Color::Green).patch(bold),
        ))
    } else {
        // overtime: the item keeps running indefinitely past its estimate
        Line::from(Span::styled(
            format!("+{}", format_clock(remaining)),
            Style::default().fg(Color::Red).patch(bold),
        ))
    }
}

fn render_history(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([Constraint::Length(2), Constraint::Min(1), Constraint::Length(1)].as_ref())
        .split(area);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    Paragraph::new(Line::from(Span::styled("meeting history", bold))).render(chunks[0], buf);

    let now = app.clock.current_ms();
    let mut lines: Vec<Line> = Vec::new();
    for meeting in app.history.meetings() {
        let age = meeting
            .date_time()
            .map(|dt| {
                let age_secs = (now / 1000) - dt.timestamp();
                HumanTime::from(-age_secs).to_string()
            })
            .unwrap_or_else(|| meeting.date.clone());

        lines.push(Line::from(vec![
            Span::styled(format!("{age}  "), bold),
            Span::raw(format!(
                "{} items — {}m actual / {}m planned",
                meeting.agenda_items.len(),
                format_minutes(meeting.total_actual_minutes()),
                format_minutes(meeting.total_estimated_minutes()),
            )),
        ]));
        for item in &meeting.agenda_items {
            lines.push(Line::from(Span::styled(
                format!(
                    "    {} — {}m of {}m",
                    item.name,
                    item.actual_minutes().map(format_minutes).unwrap_or_default(),
                    format_minutes(item.estimated_minutes),
                ),
                dim,
            )));
        }
    }
    if app.history.is_empty() {
        lines.push(Line::from(Span::styled(
            "no saved meetings yet",
            dim.add_modifier(Modifier::ITALIC),
        )));
    }
    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .render(chunks[1], buf);

    Paragraph::new(Line::from(Span::styled("h/esc back  q quit", dim))).render(chunks[2], buf);
}

fn truncate_to_width(name: &str, max: usize) -> String {
    if name.width() <= max {
        return name.to_string();
    }
    let mut out = String::new();
    for c in name.chars() {
        if out.width() + 1 >= max {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}
