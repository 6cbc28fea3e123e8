use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::{
    color::{self, ColorMode, NO_DATA},
    data::Year,
    map_draw::{GlobeView, tui_color},
    state::{AppState, GeometryState, InputMode},
};

pub fn draw<'a>(f: &mut Frame<'a>, state: &mut AppState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(60),
            Constraint::Percentage(20),
        ])
        .split(f.area());

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);
    draw_filters(f, left[0], state);
    draw_legend(f, left[1], state.mode);

    draw_globe(f, chunks[1], state);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[2]);
    draw_info(f, right[0], state);
    let help = Paragraph::new(AppState::HELP_TEXT)
        .block(Block::default().borders(Borders::ALL).title("Keys"))
        .wrap(Wrap { trim: true });
    f.render_widget(help, right[1]);
}

fn draw_globe(f: &mut Frame, area: Rect, state: &mut AppState) {
    let mut title = match state.mode {
        ColorMode::Coverage => format!("Forest coverage {}", state.year),
        ColorMode::Trend => format!("Forest change {}–{}", Year::Y2000, Year::Y2020),
    };
    let k = state.engine.view().zoom.k;
    if (k - 1.0).abs() > 1e-3 {
        title.push_str(&format!("  ×{k:.1}"));
    }
    title.push_str(&format!("  [{}]", state.engine.state().label()));
    let block = Block::default().borders(Borders::ALL).title(title);
    state.set_canvas_area(block.inner(area));

    match &state.geometry {
        GeometryState::Ready(features) => {
            let view = GlobeView {
                features,
                table: &state.table,
                filter: &state.filter,
                year: state.year,
                projection: state.engine.projection(),
                selected: state.engine.selection().current(),
                hovered: state.engine.hovered(),
            };
            view.render(f, area, block);
        }
        GeometryState::Loading(_) => {
            let txt = Paragraph::new("Loading country boundaries…").block(block);
            f.render_widget(txt, area);
        }
        GeometryState::Failed(message) => {
            let txt = Paragraph::new(vec![
                Line::from("Country boundaries unavailable"),
                Line::from(Span::styled(message.as_str(), Style::default().fg(Color::Red))),
            ])
            .block(block)
            .wrap(Wrap { trim: true });
            f.render_widget(txt, area);
        }
    }
}

fn draw_filters(f: &mut Frame, area: Rect, state: &AppState) {
    let filter = &state.filter;
    let search = match state.input {
        InputMode::Search => Span::styled(format!("{}_", filter.search), Style::default().fg(Color::Yellow)),
        InputMode::Normal if filter.search.is_empty() => Span::styled("-", Style::default().fg(Color::DarkGray)),
        InputMode::Normal => Span::raw(filter.search.clone()),
    };
    let mut lines = vec![
        Line::from(vec![Span::raw("Search: "), search]),
        Line::from(format!("Region: {}", filter.region.as_deref().unwrap_or("All regions"))),
        Line::from(format!("Density: {:.0}% – {:.0}%", filter.range.0, filter.range.1)),
    ];
    if filter.is_active() {
        lines.push(Line::from(""));
        lines.push(Line::from(format!("{} countries match", state.admitted_count())));
    }
    let p = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Filters"))
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

fn draw_legend(f: &mut Frame, area: Rect, mode: ColorMode) {
    let swatch = |c| Span::styled("██ ", Style::default().fg(tui_color(c)));
    let mut lines: Vec<Line> = color::legend(mode)
        .into_iter()
        .rev()
        .map(|band| Line::from(vec![swatch(band.color), Span::raw(format!("{:.0} – {:.0}", band.lo, band.hi))]))
        .collect();
    lines.push(Line::from(vec![swatch(NO_DATA), Span::raw("No data")]));
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(mode.label()));
    f.render_widget(p, area);
}

fn draw_info(f: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().borders(Borders::ALL).title("Country");
    let Some(record) = state.selected_record() else {
        let hint = match state.hover_label() {
            Some(label) => format!("{label}\n\nClick a country for details"),
            None => "Click a country for details".to_string(),
        };
        f.render_widget(Paragraph::new(hint).block(block).wrap(Wrap { trim: true }), area);
        return;
    };

    let coverage = match record.value(state.year) {
        Some(v) => format!("{v:.2}%"),
        None => "no data".to_string(),
    };
    let trend = match record.trend {
        Some(t) if t > 0.0 => Span::styled(format!("{t:+.2} pp"), Style::default().fg(Color::Green)),
        Some(t) if t < 0.0 => Span::styled(format!("{t:+.2} pp"), Style::default().fg(Color::Red)),
        Some(t) => Span::styled(format!("{t:.2} pp"), Style::default().fg(Color::Gray)),
        None => Span::styled("no data", Style::default().fg(Color::Gray)),
    };
    let mut lines = vec![
        Line::from(Span::styled(record.name.as_str(), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(record.region.as_deref().unwrap_or("Unknown region")),
    ];
    if let Some(center) = record.center_label() {
        lines.push(Line::from(Span::styled(center, Style::default().fg(Color::DarkGray))));
    }
    lines.extend([
        Line::from(""),
        Line::from(format!("Coverage {}: {coverage}", state.year)),
        Line::from(vec![Span::raw(format!("Change {}–{}: ", Year::Y2000, Year::Y2020)), trend]),
        Line::from(""),
        Line::from(Span::styled("Esc: close", Style::default().fg(Color::DarkGray))),
    ]);
    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
}
