use std::collections::VecDeque;

use quality_core::{
    InfoPanel, RenderedReport, ReportSection, ReportStatus, SubmitColor, ViewFlags, ViewerSession,
};
use quality_schema::TrafficLight;
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::map_view::{draw_map, MapViewport};

pub struct UiState {
    pub logs: VecDeque<String>,
    pub max_logs: usize,
    /// Keyboard/mouse pointer over the map, in terminal cells.
    pub pointer: Option<(u16, u16)>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            logs: VecDeque::new(),
            max_logs: 6,
            pointer: None,
        }
    }
}

impl UiState {
    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.logs.push_front(text);
        while self.logs.len() > self.max_logs {
            self.logs.pop_back();
        }
    }
}

pub struct Regions {
    pub header: Rect,
    pub map: Rect,
    pub info: Rect,
    pub selection: Rect,
    pub report: Rect,
    pub logs: Rect,
    pub commands: Rect,
}

pub fn regions(area: Rect) -> Regions {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(8),
            Constraint::Length(4),
        ])
        .split(area);
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(46)])
        .split(rows[1]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Min(6),
        ])
        .split(body[1]);
    Regions {
        header: rows[0],
        map: body[0],
        info: side[0],
        selection: side[1],
        report: side[2],
        logs: rows[2],
        commands: rows[3],
    }
}

/// Cells of the map that hold the choropleth (inside the border).
pub fn map_inner(area: Rect) -> Rect {
    regions(area).map.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    })
}

pub fn draw_ui(frame: &mut Frame, state: &UiState, session: &ViewerSession, viewport: &MapViewport) {
    let regions = regions(frame.size());

    draw_header(frame, regions.header, session);
    draw_map(
        frame,
        regions.map,
        session.layers(),
        viewport,
        state.pointer,
        &map_title(session),
    );
    draw_info(frame, regions.info, session);
    draw_selection(frame, regions.selection, session);
    draw_report(frame, regions.report, session);
    draw_logs(frame, regions.logs, state);
    draw_commands(frame, regions.commands);
}

fn map_title(session: &ViewerSession) -> String {
    let layers: Vec<String> = session
        .layers()
        .layers()
        .iter()
        .enumerate()
        .map(|(index, layer)| {
            let mark = if layer.is_attached() { "x" } else { " " };
            format!("{}[{mark}] {}", index + 1, layer.name)
        })
        .collect();
    format!("Map  {}", layers.join("  "))
}

fn draw_header(frame: &mut Frame, area: Rect, session: &ViewerSession) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Quality Map Viewer");
    let gate = session.enablement();
    let submit_style = match gate.submit_color {
        SubmitColor::Enabled => Style::default().fg(Color::Black).bg(Color::Green),
        SubmitColor::Disabled => Style::default().fg(Color::Gray).bg(Color::DarkGray),
    };
    let flags = session.flags();
    let export_style = if flags.contains(ViewFlags::REPORT_READY) {
        Style::default().fg(Color::Black).bg(Color::Cyan)
    } else {
        Style::default().fg(Color::Gray).bg(Color::DarkGray)
    };
    let mut spans = vec![
        Span::styled(" get quality (g) ", submit_style),
        Span::raw(" "),
        Span::styled(" get PDF (e) ", export_style),
    ];
    if flags.contains(ViewFlags::REQUEST_PENDING) {
        spans.push(Span::styled(
            "  request pending, x to cancel",
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(notice) = session.notice() {
        spans.push(Span::styled(
            format!("  {notice}"),
            Style::default().fg(Color::LightRed),
        ));
    }
    let text = Paragraph::new(Line::from(spans)).wrap(Wrap { trim: true });
    frame.render_widget(block, area);
    frame.render_widget(
        text,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_info(frame: &mut Frame, area: Rect, session: &ViewerSession) {
    let block = Block::default().borders(Borders::ALL).title("Info");
    let lines: Vec<Line> = match session.layers().info() {
        InfoPanel::Idle(message) => vec![Line::from(Span::raw(message.clone()))],
        InfoPanel::Feature {
            layer,
            name,
            quality,
            properties,
        } => {
            let mut lines = vec![
                Line::from(Span::styled(
                    name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(vec![
                    Span::raw("layer "),
                    Span::styled(layer.clone(), Style::default().fg(Color::Cyan)),
                    Span::raw(" | quality "),
                    Span::styled(quality.to_string(), Style::default().fg(Color::Yellow)),
                ]),
            ];
            lines.extend(
                properties
                    .iter()
                    .map(|(key, value)| Line::from(format!("{key}: {value}"))),
            );
            lines
        }
    };
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_selection(frame: &mut Frame, area: Rect, session: &ViewerSession) {
    let block = Block::default().borders(Borders::ALL).title("Selection");
    let selection = session.selection();
    let area_text = selection
        .area
        .as_ref()
        .map(|area| format!("{} ({})", area.name, area.layer))
        .unwrap_or_else(|| "-".to_string());
    let topic_text = session
        .topics()
        .get(session.topic_index())
        .map(|option| option.label.clone())
        .unwrap_or_default();
    let dataset_text = selection
        .dataset
        .as_ref()
        .map(|dataset| format!("{} / {}", dataset.dataset_id, dataset.feature_id))
        .unwrap_or_else(|| "-".to_string());
    let label = Style::default().fg(Color::Yellow);
    let lines = vec![
        Line::from(vec![Span::styled("area    ", label), Span::raw(area_text)]),
        Line::from(vec![
            Span::styled("topic   ", label),
            Span::raw(format!("< {topic_text} >")),
        ]),
        Line::from(vec![
            Span::styled("dataset ", label),
            Span::raw(dataset_text),
        ]),
    ];
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn light_color(label: TrafficLight) -> Color {
    match label {
        TrafficLight::Red => Color::Red,
        TrafficLight::Yellow => Color::Yellow,
        TrafficLight::Green => Color::Green,
    }
}

fn report_lines(report: &RenderedReport) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for section in report.sections() {
        match section {
            ReportSection::Header(title) => lines.push(Line::from(Span::styled(
                title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ))),
            ReportSection::TrafficLight { label, .. } => lines.push(Line::from(vec![
                Span::styled("  ●  ", Style::default().fg(light_color(*label))),
                Span::raw(label.to_string()),
            ])),
            ReportSection::OverallValue(value) => lines.push(Line::from(format!("value {value}"))),
            ReportSection::OverallText(text) => lines.push(Line::from(text.clone())),
            ReportSection::Indicators(entries) => {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    "Indicators",
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                for entry in entries {
                    lines.push(Line::from(vec![
                        Span::styled("● ", Style::default().fg(light_color(entry.label))),
                        Span::raw(format!("{} {}", entry.name, entry.value)),
                    ]));
                    lines.push(Line::from(format!("  {}", entry.text)));
                }
            }
        }
    }
    lines
}

fn draw_report(frame: &mut Frame, area: Rect, session: &ViewerSession) {
    let block = Block::default().borders(Borders::ALL).title("Report");
    let view = session.report();
    let mut lines = match view.status() {
        ReportStatus::Empty => vec![Line::from("Pick an area and a topic, then press g")],
        ReportStatus::Pending { request_id } => vec![Line::from(Span::styled(
            format!("request {request_id} pending..."),
            Style::default().fg(Color::Yellow),
        ))],
        ReportStatus::Failed { message } => vec![Line::from(Span::styled(
            format!("failed: {message}"),
            Style::default().fg(Color::LightRed),
        ))],
        ReportStatus::Ready => Vec::new(),
    };
    if let Some(report) = view.current() {
        lines.extend(report_lines(report));
    }
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_logs(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Logs");
    let lines: Vec<Line> = state
        .logs
        .iter()
        .map(|entry| Line::from(Span::raw(entry)))
        .collect();
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_commands(frame: &mut Frame, area: Rect) {
    let key = Style::default().fg(Color::Yellow);
    let lines = vec![
        Line::from(vec![
            Span::styled("mouse/arrows", key),
            Span::raw(" hover  "),
            Span::styled("click/enter", key),
            Span::raw(" select  "),
            Span::styled("t/T", key),
            Span::raw(" topic  "),
            Span::styled("1-9", key),
            Span::raw(" toggle layer"),
        ]),
        Line::from(vec![
            Span::styled("g", key),
            Span::raw(" get quality  "),
            Span::styled("x", key),
            Span::raw(" cancel  "),
            Span::styled("e", key),
            Span::raw(" export  "),
            Span::styled("c", key),
            Span::raw(" clear  "),
            Span::styled("q", key),
            Span::raw(" quit"),
        ]),
    ];
    let block = Block::default().borders(Borders::ALL).title("Commands");
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}
