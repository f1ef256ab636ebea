//! Report renderer and the view state that keeps the last good report.

use std::fmt;

use quality_schema::{Report, TrafficLight};
use serde::Serialize;
use tracing::{debug, info};

use crate::report_client::ReportFetchFailure;
use crate::selection::SelectionState;

pub const OVERALL_HEADER: &str = "Overall quality";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorEntry {
    pub name: String,
    pub value: f64,
    pub label: TrafficLight,
    pub text: String,
}

/// One block of the rendered report, in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReportSection {
    Header(String),
    TrafficLight {
        label: TrafficLight,
        image_key: &'static str,
    },
    OverallValue(f64),
    OverallText(String),
    Indicators(Vec<IndicatorEntry>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedReport {
    sections: Vec<ReportSection>,
}

impl RenderedReport {
    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn traffic_light(&self) -> Option<TrafficLight> {
        self.sections.iter().find_map(|section| match section {
            ReportSection::TrafficLight { label, .. } => Some(*label),
            _ => None,
        })
    }

    pub fn indicators(&self) -> &[IndicatorEntry] {
        self.sections
            .iter()
            .find_map(|section| match section {
                ReportSection::Indicators(entries) => Some(entries.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for RenderedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, section) in self.sections.iter().enumerate() {
            if position > 0 {
                writeln!(f)?;
            }
            match section {
                ReportSection::Header(title) => write!(f, "{title}")?,
                ReportSection::TrafficLight { label, image_key } => {
                    write!(f, "Traffic light: {label} ({image_key})")?
                }
                ReportSection::OverallValue(value) => write!(f, "Value: {value}")?,
                ReportSection::OverallText(text) => write!(f, "{text}")?,
                ReportSection::Indicators(entries) => {
                    write!(f, "Indicators:")?;
                    for entry in entries {
                        write!(
                            f,
                            "\n- {}: {} ({}) {}",
                            entry.name, entry.value, entry.label, entry.text
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Lay out `report`. The traffic light follows the label, never the value,
/// and the indicator section only exists when there are indicators.
pub fn render(report: &Report) -> RenderedReport {
    let overall = &report.overall;
    let mut sections = vec![
        ReportSection::Header(OVERALL_HEADER.to_string()),
        ReportSection::TrafficLight {
            label: overall.label,
            image_key: overall.label.image_key(),
        },
        ReportSection::OverallValue(overall.value),
        ReportSection::OverallText(overall.text.clone()),
    ];
    if !report.indicators.is_empty() {
        sections.push(ReportSection::Indicators(
            report
                .indicators
                .iter()
                .map(|indicator| IndicatorEntry {
                    name: indicator.metadata_name.clone(),
                    value: indicator.value,
                    label: indicator.label,
                    text: indicator.text.clone(),
                })
                .collect(),
        ));
    }
    RenderedReport { sections }
}

pub fn render_text(report: &Report) -> String {
    render(report).to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
    Empty,
    Pending { request_id: u64 },
    Ready,
    Failed { message: String },
}

/// What the report panel shows. A failed attempt leaves the previous report
/// in place; only a successful one replaces it.
#[derive(Debug, Clone)]
pub struct ReportView {
    current: Option<RenderedReport>,
    report: Option<Report>,
    /// Selection the current report was requested for.
    selection: Option<SelectionState>,
    requested: Option<SelectionState>,
    status: ReportStatus,
}

impl Default for ReportView {
    fn default() -> Self {
        Self {
            current: None,
            report: None,
            selection: None,
            requested: None,
            status: ReportStatus::Empty,
        }
    }
}

impl ReportView {
    pub fn current(&self) -> Option<&RenderedReport> {
        self.current.as_ref()
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn selection(&self) -> Option<&SelectionState> {
        self.selection.as_ref()
    }

    pub fn status(&self) -> &ReportStatus {
        &self.status
    }

    /// True once any report has rendered.
    pub fn is_ready(&self) -> bool {
        self.current.is_some()
    }

    /// Wait for `request_id`, remembering the selection it was built from.
    pub fn mark_pending(&mut self, request_id: u64, selection: SelectionState) {
        self.requested = Some(selection);
        self.status = ReportStatus::Pending { request_id };
    }

    /// Stop waiting for `request_id` without an outcome. The panel falls back
    /// to the last report, if any.
    pub fn abandon(&mut self, request_id: u64) -> bool {
        if self.status != (ReportStatus::Pending { request_id }) {
            return false;
        }
        self.requested = None;
        self.status = if self.current.is_some() {
            ReportStatus::Ready
        } else {
            ReportStatus::Empty
        };
        true
    }

    /// Apply the outcome of `request_id`. Outcomes for any other request are
    /// dropped. Returns whether a new report was rendered.
    pub fn apply(
        &mut self,
        request_id: u64,
        result: Result<Report, ReportFetchFailure>,
    ) -> bool {
        if self.status != (ReportStatus::Pending { request_id }) {
            debug!(
                target: "quality::report",
                request_id,
                status = ?self.status,
                "report.outcome_ignored"
            );
            return false;
        }
        match result {
            Ok(report) => {
                let rendered = render(&report);
                info!(
                    target: "quality::report",
                    request_id,
                    label = %report.overall.label,
                    indicators = report.indicators.len(),
                    "report.rendered"
                );
                self.current = Some(rendered);
                self.report = Some(report);
                self.selection = self.requested.take();
                self.status = ReportStatus::Ready;
                true
            }
            Err(err) => {
                self.requested = None;
                self.status = ReportStatus::Failed {
                    message: err.to_string(),
                };
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{AreaRef, TopicRef};
    use quality_schema::{Indicator, OverallResult};

    fn report(label: TrafficLight, value: f64, indicators: Vec<Indicator>) -> Report {
        Report {
            overall: OverallResult {
                label,
                value,
                text: "Good coverage".into(),
            },
            indicators,
        }
    }

    fn completeness() -> Indicator {
        Indicator {
            metadata_name: "Building Completeness".into(),
            value: 0.9,
            label: TrafficLight::Green,
            text: "ok".into(),
        }
    }

    #[test]
    fn renders_sections_in_order() {
        let rendered = render(&report(TrafficLight::Green, 0.92, vec![completeness()]));
        insta::assert_snapshot!(rendered.to_string(), @r###"
        Overall quality
        Traffic light: green (traffic_light_green)
        Value: 0.92
        Good coverage
        Indicators:
        - Building Completeness: 0.9 (green) ok
        "###);
    }

    #[test]
    fn empty_indicators_have_no_section() {
        let rendered = render(&report(TrafficLight::Yellow, 0.5, Vec::new()));
        assert_eq!(rendered.sections().len(), 4);
        assert!(rendered.indicators().is_empty());
        insta::assert_snapshot!(render_text(&report(TrafficLight::Yellow, 0.5, Vec::new())), @r###"
        Overall quality
        Traffic light: yellow (traffic_light_yellow)
        Value: 0.5
        Good coverage
        "###);
    }

    #[test]
    fn traffic_light_follows_label_not_value() {
        let rendered = render(&report(TrafficLight::Red, 0.99, Vec::new()));
        assert_eq!(rendered.traffic_light(), Some(TrafficLight::Red));
        assert!(matches!(
            rendered.sections()[1],
            ReportSection::TrafficLight {
                image_key: "traffic_light_red",
                ..
            }
        ));
    }

    #[test]
    fn failure_keeps_previous_report() {
        let mut view = ReportView::default();
        view.mark_pending(1, SelectionState::default());
        assert!(view.apply(1, Ok(report(TrafficLight::Green, 0.92, vec![completeness()]))));
        let before = view.current().cloned();

        view.mark_pending(2, SelectionState::default());
        assert!(!view.apply(2, Err(ReportFetchFailure::Status { status: 500 })));
        assert_eq!(view.current().cloned(), before);
        assert!(view.is_ready());
        assert!(matches!(view.status(), ReportStatus::Failed { .. }));
    }

    #[test]
    fn stale_outcomes_are_ignored() {
        let mut view = ReportView::default();
        view.mark_pending(2, SelectionState::default());
        assert!(!view.apply(1, Ok(report(TrafficLight::Red, 0.1, Vec::new()))));
        assert!(!view.is_ready());
        assert_eq!(view.status(), &ReportStatus::Pending { request_id: 2 });
    }

    fn picked(area: &str) -> SelectionState {
        SelectionState {
            area: Some(AreaRef {
                name: area.into(),
                layer: "districts".into(),
                geometry: None,
            }),
            topic: Some(TopicRef::new("building_count")),
            dataset: None,
        }
    }

    #[test]
    fn selection_moves_with_the_rendered_report() {
        let mut view = ReportView::default();
        view.mark_pending(1, picked("Heidelberg"));
        assert_eq!(view.selection(), None);
        assert!(view.apply(1, Ok(report(TrafficLight::Green, 0.92, Vec::new()))));
        assert_eq!(view.selection(), Some(&picked("Heidelberg")));

        view.mark_pending(2, picked("Mosbach"));
        assert!(!view.apply(2, Err(ReportFetchFailure::Cancelled)));
        assert_eq!(view.selection(), Some(&picked("Heidelberg")));

        view.mark_pending(3, picked("Mosbach"));
        assert!(view.apply(3, Ok(report(TrafficLight::Red, 0.1, Vec::new()))));
        assert_eq!(view.selection(), Some(&picked("Mosbach")));
    }

    #[test]
    fn abandoned_request_restores_previous_status() {
        let mut view = ReportView::default();
        view.mark_pending(1, picked("Heidelberg"));
        assert!(!view.abandon(2));
        assert!(view.abandon(1));
        assert_eq!(view.status(), &ReportStatus::Empty);
        assert!(!view.apply(1, Ok(report(TrafficLight::Green, 0.92, Vec::new()))));

        view.mark_pending(2, picked("Heidelberg"));
        assert!(view.apply(2, Ok(report(TrafficLight::Green, 0.92, Vec::new()))));
        view.mark_pending(3, picked("Mosbach"));
        assert!(view.abandon(3));
        assert_eq!(view.status(), &ReportStatus::Ready);
        assert_eq!(view.selection(), Some(&picked("Heidelberg")));
    }
}
