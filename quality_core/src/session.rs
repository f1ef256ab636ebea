//! Viewer session: the state owned by the UI loop.
//!
//! Routes user input through the layer manager and the selection state
//! machine, admits report submissions and applies their outcomes.

use std::path::{Path, PathBuf};

use bitflags::bitflags;
use tracing::{info, warn};

use crate::export::{write_export, ExportError};
use crate::layers::LayerManager;
use crate::lifecycle::CancelToken;
use crate::render::ReportView;
use crate::report_client::{CompletedReport, PendingReport, ReportClient, ReportRequest, SubmitError};
use crate::selection::{enablement, Enablement, SelectionEvent, SelectionState, TopicRef};
use crate::topics::TopicCatalogue;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ViewFlags: u8 {
        const AREA_CHOSEN = 0b0000_0001;
        const SUBMIT_ENABLED = 0b0000_0010;
        const REPORT_READY = 0b0000_0100;
        const REQUEST_PENDING = 0b0000_1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserEvent {
    PointerMoved { lon: f64, lat: f64 },
    PointerLeft,
    MapClicked { lon: f64, lat: f64 },
    TopicPicked(usize),
    NextTopic,
    PreviousTopic,
    ToggleLayer(usize),
    ClearSelection,
}

#[derive(Debug)]
pub struct ViewerSession {
    layers: LayerManager,
    selection: SelectionState,
    topics: TopicCatalogue,
    topic_index: usize,
    report: ReportView,
    flags: ViewFlags,
    pending: Option<(u64, CancelToken)>,
    notice: Option<String>,
    fallback_polygon: geojson::Geometry,
}

impl ViewerSession {
    pub fn new(
        layers: LayerManager,
        topics: TopicCatalogue,
        fallback_polygon: geojson::Geometry,
    ) -> Self {
        Self {
            layers,
            selection: SelectionState::default(),
            topics,
            topic_index: 0,
            report: ReportView::default(),
            flags: ViewFlags::empty(),
            pending: None,
            notice: None,
            fallback_polygon,
        }
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn topics(&self) -> &TopicCatalogue {
        &self.topics
    }

    pub fn topic_index(&self) -> usize {
        self.topic_index
    }

    pub fn report(&self) -> &ReportView {
        &self.report
    }

    pub fn flags(&self) -> ViewFlags {
        self.flags
    }

    pub fn enablement(&self) -> Enablement {
        enablement(&self.selection)
    }

    /// Latest user-facing message (validation failures, fetch failures).
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn handle(&mut self, event: UserEvent) -> Enablement {
        match event {
            UserEvent::PointerMoved { lon, lat } => {
                self.layers.pointer_moved(lon, lat);
            }
            UserEvent::PointerLeft => self.layers.pointer_left(),
            UserEvent::MapClicked { lon, lat } => self.click_map(lon, lat),
            UserEvent::TopicPicked(index) => self.pick_topic(index),
            UserEvent::NextTopic => self.pick_topic(self.topics.next_index(self.topic_index)),
            UserEvent::PreviousTopic => {
                self.pick_topic(self.topics.previous_index(self.topic_index))
            }
            UserEvent::ToggleLayer(layer) => {
                self.layers.toggle_layer(layer);
            }
            UserEvent::ClearSelection => {
                self.selection.apply(SelectionEvent::Cleared);
                self.flags.remove(ViewFlags::AREA_CHOSEN);
            }
        }
        self.refresh_gate()
    }

    fn click_map(&mut self, lon: f64, lat: f64) {
        let click = self
            .layers
            .feature_at(lon, lat)
            .and_then(|key| self.layers.click(key));
        match click {
            Some(click) => {
                self.selection.apply(SelectionEvent::AreaCommitted {
                    area: click.area,
                    dataset: click.dataset.ok(),
                });
                self.flags.insert(ViewFlags::AREA_CHOSEN);
            }
            None => {
                self.selection.apply(SelectionEvent::MapBackgroundClicked);
            }
        }
    }

    fn pick_topic(&mut self, index: usize) {
        let Some(option) = self.topics.get(index) else {
            return;
        };
        self.topic_index = index;
        let topic = TopicRef::new(option.key.clone());
        self.selection.apply(SelectionEvent::TopicChanged(topic));
    }

    fn refresh_gate(&mut self) -> Enablement {
        let gate = enablement(&self.selection);
        self.flags.set(ViewFlags::SUBMIT_ENABLED, gate.submit_enabled);
        gate
    }

    /// Validate the selection and admit a request. Validation and busy
    /// rejections become the session notice and never reach the network.
    pub fn begin_submit(&mut self, client: &ReportClient) -> Result<PendingReport, SubmitError> {
        let admitted = ReportRequest::from_selection(&self.selection, &self.fallback_polygon)
            .map_err(SubmitError::from)
            .and_then(|request| client.begin(request));
        match admitted {
            Ok(pending) => {
                let request_id = pending.request_id();
                self.report.mark_pending(request_id, self.selection.clone());
                self.pending = Some((request_id, pending.cancel_token()));
                self.flags.insert(ViewFlags::REQUEST_PENDING);
                self.notice = None;
                Ok(pending)
            }
            Err(err) => {
                info!(target: "quality::report", reason = %err, "report.submit_blocked");
                self.notice = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Apply a finished request, then release the lifecycle flag.
    pub fn finish_submit(&mut self, completed: CompletedReport) -> bool {
        let (guard, result) = completed.into_parts();
        let request_id = guard.request_id();
        let failure = result.as_ref().err().map(ToString::to_string);
        let rendered = self.report.apply(request_id, result);
        if rendered {
            self.flags.insert(ViewFlags::REPORT_READY);
        }
        if self.pending.as_ref().is_some_and(|(id, _)| *id == request_id) {
            self.pending = None;
            self.flags.remove(ViewFlags::REQUEST_PENDING);
            self.notice = failure;
        }
        drop(guard);
        rendered
    }

    /// Cancel the outstanding request, if any.
    pub fn cancel_pending(&mut self) -> bool {
        match &self.pending {
            Some((request_id, token)) => {
                info!(target: "quality::report", request_id, "report.cancel_requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the outstanding request without an outcome, e.g. when it could
    /// not be handed to the runtime. The guard is released by its owner.
    pub fn abandon_pending(&mut self) -> bool {
        let Some((request_id, token)) = self.pending.take() else {
            return false;
        };
        token.cancel();
        self.report.abandon(request_id);
        self.flags.remove(ViewFlags::REQUEST_PENDING);
        warn!(target: "quality::report", request_id, "report.abandoned");
        self.notice = Some(format!("report request {request_id} was abandoned"));
        true
    }

    /// Write the rendered report, labelled with the selection it was
    /// requested for rather than the live one.
    pub fn export(&mut self, dir: &Path) -> Result<PathBuf, ExportError> {
        let rendered = self
            .report
            .current()
            .zip(self.report.selection())
            .filter(|_| self.flags.contains(ViewFlags::REPORT_READY))
            .ok_or(ExportError::NotReady);
        let result = rendered.and_then(|(report, selection)| write_export(report, selection, dir));
        match &result {
            Ok(path) => self.notice = Some(format!("exported to {}", path.display())),
            Err(err) => {
                warn!(target: "quality::export", error = %err, "export.failed");
                self.notice = Some(err.to_string());
            }
        }
        result
    }
}
