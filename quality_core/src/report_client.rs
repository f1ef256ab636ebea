//! Request building and dispatch for quality reports.
//!
//! Submission is split in two so that admission stays on the UI loop:
//! [`ReportClient::begin`] claims the lifecycle flag synchronously and hands
//! back a [`PendingReport`], and [`ReportClient::execute`] performs the fetch
//! on the runtime. The outcome carries the in-flight guard, so the flag stays
//! set until whoever applies the result drops it.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use quality_schema::{
    RenderInconsistency, Report, ReportDecodeError, ReportQuery, RequestBody, REPORT_ROUTE,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::lifecycle::{CancelToken, InFlightGuard, LifecycleFlag};
use crate::selection::{SelectionState, ValidationFailure};

pub const DEFAULT_REPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where reports come from: the live service or a static response document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSource {
    Endpoint { base_url: String, report_name: String },
    Fixture(PathBuf),
}

impl ReportSource {
    pub fn report_url(&self) -> Option<String> {
        match self {
            ReportSource::Endpoint {
                base_url,
                report_name,
            } => Some(format!(
                "{}/{}/{}",
                base_url.trim_end_matches('/'),
                REPORT_ROUTE,
                report_name
            )),
            ReportSource::Fixture(_) => None,
        }
    }
}

impl fmt::Display for ReportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportSource::Endpoint { .. } => {
                f.write_str(self.report_url().as_deref().unwrap_or_default())
            }
            ReportSource::Fixture(path) => write!(f, "fixture {}", path.display()),
        }
    }
}

/// Everything a single report request needs, built fresh at submit time.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub polygon: geojson::Geometry,
    pub topic_id: String,
    pub dataset_id: String,
    pub feature_id: String,
}

impl ReportRequest {
    /// Re-check the selection and build the request. The clicked feature's
    /// geometry is used when present, `fallback` otherwise.
    pub fn from_selection(
        state: &SelectionState,
        fallback: &geojson::Geometry,
    ) -> Result<Self, ValidationFailure> {
        let area = state.area.as_ref().ok_or(ValidationFailure::MissingArea)?;
        let topic = state.topic.as_ref().ok_or(ValidationFailure::MissingTopic)?;
        if topic.is_placeholder() {
            return Err(ValidationFailure::PlaceholderTopic);
        }
        let dataset = state
            .dataset
            .as_ref()
            .ok_or(ValidationFailure::MissingDataset)?;
        Ok(Self {
            polygon: area.geometry.clone().unwrap_or_else(|| fallback.clone()),
            topic_id: topic.key().to_string(),
            dataset_id: dataset.dataset_id.clone(),
            feature_id: dataset.feature_id.clone(),
        })
    }

    pub fn body(&self) -> RequestBody {
        RequestBody::for_polygon(self.polygon.clone())
    }

    pub fn query(&self) -> ReportQuery {
        ReportQuery {
            topic: self.topic_id.clone(),
            dataset: self.dataset_id.clone(),
            feature_id: self.feature_id.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportFetchFailure {
    #[error("report service answered with status {status}")]
    Status { status: u16 },
    #[error("report request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("report request timed out after {0:?}")]
    Timeout(Duration),
    #[error("report request was cancelled")]
    Cancelled,
    #[error("failed to read report fixture {path}: {source}")]
    Fixture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("report document is not valid JSON: {0}")]
    Decode(serde_json::Error),
    #[error("report is inconsistent: {0}")]
    Inconsistent(RenderInconsistency),
}

impl From<ReportDecodeError> for ReportFetchFailure {
    fn from(err: ReportDecodeError) -> Self {
        match err {
            ReportDecodeError::Json(err) => ReportFetchFailure::Decode(err),
            ReportDecodeError::Inconsistent(err) => ReportFetchFailure::Inconsistent(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error("report request {request_id} is still pending")]
    Busy { request_id: u64 },
    #[error(transparent)]
    Fetch(#[from] ReportFetchFailure),
}

/// An admitted request that has not been executed yet.
#[derive(Debug)]
pub struct PendingReport {
    request: ReportRequest,
    guard: InFlightGuard,
    cancel: CancelToken,
}

impl PendingReport {
    pub fn request_id(&self) -> u64 {
        self.guard.request_id()
    }

    pub fn request(&self) -> &ReportRequest {
        &self.request
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Outcome of one request. The lifecycle flag is released when this value,
/// or the guard taken out of it, is dropped.
#[derive(Debug)]
pub struct CompletedReport {
    guard: InFlightGuard,
    pub result: Result<Report, ReportFetchFailure>,
}

impl CompletedReport {
    pub fn request_id(&self) -> u64 {
        self.guard.request_id()
    }

    pub fn into_parts(self) -> (InFlightGuard, Result<Report, ReportFetchFailure>) {
        (self.guard, self.result)
    }
}

#[derive(Debug, Clone)]
pub struct ReportClient {
    http: reqwest::Client,
    source: ReportSource,
    timeout: Duration,
    lifecycle: LifecycleFlag,
}

impl ReportClient {
    pub fn new(http: reqwest::Client, source: ReportSource, timeout: Duration) -> Self {
        Self {
            http,
            source,
            timeout,
            lifecycle: LifecycleFlag::new(),
        }
    }

    pub fn source(&self) -> &ReportSource {
        &self.source
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn lifecycle(&self) -> &LifecycleFlag {
        &self.lifecycle
    }

    /// Admit `request` unless another one is outstanding.
    pub fn begin(&self, request: ReportRequest) -> Result<PendingReport, SubmitError> {
        let guard = self.lifecycle.try_begin().map_err(|request_id| {
            info!(target: "quality::report", request_id, "report.rejected_busy");
            SubmitError::Busy { request_id }
        })?;
        info!(
            target: "quality::report",
            request_id = guard.request_id(),
            topic = %request.topic_id,
            dataset = %request.dataset_id,
            feature_id = %request.feature_id,
            source = %self.source,
            "report.submit"
        );
        Ok(PendingReport {
            request,
            guard,
            cancel: CancelToken::new(),
        })
    }

    /// Run an admitted request to completion, cancellation or timeout.
    pub async fn execute(&self, pending: PendingReport) -> CompletedReport {
        let PendingReport {
            request,
            guard,
            cancel,
        } = pending;
        let request_id = guard.request_id();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReportFetchFailure::Cancelled),
            outcome = tokio::time::timeout(self.timeout, self.fetch(&request)) => {
                outcome.unwrap_or(Err(ReportFetchFailure::Timeout(self.timeout)))
            }
        };

        match &result {
            Ok(report) => info!(
                target: "quality::report",
                request_id,
                label = %report.overall.label,
                indicators = report.indicators.len(),
                "report.completed"
            ),
            Err(err) => warn!(
                target: "quality::report",
                request_id,
                error = %err,
                "report.failed"
            ),
        }
        CompletedReport { guard, result }
    }

    /// Validate, admit and execute in one go.
    pub async fn submit(
        &self,
        state: &SelectionState,
        fallback: &geojson::Geometry,
    ) -> Result<Report, SubmitError> {
        let request = ReportRequest::from_selection(state, fallback).map_err(|failure| {
            info!(target: "quality::report", reason = %failure, "report.validation_failed");
            failure
        })?;
        let pending = self.begin(request)?;
        let (_guard, result) = self.execute(pending).await.into_parts();
        Ok(result?)
    }

    async fn fetch(&self, request: &ReportRequest) -> Result<Report, ReportFetchFailure> {
        let body = match &self.source {
            ReportSource::Endpoint { .. } => {
                let url = self.source.report_url().unwrap_or_default();
                debug!(target: "quality::report", url = %url, "report.http_request");
                let response = self
                    .http
                    .post(&url)
                    .query(&request.query())
                    .json(&request.body())
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ReportFetchFailure::Status {
                        status: status.as_u16(),
                    });
                }
                response.text().await?
            }
            ReportSource::Fixture(path) => {
                debug!(target: "quality::report", path = %path.display(), "report.fixture_read");
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| ReportFetchFailure::Fixture {
                        path: path.clone(),
                        source,
                    })?
            }
        };
        Ok(Report::parse_json(&body)?)
    }
}
