//! Wire contracts shared by the quality viewer crates.
//!
//! The report service is an external collaborator; this crate pins down the
//! JSON shapes exchanged with it (request body, response document) and the
//! validated [`Report`] model the viewer renders from.

mod report;
mod request;

pub use report::{
    report_response_schema, Indicator, IndicatorMetadataPayload, IndicatorPayload, LabelPayload,
    OverallResult, RenderInconsistency, Report, ReportDecodeError, ReportResponse, ResultPayload,
    TrafficLight,
};
pub use request::{
    request_body_schema, ReportQuery, RequestBody, RequestFeature, REPORT_ROUTE,
};
