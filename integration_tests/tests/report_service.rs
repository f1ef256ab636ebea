mod common;

use std::time::Duration;

use common::{StubReply, StubServer};
use quality_core::{
    ReportFetchFailure, ReportStatus, SubmitError, UserEvent, ValidationFailure, ViewFlags,
    DEFAULT_REPORT_TIMEOUT,
};
use quality_schema::TrafficLight;

const HEIDELBERG: (f64, f64) = (8.68, 49.40);
const SINSHEIM: (f64, f64) = (8.87, 49.25);

async fn ready_session() -> anyhow::Result<quality_core::ViewerSession> {
    let mut session = common::fixture_session().await?;
    session.handle(UserEvent::MapClicked {
        lon: HEIDELBERG.0,
        lat: HEIDELBERG.1,
    });
    session.handle(UserEvent::NextTopic);
    Ok(session)
}

fn report_route() -> &'static str {
    "/dynamic_report/minimal"
}

#[tokio::test]
async fn request_carries_selection_as_query_and_polygon_body() -> anyhow::Result<()> {
    common::init_tracing();
    let server = StubServer::start(vec![(
        report_route(),
        StubReply::Body(common::read_fixture("reports/good_coverage.json")),
    )])
    .await?;
    let client = common::endpoint_client(&server.base_url, DEFAULT_REPORT_TIMEOUT);
    let mut session = ready_session().await?;

    let pending = session.begin_submit(&client)?;
    assert!(session.finish_submit(client.execute(pending).await));
    assert_eq!(
        session.report().current().and_then(|report| report.traffic_light()),
        Some(TrafficLight::Green)
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    let (path, query) = request
        .target
        .split_once('?')
        .expect("query string present");
    assert_eq!(path, report_route());
    let mut params: Vec<&str> = query.split('&').collect();
    params.sort_unstable();
    assert_eq!(
        params,
        vec![
            "dataset=districts",
            "feature-id=heidelberg",
            "topic=building_count",
        ]
    );

    let body: serde_json::Value = serde_json::from_str(&request.body)?;
    assert_eq!(body["type"], "FeatureCollection");
    let features = body["features"].as_array().expect("features array");
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["geometry"]["type"], "Polygon");
    Ok(())
}

#[tokio::test]
async fn service_error_keeps_previous_report() -> anyhow::Result<()> {
    let good = StubServer::start(vec![(
        report_route(),
        StubReply::Body(common::read_fixture("reports/good_coverage.json")),
    )])
    .await?;
    let failing = StubServer::start(vec![(report_route(), StubReply::Status(503))]).await?;
    let mut session = ready_session().await?;

    let client = common::endpoint_client(&good.base_url, DEFAULT_REPORT_TIMEOUT);
    let pending = session.begin_submit(&client)?;
    session.finish_submit(client.execute(pending).await);
    let before = session.report().current().cloned();
    assert!(before.is_some());

    let client = common::endpoint_client(&failing.base_url, DEFAULT_REPORT_TIMEOUT);
    let pending = session.begin_submit(&client)?;
    let completed = client.execute(pending).await;
    assert!(matches!(
        completed.result,
        Err(ReportFetchFailure::Status { status: 503 })
    ));
    assert!(!session.finish_submit(completed));
    assert_eq!(session.report().current().cloned(), before);
    assert!(matches!(
        session.report().status(),
        ReportStatus::Failed { .. }
    ));
    assert!(session.flags().contains(ViewFlags::REPORT_READY));
    assert!(!client.lifecycle().current().is_in_flight());
    Ok(())
}

#[tokio::test]
async fn missing_dataset_never_reaches_the_service() -> anyhow::Result<()> {
    let server = StubServer::start(vec![(
        report_route(),
        StubReply::Body(common::read_fixture("reports/good_coverage.json")),
    )])
    .await?;
    let client = common::endpoint_client(&server.base_url, DEFAULT_REPORT_TIMEOUT);
    let mut session = common::fixture_session().await?;
    session.handle(UserEvent::MapClicked {
        lon: SINSHEIM.0,
        lat: SINSHEIM.1,
    });
    session.handle(UserEvent::NextTopic);

    let err = session.begin_submit(&client).expect_err("dataset missing");
    assert!(matches!(
        err,
        SubmitError::Validation(ValidationFailure::MissingDataset)
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.hits(), 0);
    Ok(())
}

#[tokio::test]
async fn rapid_double_submit_sends_one_request() -> anyhow::Result<()> {
    let server = StubServer::start(vec![(
        report_route(),
        StubReply::Delayed(
            Duration::from_millis(100),
            common::read_fixture("reports/good_coverage.json"),
        ),
    )])
    .await?;
    let client = common::endpoint_client(&server.base_url, DEFAULT_REPORT_TIMEOUT);
    let mut session = ready_session().await?;

    let first = session.begin_submit(&client)?;
    let second = session.begin_submit(&client);
    assert!(matches!(
        second,
        Err(SubmitError::Busy { request_id }) if request_id == first.request_id()
    ));

    assert!(session.finish_submit(client.execute(first).await));
    assert_eq!(server.hits(), 1);
    assert_eq!(session.report().status(), &ReportStatus::Ready);

    // The flag is free again once the outcome is applied.
    let third = session.begin_submit(&client)?;
    assert!(session.finish_submit(client.execute(third).await));
    assert_eq!(server.hits(), 2);
    Ok(())
}

#[tokio::test]
async fn slow_service_times_out() -> anyhow::Result<()> {
    let server = StubServer::start(vec![(
        report_route(),
        StubReply::Delayed(
            Duration::from_secs(5),
            common::read_fixture("reports/good_coverage.json"),
        ),
    )])
    .await?;
    let timeout = Duration::from_millis(150);
    let client = common::endpoint_client(&server.base_url, timeout);
    let mut session = ready_session().await?;

    let pending = session.begin_submit(&client)?;
    let completed = client.execute(pending).await;
    assert!(matches!(
        completed.result,
        Err(ReportFetchFailure::Timeout(limit)) if limit == timeout
    ));
    assert!(!session.finish_submit(completed));
    assert!(!session.flags().contains(ViewFlags::REQUEST_PENDING));
    assert!(session
        .notice()
        .is_some_and(|notice| notice.contains("timed out")));
    Ok(())
}

#[tokio::test]
async fn submit_in_one_call_returns_the_report() -> anyhow::Result<()> {
    let server = StubServer::start(vec![(
        report_route(),
        StubReply::Body(common::read_fixture("reports/good_coverage.json")),
    )])
    .await?;
    let client = common::endpoint_client(&server.base_url, DEFAULT_REPORT_TIMEOUT);
    let session = ready_session().await?;

    let report = client
        .submit(session.selection(), &common::heidelberg_box())
        .await?;
    assert_eq!(report.overall.label, TrafficLight::Green);
    assert_eq!(report.indicators.len(), 1);
    assert_eq!(report.indicators[0].metadata_name, "Building Completeness");
    Ok(())
}
