mod common;

use common::{StubReply, StubServer};
use quality_core::{
    load_layers, ColorScale, FetchError, LayerManager, LayerSpec, LoadFailure, PropertyKeys,
};

#[tokio::test]
async fn layers_keep_configured_order() -> anyhow::Result<()> {
    common::init_tracing();
    let http = reqwest::Client::new();
    let loaded = load_layers(&http, &common::fixture_layers()).await?;
    let names: Vec<&str> = loaded.iter().map(|layer| layer.name.as_str()).collect();
    assert_eq!(names, vec!["regions", "districts"]);

    let manager = LayerManager::build(loaded, &ColorScale::default(), PropertyKeys::default());
    assert_eq!(manager.layers()[0].features.len(), 4);
    assert_eq!(manager.layers()[1].features.len(), 3);
    assert!(manager.layers().iter().all(|layer| layer.is_attached()));
    assert!(manager.bounds().is_some());
    Ok(())
}

#[tokio::test]
async fn missing_file_fails_the_whole_load() {
    let http = reqwest::Client::new();
    let mut specs = common::fixture_layers();
    specs.push(LayerSpec::new(
        "absent",
        common::fixture_path("layers")
            .join("absent.geojson")
            .display()
            .to_string(),
    ));

    match load_layers(&http, &specs).await {
        Err(LoadFailure::Layer {
            index, name, cause, ..
        }) => {
            assert_eq!(index, 2);
            assert_eq!(name, "absent");
            assert!(matches!(cause, FetchError::Io(_)));
        }
        other => panic!("expected a layer failure, got {other:?}"),
    }
}

#[tokio::test]
async fn http_layers_load_and_a_404_aborts() -> anyhow::Result<()> {
    let server = StubServer::start(vec![
        (
            "/layers/regions.geojson",
            StubReply::Body(common::read_fixture("layers/regions.geojson")),
        ),
        (
            "/layers/districts.geojson",
            StubReply::Body(common::read_fixture("layers/districts.geojson")),
        ),
    ])
    .await?;
    let http = reqwest::Client::new();

    let specs = vec![
        LayerSpec::new("regions", server.url("/layers/regions.geojson")),
        LayerSpec::new("districts", server.url("/layers/districts.geojson")),
    ];
    let loaded = load_layers(&http, &specs).await?;
    assert_eq!(loaded.len(), 2);

    let mut broken = specs.clone();
    broken.insert(1, LayerSpec::new("gone", server.url("/layers/gone.geojson")));
    match load_layers(&http, &broken).await {
        Err(LoadFailure::Layer { name, cause, .. }) => {
            assert_eq!(name, "gone");
            assert!(matches!(cause, FetchError::Status(404)));
        }
        other => panic!("expected a 404 failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn non_collection_document_fails_the_load() -> anyhow::Result<()> {
    let server = StubServer::start(vec![(
        "/layers/point.geojson",
        StubReply::Body(r#"{"type":"Point","coordinates":[8.6,49.4]}"#.to_string()),
    )])
    .await?;
    let http = reqwest::Client::new();
    let specs = vec![LayerSpec::new("point", server.url("/layers/point.geojson"))];
    let outcome = load_layers(&http, &specs).await;
    assert!(matches!(
        outcome,
        Err(LoadFailure::Layer {
            cause: FetchError::NotFeatureCollection("Geometry"),
            ..
        })
    ));
    Ok(())
}
