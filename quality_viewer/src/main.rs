use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use quality_core::{
    load_layers, load_viewer_config_from_env, CompletedReport, LayerManager, LayerSpec,
    LogForwardLayer, PendingReport, ReportClient, ViewerConfig, ViewerSession,
};
use tokio::sync::mpsc::unbounded_channel;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod app;
mod map_view;
mod ui;

use app::ViewerApp;

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal viewer for area quality reports", long_about = None)]
struct Cli {
    /// Viewer config file; defaults to $QUALITY_VIEWER_CONFIG_PATH or the builtin config.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Base URL of the report service. Replaces any configured fixture.
    #[arg(long)]
    endpoint: Option<String>,
    /// Serve reports from a static response document instead of the service.
    #[arg(long, conflicts_with = "endpoint")]
    report_fixture: Option<PathBuf>,
    /// Report name appended to `<endpoint>/dynamic_report/`, e.g. `minimal`,
    /// `multilevel_mapping_saturation` or `multilevel_currentness`.
    #[arg(long)]
    report_name: Option<String>,
    /// Map layer as `name=source`; repeat to replace the configured layers.
    #[arg(long = "layer", value_parser = parse_layer)]
    layers: Vec<LayerSpec>,
    /// Report request timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Directory exported reports are written to.
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

fn parse_layer(text: &str) -> Result<LayerSpec, String> {
    let (name, source) = text
        .split_once('=')
        .ok_or_else(|| format!("expected name=source, got '{text}'"))?;
    if name.trim().is_empty() || source.trim().is_empty() {
        return Err(format!("expected name=source, got '{text}'"));
    }
    Ok(LayerSpec::new(name.trim(), source.trim()))
}

fn resolve_config(cli: &Cli) -> Result<ViewerConfig> {
    let mut config = match &cli.config {
        Some(path) => ViewerConfig::from_file(path)
            .wrap_err_with(|| format!("loading viewer config {}", path.display()))?,
        None => (*load_viewer_config_from_env().0).clone(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.report.endpoint = Some(endpoint.clone());
        config.report.fixture = None;
    }
    if let Some(fixture) = &cli.report_fixture {
        config.report.fixture = Some(fixture.clone());
        config.report.endpoint = None;
    }
    if let Some(name) = &cli.report_name {
        config.report.report_name = name.clone();
    }
    if !cli.layers.is_empty() {
        config.layers = cli.layers.clone();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.report.timeout_ms = timeout_ms;
    }
    if let Some(dir) = &cli.export_dir {
        config.export_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (log_layer, log_rx) = LogForwardLayer::channel();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(log_layer)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let scale = config.color_scale.build()?;
    let source = config
        .report
        .source()
        .ok_or_else(|| eyre!("report needs an endpoint or a fixture"))?;

    let http = reqwest::Client::new();
    // Any failed layer aborts startup; no partial map is built.
    let loaded = load_layers(&http, &config.layers).await?;
    let layers = LayerManager::build(loaded, &scale, config.properties.clone());
    let session = ViewerSession::new(
        layers,
        config.topic_catalogue(),
        config.fallback_polygon.clone(),
    );
    let client = ReportClient::new(http, source, config.report.timeout());
    info!(target: "quality::report", source = %client.source(), "viewer.ready");

    let (job_tx, mut job_rx) = unbounded_channel::<PendingReport>();
    let (completed_tx, completed_rx) = unbounded_channel::<CompletedReport>();
    let ui_client = client.clone();
    let export_dir = config.export_dir.clone();
    let ui_handle = std::thread::spawn(move || -> Result<()> {
        let app = ViewerApp::new(session, ui_client, job_tx, completed_rx, log_rx, export_dir)?;
        app.run()
    });

    // Ends once the UI thread drops its job sender.
    while let Some(pending) = job_rx.recv().await {
        let client = client.clone();
        let completed_tx = completed_tx.clone();
        tokio::spawn(async move {
            let completed = client.execute(pending).await;
            let _ = completed_tx.send(completed);
        });
    }

    ui_handle
        .join()
        .map_err(|_| eyre!("viewer UI thread panicked"))??;
    info!("Viewer shut down");
    Ok(())
}
