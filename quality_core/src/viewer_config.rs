//! Configuration for the quality viewer.
//!
//! Loaded from `viewer_config.json`, with `QUALITY_VIEWER_CONFIG_PATH`
//! overriding the file location.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color_scale::{
    ColorScale, ColorScaleError, ColorStop, PatternFill, Rgb, DEFAULT_NO_DATA_SENTINEL,
};
use crate::layer_loader::LayerSpec;
use crate::layers::PropertyKeys;
use crate::report_client::ReportSource;
use crate::topics::{default_topics, TopicCatalogue, TopicOption};

pub const BUILTIN_VIEWER_CONFIG: &str = include_str!("data/viewer_config.json");
pub const VIEWER_CONFIG_ENV: &str = "QUALITY_VIEWER_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub layers: Vec<LayerSpec>,
    pub properties: PropertyKeys,
    pub color_scale: ColorScaleConfig,
    pub report: ReportConfig,
    pub topics: Vec<TopicOption>,
    pub fallback_polygon: geojson::Geometry,
    pub export_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            properties: PropertyKeys::default(),
            color_scale: ColorScaleConfig::default(),
            report: ReportConfig::default(),
            topics: default_topics(),
            fallback_polygon: default_fallback_polygon(),
            export_dir: PathBuf::from("exports"),
        }
    }
}

/// Bounding box over central Heidelberg.
pub fn default_fallback_polygon() -> geojson::Geometry {
    let (west, east) = (8.674092292785645, 8.695850372314453);
    let (south, north) = (49.40427147224242, 49.415552187316095);
    geojson::Geometry::new(geojson::Value::Polygon(vec![vec![
        vec![west, south],
        vec![east, south],
        vec![east, north],
        vec![west, north],
        vec![west, south],
    ]]))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScaleConfig {
    pub sentinel: f64,
    pub stops: Vec<ColorStop>,
    pub floor: Rgb,
    pub zero: Rgb,
    pub no_data: PatternFill,
}

impl Default for ColorScaleConfig {
    fn default() -> Self {
        let scale = ColorScale::default();
        Self {
            sentinel: DEFAULT_NO_DATA_SENTINEL,
            stops: scale.stops().to_vec(),
            floor: scale.floor_color(),
            zero: scale.zero_color(),
            no_data: scale.no_data_pattern(),
        }
    }
}

impl ColorScaleConfig {
    pub fn build(&self) -> Result<ColorScale, ColorScaleError> {
        ColorScale::new(
            self.sentinel,
            self.stops.clone(),
            self.floor,
            self.zero,
            self.no_data,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub endpoint: Option<String>,
    pub report_name: String,
    pub fixture: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            report_name: "minimal".to_string(),
            fixture: None,
            timeout_ms: 30_000,
        }
    }
}

impl ReportConfig {
    /// The live endpoint wins over a fixture when both are set.
    pub fn source(&self) -> Option<ReportSource> {
        match (&self.endpoint, &self.fixture) {
            (Some(base_url), _) => Some(ReportSource::Endpoint {
                base_url: base_url.clone(),
                report_name: self.report_name.clone(),
            }),
            (None, Some(path)) => Some(ReportSource::Fixture(path.clone())),
            (None, None) => None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Error)]
pub enum ViewerConfigError {
    #[error("failed to parse viewer config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read viewer config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid viewer config: {0}")]
    Invalid(String),
    #[error("invalid color scale: {0}")]
    ColorScale(#[from] ColorScaleError),
}

impl ViewerConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_VIEWER_CONFIG)
                .expect("builtin viewer config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ViewerConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ViewerConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ViewerConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn topic_catalogue(&self) -> TopicCatalogue {
        TopicCatalogue::new(self.topics.clone())
    }

    pub fn validate(&self) -> Result<(), ViewerConfigError> {
        if self.layers.is_empty() {
            return Err(ViewerConfigError::Invalid(
                "at least one layer must be configured".to_string(),
            ));
        }
        if let Some(spec) = self.layers.iter().find(|spec| spec.source.trim().is_empty()) {
            return Err(ViewerConfigError::Invalid(format!(
                "layer '{}' has no source",
                spec.name
            )));
        }
        self.color_scale.build()?;
        if self.report.source().is_none() {
            return Err(ViewerConfigError::Invalid(
                "report needs an endpoint or a fixture".to_string(),
            ));
        }
        if self.report.timeout_ms == 0 {
            return Err(ViewerConfigError::Invalid(
                "report timeout must be non-zero".to_string(),
            ));
        }
        if !matches!(
            self.fallback_polygon.value,
            geojson::Value::Polygon(_) | geojson::Value::MultiPolygon(_)
        ) {
            return Err(ViewerConfigError::Invalid(
                "fallback polygon must be a Polygon or MultiPolygon".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load the viewer configuration from the environment override, or the
/// builtin copy. Returns the file the config came from, if any.
pub fn load_viewer_config_from_env() -> (Arc<ViewerConfig>, Option<PathBuf>) {
    if let Some(path) = env::var(VIEWER_CONFIG_ENV).ok().map(PathBuf::from) {
        match ViewerConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "quality::config",
                    path = %path.display(),
                    "viewer_config.loaded=file"
                );
                return (Arc::new(config), Some(path));
            }
            Err(err) => {
                tracing::warn!(
                    target: "quality::config",
                    path = %path.display(),
                    error = %err,
                    "viewer_config.load_failed"
                );
            }
        }
    }

    let config = ViewerConfig::builtin();
    tracing::info!(target: "quality::config", "viewer_config.loaded=builtin");
    (config, None)
}
