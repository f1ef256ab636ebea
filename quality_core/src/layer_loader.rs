//! Startup loader for the map's GeoJSON layers.
//!
//! Every layer is fetched concurrently; the returned [`LoadedLayers`] only
//! exists once all of them resolved, in the order they were configured. One
//! failed layer fails the whole load.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use geojson::{FeatureCollection, GeoJson};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A configured layer: display name plus where to fetch it from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    pub source: String,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSource {
    Http(String),
    File(PathBuf),
}

impl LayerSource {
    /// `http(s)://` is fetched over the network; `file://` and bare paths are
    /// read from disk.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            LayerSource::Http(trimmed.to_string())
        } else if let Some(path) = trimmed.strip_prefix("file://") {
            LayerSource::File(PathBuf::from(path))
        } else {
            LayerSource::File(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for LayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerSource::Http(url) => f.write_str(url),
            LayerSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("document is not valid GeoJSON: {0}")]
    Parse(#[from] geojson::Error),
    #[error("document is a {0}, expected a FeatureCollection")]
    NotFeatureCollection(&'static str),
}

#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error("failed to load layer '{name}' from {location}: {cause}")]
    Layer {
        index: usize,
        name: String,
        location: String,
        #[source]
        cause: FetchError,
    },
    #[error("layer loader task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct LoadedLayer {
    pub name: String,
    pub source: LayerSource,
    pub collection: FeatureCollection,
}

/// The complete layer set. Only produced by the loader, after every layer
/// arrived, so holding one means the join barrier has been passed.
#[derive(Debug, Clone)]
pub struct LoadedLayers {
    layers: Vec<LoadedLayer>,
}

impl LoadedLayers {
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedLayer> {
        self.layers.iter()
    }

    pub fn into_inner(self) -> Vec<LoadedLayer> {
        self.layers
    }

    #[cfg(test)]
    pub(crate) fn from_layers(layers: Vec<LoadedLayer>) -> Self {
        Self { layers }
    }
}

/// Load every layer with a shared HTTP client.
pub async fn load_layers(
    client: &reqwest::Client,
    specs: &[LayerSpec],
) -> Result<LoadedLayers, LoadFailure> {
    let client = client.clone();
    load_layers_with(specs, move |source| {
        let client = client.clone();
        async move { fetch_source(&client, source).await }
    })
    .await
}

/// Fan out one fetch per layer and wait for all of them.
///
/// `fetch` returns the raw document text; parsing happens inside the layer
/// task so a malformed document fails the load the same way a transport
/// error does.
pub async fn load_layers_with<F, Fut>(
    specs: &[LayerSpec],
    fetch: F,
) -> Result<LoadedLayers, LoadFailure>
where
    F: Fn(LayerSource) -> Fut,
    Fut: Future<Output = Result<String, FetchError>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for (index, spec) in specs.iter().enumerate() {
        let source = LayerSource::parse(&spec.source);
        debug!(
            target: "quality::layers",
            index,
            layer = %spec.name,
            source = %source,
            "layers.fetch_started"
        );
        let pending = fetch(source);
        tasks.spawn(async move { (index, pending.await.and_then(|text| parse_collection(&text))) });
    }

    let mut slots: Vec<Option<FeatureCollection>> = vec![None; specs.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = joined?;
        let spec = &specs[index];
        match outcome {
            Ok(collection) => {
                debug!(
                    target: "quality::layers",
                    index,
                    layer = %spec.name,
                    features = collection.features.len(),
                    "layers.fetch_completed"
                );
                slots[index] = Some(collection);
            }
            Err(cause) => {
                warn!(
                    target: "quality::layers",
                    index,
                    layer = %spec.name,
                    error = %cause,
                    "layers.load_failed"
                );
                // Dropping the JoinSet aborts the layers still in flight.
                return Err(LoadFailure::Layer {
                    index,
                    name: spec.name.clone(),
                    location: spec.source.clone(),
                    cause,
                });
            }
        }
    }

    let layers = specs
        .iter()
        .zip(slots)
        .filter_map(|(spec, slot)| {
            slot.map(|collection| LoadedLayer {
                name: spec.name.clone(),
                source: LayerSource::parse(&spec.source),
                collection,
            })
        })
        .collect::<Vec<_>>();
    info!(target: "quality::layers", count = layers.len(), "layers.loaded");
    Ok(LoadedLayers { layers })
}

pub async fn fetch_source(
    client: &reqwest::Client,
    source: LayerSource,
) -> Result<String, FetchError> {
    match source {
        LayerSource::Http(url) => {
            let response = client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            Ok(response.text().await?)
        }
        LayerSource::File(path) => Ok(tokio::fs::read_to_string(&path).await?),
    }
}

pub fn parse_collection(text: &str) -> Result<FeatureCollection, FetchError> {
    match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        GeoJson::Feature(_) => Err(FetchError::NotFeatureCollection("Feature")),
        GeoJson::Geometry(_) => Err(FetchError::NotFeatureCollection("Geometry")),
    }
}
