//! Map/layer manager.
//!
//! Built once from a [`LoadedLayers`] set. Owns every feature, its current
//! style and the info panel, and translates hover/click interaction into
//! style changes and selection commits.

use ahash::AHashMap;
use geo::{BoundingRect, Contains, MultiPolygon, Point, Rect};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::color_scale::{ColorScale, Fill, QualityValue};
use crate::layer_loader::LoadedLayers;
use crate::selection::{AreaRef, CompositeIdError, DatasetRef};

pub const DEFAULT_INFO_MESSAGE: &str = "Hover over an area";
pub const BASE_BORDER_WEIGHT: u8 = 1;
pub const HOVER_BORDER_WEIGHT: u8 = 3;

/// Which feature properties carry the name, the composite dataset/feature id
/// and the quality value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyKeys {
    pub name: String,
    pub composite_id: String,
    pub quality: String,
    pub separator: String,
}

impl Default for PropertyKeys {
    fn default() -> Self {
        Self {
            name: "name".to_string(),
            composite_id: "featureId".to_string(),
            quality: "qualityValue".to_string(),
            separator: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKey {
    pub layer: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureStyle {
    pub fill: Fill,
    pub border_weight: u8,
    /// Drawn above its neighbours while set.
    pub elevated: bool,
}

impl FeatureStyle {
    fn base(fill: Fill) -> Self {
        Self {
            fill,
            border_weight: BASE_BORDER_WEIGHT,
            elevated: false,
        }
    }

    fn emphasized(fill: Fill) -> Self {
        Self {
            fill,
            border_weight: HOVER_BORDER_WEIGHT,
            elevated: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapFeature {
    pub key: FeatureKey,
    pub name: Option<String>,
    pub composite_id: Option<String>,
    pub quality: QualityValue,
    pub fill: Fill,
    pub properties: serde_json::Map<String, JsonValue>,
    pub geometry: Option<geojson::Geometry>,
    shape: Option<MultiPolygon<f64>>,
}

impl MapFeature {
    /// Polygonal footprint used for drawing and hit-testing.
    pub fn shape(&self) -> Option<&MultiPolygon<f64>> {
        self.shape.as_ref()
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.composite_id.clone())
            .unwrap_or_else(|| format!("feature {}", self.key.index))
    }

    fn contains(&self, lon: f64, lat: f64) -> bool {
        self.shape
            .as_ref()
            .is_some_and(|shape| shape.contains(&Point::new(lon, lat)))
    }
}

#[derive(Debug, Clone)]
pub struct MapLayer {
    pub name: String,
    pub features: Vec<MapFeature>,
    attached: bool,
}

impl MapLayer {
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

/// Display-only panel fed by hover events.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoPanel {
    Idle(String),
    Feature {
        layer: String,
        name: String,
        quality: QualityValue,
        properties: Vec<(String, String)>,
    },
}

impl Default for InfoPanel {
    fn default() -> Self {
        InfoPanel::Idle(DEFAULT_INFO_MESSAGE.to_string())
    }
}

/// What a click on a feature commits to the selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureClick {
    pub key: FeatureKey,
    pub area: AreaRef,
    pub dataset: Result<DatasetRef, CompositeIdError>,
}

#[derive(Debug)]
pub struct LayerManager {
    layers: Vec<MapLayer>,
    styles: AHashMap<FeatureKey, FeatureStyle>,
    hovered: Option<FeatureKey>,
    info: InfoPanel,
    keys: PropertyKeys,
    bounds: Option<Rect<f64>>,
}

impl LayerManager {
    /// Construct the map from the complete layer set, coloring every feature
    /// with `scale`.
    pub fn build(loaded: LoadedLayers, scale: &ColorScale, keys: PropertyKeys) -> Self {
        let mut styles = AHashMap::new();
        let mut bounds: Option<Rect<f64>> = None;
        let mut layers = Vec::with_capacity(loaded.len());

        for (layer_index, loaded_layer) in loaded.into_inner().into_iter().enumerate() {
            let mut features = Vec::with_capacity(loaded_layer.collection.features.len());
            for (index, feature) in loaded_layer.collection.features.into_iter().enumerate() {
                let key = FeatureKey {
                    layer: layer_index,
                    index,
                };
                let properties = feature.properties.unwrap_or_default();
                let quality = match properties.get(&keys.quality).and_then(JsonValue::as_f64) {
                    Some(raw) => scale.classify(raw),
                    None => {
                        debug!(
                            target: "quality::layers",
                            layer = %loaded_layer.name,
                            index,
                            "layers.quality_missing"
                        );
                        QualityValue::NoData
                    }
                };
                let fill = scale.fill_for(quality);
                let shape = feature.geometry.as_ref().and_then(|geometry| {
                    footprint(geometry, &loaded_layer.name, index)
                });
                if let Some(rect) = shape.as_ref().and_then(|shape| shape.bounding_rect()) {
                    bounds = Some(match bounds {
                        Some(current) => merge_rects(current, rect),
                        None => rect,
                    });
                }
                styles.insert(key, FeatureStyle::base(fill));
                features.push(MapFeature {
                    key,
                    name: property_text(&properties, &keys.name),
                    composite_id: property_text(&properties, &keys.composite_id),
                    quality,
                    fill,
                    properties,
                    geometry: feature.geometry,
                    shape,
                });
            }
            info!(
                target: "quality::layers",
                layer = %loaded_layer.name,
                features = features.len(),
                "layers.attached"
            );
            layers.push(MapLayer {
                name: loaded_layer.name,
                features,
                attached: true,
            });
        }

        Self {
            layers,
            styles,
            hovered: None,
            info: InfoPanel::default(),
            keys,
            bounds,
        }
    }

    pub fn layers(&self) -> &[MapLayer] {
        &self.layers
    }

    pub fn feature(&self, key: FeatureKey) -> Option<&MapFeature> {
        self.layers
            .get(key.layer)
            .and_then(|layer| layer.features.get(key.index))
    }

    pub fn style(&self, key: FeatureKey) -> Option<FeatureStyle> {
        self.styles.get(&key).copied()
    }

    pub fn info(&self) -> &InfoPanel {
        &self.info
    }

    pub fn hovered(&self) -> Option<FeatureKey> {
        self.hovered
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    pub fn is_attached(&self, layer: usize) -> bool {
        self.layers.get(layer).is_some_and(MapLayer::is_attached)
    }

    /// Attach or detach a layer. Reattaching resets the layer's styles, so
    /// an emphasis left behind while it was detached does not resurface.
    pub fn set_attached(&mut self, layer: usize, attached: bool) -> bool {
        if self.layers.get(layer).map_or(true, |map_layer| map_layer.attached == attached) {
            return false;
        }
        // Detaching drops the hover so the info panel stops showing a hidden
        // feature.
        if let Some(hovered) = self.hovered.filter(|key| !attached && key.layer == layer) {
            self.hover_exit(hovered);
        }
        let map_layer = &mut self.layers[layer];
        map_layer.attached = attached;
        if attached {
            for feature in &map_layer.features {
                self.styles
                    .insert(feature.key, FeatureStyle::base(feature.fill));
            }
        }
        info!(
            target: "quality::layers",
            layer = %map_layer.name,
            attached,
            "layers.toggled"
        );
        true
    }

    pub fn toggle_layer(&mut self, layer: usize) -> Option<bool> {
        let attached = !self.layers.get(layer)?.attached;
        self.set_attached(layer, attached);
        Some(attached)
    }

    /// Emphasize `key` and publish its properties to the info panel.
    pub fn hover_enter(&mut self, key: FeatureKey) {
        if !self.is_attached(key.layer) {
            return;
        }
        if let Some(previous) = self.hovered.filter(|previous| *previous != key) {
            self.hover_exit(previous);
        }
        let Some(feature) = self.feature(key) else {
            return;
        };
        let info = InfoPanel::Feature {
            layer: self.layers[key.layer].name.clone(),
            name: feature.display_name(),
            quality: feature.quality,
            properties: feature
                .properties
                .iter()
                .map(|(name, value)| (name.clone(), property_display(value)))
                .collect(),
        };
        let style = FeatureStyle::emphasized(feature.fill);
        self.styles.insert(key, style);
        self.hovered = Some(key);
        self.info = info;
    }

    /// Revert emphasis and restore the default info message. The style reset
    /// is skipped when the feature's layer is no longer attached.
    pub fn hover_exit(&mut self, key: FeatureKey) {
        if self.hovered == Some(key) {
            self.hovered = None;
            self.info = InfoPanel::default();
        }
        if !self.is_attached(key.layer) {
            debug!(
                target: "quality::layers",
                layer = key.layer,
                index = key.index,
                "layers.hover_exit_detached"
            );
            return;
        }
        if let Some(feature) = self.feature(key) {
            let fill = feature.fill;
            self.styles.insert(key, FeatureStyle::base(fill));
        }
    }

    /// Pointer moved to `(lon, lat)`: fire exit/enter for the feature change.
    pub fn pointer_moved(&mut self, lon: f64, lat: f64) -> Option<FeatureKey> {
        let target = self.feature_at(lon, lat);
        if target != self.hovered {
            if let Some(previous) = self.hovered {
                self.hover_exit(previous);
            }
            if let Some(next) = target {
                self.hover_enter(next);
            }
        }
        target
    }

    pub fn pointer_left(&mut self) {
        if let Some(previous) = self.hovered {
            self.hover_exit(previous);
        }
    }

    /// Topmost attached feature under the point. Later layers draw above
    /// earlier ones.
    pub fn feature_at(&self, lon: f64, lat: f64) -> Option<FeatureKey> {
        self.layers
            .iter()
            .rev()
            .filter(|layer| layer.attached)
            .flat_map(|layer| layer.features.iter().rev())
            .find(|feature| feature.contains(lon, lat))
            .map(|feature| feature.key)
    }

    /// Resolve a click on `key` into the area and dataset it commits. `None`
    /// when the key is unknown or its layer is detached.
    pub fn click(&self, key: FeatureKey) -> Option<FeatureClick> {
        if !self.is_attached(key.layer) {
            return None;
        }
        let feature = self.feature(key)?;
        let area = AreaRef {
            name: feature.display_name(),
            layer: self.layers[key.layer].name.clone(),
            geometry: feature.geometry.clone(),
        };
        let dataset = match feature.composite_id.as_deref() {
            Some(raw) => DatasetRef::parse_composite(raw, &self.keys.separator),
            None => Err(CompositeIdError::MissingProperty(
                self.keys.composite_id.clone(),
            )),
        };
        if let Err(err) = &dataset {
            warn!(
                target: "quality::layers",
                area = %area.name,
                error = %err,
                "layers.composite_id_invalid"
            );
        }
        Some(FeatureClick { key, area, dataset })
    }

    /// Features of attached layers in paint order, emphasized ones last.
    pub fn paint_order(&self) -> Vec<(&MapFeature, FeatureStyle)> {
        let mut ordered: Vec<(&MapFeature, FeatureStyle)> = self
            .layers
            .iter()
            .filter(|layer| layer.attached)
            .flat_map(|layer| layer.features.iter())
            .filter_map(|feature| self.style(feature.key).map(|style| (feature, style)))
            .collect();
        ordered.sort_by_key(|(_, style)| style.elevated);
        ordered
    }
}

fn footprint(
    geometry: &geojson::Geometry,
    layer: &str,
    index: usize,
) -> Option<MultiPolygon<f64>> {
    match geo::Geometry::<f64>::try_from(geometry.value.clone()) {
        Ok(geo::Geometry::Polygon(polygon)) => Some(MultiPolygon(vec![polygon])),
        Ok(geo::Geometry::MultiPolygon(multi)) => Some(multi),
        Ok(_) => None,
        Err(err) => {
            warn!(
                target: "quality::layers",
                layer,
                index,
                error = %err,
                "layers.geometry_unusable"
            );
            None
        }
    }
}

fn merge_rects(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        geo::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
        geo::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
    )
}

fn property_text(properties: &serde_json::Map<String, JsonValue>, key: &str) -> Option<String> {
    match properties.get(key)? {
        JsonValue::String(text) if !text.trim().is_empty() => Some(text.clone()),
        JsonValue::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn property_display(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        JsonValue::Null => "-".to_string(),
        other => other.to_string(),
    }
}
