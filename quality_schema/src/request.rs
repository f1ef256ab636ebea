use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Path segment in front of the report name: `<endpoint>/dynamic_report/<name>`.
pub const REPORT_ROUTE: &str = "dynamic_report";

/// Request body: a FeatureCollection holding exactly the selected polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<RequestFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestFeature {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[schemars(with = "serde_json::Value")]
    pub geometry: geojson::Geometry,
}

impl RequestBody {
    pub fn for_polygon(geometry: geojson::Geometry) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features: vec![RequestFeature {
                kind: "Feature".to_string(),
                properties: serde_json::Map::new(),
                geometry,
            }],
        }
    }
}

/// Topic and dataset selection, sent as query parameters next to the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportQuery {
    pub topic: String,
    pub dataset: String,
    #[serde(rename = "feature-id")]
    pub feature_id: String,
}

pub fn request_body_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(RequestBody)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_has_feature_collection_shape() {
        let geometry = geojson::Geometry::new(geojson::Value::Polygon(vec![vec![
            vec![8.67, 49.40],
            vec![8.69, 49.40],
            vec![8.69, 49.41],
            vec![8.67, 49.40],
        ]]));
        let body = RequestBody::for_polygon(geometry);
        let json = serde_json::to_value(&body).expect("body serializes");
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["features"][0]["type"], "Feature");
        assert_eq!(json["features"][0]["properties"], serde_json::json!({}));
        assert_eq!(json["features"][0]["geometry"]["type"], "Polygon");
    }

    #[test]
    fn query_uses_hyphenated_feature_id() {
        let query = ReportQuery {
            topic: "building_count".into(),
            dataset: "regions".into(),
            feature_id: "3".into(),
        };
        let json = serde_json::to_value(&query).expect("query serializes");
        assert_eq!(json["feature-id"], "3");
    }
}
