//! Area/topic/dataset selection and the submit gate derived from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::topics::PLACEHOLDER_TOPIC;

/// The area a user clicked on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRef {
    pub name: String,
    pub layer: String,
    /// Geometry of the clicked feature, sent as the report polygon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<geojson::Geometry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicRef(pub String);

impl TopicRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER_TOPIC
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub dataset_id: String,
    pub feature_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositeIdError {
    #[error("feature has no '{0}' property")]
    MissingProperty(String),
    #[error("composite id '{raw}' has no '{separator}' separator")]
    MissingSeparator { raw: String, separator: String },
    #[error("composite id '{0}' has an empty dataset part")]
    EmptyDataset(String),
    #[error("composite id '{0}' has an empty feature id part")]
    EmptyFeatureId(String),
}

impl DatasetRef {
    /// Split `<dataset><sep><feature id>` on the first separator. Both halves
    /// must be non-empty after trimming; the feature id may itself contain
    /// the separator.
    pub fn parse_composite(raw: &str, separator: &str) -> Result<Self, CompositeIdError> {
        let split = if separator.is_empty() {
            None
        } else {
            raw.split_once(separator)
        };
        let (dataset, feature) = split.ok_or_else(|| CompositeIdError::MissingSeparator {
            raw: raw.to_string(),
            separator: separator.to_string(),
        })?;
        let dataset = dataset.trim();
        let feature = feature.trim();
        if dataset.is_empty() {
            return Err(CompositeIdError::EmptyDataset(raw.to_string()));
        }
        if feature.is_empty() {
            return Err(CompositeIdError::EmptyFeatureId(raw.to_string()));
        }
        Ok(Self {
            dataset_id: dataset.to_string(),
            feature_id: feature.to_string(),
        })
    }
}

/// Everything the user has picked so far. Starts out empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    pub area: Option<AreaRef>,
    pub topic: Option<TopicRef>,
    pub dataset: Option<DatasetRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitColor {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enablement {
    pub submit_enabled: bool,
    pub submit_color: SubmitColor,
}

/// Submit is enabled once an area and a real (non-placeholder) topic are
/// chosen. The dataset is checked at submit time, not here.
pub fn enablement(state: &SelectionState) -> Enablement {
    let topic_chosen = state
        .topic
        .as_ref()
        .is_some_and(|topic| !topic.is_placeholder());
    let submit_enabled = state.area.is_some() && topic_chosen;
    Enablement {
        submit_enabled,
        submit_color: if submit_enabled {
            SubmitColor::Enabled
        } else {
            SubmitColor::Disabled
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    TopicChanged(TopicRef),
    /// A feature click. A new area always replaces the dataset, so an
    /// unparsable composite id leaves the dataset empty.
    AreaCommitted {
        area: AreaRef,
        dataset: Option<DatasetRef>,
    },
    /// Click on the map that hit no feature. Selection is kept; only the
    /// gate is re-evaluated.
    MapBackgroundClicked,
    Cleared,
}

impl SelectionState {
    pub fn apply(&mut self, event: SelectionEvent) -> Enablement {
        match event {
            SelectionEvent::TopicChanged(topic) => self.topic = Some(topic),
            SelectionEvent::AreaCommitted { area, dataset } => {
                self.area = Some(area);
                self.dataset = dataset;
            }
            SelectionEvent::MapBackgroundClicked => {}
            SelectionEvent::Cleared => {
                self.area = None;
                self.dataset = None;
            }
        }
        let gate = enablement(self);
        debug!(
            target: "quality::selection",
            area = ?self.area.as_ref().map(|area| area.name.as_str()),
            topic = ?self.topic.as_ref().map(TopicRef::key),
            dataset = ?self.dataset.as_ref().map(|dataset| dataset.dataset_id.as_str()),
            submit_enabled = gate.submit_enabled,
            "selection.updated"
        );
        gate
    }
}

/// Submit attempted without the selections a request needs. Shown to the
/// user; never escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("select a region")]
    MissingArea,
    #[error("select a topic")]
    MissingTopic,
    #[error("select a topic")]
    PlaceholderTopic,
    #[error("select a region")]
    MissingDataset,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> AreaRef {
        AreaRef {
            name: "Heidelberg".into(),
            layer: "regions".into(),
            geometry: None,
        }
    }

    fn dataset() -> DatasetRef {
        DatasetRef {
            dataset_id: "regions".into(),
            feature_id: "3".into(),
        }
    }

    #[test]
    fn gate_requires_area() {
        for topic in [None, Some(TopicRef::new("Topic")), Some(TopicRef::new("poi"))] {
            let state = SelectionState {
                area: None,
                topic,
                dataset: Some(dataset()),
            };
            assert!(!enablement(&state).submit_enabled);
            assert_eq!(enablement(&state).submit_color, SubmitColor::Disabled);
        }
    }

    #[test]
    fn gate_rejects_placeholder_topic() {
        let state = SelectionState {
            area: Some(area()),
            topic: Some(TopicRef::new(PLACEHOLDER_TOPIC)),
            dataset: Some(dataset()),
        };
        assert!(!enablement(&state).submit_enabled);
    }

    #[test]
    fn gate_ignores_dataset() {
        let mut state = SelectionState {
            area: Some(area()),
            topic: Some(TopicRef::new("building_count")),
            dataset: None,
        };
        let without = enablement(&state);
        state.dataset = Some(dataset());
        let with = enablement(&state);
        assert!(without.submit_enabled);
        assert_eq!(without, with);
        assert_eq!(with.submit_color, SubmitColor::Enabled);
    }

    #[test]
    fn events_drive_the_gate() {
        let mut state = SelectionState::default();
        assert!(!state
            .apply(SelectionEvent::TopicChanged(TopicRef::new("poi")))
            .submit_enabled);
        assert!(state
            .apply(SelectionEvent::AreaCommitted {
                area: area(),
                dataset: Some(dataset()),
            })
            .submit_enabled);
        assert!(state
            .apply(SelectionEvent::MapBackgroundClicked)
            .submit_enabled);
        assert!(!state
            .apply(SelectionEvent::TopicChanged(TopicRef::new("Topic")))
            .submit_enabled);
        state.apply(SelectionEvent::TopicChanged(TopicRef::new("poi")));
        assert!(!state.apply(SelectionEvent::Cleared).submit_enabled);
        assert_eq!(state.area, None);
        assert_eq!(state.dataset, None);
        assert_eq!(state.topic, Some(TopicRef::new("poi")));
    }

    #[test]
    fn new_area_replaces_dataset() {
        let mut state = SelectionState::default();
        state.apply(SelectionEvent::AreaCommitted {
            area: area(),
            dataset: Some(dataset()),
        });
        state.apply(SelectionEvent::AreaCommitted {
            area: area(),
            dataset: None,
        });
        assert_eq!(state.dataset, None);
    }

    #[test]
    fn composite_id_splits_on_first_separator() {
        let parsed = DatasetRef::parse_composite("gadm_level_1/DEU.1_1/x", "/").expect("valid");
        assert_eq!(parsed.dataset_id, "gadm_level_1");
        assert_eq!(parsed.feature_id, "DEU.1_1/x");
    }

    #[test]
    fn malformed_composite_ids_are_rejected() {
        assert!(matches!(
            DatasetRef::parse_composite("regions", "/"),
            Err(CompositeIdError::MissingSeparator { .. })
        ));
        assert_eq!(
            DatasetRef::parse_composite("/3", "/"),
            Err(CompositeIdError::EmptyDataset("/3".into()))
        );
        assert_eq!(
            DatasetRef::parse_composite("regions/ ", "/"),
            Err(CompositeIdError::EmptyFeatureId("regions/ ".into()))
        );
        assert!(matches!(
            DatasetRef::parse_composite("regions/3", ""),
            Err(CompositeIdError::MissingSeparator { .. })
        ));
    }

    #[test]
    fn selection_serializes() {
        let state = SelectionState {
            area: Some(area()),
            topic: Some(TopicRef::new("poi")),
            dataset: Some(dataset()),
        };
        let json = serde_json::to_string(&state).expect("serializes");
        let back: SelectionState = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, state);
    }
}
