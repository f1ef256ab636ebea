use serde::{Deserialize, Serialize};

/// Non-selectable first entry of the topic picker.
pub const PLACEHOLDER_TOPIC: &str = "Topic";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicOption {
    pub key: String,
    pub label: String,
}

impl TopicOption {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// Ordered picker options. Index 0 is always the placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCatalogue {
    options: Vec<TopicOption>,
}

impl TopicCatalogue {
    pub fn new(options: impl IntoIterator<Item = TopicOption>) -> Self {
        let mut all = vec![TopicOption::new(PLACEHOLDER_TOPIC, PLACEHOLDER_TOPIC)];
        all.extend(
            options
                .into_iter()
                .filter(|option| option.key != PLACEHOLDER_TOPIC),
        );
        Self { options: all }
    }

    pub fn options(&self) -> &[TopicOption] {
        &self.options
    }

    pub fn get(&self, index: usize) -> Option<&TopicOption> {
        self.options.get(index)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.len() <= 1
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.options.len()
    }

    pub fn previous_index(&self, index: usize) -> usize {
        (index + self.options.len() - 1) % self.options.len()
    }
}

impl Default for TopicCatalogue {
    fn default() -> Self {
        Self::new(default_topics())
    }
}

/// Topic keys understood by the report service.
pub fn default_topics() -> Vec<TopicOption> {
    vec![
        TopicOption::new("building_count", "Buildings"),
        TopicOption::new("major_roads_length", "Major roads"),
        TopicOption::new("amenities", "Amenities"),
        TopicOption::new("jrc_health_count", "Health facilities"),
        TopicOption::new("poi", "Points of interest"),
        TopicOption::new("lulc", "Land use and land cover"),
        TopicOption::new("infrastructure_lines", "Infrastructure lines"),
    ]
}
