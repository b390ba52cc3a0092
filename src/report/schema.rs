//! The nested report schema handed to the slide writer.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{ReportError, ReportResult};

/// A case-study entry: article title plus narration bullets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseStudyEntry {
    pub title: String,
    pub bullets: String,
}

/// Payload of one subsection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SectionPayload {
    Chart {
        title: String,
        chart_title: String,
        chart_filepath: String,
        bullets: String,
    },
    /// Empty when no article qualified.
    CaseStudies(Vec<CaseStudyEntry>),
}

/// Schema fragment produced by one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ComponentSchema {
    Text { title: String, text: String },
    Sections(IndexMap<String, SectionPayload>),
}

impl ComponentSchema {
    #[cfg(test)]
    pub fn section(&self, key: &str) -> Option<&SectionPayload> {
        match self {
            ComponentSchema::Sections(sections) => sections.get(key),
            ComponentSchema::Text { .. } => None,
        }
    }
}

/// Ordered component name → fragment mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReportSchema(IndexMap<String, ComponentSchema>);

impl ReportSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one component fragment; component names never overwrite.
    pub fn insert(&mut self, name: &str, fragment: ComponentSchema) -> ReportResult<()> {
        if self.0.contains_key(name) {
            return Err(ReportError::DuplicateComponent(name.to_string()));
        }
        self.0.insert(name.to_string(), fragment);
        Ok(())
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&ComponentSchema> {
        self.0.get(name)
    }

    pub fn components(&self) -> impl Iterator<Item = (&str, &ComponentSchema)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> ReportResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let mut sections = IndexMap::new();
        sections.insert(
            "bias_rating".to_string(),
            SectionPayload::Chart {
                title: "Analysis of Bias Ratings".to_string(),
                chart_title: String::new(),
                chart_filepath: "tmp/bias_rating.json".to_string(),
                bullets: "one".to_string(),
            },
        );
        sections.insert("Biased".to_string(), SectionPayload::CaseStudies(vec![]));

        let mut schema = ReportSchema::new();
        schema
            .insert(
                "Methodology",
                ComponentSchema::Text {
                    title: "Methodology".to_string(),
                    text: "text".to_string(),
                },
            )
            .unwrap();
        schema
            .insert("Publisher Performance Overview", ComponentSchema::Sections(sections))
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&schema.to_json().unwrap()).unwrap();
        assert_eq!(json["Methodology"]["text"], "text");
        assert_eq!(
            json["Publisher Performance Overview"]["bias_rating"]["chart_filepath"],
            "tmp/bias_rating.json"
        );
        assert_eq!(json["Publisher Performance Overview"]["Biased"], serde_json::json!([]));

        let names: Vec<&str> = schema.components().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Methodology", "Publisher Performance Overview"]);
    }

    #[test]
    fn test_duplicate_component_is_rejected() {
        let mut schema = ReportSchema::new();
        assert!(schema.is_empty());
        let fragment = ComponentSchema::Text {
            title: "Conclusions".to_string(),
            text: String::new(),
        };
        schema.insert("Conclusions", fragment.clone()).unwrap();
        assert!(matches!(
            schema.insert("Conclusions", fragment),
            Err(ReportError::DuplicateComponent(_))
        ));
    }
}
