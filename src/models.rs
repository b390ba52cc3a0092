//! Data models for the briefing pack.
//!
//! This module contains the article table contract, the fixed category
//! domains and the query parameters that drive one report generation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// Delimiter joining multiple topics in the raw `topic` field.
pub const TOPIC_DELIMITER: &str = " | ";

/// Replacement for empty topic and location values.
pub const UNKNOWN_VALUE: &str = "Unknown";

/// Ordinal verdict per article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i8", from = "i8")]
pub enum BiasRating {
    Inconclusive,
    Unbiased,
    Biased,
    VeryBiased,
}

impl BiasRating {
    /// The fixed, ordered rating domain.
    pub const ALL: [BiasRating; 4] = [
        BiasRating::Inconclusive,
        BiasRating::Unbiased,
        BiasRating::Biased,
        BiasRating::VeryBiased,
    ];

    pub fn value(&self) -> i8 {
        match self {
            BiasRating::Inconclusive => -1,
            BiasRating::Unbiased => 0,
            BiasRating::Biased => 1,
            BiasRating::VeryBiased => 2,
        }
    }

    /// Parse a raw rating, returning `None` outside the domain.
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            -1 => Some(BiasRating::Inconclusive),
            0 => Some(BiasRating::Unbiased),
            1 => Some(BiasRating::Biased),
            2 => Some(BiasRating::VeryBiased),
            _ => None,
        }
    }

    /// Row key used by aggregation tables ("-1", "0", "1", "2").
    pub fn key(&self) -> String {
        self.value().to_string()
    }

    /// Biased or very biased.
    pub fn is_biased(&self) -> bool {
        matches!(self, BiasRating::Biased | BiasRating::VeryBiased)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BiasRating::Inconclusive => "Inconclusive",
            BiasRating::Unbiased => "Not Biased",
            BiasRating::Biased => "Biased",
            BiasRating::VeryBiased => "Very Biased",
        }
    }
}

impl From<BiasRating> for i8 {
    fn from(rating: BiasRating) -> Self {
        rating.value()
    }
}

impl From<i8> for BiasRating {
    fn from(value: i8) -> Self {
        BiasRating::from_value(value as i64).unwrap_or(BiasRating::Inconclusive)
    }
}

impl fmt::Display for BiasRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One of the five independent indicators of how an article is biased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasCategory {
    Generalisation,
    Prominence,
    NegativeBehaviour,
    Misrepresentation,
    HeadlineOrImagery,
}

impl BiasCategory {
    /// The fixed category domain, in table order.
    pub const ALL: [BiasCategory; 5] = [
        BiasCategory::Generalisation,
        BiasCategory::Prominence,
        BiasCategory::NegativeBehaviour,
        BiasCategory::Misrepresentation,
        BiasCategory::HeadlineOrImagery,
    ];

    pub fn index(&self) -> usize {
        match self {
            BiasCategory::Generalisation => 0,
            BiasCategory::Prominence => 1,
            BiasCategory::NegativeBehaviour => 2,
            BiasCategory::Misrepresentation => 3,
            BiasCategory::HeadlineOrImagery => 4,
        }
    }

    /// Column name in the article table.
    pub fn key(&self) -> &'static str {
        match self {
            BiasCategory::Generalisation => "generalisation",
            BiasCategory::Prominence => "prominence",
            BiasCategory::NegativeBehaviour => "negative_behaviour",
            BiasCategory::Misrepresentation => "misrepresentation",
            BiasCategory::HeadlineOrImagery => "headline_or_imagery",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        BiasCategory::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Display name used on charts and in narration.
    pub fn label(&self) -> &'static str {
        match self {
            BiasCategory::Generalisation => "Generalisation",
            BiasCategory::Prominence => "Omit Due Prominence",
            BiasCategory::NegativeBehaviour => "Negative Behaviour",
            BiasCategory::Misrepresentation => "Misrepresentation",
            BiasCategory::HeadlineOrImagery => "Headline",
        }
    }
}

impl fmt::Display for BiasCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Selection rule for one case-study subsection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CaseType {
    VeryBiased,
    Biased,
    Misrepresentation,
    DueProminence,
    NegativeBehaviour,
    Generalisation,
    ImageryAndHeadlines,
}

impl CaseType {
    /// Build order of the case-study subsections.
    pub const ALL: [CaseType; 7] = [
        CaseType::VeryBiased,
        CaseType::Biased,
        CaseType::Misrepresentation,
        CaseType::DueProminence,
        CaseType::NegativeBehaviour,
        CaseType::Generalisation,
        CaseType::ImageryAndHeadlines,
    ];

    /// Subsection key in the report schema.
    pub fn label(&self) -> &'static str {
        match self {
            CaseType::VeryBiased => "Very Biased",
            CaseType::Biased => "Biased",
            CaseType::Misrepresentation => "Misrepresentation",
            CaseType::DueProminence => "Due Prominence",
            CaseType::NegativeBehaviour => "Negative Behaviour",
            CaseType::Generalisation => "Generalisation",
            CaseType::ImageryAndHeadlines => "Imagery and Headlines",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        CaseType::ALL.into_iter().find(|c| c.label() == label)
    }

    /// The category a case tests, or `None` for the rating buckets.
    pub fn category(&self) -> Option<BiasCategory> {
        match self {
            CaseType::VeryBiased | CaseType::Biased => None,
            CaseType::Misrepresentation => Some(BiasCategory::Misrepresentation),
            CaseType::DueProminence => Some(BiasCategory::Prominence),
            CaseType::NegativeBehaviour => Some(BiasCategory::NegativeBehaviour),
            CaseType::Generalisation => Some(BiasCategory::Generalisation),
            CaseType::ImageryAndHeadlines => Some(BiasCategory::HeadlineOrImagery),
        }
    }

    pub fn is_rating_bucket(&self) -> bool {
        self.category().is_none()
    }

    /// Whether an article qualifies for this case.
    pub fn admits(&self, record: &ArticleRecord) -> bool {
        match (self, self.category()) {
            (CaseType::VeryBiased, _) => record.bias_rating == BiasRating::VeryBiased,
            (CaseType::Biased, _) => record.bias_rating == BiasRating::Biased,
            (_, Some(category)) => {
                record.bias_rating.is_biased()
                    && record.flag(category)
                    && record.severity(category).is_some()
            }
            (_, None) => false,
        }
    }

    /// Severity score used to rank qualifying articles.
    pub fn severity_of(&self, record: &ArticleRecord) -> Option<u8> {
        match self.category() {
            Some(category) => record.severity(category),
            None => record.max_severity(),
        }
    }
}

impl fmt::Display for CaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// How the five category columns are represented in the input rows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CategoryEncoding {
    /// 0/1 integers.
    #[default]
    Binary,
    /// Severity labels (NA, Very Low .. Very High) plus a `<category>_tag` flag.
    Ordinal,
}

/// Parse an ordinal severity label into a 1..=5 score; `None` is "not applicable".
pub fn parse_severity(label: &str) -> Option<u8> {
    let normalized = label.trim().to_uppercase().replace(['_', '-'], " ");
    match normalized.as_str() {
        "VERY LOW" => Some(1),
        "LOW" => Some(2),
        "MEDIUM" => Some(3),
        "HIGH" => Some(4),
        "VERY HIGH" => Some(5),
        _ => None,
    }
}

/// Article identifier as it appears in the raw table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Number(n) => write!(f, "{}", n),
            RawId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A bias-category cell: a 0/1 flag or an ordinal label.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawIndicator {
    Flag(i64),
    Label(String),
}

impl Default for RawIndicator {
    fn default() -> Self {
        RawIndicator::Flag(0)
    }
}

/// One row of the article table as delivered by the query layer.
#[derive(Debug, Clone, Deserialize)]
pub struct RawArticle {
    pub id: RawId,
    pub publisher: String,
    pub date_published: NaiveDate,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub text: String,
    pub bias_rating: i64,
    #[serde(default)]
    pub generalisation: RawIndicator,
    #[serde(default)]
    pub prominence: RawIndicator,
    #[serde(default)]
    pub negative_behaviour: RawIndicator,
    #[serde(default)]
    pub misrepresentation: RawIndicator,
    #[serde(default)]
    pub headline_or_imagery: RawIndicator,
    #[serde(default)]
    pub generalisation_tag: Option<u8>,
    #[serde(default)]
    pub prominence_tag: Option<u8>,
    #[serde(default)]
    pub negative_behaviour_tag: Option<u8>,
    #[serde(default)]
    pub misrepresentation_tag: Option<u8>,
    #[serde(default)]
    pub headline_or_imagery_tag: Option<u8>,
}

impl RawArticle {
    fn indicator(&self, category: BiasCategory) -> (&RawIndicator, Option<u8>) {
        match category {
            BiasCategory::Generalisation => (&self.generalisation, self.generalisation_tag),
            BiasCategory::Prominence => (&self.prominence, self.prominence_tag),
            BiasCategory::NegativeBehaviour => {
                (&self.negative_behaviour, self.negative_behaviour_tag)
            }
            BiasCategory::Misrepresentation => {
                (&self.misrepresentation, self.misrepresentation_tag)
            }
            BiasCategory::HeadlineOrImagery => {
                (&self.headline_or_imagery, self.headline_or_imagery_tag)
            }
        }
    }
}

/// Normalized state of one bias category on one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CategoryMark {
    /// Binary indicator used by every aggregation.
    pub flagged: bool,
    /// Severity score (1..=5); `None` means not applicable.
    pub severity: Option<u8>,
}

impl CategoryMark {
    fn from_raw(raw: &RawIndicator, tag: Option<u8>, encoding: CategoryEncoding) -> Self {
        match encoding {
            CategoryEncoding::Binary => {
                let flagged = match raw {
                    RawIndicator::Flag(n) => *n != 0,
                    RawIndicator::Label(s) => s.trim().parse::<i64>().map(|n| n != 0).unwrap_or(false),
                };
                Self {
                    flagged,
                    severity: flagged.then_some(1),
                }
            }
            CategoryEncoding::Ordinal => {
                let severity = match raw {
                    RawIndicator::Label(s) => parse_severity(s),
                    RawIndicator::Flag(n) if (1..=5).contains(n) => Some(*n as u8),
                    RawIndicator::Flag(_) => None,
                };
                let flagged = match tag {
                    Some(t) => t != 0,
                    None => severity.is_some(),
                };
                Self { flagged, severity }
            }
        }
    }
}

/// A normalized article row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleRecord {
    pub id: String,
    pub publisher: String,
    pub date_published: NaiveDate,
    pub title: String,
    pub url: String,
    pub location: String,
    /// Raw delimiter-joined topic field.
    pub topic: String,
    /// Exploded topics; never empty.
    pub topics: Vec<String>,
    pub text: String,
    pub bias_rating: BiasRating,
    pub marks: [CategoryMark; 5],
}

impl ArticleRecord {
    pub fn flag(&self, category: BiasCategory) -> bool {
        self.marks[category.index()].flagged
    }

    pub fn severity(&self, category: BiasCategory) -> Option<u8> {
        self.marks[category.index()].severity
    }

    /// Flagged categories in domain order.
    pub fn flagged_categories(&self) -> Vec<BiasCategory> {
        BiasCategory::ALL
            .into_iter()
            .filter(|c| self.flag(*c))
            .collect()
    }

    /// Highest severity across all categories.
    pub fn max_severity(&self) -> Option<u8> {
        self.marks.iter().filter_map(|m| m.severity).max()
    }
}

/// Split the raw topic field, mapping empty tokens to "Unknown".
pub fn split_topics(raw: &str) -> Vec<String> {
    raw.split(TOPIC_DELIMITER)
        .map(|t| {
            let t = t.trim();
            if t.is_empty() {
                UNKNOWN_VALUE.to_string()
            } else {
                t.to_string()
            }
        })
        .collect()
}

fn or_unknown(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        UNKNOWN_VALUE.to_string()
    } else {
        value.to_string()
    }
}

/// The article table with normalized categorical typing.
#[derive(Debug, Clone, Default)]
pub struct ArticleTable {
    records: Vec<ArticleRecord>,
}

impl ArticleTable {
    #[cfg(test)]
    pub fn new(records: Vec<ArticleRecord>) -> Self {
        Self { records }
    }

    /// Normalize raw rows under the given category encoding.
    pub fn from_raw(rows: Vec<RawArticle>, encoding: CategoryEncoding) -> Self {
        let mut out_of_domain = 0usize;
        let mut inconsistent = 0usize;

        let records: Vec<ArticleRecord> = rows
            .into_iter()
            .map(|row| {
                let bias_rating = BiasRating::from_value(row.bias_rating).unwrap_or_else(|| {
                    out_of_domain += 1;
                    BiasRating::Inconclusive
                });

                let marks = BiasCategory::ALL.map(|c| {
                    let (raw, tag) = row.indicator(c);
                    CategoryMark::from_raw(raw, tag, encoding)
                });

                if bias_rating.is_biased() && !marks.iter().any(|m| m.flagged) {
                    inconsistent += 1;
                }

                ArticleRecord {
                    id: row.id.to_string(),
                    topics: split_topics(&row.topic),
                    location: or_unknown(&row.location),
                    publisher: row.publisher,
                    date_published: row.date_published,
                    title: row.title,
                    url: row.url,
                    topic: row.topic,
                    text: row.text,
                    bias_rating,
                    marks,
                }
            })
            .collect();

        if out_of_domain > 0 {
            warn!(
                "{} articles had a bias rating outside -1..=2; treated as Inconclusive",
                out_of_domain
            );
        }
        if inconsistent > 0 {
            warn!(
                "{} biased articles carry no bias category indicator",
                inconsistent
            );
        }

        Self { records }
    }

    pub fn records(&self) -> &[ArticleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep only rows published inside the inclusive window.
    pub fn restrict_to_window(&mut self, start: NaiveDate, end: NaiveDate) {
        self.records
            .retain(|r| r.date_published >= start && r.date_published <= end);
    }

    /// Number of rows for one publisher.
    pub fn count_for(&self, publisher: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.publisher == publisher)
            .count()
    }
}

/// Parameters selected by the user for one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameters {
    pub selected_publisher: String,
    #[serde(default)]
    pub compared_publishers: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub bias_category: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl QueryParameters {
    /// Validate the parameter contract.
    pub fn validate(&self) -> Result<(), String> {
        if self.selected_publisher.trim().is_empty() {
            return Err("Selected publisher must not be empty".to_string());
        }

        if self.start_date > self.end_date {
            return Err(format!(
                "Start date {} is after end date {}",
                self.start_date, self.end_date
            ));
        }

        if self
            .compared_publishers
            .iter()
            .any(|p| p == &self.selected_publisher)
        {
            return Err(format!(
                "Selected publisher '{}' cannot also be a compared publisher",
                self.selected_publisher
            ));
        }

        let unique: HashSet<&String> = self.compared_publishers.iter().collect();
        if unique.len() != self.compared_publishers.len() {
            return Err("Compared publishers contain duplicates".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rating: i64, generalisation: RawIndicator) -> RawArticle {
        serde_json::from_value::<RawArticle>(serde_json::json!({
            "id": 7,
            "publisher": "X",
            "date_published": "2024-03-01",
            "bias_rating": rating,
            "topic": "Politics |  | Religion",
        }))
        .map(|mut r| {
            r.generalisation = generalisation;
            r
        })
        .unwrap()
    }

    #[test]
    fn test_rating_ordering_and_keys() {
        assert!(BiasRating::Inconclusive < BiasRating::Unbiased);
        assert!(BiasRating::Biased < BiasRating::VeryBiased);
        assert_eq!(BiasRating::Inconclusive.key(), "-1");
        assert_eq!(BiasRating::from_value(3), None);
    }

    #[test]
    fn test_category_keys_round_trip() {
        for category in BiasCategory::ALL {
            assert_eq!(BiasCategory::from_key(category.key()), Some(category));
        }
        assert_eq!(BiasCategory::from_key("tone"), None);
    }

    #[test]
    fn test_parse_severity_labels() {
        assert_eq!(parse_severity("Very High"), Some(5));
        assert_eq!(parse_severity("very_low"), Some(1));
        assert_eq!(parse_severity("NA"), None);
        assert_eq!(parse_severity(""), None);
    }

    #[test]
    fn test_split_topics_normalizes_empty() {
        assert_eq!(
            split_topics("Politics |  | Religion"),
            vec!["Politics", "Unknown", "Religion"]
        );
        assert_eq!(split_topics(""), vec!["Unknown"]);
    }

    #[test]
    fn test_from_raw_binary() {
        let table = ArticleTable::from_raw(
            vec![raw(1, RawIndicator::Flag(1))],
            CategoryEncoding::Binary,
        );
        let record = &table.records()[0];
        assert_eq!(record.id, "7");
        assert_eq!(record.location, "Unknown");
        assert!(record.flag(BiasCategory::Generalisation));
        assert_eq!(record.severity(BiasCategory::Generalisation), Some(1));
        assert!(!record.flag(BiasCategory::Prominence));
        assert_eq!(record.severity(BiasCategory::Prominence), None);
    }

    #[test]
    fn test_from_raw_ordinal_uses_tag() {
        let mut row = raw(2, RawIndicator::Label("High".to_string()));
        row.generalisation_tag = Some(0);
        row.misrepresentation = RawIndicator::Label("Low".to_string());

        let table = ArticleTable::from_raw(vec![row], CategoryEncoding::Ordinal);
        let record = &table.records()[0];
        assert!(!record.flag(BiasCategory::Generalisation));
        assert_eq!(record.severity(BiasCategory::Generalisation), Some(4));
        assert!(record.flag(BiasCategory::Misrepresentation));
        assert_eq!(record.max_severity(), Some(4));
    }

    #[test]
    fn test_out_of_domain_rating_is_tolerated() {
        let table = ArticleTable::from_raw(
            vec![raw(9, RawIndicator::Flag(0))],
            CategoryEncoding::Binary,
        );
        assert_eq!(table.records()[0].bias_rating, BiasRating::Inconclusive);
    }

    #[test]
    fn test_case_type_admission() {
        let mut row = raw(1, RawIndicator::Flag(1));
        row.prominence = RawIndicator::Flag(1);
        let table = ArticleTable::from_raw(vec![row], CategoryEncoding::Binary);
        let record = &table.records()[0];

        assert!(CaseType::Biased.admits(record));
        assert!(!CaseType::VeryBiased.admits(record));
        assert!(CaseType::Generalisation.admits(record));
        assert!(CaseType::DueProminence.admits(record));
        assert!(!CaseType::Misrepresentation.admits(record));
        assert_eq!(CaseType::from_label("Due Prominence"), Some(CaseType::DueProminence));
        assert!(CaseType::Biased.is_rating_bucket());
    }

    #[test]
    fn test_case_type_excludes_not_applicable_severity() {
        let mut row = raw(2, RawIndicator::Label("NA".to_string()));
        row.generalisation_tag = Some(1);

        let table = ArticleTable::from_raw(vec![row], CategoryEncoding::Ordinal);
        let record = &table.records()[0];
        assert!(record.flag(BiasCategory::Generalisation));
        assert!(!CaseType::Generalisation.admits(record));
        assert!(CaseType::VeryBiased.admits(record));
    }

    #[test]
    fn test_parameters_validation() {
        let mut params = QueryParameters {
            selected_publisher: "X".to_string(),
            compared_publishers: vec!["Y".to_string()],
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            bias_category: vec![],
            topics: vec![],
        };
        assert!(params.validate().is_ok());

        params.compared_publishers.push("X".to_string());
        assert!(params.validate().is_err());

        params.compared_publishers = vec![];
        params.start_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(params.validate().is_err());
    }
}
