//! Category aggregation over the article table.
//!
//! Every operation is deterministic and side-effect free: counts per
//! dimension, cross-tabulations of two dimensions and odds ratios of a
//! selected publisher against the pooled compared publishers.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::analysis::fisher::{fisher_exact, Contingency};
use crate::analysis::tables::{CountRow, CountTable, CrossTab, OddsRow, OddsTable};
use crate::error::{ReportError, ReportResult};
use crate::models::{ArticleRecord, ArticleTable, BiasCategory, BiasRating};

/// Label of the pooled compared-publisher group.
pub const OTHERS_LABEL: &str = "Others";

/// Key of the synthesized biased-or-very-biased odds row.
pub const BIASED_OR_VERY_BIASED_KEY: &str = "1+2";

/// A categorical dimension of the article table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Location,
    BiasRating,
    BiasCategory,
    Topic,
}

impl Dimension {
    pub fn key(&self) -> &'static str {
        match self {
            Dimension::Location => "location",
            Dimension::BiasRating => "bias_rating",
            Dimension::BiasCategory => "bias_category",
            Dimension::Topic => "topic",
        }
    }

    /// "Bias Rating", "Topic", ...
    pub fn title(&self) -> &'static str {
        match self {
            Dimension::Location => "Location",
            Dimension::BiasRating => "Bias Rating",
            Dimension::BiasCategory => "Bias Category",
            Dimension::Topic => "Topic",
        }
    }

    /// Fixed value domain, or `None` when values are taken from the data.
    fn fixed_domain(&self) -> Option<Vec<String>> {
        match self {
            Dimension::BiasRating => Some(BiasRating::ALL.iter().map(|r| r.key()).collect()),
            Dimension::BiasCategory => Some(
                BiasCategory::ALL
                    .iter()
                    .map(|c| c.key().to_string())
                    .collect(),
            ),
            Dimension::Location | Dimension::Topic => None,
        }
    }

    /// Weighted values one article contributes along this dimension.
    ///
    /// Topics explode into one entry per topic; bias categories melt into
    /// one entry per category weighted by the indicator.
    fn contributions(&self, record: &ArticleRecord) -> Vec<(String, u64)> {
        match self {
            Dimension::Location => vec![(record.location.clone(), 1)],
            Dimension::BiasRating => vec![(record.bias_rating.key(), 1)],
            Dimension::Topic => record.topics.iter().map(|t| (t.clone(), 1)).collect(),
            Dimension::BiasCategory => BiasCategory::ALL
                .iter()
                .map(|c| (c.key().to_string(), u64::from(record.flag(*c))))
                .collect(),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Dimension {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "location" => Ok(Dimension::Location),
            "bias_rating" => Ok(Dimension::BiasRating),
            "bias_category" => Ok(Dimension::BiasCategory),
            "topic" => Ok(Dimension::Topic),
            other => Err(ReportError::UnknownDimension(other.to_string())),
        }
    }
}

/// Which publishers an aggregation is computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherSelection {
    Single(String),
    /// Several publishers pooled under the "Others" label.
    Group(Vec<String>),
}

impl PublisherSelection {
    pub fn label(&self) -> &str {
        match self {
            PublisherSelection::Single(p) => p,
            PublisherSelection::Group(_) => OTHERS_LABEL,
        }
    }

    pub fn contains(&self, publisher: &str) -> bool {
        match self {
            PublisherSelection::Single(p) => p == publisher,
            PublisherSelection::Group(ps) => ps.iter().any(|p| p == publisher),
        }
    }
}

impl From<&str> for PublisherSelection {
    fn from(publisher: &str) -> Self {
        PublisherSelection::Single(publisher.to_string())
    }
}

/// Aggregation engine bound to one article table.
#[derive(Debug, Clone)]
pub struct Aggregator {
    table: ArticleTable,
}

impl Aggregator {
    pub fn new(table: ArticleTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ArticleTable {
        &self.table
    }

    /// Rows for the selection, optionally restricted to rating >= 1.
    pub fn subset(&self, publishers: &PublisherSelection, biased_only: bool) -> Vec<&ArticleRecord> {
        self.table
            .records()
            .iter()
            .filter(|r| publishers.contains(&r.publisher))
            .filter(|r| !biased_only || r.bias_rating.is_biased())
            .collect()
    }

    /// Counts per value of one dimension.
    pub fn count_1d(&self, publishers: &PublisherSelection, dimension: &str) -> ReportResult<CountTable> {
        let dimension: Dimension = dimension.parse()?;
        Ok(count_rows(&self.subset(publishers, false), dimension))
    }

    /// Same as [`Aggregator::count_1d`] over biased and very biased articles only.
    pub fn count_1d_biased(
        &self,
        publishers: &PublisherSelection,
        dimension: &str,
    ) -> ReportResult<CountTable> {
        let dimension: Dimension = dimension.parse()?;
        Ok(count_rows(&self.subset(publishers, true), dimension))
    }

    /// Cross-tabulation with `dim1` on rows and `dim2` on columns.
    pub fn count_2d(
        &self,
        publishers: &PublisherSelection,
        dim1: &str,
        dim2: &str,
    ) -> ReportResult<CrossTab> {
        let (d1, d2) = parse_pair(dim1, dim2)?;
        Ok(cross_rows(&self.subset(publishers, false), d1, d2))
    }

    /// Same as [`Aggregator::count_2d`] over biased and very biased articles only.
    #[allow(dead_code)] // Aggregation API; performance charts cross the full subset
    pub fn count_2d_biased(
        &self,
        publishers: &PublisherSelection,
        dim1: &str,
        dim2: &str,
    ) -> ReportResult<CrossTab> {
        let (d1, d2) = parse_pair(dim1, dim2)?;
        Ok(cross_rows(&self.subset(publishers, true), d1, d2))
    }

    /// Odds of the selected publisher against the pooled compared publishers.
    pub fn tendency(
        &self,
        selected: &str,
        compared: &[String],
        dimension: &str,
    ) -> ReportResult<OddsTable> {
        let dimension: Dimension = dimension.parse()?;
        let indicators = indicator_rows(dimension)?;

        let mut records: Vec<&ArticleRecord> = self
            .table
            .records()
            .iter()
            .filter(|r| r.publisher == selected || compared.iter().any(|c| c == &r.publisher))
            .collect();

        if dimension == Dimension::BiasRating {
            records.retain(|r| r.bias_rating != BiasRating::Inconclusive);
        }

        let mut rows = Vec::with_capacity(indicators.len());
        for (value, indicator) in indicators {
            let mut table = Contingency {
                others_negative: 0,
                others_positive: 0,
                selected_negative: 0,
                selected_positive: 0,
            };

            for record in &records {
                let positive = indicator(record);
                match (record.publisher == selected, positive) {
                    (false, false) => table.others_negative += 1,
                    (false, true) => table.others_positive += 1,
                    (true, false) => table.selected_negative += 1,
                    (true, true) => table.selected_positive += 1,
                }
            }

            let result = fisher_exact(&table).map_err(|e| match e {
                ReportError::InsufficientData(msg) => ReportError::InsufficientData(format!(
                    "{} = {} for {} vs {}: {}",
                    dimension,
                    value,
                    selected,
                    OTHERS_LABEL,
                    msg
                )),
                other => other,
            })?;

            rows.push(OddsRow {
                value,
                odds_ratio: result.odds_ratio,
                p_value: result.p_value,
                count: table.selected_positive,
            });
        }

        Ok(OddsTable { dimension, rows })
    }
}

type Indicator = Box<dyn Fn(&ArticleRecord) -> bool>;

/// Value rows of an odds table and the indicator each one tests.
fn indicator_rows(dimension: Dimension) -> ReportResult<Vec<(String, Indicator)>> {
    match dimension {
        Dimension::BiasRating => {
            let mut rows: Vec<(String, Indicator)> = [
                BiasRating::Unbiased,
                BiasRating::Biased,
                BiasRating::VeryBiased,
            ]
            .into_iter()
            .map(|rating| {
                let indicator: Indicator = Box::new(move |r: &ArticleRecord| r.bias_rating == rating);
                (rating.key(), indicator)
            })
            .collect();
            rows.push((
                BIASED_OR_VERY_BIASED_KEY.to_string(),
                Box::new(|r: &ArticleRecord| r.bias_rating.is_biased()),
            ));
            Ok(rows)
        }
        Dimension::BiasCategory => Ok(BiasCategory::ALL
            .into_iter()
            .map(|category| {
                let indicator: Indicator = Box::new(move |r: &ArticleRecord| r.flag(category));
                (category.key().to_string(), indicator)
            })
            .collect()),
        other => Err(ReportError::UnknownDimension(format!(
            "{} (tendency supports bias_rating and bias_category)",
            other
        ))),
    }
}

fn parse_pair(dim1: &str, dim2: &str) -> ReportResult<(Dimension, Dimension)> {
    let d1: Dimension = dim1.parse()?;
    let d2: Dimension = dim2.parse()?;
    if d1 == Dimension::BiasCategory && d2 == Dimension::BiasCategory {
        return Err(ReportError::UnknownDimension(
            "bias_category cannot be crossed with itself".to_string(),
        ));
    }
    Ok((d1, d2))
}

/// Ordered value keys: the fixed domain, or observed values sorted.
fn value_keys(records: &[&ArticleRecord], dimension: Dimension) -> Vec<String> {
    dimension.fixed_domain().unwrap_or_else(|| {
        records
            .iter()
            .flat_map(|r| dimension.contributions(r))
            .map(|(key, _)| key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    })
}

fn count_rows(records: &[&ArticleRecord], dimension: Dimension) -> CountTable {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        for (key, weight) in dimension.contributions(record) {
            *counts.entry(key).or_default() += weight;
        }
    }

    let rows = value_keys(records, dimension)
        .into_iter()
        .map(|value| CountRow {
            count: counts.get(&value).copied().unwrap_or(0),
            value,
        })
        .collect();

    let vb = records
        .iter()
        .filter(|r| r.bias_rating == BiasRating::VeryBiased)
        .count() as u64;
    let b = records
        .iter()
        .filter(|r| r.bias_rating == BiasRating::Biased)
        .count() as u64;

    CountTable {
        dimension,
        rows,
        vb_unique_count: vb,
        b_unique_count: b,
        vbb_unique_count: vb + b,
    }
}

fn cross_rows(records: &[&ArticleRecord], d1: Dimension, d2: Dimension) -> CrossTab {
    let row_keys = value_keys(records, d1);
    let column_keys = value_keys(records, d2);
    let mut cells = vec![vec![0u64; column_keys.len()]; row_keys.len()];

    for record in records {
        let rows = d1.contributions(record);
        let columns = d2.contributions(record);
        for (row_key, row_weight) in &rows {
            let Some(r) = row_keys.iter().position(|k| k == row_key) else {
                continue;
            };
            for (column_key, column_weight) in &columns {
                if let Some(c) = column_keys.iter().position(|k| k == column_key) {
                    cells[r][c] += row_weight * column_weight;
                }
            }
        }
    }

    // Unique biased articles per row value, not summed across columns.
    let vbb_unique_count = (d1 != Dimension::BiasRating).then(|| {
        row_keys
            .iter()
            .map(|key| {
                records
                    .iter()
                    .filter(|r| r.bias_rating.is_biased())
                    .filter(|r| {
                        d1.contributions(r)
                            .iter()
                            .any(|(k, weight)| k == key && *weight > 0)
                    })
                    .count() as u64
            })
            .collect()
    });

    CrossTab {
        row_dimension: d1,
        column_dimension: d2,
        row_keys,
        column_keys,
        cells,
        vbb_unique_count,
    }
}
