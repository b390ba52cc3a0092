//! Chart backend seam.
//!
//! Components only call `build` then `save`. The default backend writes a
//! JSON chart specification for the external renderer.

use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::analysis::{
    AggregationResult, CountTable, CrossTab, Dimension, OddsTable, BIASED_OR_VERY_BIASED_KEY,
};
use crate::error::{ReportError, ReportResult};
use crate::models::{BiasCategory, BiasRating};

/// Rows and columns kept before collapsing into "Others".
const TOP_N: usize = 5;

/// Odds bars at or above this p-value are drawn as not significant.
const SIGNIFICANCE_LEVEL: f64 = 0.10;

const OTHERS_COLOR: &str = "#e8e8e8";
const NOT_SIGNIFICANT_COLOR: &str = "#4F5150";
const PALETTE: [&str; 5] = ["#4185A0", "#AA4D71", "#B85C3B", "#C5BE71", "#7658A0"];

pub trait Renderable {
    fn save(&self, path: &Path) -> ReportResult<()>;
}

pub trait ChartBackend: Send + Sync {
    /// File extension of saved charts.
    fn extension(&self) -> &'static str;

    fn build(
        &self,
        result: &AggregationResult,
        dimension: Dimension,
    ) -> ReportResult<Box<dyn Renderable>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub name: String,
    pub count: u64,
    pub pct: f64,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatCell {
    pub row: String,
    pub column: String,
    pub count: u64,
    pub pct: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddsBar {
    pub name: String,
    pub label: String,
    /// `None` when the ratio is infinite.
    pub odds_ratio: Option<f64>,
    pub value_label: String,
    pub color: String,
}

/// Renderer-neutral chart description.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    Bar {
        x_label: String,
        y_label: String,
        bars: Vec<Bar>,
    },
    Heatmap {
        x_label: String,
        y_label: String,
        rows: Vec<String>,
        columns: Vec<String>,
        cells: Vec<HeatCell>,
    },
    Odds {
        x_label: String,
        y_label: String,
        reference_lines: Vec<f64>,
        bars: Vec<OddsBar>,
    },
}

impl Renderable for ChartSpec {
    fn save(&self, path: &Path) -> ReportResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        debug!("Chart saved to {}", path.display());
        Ok(())
    }
}

/// Writes [`ChartSpec`] files.
#[derive(Debug, Clone, Default)]
pub struct SpecChartBackend;

impl ChartBackend for SpecChartBackend {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn build(
        &self,
        result: &AggregationResult,
        dimension: Dimension,
    ) -> ReportResult<Box<dyn Renderable>> {
        let spec = match result {
            AggregationResult::Counts(counts) => {
                ensure_dimension(dimension, &[counts.dimension])?;
                bar_chart(counts)
            }
            AggregationResult::CrossTab(tab) => {
                ensure_dimension(dimension, &[tab.row_dimension, tab.column_dimension])?;
                heatmap_chart(tab)
            }
            AggregationResult::Odds(odds) => {
                ensure_dimension(dimension, &[odds.dimension])?;
                odds_chart(odds)
            }
        };
        Ok(Box::new(spec))
    }
}

fn ensure_dimension(requested: Dimension, available: &[Dimension]) -> ReportResult<()> {
    if available.contains(&requested) {
        Ok(())
    } else {
        Err(ReportError::UnknownDimension(format!(
            "{} is not charted by this aggregation",
            requested
        )))
    }
}

/// Display name of a category value.
pub fn display_name(dimension: Dimension, key: &str) -> String {
    match dimension {
        Dimension::BiasRating if key == BIASED_OR_VERY_BIASED_KEY => "Biased + Very Biased".to_string(),
        Dimension::BiasRating => key
            .parse::<i64>()
            .ok()
            .and_then(BiasRating::from_value)
            .map(|r| r.label().to_string())
            .unwrap_or_else(|| key.to_string()),
        Dimension::BiasCategory => BiasCategory::from_key(key)
            .map(|c| c.label().to_string())
            .unwrap_or_else(|| key.to_string()),
        Dimension::Location | Dimension::Topic => key.to_string(),
    }
}

fn fixed_color(dimension: Dimension, key: &str) -> Option<&'static str> {
    match dimension {
        Dimension::BiasRating => match key {
            "-1" => Some("#CAC6C2"),
            "0" => Some("#f2eadf"),
            "1" => Some("#eb8483"),
            "2" => Some("#C22625"),
            BIASED_OR_VERY_BIASED_KEY => Some("#7d2927"),
            _ => None,
        },
        Dimension::BiasCategory => match key {
            "generalisation" => Some("#4185A0"),
            "headline_or_imagery" => Some("#AA4D71"),
            "misrepresentation" => Some("#B85C3B"),
            "negative_behaviour" => Some("#C5BE71"),
            "prominence" => Some("#7658A0"),
            _ => None,
        },
        Dimension::Location | Dimension::Topic => None,
    }
}

fn pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        ((part as f64 / whole as f64) * 1000.0).round() / 10.0
    }
}

/// Indices of the `n` largest values; ties keep input order.
fn top_indices(values: &[u64], n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*b].cmp(&values[*a]));
    order.truncate(n);
    order
}

fn bar_chart(counts: &CountTable) -> ChartSpec {
    let dimension = counts.dimension;
    let values: Vec<u64> = counts.rows.iter().map(|r| r.count).collect();
    // Ratings keep their ordinal order; other dimensions rank by count.
    let top: Vec<usize> = if dimension == Dimension::BiasRating {
        (0..values.len()).take(TOP_N).collect()
    } else {
        top_indices(&values, TOP_N)
    };

    let mut entries: Vec<(String, u64, String)> = top
        .iter()
        .enumerate()
        .map(|(rank, &i)| {
            let row = &counts.rows[i];
            let color = fixed_color(dimension, &row.value).unwrap_or(PALETTE[rank % PALETTE.len()]);
            (display_name(dimension, &row.value), row.count, color.to_string())
        })
        .collect();

    if counts.rows.len() > top.len() {
        let rest: u64 = (0..counts.rows.len())
            .filter(|i| !top.contains(i))
            .map(|i| counts.rows[i].count)
            .sum();
        entries.push(("Others".to_string(), rest, OTHERS_COLOR.to_string()));
    }

    // Category bars share the biased-article denominator; the others use the bar total.
    let denominator = if dimension == Dimension::BiasCategory {
        counts.vbb_unique_count
    } else {
        entries.iter().map(|(_, count, _)| count).sum()
    };

    let bars = entries
        .into_iter()
        .map(|(name, count, color)| {
            let pct = pct(count, denominator);
            Bar {
                label: format!("{} ({}%)", count, pct.round() as i64),
                name,
                count,
                pct,
                color,
            }
        })
        .collect();

    ChartSpec::Bar {
        x_label: dimension.title().to_string(),
        y_label: "Number of Articles".to_string(),
        bars,
    }
}

fn heatmap_chart(tab: &CrossTab) -> ChartSpec {
    let row_totals: Vec<u64> = tab.cells.iter().map(|row| row.iter().sum()).collect();
    let rows = top_indices(&row_totals, TOP_N);
    let columns = top_indices(&tab.column_totals(), TOP_N);

    let denominator = |r: usize| match &tab.vbb_unique_count {
        Some(vbb) => vbb[r],
        None => row_totals[r],
    };

    let row_labels: Vec<String> = rows
        .iter()
        .map(|&r| {
            format!(
                "{} ({})",
                display_name(tab.row_dimension, &tab.row_keys[r]),
                denominator(r)
            )
        })
        .collect();
    let column_labels: Vec<String> = columns
        .iter()
        .map(|&c| display_name(tab.column_dimension, &tab.column_keys[c]))
        .collect();

    let mut cells = Vec::with_capacity(rows.len() * columns.len());
    for (ri, &r) in rows.iter().enumerate() {
        for (ci, &c) in columns.iter().enumerate() {
            let count = tab.cells[r][c];
            let pct = pct(count, denominator(r));
            cells.push(HeatCell {
                row: row_labels[ri].clone(),
                column: column_labels[ci].clone(),
                count,
                pct,
                label: if pct == 0.0 {
                    String::new()
                } else {
                    format!("{}\n({}%)", count, pct.round() as i64)
                },
            });
        }
    }

    ChartSpec::Heatmap {
        x_label: tab.column_dimension.title().to_string(),
        y_label: tab.row_dimension.title().to_string(),
        rows: row_labels,
        columns: column_labels,
        cells,
    }
}

fn odds_chart(odds: &OddsTable) -> ChartSpec {
    let bars = odds
        .rows
        .iter()
        .map(|row| {
            let name = display_name(odds.dimension, &row.value);
            let color = if row.p_value < SIGNIFICANCE_LEVEL {
                fixed_color(odds.dimension, &row.value).unwrap_or(OTHERS_COLOR)
            } else {
                NOT_SIGNIFICANT_COLOR
            };
            let finite = row.odds_ratio.is_finite().then_some(row.odds_ratio);
            OddsBar {
                label: format!("{} ({})", name, row.count),
                name,
                odds_ratio: finite,
                value_label: match finite {
                    Some(or) => format!("{:.2}", or),
                    None => "inf".to_string(),
                },
                color: color.to_string(),
            }
        })
        .collect();

    ChartSpec::Odds {
        x_label: odds.dimension.title().to_string(),
        y_label: "Odds Ratio".to_string(),
        reference_lines: vec![1.0, 2.0],
        bars,
    }
}
