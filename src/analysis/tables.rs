//! Aggregation result shapes.
//!
//! Results are ephemeral: one aggregation feeds one narration call and one
//! chart build, then is dropped.

use serde::Serialize;

use crate::analysis::aggregator::Dimension;

/// One row of a one-dimensional count table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountRow {
    pub value: String,
    pub count: u64,
}

/// Counts per category value plus unique-article denominators.
///
/// The `*_unique_count` fields count articles in the filtered publisher subset,
/// not category occurrences.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountTable {
    pub dimension: Dimension,
    pub rows: Vec<CountRow>,
    #[serde(rename = "VB_unique_count")]
    pub vb_unique_count: u64,
    #[serde(rename = "B_unique_count")]
    pub b_unique_count: u64,
    #[serde(rename = "VBB_unique_count")]
    pub vbb_unique_count: u64,
}

impl CountTable {
    pub fn get(&self, value: &str) -> Option<u64> {
        self.rows.iter().find(|r| r.value == value).map(|r| r.count)
    }

    #[cfg(test)]
    pub fn total(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Row with the highest count; ties keep the earliest row.
    pub fn top(&self) -> Option<&CountRow> {
        self.rows
            .iter()
            .fold(None, |best: Option<&CountRow>, row| match best {
                Some(b) if b.count >= row.count => Some(b),
                _ => Some(row),
            })
    }
}

/// Two-dimensional cross-tabulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossTab {
    pub row_dimension: Dimension,
    pub column_dimension: Dimension,
    pub row_keys: Vec<String>,
    pub column_keys: Vec<String>,
    /// `cells[row][column]`.
    pub cells: Vec<Vec<u64>>,
    /// Biased/very biased articles per row; present when rows are not bias ratings.
    #[serde(rename = "VBB_unique_count", skip_serializing_if = "Option::is_none")]
    pub vbb_unique_count: Option<Vec<u64>>,
}

impl CrossTab {
    #[cfg(test)]
    pub fn cell(&self, row: &str, column: &str) -> Option<u64> {
        let r = self.row_keys.iter().position(|k| k == row)?;
        let c = self.column_keys.iter().position(|k| k == column)?;
        Some(self.cells[r][c])
    }

    pub fn row_total(&self, row: &str) -> u64 {
        self.row_keys
            .iter()
            .position(|k| k == row)
            .map(|r| self.cells[r].iter().sum())
            .unwrap_or(0)
    }

    pub fn column_totals(&self) -> Vec<u64> {
        (0..self.column_keys.len())
            .map(|c| self.cells.iter().map(|row| row[c]).sum())
            .collect()
    }

    #[cfg(test)]
    pub fn grand_total(&self) -> u64 {
        self.cells.iter().flatten().sum()
    }
}

/// Odds ratio of the selected publisher against the pooled "Others" group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddsRow {
    pub value: String,
    #[serde(rename = "OR")]
    pub odds_ratio: f64,
    #[serde(rename = "pvalue")]
    pub p_value: f64,
    /// Selected-publisher positive cell.
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddsTable {
    pub dimension: Dimension,
    pub rows: Vec<OddsRow>,
}

impl OddsTable {
    #[cfg(test)]
    pub fn get(&self, value: &str) -> Option<&OddsRow> {
        self.rows.iter().find(|r| r.value == value)
    }
}

/// Any aggregation output, as handed to the chart backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum AggregationResult {
    Counts(CountTable),
    CrossTab(CrossTab),
    Odds(OddsTable),
}
