//! Fisher exact test on 2x2 contingency tables via the `statrs` crate.
//!
//! Table layout: rows are {Others, selected}, columns are {negative, positive}.
//! The odds ratio is `(a * d) / (b * c)` for `[[a, b], [c, d]]`.

use statrs::distribution::{Discrete, Hypergeometric};

use crate::error::{ReportError, ReportResult};

/// Relative tolerance when comparing point probabilities.
const PMF_RELATIVE_TOLERANCE: f64 = 1.0 + 1e-7;

/// A 2x2 contingency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contingency {
    pub others_negative: u64,
    pub others_positive: u64,
    pub selected_negative: u64,
    pub selected_positive: u64,
}

impl Contingency {
    pub fn total(&self) -> u64 {
        self.others_negative + self.others_positive + self.selected_negative + self.selected_positive
    }

    fn has_empty_margin(&self) -> bool {
        let others = self.others_negative + self.others_positive;
        let selected = self.selected_negative + self.selected_positive;
        let negative = self.others_negative + self.selected_negative;
        let positive = self.others_positive + self.selected_positive;
        others == 0 || selected == 0 || negative == 0 || positive == 0
    }
}

/// Result of the test: sample odds ratio and two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FisherResult {
    pub odds_ratio: f64,
    pub p_value: f64,
}

/// Run a two-sided Fisher exact test.
///
/// Fails with `InsufficientData` when any row or column of the table sums to
/// zero, since the odds ratio is undefined there.
pub fn fisher_exact(table: &Contingency) -> ReportResult<FisherResult> {
    if table.has_empty_margin() {
        return Err(ReportError::InsufficientData(format!(
            "contingency table {:?} has an empty row or column",
            table
        )));
    }

    let a = table.others_negative as f64;
    let b = table.others_positive as f64;
    let c = table.selected_negative as f64;
    let d = table.selected_positive as f64;

    let odds_ratio = if b * c == 0.0 {
        f64::INFINITY
    } else {
        (a * d) / (b * c)
    };

    // Selected-positive cell follows a hypergeometric law given the margins.
    let population = table.total();
    let successes = table.others_positive + table.selected_positive;
    let draws = table.selected_negative + table.selected_positive;

    let dist = Hypergeometric::new(population, successes, draws).map_err(|e| {
        ReportError::InsufficientData(format!("cannot form hypergeometric law: {}", e))
    })?;

    let low = (draws + successes).saturating_sub(population);
    let high = successes.min(draws);
    let observed = dist.pmf(table.selected_positive);
    let threshold = observed * PMF_RELATIVE_TOLERANCE;

    let p_value: f64 = (low..=high)
        .map(|k| dist.pmf(k))
        .filter(|p| *p <= threshold)
        .sum();

    Ok(FisherResult {
        odds_ratio,
        p_value: p_value.min(1.0),
    })
}
