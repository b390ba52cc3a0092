//! Representative-article selection for case studies.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::analysis::{Aggregator, PublisherSelection};
use crate::error::{ReportError, ReportResult};
use crate::models::{ArticleRecord, CaseType};

/// Pick up to `limit` articles of `publisher` that qualify for `case`.
///
/// Qualifying articles are deduplicated by id, shuffled, then stably ranked
/// by severity, bias rating and publish date, all descending. Ties therefore
/// fall back to the shuffle order.
pub fn select_case_articles<R: Rng + ?Sized>(
    aggregator: &Aggregator,
    publisher: &str,
    case: CaseType,
    limit: usize,
    rng: &mut R,
) -> ReportResult<Vec<ArticleRecord>> {
    let selection = PublisherSelection::from(publisher);
    let mut seen = HashSet::new();
    let mut pool: Vec<&ArticleRecord> = aggregator
        .subset(&selection, false)
        .into_iter()
        .filter(|r| case.admits(r))
        .filter(|r| seen.insert(r.id.clone()))
        .collect();

    if pool.is_empty() {
        return Err(ReportError::InsufficientData(format!(
            "no {} articles from {}",
            case, publisher
        )));
    }

    pool.shuffle(rng);
    pool.sort_by(|a, b| {
        case.severity_of(b)
            .cmp(&case.severity_of(a))
            .then_with(|| b.bias_rating.cmp(&a.bias_rating))
            .then_with(|| b.date_published.cmp(&a.date_published))
    });

    Ok(pool.into_iter().take(limit).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BiasCategory::*;
    use crate::models::ArticleTable;
    use crate::testing::{article, date};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn aggregator() -> Aggregator {
        let mut low = article("1", "X", 1, "Politics", &[Misrepresentation]);
        low.date_published = date(2024, 5, 1);
        let mut high = article("2", "X", 1, "Politics", &[Misrepresentation]);
        high.marks[Misrepresentation.index()].severity = Some(4);
        let mut older = article("3", "X", 2, "Politics", &[Misrepresentation]);
        older.date_published = date(2024, 1, 2);
        let newer = article("4", "X", 2, "Politics", &[Misrepresentation]);
        let duplicate = newer.clone();
        let other_publisher = article("5", "Y", 2, "Politics", &[Misrepresentation]);
        let unbiased = article("6", "X", 0, "Politics", &[Misrepresentation]);

        Aggregator::new(ArticleTable::new(vec![
            low,
            high,
            older,
            newer,
            duplicate,
            other_publisher,
            unbiased,
        ]))
    }

    fn ids(records: &[ArticleRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_ranking_by_severity_rating_then_date() {
        let mut rng = StdRng::seed_from_u64(7);
        let picked =
            select_case_articles(&aggregator(), "X", CaseType::Misrepresentation, 10, &mut rng)
                .unwrap();
        assert_eq!(ids(&picked), vec!["2", "4", "3", "1"]);
    }

    #[test]
    fn test_limit_is_applied_after_ranking() {
        let mut rng = StdRng::seed_from_u64(7);
        let picked =
            select_case_articles(&aggregator(), "X", CaseType::Misrepresentation, 2, &mut rng)
                .unwrap();
        assert_eq!(ids(&picked), vec!["2", "4"]);
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        let agg = Aggregator::new(ArticleTable::new(
            (0..20)
                .map(|i| article(&i.to_string(), "X", 1, "Politics", &[Generalisation]))
                .collect(),
        ));
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            ids(&select_case_articles(&agg, "X", CaseType::Biased, 3, &mut rng).unwrap())
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
        assert_eq!(run(12).len(), 3);
    }

    #[test]
    fn test_empty_pool_is_insufficient_data() {
        let mut rng = StdRng::seed_from_u64(1);
        let result =
            select_case_articles(&aggregator(), "X", CaseType::Generalisation, 3, &mut rng);
        assert!(result.unwrap_err().is_insufficient_data());
    }
}
