//! Deterministic narration from fixed text templates.

use async_trait::async_trait;

use crate::analysis::{CountTable, CrossTab, OddsRow, OddsTable, BIASED_OR_VERY_BIASED_KEY};
use crate::error::ReportResult;
use crate::models::{ArticleRecord, BiasCategory, BiasRating, QueryParameters};
use crate::narrative::{
    ConversationLog, FindingsSummary, Narration, NarrativeEntry, NarrativeKind, NarrativePayload,
    NarrativeStrategy,
};

/// Template-based strategy; never touches the conversation log.
#[derive(Debug, Clone)]
pub struct TemplatedNarrative {
    publisher: String,
}

impl TemplatedNarrative {
    pub fn new(publisher: impl Into<String>) -> Self {
        Self {
            publisher: publisher.into(),
        }
    }

    fn methodology(&self, params: &QueryParameters) -> Narration {
        let mut lines = vec![
            format!("selected_publisher: {}", params.selected_publisher),
            format!("start_date: {}", params.start_date),
            format!("end_date: {}", params.end_date),
        ];
        for (name, values) in [
            ("compared_publishers", &params.compared_publishers),
            ("bias_category", &params.bias_category),
            ("topics", &params.topics),
        ] {
            if !values.is_empty() {
                lines.push(format!("{}: {}", name, values.join(", ")));
            }
        }
        Narration::plain(lines.join("\n"))
    }

    fn bias_rating(&self, counts: &CountTable) -> Narration {
        Narration::plain(format!(
            "{} articles from the {} are \"Biased\" or \"Very Biased\"",
            biased_total(counts),
            self.publisher
        ))
    }

    fn bias_category(&self, counts: &CountTable) -> Narration {
        match counts.top().filter(|row| row.count > 0) {
            Some(row) => Narration::plain(format!(
                "{} is the publisher's most committed bias category",
                category_label(&row.value)
            )),
            None => Narration::plain(format!(
                "No bias category was recorded for {}",
                self.publisher
            )),
        }
    }

    fn bias_rating_vs_topics(&self, tab: &CrossTab) -> Narration {
        let biased = tab.row_total(&BiasRating::Biased.key());
        let very_biased = tab.row_total(&BiasRating::VeryBiased.key());

        let (rating, label) = if biased > very_biased {
            (BiasRating::Biased, "Biased")
        } else if very_biased > biased {
            (BiasRating::VeryBiased, "Very Biased")
        } else if biased == 0 {
            return Narration::plain("No Biased or Very Biased articles were found across topics");
        } else {
            return Narration::plain(
                "Biased and Very Biased articles are equally frequent across topics",
            );
        };

        match top_column(tab, &rating.key()) {
            Some(topic) => Narration::plain(format!(
                "{} has the highest number of {} articles",
                topic, label
            )),
            None => Narration::plain("No Biased or Very Biased articles were found across topics"),
        }
    }

    fn bias_category_vs_topics(&self, tab: &CrossTab) -> Narration {
        let totals = tab.column_totals();
        let topic = totals
            .iter()
            .enumerate()
            .filter(|(_, total)| **total > 0)
            .fold(None, |best: Option<(usize, u64)>, (i, total)| match best {
                Some((_, b)) if b >= *total => best,
                _ => Some((i, *total)),
            })
            .map(|(i, _)| i);

        let Some(c) = topic else {
            return Narration::plain("No bias category was recorded across topics");
        };

        let category = tab
            .cells
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, u64)>, (r, row)| match best {
                Some((_, b)) if b >= row[c] => best,
                _ => Some((r, row[c])),
            })
            .map(|(r, _)| category_label(&tab.row_keys[r]))
            .unwrap_or_default();

        Narration::plain(format!(
            "{} is the most common bias committed in articles about {}",
            category, tab.column_keys[c]
        ))
    }

    fn tendency(&self, odds: &OddsTable) -> Narration {
        let strongest = odds
            .rows
            .iter()
            .filter(|r| r.odds_ratio.is_finite())
            .fold(None, |best: Option<&OddsRow>, row| match best {
                Some(b) if b.odds_ratio >= row.odds_ratio => Some(b),
                _ => Some(row),
            });

        match strongest {
            Some(row) => Narration::plain(format!(
                "{} is {:.2} times as likely as other publishers to publish {} articles",
                self.publisher,
                row.odds_ratio,
                value_label(&row.value)
            )),
            None => Narration::plain(format!(
                "No finite odds ratio could be computed for {}",
                self.publisher
            )),
        }
    }

    fn bias_rating_comparison(&self, selected: &CountTable, others: &CountTable) -> Narration {
        Narration::plain(format!(
            "{} published {} biased articles compared to {} from other publishers",
            self.publisher,
            biased_total(selected),
            biased_total(others)
        ))
    }

    fn bias_category_comparison(&self, selected: &CountTable) -> Narration {
        match selected.top().filter(|row| row.count > 0) {
            Some(row) => Narration::plain(format!(
                "{} has the highest tendency to commit {}",
                self.publisher,
                category_label(&row.value)
            )),
            None => Narration::plain(format!(
                "{} has no recorded bias category to compare",
                self.publisher
            )),
        }
    }

    fn case_study(&self, articles: &[ArticleRecord]) -> Narration {
        let entries = articles
            .iter()
            .map(|article| {
                let mut bullets = vec![
                    format!("Bias rating: {}", article.bias_rating.label()),
                    format!("Published: {}", article.date_published),
                    format!("Location: {}", article.location),
                ];
                let categories: Vec<&str> = article
                    .flagged_categories()
                    .iter()
                    .map(|c| c.label())
                    .collect();
                if !categories.is_empty() {
                    bullets.push(format!("Bias categories: {}", categories.join(", ")));
                }
                bullets.push(format!("Topics: {}", article.topics.join(", ")));

                NarrativeEntry {
                    title: if article.title.trim().is_empty() {
                        format!("Article {}", article.id)
                    } else {
                        article.title.clone()
                    },
                    bullets,
                }
            })
            .collect();

        Narration { entries }
    }

    fn key_message(&self, summary: &FindingsSummary) -> Narration {
        let biased = biased_total(&summary.bias_ratings);
        let mut bullets = vec![format!(
            "{} of {} articles from {} are Biased or Very Biased ({}%)",
            biased,
            summary.article_count,
            summary.selected_publisher,
            percentage(biased, summary.article_count)
        )];
        if let Some(row) = summary.bias_categories.top().filter(|r| r.count > 0) {
            bullets.push(format!(
                "{} is the most frequent bias category",
                category_label(&row.value)
            ));
        }
        if !summary.compared_publishers.is_empty() {
            bullets.push(format!(
                "Compared against {}",
                summary.compared_publishers.join(", ")
            ));
        }

        Narration {
            entries: vec![NarrativeEntry {
                title: String::new(),
                bullets,
            }],
        }
    }

    fn conclusions(&self, summary: &FindingsSummary) -> Narration {
        let biased = biased_total(&summary.bias_ratings);
        if biased == 0 {
            return Narration::plain(format!(
                "{} published no Biased or Very Biased articles among the {} analysed",
                summary.selected_publisher, summary.article_count
            ));
        }

        let category = summary
            .bias_categories
            .top()
            .filter(|r| r.count > 0)
            .map(|r| format!(", most often through {}", category_label(&r.value)))
            .unwrap_or_default();

        Narration::plain(format!(
            "{} published {} Biased or Very Biased articles out of {} analysed{}",
            summary.selected_publisher, biased, summary.article_count, category
        ))
    }
}

#[async_trait]
impl NarrativeStrategy for TemplatedNarrative {
    fn name(&self) -> &'static str {
        "templated"
    }

    async fn narrate(
        &self,
        kind: NarrativeKind,
        payload: &NarrativePayload,
        _log: &mut ConversationLog,
    ) -> ReportResult<Narration> {
        let narration = match (kind, payload) {
            (NarrativeKind::Methodology, NarrativePayload::Parameters(params)) => {
                self.methodology(params)
            }
            (NarrativeKind::BiasRating, NarrativePayload::Counts(counts)) => self.bias_rating(counts),
            (NarrativeKind::BiasCategory, NarrativePayload::Counts(counts)) => {
                self.bias_category(counts)
            }
            (NarrativeKind::BiasRatingVsTopics, NarrativePayload::CrossTab(tab)) => {
                self.bias_rating_vs_topics(tab)
            }
            (NarrativeKind::BiasCategoryVsTopics, NarrativePayload::CrossTab(tab)) => {
                self.bias_category_vs_topics(tab)
            }
            (NarrativeKind::Tendency, NarrativePayload::Odds(odds)) => self.tendency(odds),
            (NarrativeKind::BiasRatingComparison, NarrativePayload::Comparison { selected, others, .. }) => {
                self.bias_rating_comparison(selected, others)
            }
            (NarrativeKind::BiasCategoryComparison, NarrativePayload::Comparison { selected, .. }) => {
                self.bias_category_comparison(selected)
            }
            (NarrativeKind::CaseStudy, NarrativePayload::CaseStudy { articles, .. }) => {
                self.case_study(articles)
            }
            (NarrativeKind::KeyMessage, NarrativePayload::Findings(summary)) => {
                self.key_message(summary)
            }
            (NarrativeKind::Conclusions, NarrativePayload::Findings(summary)) => {
                self.conclusions(summary)
            }
            (kind, payload) => return Err(payload.mismatch(kind)),
        };
        Ok(narration)
    }
}

/// Articles rated biased or very biased in a rating count table.
fn biased_total(counts: &CountTable) -> u64 {
    [BiasRating::Biased, BiasRating::VeryBiased]
        .iter()
        .filter_map(|r| counts.get(&r.key()))
        .sum()
}

fn category_label(key: &str) -> String {
    BiasCategory::from_key(key)
        .map(|c| c.label().to_string())
        .unwrap_or_else(|| key.to_string())
}

/// Display name of an odds-table value key.
fn value_label(key: &str) -> String {
    if key == BIASED_OR_VERY_BIASED_KEY {
        return "Biased or Very Biased".to_string();
    }
    key.parse::<i64>()
        .ok()
        .and_then(BiasRating::from_value)
        .map(|r| r.label().to_string())
        .unwrap_or_else(|| category_label(key))
}

/// Column with the highest cell in one row; ties keep the first column.
fn top_column<'a>(tab: &'a CrossTab, row: &str) -> Option<&'a str> {
    let r = tab.row_keys.iter().position(|k| k == row)?;
    tab.cells[r]
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .fold(None, |best: Option<(usize, u64)>, (c, count)| match best {
            Some((_, b)) if b >= *count => best,
            _ => Some((c, *count)),
        })
        .map(|(c, _)| tab.column_keys[c].as_str())
}

fn percentage(part: u64, whole: u64) -> u64 {
    if whole == 0 {
        0
    } else {
        ((part as f64 / whole as f64) * 100.0).round() as u64
    }
}
