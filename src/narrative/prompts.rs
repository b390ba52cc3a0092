//! Prompt construction for the external narrative backend.

use serde::Serialize;
use serde_json::json;

use crate::analysis::BIASED_OR_VERY_BIASED_KEY;
use crate::error::ReportResult;
use crate::models::{ArticleRecord, CaseType, QueryParameters, TOPIC_DELIMITER};
use crate::narrative::{NarrativeKind, NarrativePayload};

/// System prompt seeded once per conversation.
pub const SYSTEM_PROMPT: &str = r#"You are an expert assistant skilled in proofreading and report writing.
You are helping write a briefing pack for a media monitoring organisation that promotes fair and responsible reporting of Muslims and Islam.
The briefing pack summarises the publications of news outlets and their potential biases for or against Muslims.

Each request names its section in brackets and lists numbered instructions, like so:

[SECTION NAME]
1. Instruction one
2. Instruction two

Requests may attach raw data as JSON under a header of the form [RAW DATA - NAME OF DATASET],
or example articles under [CASES OF BIASED ARTICLES] following this schema:

{"title": "headline", "content": {"bias_category": "identified biases", "topics": "issues discussed", "location": "where the events took place", "text": "article body"}}

Articles are assessed against five bias categories. A category applies when the answer to its question is yes:
1. Negative Behaviour: does the article associate Muslims or Islam with negative behaviour?
2. Misrepresentation: does the article misrepresent any aspect of Muslim behaviour or identity?
3. Generalisation: does the article make generalising claims about Muslims or Islam?
4. Due Prominence: does the article omit due prominence to a relevant Muslim voice or perspective?
5. Imagery and Headlines: does the image or headline depict Muslims or Islam unfairly or out of keeping with the story?

An article showing four of the five categories is rated Very Biased, otherwise Biased.
Articles may also be Not Biased or Inconclusive.

Always answer with a bracketed title line followed by bullet points starting with "- "."#;

/// Shared instructions for every case-study request.
const CASE_STUDY_PREAMBLE: &str = r#"[CASES OF BIASED ARTICLES]
1. The following news articles are examples of biased publications. For each article answer:
- What is the article about and what are the key elements of the case?
- Why does the article show this bias rating or category? Cite evidence that substantiates the claim.
2. Be as specific as you can when describing key elements and evidence.
3. Answer each question with 1-2 bullet points of 25-45 words, three bullet points per article in total.
4. Separate the answer for each article using this format:
[TITLE OF ARTICLE 1]
- Bullet point 1
- Bullet point 2
- Bullet point 3"#;

/// Build the user prompt for one narration request.
pub fn build_prompt(
    kind: NarrativeKind,
    payload: &NarrativePayload,
    publisher: &str,
) -> ReportResult<String> {
    match (kind, payload) {
        (NarrativeKind::Methodology, NarrativePayload::Parameters(params)) => {
            Ok(methodology_prompt(params))
        }
        (NarrativeKind::BiasRating, NarrativePayload::Counts(counts)) => Ok(analysis_prompt(
            "ANALYSIS OF BIAS RATINGS",
            &format!(
                "Summarise how the articles from {} are distributed across bias ratings. \
                 Rating keys are -1 Inconclusive, 0 Not Biased, 1 Biased, 2 Very Biased.",
                publisher
            ),
            "BIAS RATING COUNTS",
            counts,
        )?),
        (NarrativeKind::BiasCategory, NarrativePayload::Counts(counts)) => Ok(analysis_prompt(
            "ANALYSIS OF BIAS CATEGORIES",
            &format!(
                "Summarise which bias categories {} commits most often. \
                 Percentages should use VBB_unique_count, the number of biased or very biased articles.",
                publisher
            ),
            "BIAS CATEGORY COUNTS",
            counts,
        )?),
        (NarrativeKind::BiasRatingVsTopics, NarrativePayload::CrossTab(tab)) => Ok(analysis_prompt(
            "ANALYSIS OF BIAS RATINGS VS TOPICS",
            &format!(
                "Identify the topics where {} publishes the most Biased and Very Biased articles.",
                publisher
            ),
            "BIAS RATING BY TOPIC",
            tab,
        )?),
        (NarrativeKind::BiasCategoryVsTopics, NarrativePayload::CrossTab(tab)) => Ok(analysis_prompt(
            "ANALYSIS OF BIAS CATEGORIES VS TOPICS",
            &format!(
                "Identify which bias categories {} commits in which topics.",
                publisher
            ),
            "BIAS CATEGORY BY TOPIC",
            tab,
        )?),
        (NarrativeKind::Tendency, NarrativePayload::Odds(odds)) => Ok(analysis_prompt(
            "PUBLISHER TENDENCY",
            &tendency_instruction(publisher),
            "ODDS RATIOS",
            odds,
        )?),
        (NarrativeKind::BiasRatingComparison, NarrativePayload::Comparison { odds, selected, others }) => {
            Ok(analysis_prompt(
                "TENDENCY TO COMMIT BIAS",
                &format!(
                    "{} The {} row combines Biased and Very Biased articles.",
                    tendency_instruction(publisher),
                    BIASED_OR_VERY_BIASED_KEY
                ),
                "ODDS RATIOS AND COUNTS",
                &json!({ "odds": odds, "selected": selected, "others": others }),
            )?)
        }
        (
            NarrativeKind::BiasCategoryComparison,
            NarrativePayload::Comparison { odds, selected, others },
        ) => Ok(analysis_prompt(
            "TENDENCY TO COMMIT CERTAIN BIASES",
            &tendency_instruction(publisher),
            "ODDS RATIOS AND COUNTS BY CATEGORY",
            &json!({ "odds": odds, "selected": selected, "others": others }),
        )?),
        (NarrativeKind::CaseStudy, NarrativePayload::CaseStudy { case, articles }) => {
            Ok(case_study_prompt(*case, articles, publisher))
        }
        (NarrativeKind::KeyMessage, NarrativePayload::Findings(summary)) => Ok(analysis_prompt(
            "KEY FINDINGS",
            "Using the analysis so far, write the key findings of the report as 3-5 bullet points.",
            "SUMMARY STATISTICS",
            summary,
        )?),
        (NarrativeKind::Conclusions, NarrativePayload::Findings(summary)) => Ok(analysis_prompt(
            "CONCLUSIONS",
            "Using the analysis so far, write a concluding paragraph for the report as 2-3 bullet points.",
            "SUMMARY STATISTICS",
            summary,
        )?),
        (kind, payload) => Err(payload.mismatch(kind)),
    }
}

fn methodology_prompt(params: &QueryParameters) -> String {
    format!(
        "[METHODOLOGY]\n\
         1. Paraphrase this paragraph for the methodology of the report to make it more journalistic:\n\n\
         This report analyzes publications of {} from {} to {}.\n\
         Here, we compared it with the following publishers: {}.\n\
         We considered the following bias types: {} across the following topics: {}.",
        params.selected_publisher,
        params.start_date,
        params.end_date,
        params.compared_publishers.join(", "),
        params.bias_category.join(", "),
        params.topics.join(", ")
    )
}

fn tendency_instruction(publisher: &str) -> String {
    format!(
        "Compare how likely {} is to commit bias against the other publishers combined. \
         OR is the odds ratio and pvalue the Fisher exact test significance; treat pvalue >= 0.10 as not significant.",
        publisher
    )
}

fn analysis_prompt<T: Serialize + ?Sized>(
    section: &str,
    instruction: &str,
    dataset: &str,
    data: &T,
) -> ReportResult<String> {
    let data = serde_json::to_string_pretty(data)?;
    Ok(format!(
        "[{}]\n\
         1. {}\n\
         2. Give a short chart title in brackets, then 2-3 bullet points of at most 30 words each.\n\n\
         [RAW DATA - {}]\n{}",
        section, instruction, dataset, data
    ))
}

/// One article as embedded in a case-study prompt.
pub fn article_json(record: &ArticleRecord) -> serde_json::Value {
    let categories: Vec<&str> = record
        .flagged_categories()
        .iter()
        .map(|c| c.key())
        .collect();

    json!({
        "title": record.title,
        "content": {
            "bias_category": categories.join(TOPIC_DELIMITER),
            "topics": record.topic,
            "location": record.location,
            "text": record.text,
        }
    })
}

fn case_study_prompt(case: CaseType, articles: &[ArticleRecord], publisher: &str) -> String {
    let header = if case.is_rating_bucket() {
        format!("[CASES OF {} ARTICLES FROM {}]", case.label(), publisher)
    } else {
        format!("[EXAMPLES FROM {} EXHIBITING {}]", publisher, case.label())
    };

    let articles: Vec<String> = articles
        .iter()
        .map(|a| article_json(a).to_string())
        .collect();

    format!("{}\n\n{}\n{}", CASE_STUDY_PREAMBLE, header, articles.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::models::BiasCategory;
    use crate::testing::{article, params};

    #[test]
    fn test_methodology_prompt_embeds_parameters() {
        let prompt = build_prompt(
            NarrativeKind::Methodology,
            &NarrativePayload::Parameters(params("X", &["Y", "Z"])),
            "X",
        )
        .unwrap();

        assert!(prompt.starts_with("[METHODOLOGY]"));
        assert!(prompt.contains("publications of X"));
        assert!(prompt.contains("Y, Z"));
    }

    #[test]
    fn test_case_study_prompt_lists_articles() {
        let mut record = article("1", "X", 1, "Politics | Religion", &[BiasCategory::Generalisation]);
        record.title = "Headline".to_string();

        let prompt = build_prompt(
            NarrativeKind::CaseStudy,
            &NarrativePayload::CaseStudy {
                case: CaseType::Generalisation,
                articles: vec![record.clone()],
            },
            "X",
        )
        .unwrap();

        assert!(prompt.starts_with("[CASES OF BIASED ARTICLES]"));
        assert!(prompt.contains("[EXAMPLES FROM X EXHIBITING Generalisation]"));
        assert!(prompt.contains("\"title\":\"Headline\""));

        let value = article_json(&record);
        assert_eq!(value["content"]["bias_category"], "generalisation");
        assert_eq!(value["content"]["topics"], "Politics | Religion");
    }

    #[test]
    fn test_mismatched_payload_is_rejected() {
        let result = build_prompt(
            NarrativeKind::BiasRating,
            &NarrativePayload::Parameters(params("X", &[])),
            "X",
        );
        assert!(matches!(result, Err(ReportError::PayloadMismatch { .. })));
    }
}
