//! Markdown preview of a report schema.
//!
//! The slide writer consumes the JSON schema; this rendering is for people
//! reviewing a run from the terminal.

use anyhow::Result;
use chrono::Utc;

use crate::models::QueryParameters;
use crate::report::schema::{CaseStudyEntry, ComponentSchema, ReportSchema, SectionPayload};

/// Generate the complete Markdown preview.
pub fn generate_markdown_report(schema: &ReportSchema, params: &QueryParameters) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Briefing Pack: {}\n\n",
        params.selected_publisher
    ));
    output.push_str(&generate_parameters_section(params));
    output.push_str(&generate_table_of_contents(schema));

    for (name, component) in schema.components() {
        output.push_str(&generate_component_section(name, component));
    }

    output.push_str(&generate_footer());
    output
}

fn generate_parameters_section(params: &QueryParameters) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "- **Period:** {} to {}\n",
        params.start_date, params.end_date
    ));
    if !params.compared_publishers.is_empty() {
        section.push_str(&format!(
            "- **Compared with:** {}\n",
            params.compared_publishers.join(", ")
        ));
    }
    if !params.bias_category.is_empty() {
        section.push_str(&format!(
            "- **Bias categories:** {}\n",
            params.bias_category.join(", ")
        ));
    }
    if !params.topics.is_empty() {
        section.push_str(&format!("- **Topics:** {}\n", params.topics.join(", ")));
    }
    section.push('\n');

    section
}

fn generate_table_of_contents(schema: &ReportSchema) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    for (name, _) in schema.components() {
        toc.push_str(&format!("- [{}](#{})\n", name, anchor(name)));
    }
    toc.push('\n');

    toc
}

fn anchor(heading: &str) -> String {
    heading.to_lowercase().replace(' ', "-")
}

fn generate_component_section(name: &str, component: &ComponentSchema) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", name));
    match component {
        ComponentSchema::Text { text, .. } => {
            if text.is_empty() {
                section.push_str("_No text was generated._\n\n");
            } else {
                section.push_str(text);
                section.push_str("\n\n");
            }
        }
        ComponentSchema::Sections(sections) => {
            for (key, payload) in sections {
                section.push_str(&generate_subsection(key, payload));
            }
        }
    }

    section
}

fn generate_subsection(key: &str, payload: &SectionPayload) -> String {
    let mut block = String::new();

    match payload {
        SectionPayload::Chart {
            title,
            chart_title,
            chart_filepath,
            bullets,
        } => {
            block.push_str(&format!("### {}\n\n", title));
            if !chart_title.is_empty() {
                block.push_str(&format!("**{}**\n\n", chart_title));
            }
            block.push_str(&format!("Chart: [`{}`]({})\n\n", key, chart_filepath));
            block.push_str(&bullet_list(bullets));
        }
        SectionPayload::CaseStudies(entries) => {
            block.push_str(&format!("### {}\n\n", key));
            if entries.is_empty() {
                block.push_str("_No qualifying articles._\n\n");
            }
            for entry in entries {
                block.push_str(&generate_case_entry(entry));
            }
        }
    }

    block
}

fn generate_case_entry(entry: &CaseStudyEntry) -> String {
    let mut block = String::new();

    let title = if entry.title.is_empty() {
        "Untitled article"
    } else {
        entry.title.as_str()
    };
    block.push_str(&format!("#### {}\n\n", title));
    block.push_str(&bullet_list(&entry.bullets));

    block
}

fn bullet_list(text: &str) -> String {
    let mut list = String::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        list.push_str(&format!("- {}\n", line.trim()));
    }
    if !list.is_empty() {
        list.push('\n');
    }
    list
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Generated by briefpack v{} on {}*\n",
        env!("CARGO_PKG_VERSION"),
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));

    footer
}

/// Serialize the schema as pretty JSON.
pub fn generate_json_report(schema: &ReportSchema) -> Result<String> {
    schema.to_json().map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::params;
    use indexmap::IndexMap;

    fn create_test_schema() -> ReportSchema {
        let mut schema = ReportSchema::new();
        schema
            .insert(
                "Methodology",
                ComponentSchema::Text {
                    title: "Methodology".to_string(),
                    text: "Articles were rated by analysts.".to_string(),
                },
            )
            .unwrap();

        let mut cases = IndexMap::new();
        cases.insert(
            "Very Biased".to_string(),
            SectionPayload::CaseStudies(vec![CaseStudyEntry {
                title: "Council row".to_string(),
                bullets: "Bias rating: Very Biased\nLocation: Leeds".to_string(),
            }]),
        );
        cases.insert("Biased".to_string(), SectionPayload::CaseStudies(vec![]));
        schema
            .insert("Case Studies", ComponentSchema::Sections(cases))
            .unwrap();

        let mut charts = IndexMap::new();
        charts.insert(
            "bias_rating".to_string(),
            SectionPayload::Chart {
                title: "Analysis of Bias Ratings".to_string(),
                chart_title: "Most articles are biased".to_string(),
                chart_filepath: "tmp/bias_rating.json".to_string(),
                bullets: "3 articles are Biased".to_string(),
            },
        );
        schema
            .insert(
                "Publisher Performance Overview",
                ComponentSchema::Sections(charts),
            )
            .unwrap();
        schema
    }

    #[test]
    fn test_generate_markdown_report() {
        let md = generate_markdown_report(&create_test_schema(), &params("X", &["Y", "Z"]));

        assert!(md.starts_with("# Briefing Pack: X"));
        assert!(md.contains("- **Compared with:** Y, Z"));
        assert!(md.contains("- [Case Studies](#case-studies)"));
        assert!(md.contains("## Methodology\n\nArticles were rated by analysts."));
        assert!(md.contains("#### Council row\n\n- Bias rating: Very Biased\n- Location: Leeds"));
        assert!(md.contains("### Biased\n\n_No qualifying articles._"));
        assert!(md.contains("Chart: [`bias_rating`](tmp/bias_rating.json)"));
        assert!(md.contains("**Most articles are biased**"));
    }

    #[test]
    fn test_component_order_is_preserved() {
        let md = generate_markdown_report(&create_test_schema(), &params("X", &[]));
        let methodology = md.find("## Methodology").unwrap();
        let cases = md.find("## Case Studies").unwrap();
        let performance = md.find("## Publisher Performance Overview").unwrap();
        assert!(methodology < cases && cases < performance);
        assert!(!md.contains("Compared with"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_schema()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Case Studies"]["Biased"], serde_json::json!([]));
    }
}
