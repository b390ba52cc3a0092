//! Fixtures shared by unit tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{ReportError, ReportResult};
use crate::models::{
    split_topics, ArticleRecord, ArticleTable, BiasCategory, BiasRating, CategoryMark,
    QueryParameters,
};
use crate::narrative::{ChatTurn, TextCompletion};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// An article in London on 2024-01-15 with binary category flags.
pub fn article(
    id: &str,
    publisher: &str,
    rating: i64,
    topic: &str,
    flags: &[BiasCategory],
) -> ArticleRecord {
    let marks = BiasCategory::ALL.map(|c| {
        let flagged = flags.contains(&c);
        CategoryMark {
            flagged,
            severity: flagged.then_some(1),
        }
    });

    ArticleRecord {
        id: id.to_string(),
        publisher: publisher.to_string(),
        date_published: date(2024, 1, 15),
        title: String::new(),
        url: format!("https://example.org/{}", id),
        location: "London".to_string(),
        topic: topic.to_string(),
        topics: split_topics(topic),
        text: format!("Body of article {}", id),
        bias_rating: BiasRating::from_value(rating).unwrap(),
        marks,
    }
}

pub fn table(records: Vec<ArticleRecord>) -> ArticleTable {
    ArticleTable::new(records)
}

/// Parameters covering all of 2024.
pub fn params(selected: &str, compared: &[&str]) -> QueryParameters {
    QueryParameters {
        selected_publisher: selected.to_string(),
        compared_publishers: compared.iter().map(|p| p.to_string()).collect(),
        start_date: date(2024, 1, 1),
        end_date: date(2024, 12, 31),
        bias_category: vec![],
        topics: vec![],
    }
}

/// Completion double answering from a fixed script.
///
/// Once the script is exhausted every call answers with an empty string.
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<String>>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            failure: None,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(vec![])
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Counter of calls received, readable after the double is boxed.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(&self, _turns: &[ChatTurn]) -> ReportResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(ReportError::NarrativeBackend(message.clone()));
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}
