//! Narration delegated to an external text-completion backend.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ReportResult;
use crate::narrative::prompts::{build_prompt, SYSTEM_PROMPT};
use crate::narrative::{
    ChatTurn, ConversationLog, Narration, NarrativeEntry, NarrativeKind, NarrativePayload,
    NarrativeStrategy, TextCompletion,
};

/// A bracketed title anywhere in a line; group 2 marks markdown link syntax.
static ENTRY_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\](\()?").expect("entry title pattern"));

/// A bullet point: marker followed by whitespace.
static BULLET_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*•]\s").expect("bullet line pattern"));

/// Leading bullet markers.
static BULLET_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]\s*)+").expect("bullet marker pattern"));

pub struct ExternalNarrative {
    backend: Box<dyn TextCompletion>,
    publisher: String,
    deadline: Duration,
}

impl ExternalNarrative {
    pub fn new(backend: Box<dyn TextCompletion>, publisher: impl Into<String>, deadline: Duration) -> Self {
        Self {
            backend,
            publisher: publisher.into(),
            deadline,
        }
    }
}

#[async_trait]
impl NarrativeStrategy for ExternalNarrative {
    fn name(&self) -> &'static str {
        "external"
    }

    /// Ask the backend for one narration.
    ///
    /// The exchange is committed to the log only once the backend answers. A
    /// missed deadline yields an empty narration; backend errors propagate.
    async fn narrate(
        &self,
        kind: NarrativeKind,
        payload: &NarrativePayload,
        log: &mut ConversationLog,
    ) -> ReportResult<Narration> {
        let prompt = build_prompt(kind, payload, &self.publisher)?;
        log.ensure_system(SYSTEM_PROMPT);

        let mut turns = log.turns().to_vec();
        turns.push(ChatTurn::user(prompt.clone()));

        debug!("Requesting {} narration ({} turns)", kind, turns.len());

        let response = match tokio::time::timeout(self.deadline, self.backend.complete(&turns)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Narration for {} exceeded {}s deadline; continuing without text",
                    kind,
                    self.deadline.as_secs()
                );
                return Ok(Narration::empty());
            }
        };

        log.push(ChatTurn::user(prompt));
        log.push(ChatTurn::assistant(response.clone()));

        let narration = parse_response(&response);
        if narration.is_empty() {
            warn!("Narration for {} had no bracketed title; using empty text", kind);
        }
        Ok(narration)
    }
}

/// Decode `[Title]` blocks followed by bullet lines.
///
/// A title may be wrapped in emphasis or preceded by a lead-in such as
/// `Here is the analysis:`. Bullet lines and `[text](url)` links never open
/// an entry. Text before the first title is ignored. Never fails: a response
/// without any title yields an empty narration.
pub fn parse_response(response: &str) -> Narration {
    let mut entries: Vec<NarrativeEntry> = Vec::new();

    for line in response.lines() {
        if let Some((title, rest)) = entry_header(line) {
            let mut entry = NarrativeEntry {
                title,
                bullets: Vec::new(),
            };
            let rest = strip_marker(rest);
            if !rest.is_empty() {
                entry.bullets.push(rest);
            }
            entries.push(entry);
            continue;
        }

        let Some(current) = entries.last_mut() else {
            continue;
        };
        let bullet = strip_marker(line);
        if !bullet.is_empty() {
            current.bullets.push(bullet);
        }
    }

    Narration { entries }
}

/// Title and trailing text of a line that opens an entry.
fn entry_header(line: &str) -> Option<(String, &str)> {
    if BULLET_LINE.is_match(line) {
        return None;
    }

    let caps = ENTRY_TITLE
        .captures_iter(line)
        .find(|caps| caps.get(2).is_none())?;
    let whole = caps.get(0)?;
    let title = caps[1].trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace());
    if title.is_empty() {
        return None;
    }

    let rest = line[whole.end()..].trim_start_matches(|c: char| c == '*' || c == '_' || c == ':');
    Some((title.to_string(), rest))
}

fn strip_marker(line: &str) -> String {
    BULLET_MARKER.replace(line, "").trim().to_string()
}
