//! Generative-search adapter (Perplexity chat completions)
//!
//! The model is asked for a strict JSON object; replies are still scanned for
//! the first balanced `{...}` span since models wrap JSON in prose or code
//! fences. Unparseable replies are retried like transient failures.

use super::{non_blank, BookSource, HttpTransport, RateLimiter, SourceError};
use crate::types::{known_author, PartialRecord, SourceKind, UNKNOWN_AUTHOR};
use crate::utils::{retry_with_delay, RetryPolicy};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
const DEFAULT_MODEL: &str = "sonar-pro";
const SYSTEM_PROMPT: &str =
    "You are a helpful bibliophile assistant who outputs only strict JSON.";

/// Generative-search adapter
pub struct GenerativeSearchSource {
    transport: Arc<dyn HttpTransport>,
    api_key: Option<String>,
    base_url: String,
    model: String,
    retry: RetryPolicy,
    rate_limiter: RateLimiter,
}

impl GenerativeSearchSource {
    /// Without an API key every query fails with `NotConfigured`
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_key: Option<String>,
        retry: RetryPolicy,
        min_interval_ms: u64,
    ) -> Self {
        Self {
            transport,
            api_key,
            base_url: PERPLEXITY_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            retry,
            rate_limiter: RateLimiter::new(min_interval_ms),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn attempt(
        &self,
        api_key: &str,
        request: &Value,
        attempt: u32,
    ) -> Result<Option<PartialRecord>, SourceError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/chat/completions", self.base_url);
        let response = self.transport.post_json(&url, Some(api_key), request).await?;

        let content = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| SourceError::Parse("Completion has no message content".to_string()))?;

        let answer = parse_answer(content)?;
        tracing::debug!(attempt, has_data = answer.has_data(), "Generative search answered");

        Ok(Some(answer).filter(PartialRecord::has_data))
    }
}

#[async_trait]
impl BookSource for GenerativeSearchSource {
    fn kind(&self) -> SourceKind {
        SourceKind::GenerativeSearch
    }

    async fn query(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Option<PartialRecord>, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("Perplexity API key".to_string()))?;

        let request = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(title, author)},
            ],
        });

        retry_with_delay(
            "generative_search",
            self.retry,
            |e: &SourceError| matches!(e, SourceError::Parse(_)) || e.is_transient(),
            |attempt| {
                let request = &request;
                async move { self.attempt(api_key, request, attempt).await }
            },
        )
        .await
    }
}

fn build_prompt(title: &str, author: Option<&str>) -> String {
    let author = known_author(author).unwrap_or(UNKNOWN_AUTHOR);
    format!(
        "Search for and provide the following details for the book \"{title}\" by \"{author}\".\n\
         You must perform a search to find the most accurate and complete information, \
         specifically the ISBN and Publisher.\n\
         If the provided author appears to be multiple people (e.g. separated by hyphens, \
         'and', '&', or just spaces on the cover), verify the correct list of authors.\n\n\
         Details required:\n\
         - Author(s) (Return as an array of strings)\n\
         - ISBN (prefer 13-digit, otherwise 10-digit)\n\
         - Publisher\n\
         - Publication year or date (YYYY or YYYY-MM-DD)\n\
         - Description (Short summary)\n\n\
         Return ONLY a valid JSON object with these exact keys: \
         \"authors\", \"isbn\", \"publisher\", \"publicationDate\", \"description\".\n\
         Do not include any other text or markdown formatting."
    )
}

/// First balanced `{...}` span in free text
///
/// Braces inside JSON strings are ignored. Falls back to the first `{` through
/// the last `}` when the braces never balance.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Decode the model's reply into a partial record
fn parse_answer(content: &str) -> Result<PartialRecord, SourceError> {
    let json_text = extract_json_object(content)
        .ok_or_else(|| SourceError::Parse("No JSON object in reply".to_string()))?;
    let value: Value = serde_json::from_str(json_text)
        .map_err(|e| SourceError::Parse(format!("Invalid JSON in reply: {}", e)))?;
    let obj = value
        .as_object()
        .ok_or_else(|| SourceError::Parse("Reply JSON is not an object".to_string()))?;

    let text = |key: &str| -> Option<String> {
        match obj.get(key)? {
            Value::String(s) => non_blank(Some(s.as_str())).filter(|s| !is_placeholder(s)),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };

    let authors = match obj.get("authors").or_else(|| obj.get("author")) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|a| non_blank(Some(a)))
            .filter(|a| !is_placeholder(a))
            .collect(),
        Some(Value::String(single)) => non_blank(Some(single.as_str()))
            .filter(|a| !is_placeholder(a))
            .into_iter()
            .collect(),
        _ => Vec::new(),
    };

    Ok(PartialRecord {
        source: SourceKind::GenerativeSearch,
        title: text("title"),
        authors,
        isbn: text("isbn"),
        publisher: text("publisher"),
        publication_date: text("publicationDate"),
        description: text("description"),
        cover_url: None,
        info_link: None,
    })
}

/// Filler models emit instead of leaving a field out
fn is_placeholder(value: &str) -> bool {
    ["null", "n/a", "unknown", "none"]
        .iter()
        .any(|p| value.eq_ignore_ascii_case(p))
}
