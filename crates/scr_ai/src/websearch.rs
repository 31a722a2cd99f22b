use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::openai::clip;

const MAX_NOTE_CHARS: usize = 1_000;

/// Supplementary lookup. Implementations never fail: no result and errors are both `None`.
pub trait WebSearch: Send + Sync {
    fn search(&self, query: &str) -> Option<String>;
}

/// DuckDuckGo instant-answer API.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    endpoint: String,
    timeout: Duration,
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self {
            endpoint: "https://api.duckduckgo.com/".to_string(),
            timeout: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InstantAnswer {
    #[serde(rename = "AbstractText")]
    abstract_text: String,
    #[serde(rename = "Answer")]
    answer: String,
    #[serde(rename = "RelatedTopics")]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RelatedTopic {
    #[serde(rename = "Text")]
    text: String,
}

impl DuckDuckGoSearch {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            timeout,
        }
    }

    fn fetch(&self, query: &str) -> Result<InstantAnswer, String> {
        ureq::get(&self.endpoint)
            .query("q", query)
            .query("format", "json")
            .query("no_html", "1")
            .query("skip_disambig", "1")
            .timeout(self.timeout)
            .call()
            .map_err(|e| e.to_string())?
            .into_json::<InstantAnswer>()
            .map_err(|e| e.to_string())
    }
}

impl WebSearch for DuckDuckGoSearch {
    fn search(&self, query: &str) -> Option<String> {
        match self.fetch(query) {
            Ok(answer) => summarize(answer),
            Err(e) => {
                debug!(error = %e, "web lookup failed; ignoring");
                None
            }
        }
    }
}

fn summarize(a: InstantAnswer) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for text in [a.answer, a.abstract_text] {
        if !text.trim().is_empty() {
            parts.push(text.trim().to_string());
        }
    }
    parts.extend(
        a.related_topics
            .into_iter()
            .map(|t| t.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(3),
    );
    if parts.is_empty() {
        return None;
    }
    Some(clip(&parts.join("\n"), MAX_NOTE_CHARS).to_string())
}
