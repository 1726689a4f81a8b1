use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Settings;

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<String>>;
}

pub type SharedWebSearch = Arc<dyn WebSearch>;

/// DuckDuckGo instant-answer lookup; returns the abstract plus related-topic snippets.
pub struct DuckDuckGoSearch {
    http: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl DuckDuckGoSearch {
    const DEFAULT_BASE_URL: &'static str = "https://api.duckduckgo.com";

    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("legal-agent-team/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build web search HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            max_results: 5,
        })
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/", self.base_url.trim_end_matches('/'));
        let answer = self
            .http
            .get(url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .context("Web search request failed")?
            .error_for_status()
            .context("Web search returned error status")?
            .json::<InstantAnswer>()
            .await
            .context("Failed to deserialize web search response")?;

        Ok(answer.snippets(self.max_results))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RelatedTopic {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "FirstURL")]
    first_url: Option<String>,
    // Category groups nest their entries one level down.
    #[serde(default)]
    topics: Vec<RelatedTopic>,
}

impl InstantAnswer {
    fn snippets(self, max: usize) -> Vec<String> {
        let mut out = Vec::new();
        if !self.abstract_text.trim().is_empty() {
            out.push(format!("{} ({})", self.abstract_text.trim(), self.abstract_url));
        }

        let mut stack: Vec<RelatedTopic> = self.related_topics.into_iter().rev().collect();
        while let Some(topic) = stack.pop() {
            if out.len() >= max {
                break;
            }
            stack.extend(topic.topics.into_iter().rev());
            if let Some(text) = topic.text.filter(|t| !t.trim().is_empty()) {
                match topic.first_url {
                    Some(url) => out.push(format!("{text} ({url})")),
                    None => out.push(text),
                }
            }
        }

        out.truncate(max);
        out
    }
}

/// Optional capabilities resolved once at startup and injected into the roster.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub search: Option<SharedWebSearch>,
}

impl Capabilities {
    pub fn resolve(settings: &Settings) -> Self {
        if !settings.web_search_enabled {
            info!("Web search disabled by configuration");
            return Self::default();
        }

        match DuckDuckGoSearch::new() {
            Ok(search) => Self {
                search: Some(Arc::new(search)),
            },
            Err(err) => {
                warn!(?err, "Web search unavailable; researcher runs without tools");
                Self::default()
            }
        }
    }

    pub fn search_available(&self) -> bool {
        self.search.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_settings;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn duckduckgo_flattens_nested_topics() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "force majeure"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "AbstractText": "Force majeure is a contract clause.",
                "AbstractURL": "https://en.wikipedia.org/wiki/Force_majeure",
                "RelatedTopics": [
                    { "Text": "Act of God", "FirstURL": "https://duckduckgo.com/Act_of_God" },
                    { "Name": "Law", "Topics": [
                        { "Text": "Frustration of purpose", "FirstURL": "https://duckduckgo.com/Frustration" }
                    ]}
                ]
            })))
            .mount(&server)
            .await;

        let search = DuckDuckGoSearch::with_base_url(server.uri()).expect("client");
        let snippets = search.search("force majeure").await.expect("search");

        assert_eq!(snippets.len(), 3);
        assert!(snippets[0].starts_with("Force majeure is a contract clause."));
        assert!(snippets[1].starts_with("Act of God"));
        assert!(snippets[2].starts_with("Frustration of purpose"));
    }

    #[test]
    fn disabled_search_resolves_to_an_empty_capability_set() {
        let caps = Capabilities::resolve(&test_settings());
        assert!(!caps.search_available());
    }

    #[test]
    fn enabled_search_resolves_to_duckduckgo() {
        let settings = Settings {
            web_search_enabled: true,
            ..test_settings()
        };
        assert!(Capabilities::resolve(&settings).search_available());
    }
}
