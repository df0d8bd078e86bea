use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::{PixieError, Result};
use crate::interfaces::search::{SearchHit, WebSearch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProvider {
    DuckDuckGo,
    Perplexity,
    OpenAi,
    Grok,
}

impl SearchProvider {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "perplexity" => SearchProvider::Perplexity,
            "openai" => SearchProvider::OpenAi,
            "grok" | "xai" => SearchProvider::Grok,
            _ => SearchProvider::DuckDuckGo,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SearchProvider::DuckDuckGo => "duckduckgo",
            SearchProvider::Perplexity => "perplexity",
            SearchProvider::OpenAi => "openai",
            SearchProvider::Grok => "grok",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            SearchProvider::DuckDuckGo => "https://api.duckduckgo.com",
            SearchProvider::Perplexity => "https://api.perplexity.ai",
            SearchProvider::OpenAi => "https://api.openai.com/v1",
            SearchProvider::Grok => "https://api.x.ai/v1",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            SearchProvider::DuckDuckGo => "",
            SearchProvider::Perplexity => "sonar",
            SearchProvider::OpenAi => "gpt-4o-mini-search-preview",
            SearchProvider::Grok => "grok-4-1-fast-non-reasoning",
        }
    }
}

/// Web search backed by a keyless instant-answer API or an LLM search API.
pub struct SearchInternetTool {
    provider: SearchProvider,
    api_key: Option<String>,
    model: String,
    base_url: String,
    network_allow: Vec<String>,
    default_deny: bool,
    timeout: Duration,
    http: Client,
}

impl SearchInternetTool {
    pub fn new(provider: SearchProvider) -> Self {
        Self {
            provider,
            api_key: None,
            model: provider.default_model().to_string(),
            base_url: provider.default_base_url().to_string(),
            network_allow: Vec::new(),
            default_deny: false,
            timeout: Duration::from_secs(90),
            http: Client::new(),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        let mut tool = Self::new(SearchProvider::parse(&config.provider));
        tool.api_key = config.api_key.clone().filter(|key| !key.trim().is_empty());
        if let Some(model) = config.model.clone().filter(|model| !model.trim().is_empty()) {
            tool.model = model;
        }
        tool.network_allow = config.network_allow.clone();
        tool.default_deny = config.default_deny;
        tool
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_network_policy(mut self, network_allow: Vec<String>, default_deny: bool) -> Self {
        self.network_allow = network_allow;
        self.default_deny = default_deny;
        self
    }

    pub fn provider(&self) -> SearchProvider {
        self.provider
    }

    fn is_domain_allowed(domain: &str, allowlist: &[String], default_deny: bool) -> bool {
        if allowlist.iter().any(|entry| entry == "*") {
            return true;
        }
        if allowlist.is_empty() {
            return !default_deny;
        }
        allowlist.iter().any(|entry| {
            if entry == domain {
                return true;
            }
            if let Some(suffix) = entry.strip_prefix("*.") {
                return domain.ends_with(suffix);
            }
            false
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let url = Url::parse(&raw)
            .map_err(|e| PixieError::Config(format!("Invalid search endpoint {raw}: {e}")))?;
        let domain = url.host_str().unwrap_or_default();
        if !Self::is_domain_allowed(domain, &self.network_allow, self.default_deny) {
            return Err(PixieError::Runtime(format!(
                "Network access denied for {domain}"
            )));
        }
        Ok(url)
    }

    fn require_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            PixieError::Config(format!(
                "Search provider '{}' needs SearchAPIKey",
                self.provider.name()
            ))
        })
    }

    async fn post_json(&self, url: Url, payload: &Value) -> Result<Value> {
        let response = self
            .http
            .post(url)
            .bearer_auth(self.require_key()?)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| PixieError::Http(format!("{} search failed: {e}", self.provider.name())))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PixieError::Http(format!(
                "{} search failed ({status}): {text}",
                self.provider.name()
            )));
        }
        Ok(response.json().await?)
    }

    async fn search_duckduckgo(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let url = self.endpoint("")?;
        let response = self
            .http
            .get(url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PixieError::Http(format!("duckduckgo search failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PixieError::Http(format!(
                "duckduckgo search failed ({status})"
            )));
        }
        let body = response.text().await?;
        let data: Value = serde_json::from_str(&body)?;
        Ok(Self::parse_duckduckgo(&data, limit))
    }

    fn parse_duckduckgo(data: &Value, limit: usize) -> Vec<SearchHit> {
        let text = |value: &Value, key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let mut hits = Vec::new();
        if let Some(answer) = text(data, "Answer") {
            hits.push(SearchHit {
                title: "Instant answer".to_string(),
                description: answer,
                url: None,
            });
        }
        if let Some(abstract_text) = text(data, "AbstractText") {
            hits.push(SearchHit {
                title: text(data, "Heading").unwrap_or_else(|| "Summary".to_string()),
                description: abstract_text,
                url: text(data, "AbstractURL"),
            });
        }

        let mut topics: Vec<&Value> = Vec::new();
        if let Some(related) = data.get("RelatedTopics").and_then(|v| v.as_array()) {
            for topic in related {
                match topic.get("Topics").and_then(|v| v.as_array()) {
                    Some(nested) => topics.extend(nested.iter()),
                    None => topics.push(topic),
                }
            }
        }
        for topic in topics {
            let Some(description) = text(topic, "Text") else {
                continue;
            };
            let title = description
                .split(" - ")
                .next()
                .unwrap_or(description.as_str())
                .to_string();
            hits.push(SearchHit {
                title,
                description,
                url: text(topic, "FirstURL"),
            });
        }
        hits.truncate(limit);
        hits
    }

    async fn search_chat_completions(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let url = self.endpoint("chat/completions")?;
        let system = match self.provider {
            SearchProvider::Perplexity => {
                "You search the Internet for current information. Include detailed information with citations like [1], [2], etc."
            }
            _ => "You are a helpful assistant that searches the internet for current information.",
        };
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": query}
            ]
        });
        let data = self.post_json(url, &payload).await?;
        let mut content = data
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if let Some(split) = content.split("Sources:").next() {
            content = split.trim().to_string();
        }
        let citations: Vec<String> = data
            .get("citations")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        item.as_str()
                            .or_else(|| item.get("url").and_then(|u| u.as_str()))
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(self.answer_hits(content, citations, limit))
    }

    async fn search_grok(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let url = self.endpoint("responses")?;
        let payload = json!({
            "model": self.model,
            "input": [{"role": "user", "content": query}],
            "tools": [{"type": "web_search"}, {"type": "x_search"}],
        });
        let data = self.post_json(url, &payload).await?;

        let mut content = String::new();
        let mut sources: Vec<String> = Vec::new();
        let mut parts = data
            .get("output")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter(|item| item.get("type").and_then(|v| v.as_str()) == Some("message"))
            .filter_map(|item| item.get("content").and_then(|v| v.as_array()))
            .flatten()
            .filter(|part| part.get("type").and_then(|v| v.as_str()) == Some("output_text"));
        if let Some(part) = parts.next() {
            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                content = text.to_string();
            }
            let annotations = part
                .get("annotations")
                .and_then(|v| v.as_array())
                .into_iter()
                .flatten()
                .filter(|a| a.get("type").and_then(|v| v.as_str()) == Some("url_citation"))
                .filter_map(|a| a.get("url").and_then(|v| v.as_str()));
            for url in annotations {
                if !sources.iter().any(|seen| seen == url) {
                    sources.push(url.to_string());
                }
            }
        }
        Ok(self.answer_hits(content, sources, limit))
    }

    fn answer_hits(&self, content: String, sources: Vec<String>, limit: usize) -> Vec<SearchHit> {
        let mut hits = Vec::new();
        if !content.trim().is_empty() {
            hits.push(SearchHit {
                title: format!("{} answer", self.provider.name()),
                description: content.trim().to_string(),
                url: None,
            });
        }
        for (idx, url) in sources.into_iter().enumerate() {
            hits.push(SearchHit {
                title: format!("Source [{}]", idx + 1),
                description: url.clone(),
                url: Some(url),
            });
        }
        hits.truncate(limit.max(1));
        hits
    }
}

#[async_trait]
impl WebSearch for SearchInternetTool {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = self.provider.name(), query, "Searching the web");
        match self.provider {
            SearchProvider::DuckDuckGo => self.search_duckduckgo(query, limit).await,
            SearchProvider::Perplexity | SearchProvider::OpenAi => {
                self.search_chat_completions(query, limit).await
            }
            SearchProvider::Grok => self.search_grok(query, limit).await,
        }
    }
}
