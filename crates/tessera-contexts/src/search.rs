// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Web search and page reading.
//!
//! `search_google` goes through a [`SearchBackend`]; the default backend is
//! the Google Custom Search JSON API.  `read_webpage` fetches a page and
//! converts HTML to plain text.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{bail, Context as _};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use tessera_config::ToolsConfig;
use tessera_core::{Context, ContextData};
use tessera_tools::{
    AgentIdentity, FnTool, ParamType, SchemaError, Tool, ToolCtx, ToolResponse, ToolSignature,
    ToolValue, DEFAULT_SUMMARY_LIMIT,
};

use crate::{dedent, finish_tools, new_context_id, restore_id, tool_names};

pub const GOOGLE_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const USER_AGENT: &str = "tessera-agent/0.1";
const PREVIEW_CHARS: usize = 200;

const INSTRUCTIONS: &str = "
    You have access to web search and content reading tools that allow you to:
    1. Search Google for information
    2. Read and extract content from web pages

    Use these capabilities when you need to:
    - Find information on the web
    - Read and analyze webpage content
    - Research topics or answer questions
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub description: String,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, num_results: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Google Custom Search.  Key and engine id are read from the environment
/// on every call so they can be provided after startup.
pub struct GoogleSearch {
    endpoint: String,
    api_key_env: String,
    engine_id_env: String,
}

impl GoogleSearch {
    pub fn new(
        endpoint: impl Into<String>,
        api_key_env: impl Into<String>,
        engine_id_env: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key_env: api_key_env.into(),
            engine_id_env: engine_id_env.into(),
        }
    }

    pub fn from_config(cfg: &ToolsConfig) -> Self {
        Self::new(
            cfg.search_endpoint.as_deref().unwrap_or(GOOGLE_SEARCH_ENDPOINT),
            &cfg.search_api_key_env,
            &cfg.search_engine_id_env,
        )
    }

    fn credential(var: &str) -> anyhow::Result<String> {
        match std::env::var(var) {
            Ok(v) if !v.is_empty() => Ok(v),
            _ => bail!("{var} is not set"),
        }
    }
}

#[async_trait]
impl SearchBackend for GoogleSearch {
    async fn search(&self, query: &str, num_results: usize) -> anyhow::Result<Vec<SearchHit>> {
        let key = Self::credential(&self.api_key_env)?;
        let cx = Self::credential(&self.engine_id_env)?;
        // The API serves at most ten results per request.
        let num = num_results.clamp(1, 10).to_string();

        debug!(%query, num_results, "google search");
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()?;
        let resp = client
            .get(&self.endpoint)
            .query(&[("key", key.as_str()), ("cx", cx.as_str()), ("q", query), ("num", num.as_str())])
            .send()
            .await
            .context("search request failed")?;
        if !resp.status().is_success() {
            bail!("search API returned status {}", resp.status());
        }
        let body: Value = resp.json().await.context("decoding search response")?;
        Ok(parse_google_items(&body))
    }
}

fn parse_google_items(body: &Value) -> Vec<SearchHit> {
    let items = body.get("items").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
    items
        .iter()
        .map(|item| {
            let field = |key: &str, fallback: &str| {
                item.get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(fallback)
                    .to_string()
            };
            SearchHit {
                title: field("title", "No title available"),
                link: field("link", ""),
                description: field("snippet", "No description available"),
            }
        })
        .collect()
}

// ── Page reading ──────────────────────────────────────────────────────────────

struct Page {
    title: String,
    text: String,
}

async fn fetch_page(url: &str) -> anyhow::Result<Page> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(3))
        .user_agent(USER_AGENT)
        .build()?;
    let response = client.get(url).send().await?.error_for_status()?;
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    let body = response.text().await?;

    if content_type.contains("html") {
        Ok(Page {
            title: html_title(&body).unwrap_or_else(|| "No title found".to_string()),
            text: html_to_text(&body),
        })
    } else {
        Ok(Page { title: "No title found".to_string(), text: body })
    }
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 100)
}

fn html_title(html: &str) -> Option<String> {
    static TITLE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = TITLE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok()).as_ref()?;
    let title = re.captures(html)?.get(1)?.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

/// Cut to `max_chars` characters, noting the original length.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...[truncated at {max_chars} chars; total {total} chars]")
}

// ── Tools ─────────────────────────────────────────────────────────────────────

fn search_google(backend: Arc<dyn SearchBackend>) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "search_google",
        "Execute a Google search and return the results.\n\n\
         query: the search query string\n\
         num_results: number of results to return (default: 5)",
    )
    .required("query", ParamType::String)
    .optional("num_results", ParamType::Integer, json!(5));
    FnTool::new(sig, move |_ctx, args| {
        let backend = backend.clone();
        async move {
            let query = args.str("query")?.to_string();
            let num_results = args.i64("num_results")?.max(1) as usize;
            let resp = match backend.search(&query, num_results).await {
                Ok(hits) => ToolResponse::ok(
                    format!("Found {} results for '{query}'", hits.len()),
                    serde_json::to_value(&hits)?,
                ),
                Err(e) => {
                    let msg = format!("Search failed: {e:#}");
                    ToolResponse { summary: msg.clone(), content: Some(json!([])), error: Some(msg) }
                }
            };
            anyhow::Ok(ToolValue::from(resp))
        }
    })
}

fn read_webpage(default_max_chars: usize) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "read_webpage",
        "Read and extract the text content of a webpage.\n\n\
         url: the URL of the webpage to read\n\
         max_chars: maximum characters of content to return",
    )
    .required("url", ParamType::String)
    .optional("max_chars", ParamType::Integer, json!(default_max_chars));
    FnTool::new(sig, |_ctx, args| async move {
        let url = args.str("url")?.to_string();
        let max_chars = args.i64("max_chars")?.max(1) as usize;
        let resp = match fetch_page(&url).await {
            Ok(page) => ToolResponse::ok(
                format!("Successfully read webpage: {}", page.title),
                json!({
                    "title": page.title,
                    "content": truncate_chars(&page.text, max_chars),
                    "preview": truncate_chars(&page.text, PREVIEW_CHARS),
                    "url": url,
                }),
            ),
            Err(e) => {
                let msg = format!("Failed to read webpage: {e:#}");
                ToolResponse {
                    summary: msg.clone(),
                    content: Some(json!({"title": "Error", "content": "", "preview": msg, "url": url})),
                    error: Some(msg),
                }
            }
        };
        anyhow::Ok(ToolValue::from(resp))
    })
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Stateless: only the tools and their backend.
pub struct SearchContext {
    id: String,
    tools: Vec<Arc<dyn Tool>>,
}

impl SearchContext {
    pub const KIND: &'static str = "search";

    pub fn new(backend: Arc<dyn SearchBackend>, max_chars: usize) -> Result<Self, SchemaError> {
        Self::with_summary_limit(backend, max_chars, DEFAULT_SUMMARY_LIMIT)
    }

    pub fn with_summary_limit(
        backend: Arc<dyn SearchBackend>,
        max_chars: usize,
        summary_limit: usize,
    ) -> Result<Self, SchemaError> {
        let tools = vec![search_google(backend)?, read_webpage(max_chars)?];
        Ok(Self { id: new_context_id(), tools: finish_tools(tools, summary_limit) })
    }
}

impl Context for SearchContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }

    fn get_context(&self, _identity: &AgentIdentity) -> Option<ContextData> {
        let mut data = Map::new();
        data.insert("current_query".into(), Value::Null);
        data.insert("tools".into(), tool_names(&self.tools));
        Some(data)
    }

    fn get_context_instructions(&self, _identity: &AgentIdentity) -> Option<String> {
        Some(dedent(INSTRUCTIONS))
    }

    fn serialize(&self) -> Value {
        json!({"id": self.id})
    }

    fn deserialize(&mut self, state: &Value, _ctx: &ToolCtx) -> anyhow::Result<()> {
        restore_id(&mut self.id, state);
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Returns canned hits and records the requested count.
    #[derive(Default)]
    struct StubBackend {
        requested: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl SearchBackend for StubBackend {
        async fn search(&self, query: &str, num_results: usize) -> anyhow::Result<Vec<SearchHit>> {
            self.requested.lock().unwrap().push(num_results);
            if query == "fail" {
                bail!("quota exceeded");
            }
            Ok(vec![SearchHit {
                title: "Rust".into(),
                link: "https://www.rust-lang.org".into(),
                description: "A language".into(),
            }])
        }
    }

    fn ctx() -> ToolCtx {
        ToolCtx::new(AgentIdentity::new("tester"))
    }

    fn search_tool(backend: Arc<StubBackend>) -> Arc<dyn Tool> {
        SearchContext::new(backend, 1000).unwrap().tools().remove(0)
    }

    #[tokio::test]
    async fn search_reports_hits_with_default_count() {
        let backend = Arc::new(StubBackend::default());
        let resp = search_tool(backend.clone()).call(ctx(), json!({"query": "rust"})).await;
        assert_eq!(resp.summary, "Found 1 results for 'rust'");
        assert_eq!(resp.content.unwrap()[0]["link"], "https://www.rust-lang.org");
        assert_eq!(*backend.requested.lock().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn search_failure_keeps_empty_content() {
        let backend = Arc::new(StubBackend::default());
        let resp = search_tool(backend).call(ctx(), json!({"query": "fail"})).await;
        assert_eq!(resp.error.as_deref(), Some("Search failed: quota exceeded"));
        assert_eq!(resp.content, Some(json!([])));
    }

    #[tokio::test]
    async fn google_without_credentials_fails() {
        let google = GoogleSearch::new(
            GOOGLE_SEARCH_ENDPOINT,
            "TESSERA_TEST_UNSET_SEARCH_KEY",
            "TESSERA_TEST_UNSET_ENGINE_ID",
        );
        let err = google.search("rust", 3).await.unwrap_err();
        assert!(err.to_string().contains("TESSERA_TEST_UNSET_SEARCH_KEY is not set"));
    }

    #[test]
    fn google_items_are_mapped() {
        let body = json!({"items": [
            {"title": "A", "link": "https://a", "snippet": "first"},
            {"link": "https://b", "snippet": ""}
        ]});
        let hits = parse_google_items(&body);
        assert_eq!(hits[0].description, "first");
        assert_eq!(hits[1].title, "No title available");
        assert_eq!(hits[1].description, "No description available");
        assert!(parse_google_items(&json!({})).is_empty());
    }

    #[test]
    fn html_is_converted_and_titled() {
        let html = "<html><head><TITLE>\n  Hello   Page </TITLE></head>\
                    <body><h1>Hello</h1><p>World</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("World"));
        assert!(!text.contains("<p>"));
        assert_eq!(html_title(html).as_deref(), Some("Hello Page"));
        assert_eq!(html_title("<p>no title</p>"), None);
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo", 2), "hé...[truncated at 2 chars; total 5 chars]");
    }

    #[tokio::test]
    async fn unreachable_page_is_reported() {
        let tool = SearchContext::new(Arc::new(StubBackend::default()), 1000).unwrap().tools().remove(1);
        let resp = tool.call(ctx(), json!({"url": "http://127.0.0.1:9/nothing"})).await;
        assert!(resp.error.unwrap().starts_with("Failed to read webpage:"));
        assert_eq!(resp.content.unwrap()["title"], "Error");
    }

    #[test]
    fn snapshot_has_no_current_query() {
        let search = SearchContext::new(Arc::new(StubBackend::default()), 1000).unwrap();
        let data = search.get_context(&AgentIdentity::new("a")).unwrap();
        assert_eq!(data["current_query"], Value::Null);
        assert_eq!(data["tools"], json!(["search_google", "read_webpage"]));
    }
}
