use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;

use pixie::interfaces::search::WebSearch;
use pixie::tools::search_internet::{SearchInternetTool, SearchProvider};

#[tokio::test]
async fn duckduckgo_instant_answers_become_hits() {
    let server = MockServer::start_async().await;
    let ddg = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/")
                .query_param("q", "rust language")
                .query_param("format", "json")
                .query_param("no_html", "1");
            then.status(200).json_body(json!({
                "Heading": "Rust (programming language)",
                "AbstractText": "Rust is a general-purpose programming language.",
                "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
                "RelatedTopics": [
                    {"Text": "Cargo - The Rust package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                    {"Name": "See also", "Topics": [
                        {"Text": "Ferris - Unofficial mascot", "FirstURL": "https://duckduckgo.com/Ferris"}
                    ]}
                ]
            }));
        })
        .await;

    let tool = SearchInternetTool::new(SearchProvider::DuckDuckGo).with_base_url(server.base_url());
    let hits = tool.search("rust language", 5).await.unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].title, "Rust (programming language)");
    assert_eq!(hits[1].title, "Cargo");
    assert_eq!(hits[2].url.as_deref(), Some("https://duckduckgo.com/Ferris"));
    ddg.assert_calls(1);
}

#[tokio::test]
async fn empty_query_does_not_hit_the_network() {
    let server = MockServer::start_async().await;
    let ddg = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({}));
        })
        .await;
    let tool = SearchInternetTool::new(SearchProvider::DuckDuckGo).with_base_url(server.base_url());
    assert!(tool.search("   ", 5).await.unwrap().is_empty());
    ddg.assert_calls(0);
}

#[tokio::test]
async fn perplexity_answer_and_citations_become_hits() {
    let server = MockServer::start_async().await;
    let sonar = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer pplx-test")
                .body_includes("\"model\":\"sonar\"");
            then.status(200).json_body(json!({
                "choices": [{"message": {"content": "Rust 1.90 shipped this week [1].\n\nSources: example"}}],
                "citations": ["https://blog.rust-lang.org/"]
            }));
        })
        .await;

    let tool = SearchInternetTool::new(SearchProvider::Perplexity)
        .with_base_url(server.base_url())
        .with_api_key("pplx-test");
    let hits = tool.search("latest rust release", 5).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].title, "perplexity answer");
    assert_eq!(hits[0].description, "Rust 1.90 shipped this week [1].");
    assert_eq!(hits[1].url.as_deref(), Some("https://blog.rust-lang.org/"));
    sonar.assert_calls(1);
}

#[tokio::test]
async fn grok_output_text_and_url_citations_become_hits() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/responses")
                .body_includes("\"type\":\"web_search\"");
            then.status(200).json_body(json!({
                "output": [
                    {"type": "web_search_call"},
                    {"type": "message", "content": [{
                        "type": "output_text",
                        "text": "It is sunny.",
                        "annotations": [
                            {"type": "url_citation", "url": "https://weather.example/today"},
                            {"type": "url_citation", "url": "https://weather.example/today"}
                        ]
                    }]}
                ]
            }));
        })
        .await;

    let tool = SearchInternetTool::new(SearchProvider::Grok)
        .with_base_url(server.base_url())
        .with_api_key("xai-test");
    let hits = tool.search("weather", 5).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].description, "It is sunny.");
    assert_eq!(hits[1].title, "Source [1]");
}

#[tokio::test]
async fn provider_errors_carry_status_and_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).body("upstream exploded");
        })
        .await;

    let tool = SearchInternetTool::new(SearchProvider::OpenAi)
        .with_base_url(server.base_url())
        .with_api_key("sk-test");
    let err = tool.search("anything", 5).await.unwrap_err().to_string();
    assert!(err.contains("openai search failed"), "{err}");
    assert!(err.contains("upstream exploded"), "{err}");
}
