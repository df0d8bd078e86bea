use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::debug;

pub const DEFAULT_QUOTE_URL: &str = "https://stooq.com/q/l/?s=aapl.us&i=5";
pub const DEFAULT_MARKET_CAP_URL: &str = "https://companiesmarketcap.com/apple/marketcap/";

const STOCK_CUES: &[&str] = &["stock", "share", "price", "aapl"];
const VALUATION_CUES: &[&str] = &["networth", "net worth", "market cap", "valuation"];

static MARKET_CAP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"As of ([A-Za-z]+ \d{4}) Apple has a market cap of (\$[0-9.]+ [A-Za-z]+ USD)")
        .unwrap()
});

/// Live Apple quote and market-cap lines for finance questions. Lookup
/// failures are skipped.
pub struct FinanceSnapshot {
    http: Client,
    quote_url: String,
    market_cap_url: String,
}

impl Default for FinanceSnapshot {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_URL, DEFAULT_MARKET_CAP_URL)
    }
}

impl FinanceSnapshot {
    pub fn new(quote_url: impl Into<String>, market_cap_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            quote_url: quote_url.into(),
            market_cap_url: market_cap_url.into(),
        }
    }

    pub async fn snapshot(&self, query: &str) -> Option<String> {
        let q = query.to_lowercase();
        if !q.contains("apple") {
            return None;
        }

        let mut lines = Vec::new();
        if STOCK_CUES.iter().any(|cue| q.contains(cue)) {
            if let Some(line) = self.fetch(&self.quote_url).await.and_then(|body| parse_quote(&body)) {
                lines.push(line);
            }
        }
        if VALUATION_CUES.iter().any(|cue| q.contains(cue)) {
            if let Some(line) = self
                .fetch(&self.market_cap_url)
                .await
                .and_then(|body| parse_market_cap(&body))
            {
                lines.push(line);
            }
        }

        if lines.is_empty() {
            return None;
        }
        Some(format!("Finance data:\n{}", lines.join("\n")))
    }

    async fn fetch(&self, url: &str) -> Option<String> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|err| debug!(url, error = %err, "Finance lookup failed"))
            .ok()?;
        if !response.status().is_success() {
            debug!(url, status = %response.status(), "Finance lookup rejected");
            return None;
        }
        response.text().await.ok()
    }
}

/// `symbol,date,time,open,high,low,close[,volume]` from the quote endpoint.
pub fn parse_quote(body: &str) -> Option<String> {
    let parts: Vec<&str> = body.trim().split(',').map(str::trim).collect();
    if parts.len() < 7 {
        return None;
    }
    let (symbol, date, time, high, low, close) =
        (parts[0], parts[1], parts[2], parts[4], parts[5], parts[6]);
    Some(format!(
        "Apple stock snapshot: Symbol={symbol}, Date={date}, Time={time}, Last/Close={close}, High={high}, Low={low}."
    ))
}

pub fn parse_market_cap(body: &str) -> Option<String> {
    let caps = MARKET_CAP_RE.captures(body)?;
    Some(format!(
        "Apple market cap snapshot: {} (as of {}).",
        &caps[2], &caps[1]
    ))
}
