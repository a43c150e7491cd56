//! In-memory fakes of the page and commit sources

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;
use vuln_harvester::fetcher::{CommitSource, FetcherError, FetcherResult, PageSource};
use vuln_harvester::harvester::{DelayWindow, EnrichmentConfig, HarvestConfig, Pacing};
use vuln_harvester::output::ArtifactLayout;

pub const LISTING_BASE: &str = "https://www.mend.io/vulnerability-database";
pub const DETAIL_REFERER: &str = "https://www.mend.io/vulnerability-database/";

/// Page source serving fixed bodies by URL; unknown URLs fail as if retries ran out
#[derive(Default)]
pub struct FakeSite {
    pages: HashMap<String, String>,
    fetches: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    /// Every fetch as (url, referer), in call order
    pub fn fetches(&self) -> Vec<(String, Option<String>)> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetches().into_iter().map(|(url, _)| url).collect()
    }
}

#[async_trait]
impl PageSource for FakeSite {
    async fn fetch_page(&self, url: &str, referer: Option<&str>) -> FetcherResult<String> {
        self.fetches
            .lock()
            .unwrap()
            .push((url.to_string(), referer.map(str::to_string)));
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetcherError::RetriesExhausted {
                attempts: 5,
                last_error: "HTTP 404".to_string(),
            })
    }
}

/// Commit source answering from a fixed map; unknown queries fail
#[derive(Default)]
pub struct FakeCommitApi {
    responses: HashMap<String, Value>,
    queries: Mutex<Vec<String>>,
}

impl FakeCommitApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, query: impl Into<String>, body: Value) -> Self {
        self.responses.insert(query.into(), body);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommitSource for FakeCommitApi {
    async fn fetch_commit(&self, query_url: &str) -> FetcherResult<Value> {
        self.queries.lock().unwrap().push(query_url.to_string());
        self.responses
            .get(query_url)
            .cloned()
            .ok_or_else(|| FetcherError::RetriesExhausted {
                attempts: 5,
                last_error: "HTTP 404".to_string(),
            })
    }
}

pub fn listing_url(year: i32, month: u32, page: u32) -> String {
    if page <= 1 {
        format!("{LISTING_BASE}/full-listing/{year}/{month}")
    } else {
        format!("{LISTING_BASE}/full-listing/{year}/{month}/{page}")
    }
}

pub fn detail_url(id: &str) -> String {
    format!("https://www.mend.io/vulnerability-database/{id}")
}

pub fn location(id: &str) -> String {
    format!("/vulnerability-database/{id}")
}

/// Listing page with the given item ids and a pagination control ending at `max_page`
pub fn listing_page(ids: &[&str], max_page: u32) -> String {
    let mut body = String::from("<html><body><ul class=\"vuln-list\">");
    for id in ids {
        body.push_str(&format!(
            "<li><a href=\"/vulnerability-database/{id}\">{id}</a></li>"
        ));
    }
    body.push_str("</ul><ul class=\"pagination\">");
    for page in 1..=max_page {
        body.push_str(&format!("<li class=\"vuln-pagination-item\">{page}</li>"));
    }
    body.push_str("<li class=\"vuln-pagination-item\">Next</li></ul></body></html>");
    body
}

/// Detail page; `date: None` leaves the date heading out
pub fn detail_page(date: Option<&str>, cwes: &[&str], references: &[&str]) -> String {
    let mut body = String::from("<html><body>");
    if let Some(date) = date {
        body.push_str(&format!("<h4>Date: {date}</h4>"));
    }
    body.push_str("<h4>Language: Java</h4>");
    body.push_str("<div class=\"single-vuln-desc no-good-to-know\"><p>Weak key derivation.</p></div>");
    for reference in references {
        body.push_str(&format!(
            "<div class=\"reference-row\"><a href=\"{reference}\">ref</a></div>"
        ));
    }
    body.push_str("<div class=\"ranger-value\"><label>9.1</label></div>");
    body.push_str(
        "<table class=\"table table-report\">\
         <tr><th>Attack Vector</th><td>Network</td></tr>\
         <tr><th>Confidentiality</th><td>High</td></tr>\
         </table>",
    );
    body.push_str("<div class=\"light-box\">");
    for cwe in cwes {
        body.push_str(&format!("<a href=\"/cwe/{cwe}\">{cwe}</a>"));
    }
    body.push_str("</div></body></html>");
    body
}

pub fn harvest_config(dir: &TempDir) -> HarvestConfig {
    HarvestConfig {
        layout: ArtifactLayout::new(dir.path().to_path_buf()),
        pacing: Pacing::none(),
        ..HarvestConfig::default()
    }
}

pub fn enrichment_config(dir: &TempDir, api_base: &str) -> EnrichmentConfig {
    EnrichmentConfig {
        api_base: api_base.to_string(),
        layout: ArtifactLayout::new(dir.path().to_path_buf()),
        delay: DelayWindow::none(),
        ..EnrichmentConfig::default()
    }
}
