//! Paginated fetching of Zotero API listings.
//!
//! The first page is requested on its own to learn the `Total-Results`
//! count; every remaining page is then dispatched at once and joined. Failed
//! pages are logged and dropped so that one slow or broken page never costs
//! the whole listing.

use futures_util::future::join_all;
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use std::time::Duration;

use crate::utils::{HttpClient, RequestLog};

/// Response header carrying the total number of results of a listing
pub const TOTAL_RESULTS_HEADER: &str = "Total-Results";

/// Default number of results per page (the API maximum)
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default per-page timeout
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches every page of a listing and returns the page bodies
#[derive(Debug, Clone)]
pub struct BatchFetcher {
    client: HttpClient,
    page_size: usize,
    timeout: Duration,
}

impl BatchFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
            timeout: DEFAULT_PAGE_TIMEOUT,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch all pages of `url`.
    ///
    /// Returns the bodies in page order: the first page, then the remaining
    /// pages in the order they were dispatched. A failed first page yields
    /// nothing; a failed later page is skipped.
    pub async fn fetch(
        &self,
        url: &str,
        headers: &HeaderMap,
        params: &[(String, String)],
        log: &RequestLog,
    ) -> Vec<String> {
        let mut bodies = Vec::new();
        let limit = self.page_size.to_string();

        let Some(first) = self.get_page(url, headers, params, &limit, None, log).await else {
            return bodies;
        };

        let total = first
            .headers()
            .get(TOTAL_RESULTS_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok());

        match first.text().await {
            Ok(text) => bodies.push(text),
            Err(e) => {
                log.error(format!("Failed to read response from {}: {}", url, e));
                return bodies;
            }
        }

        let Some(total) = total else {
            log.warn(format!(
                "Response from {} carried no usable {} header, returning the first page only",
                url, TOTAL_RESULTS_HEADER
            ));
            return bodies;
        };

        let starts = page_starts(total, self.page_size);
        if starts.is_empty() {
            return bodies;
        }
        log.debug(format!(
            "Fetching {} more pages of {} ({} results)",
            starts.len(),
            url,
            total
        ));

        let pages = starts.iter().map(|start| {
            let limit = &limit;
            async move {
                let response = self
                    .get_page(url, headers, params, limit, Some(*start), log)
                    .await?;
                match response.text().await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        log.error(format!(
                            "Failed to read response from {} (start={}): {}",
                            url, start, e
                        ));
                        None
                    }
                }
            }
        });

        // join_all keeps dispatch order regardless of completion order
        bodies.extend(join_all(pages).await.into_iter().flatten());
        bodies
    }

    async fn get_page(
        &self,
        url: &str,
        headers: &HeaderMap,
        params: &[(String, String)],
        limit: &str,
        start: Option<usize>,
        log: &RequestLog,
    ) -> Option<Response> {
        let mut request = self
            .client
            .get(url)
            .headers(headers.clone())
            .query(params)
            .query(&[("limit", limit)])
            .timeout(self.timeout);
        if let Some(start) = start {
            request = request.query(&[("start", start)]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() { "timed out" } else { "failed" };
                log.error(format!(
                    "Request to {} (start={}) {}: {}",
                    url,
                    start.unwrap_or(0),
                    reason,
                    e
                ));
                return None;
            }
        };

        log.info(format!("Requested {}", response.url()));
        if response_is_ok(&response, log) {
            Some(response)
        } else {
            None
        }
    }
}

/// Start offsets of the pages following the first one
pub fn page_starts(total: usize, page_size: usize) -> Vec<usize> {
    if page_size == 0 {
        return Vec::new();
    }
    (page_size..total).step_by(page_size).collect()
}

fn response_is_ok(response: &Response, log: &RequestLog) -> bool {
    let status = response.status();
    if status == StatusCode::OK {
        return true;
    }
    log.error(format!("Zotero API returned with code: {}", status.as_u16()));
    if status == StatusCode::FORBIDDEN {
        log.error(
            "Check that the group/collection ID and key are correct and that the key has \
             the necessary permissions.",
        );
    }
    false
}
