//! Lazy paged retrieval.
//!
//! A search returns its results as a chain of bundles linked by `next` relations. The fetcher
//! walks that chain one request at a time:
//!
//! - `Requesting(url)`: the next call to `next()` GETs `url` and yields the page
//! - `Exhausted`: there is nothing more to fetch
//!
//! The fetcher becomes exhausted when the last page carried no `next` link or a page URL came
//! round twice. A failed request, a malformed link list or an unresolvable link also exhausts it:
//! the fault is logged rather than surfaced, and pages already yielded stand.

use crate::connection::Connection;
use chrono::NaiveDate;
use fhir::Bundle;
use serde_json::Value;
use std::collections::HashSet;
use std::iter::FusedIterator;
use url::Url;

/// Optional inclusive date bounds for a search, sent as `date=ge<start>` and `date=le<end>`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(2);
        if let Some(start) = self.start {
            pairs.push(("date", format!("ge{}", start.format("%Y-%m-%d"))));
        }
        if let Some(end) = self.end {
            pairs.push(("date", format!("le{}", end.format("%Y-%m-%d"))));
        }
        pairs
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchState {
    Requesting(Url),
    Exhausted,
}

/// Iterator over the raw JSON pages of one search.
pub struct PageFetcher<'a> {
    connection: &'a Connection,
    resource_type: String,
    request_url: Url,
    state: FetchState,
    visited: HashSet<String>,
    pages: usize,
}

impl<'a> PageFetcher<'a> {
    pub(crate) fn new(connection: &'a Connection, resource_type: &str, request_url: Url) -> Self {
        Self {
            connection,
            resource_type: resource_type.to_owned(),
            state: FetchState::Requesting(request_url.clone()),
            request_url,
            visited: HashSet::new(),
            pages: 0,
        }
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn request_url(&self) -> &Url {
        &self.request_url
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    fn advance(&self, page: &Value) -> FetchState {
        let link = match Bundle::next_link(page) {
            Ok(Some(link)) => link,
            Ok(None) => return FetchState::Exhausted,
            Err(e) => {
                tracing::warn!(
                    "{} page {} has a malformed link list: {}",
                    self.resource_type,
                    self.pages,
                    e
                );
                return FetchState::Exhausted;
            }
        };

        match self.connection.resolve_next_url(&self.request_url, &link) {
            Ok(url) => FetchState::Requesting(url),
            Err(e) => {
                tracing::warn!(
                    "cannot follow {} next link after page {}: {}",
                    self.resource_type,
                    self.pages,
                    e
                );
                FetchState::Exhausted
            }
        }
    }
}

impl Iterator for PageFetcher<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let url = match std::mem::replace(&mut self.state, FetchState::Exhausted) {
            FetchState::Requesting(url) => url,
            settled => {
                self.state = settled;
                return None;
            }
        };

        if !self.visited.insert(url.to_string()) {
            tracing::warn!(
                "{} paging revisited {}; stopping after {} pages",
                self.resource_type,
                url,
                self.pages
            );
            return None;
        }

        match self.connection.get_json(&url) {
            Ok(page) => {
                self.pages += 1;
                tracing::debug!("fetched {} page {}", self.resource_type, self.pages);
                self.state = self.advance(&page);
                Some(page)
            }
            Err(e) => {
                tracing::warn!(
                    "failed to fetch {} page {}: {}",
                    self.resource_type,
                    self.pages + 1,
                    e
                );
                None
            }
        }
    }
}

impl FusedIterator for PageFetcher<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::hapi_connection;
    use crate::transport::testing::FakeTransport;
    use serde_json::json;

    fn page(id: &str, next: Option<&str>) -> Value {
        let mut bundle = json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {"resourceType": "Observation", "id": id}}]
        });
        if let Some(next) = next {
            bundle["link"] = json!([
                {"relation": "self", "url": "ignored"},
                {"relation": "next", "url": next}
            ]);
        }
        bundle
    }

    #[test]
    fn date_window_renders_ge_and_le() {
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2021, 3, 1),
            NaiveDate::from_ymd_opt(2021, 3, 9),
        );
        assert_eq!(
            window.query_pairs(),
            vec![
                ("date", "ge2021-03-01".to_owned()),
                ("date", "le2021-03-09".to_owned())
            ]
        );
        assert!(DateWindow::unbounded().query_pairs().is_empty());
    }

    #[test]
    fn follows_next_links_until_absent() {
        let transport = FakeTransport::new()
            .respond(
                "https://hapi.example.org/fhir/Observation?patient=p1",
                page("o1", Some("http://internal/fhir?_getpages=x&_getpagesoffset=1")),
            )
            .respond(
                "https://hapi.example.org/fhir?_getpages=x&_getpagesoffset=1",
                page("o2", Some("http://internal/fhir?_getpages=x&_getpagesoffset=2")),
            )
            .respond(
                "https://hapi.example.org/fhir?_getpages=x&_getpagesoffset=2",
                page("o3", None),
            );
        let conn = hapi_connection(transport);

        let mut fetcher = conn
            .search("Observation", &[("patient", "p1".into())])
            .expect("search");
        let pages: Vec<Value> = fetcher.by_ref().collect();

        let ids: Vec<&str> = pages
            .iter()
            .filter_map(|p| p["entry"][0]["resource"]["id"].as_str())
            .collect();
        assert_eq!(ids, vec!["o1", "o2", "o3"]);
        assert_eq!(fetcher.state(), &FetchState::Exhausted);
        assert_eq!(fetcher.pages_fetched(), 3);
    }

    #[test]
    fn single_page_without_links_is_exhausted() {
        let transport = FakeTransport::new().respond(
            "https://hapi.example.org/fhir/Encounter",
            json!({"resourceType": "Bundle", "total": 0}),
        );
        let conn = hapi_connection(transport);

        let mut fetcher = conn.search("Encounter", &[]).expect("search");
        assert!(fetcher.next().is_some());
        assert!(fetcher.next().is_none());
        assert_eq!(fetcher.state(), &FetchState::Exhausted);
    }

    #[test]
    fn failure_mid_chain_keeps_earlier_pages() {
        let transport = FakeTransport::new().respond(
            "https://hapi.example.org/fhir/Observation?patient=p1",
            page("o1", Some("http://internal/fhir?_getpages=x&_getpagesoffset=1")),
        );
        let conn = hapi_connection(transport);

        let mut fetcher = conn
            .search("Observation", &[("patient", "p1".into())])
            .expect("search");
        let pages: Vec<Value> = fetcher.by_ref().collect();

        assert_eq!(pages.len(), 1);
        assert_eq!(fetcher.state(), &FetchState::Exhausted);
        assert!(fetcher.next().is_none());
    }

    #[test]
    fn first_request_failure_yields_nothing() {
        let conn = hapi_connection(FakeTransport::new());
        let mut fetcher = conn.search("Condition", &[]).expect("search");
        assert!(fetcher.next().is_none());
        assert_eq!(fetcher.state(), &FetchState::Exhausted);
    }

    #[test]
    fn repeated_next_link_stops_paging() {
        let looping = "http://internal/fhir?_getpages=x&_getpagesoffset=1";
        let transport = FakeTransport::new()
            .respond(
                "https://hapi.example.org/fhir/Observation",
                page("o1", Some(looping)),
            )
            .respond(
                "https://hapi.example.org/fhir?_getpages=x&_getpagesoffset=1",
                page("o2", Some(looping)),
            );
        let log = transport.clone();
        let conn = hapi_connection(transport);

        let fetcher = conn.search("Observation", &[]).expect("search");
        assert_eq!(fetcher.count(), 2);
        assert_eq!(
            log.calls(),
            vec![
                "GET https://hapi.example.org/fhir/Observation".to_owned(),
                "GET https://hapi.example.org/fhir?_getpages=x&_getpagesoffset=1".to_owned(),
            ]
        );
    }

    #[test]
    fn malformed_link_list_yields_page_then_exhausts() {
        let transport = FakeTransport::new().respond(
            "https://hapi.example.org/fhir/Observation",
            json!({"resourceType": "Bundle", "link": "not-a-list"}),
        );
        let conn = hapi_connection(transport);

        let mut fetcher = conn.search("Observation", &[]).expect("search");
        assert!(fetcher.next().is_some());
        assert_eq!(fetcher.state(), &FetchState::Exhausted);
        assert!(fetcher.next().is_none());
    }

    #[test]
    fn nothing_is_requested_until_iterated() {
        let conn = hapi_connection(FakeTransport::new());
        let fetcher = conn.search("Observation", &[]).expect("search");
        assert!(matches!(fetcher.state(), FetchState::Requesting(_)));
    }
}
