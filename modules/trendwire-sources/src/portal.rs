use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{info, warn};

use trendwire_common::{collapse_whitespace, OriginTag, PortalKind, RawTrendEntry};

use crate::error::Result;
use crate::http::get_text;

/// Most titles a portal page contributes.
pub const MAX_PORTAL_TITLES: usize = 10;

static RANK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}(?:[.)]\s*|\s+)").expect("valid regex"));

/// Result of one extraction attempt against a portal page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub titles: Vec<String>,
    pub matched: bool,
}

impl Extraction {
    fn from_titles(titles: Vec<String>) -> Self {
        Self {
            matched: !titles.is_empty(),
            titles,
        }
    }
}

/// A pure extraction function over a parsed page.
pub type Extractor = fn(&Html) -> Extraction;

/// Extraction functions for a portal, in priority order.
pub fn extractors(kind: PortalKind) -> &'static [Extractor] {
    match kind {
        PortalKind::SignalBz => &[signal_rank_items, signal_rank_text, signal_rank_links],
        PortalKind::YahooRealtime => &[yahoo_item_names, yahoo_item_names_loose, yahoo_item_links],
    }
}

fn select_text(html: &Html, css: &str) -> Extraction {
    let selector = match Selector::parse(css) {
        Ok(s) => s,
        Err(e) => {
            warn!(selector = css, error = %e, "portal: invalid selector");
            return Extraction::default();
        }
    };
    let titles = html
        .select(&selector)
        .map(|el| clean_title(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect();
    Extraction::from_titles(titles)
}

fn signal_rank_items(html: &Html) -> Extraction {
    select_text(html, ".rank-item .text")
}

fn signal_rank_text(html: &Html) -> Extraction {
    select_text(html, ".rank-text")
}

fn signal_rank_links(html: &Html) -> Extraction {
    select_text(html, ".rank-list a")
}

fn yahoo_item_names(html: &Html) -> Extraction {
    select_text(html, ".Trend_Trend__item__name")
}

fn yahoo_item_names_loose(html: &Html) -> Extraction {
    select_text(html, "[class*='Trend__item__name']")
}

fn yahoo_item_links(html: &Html) -> Extraction {
    select_text(html, ".Trend_Trend__item a")
}

/// Run extractors in order; the first one that matches supplies the titles.
pub fn extract_titles(html: &Html, extractors: &[Extractor], limit: usize) -> Vec<String> {
    for extract in extractors {
        let extraction = extract(html);
        if extraction.matched {
            let mut titles = extraction.titles;
            titles.truncate(limit);
            return titles;
        }
    }
    Vec::new()
}

/// Collapse whitespace and drop a leading rank number such as `3.` or `10 `.
pub fn clean_title(raw: &str) -> String {
    let collapsed = collapse_whitespace(raw);
    if let Some(m) = RANK_TOKEN.find(&collapsed) {
        let rest = &collapsed[m.end()..];
        if !rest.is_empty() && !rest.starts_with(|c: char| c.is_ascii_digit()) {
            return rest.to_string();
        }
    }
    collapsed
}

/// Scrapes a regional portal's ranked title list.
pub struct PortalAdapter {
    client: reqwest::Client,
    kind: PortalKind,
    url_override: Option<String>,
}

impl PortalAdapter {
    pub fn new(client: reqwest::Client, kind: PortalKind) -> Self {
        Self {
            client,
            kind,
            url_override: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url_override = Some(url.into());
        self
    }

    pub fn kind(&self) -> PortalKind {
        self.kind
    }

    /// Fetch the portal's titles. Failures degrade to an empty list.
    pub async fn fetch(&self) -> Vec<RawTrendEntry> {
        let portal = self.kind.name();
        match self.try_fetch().await {
            Ok(entries) => {
                if entries.is_empty() {
                    warn!(portal, "portal: no extractor matched");
                } else {
                    info!(portal, count = entries.len(), "portal: scraped");
                }
                entries
            }
            Err(e) => {
                warn!(portal, error = %e, "portal: fetch failed, continuing without it");
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self) -> Result<Vec<RawTrendEntry>> {
        let url = self.url_override.as_deref().unwrap_or(self.kind.url());
        let body = get_text(&self.client, url, &[]).await?;
        Ok(parse_portal_page(self.kind, &body))
    }
}

/// Parse a portal page into raw entries carrying the portal's placeholder link.
pub fn parse_portal_page(kind: PortalKind, body: &str) -> Vec<RawTrendEntry> {
    let html = Html::parse_document(body);
    extract_titles(&html, extractors(kind), MAX_PORTAL_TITLES)
        .into_iter()
        .map(|title| {
            let link = kind.fallback_link(&title);
            RawTrendEntry::new(
                title,
                OriginTag::Portal {
                    name: kind.name().to_string(),
                },
            )
            .with_link(link)
        })
        .collect()
}
