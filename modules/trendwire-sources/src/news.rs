use tracing::{debug, warn};

use trendwire_common::{collapse_whitespace, ContextLink, LocaleConventions};

use crate::error::{Result, SourceError};
use crate::http::get_text;

const DEFAULT_BASE_URL: &str = "https://news.google.com";
pub const MAX_NEWS_LINKS: usize = 3;
pub const NEWS_SOURCE_NAME: &str = "Local News";

/// Localized news search over the Google News RSS endpoint.
pub struct NewsLookup {
    client: reqwest::Client,
    base_url: String,
}

impl NewsLookup {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Look up recent articles for `title`. Failures yield no links.
    pub async fn lookup(&self, title: &str, locale: &LocaleConventions) -> Vec<ContextLink> {
        match self.try_lookup(title, locale).await {
            Ok(links) => {
                debug!(title, count = links.len(), "news lookup");
                links
            }
            Err(e) => {
                warn!(title, error = %e, "news lookup failed");
                Vec::new()
            }
        }
    }

    async fn try_lookup(&self, title: &str, locale: &LocaleConventions) -> Result<Vec<ContextLink>> {
        let url = format!("{}/rss/search", self.base_url);
        let query = format!("{title}{}", locale.news_suffix);
        let ceid = format!("{}:{}", locale.gl, locale.hl);
        let body = get_text(
            &self.client,
            &url,
            &[
                ("q", query.as_str()),
                ("hl", locale.hl),
                ("gl", locale.gl),
                ("ceid", ceid.as_str()),
            ],
        )
        .await?;
        parse_news_feed(&body, MAX_NEWS_LINKS)
    }
}

/// Turn a news search feed into at most `limit` links.
pub fn parse_news_feed(body: &str, limit: usize) -> Result<Vec<ContextLink>> {
    let feed =
        feed_rs::parser::parse(body.as_bytes()).map_err(|e| SourceError::Feed(e.to_string()))?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = collapse_whitespace(&entry.title?.content);
            let url = entry.links.into_iter().next()?.href;
            if title.is_empty() || url.is_empty() {
                return None;
            }
            Some(ContextLink::new(title, url, NEWS_SOURCE_NAME))
        })
        .take(limit)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEWS_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>"election" - Google News</title>
    <link>https://news.google.com</link>
    <description>Google News</description>
    <item><title>Polls open nationwide</title><link>https://news.example.com/1</link></item>
    <item><title>Turnout is high</title><link>https://news.example.com/2</link></item>
    <item><title>No link here</title></item>
    <item><title>Results expected tonight</title><link>https://news.example.com/3</link></item>
    <item><title>Fourth article</title><link>https://news.example.com/4</link></item>
  </channel>
</rss>"#;

    #[test]
    fn keeps_first_three_linked_articles() {
        let links = parse_news_feed(NEWS_RSS, MAX_NEWS_LINKS).unwrap();
        let titles: Vec<&str> = links.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Polls open nationwide", "Turnout is high", "Results expected tonight"]
        );
        assert!(links.iter().all(|l| l.source_name == NEWS_SOURCE_NAME && !l.synthetic));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_news_feed("not a feed", 3).is_err());
    }

    #[tokio::test]
    async fn unreachable_service_yields_no_links() {
        let lookup = NewsLookup::new(reqwest::Client::new()).with_base_url("http://127.0.0.1:9");
        let locale = trendwire_common::Region::Us.profile().locale;
        assert!(lookup.lookup("Election", &locale).await.is_empty());
    }
}
