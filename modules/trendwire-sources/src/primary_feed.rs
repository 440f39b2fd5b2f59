// Primary trend feed: an RSS document extended with `ht:` namespaced elements
// (approximate traffic, embedded news items). Elements are matched by local
// name so both the prefixed and the bare spellings are accepted.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{info, warn};

use trendwire_common::{
    collapse_whitespace, strip_markup, ContextLink, OriginTag, RawTrendEntry, Region,
};

use crate::error::{Result, SourceError};
use crate::http::get_text;

/// Popularity recorded when an entry carries no traffic element.
pub const UNKNOWN_TRAFFIC: &str = "N/A";
const DEFAULT_NEWS_SOURCE: &str = "News";

pub struct PrimaryFeedAdapter {
    client: reqwest::Client,
    url_override: Option<String>,
}

impl PrimaryFeedAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            url_override: None,
        }
    }

    /// Point the adapter at a fixed URL instead of the region's feed.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url_override = Some(url.into());
        self
    }

    /// Fetch the region's feed. Never fails: errors degrade to an empty list.
    pub async fn fetch(&self, region: Region) -> Vec<RawTrendEntry> {
        match self.try_fetch(region).await {
            Ok(entries) => {
                info!(region = %region, count = entries.len(), "primary feed: parsed");
                entries
            }
            Err(e) => {
                warn!(region = %region, error = %e, "primary feed: fetch failed, continuing without it");
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self, region: Region) -> Result<Vec<RawTrendEntry>> {
        let url = self
            .url_override
            .clone()
            .unwrap_or_else(|| region.profile().primary_feed_url());
        let body = get_text(&self.client, &url, &[]).await?;
        parse_trend_feed(&body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Traffic,
    NewsTitle,
    NewsUrl,
    NewsSource,
    NewsSnippet,
}

#[derive(Default)]
struct NewsBuilder {
    title: String,
    url: String,
    source: String,
    snippet: String,
}

#[derive(Default)]
struct EntryBuilder {
    title: String,
    traffic: String,
    links: Vec<ContextLink>,
    snippets: Vec<String>,
}

impl EntryBuilder {
    fn finish_news(&mut self, news: NewsBuilder) {
        let title = collapse_whitespace(&news.title);
        let url = news.url.trim().to_string();
        if title.is_empty() || url.is_empty() {
            return;
        }
        let source = match collapse_whitespace(&news.source) {
            s if s.is_empty() => DEFAULT_NEWS_SOURCE.to_string(),
            s => s,
        };
        self.links.push(ContextLink::new(title, url, source));

        let snippet = strip_markup(&news.snippet);
        if !snippet.is_empty() {
            self.snippets.push(snippet);
        }
    }

    fn finish(self) -> Option<RawTrendEntry> {
        let title = collapse_whitespace(&self.title);
        if title.is_empty() {
            return None;
        }
        let traffic = match self.traffic.trim() {
            "" => UNKNOWN_TRAFFIC.to_string(),
            t => t.to_string(),
        };
        let mut entry = RawTrendEntry::new(title, OriginTag::PrimaryFeed).with_popularity(traffic);
        entry.context_links = self.links;
        entry.snippets = self.snippets;
        Some(entry)
    }
}

/// Parse a trend feed document into raw entries, in document order.
pub fn parse_trend_feed(xml: &str) -> Result<Vec<RawTrendEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut news: Option<NewsBuilder> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                field = None;
                match name.as_ref() {
                    b"item" => entry = Some(EntryBuilder::default()),
                    b"news_item" if entry.is_some() => news = Some(NewsBuilder::default()),
                    b"title" if entry.is_some() && news.is_none() => field = Some(Field::Title),
                    b"approx_traffic" if entry.is_some() => field = Some(Field::Traffic),
                    b"news_item_title" if news.is_some() => field = Some(Field::NewsTitle),
                    b"news_item_url" if news.is_some() => field = Some(Field::NewsUrl),
                    b"news_item_source" if news.is_some() => field = Some(Field::NewsSource),
                    b"news_item_snippet" if news.is_some() => field = Some(Field::NewsSnippet),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                match e.local_name().as_ref() {
                    b"news_item" => {
                        if let (Some(entry), Some(done)) = (entry.as_mut(), news.take()) {
                            entry.finish_news(done);
                        }
                    }
                    b"item" => {
                        news = None;
                        if let Some(done) = entry.take().and_then(EntryBuilder::finish) {
                            entries.push(done);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(f) = field {
                    let text = e
                        .unescape()
                        .map_err(|err| SourceError::Feed(err.to_string()))?;
                    append(&mut entry, &mut news, f, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(f) = field {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    append(&mut entry, &mut news, f, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SourceError::Feed(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(entries)
}

fn append(
    entry: &mut Option<EntryBuilder>,
    news: &mut Option<NewsBuilder>,
    field: Field,
    text: &str,
) {
    let target = match (field, entry.as_mut(), news.as_mut()) {
        (Field::Title, Some(e), _) => &mut e.title,
        (Field::Traffic, Some(e), _) => &mut e.traffic,
        (Field::NewsTitle, _, Some(n)) => &mut n.title,
        (Field::NewsUrl, _, Some(n)) => &mut n.url,
        (Field::NewsSource, _, Some(n)) => &mut n.source,
        (Field::NewsSnippet, _, Some(n)) => &mut n.snippet,
        _ => return,
    };
    target.push_str(text);
}
