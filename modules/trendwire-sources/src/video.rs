use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use trendwire_common::{ContextLink, LocaleConventions};

use crate::error::Result;
use crate::http::get_text;

const DEFAULT_BASE_URL: &str = "https://www.youtube.com";
pub const MAX_VIDEO_RESULTS: usize = 2;
pub const VIDEO_SOURCE_NAME: &str = "Local YouTube";

// The results page embeds its initial data as JSON; each result is a
// `videoRenderer` object whose id precedes its title runs.
static VIDEO_RENDERER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""videoRenderer":\{"videoId":"([^"]+)","thumbnail":\{.*?"title":\{"runs":\[\{"text":"((?:[^"\\]|\\.)+)"\}\]"#,
    )
    .expect("valid regex")
});

pub struct VideoLookup {
    client: reqwest::Client,
    base_url: String,
}

impl VideoLookup {
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

    /// Search for videos about `title`. Failures yield no links.
    pub async fn lookup(&self, title: &str, locale: &LocaleConventions) -> Vec<ContextLink> {
        match self.try_lookup(title, locale).await {
            Ok(links) => {
                debug!(title, count = links.len(), "video lookup");
                links
            }
            Err(e) => {
                warn!(title, error = %e, "video lookup failed");
                Vec::new()
            }
        }
    }

    async fn try_lookup(&self, title: &str, locale: &LocaleConventions) -> Result<Vec<ContextLink>> {
        let url = format!("{}/results", self.base_url);
        let query = format!("{title}{}", locale.video_suffix);
        let body = get_text(
            &self.client,
            &url,
            &[("search_query", query.as_str()), ("hl", locale.hl), ("gl", locale.gl)],
        )
        .await?;
        Ok(parse_video_results(&body, MAX_VIDEO_RESULTS))
    }
}

/// Scan a results page for video id/title pairs, skipping repeated ids.
pub fn parse_video_results(html: &str, limit: usize) -> Vec<ContextLink> {
    let mut seen: Vec<&str> = Vec::new();
    let mut links = Vec::new();

    for caps in VIDEO_RENDERER.captures_iter(html) {
        if links.len() == limit {
            break;
        }
        let (Some(id), Some(raw_title)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let id = id.as_str();
        if seen.contains(&id) {
            continue;
        }
        seen.push(id);
        links.push(ContextLink::new(
            unescape_json_string(raw_title.as_str()),
            format!("https://www.youtube.com/watch?v={id}"),
            VIDEO_SOURCE_NAME,
        ));
    }
    links
}

fn unescape_json_string(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}
