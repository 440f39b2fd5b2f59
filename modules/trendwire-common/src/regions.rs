// Compile-time region profiles: where each market's trends come from and how
// lookups for it are localized.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrendError;
use crate::types::ContextLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "KR")]
    Kr,
    #[serde(rename = "JP")]
    Jp,
    #[serde(rename = "US")]
    Us,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Kr, Region::Jp, Region::Us];

    pub fn code(&self) -> &'static str {
        match self {
            Region::Kr => "KR",
            Region::Jp => "JP",
            Region::Us => "US",
        }
    }

    pub fn profile(&self) -> RegionProfile {
        match self {
            Region::Kr => RegionProfile {
                region: *self,
                portal: Some(PortalKind::SignalBz),
                locale: LocaleConventions {
                    hl: "ko",
                    gl: "KR",
                    news_suffix: " 한국 뉴스",
                    video_suffix: " 한국 뉴스",
                },
            },
            Region::Jp => RegionProfile {
                region: *self,
                portal: Some(PortalKind::YahooRealtime),
                locale: LocaleConventions {
                    hl: "ja",
                    gl: "JP",
                    news_suffix: " 日本 ニュース",
                    video_suffix: " 日本 ニュース",
                },
            },
            Region::Us => RegionProfile {
                region: *self,
                portal: None,
                locale: LocaleConventions {
                    hl: "en",
                    gl: "US",
                    news_suffix: " Latest News",
                    video_suffix: " News",
                },
            },
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = TrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "KR" => Ok(Region::Kr),
            "JP" => Ok(Region::Jp),
            "US" => Ok(Region::Us),
            other => Err(TrendError::UnknownRegion(other.to_string())),
        }
    }
}

/// Locale conventions used when issuing localized lookups for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleConventions {
    pub hl: &'static str,
    pub gl: &'static str,
    pub news_suffix: &'static str,
    pub video_suffix: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionProfile {
    pub region: Region,
    pub portal: Option<PortalKind>,
    pub locale: LocaleConventions,
}

impl RegionProfile {
    pub fn primary_feed_url(&self) -> String {
        format!(
            "https://trends.google.com/trending/rss?geo={}",
            self.region.code()
        )
    }

    /// Generic news search link for items still context-free after merging.
    pub fn fallback_link(&self, title: &str) -> ContextLink {
        let LocaleConventions { hl, gl, .. } = self.locale;
        ContextLink::synthetic(
            format!("Google News: {title}"),
            format!(
                "https://news.google.com/search?q={}&hl={hl}&gl={gl}&ceid={gl}:{hl}",
                encode(title)
            ),
            "Google News",
        )
    }
}

/// Regional portals that publish a ranked list of bare titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalKind {
    SignalBz,
    YahooRealtime,
}

impl PortalKind {
    pub fn name(&self) -> &'static str {
        match self {
            PortalKind::SignalBz => "signal",
            PortalKind::YahooRealtime => "yahoo",
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            PortalKind::SignalBz => "https://signal.bz/",
            PortalKind::YahooRealtime => "https://search.yahoo.co.jp/realtime/term",
        }
    }

    /// Placeholder context attached to every portal title, which carries none natively.
    pub fn fallback_link(&self, title: &str) -> ContextLink {
        match self {
            PortalKind::SignalBz => ContextLink::synthetic(
                format!("네이버 뉴스 검색: {title}"),
                format!(
                    "https://search.naver.com/search.naver?where=news&query={}",
                    encode(title)
                ),
                "Naver",
            ),
            PortalKind::YahooRealtime => ContextLink::synthetic(
                format!("Yahoo Japan News: {title}"),
                format!("https://news.yahoo.co.jp/search?p={}", encode(title)),
                "Yahoo",
            ),
        }
    }
}

fn encode(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_region_codes_case_insensitively() {
        assert_eq!("kr".parse::<Region>().unwrap(), Region::Kr);
        assert_eq!(" JP ".parse::<Region>().unwrap(), Region::Jp);
        assert!(matches!(
            "DE".parse::<Region>(),
            Err(TrendError::UnknownRegion(code)) if code == "DE"
        ));
    }

    #[test]
    fn only_kr_and_jp_have_portals() {
        assert_eq!(Region::Kr.profile().portal, Some(PortalKind::SignalBz));
        assert_eq!(Region::Jp.profile().portal, Some(PortalKind::YahooRealtime));
        assert_eq!(Region::Us.profile().portal, None);
    }

    #[test]
    fn primary_feed_url_uses_geo_code() {
        assert_eq!(
            Region::Us.profile().primary_feed_url(),
            "https://trends.google.com/trending/rss?geo=US"
        );
    }

    #[test]
    fn fallback_links_are_synthetic_and_encoded() {
        let link = PortalKind::SignalBz.fallback_link("손흥민 골");
        assert!(link.synthetic);
        assert!(link.url.starts_with("https://search.naver.com/search.naver?where=news&query="));
        assert!(!link.url.contains(' '));

        let link = Region::Jp.profile().fallback_link("a&b");
        assert!(link.synthetic);
        assert!(link.url.contains("q=a%26b"));
        assert!(link.url.ends_with("ceid=JP:ja"));
    }

    #[test]
    fn region_serializes_as_code() {
        assert_eq!(serde_json::to_string(&Region::Kr).unwrap(), "\"KR\"");
    }
}
