use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrendError;
use crate::regions::Region;
use crate::text::normalize_key;

// --- Bounds ---

pub const MAX_CONTEXT_LINKS: usize = 5;
pub const MAX_SNIPPETS: usize = 3;
pub const MAX_VIDEO_LINKS: usize = 2;

/// Public length of a region's ranked list.
pub const DEFAULT_LIST_CAP: usize = 10;
/// Unique entries accumulated before truncating to the list cap.
pub const DEFAULT_BUFFER_SIZE: usize = 15;

// --- Locales ---

pub const SUPPORTED_LOCALES: &[&str] = &["ko", "ja", "en"];

/// A target locale drawn from the supported set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    pub fn parse(code: &str) -> Result<Self, TrendError> {
        let code = code.trim().to_lowercase();
        if SUPPORTED_LOCALES.contains(&code.as_str()) {
            Ok(Self(code))
        } else {
            Err(TrendError::UnsupportedLocale(code))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Locale {
    type Error = TrendError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Source-shaped entries ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLink {
    pub title: String,
    pub url: String,
    pub source_name: String,
    /// Fallback search link fabricated by the system rather than supplied by a source.
    #[serde(default)]
    pub synthetic: bool,
}

impl ContextLink {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source_name: source_name.into(),
            synthetic: false,
        }
    }

    pub fn synthetic(
        title: impl Into<String>,
        url: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            synthetic: true,
            ..Self::new(title, url, source_name)
        }
    }
}

/// Which adapter produced a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OriginTag {
    PrimaryFeed,
    Portal { name: String },
}

impl fmt::Display for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginTag::PrimaryFeed => write!(f, "primary_feed"),
            OriginTag::Portal { name } => write!(f, "portal:{name}"),
        }
    }
}

/// Adapter output. Identity is the title alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTrendEntry {
    pub title: String,
    /// Source-defined popularity marker. `None` when the source has no native scale.
    pub popularity: Option<String>,
    pub origin: OriginTag,
    pub context_links: Vec<ContextLink>,
    pub snippets: Vec<String>,
}

impl RawTrendEntry {
    pub fn new(title: impl Into<String>, origin: OriginTag) -> Self {
        Self {
            title: title.into(),
            popularity: None,
            origin,
            context_links: Vec::new(),
            snippets: Vec::new(),
        }
    }

    pub fn with_popularity(mut self, popularity: impl Into<String>) -> Self {
        self.popularity = Some(popularity.into());
        self
    }

    pub fn with_link(mut self, link: ContextLink) -> Self {
        self.context_links.push(link);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippets.push(snippet.into());
        self
    }

    /// True when every link (if any) was fabricated by the system.
    pub fn lacks_native_links(&self) -> bool {
        self.context_links.iter().all(|l| l.synthetic)
    }
}

// --- Rank direction ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankDirection {
    #[default]
    New,
    Up,
    Down,
    Steady,
}

impl fmt::Display for RankDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankDirection::New => write!(f, "new"),
            RankDirection::Up => write!(f, "up"),
            RankDirection::Down => write!(f, "down"),
            RankDirection::Steady => write!(f, "steady"),
        }
    }
}

// --- Canonical item ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendItem {
    pub title: String,
    pub original_title: String,
    pub normalized_key: String,
    pub popularity: Option<String>,
    pub origin: OriginTag,
    #[serde(default)]
    pub context_links: Vec<ContextLink>,
    #[serde(default)]
    pub video_links: Vec<ContextLink>,
    #[serde(default)]
    pub snippets: Vec<String>,
    #[serde(default)]
    pub translations: BTreeMap<Locale, String>,
    #[serde(default)]
    pub translated_snippets: BTreeMap<Locale, Vec<String>>,
    #[serde(default)]
    pub narrative_reports: BTreeMap<Locale, String>,
    #[serde(default)]
    pub rank_direction: RankDirection,
}

impl TrendItem {
    pub fn from_raw(raw: RawTrendEntry) -> Self {
        let mut item = Self {
            normalized_key: normalize_key(&raw.title),
            original_title: raw.title.clone(),
            title: raw.title,
            popularity: raw.popularity,
            origin: raw.origin,
            context_links: Vec::new(),
            video_links: Vec::new(),
            snippets: Vec::new(),
            translations: BTreeMap::new(),
            translated_snippets: BTreeMap::new(),
            narrative_reports: BTreeMap::new(),
            rank_direction: RankDirection::New,
        };
        item.set_context_links(raw.context_links);
        item.set_snippets(raw.snippets);
        item
    }

    pub fn set_context_links(&mut self, mut links: Vec<ContextLink>) {
        links.truncate(MAX_CONTEXT_LINKS);
        self.context_links = links;
    }

    pub fn set_video_links(&mut self, mut links: Vec<ContextLink>) {
        links.truncate(MAX_VIDEO_LINKS);
        self.video_links = links;
    }

    /// Replace snippets, dropping blanks and exact duplicates.
    pub fn set_snippets(&mut self, snippets: Vec<String>) {
        let mut kept: Vec<String> = Vec::new();
        for s in snippets {
            if !s.trim().is_empty() && !kept.contains(&s) {
                kept.push(s);
            }
            if kept.len() == MAX_SNIPPETS {
                break;
            }
        }
        self.snippets = kept;
    }

    pub fn set_translated_snippets(&mut self, locale: Locale, mut snippets: Vec<String>) {
        snippets.truncate(MAX_SNIPPETS);
        self.translated_snippets.insert(locale, snippets);
    }

    pub fn lacks_native_links(&self) -> bool {
        self.context_links.iter().all(|l| l.synthetic)
    }

    /// Title in the given locale, falling back to the source text.
    pub fn display_title(&self, locale: &Locale) -> &str {
        self.translations
            .get(locale)
            .map(String::as_str)
            .unwrap_or(&self.original_title)
    }
}

// --- Persisted documents ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub region: Region,
    pub items: Vec<TrendItem>,
    pub previous_items: Vec<TrendItem>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleStatus {
    pub last_global_update: DateTime<Utc>,
    pub regions: Vec<Region>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal() -> OriginTag {
        OriginTag::Portal {
            name: "signal".to_string(),
        }
    }

    #[test]
    fn from_raw_derives_key_and_bounds_lists() {
        let mut raw = RawTrendEntry::new("Budget Bill", OriginTag::PrimaryFeed);
        for i in 0..8 {
            raw = raw.with_link(ContextLink::new(format!("t{i}"), format!("https://x/{i}"), "News"));
        }
        for i in 0..6 {
            raw = raw.with_snippet(format!("snippet {i}"));
        }

        let item = TrendItem::from_raw(raw);
        assert_eq!(item.normalized_key, "budgetbill");
        assert_eq!(item.original_title, "Budget Bill");
        assert_eq!(item.context_links.len(), MAX_CONTEXT_LINKS);
        assert_eq!(item.snippets.len(), MAX_SNIPPETS);
        assert_eq!(item.rank_direction, RankDirection::New);
    }

    #[test]
    fn snippets_skip_blanks_and_duplicates() {
        let mut item = TrendItem::from_raw(RawTrendEntry::new("x", portal()));
        item.set_snippets(vec!["a".into(), "".into(), "a".into(), "b".into()]);
        assert_eq!(item.snippets, vec!["a", "b"]);
    }

    #[test]
    fn synthetic_only_links_count_as_lacking() {
        let raw = RawTrendEntry::new("x", portal())
            .with_link(ContextLink::synthetic("search", "https://s", "Naver"));
        assert!(raw.lacks_native_links());

        let raw = raw.with_link(ContextLink::new("real", "https://r", "News"));
        assert!(!raw.lacks_native_links());
    }

    #[test]
    fn locale_rejects_unsupported_codes() {
        assert!(Locale::parse("ko").is_ok());
        assert_eq!(Locale::parse(" EN ").unwrap().as_str(), "en");
        assert!(matches!(
            Locale::parse("fr"),
            Err(TrendError::UnsupportedLocale(_))
        ));
    }

    #[test]
    fn rank_direction_serializes_lowercase() {
        let json = serde_json::to_string(&RankDirection::Steady).unwrap();
        assert_eq!(json, "\"steady\"");
    }

    #[test]
    fn item_survives_json_round_trip_with_locale_keys() {
        let mut item = TrendItem::from_raw(RawTrendEntry::new("Election", OriginTag::PrimaryFeed));
        item.translations
            .insert(Locale::parse("ja").unwrap(), "選挙".to_string());

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["translations"]["ja"], "選挙");

        let back: TrendItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn display_title_falls_back_to_original() {
        let item = TrendItem::from_raw(RawTrendEntry::new("Election", OriginTag::PrimaryFeed));
        assert_eq!(item.display_title(&Locale::parse("ko").unwrap()), "Election");
    }
}
