// Trait seams for the cycle pipeline.
//
// TrendSource / ContextLookup wrap the HTTP adapters, TextTranslator the
// translation wire call, SnapshotStore the Postgres gateway, ReportGenerator
// the narrative collaborator. Mocks for each live in `testing`.

use anyhow::Result;
use async_trait::async_trait;

use trendwire_common::{
    ContextLink, CycleStatus, Locale, LocaleConventions, RawTrendEntry, Region,
    RegionSnapshot, TrendItem,
};
use trendwire_sources::{NewsLookup, PortalAdapter, PrimaryFeedAdapter, VideoLookup};

// ---------------------------------------------------------------------------
// TrendSource
// ---------------------------------------------------------------------------

/// A source of raw trend entries for a region. Never fails: implementations
/// log their own errors and return an empty list.
#[async_trait]
pub trait TrendSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, region: Region) -> Vec<RawTrendEntry>;
}

#[async_trait]
impl TrendSource for PrimaryFeedAdapter {
    fn name(&self) -> &str {
        "primary_feed"
    }

    async fn fetch(&self, region: Region) -> Vec<RawTrendEntry> {
        PrimaryFeedAdapter::fetch(self, region).await
    }
}

#[async_trait]
impl TrendSource for PortalAdapter {
    fn name(&self) -> &str {
        self.kind().name()
    }

    // A portal is bound to one region at construction.
    async fn fetch(&self, _region: Region) -> Vec<RawTrendEntry> {
        PortalAdapter::fetch(self).await
    }
}

// ---------------------------------------------------------------------------
// ContextLookup
// ---------------------------------------------------------------------------

/// Best-effort localized lookup keyed on an item title.
#[async_trait]
pub trait ContextLookup: Send + Sync {
    async fn lookup(&self, title: &str, locale: &LocaleConventions) -> Vec<ContextLink>;
}

#[async_trait]
impl ContextLookup for NewsLookup {
    async fn lookup(&self, title: &str, locale: &LocaleConventions) -> Vec<ContextLink> {
        NewsLookup::lookup(self, title, locale).await
    }
}

#[async_trait]
impl ContextLookup for VideoLookup {
    async fn lookup(&self, title: &str, locale: &LocaleConventions) -> Vec<ContextLink> {
        VideoLookup::lookup(self, title, locale).await
    }
}

// ---------------------------------------------------------------------------
// TextTranslator
// ---------------------------------------------------------------------------

/// One translation request with automatic source-language detection.
#[async_trait]
pub trait TextTranslator: Send + Sync {
    async fn translate(&self, text: &str, target: &str) -> Result<String>;
}

#[async_trait]
impl TextTranslator for translate_client::TranslateClient {
    async fn translate(&self, text: &str, target: &str) -> Result<String> {
        Ok(translate_client::TranslateClient::translate(
            self,
            text,
            translate_client::AUTO_DETECT,
            target,
        )
        .await?)
    }
}

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// Persistence gateway: one document per region plus a global status row.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn read(&self, region: Region) -> Result<Option<RegionSnapshot>>;

    /// Replace the region's document wholesale. Fails with
    /// `TrendError::LeaseLost` if this run no longer holds the region's lease.
    async fn write(&self, snapshot: &RegionSnapshot) -> Result<()>;

    /// Returns false when another live run holds the lease.
    async fn try_acquire_lease(&self, region: Region) -> Result<bool>;

    async fn release_lease(&self, region: Region) -> Result<()>;

    async fn write_cycle_status(&self, status: &CycleStatus) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ReportGenerator
// ---------------------------------------------------------------------------

/// Narrative summary for one item in one locale.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        item: &TrendItem,
        locale: &Locale,
        context_titles: &[String],
        snippets: &[String],
    ) -> Result<String>;
}
