use std::sync::Arc;

use tracing::debug;

use trendwire_common::{RegionProfile, TrendItem};

use crate::pacing::Pacer;
use crate::traits::ContextLookup;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub news_replaced: u32,
    pub news_empty: u32,
    pub videos_found: u32,
}

/// Localized news and video lookups, one item at a time.
pub struct Enricher {
    news: Arc<dyn ContextLookup>,
    video: Arc<dyn ContextLookup>,
    pacer: Pacer,
}

impl Enricher {
    pub fn new(news: Arc<dyn ContextLookup>, video: Arc<dyn ContextLookup>, pacer: Pacer) -> Self {
        Self { news, video, pacer }
    }

    /// Fresh localized news replaces merged links; an empty result keeps them.
    /// Item order is untouched.
    pub async fn enrich(&self, items: &mut [TrendItem], profile: &RegionProfile) -> EnrichmentStats {
        let mut stats = EnrichmentStats::default();

        for item in items.iter_mut() {
            self.pacer.wait().await;
            let news = self.news.lookup(&item.original_title, &profile.locale).await;
            if news.is_empty() {
                stats.news_empty += 1;
            } else {
                item.set_context_links(news);
                stats.news_replaced += 1;
            }

            self.pacer.wait().await;
            let videos = self.video.lookup(&item.original_title, &profile.locale).await;
            if !videos.is_empty() {
                stats.videos_found += 1;
            }
            item.set_video_links(videos);
        }

        debug!(
            region = %profile.region,
            news_replaced = stats.news_replaced,
            news_empty = stats.news_empty,
            videos_found = stats.videos_found,
            "enrichment complete"
        );
        stats
    }
}
