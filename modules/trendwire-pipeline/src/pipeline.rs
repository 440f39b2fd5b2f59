// Per-cycle orchestration.
//
// Regions run one after another. Within a region the two sources are
// fetched concurrently, then merge -> enrich -> translate/report per locale
// -> rank diff -> one whole-document write. Nothing below the region level
// aborts the cycle; a region that fails keeps its previous snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use trendwire_common::{CycleStatus, Locale, Region, RegionSnapshot, TrendError, TrendItem};
use trendwire_sources::{PortalAdapter, PrimaryFeedAdapter};

use crate::enrichment::Enricher;
use crate::normalize::{merge, MergeLimits, SubstringMatcher, TitleMatcher};
use crate::pacing::Pacer;
use crate::rank_diff::classify;
use crate::report::template_report;
use crate::stats::{CycleStats, RegionOutcome};
use crate::traits::{ReportGenerator, SnapshotStore, TrendSource};
use crate::translator::Translator;

/// Context-link titles translated per item.
const TRANSLATED_LINK_TITLES: usize = 3;
/// Snippets translated per item.
const TRANSLATED_SNIPPETS: usize = 2;

/// The adapters feeding one region.
#[derive(Clone)]
pub struct RegionSources {
    pub portal: Option<Arc<dyn TrendSource>>,
    pub primary: Arc<dyn TrendSource>,
}

impl RegionSources {
    /// Sources for every known region over one shared HTTP client.
    pub fn for_all_regions(client: &reqwest::Client) -> HashMap<Region, RegionSources> {
        let primary: Arc<dyn TrendSource> = Arc::new(PrimaryFeedAdapter::new(client.clone()));
        Region::ALL
            .iter()
            .map(|region| {
                let portal = region.profile().portal.map(|kind| {
                    Arc::new(PortalAdapter::new(client.clone(), kind)) as Arc<dyn TrendSource>
                });
                (
                    *region,
                    RegionSources {
                        portal,
                        primary: primary.clone(),
                    },
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub regions: Vec<Region>,
    pub target_locales: Vec<Locale>,
    pub limits: MergeLimits,
    /// Run everything but skip leases and writes.
    pub dry_run: bool,
}

pub struct TrendPipeline {
    sources: HashMap<Region, RegionSources>,
    matcher: Box<dyn TitleMatcher>,
    enricher: Enricher,
    translator: Translator,
    translate_pacer: Pacer,
    reporter: Option<Arc<dyn ReportGenerator>>,
    report_pacer: Pacer,
    store: Arc<dyn SnapshotStore>,
    settings: PipelineSettings,
}

/// Translated text for one item in one locale.
#[derive(Debug, Default)]
struct Localized {
    title: String,
    link_titles: Vec<String>,
    snippets: Vec<String>,
}

impl TrendPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: HashMap<Region, RegionSources>,
        enricher: Enricher,
        translator: Translator,
        translate_pacer: Pacer,
        reporter: Option<Arc<dyn ReportGenerator>>,
        report_pacer: Pacer,
        store: Arc<dyn SnapshotStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            sources,
            matcher: Box::new(SubstringMatcher),
            enricher,
            translator,
            translate_pacer,
            reporter,
            report_pacer,
            store,
            settings,
        }
    }

    pub fn with_matcher(mut self, matcher: Box<dyn TitleMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one cycle over every configured region.
    pub async fn run_cycle(&self) -> CycleStats {
        let mut stats = CycleStats::default();

        for &region in &self.settings.regions {
            info!(region = %region, "processing region");
            let outcome = self.run_region(region, &mut stats).await;
            match &outcome {
                RegionOutcome::Failed { reason } => {
                    error!(region = %region, reason = reason.as_str(), "region failed")
                }
                other => info!(region = %region, outcome = %other, "region done"),
            }
            stats.record(region, outcome);
        }

        stats.translation = self.translator.stats();

        if !self.settings.dry_run {
            let status = CycleStatus {
                last_global_update: Utc::now(),
                regions: self.settings.regions.clone(),
                status: stats.status_label().to_string(),
            };
            if let Err(e) = self.store.write_cycle_status(&status).await {
                warn!(error = %e, "failed to write cycle status");
            }
        }

        stats
    }

    async fn run_region(&self, region: Region, stats: &mut CycleStats) -> RegionOutcome {
        if self.settings.dry_run {
            return self.process_region(region, stats).await;
        }

        match self.store.try_acquire_lease(region).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(region = %region, "lease held by another run, skipping region");
                return RegionOutcome::LeaseHeld;
            }
            Err(e) => {
                return RegionOutcome::Failed {
                    reason: format!("lease: {e:#}"),
                }
            }
        }

        let outcome = self.process_region(region, stats).await;

        if let Err(e) = self.translator.flush_cache().await {
            warn!(region = %region, error = %e, "translation cache flush failed");
        }
        if let Err(e) = self.store.release_lease(region).await {
            warn!(region = %region, error = %e, "lease release failed");
        }
        outcome
    }

    async fn process_region(&self, region: Region, stats: &mut CycleStats) -> RegionOutcome {
        let profile = region.profile();
        let Some(sources) = self.sources.get(&region) else {
            return RegionOutcome::Failed {
                reason: "no sources configured".to_string(),
            };
        };

        let previous = match self.store.read(region).await {
            Ok(snapshot) => snapshot.map(|s| s.items).unwrap_or_default(),
            Err(e) => {
                return RegionOutcome::Failed {
                    reason: format!("read: {e:#}"),
                }
            }
        };

        let (portal, primary) = tokio::join!(
            async {
                match &sources.portal {
                    Some(source) => source.fetch(region).await,
                    None => Vec::new(),
                }
            },
            sources.primary.fetch(region),
        );
        if let Some(source) = &sources.portal {
            debug!(region = %region, source = source.name(), count = portal.len(), "portal fetched");
        }
        debug!(
            region = %region,
            source = sources.primary.name(),
            count = primary.len(),
            "primary feed fetched"
        );
        stats.portal_entries += portal.len();
        stats.primary_entries += primary.len();

        let mut items = merge(portal, primary, self.matcher.as_ref(), self.settings.limits, &profile);
        if items.is_empty() {
            warn!(region = %region, "no entries from any source, keeping stored snapshot");
            return RegionOutcome::NoData;
        }

        let enrichment = self.enricher.enrich(&mut items, &profile).await;
        stats.news_replaced += enrichment.news_replaced;
        stats.videos_found += enrichment.videos_found;

        self.localize(&mut items, stats).await;

        let items = classify(items, &previous);
        let snapshot = RegionSnapshot {
            region,
            items,
            previous_items: previous,
            last_updated: Utc::now(),
        };

        if self.settings.dry_run {
            log_preview(&snapshot);
            return RegionOutcome::Previewed {
                items: snapshot.items.len(),
            };
        }

        match self.store.write(&snapshot).await {
            Ok(()) => RegionOutcome::Written {
                items: snapshot.items.len(),
            },
            Err(e) => {
                if let Some(TrendError::LeaseLost { .. }) = e.downcast_ref::<TrendError>() {
                    warn!(region = %region, "lease lost before write, discarding results");
                }
                RegionOutcome::Failed {
                    reason: format!("write: {e:#}"),
                }
            }
        }
    }

    /// Translate titles, link titles and snippets into each target locale,
    /// then attach a narrative report per item.
    async fn localize(&self, items: &mut [TrendItem], stats: &mut CycleStats) {
        for locale in &self.settings.target_locales {
            self.translate_pacer.wait().await;
            let localized = self.translate_items(items, locale).await;

            for (item, text) in items.iter_mut().zip(localized) {
                let title = if text.title.trim().is_empty() {
                    item.original_title.clone()
                } else {
                    text.title
                };
                item.translations.insert(locale.clone(), title);
                item.set_translated_snippets(locale.clone(), text.snippets.clone());

                let report = self
                    .narrative(item, locale, &text.link_titles, &text.snippets, stats)
                    .await;
                item.narrative_reports.insert(locale.clone(), report);
            }
        }
    }

    /// One flat batch per locale, mapped back by position.
    async fn translate_items(&self, items: &[TrendItem], locale: &Locale) -> Vec<Localized> {
        enum Slot {
            Title,
            Link,
            Snippet,
        }

        let mut texts: Vec<String> = Vec::new();
        let mut owners: Vec<(usize, Slot)> = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            texts.push(item.original_title.clone());
            owners.push((idx, Slot::Title));
            for link in item
                .context_links
                .iter()
                .filter(|l| !l.synthetic)
                .take(TRANSLATED_LINK_TITLES)
            {
                texts.push(link.title.clone());
                owners.push((idx, Slot::Link));
            }
            for snippet in item.snippets.iter().take(TRANSLATED_SNIPPETS) {
                texts.push(snippet.clone());
                owners.push((idx, Slot::Snippet));
            }
        }

        let translated = self.translator.translate_batch(&texts, locale.as_str()).await;

        let mut localized: Vec<Localized> = items.iter().map(|_| Localized::default()).collect();
        for ((idx, slot), text) in owners.into_iter().zip(translated) {
            let entry = &mut localized[idx];
            match slot {
                Slot::Title => entry.title = text,
                Slot::Link => entry.link_titles.push(text),
                Slot::Snippet => entry.snippets.push(text),
            }
        }
        localized
    }

    async fn narrative(
        &self,
        item: &TrendItem,
        locale: &Locale,
        link_titles: &[String],
        snippets: &[String],
        stats: &mut CycleStats,
    ) -> String {
        if let Some(reporter) = &self.reporter {
            self.report_pacer.wait().await;
            match reporter.generate(item, locale, link_titles, snippets).await {
                Ok(text) if !text.trim().is_empty() => {
                    stats.reports_generated += 1;
                    return text;
                }
                Ok(_) => warn!(
                    title = item.original_title.as_str(),
                    locale = %locale,
                    "empty report, using template"
                ),
                Err(e) => warn!(
                    title = item.original_title.as_str(),
                    locale = %locale,
                    reporter = reporter.name(),
                    error = %e,
                    "report generation failed, using template"
                ),
            }
        }
        stats.reports_templated += 1;
        template_report(item, locale, link_titles, snippets)
    }
}

fn log_preview(snapshot: &RegionSnapshot) {
    for (rank, item) in snapshot.items.iter().enumerate() {
        info!(
            region = %snapshot.region,
            rank = rank + 1,
            title = item.original_title.as_str(),
            direction = %item.rank_direction,
            origin = %item.origin,
            links = item.context_links.len(),
            videos = item.video_links.len(),
            "dry run item"
        );
    }
}

/// Convenience for callers that want a hard error when every region failed.
pub fn ensure_progress(stats: &CycleStats) -> Result<()> {
    if !stats.regions.is_empty() && stats.failed() == stats.regions.len() {
        anyhow::bail!("every region failed this cycle");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use trendwire_common::{ContextLink, OriginTag, RankDirection, RawTrendEntry};

    use crate::pacing::ManualClock;
    use crate::testing::{MockLookup, MockReporter, MockSnapshotStore, MockSource, MockTranslator};
    use crate::translator::MemoryCache;

    struct Harness {
        clock: Arc<ManualClock>,
        store: Arc<MockSnapshotStore>,
        translator: Arc<MockTranslator>,
    }

    fn locales(codes: &[&str]) -> Vec<Locale> {
        codes.iter().map(|c| Locale::parse(c).unwrap()).collect()
    }

    fn build(
        sources: HashMap<Region, RegionSources>,
        reporter: Option<Arc<dyn ReportGenerator>>,
        regions: Vec<Region>,
        dry_run: bool,
    ) -> (TrendPipeline, Harness) {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MockSnapshotStore::new());
        let mock_translator = Arc::new(MockTranslator::prefixing());
        let translator = Translator::new(mock_translator.clone(), Arc::new(MemoryCache::new()));
        let enricher = Enricher::new(
            Arc::new(MockLookup::new()),
            Arc::new(MockLookup::new()),
            Pacer::new(clock.clone(), Duration::from_millis(500)),
        );
        let pipeline = TrendPipeline::new(
            sources,
            enricher,
            translator,
            Pacer::new(clock.clone(), Duration::from_millis(300)),
            reporter,
            Pacer::new(clock.clone(), Duration::from_millis(4_000)),
            store.clone(),
            PipelineSettings {
                regions,
                target_locales: locales(&["ko", "en"]),
                limits: MergeLimits::default(),
                dry_run,
            },
        );
        (
            pipeline,
            Harness {
                clock,
                store,
                translator: mock_translator,
            },
        )
    }

    fn us_sources(entries: Vec<RawTrendEntry>) -> HashMap<Region, RegionSources> {
        HashMap::from([(
            Region::Us,
            RegionSources {
                portal: None,
                primary: Arc::new(MockSource::primary(entries)),
            },
        )])
    }

    fn feed(title: &str) -> RawTrendEntry {
        RawTrendEntry::new(title, OriginTag::PrimaryFeed)
            .with_popularity("10,000+")
            .with_link(ContextLink::new(format!("{title} news"), "https://n/1", "News"))
            .with_snippet(format!("{title} snippet"))
    }

    #[tokio::test]
    async fn first_cycle_writes_all_new_items() {
        let (pipeline, h) = build(us_sources(vec![feed("Election"), feed("Storm")]), None, vec![Region::Us], false);

        let stats = pipeline.run_cycle().await;

        assert_eq!(stats.written(), 1);
        let snapshot = h.store.snapshot(Region::Us).unwrap();
        assert!(snapshot.previous_items.is_empty());
        assert!(snapshot.items.iter().all(|i| i.rank_direction == RankDirection::New));
        let ko = Locale::parse("ko").unwrap();
        assert_eq!(snapshot.items[0].translations[&ko], "[ko] Election");
        assert_eq!(snapshot.items[0].translated_snippets[&ko], vec!["[ko] Election snippet"]);
        assert!(snapshot.items[0].narrative_reports[&ko].contains("[ko] Election news"));
        assert_eq!(stats.reports_templated, 4);
        assert_eq!(h.store.status().unwrap().status, "healthy");
        assert!(!h.store.lease_held(Region::Us));
    }

    #[tokio::test]
    async fn second_cycle_diffs_against_stored_items() {
        let (pipeline, h) = build(us_sources(vec![feed("Storm"), feed("Election")]), None, vec![Region::Us], false);
        let earlier: Vec<TrendItem> = ["Election", "Storm", "Gone"]
            .iter()
            .map(|t| TrendItem::from_raw(RawTrendEntry::new(*t, OriginTag::PrimaryFeed)))
            .collect();
        h.store.seed(RegionSnapshot {
            region: Region::Us,
            items: earlier.clone(),
            previous_items: Vec::new(),
            last_updated: Utc::now(),
        });

        pipeline.run_cycle().await;

        let snapshot = h.store.snapshot(Region::Us).unwrap();
        let directions: Vec<RankDirection> = snapshot.items.iter().map(|i| i.rank_direction).collect();
        assert_eq!(directions, vec![RankDirection::Up, RankDirection::Down]);
        assert_eq!(snapshot.previous_items, earlier);
    }

    #[tokio::test]
    async fn empty_sources_leave_previous_snapshot_untouched() {
        let (pipeline, h) = build(us_sources(Vec::new()), None, vec![Region::Us], false);
        let stored = RegionSnapshot {
            region: Region::Us,
            items: vec![TrendItem::from_raw(RawTrendEntry::new("Old", OriginTag::PrimaryFeed))],
            previous_items: Vec::new(),
            last_updated: Utc::now(),
        };
        h.store.seed(stored.clone());

        let stats = pipeline.run_cycle().await;

        assert_eq!(stats.regions[0].1, RegionOutcome::NoData);
        assert_eq!(h.store.snapshot(Region::Us), Some(stored));
        assert_eq!(h.store.writes(), 0);
    }

    #[tokio::test]
    async fn held_lease_skips_region() {
        let (pipeline, h) = build(us_sources(vec![feed("Election")]), None, vec![Region::Us], false);
        h.store.hold_lease_elsewhere(Region::Us);

        let stats = pipeline.run_cycle().await;

        assert_eq!(stats.regions[0].1, RegionOutcome::LeaseHeld);
        assert!(h.translator.calls().is_empty());
        assert_eq!(h.store.writes(), 0);
    }

    #[tokio::test]
    async fn write_failure_is_isolated_to_its_region() {
        let mut sources = us_sources(vec![feed("Election")]);
        sources.insert(
            Region::Jp,
            RegionSources {
                portal: Some(Arc::new(MockSource::portal("yahoo", &["大谷翔平"])) as Arc<dyn TrendSource>),
                primary: Arc::new(MockSource::primary(vec![feed("Ohtani")])),
            },
        );
        let (pipeline, h) = build(sources, None, vec![Region::Jp, Region::Us], false);
        h.store.fail_writes_for(Region::Jp);

        let stats = pipeline.run_cycle().await;

        assert!(matches!(stats.regions[0].1, RegionOutcome::Failed { .. }));
        assert!(matches!(stats.regions[1].1, RegionOutcome::Written { .. }));
        assert!(h.store.snapshot(Region::Jp).is_none());
        assert_eq!(h.store.status().unwrap().status, "degraded");
        assert!(!h.store.lease_held(Region::Jp));
    }

    #[tokio::test]
    async fn reports_are_paced_and_failures_use_template() {
        let reporter = Arc::new(MockReporter::new().failing_on("Storm"));
        let (pipeline, h) = build(
            us_sources(vec![feed("Election"), feed("Storm")]),
            Some(reporter.clone() as Arc<dyn ReportGenerator>),
            vec![Region::Us],
            false,
        );

        let stats = pipeline.run_cycle().await;

        assert_eq!(stats.reports_generated, 2);
        assert_eq!(stats.reports_templated, 2);
        assert_eq!(reporter.calls(), 4);
        let report_sleeps = h
            .clock
            .sleeps()
            .into_iter()
            .filter(|d| *d == Duration::from_millis(4_000))
            .count();
        assert_eq!(report_sleeps, 3);

        let snapshot = h.store.snapshot(Region::Us).unwrap();
        let en = Locale::parse("en").unwrap();
        assert!(snapshot.items[0].narrative_reports[&en].starts_with("report:"));
        assert!(snapshot.items[1].narrative_reports[&en].contains("is rapidly emerging"));
    }

    #[tokio::test]
    async fn dry_run_never_touches_persistence() {
        let (pipeline, h) = build(us_sources(vec![feed("Election")]), None, vec![Region::Us], true);

        let stats = pipeline.run_cycle().await;

        assert_eq!(stats.regions[0].1, RegionOutcome::Previewed { items: 1 });
        assert_eq!(h.store.writes(), 0);
        assert!(h.store.status().is_none());
    }

    #[tokio::test]
    async fn list_is_capped_at_ten() {
        let entries: Vec<RawTrendEntry> = (0..25).map(|i| feed(&format!("topic {i}"))).collect();
        let (pipeline, h) = build(us_sources(entries), None, vec![Region::Us], false);

        pipeline.run_cycle().await;

        assert_eq!(h.store.snapshot(Region::Us).unwrap().items.len(), 10);
    }

    #[test]
    fn all_failed_cycle_is_an_error() {
        let mut stats = CycleStats::default();
        stats.record(Region::Us, RegionOutcome::Failed { reason: "x".into() });
        assert!(ensure_progress(&stats).is_err());
    }
}
