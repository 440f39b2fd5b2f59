//! End-to-end cycles over mocks: no network, no database.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use trendwire_common::{
    ContextLink, Locale, OriginTag, RankDirection, RawTrendEntry, Region, RegionSnapshot, TrendItem,
};
use trendwire_pipeline::enrichment::Enricher;
use trendwire_pipeline::normalize::MergeLimits;
use trendwire_pipeline::pacing::{ManualClock, Pacer};
use trendwire_pipeline::testing::{MockLookup, MockSnapshotStore, MockSource, MockTranslator};
use trendwire_pipeline::traits::TrendSource;
use trendwire_pipeline::translator::{MemoryCache, Translator};
use trendwire_pipeline::{PipelineSettings, RegionOutcome, RegionSources, TrendPipeline};

fn pipeline(
    sources: HashMap<Region, RegionSources>,
    news: MockLookup,
    store: Arc<MockSnapshotStore>,
    regions: Vec<Region>,
) -> TrendPipeline {
    let clock = Arc::new(ManualClock::new());
    TrendPipeline::new(
        sources,
        Enricher::new(
            Arc::new(news),
            Arc::new(MockLookup::new()),
            Pacer::new(clock.clone(), Duration::from_millis(500)),
        ),
        Translator::new(Arc::new(MockTranslator::prefixing()), Arc::new(MemoryCache::new())),
        Pacer::new(clock.clone(), Duration::from_millis(300)),
        None,
        Pacer::new(clock, Duration::from_millis(4_000)),
        store,
        PipelineSettings {
            regions,
            target_locales: ["ko", "ja", "en"]
                .iter()
                .map(|c| Locale::parse(c).unwrap())
                .collect(),
            limits: MergeLimits::default(),
            dry_run: false,
        },
    )
}

fn titles(snapshot: &RegionSnapshot) -> Vec<&str> {
    snapshot.items.iter().map(|i| i.title.as_str()).collect()
}

#[tokio::test]
async fn portal_titles_lead_and_borrow_feed_context() {
    let l1 = ContextLink::new("Apple unveils devices", "https://news.example.com/l1", "News");
    let portal: Arc<dyn TrendSource> = Arc::new(MockSource::portal("signal", &["Apple Event", "Budget Bill"]));
    let primary: Arc<dyn TrendSource> = Arc::new(MockSource::primary(vec![
        RawTrendEntry::new("Apple Event 2026", OriginTag::PrimaryFeed)
            .with_popularity("200,000+")
            .with_link(l1.clone()),
        RawTrendEntry::new("Election", OriginTag::PrimaryFeed).with_popularity("50,000+"),
    ]));
    let store = Arc::new(MockSnapshotStore::new());
    let sources = HashMap::from([(
        Region::Kr,
        RegionSources {
            portal: Some(portal),
            primary,
        },
    )]);

    let stats = pipeline(sources, MockLookup::new(), store.clone(), vec![Region::Kr])
        .run_cycle()
        .await;

    assert_eq!(stats.written(), 1);
    let snapshot = store.snapshot(Region::Kr).unwrap();
    assert_eq!(titles(&snapshot), vec!["Apple Event", "Budget Bill", "Election"]);

    let apple = &snapshot.items[0];
    assert_eq!(apple.context_links, vec![l1]);
    assert_eq!(apple.popularity.as_deref(), Some("200,000+"));
    assert_eq!(apple.translations.len(), 3);
    assert_eq!(apple.narrative_reports.len(), 3);

    // The unmatched portal title keeps a placeholder link.
    assert!(snapshot.items[1].context_links.iter().all(|l| l.synthetic));
    // The feed-only title gets the region's fallback search.
    assert_eq!(snapshot.items[2].context_links[0].source_name, "Google News");
}

#[tokio::test]
async fn localized_news_replaces_merged_links() {
    let local = vec![
        ContextLink::new("선거 속보", "https://news.example.kr/1", "Local News"),
        ContextLink::new("투표율", "https://news.example.kr/2", "Local News"),
    ];
    let primary: Arc<dyn TrendSource> = Arc::new(MockSource::primary(vec![RawTrendEntry::new(
        "선거",
        OriginTag::PrimaryFeed,
    )
    .with_link(ContextLink::new("Election", "https://news.example.com/e", "News"))]));
    let store = Arc::new(MockSnapshotStore::new());
    let sources = HashMap::from([(Region::Kr, RegionSources { portal: None, primary })]);

    pipeline(sources, MockLookup::new().on("선거", local.clone()), store.clone(), vec![Region::Kr])
        .run_cycle()
        .await;

    let item = &store.snapshot(Region::Kr).unwrap().items[0];
    assert_eq!(item.context_links, local);
}

#[tokio::test]
async fn silent_sources_keep_the_stored_snapshot_readable() {
    let store = Arc::new(MockSnapshotStore::new());
    let previous = RegionSnapshot {
        region: Region::Us,
        items: vec![TrendItem::from_raw(RawTrendEntry::new("Yesterday", OriginTag::PrimaryFeed))],
        previous_items: Vec::new(),
        last_updated: Utc::now(),
    };
    store.seed(previous.clone());
    let primary: Arc<dyn TrendSource> = Arc::new(MockSource::primary(Vec::new()));
    let sources = HashMap::from([(Region::Us, RegionSources { portal: None, primary })]);

    let stats = pipeline(sources, MockLookup::new(), store.clone(), vec![Region::Us])
        .run_cycle()
        .await;

    assert_eq!(stats.regions, vec![(Region::Us, RegionOutcome::NoData)]);
    assert_eq!(store.snapshot(Region::Us), Some(previous));
}

#[tokio::test]
async fn consecutive_cycles_shift_the_previous_list() {
    let store = Arc::new(MockSnapshotStore::new());
    let run = |order: &[&str]| {
        let primary: Arc<dyn TrendSource> = Arc::new(MockSource::primary(
            order
                .iter()
                .map(|t| RawTrendEntry::new(*t, OriginTag::PrimaryFeed))
                .collect(),
        ));
        pipeline(
            HashMap::from([(Region::Us, RegionSources { portal: None, primary })]),
            MockLookup::new(),
            store.clone(),
            vec![Region::Us],
        )
    };

    run(&["a", "b", "c"]).run_cycle().await;
    let first = store.snapshot(Region::Us).unwrap();
    run(&["c", "a", "d"]).run_cycle().await;
    let second = store.snapshot(Region::Us).unwrap();

    assert_eq!(second.previous_items, first.items);
    let directions: Vec<RankDirection> = second.items.iter().map(|i| i.rank_direction).collect();
    assert_eq!(
        directions,
        vec![RankDirection::Up, RankDirection::Down, RankDirection::New]
    );
}
