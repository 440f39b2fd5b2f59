// Test mocks for the trend pipeline.
//
// One mock per trait seam:
// - MockSource (TrendSource): fixed entry list
// - MockLookup (ContextLookup): title to links map, records queries
// - MockTranslator (TextTranslator): deterministic rewrite, records calls
// - MockSnapshotStore (SnapshotStore): in-memory documents and leases
// - MockReporter (ReportGenerator): canned text, optional failures

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use trendwire_common::{
    ContextLink, CycleStatus, Locale, LocaleConventions, OriginTag, RawTrendEntry, Region,
    RegionSnapshot, TrendError, TrendItem,
};

use crate::traits::{ContextLookup, ReportGenerator, SnapshotStore, TextTranslator, TrendSource};
use crate::translator::SEPARATOR;

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

pub struct MockSource {
    name: String,
    entries: Vec<RawTrendEntry>,
}

impl MockSource {
    pub fn primary(entries: Vec<RawTrendEntry>) -> Self {
        Self {
            name: "primary_feed".to_string(),
            entries,
        }
    }

    /// Bare titles, each with a placeholder search link like a real portal.
    pub fn portal(name: &str, titles: &[&str]) -> Self {
        let origin = OriginTag::Portal {
            name: name.to_string(),
        };
        let entries = titles
            .iter()
            .map(|title| {
                RawTrendEntry::new(*title, origin.clone()).with_link(ContextLink::synthetic(
                    format!("search: {title}"),
                    format!("https://search.example.com/?q={title}"),
                    name,
                ))
            })
            .collect();
        Self {
            name: name.to_string(),
            entries,
        }
    }
}

#[async_trait]
impl TrendSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _region: Region) -> Vec<RawTrendEntry> {
        self.entries.clone()
    }
}

// ---------------------------------------------------------------------------
// MockLookup
// ---------------------------------------------------------------------------

/// Returns registered links per title, nothing otherwise.
#[derive(Default)]
pub struct MockLookup {
    results: HashMap<String, Vec<ContextLink>>,
    queries: Mutex<Vec<(String, String)>>,
}

impl MockLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, title: &str, links: Vec<ContextLink>) -> Self {
        self.results.insert(title.to_string(), links);
        self
    }

    /// `(title, hl)` for every lookup so far.
    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContextLookup for MockLookup {
    async fn lookup(&self, title: &str, locale: &LocaleConventions) -> Vec<ContextLink> {
        self.queries
            .lock()
            .unwrap()
            .push((title.to_string(), locale.hl.to_string()));
        self.results.get(title).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// MockTranslator
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Rewrite {
    Uppercase,
    Prefix,
}

/// Rewrites each separator-delimited fragment deterministically.
pub struct MockTranslator {
    rewrite: Rewrite,
    separator_out: String,
    merge_first_pair: bool,
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl MockTranslator {
    fn with_rewrite(rewrite: Rewrite) -> Self {
        Self {
            rewrite,
            separator_out: SEPARATOR.to_string(),
            merge_first_pair: false,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `"abc"` becomes `"ABC"`.
    pub fn uppercase() -> Self {
        Self::with_rewrite(Rewrite::Uppercase)
    }

    /// `"abc"` into `ko` becomes `"[ko] abc"`.
    pub fn prefixing() -> Self {
        Self::with_rewrite(Rewrite::Prefix)
    }

    /// Every request fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::uppercase()
        }
    }

    /// Emit this separator between fragments instead of the one received.
    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator_out = separator.to_string();
        self
    }

    /// Lose the first separator of a batch, so the split comes up one short.
    pub fn merging_fragments(mut self) -> Self {
        self.merge_first_pair = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextTranslator for MockTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.fail {
            bail!("MockTranslator: service unavailable");
        }

        let fragments: Vec<String> = if text.contains(SEPARATOR) {
            text.split(SEPARATOR).map(|f| self.rewrite_one(f, target)).collect()
        } else {
            vec![self.rewrite_one(text, target)]
        };

        if self.merge_first_pair && fragments.len() > 1 {
            let mut merged = vec![format!("{} {}", fragments[0], fragments[1])];
            merged.extend(fragments[2..].iter().cloned());
            return Ok(merged.join(&self.separator_out));
        }
        Ok(fragments.join(&self.separator_out))
    }
}

impl MockTranslator {
    fn rewrite_one(&self, text: &str, target: &str) -> String {
        match self.rewrite {
            Rewrite::Uppercase => text.to_uppercase(),
            Rewrite::Prefix => format!("[{target}] {text}"),
        }
    }
}

// ---------------------------------------------------------------------------
// MockSnapshotStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    snapshots: HashMap<Region, RegionSnapshot>,
    our_leases: HashSet<Region>,
    foreign_leases: HashSet<Region>,
    failing_writes: HashSet<Region>,
    status: Option<CycleStatus>,
    writes: usize,
}

/// In-memory gateway with the same lease rules as the Postgres store.
#[derive(Default)]
pub struct MockSnapshotStore {
    state: Mutex<StoreState>,
}

impl MockSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document as if an earlier cycle had written it.
    pub fn seed(&self, snapshot: RegionSnapshot) {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .insert(snapshot.region, snapshot);
    }

    pub fn hold_lease_elsewhere(&self, region: Region) {
        self.state.lock().unwrap().foreign_leases.insert(region);
    }

    pub fn fail_writes_for(&self, region: Region) {
        self.state.lock().unwrap().failing_writes.insert(region);
    }

    pub fn snapshot(&self, region: Region) -> Option<RegionSnapshot> {
        self.state.lock().unwrap().snapshots.get(&region).cloned()
    }

    pub fn status(&self) -> Option<CycleStatus> {
        self.state.lock().unwrap().status.clone()
    }

    pub fn lease_held(&self, region: Region) -> bool {
        self.state.lock().unwrap().our_leases.contains(&region)
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

#[async_trait]
impl SnapshotStore for MockSnapshotStore {
    async fn read(&self, region: Region) -> Result<Option<RegionSnapshot>> {
        Ok(self.snapshot(region))
    }

    async fn write(&self, snapshot: &RegionSnapshot) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.our_leases.contains(&snapshot.region) {
            return Err(TrendError::LeaseLost {
                region: snapshot.region.code().to_string(),
            }
            .into());
        }
        if state.failing_writes.contains(&snapshot.region) {
            bail!("MockSnapshotStore: write rejected for {}", snapshot.region);
        }
        state.snapshots.insert(snapshot.region, snapshot.clone());
        state.writes += 1;
        Ok(())
    }

    async fn try_acquire_lease(&self, region: Region) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.foreign_leases.contains(&region) {
            return Ok(false);
        }
        state.our_leases.insert(region);
        Ok(true)
    }

    async fn release_lease(&self, region: Region) -> Result<()> {
        self.state.lock().unwrap().our_leases.remove(&region);
        Ok(())
    }

    async fn write_cycle_status(&self, status: &CycleStatus) -> Result<()> {
        self.state.lock().unwrap().status = Some(status.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Returns `"report: <title> (<locale>)"`, or fails for chosen titles.
#[derive(Default)]
pub struct MockReporter {
    failing_titles: HashSet<String>,
    calls: AtomicUsize,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, title: &str) -> Self {
        self.failing_titles.insert(title.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReportGenerator for MockReporter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        item: &TrendItem,
        locale: &Locale,
        _context_titles: &[String],
        _snippets: &[String],
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing_titles.contains(&item.original_title) {
            bail!("MockReporter: rate limited");
        }
        Ok(format!("report: {} ({locale})", item.display_title(locale)))
    }
}
