use std::collections::HashSet;

use tracing::debug;

use trendwire_common::{
    normalize_key, RawTrendEntry, RegionProfile, TrendItem, DEFAULT_BUFFER_SIZE, DEFAULT_LIST_CAP,
};

/// Decides whether two titles from different sources describe the same trend.
pub trait TitleMatcher: Send + Sync {
    fn matches(&self, a: &str, b: &str) -> bool;
}

/// Case-insensitive substring containment in either direction.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringMatcher;

impl TitleMatcher for SubstringMatcher {
    fn matches(&self, a: &str, b: &str) -> bool {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        if a.is_empty() || b.is_empty() {
            return false;
        }
        a.contains(&b) || b.contains(&a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeLimits {
    /// Unique entries accumulated before truncation.
    pub buffer_size: usize,
    /// Length of the final list.
    pub list_cap: usize,
}

impl Default for MergeLimits {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            list_cap: DEFAULT_LIST_CAP,
        }
    }
}

/// Merge portal and primary-feed entries into one ranked, deduplicated list.
///
/// Portal entries go first so they win ties on the normalized key. A
/// survivor without native links borrows links, snippets and (when it has
/// none) popularity from the first matching primary entry; when the
/// survivor came from a portal, that primary entry is absorbed and does
/// not appear on its own. Anything still without a link gets the region's
/// fallback search link.
pub fn merge(
    portal: Vec<RawTrendEntry>,
    primary: Vec<RawTrendEntry>,
    matcher: &dyn TitleMatcher,
    limits: MergeLimits,
    profile: &RegionProfile,
) -> Vec<TrendItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut absorbed: HashSet<usize> = HashSet::new();
    let mut kept: Vec<RawTrendEntry> = Vec::with_capacity(limits.buffer_size);
    let mut cross_enriched = 0usize;

    let ordered = portal
        .into_iter()
        .map(|entry| (None, entry))
        .chain(primary.iter().cloned().enumerate().map(|(i, e)| (Some(i), e)));

    for (primary_idx, mut entry) in ordered {
        if kept.len() >= limits.buffer_size {
            break;
        }
        if primary_idx.is_some_and(|i| absorbed.contains(&i)) {
            continue;
        }
        let key = normalize_key(&entry.title);
        if key.is_empty() || !seen.insert(key) {
            continue;
        }

        if entry.lacks_native_links() {
            if let Some(idx) = find_match(&entry.title, primary_idx, &primary, matcher) {
                let donor = &primary[idx];
                cross_enrich(&mut entry, donor);
                cross_enriched += 1;
                if primary_idx.is_none() {
                    absorbed.insert(idx);
                }
            }
        }

        kept.push(entry);
    }

    let buffered = kept.len();
    kept.truncate(limits.list_cap);

    let mut fallbacks = 0usize;
    let items: Vec<TrendItem> = kept
        .into_iter()
        .map(|mut entry| {
            if entry.context_links.is_empty() {
                entry.context_links.push(profile.fallback_link(&entry.title));
                fallbacks += 1;
            }
            TrendItem::from_raw(entry)
        })
        .collect();

    debug!(
        region = %profile.region,
        buffered,
        kept = items.len(),
        cross_enriched,
        fallbacks,
        "merge complete"
    );

    items
}

fn find_match(
    title: &str,
    own_idx: Option<usize>,
    primary: &[RawTrendEntry],
    matcher: &dyn TitleMatcher,
) -> Option<usize> {
    primary
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != own_idx)
        .find(|(_, candidate)| matcher.matches(title, &candidate.title))
        .map(|(i, _)| i)
}

fn cross_enrich(entry: &mut RawTrendEntry, donor: &RawTrendEntry) {
    if !donor.lacks_native_links() {
        entry.context_links = donor
            .context_links
            .iter()
            .filter(|l| !l.synthetic)
            .cloned()
            .collect();
    }
    entry.snippets.extend(donor.snippets.iter().cloned());
    if entry.popularity.is_none() {
        entry.popularity = donor.popularity.clone();
    }
}
