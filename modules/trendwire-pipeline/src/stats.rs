use std::fmt;

use trendwire_common::Region;

use crate::translator::TranslationStats;

/// How one region's cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionOutcome {
    Written { items: usize },
    /// Dry run: everything but the write.
    Previewed { items: usize },
    /// Every source came back empty; the stored snapshot is untouched.
    NoData,
    /// Another run holds the region's lease.
    LeaseHeld,
    Failed { reason: String },
}

impl fmt::Display for RegionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionOutcome::Written { items } => write!(f, "written ({items} items)"),
            RegionOutcome::Previewed { items } => write!(f, "dry run ({items} items)"),
            RegionOutcome::NoData => write!(f, "skipped (no data)"),
            RegionOutcome::LeaseHeld => write!(f, "skipped (lease held elsewhere)"),
            RegionOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Stats from one pipeline cycle.
#[derive(Debug, Default)]
pub struct CycleStats {
    pub regions: Vec<(Region, RegionOutcome)>,
    pub portal_entries: usize,
    pub primary_entries: usize,
    pub items_written: usize,
    pub news_replaced: u32,
    pub videos_found: u32,
    pub reports_generated: u32,
    pub reports_templated: u32,
    pub translation: TranslationStats,
}

impl CycleStats {
    pub fn record(&mut self, region: Region, outcome: RegionOutcome) {
        if let RegionOutcome::Written { items } = outcome {
            self.items_written += items;
        }
        self.regions.push((region, outcome));
    }

    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, RegionOutcome::Written { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RegionOutcome::NoData | RegionOutcome::LeaseHeld))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RegionOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&RegionOutcome) -> bool) -> usize {
        self.regions.iter().filter(|(_, o)| pred(o)).count()
    }

    /// Status string stored in the global cycle document.
    pub fn status_label(&self) -> &'static str {
        if self.regions.is_empty() || self.failed() == self.regions.len() {
            "failed"
        } else if self.failed() > 0 {
            "degraded"
        } else {
            "healthy"
        }
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Trend Cycle Complete ===")?;
        for (region, outcome) in &self.regions {
            writeln!(f, "  {region}: {outcome}")?;
        }
        writeln!(
            f,
            "Regions:        {} written, {} skipped, {} failed",
            self.written(),
            self.skipped(),
            self.failed()
        )?;
        writeln!(f, "Source entries: {} portal, {} primary", self.portal_entries, self.primary_entries)?;
        writeln!(f, "Items written:  {}", self.items_written)?;
        writeln!(f, "News replaced:  {}", self.news_replaced)?;
        writeln!(f, "Videos found:   {}", self.videos_found)?;
        writeln!(
            f,
            "Reports:        {} generated, {} templated",
            self.reports_generated, self.reports_templated
        )?;
        let t = &self.translation;
        writeln!(
            f,
            "Translation:    {} hits, {} misses, {} requests, {} batch fallbacks, {} failures",
            t.cache_hits, t.cache_misses, t.requests, t.batch_fallbacks, t.failures
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reflects_failures() {
        let mut stats = CycleStats::default();
        assert_eq!(stats.status_label(), "failed");

        stats.record(Region::Kr, RegionOutcome::Written { items: 10 });
        stats.record(Region::Jp, RegionOutcome::NoData);
        assert_eq!(stats.status_label(), "healthy");

        stats.record(Region::Us, RegionOutcome::Failed { reason: "db".into() });
        assert_eq!(stats.status_label(), "degraded");
        assert_eq!((stats.written(), stats.skipped(), stats.failed()), (1, 1, 1));
        assert_eq!(stats.items_written, 10);
    }

    #[test]
    fn display_lists_each_region() {
        let mut stats = CycleStats::default();
        stats.record(Region::Us, RegionOutcome::LeaseHeld);
        let text = stats.to_string();
        assert!(text.contains("US: skipped (lease held elsewhere)"));
        assert!(text.contains("0 written, 1 skipped, 0 failed"));
    }
}
