pub mod cache_pg;
pub mod enrichment;
pub mod normalize;
pub mod pacing;
pub mod pipeline;
pub mod rank_diff;
pub mod report;
pub mod stats;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod translator;

pub use pipeline::{PipelineSettings, RegionSources, TrendPipeline};
pub use stats::{CycleStats, RegionOutcome};
