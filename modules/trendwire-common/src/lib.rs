pub mod config;
pub mod error;
pub mod regions;
pub mod text;
pub mod types;

pub use config::Config;
pub use error::TrendError;
pub use regions::{LocaleConventions, PortalKind, Region, RegionProfile};
pub use text::{collapse_whitespace, normalize_key, strip_markup};
pub use types::*;
