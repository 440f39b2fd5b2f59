use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::TrendError;
use crate::regions::Region;
use crate::types::{Locale, DEFAULT_BUFFER_SIZE, DEFAULT_LIST_CAP};

const DEFAULT_REPORT_MODEL: &str = "claude-haiku-4-5-20251001";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Report generation
    pub anthropic_api_key: Option<String>,
    pub report_model: String,

    // Scope
    pub regions: Vec<Region>,
    pub target_locales: Vec<Locale>,
    pub list_cap: usize,
    pub buffer_size: usize,

    // Pacing
    pub enrichment_delay: Duration,
    pub report_delay: Duration,
    pub translate_delay: Duration,

    // Translation
    pub translate_max_batch_chars: usize,
    pub translation_cache_ttl_hours: i32,

    // Overlap protection
    pub lease_ttl: Duration,

    // HTTP
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables (and `.env` when present).
    pub fn from_env() -> Result<Self, TrendError> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: required_env("DATABASE_URL")?,
            anthropic_api_key: env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            report_model: env::var("REPORT_MODEL")
                .unwrap_or_else(|_| DEFAULT_REPORT_MODEL.to_string()),
            regions: parse_list(&env::var("REGIONS").unwrap_or_else(|_| "KR,JP,US".to_string()))?,
            target_locales: parse_locales(
                &env::var("TARGET_LOCALES").unwrap_or_else(|_| "ko,ja,en".to_string()),
            )?,
            list_cap: parsed_env("LIST_CAP", DEFAULT_LIST_CAP)?,
            buffer_size: parsed_env("BUFFER_SIZE", DEFAULT_BUFFER_SIZE)?,
            enrichment_delay: Duration::from_millis(parsed_env("ENRICHMENT_DELAY_MS", 500)?),
            report_delay: Duration::from_millis(parsed_env("REPORT_DELAY_MS", 4_000)?),
            translate_delay: Duration::from_millis(parsed_env("TRANSLATE_DELAY_MS", 300)?),
            translate_max_batch_chars: parsed_env("TRANSLATE_MAX_BATCH_CHARS", 4_500)?,
            translation_cache_ttl_hours: parsed_env("TRANSLATION_CACHE_TTL_HOURS", 24)?,
            lease_ttl: Duration::from_secs(parsed_env("LEASE_TTL_SECS", 900)?),
            http_timeout: Duration::from_secs(parsed_env("HTTP_TIMEOUT_SECS", 15)?),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TrendError> {
        if self.list_cap == 0 {
            return Err(TrendError::Config("LIST_CAP must be > 0".to_string()));
        }
        if self.buffer_size < self.list_cap {
            return Err(TrendError::Config(format!(
                "BUFFER_SIZE ({}) must be >= LIST_CAP ({})",
                self.buffer_size, self.list_cap
            )));
        }
        if self.regions.is_empty() {
            return Err(TrendError::Config("REGIONS must name at least one region".to_string()));
        }
        if self.translate_max_batch_chars == 0 {
            return Err(TrendError::Config(
                "TRANSLATE_MAX_BATCH_CHARS must be > 0".to_string(),
            ));
        }
        if self.translation_cache_ttl_hours <= 0 {
            return Err(TrendError::Config(
                "TRANSLATION_CACHE_TTL_HOURS must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Log the non-secret parts of the configuration.
    pub fn log_redacted(&self) {
        let regions: Vec<&str> = self.regions.iter().map(Region::code).collect();
        let locales: Vec<&str> = self.target_locales.iter().map(Locale::as_str).collect();
        info!(
            regions = ?regions,
            locales = ?locales,
            list_cap = self.list_cap,
            buffer_size = self.buffer_size,
            report_generator = if self.anthropic_api_key.is_some() { self.report_model.as_str() } else { "template" },
            enrichment_delay_ms = self.enrichment_delay.as_millis() as u64,
            report_delay_ms = self.report_delay.as_millis() as u64,
            translate_delay_ms = self.translate_delay.as_millis() as u64,
            lease_ttl_secs = self.lease_ttl.as_secs(),
            "Config loaded"
        );
    }
}

fn required_env(key: &str) -> Result<String, TrendError> {
    env::var(key).map_err(|_| TrendError::Config(format!("{key} environment variable is required")))
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> Result<T, TrendError> {
    match env::var(key) {
        Ok(raw) => parse_number(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, TrendError> {
    raw.trim()
        .parse()
        .map_err(|_| TrendError::Config(format!("{key} must be a number in range, got '{raw}'")))
}

/// Parse a comma-separated region list, preserving order and dropping repeats.
pub fn parse_list(raw: &str) -> Result<Vec<Region>, TrendError> {
    let mut regions = Vec::new();
    for code in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let region: Region = code.parse()?;
        if !regions.contains(&region) {
            regions.push(region);
        }
    }
    Ok(regions)
}

pub fn parse_locales(raw: &str) -> Result<Vec<Locale>, TrendError> {
    let mut locales = Vec::new();
    for code in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let locale = Locale::parse(code)?;
        if !locales.contains(&locale) {
            locales.push(locale);
        }
    }
    Ok(locales)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_list_keeps_order_and_drops_repeats() {
        let regions = parse_list("jp, KR ,jp,,US").unwrap();
        assert_eq!(regions, vec![Region::Jp, Region::Kr, Region::Us]);
    }

    #[test]
    fn unknown_region_is_rejected() {
        assert!(matches!(parse_list("KR,XX"), Err(TrendError::UnknownRegion(_))));
    }

    #[test]
    fn locale_list_rejects_unsupported() {
        assert_eq!(parse_locales("ko,en").unwrap().len(), 2);
        assert!(parse_locales("ko,de").is_err());
    }

    fn base_config() -> Config {
        Config {
            database_url: "postgres://localhost/trendwire".to_string(),
            anthropic_api_key: None,
            report_model: DEFAULT_REPORT_MODEL.to_string(),
            regions: vec![Region::Us],
            target_locales: vec![],
            list_cap: 10,
            buffer_size: 15,
            enrichment_delay: Duration::ZERO,
            report_delay: Duration::ZERO,
            translate_delay: Duration::ZERO,
            translate_max_batch_chars: 4_500,
            translation_cache_ttl_hours: 24,
            lease_ttl: Duration::from_secs(900),
            http_timeout: Duration::from_secs(15),
        }
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_buffer_smaller_than_cap() {
        let config = Config {
            buffer_size: 5,
            ..base_config()
        };
        assert!(matches!(config.validate(), Err(TrendError::Config(_))));
    }

    #[test]
    fn validate_rejects_non_positive_cache_ttl() {
        let config = Config {
            translation_cache_ttl_hours: 0,
            ..base_config()
        };
        assert!(matches!(config.validate(), Err(TrendError::Config(_))));
    }

    #[test]
    fn out_of_range_number_is_a_config_error() {
        let parsed: Result<i32, TrendError> = parse_number("TRANSLATION_CACHE_TTL_HOURS", "9999999999");
        assert!(matches!(parsed, Err(TrendError::Config(_))));
    }
}
