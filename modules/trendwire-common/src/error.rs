use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrendError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown region code: {0}")]
    UnknownRegion(String),

    #[error("Unsupported locale: {0}")]
    UnsupportedLocale(String),

    #[error("Lease for region {region} is no longer held by this run")]
    LeaseLost { region: String },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
