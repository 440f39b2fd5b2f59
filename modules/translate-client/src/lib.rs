pub mod error;

pub use error::{Result, TranslateError};

use serde_json::Value;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://translate.googleapis.com";

/// Source language value that lets the service detect the input language.
pub const AUTO_DETECT: &str = "auto";

pub struct TranslateClient {
    client: reqwest::Client,
    base_url: String,
}

impl TranslateClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Translate `text` from `source` (usually [`AUTO_DETECT`]) into `target`.
    pub async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let endpoint = format!("{}/translate_a/single", self.base_url);

        debug!(target_locale = target, chars = text.len(), "translate request");

        let resp = self
            .client
            .get(&endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TranslateError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = resp.json().await?;
        join_fragments(&body)
    }
}

/// Reassemble the translated string from the response body.
///
/// The body is a nested array whose first element lists
/// `[translated, original, ...]` tuples, one per sentence-ish fragment.
pub fn join_fragments(body: &Value) -> Result<String> {
    let fragments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::Shape("missing fragment list".to_string()))?;

    let mut out = String::new();
    for fragment in fragments {
        match fragment.get(0) {
            Some(Value::String(s)) => out.push_str(s),
            Some(Value::Null) | None => {}
            Some(other) => {
                return Err(TranslateError::Shape(format!(
                    "fragment is not a string: {other}"
                )))
            }
        }
    }
    Ok(out)
}
