use std::time::Duration;

use crate::error::Result;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; trendwire/0.1)";

/// Shared HTTP client for every adapter and lookup in one process.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// GET `url` and return the body, treating non-2xx as an error.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<String> {
    let resp = client.get(url).query(query).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(crate::error::SourceError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(resp.text().await?)
}
