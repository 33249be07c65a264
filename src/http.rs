//! Shared HTTP plumbing for the external services (embeddings, chat
//! completions, knowledge lookup).
//!
//! Every client gets an explicit request timeout. Requests are retried with
//! exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

pub(crate) fn client(timeout_secs: u64) -> Result<Client, String> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| e.to_string())
}

pub(crate) fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

/// Sends the request built by `build` and decodes a JSON body, retrying
/// transient failures up to `max_retries` times.
///
/// `label` names the service in error messages (e.g. `"OpenAI chat"`).
pub(crate) async fn send_json<F>(label: &str, max_retries: u32, build: F) -> Result<Value, String>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff(attempt);
            debug!(service = label, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| format!("{} returned an unreadable body: {}", label, e));
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = format!("{} error {}: {}", label, status, body_text);

                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) => {
                last_err = Some(format!("{} request failed: {}", label, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| format!("{} failed after retries", label)))
}
