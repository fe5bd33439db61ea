use crate::domain::ports::MarketingService;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

const API_REVISION: &str = "2024-10-15";
const REQUEST_TIMEOUT_SECS: u64 = 5;
const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF_MS: u64 = 250;

/// Subscribes profiles to a single marketing list.
pub struct KlaviyoService {
    client: Client,
    api_url: String,
    api_key: String,
    list_id: String,
}

impl KlaviyoService {
    pub fn new(api_url: String, api_key: String, list_id: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            list_id,
        }
    }

    fn subscription_payload(&self, email: &str, properties: Value) -> Value {
        json!({
            "data": {
                "type": "profile-subscription-bulk-create-job",
                "attributes": {
                    "profiles": {
                        "data": [{
                            "type": "profile",
                            "attributes": { "email": email, "properties": properties }
                        }]
                    }
                },
                "relationships": {
                    "list": { "data": { "type": "list", "id": self.list_id } }
                }
            }
        })
    }
}

#[async_trait]
impl MarketingService for KlaviyoService {
    async fn subscribe(&self, email: &str, properties: Value) -> Result<(), AppError> {
        if self.api_key.is_empty() {
            return Err(AppError::Upstream("Marketing API key not configured".into()));
        }

        let url = format!("{}/profile-subscription-bulk-create-jobs/", self.api_url);
        let payload = self.subscription_payload(email, properties);
        let mut retries = 0;
        let mut backoff = INITIAL_BACKOFF_MS;

        loop {
            let res = self.client.post(&url)
                .header("Authorization", format!("Klaviyo-API-Key {}", self.api_key))
                .header("revision", API_REVISION)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    let status = response.status();
                    let transient = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
                    if !transient || retries >= MAX_RETRIES {
                        let text = response.text().await.unwrap_or_default();
                        error!("Marketing API error {}: {}", status, text);
                        return Err(AppError::Upstream(format!("Marketing API error: {}", status)));
                    }
                    warn!("Marketing API transient error {}. Retrying in {}ms...", status, backoff);
                }
                Err(e) => {
                    if retries >= MAX_RETRIES {
                        error!("Marketing API network error after {} retries: {:?}", retries, e);
                        return Err(AppError::Upstream(format!("Marketing API network error: {}", e)));
                    }
                    warn!("Marketing API network error. Retrying in {}ms... {:?}", backoff, e);
                }
            }

            sleep(Duration::from_millis(backoff)).await;
            retries += 1;
            backoff *= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_targets_configured_list() {
        let service = KlaviyoService::new("https://a.klaviyo.com/api/".into(), "pk".into(), "LIST1".into());
        let payload = service.subscription_payload("a@b.co", json!({ "signup_source": "waitlist" }));
        assert_eq!(payload.pointer("/data/relationships/list/data/id"), Some(&json!("LIST1")));
        assert_eq!(payload.pointer("/data/attributes/profiles/data/0/attributes/email"), Some(&json!("a@b.co")));
        assert_eq!(service.api_url, "https://a.klaviyo.com/api");
    }
}
