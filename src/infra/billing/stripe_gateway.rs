use crate::domain::ports::{CheckoutRequest, CheckoutSession, PaymentGateway};
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::error;

pub struct StripeGateway {
    client: Client,
    api_url: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(api_url: String, secret_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_url: api_url.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    fn checkout_form(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price]", request.price_id.clone()),
            ("line_items[0][quantity]", request.quantity.to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("customer_email", request.user_email.clone()),
            ("client_reference_id", request.user_id.clone()),
            ("metadata[userId]", request.user_id.clone()),
            ("metadata[userEmail]", request.user_email.clone()),
            ("subscription_data[metadata][userId]", request.user_id.clone()),
        ]
    }

    async fn parse_session(response: reqwest::Response) -> Result<CheckoutSession, AppError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Payment processor error {}: {}", status, text);
            return Err(AppError::Upstream(format!("Payment processor error: {}", status)));
        }

        let body: Value = response.json().await.map_err(|e| {
            error!("Failed to parse payment processor response: {:?}", e);
            AppError::Upstream("Malformed payment processor response".into())
        })?;
        session_from_json(&body)
    }
}

fn session_from_json(body: &Value) -> Result<CheckoutSession, AppError> {
    let text = |pointer: &str| body.pointer(pointer).and_then(Value::as_str).map(str::to_string);
    let id = text("/id").ok_or(AppError::Upstream("Checkout session without id".into()))?;

    Ok(CheckoutSession {
        id,
        url: text("/url"),
        payment_status: text("/payment_status"),
        customer_id: text("/customer").or_else(|| text("/customer/id")),
        subscription_id: text("/subscription").or_else(|| text("/subscription/id")),
        user_id: text("/metadata/userId").or_else(|| text("/client_reference_id")),
        product_type: text("/metadata/productType"),
    })
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, AppError> {
        let response = self.client.post(format!("{}/v1/checkout/sessions", self.api_url))
            .bearer_auth(&self.secret_key)
            .form(&Self::checkout_form(request))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Payment processor unreachable: {}", e)))?;
        Self::parse_session(response).await
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, AppError> {
        let response = self.client.get(format!("{}/v1/checkout/sessions/{}", self.api_url, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Payment processor unreachable: {}", e)))?;
        Self::parse_session(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_parsing_handles_expanded_objects() {
        let body = json!({
            "id": "cs_1",
            "payment_status": "paid",
            "customer": { "id": "cus_1" },
            "subscription": "sub_1",
            "client_reference_id": "stu-1",
            "metadata": {}
        });
        let session = session_from_json(&body).unwrap();
        assert_eq!(session.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(session.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(session.user_id.as_deref(), Some("stu-1"));
        assert!(session_from_json(&json!({})).is_err());
    }

    #[test]
    fn test_checkout_form_carries_user_metadata() {
        let form = StripeGateway::checkout_form(&CheckoutRequest {
            price_id: "price_1".into(),
            user_id: "stu-1".into(),
            user_email: "s@example.com".into(),
            success_url: "https://x/s".into(),
            cancel_url: "https://x/c".into(),
            quantity: 2,
        });
        assert!(form.contains(&("subscription_data[metadata][userId]", "stu-1".to_string())));
        assert!(form.contains(&("line_items[0][quantity]", "2".to_string())));
    }
}
