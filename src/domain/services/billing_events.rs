use std::sync::Arc;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, warn};

use crate::domain::models::subscription::{billing_month_of, SubscriptionStatus};
use crate::domain::ports::StudentRepository;
use crate::domain::services::accrual::{AccrualEngine, AccrualOutcome};
use crate::error::AppError;

/// Maximum age, in seconds, of a signed webhook.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

fn signature_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::InternalWithMsg("Invalid webhook secret".into()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Builds a `t=...,v1=...` header for `payload`.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, AppError> {
    let tag = signature_mac(secret, timestamp, payload)?.finalize().into_bytes();
    Ok(format!("t={},v1={}", timestamp, hex::encode(tag)))
}

/// Checks a `Stripe-Signature` style header. Any `v1` entry may match, which
/// covers secret rotation.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<(), AppError> {
    let invalid = || AppError::Validation("Webhook signature verification failed".into());

    if secret.is_empty() {
        warn!("Webhook secret not configured, rejecting event");
        return Err(invalid());
    }

    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(invalid)?;
    if candidates.is_empty() {
        return Err(invalid());
    }

    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        warn!(timestamp, now, "Webhook timestamp outside tolerance");
        return Err(invalid());
    }

    for candidate in &candidates {
        if signature_mac(secret, timestamp, payload)?.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }

    Err(invalid())
}

#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    CheckoutCompleted {
        user_id: Option<String>,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        product_type: Option<String>,
    },
    SubscriptionUpdated {
        user_id: Option<String>,
        status: String,
    },
    SubscriptionDeleted {
        user_id: Option<String>,
    },
    PaymentSucceeded {
        user_id: Option<String>,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        billing_month: Option<String>,
    },
    PaymentFailed {
        customer_id: Option<String>,
    },
    Other,
}

#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    pub id: String,
    pub event_type: String,
    pub event: BillingEvent,
}

fn str_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string)
}

fn month_at(value: &Value, pointer: &str) -> Option<String> {
    let secs = value.pointer(pointer).and_then(Value::as_i64)?;
    Utc.timestamp_opt(secs, 0).single().map(billing_month_of)
}

impl WebhookEnvelope {
    pub fn parse(payload: &[u8]) -> Result<Self, AppError> {
        let root: Value = serde_json::from_slice(payload)
            .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {}", e)))?;

        let id = str_at(&root, "/id").ok_or(AppError::Validation("Webhook event has no id".into()))?;
        let event_type = str_at(&root, "/type").ok_or(AppError::Validation("Webhook event has no type".into()))?;
        let object = root.pointer("/data/object").cloned().unwrap_or(Value::Null);

        let event = match event_type.as_str() {
            "checkout.session.completed" => BillingEvent::CheckoutCompleted {
                user_id: str_at(&object, "/client_reference_id").or_else(|| str_at(&object, "/metadata/userId")),
                customer_id: str_at(&object, "/customer"),
                subscription_id: str_at(&object, "/subscription"),
                product_type: str_at(&object, "/metadata/productType"),
            },
            "customer.subscription.updated" => BillingEvent::SubscriptionUpdated {
                user_id: str_at(&object, "/metadata/userId"),
                status: str_at(&object, "/status").unwrap_or_default(),
            },
            "customer.subscription.deleted" => BillingEvent::SubscriptionDeleted {
                user_id: str_at(&object, "/metadata/userId"),
            },
            "invoice.payment_succeeded" => BillingEvent::PaymentSucceeded {
                user_id: str_at(&object, "/metadata/userId")
                    .or_else(|| str_at(&object, "/subscription_details/metadata/userId"))
                    .or_else(|| str_at(&object, "/parent/subscription_details/metadata/userId")),
                customer_id: str_at(&object, "/customer"),
                subscription_id: str_at(&object, "/subscription")
                    .or_else(|| str_at(&object, "/parent/subscription_details/subscription")),
                billing_month: month_at(&object, "/lines/data/0/period/start")
                    .or_else(|| month_at(&object, "/period_start"))
                    .or_else(|| month_at(&object, "/created")),
            },
            "invoice.payment_failed" => BillingEvent::PaymentFailed {
                customer_id: str_at(&object, "/customer"),
            },
            _ => BillingEvent::Other,
        };

        Ok(Self { id, event_type, event })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
}

/// Applies verified processor events to student profiles and the accrual
/// engine. Replays of an event id are acknowledged without side effects.
pub struct BillingEventProcessor {
    student_repo: Arc<dyn StudentRepository>,
    accrual: AccrualEngine,
}

impl BillingEventProcessor {
    pub fn new(student_repo: Arc<dyn StudentRepository>, accrual: AccrualEngine) -> Self {
        Self { student_repo, accrual }
    }

    pub async fn handle_webhook(&self, payload: &[u8], signature: &str, secret: &str, now: DateTime<Utc>) -> Result<WebhookOutcome, AppError> {
        verify_signature(payload, signature, secret, now.timestamp())?;
        let envelope = WebhookEnvelope::parse(payload)?;
        self.process(envelope).await
    }

    pub async fn process(&self, envelope: WebhookEnvelope) -> Result<WebhookOutcome, AppError> {
        if self.student_repo.is_event_processed(&envelope.id).await? {
            info!(event_id = %envelope.id, "Webhook event already processed, skipping");
            return Ok(WebhookOutcome::Duplicate);
        }

        info!(event_id = %envelope.id, event_type = %envelope.event_type, "Processing billing event");
        self.apply(&envelope.event).await?;

        // A concurrent delivery may have recorded the id meanwhile; every
        // handler is idempotent so both deliveries land on the same state.
        self.student_repo.record_event(&envelope.id, &envelope.event_type).await?;
        Ok(WebhookOutcome::Processed)
    }

    async fn apply(&self, event: &BillingEvent) -> Result<(), AppError> {
        match event {
            BillingEvent::CheckoutCompleted { user_id, customer_id, subscription_id, product_type } => {
                let Some(user_id) = user_id else {
                    warn!("Checkout completed without a user id");
                    return Ok(());
                };
                self.student_repo.upsert_profile(user_id, None).await?;
                self.student_repo
                    .activate(user_id, customer_id.as_deref(), subscription_id.as_deref(), product_type.as_deref())
                    .await?;
                info!(student_id = %user_id, "Student subscription activated");
            }
            BillingEvent::SubscriptionUpdated { user_id, status } => {
                let Some(user_id) = user_id else {
                    warn!("Subscription update without a user id");
                    return Ok(());
                };
                self.student_repo.set_status(user_id, SubscriptionStatus::from_processor(status)).await?;
            }
            BillingEvent::SubscriptionDeleted { user_id } => {
                let Some(user_id) = user_id else {
                    warn!("Subscription deletion without a user id");
                    return Ok(());
                };
                self.student_repo.expire(user_id, true).await?;
                self.accrual.on_subscription_cancelled(user_id).await?;
            }
            BillingEvent::PaymentSucceeded { user_id, customer_id, subscription_id, billing_month } => {
                let student_id = match (user_id, customer_id) {
                    (Some(id), _) => Some(id.clone()),
                    (None, Some(customer)) => self.student_repo.find_by_customer_id(customer).await?.map(|s| s.id),
                    (None, None) => None,
                };
                let Some(student_id) = student_id else {
                    warn!("Payment succeeded for an unknown student");
                    return Ok(());
                };
                let Some(billing_month) = billing_month else {
                    warn!(student_id = %student_id, "Payment succeeded without a billing period");
                    return Ok(());
                };
                let outcome = self.accrual
                    .on_recurring_payment_succeeded(&student_id, billing_month, subscription_id.as_deref())
                    .await?;
                if outcome == AccrualOutcome::NotReferred {
                    info!(student_id = %student_id, "Payment from unreferred student, no commission");
                }
            }
            BillingEvent::PaymentFailed { customer_id } => {
                let Some(customer_id) = customer_id else {
                    return Ok(());
                };
                match self.student_repo.find_by_customer_id(customer_id).await? {
                    Some(student) => self.student_repo.expire(&student.id, false).await?,
                    None => warn!("Could not find student for failed payment"),
                }
            }
            BillingEvent::Other => {}
        }
        Ok(())
    }
}
