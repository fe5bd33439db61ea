mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{TimeZone, Utc};
use common::{parse_body, TestApp};
use serde_json::{json, Value};
use tower::ServiceExt;
use tutoring_backend::domain::services::billing_events::sign_payload;

fn invoice_paid(event_id: &str, student_id: &str, year: i32, month: u32) -> Value {
    let period_start = Utc.with_ymd_and_hms(year, month, 3, 9, 0, 0).unwrap().timestamp();
    json!({
        "id": event_id,
        "type": "invoice.payment_succeeded",
        "data": { "object": {
            "customer": format!("cus_{}", student_id),
            "subscription": format!("sub_{}", student_id),
            "created": period_start,
            "lines": { "data": [ { "period": { "start": period_start } } ] },
            "subscription_details": { "metadata": { "userId": student_id } }
        }}
    })
}

async fn track(app: &TestApp, student_id: &str, code: Option<&str>) -> Value {
    let res = app.request("POST", "/api/v1/referrals/track", Some(json!({
        "user_id": student_id,
        "email": format!("{}@students.test", student_id),
        "referral_code": code
    })), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    parse_body(res).await
}

#[tokio::test]
async fn test_student_referral_is_recorded_once() {
    let app = TestApp::new().await;
    let (amb_a, code_a) = app.register_ambassador("a@example.com").await;
    let (_amb_b, code_b) = app.register_ambassador("b@example.com").await;

    let body = track(&app, "stu-1", Some(&code_a)).await;
    assert_eq!(body["referred"], true);
    assert_eq!(body["ambassador_id"], amb_a);

    let body = track(&app, "stu-1", Some(&code_b)).await;
    assert_eq!(body["ambassador_id"], amb_a);

    let body = track(&app, "stu-2", Some("amb_XXXXXX")).await;
    assert_eq!(body["referred"], false);

    let body = track(&app, "stu-3", None).await;
    assert_eq!(body["referred"], false);

    let referral = app.state.referral_repo.find_by_student("stu-1").await.unwrap().unwrap();
    assert_eq!(referral.status, "pending");

    let ambassador = app.state.ambassador_repo.find_by_id(&amb_a).await.unwrap().unwrap();
    assert_eq!(ambassador.leads_acquired, 1);

    let student = app.state.student_repo.find_by_id("stu-1").await.unwrap().unwrap();
    assert_eq!(student.referred_by_ambassador.as_deref(), Some(amb_a.as_str()));
    assert_eq!(student.subscription_status, "trial");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signatures() {
    let app = TestApp::new().await;
    let payload = invoice_paid("evt_bad", "stu-1", 2024, 3).to_string();

    let res = app.router.clone().oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/v1/billing/webhook")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.clone()))
            .unwrap()
    ).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let forged = sign_payload(payload.as_bytes(), "whsec_someone_else", Utc::now().timestamp()).unwrap();
    let res = app.router.clone().oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/v1/billing/webhook")
            .header("Stripe-Signature", forged)
            .body(Body::from(payload))
            .unwrap()
    ).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert!(!app.state.student_repo.is_event_processed("evt_bad").await.unwrap());
}

#[tokio::test]
async fn test_payment_webhook_is_idempotent() {
    let app = TestApp::new().await;
    let (amb_id, code) = app.register_ambassador("amb@example.com").await;
    track(&app, "stu-1", Some(&code)).await;

    let event = invoice_paid("evt_1", "stu-1", 2024, 3);
    let res = app.send_webhook(event.clone()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = parse_body(res).await;
    assert_eq!(body["received"], true);
    assert_eq!(body["duplicate"], false);

    let res = app.send_webhook(event).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(parse_body(res).await["duplicate"], true);

    // A second delivery for the same month under a new event id still accrues once.
    let res = app.send_webhook(invoice_paid("evt_2", "stu-1", 2024, 3)).await;
    assert_eq!(res.status(), StatusCode::OK);

    let monthly = app.state.commission_repo.list_monthly_by_ambassador(&amb_id).await.unwrap();
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0].billing_month, "2024-03");
    assert_eq!(monthly[0].amount_pence, 200);

    let res = app.send_webhook(invoice_paid("evt_3", "stu-1", 2024, 4)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let monthly = app.state.commission_repo.list_monthly_by_ambassador(&amb_id).await.unwrap();
    assert_eq!(monthly.len(), 2);

    let referral = app.state.referral_repo.find_by_student("stu-1").await.unwrap().unwrap();
    assert_eq!(referral.status, "active");
}

#[tokio::test]
async fn test_unreferred_payment_accrues_nothing() {
    let app = TestApp::new().await;
    let (amb_id, _) = app.register_ambassador("amb@example.com").await;
    track(&app, "stu-solo", None).await;

    let res = app.send_webhook(invoice_paid("evt_solo", "stu-solo", 2024, 5)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(app.state.student_repo.is_event_processed("evt_solo").await.unwrap());

    let monthly = app.state.commission_repo.list_monthly_by_ambassador(&amb_id).await.unwrap();
    assert!(monthly.is_empty());
}

#[tokio::test]
async fn test_subscription_lifecycle_events() {
    let app = TestApp::new().await;
    let (amb_id, code) = app.register_ambassador("amb@example.com").await;
    track(&app, "stu-1", Some(&code)).await;

    let res = app.send_webhook(json!({
        "id": "evt_checkout",
        "type": "checkout.session.completed",
        "data": { "object": {
            "client_reference_id": "stu-1",
            "customer": "cus_1",
            "subscription": "sub_1",
            "metadata": { "productType": "monthly" }
        }}
    })).await;
    assert_eq!(res.status(), StatusCode::OK);

    let student = app.state.student_repo.find_by_id("stu-1").await.unwrap().unwrap();
    assert_eq!(student.subscription_status, "active");
    assert_eq!(student.stripe_customer_id.as_deref(), Some("cus_1"));
    assert_eq!(student.subscription_type.as_deref(), Some("monthly"));

    app.send_webhook(invoice_paid("evt_inv", "stu-1", 2024, 6)).await;

    let res = app.send_webhook(json!({
        "id": "evt_past_due",
        "type": "customer.subscription.updated",
        "data": { "object": { "status": "past_due", "metadata": { "userId": "stu-1" } } }
    })).await;
    assert_eq!(res.status(), StatusCode::OK);
    let student = app.state.student_repo.find_by_id("stu-1").await.unwrap().unwrap();
    assert_eq!(student.subscription_status, "trial");

    let res = app.send_webhook(json!({
        "id": "evt_deleted",
        "type": "customer.subscription.deleted",
        "data": { "object": { "metadata": { "userId": "stu-1" } } }
    })).await;
    assert_eq!(res.status(), StatusCode::OK);

    let student = app.state.student_repo.find_by_id("stu-1").await.unwrap().unwrap();
    assert_eq!(student.subscription_status, "expired");
    assert!(student.stripe_subscription_id.is_none());

    let referral = app.state.referral_repo.find_by_student("stu-1").await.unwrap().unwrap();
    assert_eq!(referral.status, "cancelled");

    // Months already billed stay earned.
    let monthly = app.state.commission_repo.list_monthly_by_ambassador(&amb_id).await.unwrap();
    assert_eq!(monthly.len(), 1);
    assert!(monthly[0].is_active);

    // Paying again after cancellation reactivates the referral.
    let res = app.send_webhook(invoice_paid("evt_resub", "stu-1", 2024, 8)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let referral = app.state.referral_repo.find_by_student("stu-1").await.unwrap().unwrap();
    assert_eq!(referral.status, "active");
    let monthly = app.state.commission_repo.list_monthly_by_ambassador(&amb_id).await.unwrap();
    assert_eq!(monthly.len(), 2);
}

#[tokio::test]
async fn test_failed_payment_expires_student_by_customer() {
    let app = TestApp::new().await;
    track(&app, "stu-9", None).await;
    app.state.student_repo.activate("stu-9", Some("cus_9"), Some("sub_9"), Some("monthly")).await.unwrap();

    let res = app.send_webhook(json!({
        "id": "evt_failed",
        "type": "invoice.payment_failed",
        "data": { "object": { "customer": "cus_9" } }
    })).await;
    assert_eq!(res.status(), StatusCode::OK);

    let student = app.state.student_repo.find_by_id("stu-9").await.unwrap().unwrap();
    assert_eq!(student.subscription_status, "expired");
    assert_eq!(student.stripe_customer_id.as_deref(), Some("cus_9"));
}

#[tokio::test]
async fn test_checkout_create_and_verify() {
    let app = TestApp::new().await;

    let res = app.request("POST", "/api/v1/billing/checkout", Some(json!({
        "price_id": "price_monthly",
        "user_id": "stu-5",
        "user_email": "stu5@students.test"
    })), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = parse_body(res).await;
    let session_id = body["id"].as_str().unwrap().to_string();
    assert!(body["url"].as_str().is_some());

    let verify = json!({ "session_id": session_id, "user_id": "stu-5" });
    let res = app.request("POST", "/api/v1/billing/checkout/verify", Some(verify.clone()), None).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    {
        let mut sessions = app.gateway.sessions.lock().unwrap();
        let session = sessions.get_mut(&session_id).unwrap();
        session.payment_status = Some("paid".to_string());
        session.customer_id = Some("cus_5".to_string());
        session.subscription_id = Some("sub_5".to_string());
    }

    let res = app.request("POST", "/api/v1/billing/checkout/verify", Some(json!({
        "session_id": session_id,
        "user_id": "someone-else"
    })), None).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.request("POST", "/api/v1/billing/checkout/verify", Some(verify), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = parse_body(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["subscription_id"], "sub_5");

    let student = app.state.student_repo.find_by_id("stu-5").await.unwrap().unwrap();
    assert_eq!(student.subscription_status, "active");
    assert_eq!(student.email.as_deref(), Some("stu5@students.test"));
}
