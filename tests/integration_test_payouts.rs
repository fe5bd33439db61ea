mod common;

use axum::http::StatusCode;
use chrono::{Duration, TimeZone, Utc};
use common::{parse_body, TestApp};
use serde_json::json;

/// Signs a lead up under `code` and verifies it `days_ago` days in the past.
async fn verified_lead(app: &TestApp, email: &str, code: &str, days_ago: i64) {
    let res = app.join_waitlist(email, Some(code)).await;
    assert_eq!(parse_body(res).await["referred"], true);
    let moved = app.state.accrual()
        .on_lead_verified(email, Utc::now() - Duration::days(days_ago))
        .await
        .unwrap();
    assert!(moved);
}

async fn paying_student(app: &TestApp, student_id: &str, code: &str, month: u32) {
    let res = app.request("POST", "/api/v1/referrals/track", Some(json!({
        "user_id": student_id,
        "email": format!("{}@students.test", student_id),
        "referral_code": code
    })), None).await;
    assert_eq!(res.status(), StatusCode::OK);

    let start = Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap().timestamp();
    let res = app.send_webhook(json!({
        "id": format!("evt_{}_{}", student_id, month),
        "type": "invoice.payment_succeeded",
        "data": { "object": {
            "customer": format!("cus_{}", student_id),
            "period_start": start,
            "metadata": { "userId": student_id }
        }}
    })).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_payout_totals_combine_both_phases() {
    let app = TestApp::new().await;
    let (amb_id, code) = app.register_ambassador("earner@example.com").await;
    app.register_ambassador("idle@example.com").await;

    for i in 0..3 {
        verified_lead(&app, &format!("old{}@example.com", i), &code, 8 + i).await;
    }
    verified_lead(&app, "fresh@example.com", &code, 1).await;
    app.join_waitlist("unverified@example.com", Some(&code)).await;
    paying_student(&app, "stu-1", &code, 3).await;
    paying_student(&app, "stu-2", &code, 3).await;

    let admin = app.admin_login().await;
    let res = app.request("GET", "/api/v1/admin/payouts", None, Some(&admin)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = parse_body(res).await;

    let payouts = body["payouts"].as_array().unwrap();
    assert_eq!(payouts.len(), 1, "ambassadors with nothing due are left out");
    assert_eq!(payouts[0]["ambassador_id"], amb_id);
    assert_eq!(payouts[0]["phase1_count"], 3);
    assert_eq!(payouts[0]["phase1_total_pence"], 150);
    assert_eq!(payouts[0]["phase2_count"], 2);
    assert_eq!(payouts[0]["phase2_total_pence"], 400);
    assert_eq!(payouts[0]["total_pence"], 550);
    assert_eq!(payouts[0]["total_formatted"], "£5.50");

    assert_eq!(body["summary"]["ambassador_count"], 1);
    assert_eq!(body["summary"]["total_pence"], 550);
    assert!(body["summary"]["next_payout_date"].as_str().unwrap().ends_with("-15"));

    // The listing is read-only.
    let res = app.request("GET", "/api/v1/admin/payouts", None, Some(&admin)).await;
    assert_eq!(parse_body(res).await["summary"]["total_pence"], 550);

    let statement = app.state.payouts().compute_payout(&amb_id, Utc::now()).await.unwrap();
    assert_eq!(statement.total_pence, 550);

    // Nine days from now the fresh lead has cleared its fraud window too.
    let statement = app.state.payouts().compute_payout(&amb_id, Utc::now() + Duration::days(9)).await.unwrap();
    assert_eq!(statement.phase1_count, 4);
}

#[tokio::test]
async fn test_maturity_sweep_only_moves_elapsed_commissions() {
    let app = TestApp::new().await;
    let (amb_id, code) = app.register_ambassador("amb@example.com").await;
    verified_lead(&app, "ready@example.com", &code, 8).await;
    verified_lead(&app, "waiting@example.com", &code, 1).await;

    let session = app.ambassador_login("amb@example.com", &code).await;
    let res = app.request("GET", &format!("/api/v1/ambassadors/{}/dashboard", amb_id), None, Some(&session)).await;
    let body = parse_body(res).await;
    assert_eq!(body["phase1"]["payable_signups"], 1);
    assert_eq!(body["statement"]["phase1_total_pence"], 50);

    let res = app.request("POST", "/api/v1/admin/commissions/mature", None, Some(&session)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let admin = app.admin_login().await;
    let res = app.request("POST", "/api/v1/admin/commissions/mature", None, Some(&admin)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(parse_body(res).await["matured"], 1);

    let res = app.request("POST", "/api/v1/admin/commissions/mature", None, Some(&admin)).await;
    assert_eq!(parse_body(res).await["matured"], 0);

    let mut statuses: Vec<String> = app.state.commission_repo.list_waitlist_by_ambassador(&amb_id).await.unwrap()
        .into_iter()
        .map(|c| c.status)
        .collect();
    statuses.sort();
    assert_eq!(statuses, vec!["payable", "verified"]);
}

#[tokio::test]
async fn test_receipt_settles_commissions_exactly_once() {
    let app = TestApp::new().await;
    let (amb_id, code) = app.register_ambassador("amb@example.com").await;
    verified_lead(&app, "one@example.com", &code, 10).await;
    verified_lead(&app, "two@example.com", &code, 9).await;
    verified_lead(&app, "later@example.com", &code, 2).await;

    let admin = app.admin_login().await;
    let uri = format!("/api/v1/admin/ambassadors/{}/receipts", amb_id);

    let res = app.request("POST", &uri, Some(json!({})), Some(&admin)).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = parse_body(res).await;
    let expected_number = format!("REC-{}-00001", &code[4..]);
    assert_eq!(body["receipt"]["receipt_number"], expected_number);
    assert_eq!(body["receipt"]["total_pence"], 100);
    assert_eq!(body["receipt"]["phase1_count"], 2);
    assert_eq!(body["receipt"]["payment_method"], "PayPal");
    assert_eq!(body["total_formatted"], "£1.00");
    assert_eq!(body["settled_commissions"], 2);

    let commissions = app.state.commission_repo.list_waitlist_by_ambassador(&amb_id).await.unwrap();
    assert_eq!(commissions.iter().filter(|c| c.status == "paid").count(), 2);
    assert_eq!(commissions.iter().filter(|c| c.status == "verified").count(), 1);

    let ambassador = app.state.ambassador_repo.find_by_id(&amb_id).await.unwrap().unwrap();
    assert_eq!(ambassador.total_paid_pence, 100);
    assert_eq!(ambassador.receipt_seq, 1);

    let res = app.request("POST", &uri, Some(json!({})), Some(&admin)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(parse_body(res).await["error"], "No amount to pay");

    let res = app.request("GET", &uri, None, Some(&admin)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let receipts = parse_body(res).await;
    assert_eq!(receipts.as_array().unwrap().len(), 1);

    let ambassador = app.state.ambassador_repo.find_by_id(&amb_id).await.unwrap().unwrap();
    assert_eq!(ambassador.total_paid_pence, 100);

    let res = app.request("GET", "/api/v1/admin/payouts", None, Some(&admin)).await;
    assert!(parse_body(res).await["payouts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_receipt_consumes_phase1_but_not_monthly_commissions() {
    let app = TestApp::new().await;
    let (amb_id, code) = app.register_ambassador("amb@example.com").await;
    verified_lead(&app, "lead@example.com", &code, 8).await;
    paying_student(&app, "stu-1", &code, 2).await;

    let payouts = app.state.payouts();
    let before = payouts.compute_payout(&amb_id, Utc::now()).await.unwrap();
    assert_eq!((before.phase1_total_pence, before.phase2_total_pence), (50, 200));

    let issued = app.state.receipts().issue_receipt(&amb_id, Utc::now().date_naive()).await.unwrap();
    assert_eq!(issued.receipt.total_pence, 250);

    let after = payouts.compute_payout(&amb_id, Utc::now()).await.unwrap();
    assert_eq!((after.phase1_total_pence, after.phase2_total_pence), (0, 200));
    assert_eq!(after.phase2_count, 1);

    // Monthly commissions recur, so a second receipt pays the Phase-2 total again.
    let again = app.state.receipts().issue_receipt(&amb_id, Utc::now().date_naive()).await.unwrap();
    assert_eq!(again.receipt.total_pence, 200);
    assert_eq!(again.receipt.phase1_count, 0);

    let ambassador = app.state.ambassador_repo.find_by_id(&amb_id).await.unwrap().unwrap();
    assert_eq!(ambassador.total_paid_pence, 450);
}

#[tokio::test]
async fn test_backdated_receipt_uses_payment_date_cutoff() {
    let app = TestApp::new().await;
    let (amb_id, code) = app.register_ambassador("amb@example.com").await;
    verified_lead(&app, "old@example.com", &code, 20).await;
    verified_lead(&app, "newer@example.com", &code, 9).await;

    let admin = app.admin_login().await;
    let payment_date = (Utc::now() - Duration::days(5)).date_naive();
    let res = app.request(
        "POST",
        &format!("/api/v1/admin/ambassadors/{}/receipts", amb_id),
        Some(json!({ "payment_date": payment_date })),
        Some(&admin),
    ).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = parse_body(res).await;
    assert_eq!(body["receipt"]["phase1_count"], 1);
    assert_eq!(body["receipt"]["payment_date"], payment_date.to_string());
}

#[tokio::test]
async fn test_receipt_numbers_increase_per_ambassador() {
    let app = TestApp::new().await;
    let (amb_id, code) = app.register_ambassador("amb@example.com").await;
    let admin = app.admin_login().await;
    let uri = format!("/api/v1/admin/ambassadors/{}/receipts", amb_id);

    verified_lead(&app, "a@example.com", &code, 8).await;
    let res = app.request("POST", &uri, Some(json!({})), Some(&admin)).await;
    assert!(parse_body(res).await["receipt"]["receipt_number"].as_str().unwrap().ends_with("-00001"));

    verified_lead(&app, "b@example.com", &code, 8).await;
    let res = app.request("POST", &uri, Some(json!({})), Some(&admin)).await;
    assert!(parse_body(res).await["receipt"]["receipt_number"].as_str().unwrap().ends_with("-00002"));

    let ambassador = app.state.ambassador_repo.find_by_id(&amb_id).await.unwrap().unwrap();
    assert_eq!(ambassador.total_paid_pence, 100);
}

#[tokio::test]
async fn test_admin_endpoints_require_admin_session() {
    let app = TestApp::new().await;
    let (amb_id, code) = app.register_ambassador("amb@example.com").await;
    let session = app.ambassador_login("amb@example.com", &code).await;

    let res = app.request("GET", "/api/v1/admin/payouts", None, None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // An ambassador session is rejected exactly like no session at all.
    let res = app.request("GET", "/api/v1/admin/payouts", None, Some(&session)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = app.request("GET", &format!("/api/v1/admin/ambassadors/{}", amb_id), None, Some(&session)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.request("POST", "/api/v1/admin/login", Some(json!({ "password": "guess" })), None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let admin = app.admin_login().await;
    let res = app.request("GET", &format!("/api/v1/admin/ambassadors/{}", amb_id), None, Some(&admin)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = parse_body(res).await;
    assert_eq!(body["ambassador"]["referral_code"], code);
    assert_eq!(body["statement"]["total_pence"], 0);

    let res = app.request("GET", "/api/v1/admin/ambassadors/missing", None, Some(&admin)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app.request("POST", "/api/v1/admin/ambassadors/missing/receipts", Some(json!({})), Some(&admin)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
