use axum::extract::State;
use axum::http::{header, Method, Request, StatusCode};
use axum::Json;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::portal::auth::{EmailRequest, TokenIssuer, MAX_OTP_ATTEMPTS};
use crate::portal::domain::{DecisionSnapshot, LoanStatus};
use crate::portal::router::portal_router;

#[tokio::test]
async fn login_sets_http_only_session_cookie() {
    let harness = harness();
    harness.register("Ada Lovelace", "ada@example.com").await;

    let response = portal_router(harness.state.clone())
        .oneshot(json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": PASSWORD })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("cookie set")
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=604800"));
    assert!(!cookie.contains("Secure"));

    let body = read_json_body(response).await;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["role"], "user");
    assert_eq!(body["email"], "ada@example.com");
    assert!(body["token"].as_str().is_some_and(|token| !token.is_empty()));
}

#[tokio::test]
async fn cookie_session_reaches_protected_routes() {
    let harness = harness();
    let user = harness.register("Ada Lovelace", "ada@example.com").await;
    let token = harness.token_for(&user);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/user/profile")
        .header(header::COOKIE, format!("token={token}"))
        .body(axum::body::Body::empty())
        .expect("request builds");
    let response = portal_router(harness.state.clone())
        .oneshot(request)
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["_id"], user.id.as_str());
    assert_eq!(body["name"], "Ada Lovelace");
    assert!(body.get("passwordHash").is_none());
}

#[tokio::test]
async fn protected_routes_reject_missing_or_invalid_tokens() {
    let harness = harness();

    let response = portal_router(harness.state.clone())
        .oneshot(json_request(Method::GET, "/api/v1/loan/my-applications", None, None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        read_json_body(response).await["message"],
        "Unauthorized: Token missing"
    );

    let response = portal_router(harness.state.clone())
        .oneshot(json_request(
            Method::GET,
            "/api/v1/loan/my-applications",
            Some("not-a-jwt"),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        read_json_body(response).await["message"],
        "Unauthorized: Invalid token"
    );
}

#[tokio::test]
async fn expired_or_foreign_tokens_are_invalid() {
    let harness = harness();
    let user = harness.register("Ada Lovelace", "ada@example.com").await;

    let expired = harness
        .state
        .tokens
        .issue(&user, Utc::now() - Duration::days(8))
        .expect("token issued");
    let foreign = TokenIssuer::new("other-secret", Duration::days(7))
        .issue(&user, Utc::now())
        .expect("token issued");

    for token in [expired, foreign] {
        let response = portal_router(harness.state.clone())
            .oneshot(json_request(
                Method::GET,
                "/api/v1/user/profile",
                Some(&token),
                None,
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            read_json_body(response).await["message"],
            "Unauthorized: Invalid token"
        );
    }
}

#[tokio::test]
async fn reset_password_route_throttles_code_guessing() {
    let harness = harness();
    harness.register("Ada Lovelace", "ada@example.com").await;
    harness
        .state
        .auth
        .send_password_reset_otp(EmailRequest {
            email: "ada@example.com".to_string(),
        })
        .await
        .expect("reset otp sent");
    let code = harness.mailer.last_code_for("ada@example.com");
    let wrong = if code == "999999" { "100000" } else { "999999" };

    let mut last = StatusCode::OK;
    let mut message = Value::Null;
    for _ in 0..MAX_OTP_ATTEMPTS {
        let response = portal_router(harness.state.clone())
            .oneshot(json_request(
                Method::POST,
                "/api/v1/auth/reset-password",
                None,
                Some(json!({ "email": "ada@example.com", "otp": wrong, "password": "x" })),
            ))
            .await
            .expect("route executes");
        last = response.status();
        message = read_json_body(response).await["message"].clone();
    }

    assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(message, "Too many invalid OTP attempts. Request a new OTP");
}

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let harness = harness();
    let user = harness.register("Ada Lovelace", "ada@example.com").await;
    let admin = harness.admin().await;

    for uri in [
        "/api/v1/admin/all-loans",
        "/api/v1/admin/fairness-metrics",
        "/api/v1/admin/action-logs",
        "/api/v1/fairness/report",
        "/api/v1/risk/analysis/some-loan",
    ] {
        let response = portal_router(harness.state.clone())
            .oneshot(json_request(Method::GET, uri, Some(&harness.token_for(&user)), None))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(
            read_json_body(response).await["message"],
            "Forbidden: insufficient permissions"
        );
    }

    let response = portal_router(harness.state.clone())
        .oneshot(json_request(
            Method::GET,
            "/api/v1/admin/all-loans",
            Some(&harness.token_for(&admin)),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn apply_route_validates_and_creates() {
    let harness = harness();
    let user = harness.register("Ada Lovelace", "ada@example.com").await;
    let token = harness.token_for(&user);

    let response = portal_router(harness.state.clone())
        .oneshot(json_request(
            Method::POST,
            "/api/v1/loan/apply",
            Some(&token),
            Some(json!({ "amount": 5000, "purpose": "Laptop" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json_body(response).await["message"],
        "amount, purpose, tenureMonths and monthlyIncome are required"
    );

    let response = portal_router(harness.state.clone())
        .oneshot(json_request(
            Method::POST,
            "/api/v1/loan/apply",
            Some(&token),
            Some(json!({
                "amount": 5000,
                "purpose": "Laptop",
                "tenureMonths": 12,
                "monthlyIncome": 3100,
                "probabilityApproval": 0.64,
                "decisionStatus": "manual",
                "decisionCategory": "yellow"
            })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["userId"], user.id.as_str());
    assert_eq!(body["status"], "pending");
    assert_eq!(body["decisionStatus"], "manual");
    assert_eq!(body["decisionCategory"], "yellow");
    assert_eq!(body["probabilityApproval"], 0.64);
}

#[tokio::test]
async fn prediction_outage_maps_to_bad_gateway() {
    let harness = harness_with(StubPredictor::offline());
    let user = harness.register("Ada Lovelace", "ada@example.com").await;

    let response = portal_router(harness.state.clone())
        .oneshot(json_request(
            Method::POST,
            "/api/v1/loan/apply",
            Some(&harness.token_for(&user)),
            Some(json!({
                "amount": 5000,
                "purpose": "Laptop",
                "tenureMonths": 12,
                "monthlyIncome": 3100,
                "features": serde_json::to_value(features()).expect("features serialize")
            })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        read_json_body(response).await["message"],
        "Risk prediction failed"
    );
}

#[tokio::test]
async fn update_status_route_patches_loans() {
    let harness = harness();
    let admin = harness.admin().await;
    let user = harness.register("Ada Lovelace", "ada@example.com").await;
    let loan = harness.stored_loan(&user.id, 4_000.0, LoanStatus::Pending, DecisionSnapshot::default());
    let uri = format!("/api/v1/admin/update-status/{}", loan.id);

    let response = portal_router(harness.state.clone())
        .oneshot(json_request(
            Method::PATCH,
            &uri,
            Some(&harness.token_for(&admin)),
            Some(json!({ "status": "Rejected", "note": "income not verified" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["name"], "Ada Lovelace");

    let response = portal_router(harness.state.clone())
        .oneshot(json_request(
            Method::PATCH,
            &uri,
            Some(&harness.token_for(&admin)),
            Some(json!({ "status": "maybe" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(response).await["message"], "Invalid status");
}

#[tokio::test]
async fn logout_expires_the_cookie() {
    let harness = harness();

    let response = portal_router(harness.state.clone())
        .oneshot(json_request(Method::POST, "/api/v1/auth/logout", None, None))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("removal cookie")
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn malformed_json_is_reported_as_message() {
    let harness = harness();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{ not json"))
        .expect("request builds");

    let response = portal_router(harness.state.clone())
        .oneshot(request)
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = read_json_body(response).await;
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn signup_otp_handler_returns_dispatch() {
    let harness = harness();

    let Json(dispatch) = crate::portal::router::send_signup_otp(
        State(harness.state.clone()),
        Ok(Json(EmailRequest {
            email: "ada@example.com".to_string(),
        })),
    )
    .await
    .expect("otp dispatched");

    assert_eq!(dispatch.message, "Signup OTP sent");
    assert!(dispatch.dev_otp.is_none());
    assert_eq!(harness.mailer.sent().len(), 1);
}
