use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use loan_portal::portal::{portal_router, Mailer, PortalState, PortalStore, RiskPredictor};
use serde_json::json;

pub(crate) fn with_portal_routes<S, P, M>(state: PortalState<S, P, M>) -> axum::Router
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    portal_router(state)
        .route("/", axum::routing::get(banner))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn banner() -> &'static str {
    "Loan portal backend running"
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration;
    use loan_portal::config::{AppEnvironment, AuthConfig, PredictorConfig};
    use loan_portal::portal::{HttpRiskPredictor, MemoryStore, SmtpMailer, SystemClock};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let predictor = HttpRiskPredictor::new(&PredictorConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        })
        .expect("client builds");
        let auth = AuthConfig {
            jwt_secret: "route-test-secret".to_string(),
            session_ttl: Duration::days(7),
            otp_ttl: Duration::minutes(10),
            bcrypt_cost: 4,
            cookie_secure: false,
            admin: None,
        };
        let state = PortalState::new(
            Arc::new(MemoryStore::default()),
            Arc::new(predictor),
            Arc::new(SmtpMailer::unconfigured()),
            &auth,
            AppEnvironment::Development,
            Arc::new(SystemClock),
        );
        let app_state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_portal_routes(state).layer(Extension(app_state))
    }

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).expect("request builds"))
            .await
            .expect("route executes");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn root_reports_service_banner() {
        let (status, body) = get(app(true), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Loan portal backend running");
    }

    #[tokio::test]
    async fn readiness_tracks_boot_flag() {
        let (status, body) = get(app(false), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(value["status"], "initializing");

        let (status, _) = get(app(true), "/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_and_metrics_respond() {
        let (status, body) = get(app(true), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(value["status"], "ok");

        let (status, _) = get(app(true), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn portal_routes_are_mounted() {
        let (status, body) = get(app(true), "/api/v1/loan/my-applications").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(value["message"], "Unauthorized: Token missing");
    }
}
