use crate::cli::ServeArgs;
use crate::infra::{cors_layer, AppState};
use crate::routes::with_portal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loan_portal::config::AppConfig;
use loan_portal::error::AppError;
use loan_portal::portal::{HttpRiskPredictor, MemoryStore, PortalState, SmtpMailer, SystemClock};
use loan_portal::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(MemoryStore::default());
    let predictor = Arc::new(HttpRiskPredictor::new(&config.predictor)?);
    let mailer = SmtpMailer::from_config(&config.mail)?;
    if !mailer.is_configured() {
        warn!("mail relay not configured; OTP codes are only returned outside production");
    }

    let portal = PortalState::new(
        store,
        predictor.clone(),
        Arc::new(mailer),
        &config.auth,
        config.environment,
        Arc::new(SystemClock),
    );

    if let Some(seed) = &config.auth.admin {
        let admin = portal
            .auth
            .ensure_admin(&seed.name, &seed.email, &seed.password)
            .await?;
        info!(admin_id = %admin.id, email = %admin.email, "admin account ready");
    }

    let app = with_portal_routes(portal)
        .layer(Extension(app_state))
        .layer(cors_layer(&config.cors))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        predictor = predictor.endpoint(),
        "loan portal backend ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
