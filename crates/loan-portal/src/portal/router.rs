use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use serde_json::{json, Value};

use super::admin::{LoanSummary, StatusUpdate};
use super::auth::{
    AdminUser, AuthUser, EmailRequest, LoginRequest, OtpDispatch, RegisterRequest,
    ResetPasswordRequest, SESSION_COOKIE,
};
use super::domain::{
    AdminActionLog, FairnessReport, LoanApplication, LoanId, Role, RiskResult, User, UserId,
};
use super::loans::LoanSubmission;
use super::mail::Mailer;
use super::predictor::RiskPredictor;
use super::profile::ProfileUpdate;
use super::repository::PortalStore;
use super::response::ApiError;
use super::state::PortalState;

pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisteredResponse {
    pub(crate) message: &'static str,
    pub(crate) user_id: UserId,
    pub(crate) name: String,
    pub(crate) email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    pub(crate) message: &'static str,
    pub(crate) token: String,
    pub(crate) user_id: UserId,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) role: Role,
}

/// Every `/api/v1` route of the portal.
pub fn portal_router<S, P, M>(state: PortalState<S, P, M>) -> Router
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    Router::new()
        .route("/api/v1/auth/login", post(login::<S, P, M>))
        .route("/api/v1/auth/logout", post(logout::<S, P, M>))
        .route(
            "/api/v1/auth/signup/send-otp",
            post(send_signup_otp::<S, P, M>),
        )
        .route("/api/v1/auth/signup", post(register::<S, P, M>))
        .route(
            "/api/v1/auth/forgot-password/send-otp",
            post(send_reset_otp::<S, P, M>),
        )
        .route("/api/v1/auth/reset-password", post(reset_password::<S, P, M>))
        .route("/api/v1/user/profile", get(profile::<S, P, M>))
        .route("/api/v1/user/update", put(update_profile::<S, P, M>))
        .route("/api/v1/loan/apply", post(apply::<S, P, M>))
        .route(
            "/api/v1/loan/my-applications",
            get(my_applications::<S, P, M>),
        )
        .route("/api/v1/loan/details/:id", get(loan_details::<S, P, M>))
        .route("/api/v1/admin/all-loans", get(all_loans::<S, P, M>))
        .route(
            "/api/v1/admin/update-status/:id",
            patch(update_status::<S, P, M>),
        )
        .route(
            "/api/v1/admin/fairness-metrics",
            get(fairness_metrics::<S, P, M>),
        )
        .route("/api/v1/admin/action-logs", get(action_logs::<S, P, M>))
        .route(
            "/api/v1/risk/analysis/:loan_id",
            get(risk_analysis::<S, P, M>),
        )
        .route("/api/v1/fairness/report", get(fairness_report::<S, P, M>))
        .with_state(state)
}

fn session_cookie(token: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

pub(crate) async fn send_signup_otp<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> ApiResult<Json<OtpDispatch>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    let Json(request) = payload?;
    Ok(Json(state.auth.send_signup_otp(request).await?))
}

pub(crate) async fn register<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisteredResponse>)>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    let Json(request) = payload?;
    let user = state.auth.register(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            message: "Registered successfully",
            user_id: user.id,
            name: user.name,
            email: user.email,
        }),
    ))
}

pub(crate) async fn login<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(CookieJar, Json<LoginResponse>)>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    let Json(request) = payload?;
    let session = state.auth.login(request).await?;

    let cookie = session_cookie(
        session.token.clone(),
        state.tokens.ttl().num_seconds(),
        state.cookie_secure,
    );
    let user = session.user;
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            message: "Login successful",
            token: session.token,
            user_id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }),
    ))
}

/// Always emits an expired cookie, whether or not the request carried one.
pub(crate) async fn logout<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    jar: CookieJar,
) -> (CookieJar, Json<Value>)
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    let jar = jar.add(session_cookie(String::new(), 0, state.cookie_secure));
    (jar, Json(json!({ "message": "Logged out" })))
}

pub(crate) async fn send_reset_otp<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> ApiResult<Json<OtpDispatch>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    let Json(request) = payload?;
    Ok(Json(state.auth.send_password_reset_otp(request).await?))
}

pub(crate) async fn reset_password<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> ApiResult<Json<Value>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    let Json(request) = payload?;
    state.auth.reset_password(request).await?;
    Ok(Json(json!({ "message": "Password reset successful" })))
}

pub(crate) async fn profile<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    caller: AuthUser,
) -> ApiResult<Json<User>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    Ok(Json(state.profile.profile(&caller.id)?))
}

pub(crate) async fn update_profile<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    caller: AuthUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Json<User>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    let Json(update) = payload?;
    Ok(Json(state.profile.update(&caller.id, update)?))
}

pub(crate) async fn apply<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    caller: AuthUser,
    payload: Result<Json<LoanSubmission>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<LoanApplication>)>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    let Json(submission) = payload?;
    let loan = state.loans.submit(&caller.id, submission).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

pub(crate) async fn my_applications<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<LoanApplication>>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    Ok(Json(state.loans.my_applications(&caller.id)?))
}

pub(crate) async fn loan_details<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<LoanApplication>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    Ok(Json(state.loans.details(&caller, &LoanId(id))?))
}

pub(crate) async fn all_loans<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<LoanSummary>>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    Ok(Json(state.admin.all_loans()?))
}

pub(crate) async fn update_status<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Json<LoanSummary>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    let Json(update) = payload?;
    Ok(Json(state.admin.update_status(&admin.id, &LoanId(id), update)?))
}

pub(crate) async fn fairness_metrics<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<FairnessReport>>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    Ok(Json(state.admin.fairness_metrics()?))
}

pub(crate) async fn action_logs<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<AdminActionLog>>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    Ok(Json(state.admin.action_logs()?))
}

pub(crate) async fn risk_analysis<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    _admin: AdminUser,
    Path(loan_id): Path<String>,
) -> ApiResult<Json<RiskResult>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    Ok(Json(state.risk.analyse(&LoanId(loan_id)).await?))
}

pub(crate) async fn fairness_report<S, P, M>(
    State(state): State<PortalState<S, P, M>>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<FairnessReport>>>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    Ok(Json(state.admin.generate_fairness_report()?))
}
