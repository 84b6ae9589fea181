use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::config::{AppEnvironment, AuthConfig};
use crate::portal::auth::{EmailRequest, OtpPurpose, RegisterRequest};
use crate::portal::clock::Clock;
use crate::portal::domain::{DecisionSnapshot, LoanApplication, LoanId, LoanStatus, User, UserId};
use crate::portal::mail::{MailError, MailMessage, Mailer};
use crate::portal::memory::MemoryStore;
use crate::portal::predictor::{
    Analysis, ApplicantFeatures, Prediction, PredictionOutcome, PredictorError, RiskPredictor,
};
use crate::portal::state::PortalState;

pub(super) const PASSWORD: &str = "hunter22";

pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Starts at the real current time so issued session tokens validate.
    pub(super) fn starting_now() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex")
    }
}

#[derive(Default)]
pub(super) struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    pub(super) fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().expect("mailer mutex").clone()
    }

    /// Six digit code from the most recent OTP mail addressed to `to`.
    pub(super) fn last_code_for(&self, to: &str) -> String {
        self.sent()
            .iter()
            .rev()
            .filter(|message| message.to == to)
            .find_map(|message| {
                message
                    .body
                    .split(|c: char| !c.is_ascii_digit())
                    .find(|chunk| chunk.len() == 6)
                    .map(str::to_string)
            })
            .expect("otp mail sent")
    }
}

impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        self.sent.lock().expect("mailer mutex").push(message);
        Ok(())
    }
}

/// Mailer whose relay rejects the configured credentials.
#[derive(Default)]
pub(super) struct RejectingMailer;

impl Mailer for RejectingMailer {
    async fn send(&self, _message: MailMessage) -> Result<(), MailError> {
        Err(MailError::Authentication)
    }
}

#[derive(Default)]
pub(super) struct StubPredictor {
    outcome: Mutex<Option<PredictionOutcome>>,
    calls: AtomicUsize,
}

impl StubPredictor {
    pub(super) fn answering(outcome: PredictionOutcome) -> Self {
        Self {
            outcome: Mutex::new(Some(outcome)),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn offline() -> Self {
        Self::default()
    }

    pub(super) fn set_outcome(&self, outcome: Option<PredictionOutcome>) {
        *self.outcome.lock().expect("predictor mutex") = outcome;
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RiskPredictor for StubPredictor {
    async fn predict(
        &self,
        _features: &ApplicantFeatures,
    ) -> Result<PredictionOutcome, PredictorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .lock()
            .expect("predictor mutex")
            .clone()
            .ok_or_else(|| PredictorError::Transport("connection refused".to_string()))
    }
}

pub(super) fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret".to_string(),
        session_ttl: Duration::days(7),
        otp_ttl: Duration::minutes(10),
        bcrypt_cost: 4,
        cookie_secure: false,
        admin: None,
    }
}

pub(super) fn features() -> ApplicantFeatures {
    ApplicantFeatures {
        age: 41,
        income: 72_000.0,
        loan_amount: 15_000.0,
        credit_score: 720,
        months_employed: 60,
        num_credit_lines: 2,
        interest_rate: 6.5,
        loan_term: 36,
        dti_ratio: 0.28,
        education: "Master's".to_string(),
        employment_type: "Full-time".to_string(),
        marital_status: "Married".to_string(),
        has_mortgage: "Yes".to_string(),
        has_dependents: "No".to_string(),
        loan_purpose: "Auto".to_string(),
        has_co_signer: "No".to_string(),
    }
}

pub(super) fn outcome(approval: f64, risk_category: &str, status: &str) -> PredictionOutcome {
    PredictionOutcome {
        prediction: Prediction {
            probability_default: Some(Value::from(1.0 - approval)),
            probability_approval: Some(Value::from(approval)),
            predicted_class: Some(if approval >= 0.5 { 0 } else { 1 }),
            risk_category: risk_category.to_string(),
            feature_importance: [("CreditScore".to_string(), 0.41), ("DTIRatio".to_string(), 0.22)]
                .into_iter()
                .collect(),
        },
        analysis: Analysis {
            status: status.to_string(),
            message: format!("Application {status}"),
            improvements_needed: None,
        },
    }
}

pub(super) fn approved_outcome() -> PredictionOutcome {
    outcome(0.9, "Low Risk", "approved")
}

pub(super) fn declined_outcome() -> PredictionOutcome {
    outcome(0.2, "High Risk", "rejected")
}

pub(super) type TestState = PortalState<MemoryStore, StubPredictor, RecordingMailer>;

pub(super) struct Harness {
    pub(super) store: Arc<MemoryStore>,
    pub(super) predictor: Arc<StubPredictor>,
    pub(super) mailer: Arc<RecordingMailer>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) state: TestState,
}

pub(super) fn harness() -> Harness {
    harness_with(StubPredictor::answering(approved_outcome()))
}

pub(super) fn harness_with(predictor: StubPredictor) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let predictor = Arc::new(predictor);
    let mailer = Arc::new(RecordingMailer::default());
    let clock = Arc::new(ManualClock::starting_now());
    let state = PortalState::new(
        store.clone(),
        predictor.clone(),
        mailer.clone(),
        &auth_config(),
        AppEnvironment::Test,
        clock.clone(),
    );

    Harness {
        store,
        predictor,
        mailer,
        clock,
        state,
    }
}

impl Harness {
    pub(super) async fn register(&self, name: &str, email: &str) -> User {
        self.state
            .auth
            .send_signup_otp(EmailRequest {
                email: email.to_string(),
            })
            .await
            .expect("otp sent");
        let otp = self.mailer.last_code_for(email);
        self.state
            .auth
            .register(RegisterRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: PASSWORD.to_string(),
                otp,
            })
            .await
            .expect("registration succeeds")
    }

    pub(super) async fn admin(&self) -> User {
        self.state
            .auth
            .ensure_admin("Review Desk", "admin@example.com", "admin-pass")
            .await
            .expect("admin seeded")
    }

    pub(super) fn token_for(&self, user: &User) -> String {
        self.state
            .tokens
            .issue(user, Utc::now())
            .expect("token issued")
    }

    /// Store a loan directly, bypassing intake validation.
    pub(super) fn stored_loan(
        &self,
        owner: &UserId,
        monthly_income: f64,
        status: LoanStatus,
        decision: DecisionSnapshot,
    ) -> LoanApplication {
        use crate::portal::repository::LoanRepository;

        let now = self.clock.now();
        self.store
            .insert_loan(LoanApplication {
                id: LoanId::generate(),
                user_id: owner.clone(),
                amount: 10_000.0,
                purpose: "Home improvement".to_string(),
                tenure_months: 24,
                monthly_income,
                status,
                decision,
                notes: None,
                features: None,
                created_at: now,
                updated_at: now,
            })
            .expect("loan stored")
    }
}

pub(super) fn otp_subject(purpose: OtpPurpose) -> &'static str {
    match purpose {
        OtpPurpose::Signup => "Your signup OTP",
        OtpPurpose::PasswordReset => "Your password reset OTP",
    }
}

pub(super) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("json body")))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
