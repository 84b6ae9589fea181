use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::auth::AuthUser;
use super::clock::Clock;
use super::domain::{
    DecisionCategory, DecisionSnapshot, DecisionStatus, LoanApplication, LoanId, LoanStatus,
    UserId,
};
use super::predictor::{
    credit_score_from_probability, normalize_probability, parse_probability, ApplicantFeatures,
    PredictorError, RiskPredictor,
};
use super::repository::{LoanRepository, RepositoryError};

/// Loan application body. Numeric fields tolerate numeric strings, and the optional
/// decision fields are whatever the client computed; they are sanitised on the way in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSubmission {
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub purpose: Option<Value>,
    #[serde(default)]
    pub tenure_months: Option<Value>,
    #[serde(default)]
    pub monthly_income: Option<Value>,
    #[serde(default)]
    pub notes: Option<String>,
    /// When present the backend scores the application itself.
    #[serde(default)]
    pub features: Option<ApplicantFeatures>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub predicted_score: Option<Value>,
    #[serde(default)]
    pub decision_status: Option<Value>,
    #[serde(default)]
    pub decision_category: Option<Value>,
    #[serde(default)]
    pub probability_approval: Option<Value>,
    #[serde(default)]
    pub probability_default: Option<Value>,
    #[serde(default)]
    pub risk_category: Option<Value>,
    #[serde(default)]
    pub decision_message: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoanServiceError {
    #[error("amount, purpose, tenureMonths and monthlyIncome are required")]
    InvalidSubmission,
    #[error("Loan not found")]
    NotFound,
    #[error("Risk prediction failed")]
    Prediction(#[source] PredictorError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

struct RequiredFields {
    amount: f64,
    purpose: String,
    tenure_months: u32,
    monthly_income: f64,
}

fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(raw) => Some(raw.trim().to_string()),
        _ => None,
    }
}

impl LoanSubmission {
    fn required(&self) -> Result<RequiredFields, LoanServiceError> {
        let amount = number(self.amount.as_ref());
        let purpose = text(self.purpose.as_ref()).filter(|purpose| !purpose.is_empty());
        let tenure = number(self.tenure_months.as_ref())
            .filter(|months| *months >= 0.0 && *months <= f64::from(u32::MAX));
        let income = number(self.monthly_income.as_ref());

        match (amount, purpose, tenure, income) {
            (Some(amount), Some(purpose), Some(tenure), Some(monthly_income)) => {
                Ok(RequiredFields {
                    amount,
                    purpose,
                    tenure_months: tenure.round() as u32,
                    monthly_income,
                })
            }
            _ => Err(LoanServiceError::InvalidSubmission),
        }
    }

    /// Client-provided decision fields with unknown enum values and non-finite numbers dropped.
    fn client_snapshot(&self) -> DecisionSnapshot {
        DecisionSnapshot {
            predicted_score: number(self.predicted_score.as_ref()),
            decision_status: text(self.decision_status.as_ref())
                .and_then(|raw| DecisionStatus::parse(&raw)),
            decision_category: text(self.decision_category.as_ref())
                .and_then(|raw| DecisionCategory::parse(&raw)),
            probability_approval: self.probability_approval.as_ref().and_then(parse_probability),
            probability_default: self.probability_default.as_ref().and_then(parse_probability),
            risk_category: text(self.risk_category.as_ref()).unwrap_or_default(),
            decision_message: text(self.decision_message.as_ref()).unwrap_or_default(),
        }
    }

    /// Exact lowercase match, like the decision enums; anything else stays pending.
    fn client_status(&self) -> LoanStatus {
        text(self.status.as_ref())
            .and_then(|raw| LoanStatus::parse(&raw).filter(|status| status.label() == raw))
            .unwrap_or_default()
    }
}

/// Repair decision fields for display: probabilities land in `0..=1` and a missing
/// score is derived from the approval probability.
pub fn normalize_loan(mut loan: LoanApplication) -> LoanApplication {
    let decision = &mut loan.decision;
    decision.probability_approval = decision.probability_approval.and_then(normalize_probability);
    decision.probability_default = decision.probability_default.and_then(normalize_probability);
    decision.predicted_score = match decision.predicted_score {
        Some(score) if score.is_finite() => Some(score),
        _ => decision
            .probability_approval
            .map(credit_score_from_probability),
    };
    loan
}

/// Application intake and applicant-facing reads.
pub struct LoanService<S, P> {
    store: Arc<S>,
    predictor: Arc<P>,
    clock: Arc<dyn Clock>,
}

impl<S, P> LoanService<S, P>
where
    S: LoanRepository,
    P: RiskPredictor,
{
    pub fn new(store: Arc<S>, predictor: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            predictor,
            clock,
        }
    }

    pub async fn submit(
        &self,
        owner: &UserId,
        submission: LoanSubmission,
    ) -> Result<LoanApplication, LoanServiceError> {
        let fields = submission.required()?;

        let (decision, status) = match &submission.features {
            Some(features) => {
                let outcome = self
                    .predictor
                    .predict(features)
                    .await
                    .map_err(LoanServiceError::Prediction)?;
                let snapshot = DecisionSnapshot::from_prediction(&outcome);
                let status = snapshot.initial_status();
                (snapshot, status)
            }
            None => (submission.client_snapshot(), submission.client_status()),
        };

        let now = self.clock.now();
        let loan = LoanApplication {
            id: LoanId::generate(),
            user_id: owner.clone(),
            amount: fields.amount,
            purpose: fields.purpose,
            tenure_months: fields.tenure_months,
            monthly_income: fields.monthly_income,
            status,
            decision,
            notes: submission
                .notes
                .map(|notes| notes.trim().to_string())
                .filter(|notes| !notes.is_empty()),
            features: submission.features,
            created_at: now,
            updated_at: now,
        };

        let loan = self.store.insert_loan(loan)?;
        info!(
            loan_id = %loan.id,
            status = loan.status.label(),
            scored = loan.features.is_some(),
            "loan application stored"
        );
        Ok(loan)
    }

    pub fn my_applications(
        &self,
        owner: &UserId,
    ) -> Result<Vec<LoanApplication>, LoanServiceError> {
        Ok(self
            .store
            .loans_for_user(owner)?
            .into_iter()
            .map(normalize_loan)
            .collect())
    }

    /// Owners and administrators can read a loan; everyone else sees it as missing.
    pub fn details(
        &self,
        caller: &AuthUser,
        id: &LoanId,
    ) -> Result<LoanApplication, LoanServiceError> {
        let loan = self
            .store
            .loan_by_id(id)?
            .ok_or(LoanServiceError::NotFound)?;
        if loan.user_id != caller.id && !caller.is_admin() {
            return Err(LoanServiceError::NotFound);
        }
        Ok(normalize_loan(loan))
    }
}
