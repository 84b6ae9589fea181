use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::clock::Clock;
use super::domain::{LoanApplication, LoanId, RiskResult, RiskResultId};
use super::predictor::{
    parse_probability, PredictionOutcome, PredictorError, RiskLevel, RiskPredictor,
};
use super::repository::{LoanRepository, RepositoryError, RiskResultRepository};

#[derive(Debug, thiserror::Error)]
pub enum RiskServiceError {
    #[error("Loan not found")]
    NotFound,
    #[error("No prediction data available for this loan")]
    NoPredictionData,
    #[error("Risk prediction failed")]
    Prediction(#[source] PredictorError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

struct Assessment {
    probability: f64,
    risk_level: String,
    feature_importance: BTreeMap<String, f64>,
    recommendation: String,
}

fn default_recommendation(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "Eligible for standard approval",
        RiskLevel::Medium => "Review income and repayment history before deciding",
        RiskLevel::High => "Manual review recommended before approval",
    }
}

impl Assessment {
    fn from_outcome(outcome: PredictionOutcome) -> Option<Self> {
        let prediction = outcome.prediction;
        let probability = prediction
            .probability_default
            .as_ref()
            .and_then(parse_probability)
            .or_else(|| {
                prediction
                    .probability_approval
                    .as_ref()
                    .and_then(parse_probability)
                    .map(|approval| 1.0 - approval)
            })?;

        let risk_level = match prediction.risk_category.trim() {
            "" => RiskLevel::from_default_probability(probability)
                .label()
                .to_string(),
            category => category.to_string(),
        };

        Some(Self {
            probability,
            risk_level,
            feature_importance: prediction.feature_importance,
            recommendation: outcome.analysis.recommendation(),
        })
    }

    fn from_snapshot(loan: &LoanApplication) -> Option<Self> {
        let decision = &loan.decision;
        let probability = decision
            .probability_default
            .or_else(|| decision.probability_approval.map(|approval| 1.0 - approval))?;
        let level = RiskLevel::from_default_probability(probability);

        let recommendation = match decision.decision_message.trim() {
            "" => default_recommendation(level).to_string(),
            message => message.to_string(),
        };

        Some(Self {
            probability,
            risk_level: level.label().to_string(),
            feature_importance: BTreeMap::new(),
            recommendation,
        })
    }
}

/// Per-loan risk analysis recorded for administrators.
pub struct RiskService<S, P> {
    store: Arc<S>,
    predictor: Arc<P>,
    clock: Arc<dyn Clock>,
}

impl<S, P> RiskService<S, P>
where
    S: LoanRepository + RiskResultRepository,
    P: RiskPredictor,
{
    pub fn new(store: Arc<S>, predictor: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            predictor,
            clock,
        }
    }

    /// Re-score the loan when its feature set was kept, otherwise fall back to the
    /// probabilities stored with it.
    pub async fn analyse(&self, loan_id: &LoanId) -> Result<RiskResult, RiskServiceError> {
        let loan = self
            .store
            .loan_by_id(loan_id)?
            .ok_or(RiskServiceError::NotFound)?;

        let assessment = match &loan.features {
            Some(features) => {
                let outcome = self
                    .predictor
                    .predict(features)
                    .await
                    .map_err(RiskServiceError::Prediction)?;
                Assessment::from_outcome(outcome)
            }
            None => Assessment::from_snapshot(&loan),
        }
        .ok_or(RiskServiceError::NoPredictionData)?;

        let now = self.clock.now();
        let result = self.store.insert_risk_result(RiskResult {
            id: RiskResultId::generate(),
            loan_id: loan.id.clone(),
            probability: assessment.probability,
            risk_level: assessment.risk_level,
            feature_importance: assessment.feature_importance,
            recommendation: assessment.recommendation,
            created_at: now,
            updated_at: now,
        })?;

        info!(loan_id = %loan.id, risk_level = %result.risk_level, "risk analysis recorded");
        Ok(result)
    }

    pub fn history(&self, loan_id: &LoanId) -> Result<Vec<RiskResult>, RiskServiceError> {
        Ok(self.store.risk_results_for(loan_id)?)
    }
}
