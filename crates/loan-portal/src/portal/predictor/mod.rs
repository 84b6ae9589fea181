//! Client side of the external credit-risk prediction service.

mod http;
mod snapshot;

use std::collections::BTreeMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use http::HttpRiskPredictor;
pub use snapshot::{
    approval_probability, credit_score_from_probability, normalize_probability, parse_probability,
    RiskLevel,
};

/// Applicant feature set expected by the prediction service, in its PascalCase wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplicantFeatures {
    pub age: u32,
    pub income: f64,
    pub loan_amount: f64,
    pub credit_score: u32,
    pub months_employed: u32,
    pub num_credit_lines: u32,
    pub interest_rate: f64,
    pub loan_term: u32,
    #[serde(rename = "DTIRatio")]
    pub dti_ratio: f64,
    pub education: String,
    pub employment_type: String,
    pub marital_status: String,
    pub has_mortgage: String,
    pub has_dependents: String,
    pub loan_purpose: String,
    pub has_co_signer: String,
}

/// Model output. Probabilities arrive as numbers but are tolerated as strings ("85%").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub probability_default: Option<Value>,
    #[serde(default)]
    pub probability_approval: Option<Value>,
    #[serde(default)]
    pub predicted_class: Option<i64>,
    #[serde(default)]
    pub risk_category: String,
    #[serde(default)]
    pub feature_importance: BTreeMap<String, f64>,
}

/// Narrative analysis attached to a prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub improvements_needed: Option<String>,
}

impl Analysis {
    /// Improvement advice when present, otherwise the headline message.
    pub fn recommendation(&self) -> String {
        match self.improvements_needed.as_deref().map(str::trim) {
            Some(advice) if !advice.is_empty() => advice.to_string(),
            _ => self.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PredictionEnvelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub prediction: Option<Prediction>,
    #[serde(default)]
    pub analysis: Option<Analysis>,
}

impl PredictionEnvelope {
    pub(crate) fn into_outcome(self) -> Result<PredictionOutcome, PredictorError> {
        if let Some(error) = self.error {
            return Err(PredictorError::Rejected(error));
        }
        if self.success == Some(false) {
            return Err(PredictorError::Rejected(
                "prediction service reported failure".to_string(),
            ));
        }
        let prediction = self.prediction.ok_or_else(|| {
            PredictorError::Decode("response did not include a prediction".to_string())
        })?;

        Ok(PredictionOutcome {
            prediction,
            analysis: self.analysis.unwrap_or_default(),
        })
    }
}

/// Parsed prediction call result.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    pub prediction: Prediction,
    pub analysis: Analysis,
}

/// Seam between the portal and the black-box scoring service.
pub trait RiskPredictor: Send + Sync + 'static {
    fn predict(
        &self,
        features: &ApplicantFeatures,
    ) -> impl Future<Output = Result<PredictionOutcome, PredictorError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    #[error("prediction service unreachable: {0}")]
    Transport(String),
    #[error("prediction service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unreadable prediction response: {0}")]
    Decode(String),
    #[error("prediction rejected: {0}")]
    Rejected(String),
}
