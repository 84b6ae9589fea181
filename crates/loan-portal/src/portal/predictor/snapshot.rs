use serde_json::Value;

use crate::portal::domain::{DecisionCategory, DecisionSnapshot, DecisionStatus, LoanStatus};

use super::{Prediction, PredictionOutcome};

const HIGH_RISK_THRESHOLD: f64 = 0.7;
const LOW_RISK_THRESHOLD: f64 = 0.3;
const SCORE_FLOOR: f64 = 300.0;
const SCORE_SPAN: f64 = 550.0;

/// Accept a probability as a fraction, a percentage, or a percent string.
pub fn normalize_probability(value: f64) -> Option<f64> {
    if !value.is_finite() {
        None
    } else if (0.0..=1.0).contains(&value) {
        Some(value)
    } else if value > 1.0 && value <= 100.0 {
        Some(value / 100.0)
    } else {
        None
    }
}

pub fn parse_probability(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().and_then(normalize_probability),
        Value::String(raw) => {
            let raw = raw.trim();
            if let Some(percent) = raw.strip_suffix('%') {
                percent
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .map(|value| value / 100.0)
            } else {
                raw.parse::<f64>().ok().and_then(normalize_probability)
            }
        }
        _ => None,
    }
}

/// Map an approval probability onto the 300-850 credit-style scale shown to applicants.
pub fn credit_score_from_probability(approval: f64) -> f64 {
    (SCORE_FLOOR + approval * SCORE_SPAN).round()
}

/// Approval probability, falling back to the complement of the default probability.
pub fn approval_probability(prediction: &Prediction) -> Option<f64> {
    prediction
        .probability_approval
        .as_ref()
        .and_then(parse_probability)
        .or_else(|| {
            prediction
                .probability_default
                .as_ref()
                .and_then(parse_probability)
                .map(|default| 1.0 - default)
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_default_probability(probability: f64) -> Self {
        if probability >= HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if probability <= LOW_RISK_THRESHOLD {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::High => "High Risk",
        }
    }
}

impl DecisionSnapshot {
    /// Derive the stored decision fields from a prediction service response.
    pub fn from_prediction(outcome: &PredictionOutcome) -> Self {
        let prediction = &outcome.prediction;
        let approval = approval_probability(prediction).unwrap_or(0.0);

        let decision_status = match outcome.analysis.status.to_ascii_lowercase().as_str() {
            "approved" => DecisionStatus::Approved,
            "rejected" => DecisionStatus::Declined,
            _ => DecisionStatus::Manual,
        };

        let category = prediction.risk_category.to_ascii_lowercase();
        let decision_category = if category.contains("low") {
            Some(DecisionCategory::Green)
        } else if category.contains("medium") {
            Some(DecisionCategory::Yellow)
        } else if category.contains("high") {
            Some(DecisionCategory::Red)
        } else {
            None
        };

        Self {
            predicted_score: Some(credit_score_from_probability(approval)),
            decision_status: Some(decision_status),
            decision_category,
            probability_approval: prediction
                .probability_approval
                .as_ref()
                .and_then(parse_probability),
            probability_default: prediction
                .probability_default
                .as_ref()
                .and_then(parse_probability),
            risk_category: prediction.risk_category.clone(),
            decision_message: outcome.analysis.message.clone(),
        }
    }

    /// Declined predictions are rejected up front; everything else awaits review.
    pub fn initial_status(&self) -> LoanStatus {
        if self.decision_status == Some(DecisionStatus::Declined) {
            LoanStatus::Rejected
        } else {
            LoanStatus::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::predictor::Analysis;
    use serde_json::json;

    fn outcome(approval: Value, category: &str, status: &str) -> PredictionOutcome {
        PredictionOutcome {
            prediction: Prediction {
                probability_default: None,
                probability_approval: Some(approval),
                predicted_class: Some(1),
                risk_category: category.to_string(),
                feature_importance: Default::default(),
            },
            analysis: Analysis {
                status: status.to_string(),
                message: "Congratulations!".to_string(),
                improvements_needed: None,
            },
        }
    }

    #[test]
    fn parse_probability_handles_fractions_percentages_and_strings() {
        assert_eq!(parse_probability(&json!(0.85)), Some(0.85));
        assert_eq!(parse_probability(&json!(85)), Some(0.85));
        assert_eq!(parse_probability(&json!("85%")), Some(0.85));
        assert_eq!(parse_probability(&json!(" 0.4 ")), Some(0.4));
        assert_eq!(parse_probability(&json!(250)), None);
        assert_eq!(parse_probability(&json!(-0.1)), None);
        assert_eq!(parse_probability(&json!("n/a")), None);
        assert_eq!(parse_probability(&json!(null)), None);
    }

    #[test]
    fn score_spans_300_to_850() {
        assert_eq!(credit_score_from_probability(0.0), 300.0);
        assert_eq!(credit_score_from_probability(1.0), 850.0);
        assert_eq!(credit_score_from_probability(0.5), 575.0);
    }

    #[test]
    fn approved_low_risk_prediction_maps_to_green() {
        let snapshot = DecisionSnapshot::from_prediction(&outcome(json!(0.9), "Low Risk", "approved"));
        assert_eq!(snapshot.predicted_score, Some(795.0));
        assert_eq!(snapshot.decision_status, Some(DecisionStatus::Approved));
        assert_eq!(snapshot.decision_category, Some(DecisionCategory::Green));
        assert_eq!(snapshot.decision_message, "Congratulations!");
        assert_eq!(snapshot.initial_status(), LoanStatus::Pending);
    }

    #[test]
    fn rejected_prediction_is_declined_and_rejected() {
        let snapshot =
            DecisionSnapshot::from_prediction(&outcome(json!(0.1), "High Risk", "rejected"));
        assert_eq!(snapshot.decision_status, Some(DecisionStatus::Declined));
        assert_eq!(snapshot.decision_category, Some(DecisionCategory::Red));
        assert_eq!(snapshot.initial_status(), LoanStatus::Rejected);
    }

    #[test]
    fn unknown_analysis_status_needs_manual_review() {
        let snapshot = DecisionSnapshot::from_prediction(&outcome(json!(0.5), "Unrated", ""));
        assert_eq!(snapshot.decision_status, Some(DecisionStatus::Manual));
        assert_eq!(snapshot.decision_category, None);
    }

    #[test]
    fn approval_falls_back_to_default_complement() {
        let prediction = Prediction {
            probability_default: Some(json!(0.25)),
            ..Prediction::default()
        };
        assert_eq!(approval_probability(&prediction), Some(0.75));
    }

    #[test]
    fn risk_levels_follow_thresholds() {
        assert_eq!(RiskLevel::from_default_probability(0.7), RiskLevel::High);
        assert_eq!(RiskLevel::from_default_probability(0.3), RiskLevel::Low);
        assert_eq!(RiskLevel::from_default_probability(0.5), RiskLevel::Medium);
    }
}
