use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::predictor::ApplicantFeatures;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of a registered account.
    UserId
);
record_id!(
    /// Identifier of a loan application.
    LoanId
);
record_id!(RiskResultId);
record_id!(FairnessReportId);
record_id!(AdminActionId);

/// Lowercase and trim an address so lookups and OTP keys agree.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// Registered account. The password hash never leaves the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status set by administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl LoanStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
        }
    }

    /// Case-insensitive parse; anything outside the enum yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(LoanStatus::Pending),
            "approved" => Some(LoanStatus::Approved),
            "rejected" => Some(LoanStatus::Rejected),
            _ => None,
        }
    }
}

/// Outcome suggested by the prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Approved,
    Manual,
    Declined,
}

impl DecisionStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "approved" => Some(DecisionStatus::Approved),
            "manual" => Some(DecisionStatus::Manual),
            "declined" => Some(DecisionStatus::Declined),
            _ => None,
        }
    }
}

/// Traffic-light bucket rendered on the applicant dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionCategory {
    Green,
    Yellow,
    Red,
}

impl DecisionCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "green" => Some(DecisionCategory::Green),
            "yellow" => Some(DecisionCategory::Yellow),
            "red" => Some(DecisionCategory::Red),
            _ => None,
        }
    }
}

/// Persisted copy of the prediction so dashboards stay stable across sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSnapshot {
    pub predicted_score: Option<f64>,
    pub decision_status: Option<DecisionStatus>,
    pub decision_category: Option<DecisionCategory>,
    pub probability_approval: Option<f64>,
    pub probability_default: Option<f64>,
    #[serde(default)]
    pub risk_category: String,
    #[serde(default)]
    pub decision_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanApplication {
    #[serde(rename = "_id")]
    pub id: LoanId,
    pub user_id: UserId,
    pub amount: f64,
    pub purpose: String,
    pub tenure_months: u32,
    pub monthly_income: f64,
    pub status: LoanStatus,
    #[serde(flatten)]
    pub decision: DecisionSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<ApplicantFeatures>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Risk analysis recorded when an administrator inspects a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResult {
    #[serde(rename = "_id")]
    pub id: RiskResultId,
    pub loan_id: LoanId,
    pub probability: f64,
    pub risk_level: String,
    pub feature_importance: BTreeMap<String, f64>,
    #[serde(default)]
    pub recommendation: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessReport {
    #[serde(rename = "_id")]
    pub id: FairnessReportId,
    pub group: String,
    pub approval_rate: f64,
    pub rejection_rate: f64,
    pub bias_score: f64,
    pub metrics: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Audit entry written for every administrator status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminActionLog {
    #[serde(rename = "_id")]
    pub id: AdminActionId,
    pub admin_id: UserId,
    pub loan_id: LoanId,
    pub action: LoanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
