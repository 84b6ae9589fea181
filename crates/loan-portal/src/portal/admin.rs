use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::clock::Clock;
use super::domain::{
    AdminActionId, AdminActionLog, FairnessReport, LoanApplication, LoanId, LoanStatus, User,
    UserId,
};
use super::fairness::compute_fairness;
use super::repository::{
    AdminActionRepository, FairnessReportRepository, LoanRepository, RepositoryError,
    UserRepository,
};

const DEFAULT_APPLICANT_NAME: &str = "Applicant";

/// Row shown in the administrator loan table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    #[serde(rename = "_id")]
    pub id: LoanId,
    pub name: String,
    pub email: String,
    pub amount: f64,
    pub status: LoanStatus,
    pub predicted_score: Option<f64>,
    pub probability_approval: Option<f64>,
    pub risk_category: String,
    pub created_at: DateTime<Utc>,
}

impl LoanSummary {
    /// Decision fields are shown as stored, without the applicant-side normalisation.
    fn new(loan: LoanApplication, owner: Option<&User>) -> Self {
        Self {
            id: loan.id,
            name: owner
                .map(|user| user.name.trim())
                .filter(|name| !name.is_empty())
                .unwrap_or(DEFAULT_APPLICANT_NAME)
                .to_string(),
            email: owner.map(|user| user.email.clone()).unwrap_or_default(),
            amount: loan.amount,
            status: loan.status,
            predicted_score: loan.decision.predicted_score,
            probability_approval: loan.decision.probability_approval,
            risk_category: loan.decision.risk_category,
            created_at: loan.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AdminServiceError {
    #[error("Invalid status")]
    InvalidStatus,
    #[error("Application not found")]
    NotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Review queue, status decisions, and fairness reporting.
pub struct AdminService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> AdminService<S>
where
    S: UserRepository + LoanRepository + FairnessReportRepository + AdminActionRepository,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn all_loans(&self) -> Result<Vec<LoanSummary>, AdminServiceError> {
        let mut owners: HashMap<UserId, Option<User>> = HashMap::new();
        let mut summaries = Vec::new();
        for loan in self.store.all_loans()? {
            if !owners.contains_key(&loan.user_id) {
                let owner = self.store.user_by_id(&loan.user_id)?;
                owners.insert(loan.user_id.clone(), owner);
            }
            let owner = owners.get(&loan.user_id).and_then(Option::as_ref);
            summaries.push(LoanSummary::new(loan, owner));
        }
        Ok(summaries)
    }

    pub fn update_status(
        &self,
        admin: &UserId,
        loan_id: &LoanId,
        update: StatusUpdate,
    ) -> Result<LoanSummary, AdminServiceError> {
        let status = LoanStatus::parse(&update.status).ok_or(AdminServiceError::InvalidStatus)?;
        let mut loan = self
            .store
            .loan_by_id(loan_id)?
            .ok_or(AdminServiceError::NotFound)?;

        let now = self.clock.now();
        loan.status = status;
        loan.updated_at = now;
        self.store.update_loan(loan.clone())?;

        self.store.insert_admin_action(AdminActionLog {
            id: AdminActionId::generate(),
            admin_id: admin.clone(),
            loan_id: loan.id.clone(),
            action: status,
            note: update
                .note
                .map(|note| note.trim().to_string())
                .filter(|note| !note.is_empty()),
            created_at: now,
            updated_at: now,
        })?;
        info!(loan_id = %loan.id, admin_id = %admin, status = status.label(), "loan status updated");

        let owner = self.store.user_by_id(&loan.user_id)?;
        Ok(LoanSummary::new(loan, owner.as_ref()))
    }

    pub fn fairness_metrics(&self) -> Result<Vec<FairnessReport>, AdminServiceError> {
        Ok(self.store.fairness_reports()?)
    }

    pub fn action_logs(&self) -> Result<Vec<AdminActionLog>, AdminServiceError> {
        Ok(self.store.admin_actions()?)
    }

    /// Recompute the income-band fairness reports and persist them.
    pub fn generate_fairness_report(&self) -> Result<Vec<FairnessReport>, AdminServiceError> {
        let loans = self.store.all_loans()?;
        let reports = compute_fairness(&loans, self.clock.now());

        let mut stored = Vec::with_capacity(reports.len());
        for report in reports {
            stored.push(self.store.insert_fairness_report(report)?);
        }
        info!(groups = stored.len(), loans = loans.len(), "fairness report generated");
        Ok(stored)
    }
}
