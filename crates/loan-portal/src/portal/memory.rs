use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    AdminActionLog, FairnessReport, LoanApplication, LoanId, RiskResult, User, UserId,
};
use super::repository::{
    AdminActionRepository, FairnessReportRepository, LoanRepository, RepositoryError,
    RiskResultRepository, UserRepository,
};

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    loans: Vec<LoanApplication>,
    risk_results: Vec<RiskResult>,
    fairness_reports: Vec<FairnessReport>,
    admin_actions: Vec<AdminActionLog>,
}

/// Process-local store backing every repository trait. Collections keep insertion
/// order; listings walk them in reverse so the newest record comes first.
#[derive(Default, Clone)]
pub struct MemoryStore {
    collections: Arc<Mutex<Collections>>,
}

impl MemoryStore {
    fn lock(&self) -> Result<MutexGuard<'_, Collections>, RepositoryError> {
        self.collections
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl UserRepository for MemoryStore {
    fn insert_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = self.lock()?;
        if guard
            .users
            .iter()
            .any(|existing| existing.id == user.id || existing.email == user.email)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.users.push(user.clone());
        Ok(user)
    }

    fn update_user(&self, user: User) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        match guard.users.iter_mut().find(|existing| existing.id == user.id) {
            Some(slot) => {
                *slot = user;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn user_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.users.iter().find(|user| &user.id == id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.users.iter().find(|user| user.email == email).cloned())
    }
}

impl LoanRepository for MemoryStore {
    fn insert_loan(&self, loan: LoanApplication) -> Result<LoanApplication, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.loans.iter().any(|existing| existing.id == loan.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.loans.push(loan.clone());
        Ok(loan)
    }

    fn update_loan(&self, loan: LoanApplication) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        match guard.loans.iter_mut().find(|existing| existing.id == loan.id) {
            Some(slot) => {
                *slot = loan;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn loan_by_id(&self, id: &LoanId) -> Result<Option<LoanApplication>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.loans.iter().find(|loan| &loan.id == id).cloned())
    }

    fn loans_for_user(&self, owner: &UserId) -> Result<Vec<LoanApplication>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .loans
            .iter()
            .rev()
            .filter(|loan| &loan.user_id == owner)
            .cloned()
            .collect())
    }

    fn all_loans(&self) -> Result<Vec<LoanApplication>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.loans.iter().rev().cloned().collect())
    }
}

impl RiskResultRepository for MemoryStore {
    fn insert_risk_result(&self, result: RiskResult) -> Result<RiskResult, RepositoryError> {
        let mut guard = self.lock()?;
        guard.risk_results.push(result.clone());
        Ok(result)
    }

    fn risk_results_for(&self, loan: &LoanId) -> Result<Vec<RiskResult>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .risk_results
            .iter()
            .rev()
            .filter(|result| &result.loan_id == loan)
            .cloned()
            .collect())
    }
}

impl FairnessReportRepository for MemoryStore {
    fn insert_fairness_report(
        &self,
        report: FairnessReport,
    ) -> Result<FairnessReport, RepositoryError> {
        let mut guard = self.lock()?;
        guard.fairness_reports.push(report.clone());
        Ok(report)
    }

    fn fairness_reports(&self) -> Result<Vec<FairnessReport>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.fairness_reports.iter().rev().cloned().collect())
    }
}

impl AdminActionRepository for MemoryStore {
    fn insert_admin_action(
        &self,
        entry: AdminActionLog,
    ) -> Result<AdminActionLog, RepositoryError> {
        let mut guard = self.lock()?;
        guard.admin_actions.push(entry.clone());
        Ok(entry)
    }

    fn admin_actions(&self) -> Result<Vec<AdminActionLog>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.admin_actions.iter().rev().cloned().collect())
    }
}
