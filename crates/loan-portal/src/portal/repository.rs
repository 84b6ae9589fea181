use super::domain::{
    AdminActionLog, FairnessReport, LoanApplication, LoanId, RiskResult, User, UserId,
};

/// Account storage. Emails are stored normalized and must be unique.
pub trait UserRepository: Send + Sync {
    fn insert_user(&self, user: User) -> Result<User, RepositoryError>;
    fn update_user(&self, user: User) -> Result<(), RepositoryError>;
    fn user_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    fn user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
}

/// Loan application storage. Listings are returned newest first.
pub trait LoanRepository: Send + Sync {
    fn insert_loan(&self, loan: LoanApplication) -> Result<LoanApplication, RepositoryError>;
    fn update_loan(&self, loan: LoanApplication) -> Result<(), RepositoryError>;
    fn loan_by_id(&self, id: &LoanId) -> Result<Option<LoanApplication>, RepositoryError>;
    fn loans_for_user(&self, owner: &UserId) -> Result<Vec<LoanApplication>, RepositoryError>;
    fn all_loans(&self) -> Result<Vec<LoanApplication>, RepositoryError>;
}

pub trait RiskResultRepository: Send + Sync {
    fn insert_risk_result(&self, result: RiskResult) -> Result<RiskResult, RepositoryError>;
    fn risk_results_for(&self, loan: &LoanId) -> Result<Vec<RiskResult>, RepositoryError>;
}

pub trait FairnessReportRepository: Send + Sync {
    fn insert_fairness_report(
        &self,
        report: FairnessReport,
    ) -> Result<FairnessReport, RepositoryError>;
    fn fairness_reports(&self) -> Result<Vec<FairnessReport>, RepositoryError>;
}

pub trait AdminActionRepository: Send + Sync {
    fn insert_admin_action(&self, entry: AdminActionLog)
        -> Result<AdminActionLog, RepositoryError>;
    fn admin_actions(&self) -> Result<Vec<AdminActionLog>, RepositoryError>;
}

/// Every collection the portal persists, so services and routers carry a single bound.
pub trait PortalStore:
    UserRepository
    + LoanRepository
    + RiskResultRepository
    + FairnessReportRepository
    + AdminActionRepository
    + 'static
{
}

impl<T> PortalStore for T where
    T: UserRepository
        + LoanRepository
        + RiskResultRepository
        + FairnessReportRepository
        + AdminActionRepository
        + 'static
{
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
