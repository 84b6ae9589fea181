//! Loan application portal: accounts with OTP-verified signup, loan intake scored by an
//! external prediction service, and administrator review with fairness reporting.

pub mod admin;
pub mod auth;
pub mod clock;
pub mod domain;
pub mod fairness;
pub mod loans;
pub mod mail;
pub mod memory;
pub mod predictor;
pub mod profile;
pub mod repository;
pub mod response;
pub mod risk;
pub mod router;
pub mod state;

#[cfg(test)]
mod tests;

pub use admin::{AdminService, AdminServiceError, LoanSummary, StatusUpdate};
pub use auth::{AdminUser, AuthError, AuthService, AuthUser, TokenIssuer};
pub use clock::{Clock, SystemClock};
pub use domain::{
    AdminActionLog, DecisionCategory, DecisionSnapshot, DecisionStatus, FairnessReport,
    LoanApplication, LoanId, LoanStatus, RiskResult, Role, User, UserId,
};
pub use loans::{LoanService, LoanServiceError, LoanSubmission};
pub use mail::{MailError, MailMessage, Mailer, SmtpMailer};
pub use memory::MemoryStore;
pub use predictor::{
    ApplicantFeatures, HttpRiskPredictor, PredictionOutcome, PredictorError, RiskPredictor,
};
pub use profile::{ProfileError, ProfileService};
pub use repository::{PortalStore, RepositoryError};
pub use response::ApiError;
pub use risk::{RiskService, RiskServiceError};
pub use router::portal_router;
pub use state::PortalState;
