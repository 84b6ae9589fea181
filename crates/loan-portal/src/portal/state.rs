use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::{AppEnvironment, AuthConfig};

use super::admin::AdminService;
use super::auth::{AuthService, AuthSettings, TokenIssuer};
use super::clock::Clock;
use super::loans::LoanService;
use super::mail::Mailer;
use super::predictor::RiskPredictor;
use super::profile::ProfileService;
use super::repository::PortalStore;
use super::risk::RiskService;

/// Shared handler state: one instance of each service over a single store.
pub struct PortalState<S, P, M> {
    pub auth: Arc<AuthService<S, M>>,
    pub profile: Arc<ProfileService<S>>,
    pub loans: Arc<LoanService<S, P>>,
    pub risk: Arc<RiskService<S, P>>,
    pub admin: Arc<AdminService<S>>,
    pub tokens: TokenIssuer,
    pub cookie_secure: bool,
}

impl<S, P, M> Clone for PortalState<S, P, M> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
            profile: Arc::clone(&self.profile),
            loans: Arc::clone(&self.loans),
            risk: Arc::clone(&self.risk),
            admin: Arc::clone(&self.admin),
            tokens: self.tokens.clone(),
            cookie_secure: self.cookie_secure,
        }
    }
}

impl<S, P, M> PortalState<S, P, M>
where
    S: PortalStore,
    P: RiskPredictor,
    M: Mailer,
{
    pub fn new(
        store: Arc<S>,
        predictor: Arc<P>,
        mailer: Arc<M>,
        config: &AuthConfig,
        environment: AppEnvironment,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = TokenIssuer::new(&config.jwt_secret, config.session_ttl);
        let settings = AuthSettings {
            environment,
            bcrypt_cost: config.bcrypt_cost,
        };

        Self {
            auth: Arc::new(AuthService::new(
                store.clone(),
                mailer,
                tokens.clone(),
                config.otp_ttl,
                clock.clone(),
                settings,
            )),
            profile: Arc::new(ProfileService::new(store.clone(), clock.clone())),
            loans: Arc::new(LoanService::new(
                store.clone(),
                predictor.clone(),
                clock.clone(),
            )),
            risk: Arc::new(RiskService::new(store.clone(), predictor, clock.clone())),
            admin: Arc::new(AdminService::new(store, clock)),
            tokens,
            cookie_secure: config.cookie_secure,
        }
    }
}

impl<S, P, M> FromRef<PortalState<S, P, M>> for TokenIssuer {
    fn from_ref(state: &PortalState<S, P, M>) -> Self {
        state.tokens.clone()
    }
}
