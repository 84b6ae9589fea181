use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::AppEnvironment;
use crate::portal::clock::Clock;
use crate::portal::domain::{normalize_email, Role, User, UserId};
use crate::portal::mail::{MailError, MailMessage, Mailer};
use crate::portal::repository::{RepositoryError, UserRepository};

use super::otp::{OtpError, OtpPurpose, OtpStore};
use super::password::{hash_password, verify_password, PasswordError};
use super::token::{TokenError, TokenIssuer};

/// Accepts strings or bare numbers (OTP codes are sometimes posted as numbers).
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(value)) => value,
        Some(Value::Number(value)) => value.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub otp: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub otp: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: String,
}

/// Result of an OTP request. `dev_otp` is only populated outside production when
/// mail delivery failed, so local setups without SMTP can still finish the flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpDispatch {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_otp: Option<String>,
}

/// Signed session plus the account it belongs to.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub environment: AppEnvironment,
    pub bcrypt_cost: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email is required")]
    EmailRequired,
    #[error("All fields required")]
    MissingFields,
    #[error("User already exists")]
    UserExists,
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Otp(#[from] OtpError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Signup verification, login, and password reset over a user repository and mailer.
pub struct AuthService<S, M> {
    store: Arc<S>,
    mailer: Arc<M>,
    otps: OtpStore,
    tokens: TokenIssuer,
    clock: Arc<dyn Clock>,
    settings: AuthSettings,
}

impl<S, M> AuthService<S, M>
where
    S: UserRepository,
    M: Mailer,
{
    pub fn new(
        store: Arc<S>,
        mailer: Arc<M>,
        tokens: TokenIssuer,
        otp_ttl: Duration,
        clock: Arc<dyn Clock>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            otps: OtpStore::new(otp_ttl),
            tokens,
            clock,
            settings,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn settings(&self) -> AuthSettings {
        self.settings
    }

    pub fn otps(&self) -> &OtpStore {
        &self.otps
    }

    pub async fn send_signup_otp(&self, request: EmailRequest) -> Result<OtpDispatch, AuthError> {
        let email = normalize_email(&request.email);
        if email.is_empty() {
            return Err(AuthError::EmailRequired);
        }
        if self.store.user_by_email(&email)?.is_some() {
            return Err(AuthError::UserExists);
        }

        let code = self.otps.issue(&email, OtpPurpose::Signup, self.clock.now());
        self.dispatch_otp(&email, code, OtpPurpose::Signup).await
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<User, AuthError> {
        let name = request.name.trim().to_string();
        let email = normalize_email(&request.email);
        if name.is_empty()
            || email.is_empty()
            || request.password.is_empty()
            || request.otp.trim().is_empty()
        {
            return Err(AuthError::MissingFields);
        }
        if self.store.user_by_email(&email)?.is_some() {
            return Err(AuthError::UserExists);
        }

        self.otps
            .verify(&email, OtpPurpose::Signup, &request.otp, self.clock.now())?;

        let password_hash = hash_password(request.password, self.settings.bcrypt_cost).await?;
        let now = self.clock.now();
        let user = User {
            id: UserId::generate(),
            name,
            email,
            password_hash,
            role: Role::User,
            created_at: now,
            updated_at: now,
        };
        let user = self.store.insert_user(user).map_err(|err| match err {
            RepositoryError::Conflict => AuthError::UserExists,
            other => AuthError::Repository(other),
        })?;

        info!(user_id = %user.id, "account registered");
        self.notify_success(&user.email, OtpPurpose::Signup).await;
        Ok(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginSession, AuthError> {
        let email = normalize_email(&request.email);
        let user = self
            .store
            .user_by_email(&email)?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(request.password, user.password_hash.clone()).await? {
            warn!(user_id = %user.id, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(&user, self.clock.now())?;
        info!(user_id = %user.id, role = user.role.label(), "login succeeded");
        Ok(LoginSession { token, user })
    }

    pub async fn send_password_reset_otp(
        &self,
        request: EmailRequest,
    ) -> Result<OtpDispatch, AuthError> {
        let email = normalize_email(&request.email);
        if self.store.user_by_email(&email)?.is_none() {
            return Err(AuthError::UserNotFound);
        }

        let code = self
            .otps
            .issue(&email, OtpPurpose::PasswordReset, self.clock.now());
        self.dispatch_otp(&email, code, OtpPurpose::PasswordReset)
            .await
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AuthError> {
        let email = normalize_email(&request.email);
        let mut user = self
            .store
            .user_by_email(&email)?
            .ok_or(AuthError::UserNotFound)?;
        if request.otp.trim().is_empty() || request.password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        self.otps.verify(
            &email,
            OtpPurpose::PasswordReset,
            &request.otp,
            self.clock.now(),
        )?;

        user.password_hash = hash_password(request.password, self.settings.bcrypt_cost).await?;
        user.updated_at = self.clock.now();
        self.store.update_user(user)?;

        info!("password reset completed");
        self.notify_success(&email, OtpPurpose::PasswordReset).await;
        Ok(())
    }

    /// Create the configured administrator, or promote the existing account with that email.
    pub async fn ensure_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        if let Some(mut existing) = self.store.user_by_email(&email)? {
            if existing.role != Role::Admin {
                existing.role = Role::Admin;
                existing.updated_at = self.clock.now();
                self.store.update_user(existing.clone())?;
                info!(user_id = %existing.id, "promoted existing account to admin");
            }
            return Ok(existing);
        }

        let password_hash = hash_password(password.to_string(), self.settings.bcrypt_cost).await?;
        let now = self.clock.now();
        let admin = self.store.insert_user(User {
            id: UserId::generate(),
            name: name.trim().to_string(),
            email,
            password_hash,
            role: Role::Admin,
            created_at: now,
            updated_at: now,
        })?;
        info!(user_id = %admin.id, "seeded admin account");
        Ok(admin)
    }

    async fn dispatch_otp(
        &self,
        email: &str,
        code: String,
        purpose: OtpPurpose,
    ) -> Result<OtpDispatch, AuthError> {
        let message = MailMessage::otp(email, &code, purpose, self.otps.ttl());
        match self.mailer.send(message).await {
            Ok(()) => Ok(OtpDispatch {
                message: match purpose {
                    OtpPurpose::Signup => "Signup OTP sent",
                    OtpPurpose::PasswordReset => "Password reset OTP sent",
                },
                dev_otp: None,
            }),
            Err(err) if self.settings.environment.is_production() => {
                error!(purpose = purpose.label(), error = %err, "otp delivery failed");
                Err(AuthError::Mail(err))
            }
            Err(err) => {
                warn!(purpose = purpose.label(), error = %err, "otp delivery failed, returning code inline");
                Ok(OtpDispatch {
                    message: match purpose {
                        OtpPurpose::Signup => "OTP generated. Mail delivery failed in local mode.",
                        OtpPurpose::PasswordReset => {
                            "Reset OTP generated. Mail delivery failed in local mode."
                        }
                    },
                    dev_otp: Some(code),
                })
            }
        }
    }

    async fn notify_success(&self, email: &str, purpose: OtpPurpose) {
        if let Err(err) = self.mailer.send(MailMessage::success(email, purpose)).await {
            warn!(purpose = purpose.label(), error = %err, "confirmation mail failed");
        }
    }
}
