use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::portal::domain::normalize_email;

/// Wrong guesses tolerated per issued code before it is revoked.
pub const MAX_OTP_ATTEMPTS: u32 = 5;

/// Why a one-time password was issued. Codes for one purpose never satisfy another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtpPurpose {
    Signup,
    PasswordReset,
}

impl OtpPurpose {
    pub const fn label(self) -> &'static str {
        match self {
            OtpPurpose::Signup => "signup",
            OtpPurpose::PasswordReset => "reset-password",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("OTP not requested")]
    NotRequested,
    #[error("OTP expired")]
    Expired,
    #[error("Invalid OTP")]
    Invalid,
    #[error("Too many invalid OTP attempts. Request a new OTP")]
    TooManyAttempts,
}

#[derive(Debug, Clone)]
struct OtpEntry {
    code: String,
    expires_at: DateTime<Utc>,
    failed_attempts: u32,
}

/// Single-use, time-bounded verification codes keyed by purpose and email.
#[derive(Debug)]
pub struct OtpStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, OtpEntry>>,
}

impl OtpStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh six digit code, replacing any outstanding one for the same key.
    pub fn issue(&self, email: &str, purpose: OtpPurpose, now: DateTime<Utc>) -> String {
        let code = rand::thread_rng().gen_range(100_000..=999_999).to_string();
        self.insert(email, purpose, code.clone(), now);
        code
    }

    pub(crate) fn insert(&self, email: &str, purpose: OtpPurpose, code: String, now: DateTime<Utc>) {
        let mut entries = self.entries();
        entries.retain(|_, entry| now <= entry.expires_at);
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        entries.insert(
            key(email, purpose),
            OtpEntry {
                code,
                expires_at,
                failed_attempts: 0,
            },
        );
    }

    /// Check a submitted code. A match consumes the entry and an expired entry is dropped.
    /// A wrong code leaves the entry in place until [`MAX_OTP_ATTEMPTS`] misses revoke it.
    pub fn verify(
        &self,
        email: &str,
        purpose: OtpPurpose,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        let key = key(email, purpose);
        let mut entries = self.entries();

        let entry = entries.get_mut(&key).ok_or(OtpError::NotRequested)?;
        if now > entry.expires_at {
            entries.remove(&key);
            return Err(OtpError::Expired);
        }
        if entry.code != code.trim() {
            entry.failed_attempts += 1;
            if entry.failed_attempts >= MAX_OTP_ATTEMPTS {
                entries.remove(&key);
                return Err(OtpError::TooManyAttempts);
            }
            return Err(OtpError::Invalid);
        }

        entries.remove(&key);
        Ok(())
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.expires_at);
        before - entries.len()
    }

    pub fn outstanding(&self) -> usize {
        self.entries().len()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, OtpEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn key(email: &str, purpose: OtpPurpose) -> String {
    format!("{}:{}", purpose.label(), normalize_email(email))
}
