//! OTP-verified signup, password login, password reset, and session extraction.

pub mod extract;
pub mod otp;
pub mod password;
pub mod service;
pub mod token;

pub use extract::{session_token, AdminUser, AuthUser, SESSION_COOKIE};
pub use otp::{OtpError, OtpPurpose, OtpStore, MAX_OTP_ATTEMPTS};
pub use password::{hash_password, verify_password, PasswordError};
pub use service::{
    AuthError, AuthService, AuthSettings, EmailRequest, LoginRequest, LoginSession, OtpDispatch,
    RegisterRequest, ResetPasswordRequest,
};
pub use token::{Claims, TokenError, TokenIssuer};
