use std::future::Future;

use chrono::Duration;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;

use super::auth::OtpPurpose;

/// Plain-text message handed to a [`Mailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    pub fn otp(to: &str, code: &str, purpose: OtpPurpose, ttl: Duration) -> Self {
        let minutes = ttl.num_minutes().max(1);
        let (subject, body) = match purpose {
            OtpPurpose::Signup => (
                "Your signup OTP",
                format!("Your signup OTP is {code}. It expires in {minutes} minutes."),
            ),
            OtpPurpose::PasswordReset => (
                "Your password reset OTP",
                format!("Your password reset OTP is {code}. It expires in {minutes} minutes."),
            ),
        };
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            body,
        }
    }

    pub fn success(to: &str, purpose: OtpPurpose) -> Self {
        let (subject, body) = match purpose {
            OtpPurpose::Signup => (
                "Registration Successful",
                "Your account was created successfully. Welcome to the loan portal.",
            ),
            OtpPurpose::PasswordReset => (
                "Password Reset Successful",
                "Your password has been reset successfully. If this was not you, contact support immediately.",
            ),
        };
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }
}

/// Outbound mail hook (SMTP in production, recording fakes in tests).
pub trait Mailer: Send + Sync + 'static {
    fn send(&self, message: MailMessage) -> impl Future<Output = Result<(), MailError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail configuration is missing (MAIL_HOST, MAIL_USER, MAIL_PASS)")]
    NotConfigured,
    #[error("Mail authentication failed. Check MAIL_USER / MAIL_PASS app password.")]
    Authentication,
    #[error("invalid mailbox address '{0}'")]
    Address(String),
    #[error("{0}")]
    Transport(String),
}

/// SMTP relay mailer. Built without a transport when the relay settings are incomplete,
/// in which case every send reports [`MailError::NotConfigured`].
pub struct SmtpMailer {
    relay: Option<Relay>,
}

struct Relay {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn unconfigured() -> Self {
        Self { relay: None }
    }

    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        let (Some(host), Some(user), Some(password)) =
            (&config.host, &config.user, &config.password)
        else {
            return Ok(Self::unconfigured());
        };

        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|err| MailError::Transport(err.to_string()))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(user.clone(), password.clone()))
            .build();
        let from = user
            .parse::<Mailbox>()
            .map_err(|_| MailError::Address(user.clone()))?;

        Ok(Self {
            relay: Some(Relay { transport, from }),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.relay.is_some()
    }
}

impl Mailer for SmtpMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let relay = self.relay.as_ref().ok_or(MailError::NotConfigured)?;
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|_| MailError::Address(message.to.clone()))?;

        let email = Message::builder()
            .from(relay.from.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|err| MailError::Transport(err.to_string()))?;

        relay
            .transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(classify_smtp_error)
    }
}

fn classify_smtp_error(err: lettre::transport::smtp::Error) -> MailError {
    // 535: authentication credentials invalid
    let rejected_credentials = err
        .status()
        .map(|code| code.to_string() == "535")
        .unwrap_or(false);
    if rejected_credentials {
        MailError::Authentication
    } else {
        MailError::Transport(err.to_string())
    }
}
