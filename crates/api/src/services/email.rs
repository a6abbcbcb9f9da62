//! Email service for verification and password reset messages.
//!
//! Uses SMTP via lettre for delivery with Askama plain-text templates. With
//! `EMAIL_BACKEND=memory`, messages are appended to a bounded in-memory
//! [`Outbox`] instead, which development setups and tests read back.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::{EmailConfig, EmailTransport};

/// Plain text template for the email verification message.
#[derive(Template)]
#[template(path = "email/verify_email.txt")]
struct VerifyEmailText<'a> {
    username: &'a str,
    link: &'a str,
    expires_in_hours: i64,
}

/// Plain text template for the password reset message.
#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    link: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A message captured by the [`Outbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Messages an [`Outbox`] keeps before dropping the oldest.
pub const OUTBOX_CAPACITY: usize = 1000;

/// In-memory sink for outgoing mail.
///
/// Holds at most `capacity` messages; pushing onto a full outbox drops the
/// oldest one.
#[derive(Debug, Clone)]
pub struct Outbox {
    messages: Arc<Mutex<VecDeque<OutgoingEmail>>>,
    capacity: usize,
}

impl Default for Outbox {
    fn default() -> Self {
        Self::with_capacity(OUTBOX_CAPACITY)
    }
}

impl Outbox {
    /// Create an empty outbox holding up to [`OUTBOX_CAPACITY`] messages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty outbox holding up to `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    /// All messages delivered so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<OutgoingEmail> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Messages delivered to one recipient, oldest first.
    #[must_use]
    pub fn messages_to(&self, to: &str) -> Vec<OutgoingEmail> {
        self.messages()
            .into_iter()
            .filter(|m| m.to == to)
            .collect()
    }

    fn push(&self, email: OutgoingEmail) {
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        if messages.len() >= self.capacity {
            messages.pop_front();
        }
        messages.push_back(email);
    }
}

#[derive(Clone)]
enum Mailer {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Outbox(Outbox),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Mailer,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be set up.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let smtp = match &config.transport {
            EmailTransport::Smtp(smtp) => smtp,
            EmailTransport::Memory => {
                tracing::warn!("EMAIL_BACKEND=memory, outgoing email is never delivered");
                return Ok(Self::with_outbox(&config.from_address, Outbox::new()));
            }
        };

        let credentials = Credentials::new(
            smtp.username.clone(),
            smtp.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
            .port(smtp.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer: Mailer::Smtp(mailer),
            from_address: config.from_address.clone(),
        })
    }

    /// Create an email service that delivers into `outbox`.
    #[must_use]
    pub fn with_outbox(from_address: &str, outbox: Outbox) -> Self {
        Self {
            mailer: Mailer::Outbox(outbox),
            from_address: from_address.to_owned(),
        }
    }

    /// Send the email verification link after registration or an unverified login.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_verification_email(
        &self,
        to: &str,
        username: &str,
        link: &str,
        expires_in_hours: i64,
    ) -> Result<(), EmailError> {
        let body = VerifyEmailText {
            username,
            link,
            expires_in_hours,
        }
        .render()?;

        self.send_text_email(to, "Verify your email", &body).await
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset_email(&self, to: &str, link: &str) -> Result<(), EmailError> {
        let body = PasswordResetText { link }.render()?;

        self.send_text_email(to, "Reset your password", &body).await
    }

    async fn send_text_email(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        match &self.mailer {
            Mailer::Smtp(transport) => {
                transport.send(email).await?;
            }
            Mailer::Outbox(outbox) => outbox.push(OutgoingEmail {
                to: to.to_owned(),
                subject: subject.to_owned(),
                body: body.to_owned(),
            }),
        }

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verification_email_lands_in_outbox() {
        let outbox = Outbox::new();
        let email = EmailService::with_outbox("no-reply@example.com", outbox.clone());

        email
            .send_verification_email(
                "alice@example.com",
                "alice",
                "http://localhost/verify-email?token=abc",
                24,
            )
            .await
            .unwrap();

        let sent = outbox.messages_to("alice@example.com");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Verify your email");
        assert!(sent[0].body.contains("Hi alice"));
        assert!(sent[0].body.contains("verify-email?token=abc"));
        assert!(sent[0].body.contains("24 hours"));
    }

    #[tokio::test]
    async fn test_outbox_drops_oldest_when_full() {
        let outbox = Outbox::with_capacity(2);
        let email = EmailService::with_outbox("no-reply@example.com", outbox.clone());

        for to in ["a@example.com", "b@example.com", "c@example.com"] {
            email
                .send_password_reset_email(to, "http://localhost/reset")
                .await
                .unwrap();
        }

        let recipients: Vec<String> = outbox.messages().into_iter().map(|m| m.to).collect();
        assert_eq!(recipients, ["b@example.com", "c@example.com"]);
    }

    #[test]
    fn test_memory_backend_uses_outbox() {
        let config = EmailConfig {
            from_address: "no-reply@example.com".to_owned(),
            transport: EmailTransport::Memory,
        };
        let email = EmailService::new(&config).unwrap();
        assert!(matches!(email.mailer, Mailer::Outbox(_)));
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected() {
        let outbox = Outbox::new();
        let email = EmailService::with_outbox("no-reply@example.com", outbox.clone());

        let err = email
            .send_password_reset_email("not an address", "http://localhost/reset")
            .await
            .unwrap_err();
        assert!(matches!(err, EmailError::InvalidAddress(_)));
        assert!(outbox.messages().is_empty());
    }
}
