// src/services/email.rs
// DOCUMENTATION: Transactional email
// PURPOSE: Render welcome / password-reset mails and deliver them over SMTP

use crate::config::Config;
use crate::errors::AppError;
use crate::models::User;
use askama::Template;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

#[derive(Template)]
#[template(path = "emails/welcome.html")]
struct WelcomeHtml<'a> {
    first_name: &'a str,
    url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/welcome.txt")]
struct WelcomeText<'a> {
    first_name: &'a str,
    url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/password_reset.html")]
struct PasswordResetHtml<'a> {
    first_name: &'a str,
    url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/password_reset.txt")]
struct PasswordResetText<'a> {
    first_name: &'a str,
    url: &'a str,
}

/// Outgoing mail
/// DOCUMENTATION: Without EMAIL_HOST the rendered text body is logged
/// instead of delivered, which is what development and tests rely on
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let from: Mailbox = config.email_from.parse().map_err(|e| {
            AppError::InternalError(format!("Invalid EMAIL_FROM '{}': {}", config.email_from, e))
        })?;

        if config.email_host.is_empty() {
            return Ok(Self {
                transport: None,
                from,
            });
        }

        let builder = if config.email_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.email_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.email_host)
        }
        .map_err(|e| AppError::InternalError(format!("Invalid SMTP relay: {}", e)))?
        .port(config.email_port);

        let builder = if config.email_username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                config.email_username.clone(),
                config.email_password.clone(),
            ))
        };

        log::info!(
            "SMTP transport configured for {}:{}",
            config.email_host,
            config.email_port
        );

        Ok(Self {
            transport: Some(builder.build()),
            from,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn send_welcome(&self, user: &User, url: &str) -> Result<(), AppError> {
        let first_name = user.first_name();
        let html = WelcomeHtml { first_name, url }.render()?;
        let text = WelcomeText { first_name, url }.render()?;
        self.send(user, "Welcome to the Natours family!", html, text)
            .await
    }

    pub async fn send_password_reset(&self, user: &User, url: &str) -> Result<(), AppError> {
        let first_name = user.first_name();
        let html = PasswordResetHtml { first_name, url }.render()?;
        let text = PasswordResetText { first_name, url }.render()?;
        self.send(
            user,
            "Your password reset token (valid for only 10 minutes)",
            html,
            text,
        )
        .await
    }

    async fn send(&self, to: &User, subject: &str, html: String, text: String) -> Result<(), AppError> {
        let Some(transport) = &self.transport else {
            log::info!("Mail to {} ({}):\n{}", to.email, subject, text);
            return Ok(());
        };

        let recipient: Mailbox = format!("{} <{}>", to.name, to.email)
            .parse()
            .map_err(|e| AppError::ServiceFailure(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text, html))
            .map_err(|e| AppError::InternalError(format!("Failed to build mail: {}", e)))?;

        transport.send(message).await.map_err(|e| {
            log::error!("SMTP delivery to {} failed: {}", to.email, e);
            AppError::ServiceFailure(
                "There was an error sending the email. Try again later!".to_string(),
            )
        })?;

        log::info!("Sent '{}' to {}", subject, to.email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::sample_user;
    use crate::models::Role;

    #[test]
    fn test_welcome_templates() {
        let html = WelcomeHtml {
            first_name: "Laura",
            url: "http://localhost:3000/me",
        }
        .render()
        .unwrap();
        assert!(html.contains("Hi Laura,"));
        assert!(html.contains("localhost:3000"));

        let text = WelcomeText {
            first_name: "Laura",
            url: "http://localhost:3000/me",
        }
        .render()
        .unwrap();
        assert!(text.contains("Welcome to Natours, Laura"));
    }

    #[test]
    fn test_reset_html_escapes_name() {
        let html = PasswordResetHtml {
            first_name: "<b>Eve</b>",
            url: "http://localhost:3000/reset",
        }
        .render()
        .unwrap();
        assert!(!html.contains("<b>Eve</b>"));
        assert!(html.contains("&lt;b&gt;Eve"));
    }

    #[tokio::test]
    async fn test_unconfigured_mailer_logs_only() {
        let mailer = Mailer::from_config(&Config::for_tests()).unwrap();
        assert!(!mailer.is_configured());

        let user = sample_user(Role::User);
        let sent = mailer.send_welcome(&user, "http://localhost:3000/me").await;
        tokio_test::assert_ok!(sent);
    }

    #[test]
    fn test_invalid_sender_is_rejected() {
        let mut config = Config::for_tests();
        config.email_from = "not an address".to_string();
        assert!(Mailer::from_config(&config).is_err());
    }
}
