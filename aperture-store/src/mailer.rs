use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

use crate::app_config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("invalid from address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Outbound confirmation-mail client. Delivery is best-effort: the caller
/// gets a boolean outcome and the preceding store write stands either way.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailerError> {
        let from = config.from_address.parse::<Mailbox>()?;

        let mut builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    pub async fn send(&self, to: &str, subject: &str, html_body: String) -> bool {
        let recipient = match to.parse::<Mailbox>() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                error!("Invalid recipient address {}: {}", to, e);
                return false;
            }
        };

        let email = match Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body)
        {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to build email for {}: {}", to, e);
                return false;
            }
        };

        match self.transport.send(email).await {
            Ok(_) => {
                info!("Confirmation email sent to {}", to);
                true
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", to, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::SmtpConfig;

    #[test]
    fn test_mailer_builds_from_default_config() {
        assert!(Mailer::new(&SmtpConfig::default()).is_ok());
    }

    #[test]
    fn test_mailer_rejects_bad_from_address() {
        let config = SmtpConfig {
            from_address: "not-an-address".to_string(),
            ..SmtpConfig::default()
        };
        assert!(Mailer::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_send_reports_failure_without_panicking() {
        // Port 1 has no listener; delivery must come back as a plain `false`.
        let config = SmtpConfig {
            port: 1,
            ..SmtpConfig::default()
        };
        let mailer = Mailer::new(&config).unwrap();
        assert!(!mailer.send("client@example.com", "Hello", "<p>Hi</p>".to_string()).await);
    }

    #[tokio::test]
    async fn test_send_rejects_invalid_recipient() {
        let mailer = Mailer::new(&SmtpConfig::default()).unwrap();
        assert!(!mailer.send("not-an-address", "Hello", "<p>Hi</p>".to_string()).await);
    }
}
