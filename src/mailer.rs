use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::config::MailConfig;

/// Outbound mail. Callers dispatch fire-and-forget; failures are logged by
/// the calling context and never surface to the HTTP response.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation(
        &self,
        to_email: &str,
        username: &str,
        base_url: &str,
        token: &str,
    ) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_confirmation(
        &self,
        to_email: &str,
        username: &str,
        base_url: &str,
        token: &str,
    ) -> anyhow::Result<()> {
        let link = format!("{}/api/auth/confirmed_email/{}", base_url, token);
        let body = format!(
            "Hi {username},\n\n\
             Please confirm your email address by opening the link below:\n\n\
             {link}\n\n\
             If you did not sign up, ignore this message.\n"
        );
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(to_email.parse()?)
            .subject("Confirm your email")
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;
        self.transport.send(email).await?;
        debug!(to = %to_email, "confirmation email sent");
        Ok(())
    }
}
