// SMTP notifier for the notify-cross job
use anyhow::Context;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::application::alerts::Notifier;
use crate::infrastructure::config::Settings;

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let host = settings
            .smtp_host
            .as_deref()
            .context("smtp_host is not configured")?;
        let login = settings
            .mail_login
            .clone()
            .context("mail_login is not configured")?;
        let password = settings
            .mail_password
            .clone()
            .context("mail_password is not configured")?;
        let from = settings
            .mail_from
            .as_deref()
            .context("mail_from is not configured")?
            .parse::<Mailbox>()
            .context("mail_from is not a valid address")?;
        let to = settings
            .mail_to
            .as_deref()
            .context("mail_to is not configured")?
            .parse::<Mailbox>()
            .context("mail_to is not a valid address")?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
            .credentials(Credentials::new(login, password))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .body(body.to_string())?;
        self.transport
            .send(email)
            .await
            .context("sending notification mail")?;
        tracing::info!("notification sent: {}", subject);
        Ok(())
    }
}
