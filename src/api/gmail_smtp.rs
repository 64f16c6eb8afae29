use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::api::order_sink::{OrderSink, SinkError};
use crate::config::app_config::GmailConfig;
use crate::models::order_models::{as_text, OrderRecord};

/// Mails every order to the shop's own inbox.
pub struct GmailNotifier {
    mailbox: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl GmailNotifier {
    pub fn new(config: &GmailConfig) -> Result<Self, SinkError> {
        let mailbox: Mailbox = config.user.parse()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .build();

        Ok(Self { mailbox, transport })
    }
}

/// Sender and recipient are the same mailbox.
pub fn build_notification(mailbox: &Mailbox, order: &OrderRecord) -> Result<Message, SinkError> {
    let message = Message::builder()
        .from(mailbox.clone())
        .to(mailbox.clone())
        .subject(order.email_subject())
        .header(ContentType::TEXT_HTML)
        .body(order.email_html())?;
    Ok(message)
}

#[async_trait]
impl OrderSink for GmailNotifier {
    async fn deliver(&self, order: &OrderRecord) -> Result<(), SinkError> {
        let message = build_notification(&self.mailbox, order)?;
        self.transport.send(message).await?;
        tracing::info!("Order email sent for {}", as_text(&order.submission.name));
        Ok(())
    }
}
