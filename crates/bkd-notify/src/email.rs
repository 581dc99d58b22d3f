//! Email delivery collaborator.
//!
//! The recipient address is validated before any delivery attempt. Two
//! implementations: [`SmtpMailer`] (lettre, production) and
//! [`ConsoleMailer`] (logs and records the transcript — tests and dev mode).

use async_trait::async_trait;
use bkd_schemas::{NotificationKind, Reservation};
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::document::display_date;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The recipient address failed format validation; nothing was sent.
    InvalidRecipient(String),
    /// The transport refused or failed the delivery.
    Transport(String),
}

impl std::fmt::Display for EmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailError::InvalidRecipient(addr) => {
                write!(f, "invalid recipient address: {addr:?}")
            }
            EmailError::Transport(msg) => write!(f, "email transport failure: {msg}"),
        }
    }
}

impl std::error::Error for EmailError {}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<EmailAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub accepted: bool,
    pub transport: &'static str,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, mail: OutboundEmail) -> Result<DeliveryReceipt, EmailError>;
}

/// Minimal recipient format check: one `@`, non-empty local part, domain
/// with at least one dot, no whitespace.
pub fn is_valid_email(addr: &str) -> bool {
    let addr = addr.trim();
    if addr.is_empty() || addr.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = addr.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

// ---------------------------------------------------------------------------
// Notification templates
// ---------------------------------------------------------------------------

/// Subject and body for a reservation notification.
pub fn notification_content(kind: NotificationKind, r: &Reservation) -> (String, String) {
    let guest = match (&r.client_name, &r.client_lastname) {
        (Some(first), Some(last)) => format!("{first} {last}"),
        (Some(first), None) => first.clone(),
        _ => "Guest".to_string(),
    };
    let stay = match (r.check_in, r.check_out) {
        (Some(ci), Some(co)) => format!("{} to {}", display_date(ci), display_date(co)),
        (Some(ci), None) => format!("from {}", display_date(ci)),
        _ => "dates to be confirmed".to_string(),
    };

    match kind {
        NotificationKind::Confirmation => (
            "Your reservation is confirmed".to_string(),
            format!(
                "Dear {guest},\n\nYour reservation ({stay}) has been received.\n\
                 Total amount: {}\n\nThank you for booking with us.",
                r.total_amount
                    .map(|t| format!("${t}"))
                    .unwrap_or_else(|| "to be confirmed".to_string()),
            ),
        ),
        NotificationKind::StatusChange => (
            format!("Reservation update: {}", r.status.as_str()),
            format!(
                "Dear {guest},\n\nYour reservation ({stay}) is now marked as \
                 \"{}\".",
                r.status.as_str(),
            ),
        ),
        NotificationKind::PaymentReceived => (
            "Payment received".to_string(),
            format!(
                "Dear {guest},\n\nWe received your payment. Paid to date: ${}.\n\
                 Outstanding balance: {}.",
                r.amount_paid,
                r.amount_due
                    .map(|d| format!("${d}"))
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
        ),
        NotificationKind::MonthlySummary => (
            "Monthly reservation summary".to_string(),
            "The monthly summary is attached.".to_string(),
        ),
    }
}

// ---------------------------------------------------------------------------
// SMTP transport
// ---------------------------------------------------------------------------

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        from_address: &str,
        credentials: Option<(String, String)>,
    ) -> Result<Self, EmailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| EmailError::Transport(e.to_string()))?
            .port(port);
        if let Some((user, pass)) = credentials {
            builder = builder.credentials(Credentials::new(user, pass));
        }
        let from = from_address
            .parse::<Mailbox>()
            .map_err(|_| EmailError::InvalidRecipient(from_address.to_string()))?;
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, mail: &OutboundEmail) -> Result<Message, EmailError> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .map_err(|_| EmailError::InvalidRecipient(mail.to.clone()))?;
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone());

        let built = match &mail.attachment {
            Some(att) => {
                let content_type = att
                    .content_type
                    .parse::<ContentType>()
                    .unwrap_or(ContentType::TEXT_PLAIN);
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(mail.body.clone()))
                        .singlepart(
                            Attachment::new(att.filename.clone())
                                .body(att.bytes.clone(), content_type),
                        ),
                )
            }
            None => builder.body(mail.body.clone()),
        };
        built.map_err(|e| EmailError::Transport(e.to_string()))
    }
}

#[async_trait]
impl EmailSender for SmtpMailer {
    async fn send(&self, mail: OutboundEmail) -> Result<DeliveryReceipt, EmailError> {
        if !is_valid_email(&mail.to) {
            return Err(EmailError::InvalidRecipient(mail.to));
        }
        let message = self.build_message(&mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        info!(to = %mail.to, subject = %mail.subject, "email delivered via smtp");
        Ok(DeliveryReceipt {
            accepted: true,
            transport: "smtp",
        })
    }
}

// ---------------------------------------------------------------------------
// Console transport (tests / dev)
// ---------------------------------------------------------------------------

/// Logs outbound mail instead of delivering it, and records the transcript
/// so scenario tests can assert on what would have been sent.
#[derive(Default)]
pub struct ConsoleMailer {
    sent: std::sync::Mutex<Vec<OutboundEmail>>,
}

impl ConsoleMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transcript of accepted messages, in send order.
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("console mailer poisoned").clone()
    }
}

#[async_trait]
impl EmailSender for ConsoleMailer {
    async fn send(&self, mail: OutboundEmail) -> Result<DeliveryReceipt, EmailError> {
        if !is_valid_email(&mail.to) {
            return Err(EmailError::InvalidRecipient(mail.to));
        }
        info!(
            to = %mail.to,
            subject = %mail.subject,
            attachment = mail.attachment.as_ref().map(|a| a.filename.as_str()),
            "email (console transport, not delivered)"
        );
        self.sent.lock().expect("console mailer poisoned").push(mail);
        Ok(DeliveryReceipt {
            accepted: true,
            transport: "console",
        })
    }
}
