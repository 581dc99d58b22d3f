//! bkd-notify
//!
//! External side-effect collaborators: email delivery and document
//! rendering. Both sit behind traits so the daemon can run with the SMTP
//! transport in production and the recording console mailer in tests — a
//! notification failure is reported, never allowed to roll back committed
//! reservation state.

mod document;
mod email;

pub use document::{display_date, Document, DocumentRenderer, MonthRef, TextRenderer};
pub use email::{
    is_valid_email, notification_content, ConsoleMailer, DeliveryReceipt, EmailAttachment,
    EmailError, EmailSender, OutboundEmail, SmtpMailer,
};
