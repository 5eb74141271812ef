//! E-mail reminders for client companies

pub mod mailer;
pub mod reminders;

pub use mailer::{DryRunMailer, MailError, Mailer, OutgoingMail, SmtpMailer};
pub use reminders::{collect_reminders, send_reminders, CompanyReminder, SendOutcome};
