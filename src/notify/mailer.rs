//! Outgoing mail

use console::style;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::SmtpSettings;

/// A plain-text message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error, Diagnostic)]
pub enum MailError {
    #[error("invalid address '{address}': {reason}")]
    #[diagnostic(code(nr13::mail::address))]
    Address { address: String, reason: String },

    #[error("could not build message: {0}")]
    #[diagnostic(code(nr13::mail::message))]
    Message(String),

    #[error("SMTP error: {0}")]
    #[diagnostic(
        code(nr13::mail::smtp),
        help("Check SMTP_HOST, SMTP_PORT, SMTP_USERNAME and SMTP_PASSWORD")
    )]
    Transport(String),
}

/// Something that can deliver a message
pub trait Mailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse::<Mailbox>().map_err(|e| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Sends through an SMTP relay
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let builder = if settings.starttls {
            SmtpTransport::starttls_relay(&settings.host)
                .map_err(|e| MailError::Transport(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&settings.host)
        };
        let mut builder = builder.port(settings.port);
        if let Some((user, pass)) = &settings.credentials {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        debug!(host = %settings.host, port = settings.port, starttls = settings.starttls, "SMTP transport configured");
        Ok(Self {
            transport: builder.build(),
            from: mailbox(&settings.from)?,
        })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mailbox(&mail.to)?)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| MailError::Message(e.to_string()))?;

        self.transport
            .send(&message)
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!(to = %mail.to, subject = %mail.subject, "mail sent");
        Ok(())
    }
}

/// Prints messages to stdout instead of sending them
///
/// With `echo` off nothing is printed, so stdout stays free for
/// structured output.
pub struct DryRunMailer {
    pub echo: bool,
}

impl Mailer for DryRunMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        // still reject addresses the relay would refuse
        mailbox(&mail.to)?;
        if !self.echo {
            return Ok(());
        }
        println!("{} {}", style("To:").bold(), mail.to);
        println!("{} {}", style("Subject:").bold(), mail.subject);
        println!();
        println!("{}", mail.body);
        println!("{}", style("─".repeat(60)).dim());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_parsing() {
        assert!(mailbox("NR-13 <nr13@example.com>").is_ok());
        assert!(matches!(
            mailbox("not an address"),
            Err(MailError::Address { .. })
        ));
    }

    #[test]
    fn test_dry_run_rejects_bad_recipient() {
        let mail = OutgoingMail {
            to: "nobody".into(),
            subject: "x".into(),
            body: "y".into(),
        };
        assert!(DryRunMailer { echo: false }.send(&mail).is_err());
    }
}
