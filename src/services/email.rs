// src/services/email.rs

use async_trait::async_trait;
use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tracing::{error, info};

use crate::{
    config::Config,
    models::{Bulletin, DeliveryOptions, Money},
};

/// Outcome of a failed send. Transient failures are worth retrying.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MailError {
    #[error("transient mail failure: {0}")]
    Transient(String),

    #[error("permanent mail failure: {0}")]
    Permanent(String),
}

impl MailError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, MailError::Permanent(_))
    }
}

/// A bulletin email ready to hand to a transport.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to_name: String,
    pub to_address: String,
    pub cc: Option<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Builds the email for `bulletin` with its rendered `document` attached.
/// `hr_fallback` is copied when HR is requested and the company has no
/// mailbox of its own.
pub fn compose_bulletin_mail(
    bulletin: &Bulletin,
    document: Vec<u8>,
    options: &DeliveryOptions,
    hr_fallback: Option<&str>,
) -> OutgoingMail {
    let employee_name = bulletin.employee.full_name();
    let cc = options
        .cc_hr
        .then(|| bulletin.company.hr_email.as_deref().or(hr_fallback))
        .flatten()
        .map(str::to_string);

    OutgoingMail {
        to_address: bulletin.employee.email.clone(),
        cc,
        subject: format!(
            "Bulletin de paie {} - {}",
            bulletin.period, bulletin.company.name
        ),
        text_body: build_bulletin_text(&employee_name, bulletin, &options.message),
        html_body: build_bulletin_html(&employee_name, bulletin, &options.message),
        to_name: employee_name,
        attachment_name: bulletin.document_name(),
        attachment: document,
    }
}

// ─── SMTP transport ───────────────────────────────────────────────────────────

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &Config) -> Result<Self, MailError> {
        let creds = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| MailError::Permanent(e.to_string()))?
            .credentials(creds)
            .port(config.smtp_port)
            .build();

        let from = mailbox(&config.email_from_name, &config.email_from_address)?;
        Ok(Self { transport, from })
    }
}

fn mailbox(name: &str, address: &str) -> Result<Mailbox, MailError> {
    let address: Address = address
        .parse()
        .map_err(|e: lettre::address::AddressError| {
            MailError::Permanent(format!("invalid address {address}: {e}"))
        })?;
    Ok(Mailbox::new(Some(name.to_string()), address))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let pdf = ContentType::parse("application/pdf")
            .map_err(|e| MailError::Permanent(e.to_string()))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(mailbox(&mail.to_name, &mail.to_address)?)
            .subject(mail.subject.clone());
        if let Some(cc) = &mail.cc {
            builder = builder.cc(mailbox("RH", cc)?);
        }

        let email = builder
            .multipart(
                MultiPart::mixed()
                    .multipart(
                        MultiPart::alternative()
                            .singlepart(
                                SinglePart::builder()
                                    .header(ContentType::TEXT_PLAIN)
                                    .body(mail.text_body.clone()),
                            )
                            .singlepart(
                                SinglePart::builder()
                                    .header(ContentType::TEXT_HTML)
                                    .body(mail.html_body.clone()),
                            ),
                    )
                    .singlepart(
                        Attachment::new(mail.attachment_name.clone())
                            .body(mail.attachment.clone(), pdf),
                    ),
            )
            .map_err(|e| MailError::Permanent(e.to_string()))?;

        match self.transport.send(email).await {
            Ok(_) => {
                info!("Bulletin email sent to {}", mail.to_address);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send bulletin email to {}: {}", mail.to_address, e);
                if e.is_permanent() {
                    Err(MailError::Permanent(e.to_string()))
                } else {
                    Err(MailError::Transient(e.to_string()))
                }
            }
        }
    }
}

// ─── Bodies ───────────────────────────────────────────────────────────────────

fn format_amount(amount: Money) -> String {
    format!("{amount} MAD")
}

fn build_bulletin_html(employee_name: &str, bulletin: &Bulletin, message: &str) -> String {
    let c = &bulletin.contributions;
    let note = if message.trim().is_empty() {
        String::new()
    } else {
        format!("<p>{}</p>", escape_html(message))
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
  <meta charset="UTF-8" />
  <style>
    body {{ font-family: Arial, sans-serif; background: #f4f4f4; color: #333; }}
    .container {{ max-width: 600px; margin: 30px auto; background: #fff; border-radius: 8px; overflow: hidden; }}
    .header {{ background: #0f5132; color: #fff; padding: 24px 32px; }}
    .header h1 {{ margin: 0; font-size: 22px; }}
    .body {{ padding: 24px 32px; }}
    table {{ width: 100%; border-collapse: collapse; margin-bottom: 16px; }}
    td {{ padding: 8px 4px; border-bottom: 1px solid #f1f1f1; }}
    td:last-child {{ text-align: right; font-weight: 600; }}
    .total-row td {{ font-size: 16px; color: #0f5132; border-top: 2px solid #0f5132; border-bottom: none; }}
    .footer {{ background: #f9fafb; padding: 16px 32px; font-size: 12px; color: #6b7280; text-align: center; }}
  </style>
</head>
<body>
<div class="container">
  <div class="header">
    <h1>{company}</h1>
    <p>Bulletin de paie {period}</p>
  </div>
  <div class="body">
    <p>Bonjour <strong>{employee_name}</strong>,</p>
    <p>Veuillez trouver ci-joint votre bulletin de paie pour la période <strong>{period}</strong>.</p>
    {note}
    <table>
      <tr><td>Salaire brut</td><td>{gross}</td></tr>
      <tr><td>CNSS</td><td>- {cnss}</td></tr>
      <tr><td>AMO</td><td>- {amo}</td></tr>
      <tr><td>IR</td><td>- {ir}</td></tr>
      <tr class="total-row"><td>Net à payer</td><td>{net}</td></tr>
    </table>
  </div>
  <div class="footer">
    <p>Message automatique du service paie de {company}. Merci de ne pas y répondre.</p>
  </div>
</div>
</body>
</html>"#,
        company = escape_html(&bulletin.company.name),
        period = bulletin.period,
        employee_name = escape_html(employee_name),
        note = note,
        gross = format_amount(bulletin.gross_total),
        cnss = format_amount(c.cnss_employee),
        amo = format_amount(c.amo_employee),
        ir = format_amount(c.income_tax),
        net = format_amount(bulletin.net_total),
    )
}

fn build_bulletin_text(employee_name: &str, bulletin: &Bulletin, message: &str) -> String {
    let c = &bulletin.contributions;
    let note = if message.trim().is_empty() {
        String::new()
    } else {
        format!("{}\n\n", message.trim())
    };
    format!(
        "Bonjour {employee_name},\n\n\
        Veuillez trouver ci-joint votre bulletin de paie pour la période {period}.\n\n\
        {note}\
        Salaire brut:  {gross}\n\
        CNSS:          - {cnss}\n\
        AMO:           - {amo}\n\
        IR:            - {ir}\n\
        Net à payer:   {net}\n\n\
        Message automatique du service paie de {company}.",
        employee_name = employee_name,
        period = bulletin.period,
        note = note,
        gross = format_amount(bulletin.gross_total),
        cnss = format_amount(c.cnss_employee),
        amo = format_amount(c.amo_employee),
        ir = format_amount(c.income_tax),
        net = format_amount(bulletin.net_total),
        company = bulletin.company.name,
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures;

    #[test]
    fn mail_carries_document_and_totals() {
        let bulletin = fixtures::bulletin(&[]);
        let mail = compose_bulletin_mail(
            &bulletin,
            b"%PDF".to_vec(),
            &DeliveryOptions::default(),
            None,
        );
        assert_eq!(mail.to_address, "employee1@example.ma");
        assert_eq!(mail.attachment_name, bulletin.document_name());
        assert_eq!(mail.attachment, b"%PDF");
        assert_eq!(mail.subject, "Bulletin de paie 2025-01 - Atlas Conseil SARL");
        assert!(mail.text_body.contains("Net à payer:   5579.37 MAD"));
        assert!(mail.cc.is_none());
    }

    #[test]
    fn hr_copy_prefers_company_mailbox() {
        let mut bulletin = fixtures::bulletin(&[]);
        let options = DeliveryOptions {
            cc_hr: true,
            message: "Prime versée séparément.".into(),
        };

        let mail = compose_bulletin_mail(&bulletin, Vec::new(), &options, Some("paie@groupe.ma"));
        assert_eq!(mail.cc.as_deref(), Some("rh@atlas-conseil.ma"));
        assert!(mail.text_body.contains("Prime versée séparément."));

        bulletin.company.hr_email = None;
        let mail = compose_bulletin_mail(&bulletin, Vec::new(), &options, Some("paie@groupe.ma"));
        assert_eq!(mail.cc.as_deref(), Some("paie@groupe.ma"));
    }

    #[test]
    fn html_escapes_free_text() {
        let bulletin = fixtures::bulletin(&[]);
        let options = DeliveryOptions {
            cc_hr: false,
            message: "<b>urgent</b>".into(),
        };
        let mail = compose_bulletin_mail(&bulletin, Vec::new(), &options, None);
        assert!(mail.html_body.contains("&lt;b&gt;urgent&lt;/b&gt;"));
    }
}
