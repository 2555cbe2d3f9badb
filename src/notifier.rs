use crate::target::{format_timestamp, Target, TargetStatus, Transition};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use lettre::address::AddressError;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

const DOWN_MESSAGE: &str = "Your immediate attention is required. Please check the server.";
const UP_MESSAGE: &str = "Server has recovered and is now working normally.";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("invalid email address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddressError,
    },
    #[error("failed to build email: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("failed to send notification: {0}")]
    SendFailed(String),
}

/// A fully rendered message, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: EmailSender + ?Sized> EmailSender for std::sync::Arc<T> {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        (**self).send(email).await
    }
}

/// Sends through an authenticated SMTP relay (Gmail unless overridden).
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailSender {
    pub fn new(host: &str, username: &str, password: &str) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&email.from)?)
            .subject(email.subject.as_str());
        for recipient in &email.to {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        let message =
            builder.multipart(MultiPart::alternative_plain_html(email.text.clone(), email.html.clone()))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|source| NotifyError::InvalidAddress {
        address: address.to_string(),
        source,
    })
}

/// Records every email instead of sending it. Optionally fails every send.
pub struct MockEmailSender {
    sent: Mutex<Vec<Email>>,
    failure: Option<String>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    /// Emails accepted so far, in send order. Failed sends are not recorded.
    pub fn sent(&self) -> Vec<Email> {
        lock(&self.sent).clone()
    }
}

impl Default for MockEmailSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        if let Some(message) = &self.failure {
            return Err(NotifyError::SendFailed(message.clone()));
        }
        lock(&self.sent).push(email.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Content of one status-change alert.
#[derive(Debug, Clone)]
pub struct Alert {
    pub name: String,
    pub url: String,
    pub status: TargetStatus,
    pub error_detail: Option<String>,
    pub at: DateTime<Local>,
}

impl Alert {
    pub fn new(target: &Target, transition: &Transition, at: DateTime<Local>) -> Self {
        Self {
            name: target.name.clone(),
            url: target.url.clone(),
            status: transition.status(),
            error_detail: transition.error().map(ToString::to_string),
            at,
        }
    }

    fn is_down(&self) -> bool {
        self.status == TargetStatus::Down
    }

    fn message(&self) -> &'static str {
        if self.is_down() {
            DOWN_MESSAGE
        } else {
            UP_MESSAGE
        }
    }

    pub fn subject(&self) -> String {
        let icon = if self.is_down() { "🚨" } else { "✅" };
        format!("{icon} {} Status Alert", self.name)
    }

    pub fn text_body(&self) -> String {
        let mut lines = vec![
            "ALERT: Server Status Change".to_string(),
            String::new(),
            format!("Server Name: {}", self.name),
            format!("Status: {}", self.status),
            format!("Time: {}", format_timestamp(&self.at)),
            format!("URL: {}", self.url),
        ];
        // The details line stays as an empty line when there is nothing to report.
        lines.push(match &self.error_detail {
            Some(detail) => format!("Error Details: {detail}"),
            None => String::new(),
        });
        lines.push(String::new());
        lines.push(self.message().to_string());
        lines.join("\n")
    }

    pub fn html_body(&self) -> String {
        let (status_color, status_icon, box_background, box_color) = if self.is_down() {
            ("#ff4444", "❌", "#fff3cd", "#856404")
        } else {
            ("#00C851", "✅", "#d4edda", "#155724")
        };
        let name = escape_html(&self.name);
        let url = escape_html(&self.url);
        let status = self.status;
        let timestamp = format_timestamp(&self.at);
        let message = self.message();

        let error_row = match &self.error_detail {
            Some(detail) => format!(
                r#"
            <tr>
              <td style="padding: 10px; border-bottom: 1px solid #eee;"><strong>Error Details:</strong></td>
              <td style="padding: 10px; border-bottom: 1px solid #eee; color: #ff4444;">{}</td>
            </tr>"#,
                escape_html(detail)
            ),
            None => String::new(),
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Server Status Alert</title>
</head>
<body style="margin: 0; padding: 0; font-family: Arial, sans-serif; background-color: #f4f4f4;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <div style="background-color: #2c3e50; color: white; padding: 20px; border-radius: 10px 10px 0 0; text-align: center;">
      <h1 style="margin: 0; font-size: 24px;">Server Status Alert</h1>
      <p style="margin: 10px 0 0 0;">{timestamp}</p>
    </div>
    <div style="background-color: white; padding: 20px; border-radius: 0 0 10px 10px; box-shadow: 0 2px 5px rgba(0,0,0,0.1);">
      <div style="background-color: {status_color}; color: white; padding: 15px; border-radius: 5px; margin-bottom: 20px; text-align: center;">
        <h2 style="margin: 0; font-size: 20px;">{status_icon} {name} is {status}</h2>
      </div>
      <table style="width: 100%; border-collapse: collapse; margin-bottom: 20px;">
        <tr>
          <td style="padding: 10px; border-bottom: 1px solid #eee; width: 120px;"><strong>Server URL:</strong></td>
          <td style="padding: 10px; border-bottom: 1px solid #eee;"><a href="{url}" style="color: #3498db;">{url}</a></td>
        </tr>
        <tr>
          <td style="padding: 10px; border-bottom: 1px solid #eee;"><strong>Status:</strong></td>
          <td style="padding: 10px; border-bottom: 1px solid #eee; color: {status_color};">{status}</td>
        </tr>{error_row}
      </table>
      <div style="background-color: {box_background}; color: {box_color}; padding: 15px; border-radius: 5px; margin-bottom: 20px;">
        <p style="margin: 0;">{message}</p>
      </div>
    </div>
    <div style="text-align: center; margin-top: 20px; color: #666; font-size: 12px;">
      <p>This is an automated message from your Server Monitoring System</p>
    </div>
  </div>
</body>
</html>
"#
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub struct Notifier {
    sender: Box<dyn EmailSender>,
    from: String,
    recipients: Vec<String>,
}

impl Notifier {
    pub fn new(sender: Box<dyn EmailSender>, from: String, recipients: Vec<String>) -> Self {
        Self {
            sender,
            from,
            recipients,
        }
    }

    pub fn render(&self, alert: &Alert) -> Email {
        Email {
            from: self.from.clone(),
            to: self.recipients.clone(),
            subject: alert.subject(),
            html: alert.html_body(),
            text: alert.text_body(),
        }
    }

    /// Sends one alert. The caller decides what a failure means; nothing
    /// here retries.
    pub async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let email = self.render(alert);
        self.sender.send(&email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::ProbeError;
    use std::sync::Arc;

    fn down_alert() -> Alert {
        let target = Target::new("DMS Server", "https://dms.example.com");
        let transition = Transition::WentDown {
            error: ProbeError::UnexpectedStatus(502),
        };
        Alert::new(&target, &transition, Local::now())
    }

    fn up_alert() -> Alert {
        let target = Target::new("DMS Server", "https://dms.example.com");
        Alert::new(&target, &Transition::Recovered, Local::now())
    }

    #[test]
    fn test_subject_encodes_status_and_name() {
        assert_eq!(down_alert().subject(), "🚨 DMS Server Status Alert");
        assert_eq!(up_alert().subject(), "✅ DMS Server Status Alert");
    }

    #[test]
    fn test_down_text_body_contains_details() {
        let alert = down_alert();
        let text = alert.text_body();

        assert!(text.starts_with("ALERT: Server Status Change"));
        assert!(text.contains("Server Name: DMS Server"));
        assert!(text.contains("Status: DOWN"));
        assert!(text.contains(&format!("Time: {}", format_timestamp(&alert.at))));
        assert!(text.contains("URL: https://dms.example.com"));
        assert!(text.ends_with(&format!(
            "URL: https://dms.example.com\nError Details: Server returned status 502\n\n{DOWN_MESSAGE}"
        )));
    }

    #[test]
    fn test_recovery_wording_differs_and_omits_error() {
        let text = up_alert().text_body();

        assert!(text.contains("Status: UP"));
        assert!(!text.contains("Error Details"));
        assert!(text.ends_with(&format!("URL: https://dms.example.com\n\n\n{UP_MESSAGE}")));

        let html = up_alert().html_body();
        assert!(html.contains("#00C851"));
        assert!(!html.contains("Error Details"));
        assert!(html.contains("DMS Server is UP"));
    }

    #[test]
    fn test_html_body_escapes_interpolated_text() {
        let target = Target::new("<script>", "https://example.com/?a=1&b=2");
        let transition = Transition::WentDown {
            error: ProbeError::Transport("bad \"header\"".to_string()),
        };
        let html = Alert::new(&target, &transition, Local::now()).html_body();

        assert!(html.contains("&lt;script&gt; is DOWN"));
        assert!(html.contains("https://example.com/?a=1&amp;b=2"));
        assert!(html.contains("bad &quot;header&quot;"));
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn test_notify_sends_to_all_recipients() {
        let sender = Arc::new(MockEmailSender::new());
        let notifier = Notifier::new(
            Box::new(sender.clone()),
            "monitor@example.com".to_string(),
            vec!["ops@example.com".to_string(), "dev@example.com".to_string()],
        );

        notifier.notify(&down_alert()).await.unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "monitor@example.com");
        assert_eq!(sent[0].to.len(), 2);
        assert_eq!(sent[0].subject, "🚨 DMS Server Status Alert");
    }

    #[tokio::test]
    async fn test_notify_surfaces_send_failure() {
        let notifier = Notifier::new(
            Box::new(MockEmailSender::failing("smtp unavailable")),
            "monitor@example.com".to_string(),
            vec!["ops@example.com".to_string()],
        );

        let err = notifier.notify(&up_alert()).await.unwrap_err();
        assert!(matches!(err, NotifyError::SendFailed(_)));
    }

    #[tokio::test]
    async fn test_smtp_sender_rejects_invalid_address() {
        let sender = SmtpEmailSender::new("localhost", "user", "password").unwrap();
        let email = Email {
            from: "not an address".to_string(),
            to: vec!["ops@example.com".to_string()],
            subject: "s".to_string(),
            html: "<p>h</p>".to_string(),
            text: "t".to_string(),
        };

        let err = sender.send(&email).await.unwrap_err();
        assert!(matches!(err, NotifyError::InvalidAddress { .. }));
    }
}
