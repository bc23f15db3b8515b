//! Email notification
//!
//! After the chart team finishes, the `EmailNotification` step mails the
//! thread's document with the rendered chart attached. Delivery goes through
//! a [`Notifier`]: [`MailApiNotifier`] posts to an HTTP mail relay and
//! [`LogNotifier`] only records and logs the message.

use crate::config::EmailConfig;
use crate::error::{CohortError, Result};
use crate::store::OutputStore;
use crate::tools::chart::data_url_payload;
use async_trait::async_trait;
use cohort_core::{GraphError, Node, RunContext};
use parking_lot::Mutex;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    /// Base64-encoded bytes
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `email`, returning the relay's receipt
    async fn send(&self, email: &Email) -> Result<String>;
}

/// Posts the email as JSON to a mail relay API
pub struct MailApiNotifier {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl MailApiNotifier {
    pub fn new(client: Client, endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Notifier for MailApiNotifier {
    async fn send(&self, email: &Email) -> Result<String> {
        let mut request = self.client.post(&self.endpoint).json(email);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CohortError::Notification(format!(
                "mail relay returned {}: {}",
                status, body
            )));
        }
        Ok(format!("Email sent successfully: {}", body.trim()))
    }
}

/// Logs instead of sending; keeps every email for inspection
#[derive(Default)]
pub struct LogNotifier {
    sent: Mutex<Vec<Email>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &Email) -> Result<String> {
        info!(
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "Email (log only)"
        );
        self.sent.lock().push(email.clone());
        Ok("Email logged".to_string())
    }
}

/// Relay when an endpoint is configured, log-only otherwise
pub fn notifier_from_config(client: Client, config: &EmailConfig) -> Arc<dyn Notifier> {
    match config.endpoint.as_deref().filter(|e| !e.is_empty()) {
        Some(endpoint) => Arc::new(MailApiNotifier::new(
            client,
            endpoint,
            config.api_key.clone(),
        )),
        None => Arc::new(LogNotifier::new()),
    }
}

/// Convert every line break style to `<br>`
pub fn line_breaks_to_br(content: &str) -> String {
    static BREAKS: OnceLock<Regex> = OnceLock::new();
    BREAKS
        .get_or_init(|| Regex::new(r"\r\n|\r|\n").expect("valid regex"))
        .replace_all(content, "<br>")
        .into_owned()
}

/// Graph step that mails the thread's document and chart.
///
/// Without a thread id, or before both document and chart exist, the step
/// is a no-op. Delivery failures abort the run.
pub struct EmailNotificationNode {
    store: Arc<dyn OutputStore>,
    notifier: Arc<dyn Notifier>,
    email: EmailConfig,
}

impl EmailNotificationNode {
    pub fn new(store: Arc<dyn OutputStore>, notifier: Arc<dyn Notifier>, email: EmailConfig) -> Self {
        Self {
            store,
            notifier,
            email,
        }
    }

    async fn notify(&self, thread_id: &str) -> Result<Option<String>> {
        let Some(record) = self.store.read(thread_id).await? else {
            warn!(thread_id, "No output record, so no email will be sent");
            return Ok(None);
        };
        let Some(payload) = record.chart.as_deref().and_then(data_url_payload) else {
            warn!(thread_id, "Chart has not been created, so no email will be sent");
            return Ok(None);
        };

        let email = Email {
            from: self.email.from.clone().unwrap_or_default(),
            to: self.email.to.clone().unwrap_or_default(),
            subject: self.email.subject_line().to_string(),
            html: line_breaks_to_br(&record.content),
            attachments: vec![Attachment {
                filename: "chart.svg".to_string(),
                content_type: "image/svg+xml".to_string(),
                content: payload.to_string(),
            }],
        };
        let receipt = self.notifier.send(&email).await?;
        info!(thread_id, %receipt, "Notification delivered");
        Ok(Some(receipt))
    }
}

#[async_trait]
impl Node for EmailNotificationNode {
    async fn invoke(&self, _state: Value, ctx: &RunContext) -> cohort_core::Result<Value> {
        match ctx.thread_id() {
            Some(thread_id) => {
                self.notify(thread_id).await.map_err(GraphError::from)?;
            }
            None => info!("No thread id; skipping email notification"),
        }
        Ok(json!({}))
    }
}
