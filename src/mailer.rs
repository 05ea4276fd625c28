//! Outgoing email
//!
//! Delivery sits behind the `Mailer` trait. `OutboxMailer` writes each message
//! as an RFC 5322 `.eml` file into a directory, where a relay or a human can
//! pick it up.

use crate::error::{AzcostError, Result};
use crate::validation::is_valid_email;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Reject messages without a usable sender or with blank/invalid recipients.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_email(&self.from) {
            return Err(AzcostError::validation(
                "from",
                format!("sender email is missing or invalid: '{}'", self.from),
            ));
        }
        if self.to.is_empty() {
            return Err(AzcostError::validation("to", "no recipients"));
        }
        if let Some(bad) = self.to.iter().find(|addr| !is_valid_email(addr)) {
            return Err(AzcostError::validation(
                "to",
                format!("recipient email is missing or invalid: '{}'", bad),
            ));
        }
        if self.subject.trim().is_empty() {
            return Err(AzcostError::validation("subject", "is required"));
        }
        Ok(())
    }

    /// Render as an RFC 5322 plain-text message.
    pub fn to_rfc5322(&self) -> String {
        let to: Vec<String> = self.to.iter().map(|addr| single_line(addr)).collect();
        let mut out = String::new();
        out.push_str(&format!("From: {}\r\n", single_line(&self.from)));
        out.push_str(&format!("To: {}\r\n", to.join(", ")));
        out.push_str(&format!("Subject: {}\r\n", encode_header(&self.subject)));
        out.push_str(&format!("Date: {}\r\n", Utc::now().to_rfc2822()));
        out.push_str(&format!("Message-ID: <{}@azcostctl>\r\n", uuid::Uuid::new_v4()));
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        out.push_str("Content-Transfer-Encoding: 8bit\r\n");
        out.push_str("\r\n");
        for line in self.body.lines() {
            out.push_str(line);
            out.push_str("\r\n");
        }
        out
    }
}

/// Header text on one line; control characters (CR, LF, tab) become spaces.
fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

// 45 input bytes keep each encoded word under the 75 character limit
const ENCODED_WORD_INPUT: usize = 45;

/// RFC 2047 `B` encoding for non-ASCII header text, folded one word per line.
fn encode_header(value: &str) -> String {
    let value = single_line(value);
    if value.is_ascii() {
        return value;
    }
    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_INPUT {
            words.push(std::mem::take(&mut chunk));
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(chunk);
    }
    words
        .iter()
        .map(|w| format!("=?utf-8?B?{}?=", STANDARD.encode(w)))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Writes messages to `{dir}/{timestamp}-{uuid}.eml`.
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        message.validate()?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let file = self.dir.join(format!(
            "{}-{}.eml",
            Utc::now().format("%Y%m%dT%H%M%S"),
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::write(&file, message.to_rfc5322())
            .await
            .map_err(|e| AzcostError::Mail(format!("failed to write {}: {}", file.display(), e)))?;
        info!("Email to {} queued at {}", message.to.join(", "), file.display());
        Ok(())
    }
}

pub const UNUSED_RESOURCES_SUBJECT: &str = "Request to Remove Unused Resources from Azure Account";

/// Body of the notice asking an owner to clean up resources nobody uses.
pub fn render_unused_resources_notice(
    receiver_name: &str,
    sender_name: &str,
    resources: &[String],
) -> String {
    let listing = resources
        .iter()
        .map(|r| format!("  - {}", r))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Dear {receiver},\n\
         \n\
         Azure resources keep costing money until they are deleted, so we regularly review \
         the subscription for resources that are no longer needed.\n\
         \n\
         The following resources assigned to you have outlived their TTL tag or show no use:\n\
         {listing}\n\
         \n\
         Please review them and delete any you no longer need. If one should be kept, update \
         its TTL tag or reply to this message.\n\
         \n\
         Thank you for helping keep our Azure costs under control.\n\
         \n\
         Best regards,\n\
         {sender}\n",
        receiver = receiver_name,
        listing = listing,
        sender = sender_name,
    )
}
