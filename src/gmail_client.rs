use anyhow::{Context, Result};
use async_trait::async_trait;
use google_gmail1::api::{BatchModifyMessagesRequest, Scope};
use google_gmail1::Gmail;
use log::{debug, info, warn};
use mail_parser::{Message, MessageParser, PartType};

use crate::auth::{self, HttpsConnector};
use crate::config::GmailConfig;
use crate::email::RawMessage;
use crate::sync::MessageSource;

const USER_ID: &str = "me";
const UNREAD_LABEL: &str = "UNREAD";
const INBOX_LABEL: &str = "INBOX";

// Gmail rejects batchModify calls with more ids than this
const BATCH_MODIFY_MAX_IDS: usize = 1000;

pub struct GmailClient {
    hub: Gmail<HttpsConnector>,
}

impl GmailClient {
    pub async fn new(config: &GmailConfig) -> Result<Self> {
        info!("Connecting to Gmail API via OAuth2");

        let auth = auth::authenticator(&config.credentials_path, &config.token_cache_path, "Gmail")
            .await?;
        let hub = Gmail::new(auth::https_client()?, auth);

        info!("✅ Gmail API connection established successfully");

        Ok(Self::from_hub(hub))
    }

    pub fn from_hub(hub: Gmail<HttpsConnector>) -> Self {
        GmailClient { hub }
    }

    /// Ids of unread inbox messages, first result page only
    async fn list_unread_ids(&self) -> Result<Vec<String>> {
        info!("Searching for unread emails in {}", INBOX_LABEL);

        let result = self
            .hub
            .users()
            .messages_list(USER_ID)
            .add_label_ids(INBOX_LABEL)
            .add_label_ids(UNREAD_LABEL)
            .add_scope(Scope::Modify)
            .doit()
            .await
            .context("Error listing unread emails")?;

        let message_ids: Vec<String> = result
            .1
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| msg.id)
            .collect();

        info!("Found {} unread email(s)", message_ids.len());

        Ok(message_ids)
    }
}

#[async_trait]
impl MessageSource for GmailClient {
    async fn list_unread(&self) -> Result<Vec<RawMessage>> {
        let ids = self.list_unread_ids().await?;

        let mut messages = Vec::with_capacity(ids.len());
        for id in &ids {
            messages.push(self.fetch(id).await?);
        }

        Ok(messages)
    }

    async fn fetch(&self, id: &str) -> Result<RawMessage> {
        debug!("Complete email retrieval for ID: {}", id);

        let (_, message) = self
            .hub
            .users()
            .messages_get(USER_ID, id)
            .format("raw")
            .add_scope(Scope::Modify)
            .doit()
            .await
            .with_context(|| format!("Unable to retrieve email {}", id))?;

        // Already decoded by the client library (RFC 822 bytes, not base64)
        let raw_bytes = message
            .raw
            .with_context(|| format!("No raw content in email {}", id))?;

        debug!("Email {} retrieved, size: {} bytes", id, raw_bytes.len());

        parse_raw_message(id, &raw_bytes)
    }

    async fn mark_read(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        for chunk in ids.chunks(BATCH_MODIFY_MAX_IDS) {
            let request = BatchModifyMessagesRequest {
                ids: Some(chunk.to_vec()),
                remove_label_ids: Some(vec![UNREAD_LABEL.to_string()]),
                ..Default::default()
            };

            self.hub
                .users()
                .messages_batch_modify(request, USER_ID)
                .add_scope(Scope::Modify)
                .doit()
                .await
                .context("Unable to mark emails as read")?;
        }

        info!("✅ {} email(s) marked as read", ids.len());
        Ok(())
    }

    fn source_name(&self) -> &str {
        "Gmail"
    }
}

/// Decode an RFC 822 message into the fields the sync needs.
///
/// Body is the first text/plain part, else the first HTML part as-is.
/// A missing Date header leaves `date_raw` empty.
pub fn parse_raw_message(id: &str, raw: &[u8]) -> Result<RawMessage> {
    let parsed = MessageParser::default()
        .parse(raw)
        .with_context(|| format!("Unable to parse email {}", id))?;

    let headers = String::from_utf8_lossy(raw);

    let sender_raw = parsed
        .from()
        .and_then(|addrs| addrs.first())
        .and_then(|addr| match (&addr.name, &addr.address) {
            (Some(name), Some(email)) => Some(format!("{} <{}>", name, email)),
            (None, Some(email)) => Some(email.to_string()),
            _ => None,
        })
        .or_else(|| raw_header(&headers, "From"))
        .unwrap_or_default();

    let date_raw = raw_header(&headers, "Date").unwrap_or_else(|| {
        warn!("Email {} has no Date header", id);
        String::new()
    });

    Ok(RawMessage {
        id: id.to_string(),
        sender_raw,
        subject_raw: parsed.subject().map(str::to_string),
        date_raw,
        body_raw: extract_body(&parsed),
    })
}

fn extract_body(message: &Message<'_>) -> String {
    let plain = message
        .text_body
        .iter()
        .filter_map(|&idx| message.parts.get(idx))
        .find_map(|part| match &part.body {
            PartType::Text(text) => Some(text.as_ref()),
            _ => None,
        });

    if let Some(text) = plain {
        return text.to_string();
    }

    message
        .html_body
        .iter()
        .filter_map(|&idx| message.parts.get(idx))
        .find_map(|part| match &part.body {
            PartType::Html(html) => Some(html.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Value of a top-level header, folded lines joined
fn raw_header(message: &str, name: &str) -> Option<String> {
    let mut value: Option<String> = None;

    for line in message.lines() {
        if line.is_empty() {
            // end of the header block
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(current) = value.as_mut() {
                current.push(' ');
                current.push_str(line.trim());
            }
            continue;
        }

        if value.is_some() {
            break;
        }

        if let Some((header, rest)) = line.split_once(':') {
            if header.trim().eq_ignore_ascii_case(name) {
                value = Some(rest.trim().to_string());
            }
        }
    }

    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = "From: Jane Doe <jane@example.com>\r\n\
Subject: Quarterly numbers\r\n\
Date: Tue, 13 Jan 2026 14:55:10\r\n +0530\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Plain version\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<div>HTML version</div>\r\n\
--b1--\r\n";

    #[test]
    fn test_raw_header_unfolds() {
        assert_eq!(
            raw_header(MULTIPART, "date").as_deref(),
            Some("Tue, 13 Jan 2026 14:55:10 +0530")
        );
        assert_eq!(raw_header(MULTIPART, "X-Missing"), None);
    }

    #[test]
    fn test_raw_header_ignores_body() {
        let raw = "Subject: hi\r\n\r\nDate: not a header\r\n";
        assert_eq!(raw_header(raw, "Date"), None);
    }

    #[test]
    fn test_prefers_plain_part() {
        let message = parse_raw_message("m1", MULTIPART.as_bytes()).unwrap();
        assert_eq!(message.id, "m1");
        assert_eq!(message.sender_raw, "Jane Doe <jane@example.com>");
        assert_eq!(message.subject_raw.as_deref(), Some("Quarterly numbers"));
        assert_eq!(message.date_raw, "Tue, 13 Jan 2026 14:55:10 +0530");
        assert!(message.body_raw.contains("Plain version"));
        assert!(!message.body_raw.contains("HTML version"));
    }

    #[test]
    fn test_html_only_body_kept_as_is() {
        let raw = "From: news@example.com\r\n\
Date: Tue, 13 Jan 2026 14:55:10 +0000\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><p>Weekly digest</p></body></html>\r\n";

        let message = parse_raw_message("m2", raw.as_bytes()).unwrap();
        assert_eq!(message.sender_raw, "news@example.com");
        assert_eq!(message.subject_raw, None);
        assert!(message.body_raw.contains("<p>Weekly digest</p>"));
    }
}
