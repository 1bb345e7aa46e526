//! The canonical message entity returned by the poller.

use crate::error::{Error, Result};
use crate::html;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message received by a disposable mailbox.
///
/// Built through [`Message::builder`], which enforces the body invariants:
/// a missing HTML body is filled from the text body, and an empty text body is
/// derived from the HTML body's visible text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Upstream-assigned identifier, never empty.
    pub id: String,
    /// Subject line.
    pub subject: String,
    /// Sender address as reported upstream.
    pub sender: String,
    /// Recipient address as reported upstream.
    pub recipient: String,
    /// When the message arrived.
    pub timestamp: DateTime<Utc>,
    /// Plain-text body.
    pub text_body: String,
    /// HTML body.
    pub html_body: Option<String>,
    /// Attachment references (URLs or names), in upstream order.
    pub attachments: Vec<String>,
}

impl Message {
    /// Starts building a message.
    #[must_use]
    pub fn builder(id: impl Into<String>, timestamp: DateTime<Utc>) -> MessageBuilder {
        MessageBuilder {
            id: id.into(),
            timestamp,
            subject: String::new(),
            sender: String::new(),
            recipient: String::new(),
            text_body: String::new(),
            html_body: None,
            attachments: Vec::new(),
        }
    }
}

/// Builder for [`Message`].
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    id: String,
    timestamp: DateTime<Utc>,
    subject: String,
    sender: String,
    recipient: String,
    text_body: String,
    html_body: Option<String>,
    attachments: Vec<String>,
}

impl MessageBuilder {
    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the sender.
    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    /// Sets the recipient.
    #[must_use]
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text_body = text.into();
        self
    }

    /// Sets the HTML body. Empty strings count as absent.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        let html = html.into();
        self.html_body = (!html.is_empty()).then_some(html);
        self
    }

    /// Appends an attachment reference.
    #[must_use]
    pub fn attachment(mut self, reference: impl Into<String>) -> Self {
        self.attachments.push(reference.into());
        self
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRecord`] if the id is empty.
    pub fn build(self) -> Result<Message> {
        if self.id.trim().is_empty() {
            return Err(Error::MalformedRecord {
                reason: "message id is empty".into(),
            });
        }

        let (text_body, html_body) = match self.html_body {
            None => (self.text_body.clone(), Some(self.text_body)),
            Some(html) if self.text_body.is_empty() => {
                let text = html::visible_text(&html).unwrap_or_else(|| html.clone());
                (text, Some(html))
            }
            Some(html) => (self.text_body, Some(html)),
        };

        Ok(Message {
            id: self.id,
            subject: self.subject,
            sender: self.sender,
            recipient: self.recipient,
            timestamp: self.timestamp,
            text_body,
            html_body,
            attachments: self.attachments,
        })
    }
}
