//! Internal module for normalizing upstream message records.
//!
//! Upstream records are loosely shaped JSON: optional fields, numeric or string
//! ids, inconsistent key casing (`body_text`, `bodyText`, `BodyText`). This module
//! turns them into [`Message`]s and never lets a single bad record abort a poll.

use crate::error::{Error, Result};
use crate::message::Message;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Result of normalizing one upstream record.
#[derive(Debug)]
pub(crate) enum RecordOutcome {
    /// The record became a message.
    Parsed(Box<Message>),
    /// The record has no id and is dropped.
    MissingId,
    /// The record could not be read (logged, processing continues).
    Malformed,
}

const ID_KEYS: &[&str] = &["id", "messageid", "mailid"];
const SUBJECT_KEYS: &[&str] = &["subject"];
const SENDER_KEYS: &[&str] = &["from", "sender"];
const RECIPIENT_KEYS: &[&str] = &["to", "recipient"];
const DATE_KEYS: &[&str] = &["date", "createdat", "receivedat", "timestamp"];
const TEXT_KEYS: &[&str] = &["bodytext", "text", "textbody", "body"];
const HTML_KEYS: &[&str] = &["bodyhtml", "html", "htmlbody"];
const ATTACHMENT_KEYS: &[&str] = &["attachments"];

/// Normalizes every record and keeps messages dated at or after `since`.
pub(crate) fn normalize_records(records: Vec<Value>, since: DateTime<Utc>) -> Vec<Message> {
    let total = records.len();
    let mut messages = Vec::with_capacity(total);

    for (index, record) in records.into_iter().enumerate() {
        match normalize_record(&record, Utc::now()) {
            RecordOutcome::Parsed(message) if message.timestamp >= since => {
                messages.push(*message);
            }
            RecordOutcome::Parsed(message) => {
                debug!(
                    id = %message.id,
                    timestamp = %message.timestamp,
                    "Message older than watermark, skipping"
                );
            }
            RecordOutcome::MissingId => {
                warn!(index, "Message without id, skipping");
            }
            RecordOutcome::Malformed => {
                // Logged in normalize_record
            }
        }
    }

    debug!(total, kept = messages.len(), since = %since, "Normalized message records");
    messages
}

/// Normalizes one record. `now` substitutes unparseable dates.
pub(crate) fn normalize_record(record: &Value, now: DateTime<Utc>) -> RecordOutcome {
    let Some(fields) = record.as_object() else {
        warn!(kind = value_kind(record), "Message record is not an object, skipping");
        return RecordOutcome::Malformed;
    };

    match build_message(fields, now) {
        Ok(Some(message)) => RecordOutcome::Parsed(Box::new(message)),
        Ok(None) => RecordOutcome::MissingId,
        Err(e) => {
            warn!(error = %e, "Failed to normalize message record, skipping");
            RecordOutcome::Malformed
        }
    }
}

fn build_message(fields: &Map<String, Value>, now: DateTime<Utc>) -> Result<Option<Message>> {
    let Some(id) = scalar(fields, ID_KEYS)?.filter(|id| !id.trim().is_empty()) else {
        return Ok(None);
    };

    let timestamp = match scalar(fields, DATE_KEYS)? {
        Some(raw) => parse_timestamp(&raw).unwrap_or_else(|| {
            warn!(id = %id, date = %raw, "Could not parse message date, using current time");
            now
        }),
        None => {
            warn!(id = %id, "Message has no date, using current time");
            now
        }
    };

    let mut builder = Message::builder(id, timestamp)
        .subject(scalar(fields, SUBJECT_KEYS)?.unwrap_or_default())
        .sender(scalar(fields, SENDER_KEYS)?.unwrap_or_default())
        .recipient(scalar(fields, RECIPIENT_KEYS)?.unwrap_or_default())
        .text_body(scalar(fields, TEXT_KEYS)?.unwrap_or_default());

    if let Some(html) = scalar(fields, HTML_KEYS)? {
        builder = builder.html_body(html);
    }

    for reference in attachments(fields)? {
        builder = builder.attachment(reference);
    }

    builder.build().map(Some)
}

/// Key comparison ignoring case, `_` and `-`.
fn canonical(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|wanted| {
        fields
            .iter()
            .find(|(key, value)| !value.is_null() && canonical(key) == *wanted)
            .map(|(_, value)| value)
    })
}

/// Reads a string-like field. Numbers and booleans are stringified; nested
/// values are malformed.
fn scalar(fields: &Map<String, Value>, keys: &[&str]) -> Result<Option<String>> {
    match lookup(fields, keys) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(Error::MalformedRecord {
            reason: format!("field '{}' is {}", keys[0], value_kind(other)),
        }),
    }
}

/// Attachments may be plain references or objects with `url`/`name`.
fn attachments(fields: &Map<String, Value>) -> Result<Vec<String>> {
    let Some(value) = lookup(fields, ATTACHMENT_KEYS) else {
        return Ok(Vec::new());
    };
    let Some(items) = value.as_array() else {
        return Err(Error::MalformedRecord {
            reason: format!("attachments is {}", value_kind(value)),
        });
    };

    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => scalar(obj, &["url", "downloadurl", "name", "filename"])
                .ok()
                .flatten(),
            _ => None,
        })
        .collect())
}

/// Parses an ISO-8601 timestamp. `Z`/offset forms are converted to UTC; naive
/// forms are taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:30:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_full_record() {
        let record = json!({
            "id": 42,
            "subject": "Welcome",
            "from": "noreply@service.io",
            "to": "box@tempmail.dev",
            "date": "2024-05-01T10:30:00Z",
            "body_text": "Your code is 123456",
            "body_html": "<p>Your code is 123456</p>",
            "attachments": ["https://files.io/a.pdf", {"name": "b.png"}, 7]
        });

        let RecordOutcome::Parsed(message) = normalize_record(&record, now()) else {
            panic!("expected a message");
        };
        assert_eq!(message.id, "42");
        assert_eq!(message.sender, "noreply@service.io");
        assert_eq!(message.recipient, "box@tempmail.dev");
        assert_eq!(message.text_body, "Your code is 123456");
        assert_eq!(message.attachments, vec!["https://files.io/a.pdf", "b.png"]);
    }

    #[test]
    fn test_inconsistent_casing() {
        let record = json!({
            "ID": "abc",
            "Subject": "Hi",
            "sender": "a@b.io",
            "createdAt": "2024-05-01T11:00:00Z",
            "bodyHtml": "<b>Hello</b>"
        });

        let RecordOutcome::Parsed(message) = normalize_record(&record, now()) else {
            panic!("expected a message");
        };
        assert_eq!(message.id, "abc");
        assert_eq!(message.subject, "Hi");
        assert_eq!(message.sender, "a@b.io");
        assert_eq!(message.text_body, "Hello");
        assert_eq!(message.html_body.as_deref(), Some("<b>Hello</b>"));
    }

    #[test]
    fn test_missing_or_empty_id() {
        assert!(matches!(
            normalize_record(&json!({"id": "", "subject": "x"}), now()),
            RecordOutcome::MissingId
        ));
        assert!(matches!(
            normalize_record(&json!({"subject": "x"}), now()),
            RecordOutcome::MissingId
        ));
        assert!(matches!(
            normalize_record(&json!({"id": null}), now()),
            RecordOutcome::MissingId
        ));
    }

    #[test]
    fn test_bad_date_uses_now() {
        let record = json!({"id": "1", "date": "not a date"});
        let RecordOutcome::Parsed(message) = normalize_record(&record, now()) else {
            panic!("expected a message");
        };
        assert_eq!(message.timestamp, now());
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(
            normalize_record(&json!("just a string"), now()),
            RecordOutcome::Malformed
        ));
        assert!(matches!(
            normalize_record(&json!({"id": "1", "subject": {"nested": true}}), now()),
            RecordOutcome::Malformed
        ));
    }

    #[test]
    fn test_normalize_records_filters_and_skips() {
        let since = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let records = vec![
            json!({"id": "", "date": "2024-05-01T10:00:00Z"}),
            json!({"id": "old", "date": "2024-05-01T08:59:59Z"}),
            json!(17),
            json!({"id": "edge", "date": "2024-05-01T09:00:00Z"}),
            json!({"id": "new", "date": "2024-05-01T10:00:00Z"}),
        ];

        let ids: Vec<String> = normalize_records(records, since)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["edge", "new"]);
    }
}
