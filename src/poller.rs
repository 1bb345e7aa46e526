//! Message polling.
//!
//! [`MessagePoller`] lists a mailbox's messages since a watermark, normalizing the
//! provider's loosely shaped records into [`Message`]s. Polling never fails: when
//! the primary provider is exhausted the poller switches to the fallback and stays
//! there (a sticky, per-poller flag) until a health check sees the primary answer
//! again. If the fallback fails too the poll yields no messages.
//!
//! # Example
//!
//! ```no_run
//! use tempmail_sync::{CodeExtractor, MessagePoller, ServiceConfig};
//!
//! # async fn example() -> tempmail_sync::Result<()> {
//! let config = ServiceConfig::builder().build()?;
//! let poller = MessagePoller::new(&config)?;
//!
//! for message in poller.get_messages("box@tempmail.dev", None).await {
//!     println!("{}: {}", message.sender, message.subject);
//! }
//!
//! let code = poller
//!     .wait_for_code("box@tempmail.dev", &CodeExtractor::new())
//!     .await?;
//! println!("Got code: {code}");
//! # Ok(())
//! # }
//! ```

use crate::config::{PollingConfig, ServiceConfig};
use crate::error::{Error, Result};
use crate::extractor::CodeExtractor;
use crate::failover::Failover;
use crate::message::Message;
use crate::parser;
use crate::provider::{self, HealthStatus, MailProvider};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, instrument};

/// Lists and watches mailbox messages.
pub struct MessagePoller {
    failover: Failover,
    polling: PollingConfig,
    extractor: CodeExtractor,
}

impl MessagePoller {
    /// Creates a poller for the providers described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built (e.g. invalid proxy).
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let (primary, secondary) = provider::from_config(config)?;
        Ok(Self::with_providers(config, primary, secondary))
    }

    /// Creates a poller with explicit providers.
    #[must_use]
    pub fn with_providers(
        config: &ServiceConfig,
        primary: Arc<dyn MailProvider>,
        secondary: Arc<dyn MailProvider>,
    ) -> Self {
        Self {
            failover: Failover::new(primary, secondary, config.retry.clone())
                .sticky()
                .with_deadline(config.request_deadline),
            polling: config.polling.clone(),
            extractor: CodeExtractor::new(),
        }
    }

    /// Replaces the extractor used by [`get_verification_codes`](Self::get_verification_codes).
    #[must_use]
    pub fn with_extractor(mut self, extractor: CodeExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Returns messages dated at or after `since` (default: now minus the
    /// configured lookback), in upstream order.
    ///
    /// Records without an id are dropped; malformed records are skipped. When
    /// every provider fails the result is empty.
    #[instrument(
        name = "MessagePoller::get_messages",
        skip(self),
        fields(fallback = self.failover.is_on_secondary())
    )]
    pub async fn get_messages(&self, email: &str, since: Option<DateTime<Utc>>) -> Vec<Message> {
        let since = since.unwrap_or_else(|| self.default_since());

        match self
            .failover
            .run("get_messages", |p| async move { p.list_messages(email).await })
            .await
        {
            Ok(records) => parser::normalize_records(records, since),
            Err(e) => {
                error!(error = %e, category = %e.category(), "Failed to read messages");
                Vec::new()
            }
        }
    }

    /// Returns the message with the given id, regardless of its age.
    pub async fn get_message(&self, email: &str, id: &str) -> Option<Message> {
        self.get_messages(email, Some(DateTime::<Utc>::MIN_UTC))
            .await
            .into_iter()
            .find(|m| m.id == id)
    }

    /// Returns one verification code per recent message that carries one, in
    /// upstream order. Repeated codes are kept.
    pub async fn get_verification_codes(&self, email: &str) -> Vec<String> {
        self.get_messages(email, None)
            .await
            .iter()
            .filter_map(|message| self.extractor.extract_from_message(message).code)
            .collect()
    }

    /// Polls until a recent message yields a verification code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WaitTimeout`] if nothing is found within the configured
    /// maximum wait.
    #[instrument(name = "MessagePoller::wait_for_code", skip(self, extractor))]
    pub async fn wait_for_code(&self, email: &str, extractor: &CodeExtractor) -> Result<String> {
        self.wait_for(email, |m| extractor.extract_from_message(m).code)
            .await
    }

    /// Polls until a recent message yields a verification link.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WaitTimeout`] if nothing is found within the configured
    /// maximum wait.
    #[instrument(name = "MessagePoller::wait_for_link", skip(self, extractor))]
    pub async fn wait_for_link(&self, email: &str, extractor: &CodeExtractor) -> Result<String> {
        self.wait_for(email, |m| extractor.extract_from_message(m).link)
            .await
    }

    async fn wait_for<F>(&self, email: &str, find: F) -> Result<String>
    where
        F: Fn(&Message) -> Option<String>,
    {
        let timeout = self.polling.max_wait;
        let poll_interval = self.polling.interval;
        let deadline = Instant::now() + timeout;
        let since = self.default_since();

        loop {
            if Instant::now() > deadline {
                return Err(Error::WaitTimeout { timeout });
            }

            let messages = newest_first(self.get_messages(email, Some(since)).await);
            if let Some(found) = messages.iter().find_map(&find) {
                debug!(checked = messages.len(), "Found match");
                return Ok(found);
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Probes the primary provider; a healthy answer ends fallback mode.
    #[instrument(name = "MessagePoller::health_check", skip(self))]
    pub async fn health_check(&self) -> HealthStatus {
        self.failover.probe().await
    }

    /// Routes polls to the primary provider again.
    pub fn reset_fallback(&self) {
        self.failover.reset();
    }

    /// Returns `true` while polls go to the fallback provider.
    #[must_use]
    pub fn is_using_fallback(&self) -> bool {
        self.failover.is_on_secondary()
    }

    /// Releases HTTP resources. Idempotent.
    pub async fn cleanup(&self) {
        self.failover.close().await;
        debug!("Poller cleaned up");
    }

    fn default_since(&self) -> DateTime<Utc> {
        let lookback = chrono::Duration::from_std(self.polling.lookback)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        Utc::now() - lookback
    }
}

impl std::fmt::Debug for MessagePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePoller")
            .field("primary", &self.failover.primary().tag())
            .field("using_fallback", &self.is_using_fallback())
            .field("polling", &self.polling)
            .finish_non_exhaustive()
    }
}

fn newest_first(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failover::tests::ScriptedProvider;
    use crate::provider::NoopProvider;
    use crate::retry::RetryPolicy;
    use serde_json::{json, Value};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn config() -> ServiceConfig {
        ServiceConfig::builder()
            .retry(RetryPolicy {
                jitter: false,
                ..RetryPolicy::quick()
            })
            .poll_interval(Duration::from_secs(1))
            .max_wait(Duration::from_secs(10))
            .build()
            .unwrap()
    }

    fn minutes_ago(minutes: i64) -> String {
        (Utc::now() - chrono::Duration::minutes(minutes)).to_rfc3339()
    }

    fn records() -> Vec<Value> {
        vec![
            json!({"id": "", "subject": "dropped", "date": minutes_ago(1)}),
            json!({"id": 1, "subject": "older", "date": minutes_ago(30), "body_text": "Code 111111"}),
            json!({"id": 2, "subject": "newer", "date": minutes_ago(5),
                   "body_html": "<p>Your verification code: 222222</p><a href=\"https://x.io/verify/2\">Verify</a>"}),
            json!({"id": 3, "subject": "ancient", "date": "2001-01-01T00:00:00Z", "body_text": "333333"}),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_messages_filters_and_drops() {
        let primary = ScriptedProvider::with_records("temp-mail", records());
        let poller = MessagePoller::with_providers(&config(), primary, Arc::new(NoopProvider));

        let ids: Vec<String> = poller
            .get_messages("box@temp-mail.io", None)
            .await
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["1", "2"]);

        let since = Utc::now() - chrono::Duration::minutes(10);
        let ids: Vec<String> = poller
            .get_messages("box@temp-mail.io", Some(since))
            .await
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[tokio::test]
    async fn test_get_message_ignores_watermark() {
        let primary = ScriptedProvider::with_records("temp-mail", records());
        let poller = MessagePoller::with_providers(&config(), primary, Arc::new(NoopProvider));

        let message = poller.get_message("box@temp-mail.io", "3").await.unwrap();
        assert_eq!(message.subject, "ancient");
        assert!(poller.get_message("box@temp-mail.io", "404").await.is_none());
    }

    #[tokio::test]
    async fn test_verification_codes_in_upstream_order() {
        let primary = ScriptedProvider::with_records("temp-mail", records());
        let poller = MessagePoller::with_providers(&config(), primary, Arc::new(NoopProvider));

        let codes = poller.get_verification_codes("box@temp-mail.io").await;
        assert_eq!(codes, vec!["111111", "222222"]);
    }

    #[tokio::test]
    async fn test_verification_codes_one_per_message() {
        let records = vec![
            json!({"id": "a", "date": minutes_ago(3), "body_text": "Your code: 777777"}),
            json!({"id": "b", "date": minutes_ago(2), "body_text": "See you soon"}),
            json!({"id": "c", "date": minutes_ago(1), "body_text": "Your code: 777777"}),
        ];
        let primary = ScriptedProvider::with_records("temp-mail", records);
        let poller = MessagePoller::with_providers(&config(), primary, Arc::new(NoopProvider));

        let codes = poller.get_verification_codes("box@temp-mail.io").await;
        assert_eq!(codes, vec!["777777", "777777"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sticky_fallback_until_health_check() {
        let primary = ScriptedProvider::down("temp-mail");
        let poller =
            MessagePoller::with_providers(&config(), primary.clone(), Arc::new(NoopProvider));

        assert!(poller.get_messages("box@temp-mail.io", None).await.is_empty());
        assert!(poller.is_using_fallback());
        assert_eq!(primary.calls(), 3);

        // Still on fallback: primary is not called
        assert!(poller.get_messages("box@temp-mail.io", None).await.is_empty());
        assert_eq!(primary.calls(), 3);

        primary.healthy.store(true, Ordering::SeqCst);
        assert!(poller.health_check().await.healthy);
        assert!(!poller.is_using_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_fallback() {
        let primary = ScriptedProvider::down("temp-mail");
        let poller =
            MessagePoller::with_providers(&config(), primary.clone(), Arc::new(NoopProvider));

        poller.get_messages("box@temp-mail.io", None).await;
        assert!(poller.is_using_fallback());
        poller.reset_fallback();
        assert!(!poller.is_using_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_fallback_yields_empty() {
        let poller = MessagePoller::with_providers(
            &config(),
            ScriptedProvider::down("temp-mail"),
            ScriptedProvider::down("backup"),
        );
        assert!(poller.get_messages("box@temp-mail.io", None).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_code_and_link() {
        let primary = ScriptedProvider::with_records("temp-mail", records());
        let poller = MessagePoller::with_providers(&config(), primary, Arc::new(NoopProvider));
        let extractor = CodeExtractor::new();

        let code = poller.wait_for_code("box@temp-mail.io", &extractor).await.unwrap();
        assert_eq!(code, "222222");

        let link = poller.wait_for_link("box@temp-mail.io", &extractor).await.unwrap();
        assert_eq!(link, "https://x.io/verify/2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let primary = ScriptedProvider::up("temp-mail");
        let poller =
            MessagePoller::with_providers(&config(), primary.clone(), Arc::new(NoopProvider));

        let result = poller
            .wait_for_code("box@temp-mail.io", &CodeExtractor::new())
            .await;
        assert!(matches!(result, Err(Error::WaitTimeout { .. })));
        assert!(primary.calls() > 5);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let poller = MessagePoller::with_providers(
            &config(),
            ScriptedProvider::up("temp-mail"),
            Arc::new(NoopProvider),
        );
        poller.cleanup().await;
        poller.cleanup().await;
    }
}
