//! Primary/fallback provider selection.
//!
//! [`Failover`] runs an operation against the primary provider under the retry
//! policy and, once that budget is spent on an error the upstream can be blamed
//! for, runs it against the secondary under the same policy. A sticky failover
//! remembers the switch until [`Failover::probe`] sees the primary healthy again
//! or [`Failover::reset`] is called.

use crate::error::{Error, Result};
use crate::provider::{HealthStatus, MailProvider};
use crate::retry::RetryPolicy;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub(crate) struct Failover {
    primary: Arc<dyn MailProvider>,
    secondary: Arc<dyn MailProvider>,
    policy: RetryPolicy,
    deadline: Option<Duration>,
    sticky: bool,
    on_secondary: AtomicBool,
}

impl Failover {
    pub(crate) fn new(
        primary: Arc<dyn MailProvider>,
        secondary: Arc<dyn MailProvider>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            primary,
            secondary,
            policy,
            deadline: None,
            sticky: false,
            on_secondary: AtomicBool::new(false),
        }
    }

    /// Keeps routing to the secondary after the first failover.
    pub(crate) fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }

    pub(crate) fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub(crate) fn primary(&self) -> &Arc<dyn MailProvider> {
        &self.primary
    }

    /// Provider with the given tag, defaulting to the primary.
    pub(crate) fn provider_for(&self, tag: &str) -> &Arc<dyn MailProvider> {
        if self.secondary.tag() == tag {
            &self.secondary
        } else {
            &self.primary
        }
    }

    pub(crate) fn is_on_secondary(&self) -> bool {
        self.on_secondary.load(Ordering::Acquire)
    }

    /// Routes calls to the primary again.
    pub(crate) fn reset(&self) {
        if self.on_secondary.swap(false, Ordering::AcqRel) {
            info!(provider = %self.primary.tag(), "Fallback cleared, routing to primary");
        }
    }

    /// Runs `call` with retry and failover, bounded by the deadline if set.
    pub(crate) async fn run<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Fn(Arc<dyn MailProvider>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(deadline) = self.deadline else {
            return self.run_unbounded(operation, &call).await;
        };

        match tokio::time::timeout(deadline, self.run_unbounded(operation, &call)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                    "Operation deadline exceeded"
                );
                Err(Error::DeadlineExceeded { timeout: deadline })
            }
        }
    }

    async fn run_unbounded<T, F, Fut>(&self, operation: &'static str, call: &F) -> Result<T>
    where
        F: Fn(Arc<dyn MailProvider>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.is_on_secondary() {
            debug!(
                operation,
                provider = %self.secondary.tag(),
                "Primary marked unavailable, using fallback"
            );
        } else {
            let primary = Arc::clone(&self.primary);
            match self.policy.run(operation, || call(Arc::clone(&primary))).await {
                Ok(value) => return Ok(value),
                Err(e) if e.should_fail_over() => {
                    warn!(
                        operation,
                        primary = %primary.tag(),
                        fallback = %self.secondary.tag(),
                        error = %e,
                        category = %e.category(),
                        "Primary provider exhausted, switching to fallback"
                    );
                    if self.sticky {
                        self.on_secondary.store(true, Ordering::Release);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let secondary = Arc::clone(&self.secondary);
        self.policy
            .run(operation, || call(Arc::clone(&secondary)))
            .await
    }

    /// Pings the primary. A healthy answer clears the sticky flag.
    pub(crate) async fn probe(&self) -> HealthStatus {
        let started = Instant::now();
        let result = self.primary.ping().await;
        let latency = started.elapsed();

        match result {
            Ok(()) => {
                self.reset();
                HealthStatus {
                    healthy: true,
                    provider: self.primary.tag().to_string(),
                    latency,
                    detail: None,
                }
            }
            Err(e) => {
                warn!(provider = %self.primary.tag(), error = %e, "Health probe failed");
                HealthStatus {
                    healthy: false,
                    provider: self.primary.tag().to_string(),
                    latency,
                    detail: Some(e.to_string()),
                }
            }
        }
    }

    pub(crate) async fn close(&self) {
        futures::join!(self.primary.close(), self.secondary.close());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::AtomicU32;

    /// Scripted provider counting calls.
    pub(crate) struct ScriptedProvider {
        pub(crate) tag: &'static str,
        pub(crate) healthy: AtomicBool,
        pub(crate) calls: AtomicU32,
        pub(crate) records: Vec<Value>,
    }

    impl ScriptedProvider {
        pub(crate) fn up(tag: &'static str) -> Arc<Self> {
            Self::with_records(tag, Vec::new())
        }

        pub(crate) fn down(tag: &'static str) -> Arc<Self> {
            let provider = Self::up(tag);
            provider.healthy.store(false, Ordering::SeqCst);
            provider
        }

        pub(crate) fn with_records(tag: &'static str, records: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                tag,
                healthy: AtomicBool::new(true),
                calls: AtomicU32::new(0),
                records,
            })
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn answer<T>(&self, value: T) -> Result<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy.load(Ordering::SeqCst) {
                Ok(value)
            } else {
                Err(Error::HttpStatus {
                    endpoint: "/".into(),
                    status: 503,
                })
            }
        }
    }

    #[async_trait]
    impl MailProvider for ScriptedProvider {
        fn tag(&self) -> &str {
            self.tag
        }

        async fn create_random(&self) -> Result<String> {
            self.answer(format!("random@{}.io", self.tag))
        }

        async fn create_named(&self, name: &str) -> Result<String> {
            self.answer(format!("{name}@{}.io", self.tag))
        }

        async fn list_messages(&self, _email: &str) -> Result<Vec<Value>> {
            self.answer(self.records.clone())
        }

        async fn mailbox_exists(&self, email: &str) -> Result<bool> {
            self.answer(email.ends_with(&format!("@{}.io", self.tag)))
        }

        async fn delete_mailbox(&self, _email: &str) -> Result<()> {
            self.answer(())
        }

        async fn ping(&self) -> Result<()> {
            self.answer(())
        }

        async fn close(&self) {}
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            jitter: false,
            ..RetryPolicy::quick()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_success_skips_fallback() {
        let primary = ScriptedProvider::up("primary");
        let secondary = ScriptedProvider::up("secondary");
        let failover = Failover::new(primary.clone(), secondary.clone(), quick_policy());

        let email = failover
            .run("create", |p| async move { p.create_random().await })
            .await
            .unwrap();

        assert_eq!(email, "random@primary.io");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_primary_uses_secondary() {
        let primary = ScriptedProvider::down("primary");
        let secondary = ScriptedProvider::up("secondary");
        let failover = Failover::new(primary.clone(), secondary.clone(), quick_policy());

        let email = failover
            .run("create", |p| async move { p.create_random().await })
            .await
            .unwrap();

        assert_eq!(email, "random@secondary.io");
        assert_eq!(primary.calls(), 3);
        assert_eq!(secondary.calls(), 1);
        assert!(!failover.is_on_secondary());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sticky_flag_and_probe() {
        let primary = ScriptedProvider::down("primary");
        let secondary = ScriptedProvider::up("secondary");
        let failover =
            Failover::new(primary.clone(), secondary.clone(), quick_policy()).sticky();

        failover
            .run("list", |p| async move { p.list_messages("a@b.io").await })
            .await
            .unwrap();
        assert!(failover.is_on_secondary());
        assert_eq!(primary.calls(), 3);

        // Primary is skipped while the flag is set
        failover
            .run("list", |p| async move { p.list_messages("a@b.io").await })
            .await
            .unwrap();
        assert_eq!(primary.calls(), 3);
        assert_eq!(secondary.calls(), 2);

        let status = failover.probe().await;
        assert!(!status.healthy);
        assert!(failover.is_on_secondary());

        primary.healthy.store(true, Ordering::SeqCst);
        let status = failover.probe().await;
        assert!(status.healthy);
        assert_eq!(status.provider, "primary");
        assert!(!failover.is_on_secondary());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_is_not_failed_over() {
        let primary = ScriptedProvider::up("primary");
        let secondary = ScriptedProvider::up("secondary");
        let failover = Failover::new(primary.clone(), secondary.clone(), quick_policy());

        let result: Result<()> = failover
            .run("create", |_| async {
                Err(Error::InvalidMailboxName {
                    name: "bad name".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(Error::InvalidMailboxName { .. })));
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_whole_run() {
        let primary = ScriptedProvider::up("primary");
        let secondary = ScriptedProvider::up("secondary");
        let failover = Failover::new(primary, secondary, RetryPolicy::default())
            .with_deadline(Some(Duration::from_secs(2)));

        let result: Result<()> = failover
            .run("slow", |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(Error::DeadlineExceeded { .. })));
    }

    #[tokio::test]
    async fn test_provider_for_tag() {
        let primary = ScriptedProvider::up("primary");
        let secondary = ScriptedProvider::up("secondary");
        let failover = Failover::new(primary, secondary, quick_policy());

        assert_eq!(failover.provider_for("secondary").tag(), "secondary");
        assert_eq!(failover.provider_for("primary").tag(), "primary");
        assert_eq!(failover.provider_for("unknown").tag(), "primary");
        assert_eq!(failover.primary().tag(), "primary");
    }
}
