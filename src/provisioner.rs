//! Mailbox provisioning.
//!
//! [`MailboxProvisioner`] creates disposable mailboxes upstream, attaches a locally
//! generated password and keeps the resulting [`Account`]s in its registry.
//! Creation retries transient failures, escalates to the fallback provider once
//! the primary is exhausted, and reports exhaustion as
//! [`Error::ServiceUnavailable`].
//!
//! # Example
//!
//! ```no_run
//! use tempmail_sync::{MailboxProvisioner, ServiceConfig};
//!
//! # async fn example() -> tempmail_sync::Result<()> {
//! let config = ServiceConfig::builder().build()?;
//! let provisioner = MailboxProvisioner::new(&config)?;
//!
//! let account = provisioner.create_account(Some("signup-test")).await?;
//! println!("{} / {}", account.email, account.password());
//!
//! provisioner.delete_account(&account.email).await;
//! provisioner.cleanup().await;
//! # Ok(())
//! # }
//! ```

use crate::account::Account;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::failover::Failover;
use crate::known_services::ServiceRegistry;
use crate::password::generate_password;
use crate::provider::{self, HealthStatus, MailProvider};
use crate::store::{AccountStore, InMemoryAccountStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Longest accepted requested mailbox name.
pub const MAX_MAILBOX_NAME_LEN: usize = 64;

/// Creates, tracks and deletes disposable mailboxes.
pub struct MailboxProvisioner {
    failover: Failover,
    store: Arc<dyn AccountStore>,
    registry: ServiceRegistry,
    service: String,
    password_length: usize,
    proxy_label: Option<String>,
}

impl MailboxProvisioner {
    /// Creates a provisioner for the providers described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built (e.g. invalid proxy).
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let (primary, secondary) = provider::from_config(config)?;
        Ok(Self::with_providers(config, primary, secondary))
    }

    /// Creates a provisioner with explicit providers.
    #[must_use]
    pub fn with_providers(
        config: &ServiceConfig,
        primary: Arc<dyn MailProvider>,
        secondary: Arc<dyn MailProvider>,
    ) -> Self {
        Self {
            failover: Failover::new(primary, secondary, config.retry.clone())
                .with_deadline(config.request_deadline),
            store: Arc::new(InMemoryAccountStore::new()),
            registry: config.service_registry().clone(),
            service: config.service.clone(),
            password_length: config.password_length,
            proxy_label: config.proxy_label(),
        }
    }

    /// Replaces the account registry.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.store = store;
        self
    }

    /// Replaces the registry used by [`create_account_for_service`](Self::create_account_for_service).
    #[must_use]
    pub fn with_service_registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Creates a mailbox, named if `requested_name` is given and not blank.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidMailboxName`] if the requested name cannot be sent upstream
    /// - [`Error::ServiceUnavailable`] once retries and fallback are exhausted;
    ///   the registry is unchanged in that case
    #[instrument(
        name = "MailboxProvisioner::create_account",
        skip(self),
        fields(service = %self.service)
    )]
    pub async fn create_account(&self, requested_name: Option<&str>) -> Result<Account> {
        let name = requested_name.map(str::trim).filter(|n| !n.is_empty());
        if let Some(name) = name {
            validate_mailbox_name(name)?;
        }

        let (email, provider) = self
            .failover
            .run("create_account", |p| async move {
                let email = match name {
                    Some(name) => p.create_named(name).await?,
                    None => p.create_random().await?,
                };
                Ok((email, p.tag().to_string()))
            })
            .await
            .map_err(|e| {
                error!(error = %e, category = %e.category(), "Mailbox creation failed");
                Error::ServiceUnavailable
            })?;

        let account = Account::new(email, generate_password(self.password_length), provider)
            .with_proxy(self.proxy_label.clone());
        self.store.insert(account.clone()).await;

        info!(email = %account.email, provider = %account.provider, "Mailbox created");
        Ok(account)
    }

    /// Creates a mailbox after checking that `service` names the configured
    /// provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedService`] immediately for unknown services,
    /// otherwise the errors of [`create_account`](Self::create_account).
    pub async fn create_account_for_service(
        &self,
        service: &str,
        requested_name: Option<&str>,
    ) -> Result<Account> {
        let known = self.registry.resolve(service)?;
        if known.tag != self.service {
            warn!(
                requested = service,
                configured = %self.service,
                "Service not served by this provisioner"
            );
            return Err(Error::UnsupportedService {
                service: service.to_string(),
            });
        }

        self.create_account(requested_name).await
    }

    /// Returns all provisioned accounts in creation order.
    pub async fn list_accounts(&self) -> Vec<Account> {
        self.store.list().await
    }

    /// Returns an account and records the access.
    pub async fn get_account(&self, email: &str) -> Option<Account> {
        let now = Utc::now();
        if !self.store.touch(email, now).await {
            return None;
        }
        self.store.get(email).await
    }

    /// Returns `true` if the mailbox is registered locally or known upstream.
    ///
    /// Upstream failures count as "does not exist".
    #[instrument(name = "MailboxProvisioner::account_exists", skip(self))]
    pub async fn account_exists(&self, email: &str) -> bool {
        if self.store.contains(email).await {
            return true;
        }

        match self.failover.primary().mailbox_exists(email).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(error = %e, "Upstream existence check failed, assuming absent");
                false
            }
        }
    }

    /// Removes the account locally and, best effort, upstream.
    ///
    /// Returns `true` once the registry no longer holds the email, so repeated
    /// deletes keep returning `true`.
    #[instrument(name = "MailboxProvisioner::delete_account", skip(self))]
    pub async fn delete_account(&self, email: &str) -> bool {
        let removed = self.store.remove(email).await;

        let provider = match &removed {
            Some(account) => self.failover.provider_for(&account.provider),
            None => self.failover.primary(),
        };
        if let Err(e) = provider.delete_mailbox(email).await {
            warn!(provider = %provider.tag(), error = %e, "Upstream delete failed, ignoring");
        }

        debug!(was_registered = removed.is_some(), "Account deleted");
        !self.store.contains(email).await
    }

    /// Probes the primary provider. Never changes state.
    #[instrument(name = "MailboxProvisioner::health_check", skip(self))]
    pub async fn health_check(&self) -> HealthStatus {
        self.failover.probe().await
    }

    /// Releases HTTP resources. Idempotent.
    pub async fn cleanup(&self) {
        self.failover.close().await;
        debug!("Provisioner cleaned up");
    }
}

impl std::fmt::Debug for MailboxProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxProvisioner")
            .field("service", &self.service)
            .field("primary", &self.failover.primary().tag())
            .field("password_length", &self.password_length)
            .field("proxy", &self.proxy_label)
            .finish_non_exhaustive()
    }
}

/// Checks a requested mailbox name: 1-64 characters of letters, digits, `.`,
/// `_` and `-`.
///
/// # Errors
///
/// Returns [`Error::InvalidMailboxName`] otherwise.
pub fn validate_mailbox_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().count() <= MAX_MAILBOX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidMailboxName {
            name: name.to_string(),
        })
    }
}
