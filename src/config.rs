//! Configuration for the provisioner and poller.
//!
//! Use [`ServiceConfigBuilder`] to create a configuration with sensible defaults:
//!
//! ```
//! use tempmail_sync::ServiceConfig;
//!
//! let config = ServiceConfig::builder()
//!     .service("temp-mail")
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.base_url().as_str(), "https://tempmail.glitchy.workers.dev/");
//! ```

use crate::error::{Error, Result};
use crate::known_services::{ServiceRegistry, TEMP_MAIL};
use crate::password::DEFAULT_PASSWORD_LENGTH;
use crate::proxy::Socks5Proxy;
use crate::retry::RetryPolicy;
use reqwest::Url;
use std::time::Duration;

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("tempmail-sync/", env!("CARGO_PKG_VERSION"));

/// Configuration for talking to a disposable-mail provider.
///
/// Create using [`ServiceConfig::builder()`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Tag of the primary provider (e.g. `temp-mail`).
    pub service: String,
    base_url: Url,
    fallback_base_url: Option<Url>,
    /// Optional SOCKS5 proxy for all upstream traffic.
    pub proxy: Option<Socks5Proxy>,
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
    /// Retry policy applied to each provider.
    pub retry: RetryPolicy,
    /// Polling configuration.
    pub polling: PollingConfig,
    /// Length of generated account passwords.
    pub password_length: usize,
    /// Overall deadline for one operation, retries and fallback included.
    pub request_deadline: Option<Duration>,
    /// User agent for upstream requests.
    pub user_agent: String,
    registry: ServiceRegistry,
}

impl ServiceConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Base URL of the primary provider.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL of the fallback provider, if one is configured.
    #[must_use]
    pub fn fallback_base_url(&self) -> Option<&Url> {
        self.fallback_base_url.as_ref()
    }

    /// Registry the service name was resolved with.
    #[must_use]
    pub fn service_registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Masked proxy URL, recorded on accounts.
    #[must_use]
    pub fn proxy_label(&self) -> Option<String> {
        self.proxy.as_ref().map(ToString::to_string)
    }
}

/// Timeout configuration for upstream HTTP calls.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing the TCP/TLS connection.
    pub connect: Duration,
    /// Timeout for one whole request, body included.
    pub request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(30),
        }
    }
}

/// Polling configuration.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Interval between polling attempts when waiting for a message.
    pub interval: Duration,
    /// Maximum time to wait for a matching message.
    pub max_wait: Duration,
    /// Default watermark distance when `since` is not given.
    pub lookback: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(300), // 5 minutes
            lookback: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Parses and checks an upstream base URL.
fn validate_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| Error::InvalidConfig {
        message: format!("invalid base URL '{raw}': {e}"),
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(Error::InvalidConfig {
            message: format!("base URL '{raw}' must be an absolute http(s) URL"),
        });
    }

    Ok(url)
}

/// Builder for [`ServiceConfig`].
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    service: Option<String>,
    base_url: Option<String>,
    fallback_base_url: Option<String>,
    service_registry: Option<ServiceRegistry>,
    proxy: Option<Socks5Proxy>,
    timeouts: Option<TimeoutConfig>,
    retry: Option<RetryPolicy>,
    polling: Option<PollingConfig>,
    password_length: Option<usize>,
    request_deadline: Option<Duration>,
    user_agent: Option<String>,
}

impl ServiceConfigBuilder {
    /// Sets the mail service by name or alias (default: `temp-mail`).
    #[must_use]
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Overrides the primary provider's base URL.
    ///
    /// If not set, the URL registered for the service is used.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the base URL of a fallback provider with the same API shape.
    ///
    /// Without one, exhausted primaries fall back to a no-op provider.
    #[must_use]
    pub fn fallback_base_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_base_url = Some(url.into());
        self
    }

    /// Sets a custom service registry for resolving the service name.
    ///
    /// # Example
    ///
    /// ```
    /// use tempmail_sync::{KnownService, ServiceConfig, ServiceRegistry};
    ///
    /// let mut registry = ServiceRegistry::with_defaults();
    /// registry.register("staging", KnownService::new("temp-mail", "http://mail.staging.local"));
    ///
    /// let config = ServiceConfig::builder()
    ///     .service("staging")
    ///     .service_registry(registry)
    ///     .build()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.service, "temp-mail");
    /// assert_eq!(config.base_url().as_str(), "http://mail.staging.local/");
    /// ```
    #[must_use]
    pub fn service_registry(mut self, registry: ServiceRegistry) -> Self {
        self.service_registry = Some(registry);
        self
    }

    /// Sets a SOCKS5 proxy for upstream traffic.
    #[must_use]
    pub fn proxy(mut self, proxy: Socks5Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .request = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Sets the number of attempts per provider.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.retry
            .get_or_insert_with(RetryPolicy::default)
            .max_attempts = attempts;
        self
    }

    /// Sets polling configuration.
    #[must_use]
    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = Some(polling);
        self
    }

    /// Sets the polling interval for wait operations.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.polling
            .get_or_insert_with(PollingConfig::default)
            .interval = interval;
        self
    }

    /// Sets the maximum wait time for wait operations.
    #[must_use]
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.polling
            .get_or_insert_with(PollingConfig::default)
            .max_wait = max_wait;
        self
    }

    /// Sets the default watermark distance.
    #[must_use]
    pub fn lookback(mut self, lookback: Duration) -> Self {
        self.polling
            .get_or_insert_with(PollingConfig::default)
            .lookback = lookback;
        self
    }

    /// Sets the generated password length (default: 12).
    #[must_use]
    pub fn password_length(mut self, length: usize) -> Self {
        self.password_length = Some(length);
        self
    }

    /// Bounds every operation, retries and fallback included.
    #[must_use]
    pub fn request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = Some(deadline);
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedService`] for unknown services and
    /// [`Error::InvalidConfig`] for invalid URLs or limits.
    pub fn build(self) -> Result<ServiceConfig> {
        let service_name = self.service.as_deref().unwrap_or(TEMP_MAIL);
        let registry = self.service_registry.unwrap_or_default();
        let known = registry.resolve(service_name)?;

        // Resolve base URL: explicit > registry
        let base_url = validate_base_url(self.base_url.as_deref().unwrap_or(&known.base_url))?;
        let fallback_base_url = self
            .fallback_base_url
            .as_deref()
            .map(validate_base_url)
            .transpose()?;

        if fallback_base_url.as_ref() == Some(&base_url) {
            return Err(Error::InvalidConfig {
                message: "fallback base URL must differ from the primary".into(),
            });
        }

        let retry = self.retry.unwrap_or_default();
        if retry.max_attempts == 0 {
            return Err(Error::InvalidConfig {
                message: "max_attempts must be at least 1".into(),
            });
        }

        let polling = self.polling.unwrap_or_default();
        if polling.interval.is_zero() {
            return Err(Error::InvalidConfig {
                message: "poll interval must be greater than zero".into(),
            });
        }

        let password_length = self.password_length.unwrap_or(DEFAULT_PASSWORD_LENGTH);
        if password_length == 0 {
            return Err(Error::InvalidConfig {
                message: "password length must be greater than zero".into(),
            });
        }

        Ok(ServiceConfig {
            service: known.tag.into_owned(),
            base_url,
            fallback_base_url,
            proxy: self.proxy,
            timeouts: self.timeouts.unwrap_or_default(),
            retry,
            polling,
            password_length,
            request_deadline: self.request_deadline,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            registry,
        })
    }
}
