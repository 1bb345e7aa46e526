//! Upstream mail providers.
//!
//! A [`MailProvider`] is one disposable-mail backend. The crate ships two:
//!
//! - [`HttpProvider`] talks to a temp-mail style JSON API
//!   (`/get`, `/custom`, `/see`, `/mailbox/<address>`).
//! - [`NoopProvider`] is the default fallback: it cannot create mailboxes and
//!   answers every read with "nothing there".
//!
//! Providers make exactly one attempt per call; retries and fallback are layered
//! on top by the provisioner and poller.

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use email_address::EmailAddress;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

/// Tag of the default fallback provider.
pub const NOOP_PROVIDER: &str = "noop";

/// A disposable-mail backend.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Short name recorded on accounts created through this provider.
    fn tag(&self) -> &str;

    /// Creates a mailbox with a provider-chosen address.
    async fn create_random(&self) -> Result<String>;

    /// Creates a mailbox for the requested local part.
    async fn create_named(&self, name: &str) -> Result<String>;

    /// Lists the raw message records of a mailbox.
    async fn list_messages(&self, email: &str) -> Result<Vec<Value>>;

    /// Returns `true` if the provider knows the mailbox.
    async fn mailbox_exists(&self, email: &str) -> Result<bool>;

    /// Deletes a mailbox. Deleting an unknown mailbox succeeds.
    async fn delete_mailbox(&self, email: &str) -> Result<()>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Releases held resources. Idempotent.
    async fn close(&self);
}

/// Result of probing a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    /// Whether the provider answered.
    pub healthy: bool,
    /// Tag of the probed provider.
    pub provider: String,
    /// Time the probe took.
    pub latency: Duration,
    /// Failure description when unhealthy.
    pub detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MailboxResponse {
    #[serde(default, alias = "email", alias = "address")]
    mail: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessagesResponse {
    Bare(Vec<Value>),
    Listing {
        #[serde(default)]
        messages: Option<Vec<Value>>,
    },
}

/// Provider for temp-mail style HTTP APIs.
pub struct HttpProvider {
    tag: String,
    base_url: Url,
    request_timeout: Duration,
    client: RwLock<Option<Client>>,
}

impl HttpProvider {
    /// Creates a provider for `base_url` using the HTTP settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProxy`] if the proxy cannot be applied, or
    /// [`Error::InvalidConfig`] if the HTTP client cannot be built.
    pub fn new(tag: impl Into<String>, base_url: Url, config: &ServiceConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.timeouts.connect)
            .timeout(config.timeouts.request)
            .user_agent(config.user_agent.as_str());

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(proxy.to_reqwest()?);
        }

        let client = builder.build().map_err(|e| Error::InvalidConfig {
            message: format!("failed to build HTTP client: {e}"),
        })?;

        Ok(Self {
            tag: tag.into(),
            base_url,
            request_timeout: config.timeouts.request,
            client: RwLock::new(Some(client)),
        })
    }

    /// Base URL this provider talks to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn client(&self) -> Result<Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::ClientClosed)
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidConfig {
                message: format!("base URL '{}' cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        Ok(self.client()?.request(method, url))
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::from_reqwest(endpoint, self.request_timeout, e))?;
        debug!(endpoint, status = response.status().as_u16(), "Upstream responded");
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, request: RequestBuilder) -> Result<T> {
        let response = self
            .send(endpoint, request)
            .await?
            .error_for_status()
            .map_err(|e| Error::from_reqwest(endpoint, self.request_timeout, e))?;

        response.json::<T>().await.map_err(|source| {
            if source.is_decode() {
                Error::MalformedResponse {
                    endpoint: endpoint.to_string(),
                    source,
                }
            } else {
                Error::from_reqwest(endpoint, self.request_timeout, source)
            }
        })
    }

    fn mailbox_address(endpoint: &str, response: MailboxResponse) -> Result<String> {
        let address = response.mail.map(|m| m.trim().to_string()).unwrap_or_default();

        if address.is_empty() {
            return Err(Error::MissingMailbox {
                endpoint: endpoint.to_string(),
            });
        }
        if !EmailAddress::is_valid(&address) {
            return Err(Error::InvalidMailbox { address });
        }

        Ok(address)
    }
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("tag", &self.tag)
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MailProvider for HttpProvider {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn create_random(&self) -> Result<String> {
        const ENDPOINT: &str = "/get";
        let request = self.request(Method::GET, self.endpoint(&["get"])?)?;
        let response: MailboxResponse = self.get_json(ENDPOINT, request).await?;
        Self::mailbox_address(ENDPOINT, response)
    }

    async fn create_named(&self, name: &str) -> Result<String> {
        const ENDPOINT: &str = "/custom";
        let request = self
            .request(Method::GET, self.endpoint(&["custom"])?)?
            .query(&[("username", name)]);
        let response: MailboxResponse = self.get_json(ENDPOINT, request).await?;
        Self::mailbox_address(ENDPOINT, response)
    }

    async fn list_messages(&self, email: &str) -> Result<Vec<Value>> {
        const ENDPOINT: &str = "/see";
        let request = self
            .request(Method::GET, self.endpoint(&["see"])?)?
            .query(&[("mail", email)]);

        let records = match self.get_json(ENDPOINT, request).await? {
            MessagesResponse::Bare(records) => records,
            MessagesResponse::Listing { messages } => messages.unwrap_or_default(),
        };
        debug!(email, count = records.len(), "Fetched message records");
        Ok(records)
    }

    async fn mailbox_exists(&self, email: &str) -> Result<bool> {
        const ENDPOINT: &str = "/mailbox";
        let request = self.request(Method::GET, self.endpoint(&["mailbox", email])?)?;
        let response = self.send(ENDPOINT, request).await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(Error::HttpStatus {
                endpoint: ENDPOINT.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn delete_mailbox(&self, email: &str) -> Result<()> {
        const ENDPOINT: &str = "/mailbox";
        let request = self.request(Method::DELETE, self.endpoint(&["mailbox", email])?)?;
        let response = self.send(ENDPOINT, request).await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            // Already gone
            StatusCode::NOT_FOUND => Ok(()),
            status => Err(Error::HttpStatus {
                endpoint: ENDPOINT.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn ping(&self) -> Result<()> {
        const ENDPOINT: &str = "/";
        let request = self.request(Method::GET, self.base_url.clone())?;
        self.send(ENDPOINT, request)
            .await?
            .error_for_status()
            .map_err(|e| Error::from_reqwest(ENDPOINT, self.request_timeout, e))?;
        Ok(())
    }

    async fn close(&self) {
        let client = self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if client.is_some() {
            debug!(provider = %self.tag, "HTTP client released");
        }
    }
}

/// Fallback provider that has nothing to offer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProvider;

#[async_trait]
impl MailProvider for NoopProvider {
    fn tag(&self) -> &str {
        NOOP_PROVIDER
    }

    async fn create_random(&self) -> Result<String> {
        Err(Error::FallbackUnsupported {
            operation: "create_random",
            provider: NOOP_PROVIDER.to_string(),
        })
    }

    async fn create_named(&self, _name: &str) -> Result<String> {
        Err(Error::FallbackUnsupported {
            operation: "create_named",
            provider: NOOP_PROVIDER.to_string(),
        })
    }

    async fn list_messages(&self, _email: &str) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn mailbox_exists(&self, _email: &str) -> Result<bool> {
        Ok(false)
    }

    async fn delete_mailbox(&self, _email: &str) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {}
}

/// Builds the primary provider and the fallback (HTTP if a fallback URL is
/// configured, no-op otherwise).
pub(crate) fn from_config(
    config: &ServiceConfig,
) -> Result<(Arc<dyn MailProvider>, Arc<dyn MailProvider>)> {
    let primary: Arc<dyn MailProvider> = Arc::new(HttpProvider::new(
        config.service.as_str(),
        config.base_url().clone(),
        config,
    )?);

    let secondary: Arc<dyn MailProvider> = match config.fallback_base_url() {
        Some(url) => Arc::new(HttpProvider::new(
            format!("{}-fallback", config.service),
            url.clone(),
            config,
        )?),
        None => Arc::new(NoopProvider),
    };

    Ok((primary, secondary))
}
