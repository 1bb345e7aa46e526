//! # tempmail-sync
//!
//! Async client for disposable mailboxes: provision them, poll them for new messages
//! and pull verification codes and links out of whatever the sender put in the body.
//!
//! This crate provides a high-level, async API for:
//! - Creating random or named mailboxes on a temp-mail style provider
//!   (with optional SOCKS5 proxy support)
//! - Listing messages since a watermark, surviving an unreliable upstream through
//!   retries with exponential backoff and a fallback provider
//! - Extracting verification codes and links from HTML or plain-text bodies
//!
//! ## Quick Start
//!
//! ```no_run
//! use tempmail_sync::{CodeExtractor, MailboxProvisioner, MessagePoller, ServiceConfig};
//!
//! # async fn example() -> tempmail_sync::Result<()> {
//! let config = ServiceConfig::builder().build()?;
//!
//! let provisioner = MailboxProvisioner::new(&config)?;
//! let account = provisioner.create_account(None).await?;
//!
//! let poller = MessagePoller::new(&config)?;
//! let code = poller
//!     .wait_for_code(&account.email, &CodeExtractor::new())
//!     .await?;
//! println!("Got code: {code}");
//!
//! provisioner.cleanup().await;
//! poller.cleanup().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using a SOCKS5 Proxy
//!
//! ```no_run
//! use tempmail_sync::{MailboxProvisioner, ServiceConfig, Socks5Proxy};
//!
//! # async fn example() -> tempmail_sync::Result<()> {
//! let config = ServiceConfig::builder()
//!     .proxy(Socks5Proxy::with_auth("proxy.example.com", 1080, "user", "pass"))
//!     .build()?;
//!
//! let provisioner = MailboxProvisioner::new(&config)?;
//! // ... use provisioner ...
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Pattern Matching
//!
//! ```
//! use tempmail_sync::matcher::{LinkMatcher, RegexMatcher};
//! use tempmail_sync::CodeExtractor;
//!
//! let extractor = CodeExtractor::with_matchers(
//!     Box::new(RegexMatcher::new(r"PIN: (\d{4})").unwrap()),
//!     Box::new(LinkMatcher::for_domain("example.com")),
//! );
//! assert_eq!(extractor.extract_code("Your PIN: 0420").as_deref(), Some("0420"));
//! ```
//!
//! ## Error Handling
//!
//! All errors implement `std::error::Error` and provide context. Retries and the
//! fallback provider absorb transient failures; once they are exhausted, creation
//! fails with [`Error::ServiceUnavailable`] and polling returns no messages.
//!
//! ```
//! use tempmail_sync::Error;
//!
//! fn handle_error(error: &Error) {
//!     if error.is_retryable() {
//!         println!("Transient error, can retry: {}", error);
//!     } else {
//!         println!("Permanent error ({}): {}", error.category(), error);
//!     }
//! }
//! ```
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation and never installs a subscriber.
//!
//! ### Span Naming Convention
//!
//! - `MailboxProvisioner::create_account` - Mailbox creation
//! - `MailboxProvisioner::account_exists` - Existence check
//! - `MailboxProvisioner::delete_account` - Deletion
//! - `MailboxProvisioner::health_check` - Primary provider probe
//! - `MessagePoller::get_messages` - One poll
//! - `MessagePoller::wait_for_code` / `MessagePoller::wait_for_link` - Waiting for mail
//! - `MessagePoller::health_check` - Primary provider probe
//!
//! ### Standard Fields
//!
//! - `email` - Mailbox address
//! - `service` - Configured provider tag
//! - `operation` - Retried operation name
//! - `fallback` - Whether the poller is in fallback mode
//! - `error` / `category` - Failure and its [`ErrorCategory`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod account;
pub mod config;
pub mod error;
pub mod extractor;
pub mod known_services;
pub mod matcher;
pub mod message;
pub mod password;
pub mod poller;
pub mod provider;
pub mod provisioner;
pub mod proxy;
pub mod retry;
pub mod store;

// Internal modules
mod failover;
mod html;
mod parser;

// Re-exports for ergonomic API
pub use account::Account;
pub use config::{PollingConfig, ServiceConfig, ServiceConfigBuilder, TimeoutConfig};
pub use error::{Error, ErrorCategory, Result};
pub use extractor::{CodeExtractor, ExtractionResult};
pub use known_services::{KnownService, ServiceRegistry};
pub use message::Message;
pub use password::generate_password;
pub use poller::MessagePoller;
pub use provider::{HealthStatus, HttpProvider, MailProvider, NoopProvider};
pub use provisioner::MailboxProvisioner;
pub use proxy::{ProxyAuth, Socks5Proxy};
pub use retry::RetryPolicy;
pub use store::{AccountStore, InMemoryAccountStore};
