//! Mail service discovery from user-facing service names.
//!
//! Front-ends let users pick a service by name and spell it loosely
//! (`temp-mail`, `TempMail`, `temp_mail`). This module normalizes those names to a
//! canonical provider tag and base URL, and rejects anything unknown with
//! [`Error::UnsupportedService`].
//!
//! # Example
//!
//! ```
//! use tempmail_sync::known_services::{resolve_service, ServiceRegistry, KnownService};
//!
//! assert_eq!(resolve_service("TempMail").unwrap().tag, "temp-mail");
//! assert!(resolve_service("gmail").is_err());
//!
//! let mut registry = ServiceRegistry::with_defaults();
//! registry.register("staging", KnownService::new("temp-mail", "http://127.0.0.1:8787"));
//! assert_eq!(registry.resolve("staging").unwrap().base_url, "http://127.0.0.1:8787");
//! ```

use crate::error::{Error, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Canonical tag of the default disposable-mail provider.
pub const TEMP_MAIL: &str = "temp-mail";

/// Base URL of the default disposable-mail provider.
pub const TEMP_MAIL_BASE_URL: &str = "https://tempmail.glitchy.workers.dev";

/// A mail service the crate knows how to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownService {
    /// Canonical provider tag, recorded on every account.
    pub tag: Cow<'static, str>,
    /// Base URL of the provider's HTTP API.
    pub base_url: Cow<'static, str>,
}

impl KnownService {
    /// Creates a service entry.
    #[must_use]
    pub fn new(tag: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            tag: Cow::Owned(tag.into()),
            base_url: Cow::Owned(base_url.into()),
        }
    }

    const fn builtin(tag: &'static str, base_url: &'static str) -> Self {
        Self {
            tag: Cow::Borrowed(tag),
            base_url: Cow::Borrowed(base_url),
        }
    }
}

/// Map of accepted service aliases to their provider.
static KNOWN_SERVICES: LazyLock<HashMap<&'static str, KnownService>> = LazyLock::new(|| {
    let temp_mail = KnownService::builtin(TEMP_MAIL, TEMP_MAIL_BASE_URL);

    let mut m = HashMap::new();
    m.insert("temp-mail", temp_mail.clone());
    m.insert("tempmail", temp_mail.clone());
    m.insert("temp_mail", temp_mail);
    m
});

fn normalize(service: &str) -> String {
    service.trim().to_lowercase()
}

/// A customizable registry of service aliases.
///
/// Custom entries override the built-in ones.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    custom: HashMap<String, KnownService>,
    use_defaults: bool,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ServiceRegistry {
    /// Creates an empty registry without built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            custom: HashMap::new(),
            use_defaults: false,
        }
    }

    /// Creates a registry that includes the built-in aliases.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            custom: HashMap::new(),
            use_defaults: true,
        }
    }

    /// Registers a custom alias, replacing any existing mapping.
    pub fn register(&mut self, alias: impl AsRef<str>, service: KnownService) {
        self.custom.insert(normalize(alias.as_ref()), service);
    }

    /// Removes a custom alias.
    pub fn unregister(&mut self, alias: &str) -> Option<KnownService> {
        self.custom.remove(&normalize(alias))
    }

    /// Resolves a service name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedService`] for names that are not registered.
    pub fn resolve(&self, service: &str) -> Result<KnownService> {
        let key = normalize(service);

        if let Some(found) = self.custom.get(&key) {
            return Ok(found.clone());
        }

        if self.use_defaults {
            if let Some(found) = KNOWN_SERVICES.get(key.as_str()) {
                return Ok(found.clone());
            }
        }

        Err(Error::UnsupportedService {
            service: service.to_string(),
        })
    }

    /// Returns `true` if the alias resolves.
    #[must_use]
    pub fn is_known(&self, service: &str) -> bool {
        self.resolve(service).is_ok()
    }

    /// Returns all accepted aliases.
    #[must_use]
    pub fn aliases(&self) -> Vec<Cow<'_, str>> {
        let mut aliases: Vec<Cow<'_, str>> = self
            .custom
            .keys()
            .map(|s| Cow::Borrowed(s.as_str()))
            .collect();

        if self.use_defaults {
            for &alias in KNOWN_SERVICES.keys() {
                if !self.custom.contains_key(alias) {
                    aliases.push(Cow::Borrowed(alias));
                }
            }
        }

        aliases
    }
}

/// Resolves a service name against the built-in aliases.
///
/// # Errors
///
/// Returns [`Error::UnsupportedService`] for unknown names.
pub fn resolve_service(service: &str) -> Result<KnownService> {
    KNOWN_SERVICES
        .get(normalize(service).as_str())
        .cloned()
        .ok_or_else(|| Error::UnsupportedService {
            service: service.to_string(),
        })
}
