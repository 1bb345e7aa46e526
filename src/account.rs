//! Provisioned mailbox accounts.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};

/// A provisioned disposable mailbox plus its locally generated password.
///
/// The password is a [`SecretString`]: it is redacted from `Debug` output and
/// only exposed through [`Account::password`] and serialization (the front-end
/// hands it to the user once).
#[derive(Clone, Serialize)]
pub struct Account {
    /// Mailbox address, unique key of the registry.
    pub email: String,
    #[serde(serialize_with = "expose_password")]
    password: SecretString,
    /// Tag of the provider that created the mailbox.
    pub provider: String,
    /// When the account was provisioned.
    pub created_at: DateTime<Utc>,
    /// Last time the account was looked up.
    pub last_accessed: Option<DateTime<Utc>>,
    /// Whether the account is usable.
    pub active: bool,
    /// Masked proxy URL the mailbox was created through.
    pub proxy: Option<String>,
}

impl Account {
    /// Creates an active account created now.
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
            provider: provider.into(),
            created_at: Utc::now(),
            last_accessed: None,
            active: true,
            proxy: None,
        }
    }

    /// Records the proxy used for this account.
    #[must_use]
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Returns the password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns `true` if `email` names this account (case-insensitive).
    #[must_use]
    pub fn is(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("provider", &self.provider)
            .field("created_at", &self.created_at)
            .field("last_accessed", &self.last_accessed)
            .field("active", &self.active)
            .field("proxy", &self.proxy)
            .finish()
    }
}

fn expose_password<S: Serializer>(
    password: &SecretString,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(password.expose_secret())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_not_in_debug() {
        let account = Account::new("box@tempmail.dev", "super-secret-password", "temp-mail");
        let debug_str = format!("{account:?}");
        assert!(!debug_str.contains("super-secret-password"));
        assert!(debug_str.contains("[REDACTED]"));
        assert_eq!(account.password(), "super-secret-password");
    }

    #[test]
    fn test_serialized_account_carries_password() {
        let account = Account::new("box@tempmail.dev", "pw", "temp-mail")
            .with_proxy(Some("socks5://proxy.local:1080".into()));
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["email"], "box@tempmail.dev");
        assert_eq!(json["password"], "pw");
        assert_eq!(json["active"], true);
        assert_eq!(json["proxy"], "socks5://proxy.local:1080");
    }

    #[test]
    fn test_identity_is_case_insensitive() {
        let account = Account::new("Box@TempMail.dev", "pw", "temp-mail");
        assert!(account.is("box@tempmail.dev "));
        assert!(!account.is("other@tempmail.dev"));
    }
}
