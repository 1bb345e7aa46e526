//! Account registry storage.
//!
//! The provisioner only talks to the [`AccountStore`] trait, so a durable backend
//! can replace the default [`InMemoryAccountStore`] without touching provisioning
//! logic. Every method is atomic per entry; concurrent inserts never lose updates.

use crate::account::Account;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{PoisonError, RwLock};

/// Storage for provisioned accounts, keyed by email (case-insensitive).
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts an account, replacing any account with the same email.
    async fn insert(&self, account: Account);

    /// Returns all accounts in insertion order.
    async fn list(&self) -> Vec<Account>;

    /// Returns the account for `email`.
    async fn get(&self, email: &str) -> Option<Account>;

    /// Returns `true` if an account for `email` is stored.
    async fn contains(&self, email: &str) -> bool {
        self.get(email).await.is_some()
    }

    /// Removes and returns the account for `email`.
    async fn remove(&self, email: &str) -> Option<Account>;

    /// Updates `last_accessed`; returns `false` if the account is unknown.
    async fn touch(&self, email: &str, at: DateTime<Utc>) -> bool;
}

/// Process-lifetime account store.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<Vec<Account>>,
}

impl InMemoryAccountStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) {
        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match accounts.iter_mut().find(|a| a.is(&account.email)) {
            Some(existing) => *existing = account,
            None => accounts.push(account),
        }
    }

    async fn list(&self) -> Vec<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn get(&self, email: &str) -> Option<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|a| a.is(email))
            .cloned()
    }

    async fn remove(&self, email: &str) -> Option<Account> {
        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let index = accounts.iter().position(|a| a.is(email))?;
        Some(accounts.remove(index))
    }

    async fn touch(&self, email: &str, at: DateTime<Utc>) -> bool {
        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match accounts.iter_mut().find(|a| a.is(email)) {
            Some(account) => {
                account.last_accessed = Some(at);
                true
            }
            None => false,
        }
    }
}
