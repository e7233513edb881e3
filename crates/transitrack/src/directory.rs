//! Account Directory seam.
//!
//! Identity management (registration forms, sessions, password resets)
//! is an external collaborator, not part of this service. The trait
//! below is the whole surface the core consumes: credential
//! verification to optionally gate submissions, and registration
//! forwarding. The tracking contracts are independent of it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};

/// A verified account identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The account's email address.
    pub email: String,
}

/// External directory of user accounts.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Verify a credential pair, returning the identity on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] when the credentials are rejected.
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Identity>;

    /// Register a new identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] on a conflicting registration.
    async fn register(&self, email: &str, password: &str) -> Result<Identity>;
}

/// In-memory directory for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    accounts: Mutex<HashMap<String, String>>,
}

impl StaticDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory pre-populated with the given accounts.
    #[must_use]
    pub fn with_accounts(accounts: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            accounts: Mutex::new(accounts.into_iter().collect()),
        }
    }
}

#[async_trait]
impl AccountDirectory for StaticDirectory {
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Identity> {
        let accounts = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match accounts.get(email) {
            Some(stored) if stored == password => Ok(Identity {
                email: email.to_string(),
            }),
            _ => Err(Error::Unauthorized),
        }
    }

    async fn register(&self, email: &str, password: &str) -> Result<Identity> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(Error::invalid_input("email and password are required"));
        }

        let mut accounts = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if accounts.contains_key(email) {
            return Err(Error::invalid_input(format!(
                "account '{email}' already exists"
            )));
        }
        accounts.insert(email.to_string(), password.to_string());
        Ok(Identity {
            email: email.to_string(),
        })
    }
}
