use chrono::{DateTime, Utc};
use common::CustomerId;

/// A registered customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: CustomerId,
    /// Unique, stored normalized (see [`normalize_email`]).
    pub email: String,
    pub full_name: String,
    /// Opaque credential hash. Hashing happens outside this system.
    pub credential_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Creates a new customer with a fresh id and a normalized email.
    pub fn new(
        email: &str,
        full_name: impl Into<String>,
        credential_hash: impl Into<String>,
    ) -> Self {
        let now = super::now();
        Self {
            id: CustomerId::new(),
            email: normalize_email(email),
            full_name: full_name.into(),
            credential_hash: credential_hash.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Canonical form used for storing and looking up emails.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
