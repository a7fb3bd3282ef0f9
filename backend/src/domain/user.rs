//! User entity and the values used to create or replace one.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Time-ordered user identifier (UUIDv7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a new identifier ordered by creation time.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// Identifier assigned at creation.
    #[schema(value_type = String, format = Uuid)]
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Always lowercase.
    pub email: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last replacement.
    pub updated_at: DateTime<Utc>,
}

/// Mutable user fields, normalised for persistence.
///
/// # Examples
/// ```
/// use users_api::domain::UserDraft;
///
/// let draft = UserDraft::new("Ada", " Ada@Example.COM ");
/// assert_eq!(draft.email(), "ada@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    name: String,
    email: String,
}

impl UserDraft {
    /// Build a draft, lowercasing and trimming the email.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            email: normalize_email(email.as_ref()),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalised email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}
