use serde::{Deserialize, Serialize};

/// Who is making the request
///
/// Account identities are resolved by the upstream auth layer and
/// arrive on a trusted header; guest identities are minted by the
/// gateway and persisted in a cookie. The two are kept as one sum type
/// so call sites cannot forget to handle the guest case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Durable account identity from the auth collaborator
    Account(String),
    /// Ephemeral cookie-backed guest identity
    Guest(String),
}

impl Identity {
    /// Storage key for quota and history lookups
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Account(id) | Self::Guest(id) => id,
        }
    }

    /// Entitlement class this identity belongs to
    #[must_use]
    pub const fn class(&self) -> UserClass {
        match self {
            Self::Account(_) => UserClass::Regular,
            Self::Guest(_) => UserClass::Guest,
        }
    }

    /// Whether this is a durable account identity
    #[must_use]
    pub const fn is_account(&self) -> bool {
        matches!(self, Self::Account(_))
    }
}

/// Entitlement class used for daily credit allotments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserClass {
    /// Cookie-identified visitor without an account
    Guest,
    /// Signed-in account user
    Regular,
}
