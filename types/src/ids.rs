//! Newtype identifiers for the domain records.
//!
//! Tenant, employee, and role-profile ids are assigned by external systems
//! and carried as opaque strings. Session, module, evidence, and upload ids
//! are minted here as v4 UUIDs.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }
    };
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub const fn from_uuid(raw: Uuid) -> Self {
                Self(raw)
            }

            #[must_use]
            pub const fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Tenant identifier. Every storage operation is scoped by one of these;
    /// cross-tenant reads are structurally unreachable.
    TenantId
}

string_id! {
    /// Employee identifier as issued by the tenant's identity provider.
    EmployeeId
}

string_id! {
    /// Role-profile identifier; versioned separately on the session record.
    RoleProfileId
}

uuid_id! {
    /// Identifier of one training-session attempt chain.
    SessionId
}

uuid_id! {
    /// Identifier of one module within a session.
    ModuleId
}

uuid_id! {
    /// Identifier of an immutable evidence record.
    EvidenceId
}

uuid_id! {
    /// Identifier of a compliance upload ledger entry.
    UploadId
}
