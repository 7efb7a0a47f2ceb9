use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CoreError;

macro_rules! record_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(i64);

        impl $name {
            pub fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub fn as_i64(&self) -> i64 {
                self.0
            }

            pub fn from_string(s: &str) -> Result<Self, CoreError> {
                let raw = s
                    .parse::<i64>()
                    .map_err(|e| CoreError::InvalidId(e.to_string()))?;
                Ok(Self(raw))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "({})"), self.0)
            }
        }
    };
}

record_id!(ChangesetId, "ChangesetId");
record_id!(ChangesetSpecId, "ChangesetSpecId");
record_id!(BatchChangeId, "BatchChangeId");
record_id!(RepoId, "RepoId");
record_id!(UserId, "UserId");
record_id!(NamespaceId, "NamespaceId");

/// Identity of one external service instance, e.g. `https://github.com/`.
/// Paired with the service kind it uniquely scopes credentials.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalServiceId(String);

impl ExternalServiceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ExternalServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExternalServiceId({})", self.0)
    }
}
