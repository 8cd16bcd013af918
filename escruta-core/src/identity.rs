//! Identity types for ESCRUTA entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash used for the byte-for-byte payload identity check.
pub type ContentHash = [u8; 32];

/// Compute the SHA-256 hash of a canonical payload encoding.
pub fn compute_payload_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Common behavior shared by strongly-typed entity IDs.
///
/// All IDs wrap a UUIDv7, so they are naturally sortable by creation time.
pub trait EntityIdType:
    Copy + Eq + Ord + std::hash::Hash + fmt::Display + Send + Sync + 'static
{
    /// Wrap an existing UUID.
    fn new(id: Uuid) -> Self;

    /// The underlying UUID.
    fn as_uuid(&self) -> Uuid;

    /// Generate a fresh timestamp-sortable ID.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// The nil ID, useful as a sentinel in tests.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            fn new(id: Uuid) -> Self {
                Self(id)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

entity_id! {
    /// A field reporter (witness) or supervisor identity.
    ReporterId
}

entity_id! {
    /// A stored table report.
    ReportId
}

entity_id! {
    /// A polling station (puesto).
    StationId
}

entity_id! {
    /// A municipality grouping several polling stations.
    MunicipalityId
}

entity_id! {
    /// A queued submission on a field device, local to that device.
    LocalSubmissionId
}
