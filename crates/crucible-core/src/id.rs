// SPDX-License-Identifier: MIT

//! Opaque identifier types, backed by UUIDv4.

use uuid::Uuid;

/// Define a newtype identifier wrapping a [`Uuid`].
///
/// Generates `new()` for random generation, `from_uuid()`/`as_uuid()` for
/// round-tripping through a store layer, `Display`, and the common trait
/// impls needed to use the id as a map key or serde field.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Generate a new random id.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Wrap an existing uuid, e.g. one read back from the store.
            pub fn from_uuid(id: uuid::Uuid) -> Self {
                Self(id)
            }

            /// The underlying uuid, for binding into store queries.
            pub fn as_uuid(&self) -> uuid::Uuid {
                self.0
            }

            /// First 8 hex characters, for log lines and container names.
            pub fn short(&self) -> String {
                let s = self.0.simple().to_string();
                s[..8].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(id: uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a job definition.
    pub struct JobId;
}

define_id! {
    /// Unique identifier for a single run of a job.
    pub struct RunId;
}

define_id! {
    /// Unique identifier for a queue row.
    pub struct QueueId;
}

/// Opaque identifier for the authenticated caller. Authentication and
/// credential storage are external collaborators; this crate only ever
/// sees the resulting id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OwnerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_is_eight_hex_chars() {
        let id = JobId::new();
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn round_trips_through_uuid() {
        let id = RunId::new();
        let uuid = id.as_uuid();
        assert_eq!(RunId::from_uuid(uuid), id);
    }

    #[test]
    fn serde_transparent() {
        let id = QueueId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }
}
