//! Core type definitions for compile-time safety.
//!
//! This module provides newtype wrappers around string identifiers to prevent
//! accidental mixing of different ID types at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Declares a string-backed identifier newtype with the usual conversions.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "` from a string.")]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[doc = concat!("Generate a fresh random `", stringify!($name), "`.")]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Get the inner string value.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Stable identifier of a script element (cue, note or group header).
    ElementId
}

string_id! {
    /// Server-side script identifier.
    ScriptId
}

string_id! {
    /// Identifier of a single recorded edit operation.
    OperationId
}

string_id! {
    /// Identifier of a named checkpoint.
    CheckpointId
}

string_id! {
    /// Crew department a cue belongs to (lighting, sound, rail, ...).
    DepartmentId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_uuids() {
        let id = OperationId::generate();
        assert_eq!(id.as_str().len(), 36);
        assert_ne!(id, OperationId::generate());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ElementId::new("cue-1");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"cue-1\"");
    }
}
