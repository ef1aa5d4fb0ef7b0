//! Stable identities for mission and objective definitions.
//!
//! Identities are generated once when a definition is authored, persisted with it
//! and never reused. The nil UUID marks an identity that was never generated and is
//! rejected everywhere an identity is required.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! stable_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identity.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// The invalid identity.
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Build an identity from a 128-bit value. Handy for fixtures.
            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }

            /// Underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Whether this identity was ever generated.
            pub fn is_valid(&self) -> bool {
                !self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.hyphenated().fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

stable_id!(
    /// Stable identity of a [`MissionDefinition`](crate::definition::MissionDefinition).
    MissionId
);

stable_id!(
    /// Stable identity of an [`ObjectiveDefinition`](crate::definition::ObjectiveDefinition).
    ObjectiveId
);
